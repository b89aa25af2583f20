//! Command dispatch
//!
//! A transcript is lower-cased and matched against an ordered rule table.
//! The first rule whose predicate holds selects the command; guarded rules
//! sit ahead of the broader rules they would otherwise be shadowed by.

use std::fmt;

use crate::completion::CompletionClient;
use crate::desktop::{App, Desktop};
use crate::vision::{self, CameraBackend, ViewerMode};
use crate::voice::Speaker;
use crate::Result;

/// Spoken when no rule matches
pub const UNHANDLED_REPLY: &str = "I'm not sure how to do that. Can you be more specific?";

/// Spoken before a completion request
pub const THINKING: &str = "Thinking...";

/// Leading phrases that turn a transcript into a question
pub const QUESTION_PREFIXES: [&str; 4] = ["who is", "what is", "tell me about", "question"];

/// Action selected for a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a desktop application
    Launch(App),

    /// Open a camera session
    Camera(ViewerMode),

    /// Open a site in the browser
    OpenUrl {
        label: &'static str,
        url: &'static str,
    },

    /// Forward a question to the completion client
    Ask(String),

    /// Nothing matched
    Unhandled,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch(app) => write!(f, "launch {}", app.display_name()),
            Self::Camera(ViewerMode::Plain) => f.write_str("camera"),
            Self::Camera(ViewerMode::Detection) => f.write_str("face detection camera"),
            Self::OpenUrl { url, .. } => write!(f, "open {url}"),
            Self::Ask(query) => write!(f, "ask \"{query}\""),
            Self::Unhandled => f.write_str("unhandled"),
        }
    }
}

/// One `(predicate, command)` pair of the dispatch table
struct Rule {
    name: &'static str,
    matches: fn(&str) -> bool,
    build: fn(&str) -> Command,
}

const RULES: &[Rule] = &[
    Rule {
        name: "editor",
        matches: |t| t.contains("open notepad"),
        build: |_| Command::Launch(App::Editor),
    },
    Rule {
        name: "detection-camera",
        matches: |t| t.contains("open detection camera"),
        build: |_| Command::Camera(ViewerMode::Detection),
    },
    Rule {
        name: "camera",
        matches: |t| t.contains("open camera") && !t.contains("detection camera"),
        build: |_| Command::Camera(ViewerMode::Plain),
    },
    Rule {
        name: "camera-fallback",
        matches: |t| t.contains("open camera"),
        build: |_| Command::Camera(ViewerMode::Plain),
    },
    Rule {
        name: "file-browser",
        matches: |t| t.contains("open file explorer"),
        build: |_| Command::Launch(App::FileBrowser),
    },
    Rule {
        name: "settings",
        matches: |t| t.contains("open settings"),
        build: |_| Command::Launch(App::Settings),
    },
    Rule {
        name: "messaging",
        matches: |t| t.contains("open whatsapp"),
        build: |_| Command::Launch(App::Messaging),
    },
    Rule {
        name: "google",
        matches: |t| t.contains("open google"),
        build: |_| Command::OpenUrl {
            label: "Google",
            url: "https://google.com",
        },
    },
    Rule {
        name: "youtube",
        matches: |t| t.contains("open youtube"),
        build: |_| Command::OpenUrl {
            label: "Youtube",
            url: "https://youtube.com",
        },
    },
    Rule {
        name: "question",
        matches: |t| question_query(t).is_some(),
        build: |t| question_query(t).map_or(Command::Unhandled, Command::Ask),
    },
];

/// Collaborators a dispatched command may act through
pub struct Collaborators<'a> {
    pub speaker: &'a mut dyn Speaker,
    pub desktop: &'a mut dyn Desktop,
    pub completion: &'a CompletionClient,
    pub camera: &'a mut dyn CameraBackend,
}

/// Maps transcripts to commands and executes them
pub struct Dispatcher {
    rules: &'static [Rule],
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: RULES }
    }

    /// Select the command for a transcript without executing it
    #[must_use]
    pub fn select(&self, transcript: &str) -> Command {
        let normalized = normalize(transcript);

        self.rules
            .iter()
            .find(|rule| (rule.matches)(&normalized))
            .map_or(Command::Unhandled, |rule| {
                tracing::debug!(rule = rule.name, transcript = %normalized, "rule matched");
                (rule.build)(&normalized)
            })
    }

    /// Select and execute the command for a transcript
    ///
    /// Launch and completion failures are spoken, not returned.
    ///
    /// # Errors
    ///
    /// Returns error only if the speaker fails
    pub fn dispatch(&self, transcript: &str, with: &mut Collaborators<'_>) -> Result<Command> {
        let command = self.select(transcript);
        tracing::info!(command = %command, "dispatching");

        match &command {
            Command::Launch(app) => {
                let name = app.display_name();
                with.speaker.speak(&format!("Opening {name}."))?;
                if let Err(e) = with.desktop.launch(*app) {
                    tracing::error!(error = %e, ?app, "launch failed");
                    with.speaker.speak(&format!("Sorry, I couldn't open {name}."))?;
                }
            }
            Command::Camera(mode) => {
                vision::run_viewer(with.camera, *mode, with.speaker)?;
            }
            Command::OpenUrl { label, url } => {
                with.speaker.speak(&format!("Opening {label}."))?;
                if let Err(e) = with.desktop.open_url(url) {
                    tracing::error!(error = %e, url, "browser launch failed");
                    with.speaker.speak(&format!("Sorry, I couldn't open {label}."))?;
                }
            }
            Command::Ask(query) => {
                with.speaker.speak(THINKING)?;
                let answer = with.completion.answer(query);
                with.speaker.speak(&answer)?;
            }
            Command::Unhandled => {
                tracing::info!(transcript, "no command matched");
                with.speaker.speak(UNHANDLED_REPLY)?;
            }
        }

        Ok(command)
    }
}

fn normalize(transcript: &str) -> String {
    transcript.trim().to_lowercase()
}

/// Extract the question from a transcript that starts with a question
/// prefix
///
/// Only the leading prefix is removed; the rest is trimmed of whitespace
/// and leading `,`/`:`. Returns `None` when there is no prefix or nothing
/// follows it.
#[must_use]
pub fn question_query(transcript: &str) -> Option<String> {
    let normalized = normalize(transcript);

    let rest = QUESTION_PREFIXES
        .iter()
        .find_map(|prefix| normalized.strip_prefix(prefix))?;

    let query = rest
        .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .trim_end();

    (!query.is_empty()).then(|| query.to_string())
}
