//! Configuration management for the Travis assistant
//!
//! Built-in defaults, overlaid by an optional TOML file, overlaid by
//! environment variables.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::voice::{DetectorSettings, ListenParams};
use crate::Result;
use file::TravisConfigFile;

/// Default transcription endpoint (OpenAI-compatible Whisper on Groq)
pub const DEFAULT_STT_ENDPOINT: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "whisper-large-v3-turbo";

/// Default chat completion endpoint
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default chat completion model
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3-8b-8192";

/// Default bound on generated tokens
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Environment variable holding the completion credential
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Default wake token
pub const DEFAULT_WAKE_WORD: &str = "travis";

/// Default SeetaFace model file name, looked up next to the config file
pub const DEFAULT_FACE_MODEL: &str = "seeta_fd_frontal_v1.0.bin";

/// Travis assistant configuration
#[derive(Debug)]
pub struct Config {
    /// Assistant identity
    pub assistant: AssistantConfig,

    /// Listening parameters
    pub listen: ListenConfig,

    /// Speech recognition service
    pub stt: SttConfig,

    /// Chat completion service
    pub completion: CompletionConfig,

    /// Local speech synthesizer
    pub tts: TtsConfig,

    /// Camera viewer
    pub camera: CameraConfig,

    /// Desktop application launch commands
    pub apps: AppsConfig,
}

/// Assistant identity
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Name used when echoing spoken text
    pub name: String,

    /// Wake token, lower-cased
    pub wake_word: String,
}

/// Listening parameters for the two listen paths
///
/// The wake listen and the command listen keep separate timeouts.
#[derive(Debug, Clone, Copy)]
pub struct ListenConfig {
    /// Listen while idle, waiting for the wake word
    pub wake: ListenParams,

    /// Listen after activation, waiting for a command
    pub command: ListenParams,

    /// Phrase detector tuning
    pub detector: DetectorSettings,
}

/// Speech recognition configuration
#[derive(Debug)]
pub struct SttConfig {
    pub endpoint: String,
    pub model: String,
    pub language: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

/// Chat completion configuration
#[derive(Debug)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,

    /// Name of the environment variable the credential was read from
    pub api_key_env: String,

    /// Bearer credential, `None` when the variable is unset or empty
    pub api_key: Option<SecretString>,

    pub timeout: Duration,
}

/// Local speech synthesizer configuration
#[derive(Debug, Clone, Default)]
pub struct TtsConfig {
    /// Explicit synthesizer command, text appended as last argument
    pub command: Option<Vec<String>>,

    /// Voice name
    pub voice: Option<String>,

    /// Speaking rate (words per minute)
    pub rate: Option<u32>,
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Capture device index
    pub index: u32,

    /// SeetaFace frontal detection model
    pub face_model: PathBuf,

    /// Smallest face considered, in pixels
    pub min_face_size: u32,
}

/// Launch commands, each a program followed by its arguments
#[derive(Debug, Clone)]
pub struct AppsConfig {
    pub editor: Vec<String>,
    pub file_browser: Vec<String>,
    pub settings: Vec<String>,
    pub messaging: Vec<String>,
}

impl Default for AppsConfig {
    #[cfg(target_os = "windows")]
    fn default() -> Self {
        Self {
            editor: argv(&["notepad.exe"]),
            file_browser: argv(&["explorer"]),
            settings: argv(&["cmd", "/C", "start", "ms-settings:"]),
            messaging: argv(&["cmd", "/C", "start", "", "whatsapp.exe"]),
        }
    }

    #[cfg(target_os = "macos")]
    fn default() -> Self {
        Self {
            editor: argv(&["open", "-a", "TextEdit"]),
            file_browser: argv(&["open", "."]),
            settings: argv(&["open", "/System/Applications/System Settings.app"]),
            messaging: argv(&["open", "-a", "WhatsApp"]),
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    fn default() -> Self {
        Self {
            editor: argv(&["gedit"]),
            file_browser: argv(&["xdg-open", "."]),
            settings: argv(&["gnome-control-center"]),
            messaging: argv(&["xdg-open", "https://web.whatsapp.com"]),
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

/// Return the per-user config directory (`~/.config/travis` on Linux)
#[must_use]
pub fn config_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "travis", "travis")
        .map_or_else(|| PathBuf::from(".travis"), |d| d.config_dir().to_path_buf())
}

impl Config {
    /// Load configuration from the default file location and the process
    /// environment
    ///
    /// The file path is, in order: `path`, `$TRAVIS_CONFIG`,
    /// `<config dir>/config.toml`. A missing default file is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly named file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("TRAVIS_CONFIG").ok().map(PathBuf::from));

        let file = match explicit {
            Some(path) => TravisConfigFile::read(&path)?,
            None => {
                let default_path = config_dir().join("config.toml");
                if default_path.exists() {
                    match TravisConfigFile::read(&default_path) {
                        Ok(file) => file,
                        Err(e) => {
                            tracing::warn!(
                                path = %default_path.display(),
                                error = %e,
                                "failed to load config file, using defaults"
                            );
                            TravisConfigFile::default()
                        }
                    }
                } else {
                    tracing::debug!(path = %default_path.display(), "no config file");
                    TravisConfigFile::default()
                }
            }
        };

        Ok(Self::from_sources(file, |key| std::env::var(key).ok()))
    }

    /// Build configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn from_sources(file: TravisConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let assistant = AssistantConfig {
            name: file.assistant.name.unwrap_or_else(|| "Travis".to_string()),
            wake_word: env("TRAVIS_WAKE_WORD")
                .as_deref()
                .and_then(normalize_wake_word)
                .or_else(|| file.assistant.wake_word.as_deref().and_then(normalize_wake_word))
                .unwrap_or_else(|| DEFAULT_WAKE_WORD.to_string()),
        };

        let l = &file.listen;
        let detector_defaults = DetectorSettings::default();
        let listen = ListenConfig {
            wake: ListenParams {
                timeout: millis(l.wake_timeout_ms, 10_000),
                phrase_limit: l.wake_phrase_limit_ms.map(Duration::from_millis),
            },
            command: ListenParams {
                timeout: millis(l.command_timeout_ms, 5_000),
                phrase_limit: Some(millis(l.command_phrase_limit_ms, 10_000)),
            },
            detector: DetectorSettings {
                ambient: l.ambient_ms.map_or(detector_defaults.ambient, Duration::from_millis),
                pause: l.pause_ms.map_or(detector_defaults.pause, Duration::from_millis),
                min_phrase: l
                    .min_phrase_ms
                    .map_or(detector_defaults.min_phrase, Duration::from_millis),
                pre_roll: l.pre_roll_ms.map_or(detector_defaults.pre_roll, Duration::from_millis),
                ambient_multiplier: l
                    .ambient_multiplier
                    .unwrap_or(detector_defaults.ambient_multiplier),
                min_energy: l.min_energy.unwrap_or(detector_defaults.min_energy),
            },
        };

        let api_key_env = file
            .completion
            .api_key_env
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let completion_key = env(api_key_env.as_str()).map(SecretString::from);

        let stt = SttConfig {
            endpoint: file
                .stt
                .endpoint
                .unwrap_or_else(|| DEFAULT_STT_ENDPOINT.to_string()),
            model: env("TRAVIS_STT_MODEL")
                .or(file.stt.model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            language: file.stt.language.or_else(|| Some("en".to_string())),
            api_key: env("TRAVIS_STT_API_KEY")
                .or_else(|| env(api_key_env.as_str()))
                .map(SecretString::from),
            timeout: Duration::from_secs(file.stt.timeout_secs.unwrap_or(30)),
        };

        let completion = CompletionConfig {
            endpoint: file
                .completion
                .endpoint
                .unwrap_or_else(|| DEFAULT_COMPLETION_ENDPOINT.to_string()),
            model: env("TRAVIS_COMPLETION_MODEL")
                .or(file.completion.model)
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            max_tokens: file.completion.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            api_key_env,
            api_key: completion_key,
            timeout: Duration::from_secs(file.completion.timeout_secs.unwrap_or(30)),
        };

        let tts = TtsConfig {
            command: file.tts.command.filter(|c| !c.is_empty()),
            voice: env("TRAVIS_TTS_VOICE").or(file.tts.voice),
            rate: file.tts.rate,
        };

        let camera = CameraConfig {
            index: env("TRAVIS_CAMERA_INDEX")
                .and_then(|s| s.parse().ok())
                .or(file.camera.index)
                .unwrap_or(0),
            face_model: env("TRAVIS_FACE_MODEL")
                .map(PathBuf::from)
                .or(file.camera.face_model)
                .unwrap_or_else(|| config_dir().join(DEFAULT_FACE_MODEL)),
            min_face_size: file.camera.min_face_size.unwrap_or(30),
        };

        let defaults = AppsConfig::default();
        let apps = AppsConfig {
            editor: file.apps.editor.unwrap_or(defaults.editor),
            file_browser: file.apps.file_browser.unwrap_or(defaults.file_browser),
            settings: file.apps.settings.unwrap_or(defaults.settings),
            messaging: file.apps.messaging.unwrap_or(defaults.messaging),
        };

        Self {
            assistant,
            listen,
            stt,
            completion,
            tts,
            camera,
            apps,
        }
    }

    /// Replace the wake word, ignoring a blank value
    pub fn override_wake_word(&mut self, raw: &str) {
        match normalize_wake_word(raw) {
            Some(word) => self.assistant.wake_word = word,
            None => tracing::warn!(
                wake_word = %self.assistant.wake_word,
                "blank wake word override ignored"
            ),
        }
    }
}

/// Trimmed and lower-cased; `None` when nothing is left
fn normalize_wake_word(raw: &str) -> Option<String> {
    let word = raw.trim().to_lowercase();
    (!word.is_empty()).then_some(word)
}

fn millis(value: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(value.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(TravisConfigFile::default(), env_from(&[]));

        assert_eq!(config.assistant.name, "Travis");
        assert_eq!(config.assistant.wake_word, "travis");
        assert_eq!(config.listen.wake.timeout, Duration::from_secs(10));
        assert!(config.listen.wake.phrase_limit.is_none());
        assert_eq!(config.listen.command.timeout, Duration::from_secs(5));
        assert_eq!(config.listen.command.phrase_limit, Some(Duration::from_secs(10)));
        assert_eq!(config.completion.model, DEFAULT_COMPLETION_MODEL);
        assert_eq!(config.completion.max_tokens, 1024);
        assert_eq!(config.completion.api_key_env, "GROQ_API_KEY");
        assert!(config.completion.api_key.is_none());
        assert!(config.stt.api_key.is_none());
        assert_eq!(config.camera.index, 0);
    }

    #[test]
    fn test_file_overlay() {
        let file: TravisConfigFile = toml::from_str(
            r#"
            [assistant]
            name = "Jarvis"
            wake_word = "  Jarvis "

            [listen]
            command_timeout_ms = 8000
            wake_phrase_limit_ms = 4000

            [completion]
            model = "llama-3.3-70b-versatile"
            max_tokens = 256

            [apps]
            editor = ["kate"]
            "#,
        )
        .unwrap();

        let config = Config::from_sources(file, env_from(&[]));
        assert_eq!(config.assistant.name, "Jarvis");
        assert_eq!(config.assistant.wake_word, "jarvis");
        assert_eq!(config.listen.command.timeout, Duration::from_secs(8));
        assert_eq!(config.listen.wake.phrase_limit, Some(Duration::from_secs(4)));
        assert_eq!(config.completion.model, "llama-3.3-70b-versatile");
        assert_eq!(config.completion.max_tokens, 256);
        assert_eq!(config.apps.editor, vec!["kate".to_string()]);
    }

    #[test]
    fn test_env_overrides_file() {
        let file: TravisConfigFile = toml::from_str(
            r#"
            [assistant]
            wake_word = "jarvis"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            file,
            env_from(&[
                ("TRAVIS_WAKE_WORD", "Friday"),
                ("GROQ_API_KEY", "gsk-test"),
                ("TRAVIS_CAMERA_INDEX", "2"),
            ]),
        );

        assert_eq!(config.assistant.wake_word, "friday");
        assert_eq!(
            config.completion.api_key.as_ref().unwrap().expose_secret(),
            "gsk-test"
        );
        // STT falls back to the completion credential
        assert_eq!(config.stt.api_key.as_ref().unwrap().expose_secret(), "gsk-test");
        assert_eq!(config.camera.index, 2);
    }

    #[test]
    fn test_blank_wake_word_falls_back_to_default() {
        let file: TravisConfigFile = toml::from_str(
            r#"
            [assistant]
            wake_word = "   "
            "#,
        )
        .unwrap();

        let config = Config::from_sources(file, env_from(&[]));
        assert_eq!(config.assistant.wake_word, DEFAULT_WAKE_WORD);

        let file: TravisConfigFile = toml::from_str("[assistant]\nwake_word = \"\"\n").unwrap();
        let config = Config::from_sources(file, env_from(&[("TRAVIS_WAKE_WORD", " ")]));
        assert_eq!(config.assistant.wake_word, DEFAULT_WAKE_WORD);
    }

    #[test]
    fn test_wake_word_override() {
        let mut config = Config::from_sources(TravisConfigFile::default(), env_from(&[]));

        config.override_wake_word("");
        assert_eq!(config.assistant.wake_word, "travis");

        config.override_wake_word("  Friday ");
        assert_eq!(config.assistant.wake_word, "friday");
    }

    #[test]
    fn test_empty_credential_is_missing() {
        let config = Config::from_sources(
            TravisConfigFile::default(),
            env_from(&[("GROQ_API_KEY", "  ")]),
        );
        assert!(config.completion.api_key.is_none());
    }

    #[test]
    fn test_custom_credential_variable() {
        let file: TravisConfigFile = toml::from_str(
            r#"
            [completion]
            api_key_env = "OPENAI_API_KEY"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            file,
            env_from(&[("GROQ_API_KEY", "ignored"), ("OPENAI_API_KEY", "sk-test")]),
        );
        assert_eq!(config.completion.api_key_env, "OPENAI_API_KEY");
        assert_eq!(
            config.completion.api_key.as_ref().unwrap().expose_secret(),
            "sk-test"
        );
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[camera]\nmin_face_size = 48\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.camera.min_face_size, 48);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
