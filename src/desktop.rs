//! Desktop side effects: application launches and browser URLs

use std::process::{Command, Stdio};

use crate::config::AppsConfig;
use crate::{Error, Result};

/// Desktop applications the assistant can launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum App {
    Editor,
    FileBrowser,
    Settings,
    Messaging,
}

impl App {
    /// Name used in spoken acknowledgements
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Editor => "Notepad",
            Self::FileBrowser => "File Explorer",
            Self::Settings => "settings",
            Self::Messaging => "WhatsApp",
        }
    }
}

/// Launches applications and opens URLs on the user's desktop
pub trait Desktop {
    /// Start `app` without waiting for it to exit
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be spawned
    fn launch(&mut self, app: App) -> Result<()>;

    /// Open `url` in the default browser
    ///
    /// # Errors
    ///
    /// Returns error if no browser could be started
    fn open_url(&mut self, url: &str) -> Result<()>;
}

/// Desktop backed by OS processes and the system browser
pub struct SystemDesktop {
    apps: AppsConfig,
}

impl SystemDesktop {
    #[must_use]
    pub const fn new(apps: AppsConfig) -> Self {
        Self { apps }
    }

    /// Command line configured for `app`
    #[must_use]
    pub fn argv(&self, app: App) -> &[String] {
        match app {
            App::Editor => &self.apps.editor,
            App::FileBrowser => &self.apps.file_browser,
            App::Settings => &self.apps.settings,
            App::Messaging => &self.apps.messaging,
        }
    }
}

impl Desktop for SystemDesktop {
    fn launch(&mut self, app: App) -> Result<()> {
        let (program, args) = self
            .argv(app)
            .split_first()
            .ok_or_else(|| Error::Config(format!("no launch command for {app:?}")))?;

        tracing::info!(?app, program, ?args, "launching application");

        // Detached: the assistant never waits on launched apps
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Launch(format!("failed to start {program}: {e}")))?;

        Ok(())
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        tracing::info!(url, "opening browser");
        webbrowser::open(url).map_err(|e| Error::Launch(format!("failed to open {url}: {e}")))
    }
}
