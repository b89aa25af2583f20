//! Activation loop
//!
//! Idle listens for the wake word, Active listens for one command, and
//! Dispatching runs it. Every cycle ends back in Idle.

use std::time::Duration;

use crate::completion::CompletionClient;
use crate::config::{AssistantConfig, ListenConfig};
use crate::desktop::Desktop;
use crate::dispatch::{Collaborators, Command, Dispatcher};
use crate::vision::CameraBackend;
use crate::voice::{ListenError, SpeechRecognizer, Speaker, WakeWordDetector};
use crate::Result;

/// Spoken on activation
pub const WAKE_REPLY: &str = "Yes Boss?";

/// Spoken when a command listen times out or is not understood
pub const NOT_CAUGHT: &str = "Sorry, I didn't catch that.";

/// Spoken when the recognition service fails
pub const SERVICE_ERROR: &str = "Could not connect to the speech service.";

/// Pause after a failed wake listen before listening again
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Activation loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Listening for the wake word
    Idle,
    /// Listening for a command
    Active,
    /// Executing the selected command
    Dispatching,
}

/// What one activation cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing heard, or no wake word in what was heard
    Dormant,
    /// The wake listen failed with a service error
    WakeFailed(ListenError),
    /// Activated, but no command was obtained
    Missed(ListenError),
    /// A command was selected and executed
    Dispatched(Command),
}

/// Collaborators owned by the assistant
pub struct Components {
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub speaker: Box<dyn Speaker>,
    pub desktop: Box<dyn Desktop>,
    pub camera: Box<dyn CameraBackend>,
    pub completion: CompletionClient,
}

/// The voice assistant
pub struct Assistant {
    name: String,
    components: Components,
    dispatcher: Dispatcher,
    wake: WakeWordDetector,
    listen: ListenConfig,
    state: LoopState,
    retry_delay: Duration,
}

impl Assistant {
    /// Create an assistant in the Idle state
    #[must_use]
    pub fn new(components: Components, identity: &AssistantConfig, listen: ListenConfig) -> Self {
        Self {
            name: identity.name.clone(),
            components,
            dispatcher: Dispatcher::new(),
            wake: WakeWordDetector::new(vec![identity.wake_word.clone()]),
            listen,
            state: LoopState::Idle,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the pause after a failed wake listen
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Speak the start-up greeting
    ///
    /// # Errors
    ///
    /// Returns error if the speaker fails
    pub fn greet(&mut self) -> Result<()> {
        let greeting = format!("Initializing {}. I am online and ready.", self.name);
        self.components.speaker.speak(&greeting)
    }

    /// Run one Idle → Active → Dispatching → Idle cycle
    ///
    /// Listening failures are handled here and reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns error if speaking fails
    pub fn cycle(&mut self) -> Result<CycleOutcome> {
        let outcome = self.step();
        self.transition(LoopState::Idle);
        outcome
    }

    /// Greet, then run cycles until `max_cycles` is reached, or forever
    ///
    /// Errors escaping a cycle are logged and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns error if the greeting cannot be spoken
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<()> {
        self.greet()?;
        tracing::info!(wake_words = ?self.wake.wake_words(), "listening for wake word");

        let mut cycles: u64 = 0;
        while max_cycles.is_none_or(|max| cycles < max) {
            cycles += 1;
            match self.cycle() {
                Ok(CycleOutcome::WakeFailed(_)) => std::thread::sleep(self.retry_delay),
                Ok(outcome) => tracing::trace!(?outcome, "cycle complete"),
                Err(e) => tracing::error!(error = %e, "activation cycle failed"),
            }
        }

        Ok(())
    }

    fn step(&mut self) -> Result<CycleOutcome> {
        self.transition(LoopState::Idle);

        let heard = match self.components.recognizer.listen(self.listen.wake) {
            Ok(heard) => heard,
            Err(ListenError::Timeout | ListenError::Unintelligible) => {
                return Ok(CycleOutcome::Dormant);
            }
            Err(e) => {
                tracing::error!(error = %e, "wake listen failed");
                self.components.speaker.speak(SERVICE_ERROR)?;
                return Ok(CycleOutcome::WakeFailed(e));
            }
        };

        if !self.wake.check_wake_word(&heard) {
            return Ok(CycleOutcome::Dormant);
        }

        self.transition(LoopState::Active);
        self.components.speaker.speak(WAKE_REPLY)?;

        let transcript = match self.components.recognizer.listen(self.listen.command) {
            Ok(transcript) => transcript,
            Err(e) => {
                match &e {
                    ListenError::Timeout | ListenError::Unintelligible => {
                        tracing::info!(error = %e, "no command heard");
                        self.components.speaker.speak(NOT_CAUGHT)?;
                    }
                    ListenError::Service(_) => {
                        tracing::error!(error = %e, "command listen failed");
                        self.components.speaker.speak(SERVICE_ERROR)?;
                    }
                }
                return Ok(CycleOutcome::Missed(e));
            }
        };

        tracing::info!(transcript = %transcript, "command heard");
        self.transition(LoopState::Dispatching);

        let mut with = Collaborators {
            speaker: self.components.speaker.as_mut(),
            desktop: self.components.desktop.as_mut(),
            completion: &self.components.completion,
            camera: self.components.camera.as_mut(),
        };
        let command = self.dispatcher.dispatch(&transcript, &mut with)?;

        Ok(CycleOutcome::Dispatched(command))
    }

    fn transition(&mut self, to: LoopState) {
        if self.state != to {
            tracing::debug!(from = ?self.state, ?to, "state change");
            self.state = to;
        }
    }
}
