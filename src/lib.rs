//! Travis - Voice-activated desktop assistant
//!
//! This library provides the building blocks of the assistant:
//! - Voice processing (microphone capture, phrase detection, STT, TTS)
//! - Command dispatch over an ordered rule table
//! - Question answering through a hosted chat-completion model
//! - A camera viewer with optional face detection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Activation Loop                     │
//! │       Idle  ──wake──▶  Active  ──▶  Dispatching      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Dispatcher                        │
//! │   Desktop  │  Browser  │  Camera  │  Completion      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Voice                           │
//! │   Microphone  │  Phrase detector  │  STT  │  TTS     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod completion;
pub mod config;
pub mod desktop;
pub mod dispatch;
pub mod error;
pub mod vision;
pub mod voice;

pub use assistant::{Assistant, Components, CycleOutcome, LoopState};
pub use completion::{CompletionClient, CompletionError};
pub use config::Config;
pub use desktop::{App, Desktop, SystemDesktop};
pub use dispatch::{Command, Dispatcher};
pub use error::{Error, Result};
