//! Error types for the Travis assistant

use thiserror::Error;

use crate::completion::CompletionError;
use crate::voice::ListenError;

/// Result type alias for Travis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Travis assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Camera capture or display error
    #[error("camera error: {0}")]
    Camera(String),

    /// Application or URL launch error
    #[error("launch error: {0}")]
    Launch(String),

    /// Listening failed (timeout, unintelligible audio, service failure)
    #[error(transparent)]
    Listen(#[from] ListenError),

    /// Chat completion failed
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
