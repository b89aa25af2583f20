//! TOML configuration file loading
//!
//! Supports `~/.config/travis/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TravisConfigFile {
    /// Assistant identity
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Microphone listening parameters
    #[serde(default)]
    pub listen: ListenFileConfig,

    /// Speech recognition service
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Chat completion service
    #[serde(default)]
    pub completion: CompletionFileConfig,

    /// Local speech synthesizer
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Camera viewer
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Launch commands for desktop applications
    #[serde(default)]
    pub apps: AppsFileConfig,
}

/// Assistant identity
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Display name used when echoing speech (e.g. "Travis")
    pub name: Option<String>,

    /// Wake token matched case-insensitively in transcripts
    pub wake_word: Option<String>,
}

/// Listening parameters, durations in milliseconds
#[derive(Debug, Default, Deserialize)]
pub struct ListenFileConfig {
    pub wake_timeout_ms: Option<u64>,
    pub wake_phrase_limit_ms: Option<u64>,
    pub command_timeout_ms: Option<u64>,
    pub command_phrase_limit_ms: Option<u64>,
    pub ambient_ms: Option<u64>,
    pub pause_ms: Option<u64>,
    pub min_phrase_ms: Option<u64>,
    pub pre_roll_ms: Option<u64>,
    pub ambient_multiplier: Option<f32>,
    pub min_energy: Option<f32>,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Transcription endpoint (OpenAI-compatible)
    pub endpoint: Option<String>,

    /// Transcription model (e.g. "whisper-large-v3-turbo")
    pub model: Option<String>,

    /// ISO-639-1 language hint
    pub language: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Chat completion configuration
#[derive(Debug, Default, Deserialize)]
pub struct CompletionFileConfig {
    /// Chat completion endpoint
    pub endpoint: Option<String>,

    /// Model identifier (e.g. "llama3-8b-8192")
    pub model: Option<String>,

    /// Maximum tokens in the generated answer
    pub max_tokens: Option<u32>,

    /// Environment variable holding the bearer credential
    pub api_key_env: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Speech synthesizer configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Explicit synthesizer command; the text is appended as the last argument
    pub command: Option<Vec<String>>,

    /// Voice name passed to the synthesizer
    pub voice: Option<String>,

    /// Speaking rate (words per minute)
    pub rate: Option<u32>,
}

/// Camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    /// Capture device index
    pub index: Option<u32>,

    /// Path to the SeetaFace frontal detection model
    pub face_model: Option<PathBuf>,

    /// Smallest face considered, in pixels
    pub min_face_size: Option<u32>,
}

/// Desktop application launch commands (program followed by arguments)
#[derive(Debug, Default, Deserialize)]
pub struct AppsFileConfig {
    pub editor: Option<Vec<String>>,
    pub file_browser: Option<Vec<String>>,
    pub settings: Option<Vec<String>>,
    pub messaging: Option<Vec<String>>,
}

impl TravisConfigFile {
    /// Read and parse a config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid TOML
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: Self = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let file: TravisConfigFile = toml::from_str(
            r#"
            [assistant]
            wake_word = "jarvis"

            [listen]
            command_timeout_ms = 7000
            "#,
        )
        .unwrap();

        assert_eq!(file.assistant.wake_word.as_deref(), Some("jarvis"));
        assert!(file.assistant.name.is_none());
        assert_eq!(file.listen.command_timeout_ms, Some(7000));
        assert!(file.completion.model.is_none());
    }

    #[test]
    fn test_empty_file_parses() {
        let file: TravisConfigFile = toml::from_str("").unwrap();
        assert!(file.apps.editor.is_none());
    }
}
