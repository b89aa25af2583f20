//! Wake word detection
//!
//! The wake listen is transcribed like any other phrase; activation is a
//! case-insensitive substring test on that transcript.

/// Detects wake words in transcripts
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    wake_words: Vec<String>,
}

impl WakeWordDetector {
    /// Create a new wake word detector
    ///
    /// # Arguments
    ///
    /// * `wake_words` - Wake words to detect (e.g., "travis"); blanks are dropped
    #[must_use]
    pub fn new(wake_words: Vec<String>) -> Self {
        let normalized: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.to_lowercase().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        tracing::debug!(wake_words = ?normalized, "wake word detector initialized");

        Self {
            wake_words: normalized,
        }
    }

    /// Check if a transcript contains a wake word
    #[must_use]
    pub fn check_wake_word(&self, transcript: &str) -> bool {
        let normalized = transcript.to_lowercase();

        for wake_word in &self.wake_words {
            if normalized.contains(wake_word.as_str()) {
                tracing::info!(wake_word, transcript, "wake word detected");
                return true;
            }
        }

        tracing::trace!(transcript, "no wake word");
        false
    }

    /// Get the configured wake words
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }
}
