//! Speech-to-text (STT) processing

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::capture::{Microphone, samples_to_wav};
use super::listener::{DetectorSettings, ListenParams, PhraseDetector, PhraseEvent};
use crate::config::SttConfig;
use crate::{Error, Result};

/// How often the microphone buffer is drained while listening
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Upper bound on a phrase with no configured limit
const MAX_UNBOUNDED_PHRASE: Duration = Duration::from_secs(30);

/// Why a listen produced no transcript
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenError {
    /// No speech started within the timeout
    #[error("no speech detected before timeout")]
    Timeout,

    /// Speech was captured but could not be understood
    #[error("speech was not understood")]
    Unintelligible,

    /// Recognition service or microphone failure
    #[error("speech service error: {0}")]
    Service(String),
}

/// Listens for one phrase and returns its transcript
pub trait SpeechRecognizer {
    /// Block until a phrase is transcribed or the listen fails
    ///
    /// # Errors
    ///
    /// Returns the [`ListenError`] describing why no transcript is available
    fn listen(&mut self, params: ListenParams) -> std::result::Result<String, ListenError>;
}

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes speech to text through an OpenAI-compatible endpoint
pub struct SpeechToText {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    language: Option<String>,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// A missing API key is reported on each transcription rather than here,
    /// so the assistant can still start and say what is wrong.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: SttConfig) -> Result<Self> {
        if config.api_key.is_none() {
            tracing::warn!("no STT API key configured, transcription will fail");
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
            model: config.model,
            language: config.language,
        })
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the key is missing or the request fails
    pub fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("STT API key not configured".to_string()))?;

        tracing::debug!(audio_bytes = audio.len(), model = %self.model, "starting transcription");

        let mut form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "json");

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .multipart(form)
            .send()
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

/// Microphone capture followed by cloud transcription
pub struct CloudRecognizer {
    stt: SpeechToText,
    detector: DetectorSettings,
}

impl CloudRecognizer {
    /// Create a recognizer around an STT client
    #[must_use]
    pub const fn new(stt: SpeechToText, detector: DetectorSettings) -> Self {
        Self { stt, detector }
    }

    /// Capture one phrase from the microphone
    ///
    /// The microphone is held only for the duration of this call.
    fn capture_phrase(
        &self,
        params: ListenParams,
    ) -> std::result::Result<(Vec<f32>, u32), ListenError> {
        let microphone = Microphone::open().map_err(|e| {
            tracing::error!(error = %e, "microphone unavailable");
            ListenError::Service(e.to_string())
        })?;
        let sample_rate = microphone.sample_rate();
        let mut detector = PhraseDetector::new(self.detector, params, sample_rate);

        let budget = self.detector.ambient
            + params.timeout
            + params.phrase_limit.unwrap_or(MAX_UNBOUNDED_PHRASE);
        let deadline = Instant::now() + budget;

        tracing::debug!(?params, "listening");

        loop {
            std::thread::sleep(POLL_INTERVAL);

            let event = if Instant::now() >= deadline {
                detector.finish()
            } else {
                detector.feed(&microphone.take_buffer())
            };

            match event {
                PhraseEvent::Pending => {}
                PhraseEvent::Complete(phrase) => return Ok((phrase, sample_rate)),
                PhraseEvent::TimedOut => return Err(ListenError::Timeout),
            }
        }
    }
}

impl SpeechRecognizer for CloudRecognizer {
    fn listen(&mut self, params: ListenParams) -> std::result::Result<String, ListenError> {
        let (phrase, sample_rate) = self.capture_phrase(params)?;

        let wav = samples_to_wav(&phrase, sample_rate)
            .map_err(|e| ListenError::Service(e.to_string()))?;

        let text = self.stt.transcribe(wav).map_err(|e| {
            tracing::error!(error = %e, "speech service error");
            ListenError::Service(e.to_string())
        })?;

        transcript_or_unintelligible(&text)
    }
}

/// Map an empty transcript to [`ListenError::Unintelligible`]
///
/// # Errors
///
/// Returns `Unintelligible` when the transcript has no words
pub fn transcript_or_unintelligible(text: &str) -> std::result::Result<String, ListenError> {
    let trimmed = text.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        Ok(trimmed.to_string())
    } else {
        Err(ListenError::Unintelligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_trimmed() {
        assert_eq!(
            transcript_or_unintelligible("  Travis, open Google. ").unwrap(),
            "Travis, open Google."
        );
    }

    #[test]
    fn test_empty_transcript_is_unintelligible() {
        assert_eq!(transcript_or_unintelligible(""), Err(ListenError::Unintelligible));
        assert_eq!(transcript_or_unintelligible("  ... "), Err(ListenError::Unintelligible));
    }

    #[test]
    fn test_transcription_response_parses() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text": " open youtube", "x_groq": {"id": "req_1"}}"#)
                .unwrap();
        assert_eq!(parsed.text, " open youtube");
    }

    #[test]
    fn test_missing_key_fails_without_request() {
        let stt = SpeechToText::new(SttConfig {
            endpoint: "http://127.0.0.1:9/unreachable".to_string(),
            model: "whisper-large-v3-turbo".to_string(),
            language: None,
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let err = stt.transcribe(vec![0; 16]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
