//! Voice processing module
//!
//! Handles microphone capture, phrase detection, cloud transcription, wake
//! word matching and local speech synthesis.

mod capture;
mod listener;
mod stt;
mod tts;
mod wake_word;

pub use capture::{Microphone, SAMPLE_RATE, samples_to_wav};
pub use listener::{
    DetectorSettings, DetectorState, ListenParams, PhraseDetector, PhraseEvent, calculate_energy,
};
pub use stt::{
    CloudRecognizer, ListenError, SpeechRecognizer, SpeechToText, transcript_or_unintelligible,
};
pub use tts::{ConsoleSpeaker, Speaker, SystemVoice, system_speaker};
pub use wake_word::WakeWordDetector;
