//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::time::Duration;

use travis_voice::voice::{
    DetectorSettings, DetectorState, ListenParams, PhraseDetector, PhraseEvent, SAMPLE_RATE,
    WakeWordDetector, samples_to_wav,
};

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

fn detector(timeout_ms: u64, phrase_limit_ms: Option<u64>) -> PhraseDetector {
    PhraseDetector::new(
        DetectorSettings::default(),
        ListenParams {
            timeout: Duration::from_millis(timeout_ms),
            phrase_limit: phrase_limit_ms.map(Duration::from_millis),
        },
        SAMPLE_RATE,
    )
}

/// Feed samples in 100ms slices, as the capture loop does, until an event
fn feed_all(detector: &mut PhraseDetector, samples: &[f32]) -> PhraseEvent {
    for chunk in samples.chunks(SAMPLE_RATE as usize / 10) {
        let event = detector.feed(chunk);
        if event != PhraseEvent::Pending {
            return event;
        }
    }
    PhraseEvent::Pending
}

#[test]
fn test_wake_word_normalization() {
    let detector = WakeWordDetector::new(vec!["  TRAVIS  ".to_string(), "Jarvis".to_string()]);

    // Should be normalized to lowercase and trimmed
    assert_eq!(detector.wake_words(), &["travis", "jarvis"]);
}

#[test]
fn test_wake_word_case_insensitive() {
    let detector = WakeWordDetector::new(vec!["travis".to_string()]);

    assert!(detector.check_wake_word("TRAVIS"));
    assert!(detector.check_wake_word("hey TrAvIs"));
    assert!(detector.check_wake_word("travis open google"));
    assert!(!detector.check_wake_word("travel plans"));
}

#[test]
fn test_silence_times_out() {
    let mut detector = detector(1_000, None);

    let mut audio = generate_silence(0.5); // calibration
    audio.extend(generate_silence(1.5));

    assert_eq!(feed_all(&mut detector, &audio), PhraseEvent::TimedOut);
    assert_eq!(detector.state(), DetectorState::Finished);
}

#[test]
fn test_speech_then_pause_completes_phrase() {
    let mut detector = detector(5_000, None);

    let mut audio = generate_silence(0.5);
    audio.extend(generate_sine_samples(440.0, 0.6, 0.3));
    audio.extend(generate_silence(1.0));

    match feed_all(&mut detector, &audio) {
        PhraseEvent::Complete(phrase) => {
            // At least the speech itself, plus the trailing pause
            assert!(phrase.len() >= (SAMPLE_RATE as usize * 6) / 10);
        }
        other => panic!("expected a phrase, got {other:?}"),
    }
}

#[test]
fn test_phrase_limit_enforced() {
    let mut detector = detector(5_000, Some(1_000));

    let mut audio = generate_silence(0.5);
    audio.extend(generate_sine_samples(440.0, 3.0, 0.3));

    match feed_all(&mut detector, &audio) {
        PhraseEvent::Complete(phrase) => {
            // Limit plus at most one pre-roll window
            assert!(phrase.len() <= SAMPLE_RATE as usize * 13 / 10);
        }
        other => panic!("expected a phrase, got {other:?}"),
    }
}

#[test]
fn test_short_blip_ignored() {
    let mut detector = detector(2_000, None);

    let mut audio = generate_silence(0.5);
    audio.extend(generate_sine_samples(440.0, 0.1, 0.3));
    audio.extend(generate_silence(3.0));

    assert_eq!(feed_all(&mut detector, &audio), PhraseEvent::TimedOut);
}

#[test]
fn test_samples_to_wav() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    // WAV should have reasonable size
    assert!(wav_data.len() > 44); // WAV header is 44 bytes
}

#[test]
fn test_wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25];
    let wav_data = samples_to_wav(&original_samples, SAMPLE_RATE).unwrap();

    // Read WAV back
    let cursor = Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    // Read samples back
    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[0], 0);
    assert!(read_samples[3] > 32_000);
}
