//! Phrase detection over a live sample stream
//!
//! Calibrates an energy threshold against ambient noise, waits for speech
//! to start (bounded by a timeout), then captures until a pause or the
//! phrase limit.

use std::collections::VecDeque;
use std::time::Duration;

/// Per-listen timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenParams {
    /// How long to wait for speech to start
    pub timeout: Duration,

    /// Maximum phrase length once speech started; `None` means until pause
    pub phrase_limit: Option<Duration>,
}

/// Phrase detector tuning shared by every listen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    /// Ambient noise calibration window
    pub ambient: Duration,

    /// Non-speech duration that ends a phrase
    pub pause: Duration,

    /// Minimum speech in a phrase; shorter blips are discarded
    pub min_phrase: Duration,

    /// Audio kept from before speech onset
    pub pre_roll: Duration,

    /// Threshold = ambient RMS times this factor
    pub ambient_multiplier: f32,

    /// Lower bound on the energy threshold
    pub min_energy: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            ambient: Duration::from_millis(500),
            pause: Duration::from_millis(800),
            min_phrase: Duration::from_millis(300),
            pre_roll: Duration::from_millis(300),
            ambient_multiplier: 1.5,
            min_energy: 0.01,
        }
    }
}

/// State of the phrase detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Measuring ambient noise
    Calibrating,
    /// Waiting for speech to start
    Waiting,
    /// Speech started, accumulating the phrase
    Capturing,
    /// A phrase completed or the listen timed out
    Finished,
}

/// Result of feeding samples to the detector
#[derive(Debug, Clone, PartialEq)]
pub enum PhraseEvent {
    /// Keep feeding
    Pending,
    /// Phrase captured
    Complete(Vec<f32>),
    /// No speech started before the timeout
    TimedOut,
}

/// Detects a single spoken phrase in a sample stream
pub struct PhraseDetector {
    settings: DetectorSettings,
    sample_rate: u32,
    state: DetectorState,
    chunk_len: usize,
    pending: Vec<f32>,
    threshold: f32,
    ambient_sum: f64,
    ambient_count: usize,
    ambient_target: usize,
    timeout_samples: usize,
    limit_samples: Option<usize>,
    waited: usize,
    pre_roll: VecDeque<f32>,
    pre_roll_len: usize,
    phrase: Vec<f32>,
    onset: usize,
    speech_samples: usize,
    silence_samples: usize,
}

impl PhraseDetector {
    /// Create a detector for one listen
    #[must_use]
    pub fn new(settings: DetectorSettings, params: ListenParams, sample_rate: u32) -> Self {
        let to_samples = |d: Duration| duration_to_samples(d, sample_rate);
        let ambient_target = to_samples(settings.ambient);

        let state = if ambient_target == 0 {
            DetectorState::Waiting
        } else {
            DetectorState::Calibrating
        };

        Self {
            settings,
            sample_rate,
            state,
            // 50ms analysis chunks
            chunk_len: (sample_rate as usize / 20).max(1),
            pending: Vec::new(),
            threshold: settings.min_energy,
            ambient_sum: 0.0,
            ambient_count: 0,
            ambient_target,
            timeout_samples: to_samples(params.timeout),
            limit_samples: params.phrase_limit.map(to_samples),
            waited: 0,
            pre_roll: VecDeque::new(),
            pre_roll_len: to_samples(settings.pre_roll),
            phrase: Vec::new(),
            onset: 0,
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    /// Feed newly captured samples
    pub fn feed(&mut self, samples: &[f32]) -> PhraseEvent {
        if self.state == DetectorState::Finished {
            return PhraseEvent::Pending;
        }

        self.pending.extend_from_slice(samples);
        let mut consumed = 0;
        let mut event = PhraseEvent::Pending;

        while self.pending.len() - consumed >= self.chunk_len {
            let chunk: Vec<f32> = self.pending[consumed..consumed + self.chunk_len].to_vec();
            consumed += self.chunk_len;
            event = self.process_chunk(&chunk);
            if event != PhraseEvent::Pending {
                break;
            }
        }

        self.pending.drain(..consumed);
        event
    }

    /// Stop listening now
    ///
    /// Returns the phrase if enough speech was captured, otherwise
    /// `TimedOut`.
    pub fn finish(&mut self) -> PhraseEvent {
        let enough_speech = self.speech_samples >= self.min_phrase_samples();
        let event = if self.state == DetectorState::Capturing && enough_speech {
            PhraseEvent::Complete(std::mem::take(&mut self.phrase))
        } else {
            PhraseEvent::TimedOut
        };
        self.state = DetectorState::Finished;
        event
    }

    fn process_chunk(&mut self, chunk: &[f32]) -> PhraseEvent {
        let energy = calculate_energy(chunk);

        match self.state {
            DetectorState::Calibrating => {
                self.ambient_sum += chunk.iter().map(|s| f64::from(s * s)).sum::<f64>();
                self.ambient_count += chunk.len();

                if self.ambient_count >= self.ambient_target {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                    let ambient_rms = (self.ambient_sum / self.ambient_count as f64).sqrt() as f32;
                    self.threshold = (ambient_rms * self.settings.ambient_multiplier)
                        .max(self.settings.min_energy);
                    self.state = DetectorState::Waiting;
                    tracing::debug!(ambient_rms, threshold = self.threshold, "calibrated");
                }
                PhraseEvent::Pending
            }
            DetectorState::Waiting => {
                self.waited += chunk.len();

                if energy > self.threshold {
                    self.state = DetectorState::Capturing;
                    self.phrase.clear();
                    self.phrase.extend(self.pre_roll.drain(..));
                    self.onset = self.phrase.len();
                    self.phrase.extend_from_slice(chunk);
                    self.speech_samples = chunk.len();
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech started");
                    return PhraseEvent::Pending;
                }

                self.pre_roll.extend(chunk.iter().copied());
                while self.pre_roll.len() > self.pre_roll_len {
                    self.pre_roll.pop_front();
                }

                if self.waited >= self.timeout_samples {
                    tracing::debug!("no speech before timeout");
                    self.state = DetectorState::Finished;
                    return PhraseEvent::TimedOut;
                }
                PhraseEvent::Pending
            }
            DetectorState::Capturing => {
                self.phrase.extend_from_slice(chunk);

                if energy > self.threshold {
                    self.speech_samples += chunk.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += chunk.len();
                }

                if self
                    .limit_samples
                    .is_some_and(|limit| self.phrase.len() - self.onset >= limit)
                {
                    tracing::debug!(samples = self.phrase.len(), "phrase limit reached");
                    self.state = DetectorState::Finished;
                    return PhraseEvent::Complete(std::mem::take(&mut self.phrase));
                }

                if self.silence_samples >= self.pause_samples() {
                    if self.speech_samples >= self.min_phrase_samples() {
                        tracing::debug!(samples = self.phrase.len(), "phrase complete");
                        self.state = DetectorState::Finished;
                        return PhraseEvent::Complete(std::mem::take(&mut self.phrase));
                    }

                    // Too short to be speech; the timeout clock keeps running
                    tracing::trace!(speech = self.speech_samples, "discarding short phrase");
                    // Pre-roll was already counted while waiting
                    self.waited += self.phrase.len() - self.onset;
                    self.phrase.clear();
                    self.onset = 0;
                    self.speech_samples = 0;
                    self.silence_samples = 0;
                    self.state = DetectorState::Waiting;

                    if self.waited >= self.timeout_samples {
                        self.state = DetectorState::Finished;
                        return PhraseEvent::TimedOut;
                    }
                }
                PhraseEvent::Pending
            }
            DetectorState::Finished => PhraseEvent::Pending,
        }
    }

    fn pause_samples(&self) -> usize {
        duration_to_samples(self.settings.pause, self.sample_rate)
    }

    fn min_phrase_samples(&self) -> usize {
        duration_to_samples(self.settings.min_phrase, self.sample_rate)
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Energy threshold in use (valid after calibration)
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duration_to_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)) as usize
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
