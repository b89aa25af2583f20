//! Audio capture from microphone

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Preferred sample rate for capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Exclusive handle on the default input device
///
/// The stream runs from [`Microphone::open`] until the handle is dropped, so
/// holding a `Microphone` in a scope guarantees the device is released when
/// the scope exits, on every path.
pub struct Microphone {
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl Microphone {
    /// Open the default input device and start capturing
    ///
    /// Prefers mono 16kHz; falls back to the device default config and
    /// down-mixes to mono.
    ///
    /// # Errors
    ///
    /// Returns error if no input device exists or the stream cannot start
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let (config, format) = select_config(&device)?;
        let sample_rate = config.sample_rate.0;
        let buffer = Arc::new(Mutex::new(Vec::new()));

        let stream = build_stream(&device, &config, format, Arc::clone(&buffer))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "microphone opened"
        );

        Ok(Self {
            sample_rate,
            buffer,
            stream: Some(stream),
        })
    }

    /// Stop capturing and release the device
    ///
    /// Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("microphone released");
        }
    }

    /// Get captured audio and clear the buffer
    ///
    /// Returns the mono samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Sample rate of the delivered mono samples
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.release();
    }
}

/// Pick mono 16kHz when supported, else the device default
fn select_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
    let preferred = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.sample_format() == SampleFormat::F32
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        });

    if let Some(range) = preferred {
        let supported = range.with_sample_rate(SampleRate(SAMPLE_RATE));
        return Ok((supported.config(), supported.sample_format()));
    }

    let supported = device
        .default_input_config()
        .map_err(|e| Error::Audio(e.to_string()))?;
    tracing::debug!(
        sample_rate = supported.sample_rate().0,
        channels = supported.channels(),
        format = ?supported.sample_format(),
        "16kHz mono unsupported, using device default"
    );
    Ok((supported.config(), supported.sample_format()))
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    format: SampleFormat,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> Result<Stream> {
    let channels = usize::from(config.channels.max(1));
    let on_error = |err: cpal::StreamError| tracing::error!(error = %err, "audio capture error");

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_frames(&buffer, data, channels, |s| s);
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_frames(&buffer, data, channels, |s| f32::from(s) / 32768.0);
            },
            on_error,
            None,
        ),
        other => {
            return Err(Error::Audio(format!("unsupported sample format {other:?}")));
        }
    };

    stream.map_err(|e| Error::Audio(e.to_string()))
}

/// Down-mix interleaved frames to mono and append to the shared buffer
#[allow(clippy::cast_precision_loss)]
fn push_frames<T: Copy>(
    buffer: &Arc<Mutex<Vec<f32>>>,
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> f32,
) {
    if let Ok(mut buf) = buffer.lock() {
        if channels == 1 {
            buf.extend(data.iter().map(|&s| convert(s)));
        } else {
            buf.extend(
                data.chunks(channels)
                    .map(|frame| frame.iter().map(|&s| convert(s)).sum::<f32>() / frame.len() as f32),
            );
        }
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
