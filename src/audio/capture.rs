//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle and feeds a
//! shared [`SampleBuffer`] at the 16 kHz mono target format.  The cpal
//! callback converts each hardware block (downmix, resample, meter) before
//! taking the buffer lock, so the lock is held only for the append.
//!
//! Start and stop are idempotent: starting while running is a no-op and
//! stopping while stopped returns an empty buffer instead of erroring.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::watch;

use super::buffer::SampleBuffer;
use super::meter::AudioMeter;
use super::resample::{mix_to_mono, resample_linear};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or starting audio capture.
///
/// All variants are transient: the caller may retry after the condition
/// clears (device freed, config changed).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// Capture trait
// ---------------------------------------------------------------------------

/// The capture operations the session controller depends on.
///
/// [`AudioCapture`] is the production implementation; tests drive the
/// controller with a mock.
pub trait Capture {
    /// Start the hardware stream into an empty buffer.
    ///
    /// A no-op when already running.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop the hardware stream and drain the captured samples.
    ///
    /// Returns an empty vector when not running.
    fn stop(&mut self) -> Vec<f32>;

    /// The shared sample buffer, for metering/streaming consumers.
    fn buffer(&self) -> &SampleBuffer;

    /// Returns `true` while the hardware stream is active.
    fn is_running(&self) -> bool;
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture built on the system default input device.
///
/// # Example
///
/// ```rust,no_run
/// use push_to_talk::audio::{AudioCapture, Capture};
///
/// let mut capture = AudioCapture::new(16_000).unwrap();
/// capture.start().unwrap();
/// // ... record ...
/// let samples = capture.stop(); // 16 kHz mono f32
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    source_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
    buffer: SampleBuffer,
    meter_tx: watch::Sender<AudioMeter>,
    stream: Option<cpal::Stream>,
}

impl AudioCapture {
    /// Create a capture for the system default input device, targeting
    /// `target_rate` Hz mono output.
    ///
    /// Queries the device's preferred stream configuration so no manual
    /// configuration is required.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn new(target_rate: u32) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let source_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let (meter_tx, _) = watch::channel(AudioMeter::default());

        Ok(Self {
            device,
            config,
            source_rate,
            channels,
            buffer: SampleBuffer::new(target_rate),
            meter_tx,
            stream: None,
        })
    }

    /// Subscribe to the live input level, updated at callback cadence.
    pub fn meter(&self) -> watch::Receiver<AudioMeter> {
        self.meter_tx.subscribe()
    }

    /// Native sample rate of the capture device in Hz.
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }
}

impl Capture for AudioCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            log::debug!("capture already running, start ignored");
            return Ok(());
        }

        self.buffer.clear();

        let buffer = self.buffer.clone();
        let meter = self.meter_tx.clone();
        let channels = self.channels;
        let source_rate = self.source_rate;
        let target_rate = self.buffer.sample_rate();

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // All conversion happens before the buffer lock is taken.
                let mono = mix_to_mono(data, channels);
                let _ = meter.send(AudioMeter::from_block(&mono));
                let resampled = resample_linear(&mono, source_rate, target_rate);
                buffer.append(&resampled);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        self.stream = Some(stream);
        log::info!(
            "capture started: {} ch @ {} Hz → mono @ {} Hz",
            channels,
            source_rate,
            target_rate
        );
        Ok(())
    }

    fn stop(&mut self) -> Vec<f32> {
        if self.stream.take().is_none() {
            log::debug!("capture not running, stop ignored");
            return Vec::new();
        }

        // Dropping the cpal stream stops the hardware callback.
        let _ = self.meter_tx.send(AudioMeter::default());
        let samples = self.buffer.take();
        log::info!(
            "capture stopped: {} samples (~{:.1}s)",
            samples.len(),
            samples.len() as f32 / self.buffer.sample_rate() as f32
        );
        samples
    }

    fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

// ---------------------------------------------------------------------------
// MockCapture  (test-only)
// ---------------------------------------------------------------------------

/// A test double with no hardware behind it.
///
/// `start` optionally fails (to exercise the error path) and otherwise
/// "delivers" a pre-configured feed into the buffer, standing in for the
/// hardware callback.
#[cfg(test)]
pub struct MockCapture {
    buffer: SampleBuffer,
    feed: Vec<f32>,
    running: bool,
    fail_start: bool,
}

#[cfg(test)]
impl MockCapture {
    /// Capture whose every recording "hears" `feed`.
    pub fn with_feed(feed: Vec<f32>) -> Self {
        Self {
            buffer: SampleBuffer::new(16_000),
            feed,
            running: false,
            fail_start: false,
        }
    }

    /// Capture that hears nothing.
    pub fn silent() -> Self {
        Self::with_feed(Vec::new())
    }

    /// Capture whose `start` always fails.
    pub fn failing() -> Self {
        Self {
            buffer: SampleBuffer::new(16_000),
            feed: Vec::new(),
            running: false,
            fail_start: true,
        }
    }
}

#[cfg(test)]
impl Capture for MockCapture {
    fn start(&mut self) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::NoDevice);
        }
        if self.running {
            return Ok(());
        }
        self.running = true;
        self.buffer.clear();
        self.buffer.append(&self.feed);
        Ok(())
    }

    fn stop(&mut self) -> Vec<f32> {
        if !self.running {
            return Vec::new();
        }
        self.running = false;
        self.buffer.take()
    }

    fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
