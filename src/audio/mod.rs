//! Audio capture pipeline — microphone → mono downmix → 16 kHz resample →
//! shared sample buffer + level meter.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → mix_to_mono → resample_linear
//!           → SampleBuffer (mutex) + AudioMeter (watch)
//! ```
//!
//! The cpal callback runs on a real-time audio thread.  All conversion work
//! happens before the buffer lock is taken; the lock guards only the append
//! itself, and readers always receive independent copies.

pub mod buffer;
pub mod capture;
pub mod meter;
pub mod resample;

pub use buffer::SampleBuffer;
pub use capture::{AudioCapture, Capture, CaptureError};
pub use meter::AudioMeter;
pub use resample::{mix_to_mono, resample_linear};
