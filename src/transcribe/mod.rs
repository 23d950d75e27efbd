//! Transcription service seam.
//!
//! The core does not implement speech-to-text; it hands finalized 16 kHz
//! mono buffers to whatever implements [`Transcriber`].  The trait is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn Transcriber>` and called from a blocking worker thread.
//!
//! [`StubTranscriber`] is a placeholder backend that echoes buffer metadata
//! so the full capture → session → result pipeline can be exercised
//! end-to-end before a real model is attached.

pub mod segments;

pub use segments::{slice_spans, EnergySegmenter, SpeechSegmenter, SpeechSpan};

use thiserror::Error;

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

/// All errors a transcription backend can surface to the core.
#[derive(Debug, Clone, Error)]
pub enum TranscribeError {
    /// The backend has no model loaded (not downloaded, still warming up).
    #[error("transcription model is not loaded")]
    ModelNotLoaded,

    /// The supplied buffer cannot be transcribed (empty, wrong format).
    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    /// The backend failed during inference.
    #[error("transcription backend failed: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a speech-to-text backend.
///
/// # Contract
///
/// - `samples` is **16 kHz, mono, f32** PCM.
/// - An empty buffer returns `Err(TranscribeError::InvalidAudio)`.
pub trait Transcriber: Send + Sync {
    /// Transcribe `samples` and return the text transcript.
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError>;
}

// Compile-time assertion: Box<dyn Transcriber> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

// ---------------------------------------------------------------------------
// StubTranscriber
// ---------------------------------------------------------------------------

/// Echo-style placeholder backend.
///
/// Returns a deterministic description of the buffer instead of real text,
/// which is enough to watch the session pipeline run end-to-end.
pub struct StubTranscriber;

impl Transcriber for StubTranscriber {
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError> {
        if samples.is_empty() {
            return Err(TranscribeError::InvalidAudio("empty buffer".into()));
        }
        log::debug!("stub transcriber: {} samples", samples.len());
        Ok(format!(
            "[{} samples, ~{:.1}s @ 16 kHz]",
            samples.len(),
            samples.len() as f32 / 16_000.0
        ))
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// A test double that returns a pre-configured response.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<String, TranscribeError>,
}

#[cfg(test)]
impl MockTranscriber {
    /// Create a mock that always returns `Ok(text)`.
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
        }
    }

    /// Create a mock that always returns `Err(error)`.
    pub fn err(error: TranscribeError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[cfg(test)]
impl Transcriber for MockTranscriber {
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError> {
        // Enforce the empty-buffer contract even in the mock so callers are
        // tested against it.
        if samples.is_empty() {
            return Err(TranscribeError::InvalidAudio("empty buffer".into()));
        }
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_describes_buffer() {
        let text = StubTranscriber.transcribe(&vec![0.0; 16_000]).unwrap();
        assert!(text.contains("16000 samples"), "got: {text}");
        assert!(text.contains("1.0s"), "got: {text}");
    }

    #[test]
    fn stub_rejects_empty_buffer() {
        assert!(matches!(
            StubTranscriber.transcribe(&[]),
            Err(TranscribeError::InvalidAudio(_))
        ));
    }

    #[test]
    fn mock_ok_returns_configured_text() {
        let t = MockTranscriber::ok("hello");
        assert_eq!(t.transcribe(&[0.0; 100]).unwrap(), "hello");
    }

    #[test]
    fn mock_err_returns_configured_error() {
        let t = MockTranscriber::err(TranscribeError::ModelNotLoaded);
        assert!(matches!(
            t.transcribe(&[0.0; 100]).unwrap_err(),
            TranscribeError::ModelNotLoaded
        ));
    }

    #[test]
    fn box_dyn_transcriber_compiles() {
        // If this test compiles, the trait is object-safe.
        let t: Box<dyn Transcriber> = Box::new(MockTranscriber::ok("ok"));
        let _ = t.transcribe(&[0.0; 10]);
    }

    #[test]
    fn error_display_is_descriptive() {
        assert!(TranscribeError::ModelNotLoaded.to_string().contains("model"));
        assert!(TranscribeError::InvalidAudio("empty buffer".into())
            .to_string()
            .contains("empty buffer"));
    }
}
