//! Speech-segment detection seam and buffer slicing.
//!
//! A [`SpeechSegmenter`] reports where speech occurs inside a sample buffer;
//! the core only consumes its black-box span output and slices its own
//! buffer with [`slice_spans`] to drop silence before transcription.
//! Removing silence shortens inference and keeps backends from
//! hallucinating text during quiet periods.
//!
//! [`EnergySegmenter`] is the built-in RMS-threshold implementation; a
//! model-based detector can be dropped in behind the same trait.

// ---------------------------------------------------------------------------
// SpeechSpan / SpeechSegmenter
// ---------------------------------------------------------------------------

/// One detected span of speech, in seconds from the buffer start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechSpan {
    pub start: f32,
    pub end: f32,
}

/// Object-safe, thread-safe interface to a voice-activity detector.
pub trait SpeechSegmenter: Send + Sync {
    /// Detect speech spans in 16 kHz mono `samples`.
    ///
    /// Spans are returned in ascending order and do not overlap.  An empty
    /// result means no speech was found.
    fn detect_speech_segments(&self, samples: &[f32]) -> Vec<SpeechSpan>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechSegmenter>) {}
};

// ---------------------------------------------------------------------------
// slice_spans
// ---------------------------------------------------------------------------

/// Concatenate the parts of `samples` covered by `spans`.
///
/// Span boundaries are converted to sample indices at `sample_rate` and
/// clamped to the buffer, so a detector reporting slightly-out-of-range
/// times cannot cause a panic.
pub fn slice_spans(samples: &[f32], spans: &[SpeechSpan], sample_rate: u32) -> Vec<f32> {
    let mut out = Vec::new();
    for span in spans {
        if span.end <= span.start {
            continue;
        }
        let start = ((span.start * sample_rate as f32) as usize).min(samples.len());
        let end = ((span.end * sample_rate as f32) as usize).min(samples.len());
        out.extend_from_slice(&samples[start..end]);
    }
    out
}

// ---------------------------------------------------------------------------
// EnergySegmenter
// ---------------------------------------------------------------------------

/// RMS-threshold speech detector.
///
/// Audio is split into 30 ms frames (480 samples @ 16 kHz); a frame whose
/// RMS exceeds the threshold is voice.  Runs of consecutive voice frames
/// become spans.
///
/// # Example
///
/// ```rust
/// use push_to_talk::transcribe::{EnergySegmenter, SpeechSegmenter};
///
/// let seg = EnergySegmenter::new(0.01);
///
/// // 30 ms silence, 30 ms voice, 30 ms silence
/// let mut audio = vec![0.0_f32; 480];
/// audio.extend(vec![0.5_f32; 480]);
/// audio.extend(vec![0.0_f32; 480]);
///
/// let spans = seg.detect_speech_segments(&audio);
/// assert_eq!(spans.len(), 1);
/// assert!((spans[0].start - 0.03).abs() < 1e-3);
/// assert!((spans[0].end - 0.06).abs() < 1e-3);
/// ```
pub struct EnergySegmenter {
    /// RMS amplitude threshold; frames below this are considered silence.
    rms_threshold: f32,
    /// Frame size in samples.  480 samples = 30 ms at 16 kHz.
    frame_size: usize,
    sample_rate: u32,
}

impl EnergySegmenter {
    /// Create a segmenter with the given RMS threshold for 16 kHz audio.
    ///
    /// A typical threshold is `0.01` for quiet microphones; use
    /// `0.02`–`0.05` in noisy environments.
    pub fn new(rms_threshold: f32) -> Self {
        Self {
            rms_threshold,
            frame_size: 480, // 30 ms at 16 kHz
            sample_rate: 16_000,
        }
    }

    fn is_voice_frame(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mean_sq: f32 = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        mean_sq.sqrt() > self.rms_threshold
    }
}

impl SpeechSegmenter for EnergySegmenter {
    fn detect_speech_segments(&self, samples: &[f32]) -> Vec<SpeechSpan> {
        let mut spans = Vec::new();
        let mut current_start: Option<usize> = None;

        let total_frames = samples.len().div_ceil(self.frame_size);
        for i in 0..total_frames {
            let s = i * self.frame_size;
            let e = ((i + 1) * self.frame_size).min(samples.len());
            let voice = self.is_voice_frame(&samples[s..e]);

            match (voice, current_start) {
                (true, None) => current_start = Some(s),
                (false, Some(start)) => {
                    spans.push(SpeechSpan {
                        start: start as f32 / self.sample_rate as f32,
                        end: s as f32 / self.sample_rate as f32,
                    });
                    current_start = None;
                }
                _ => {}
            }
        }

        if let Some(start) = current_start {
            spans.push(SpeechSpan {
                start: start as f32 / self.sample_rate as f32,
                end: samples.len() as f32 / self.sample_rate as f32,
            });
        }

        spans
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
