//! Append-only sample buffer shared between the audio callback and readers.
//!
//! [`SampleBuffer`] holds mono `f32` samples at a fixed target rate.  The
//! audio callback appends; any other thread reads.  Every read operation
//! returns an independent copy, so a reader's view can never be invalidated
//! by a concurrent append, and the single mutex is held only for the copy
//! or append itself.
//!
//! # Example
//!
//! ```rust
//! use push_to_talk::audio::SampleBuffer;
//!
//! let buf = SampleBuffer::new(16_000);
//! buf.append(&[0.1, 0.2, 0.3]);
//!
//! let all = buf.snapshot();
//! assert_eq!(all, vec![0.1, 0.2, 0.3]);
//!
//! // Incremental consumption: read everything after an index.
//! buf.append(&[0.4]);
//! assert_eq!(buf.from_index(3), vec![0.4]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

/// Growable mono sample buffer behind a single mutex.
///
/// Cloning is cheap (`Arc` clone) and yields a handle to the same storage,
/// which is how the capture callback and the session controller share it.
#[derive(Clone)]
pub struct SampleBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create an empty buffer for samples at `sample_rate` Hz.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            sample_rate,
        }
    }

    /// Sample rate of the stored audio in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn lock(&self) -> MutexGuard<'_, Vec<f32>> {
        match self.samples.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock cannot leave the Vec in a
            // torn state (append/copy only), so keep going with the data.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append samples.  Called from the audio callback; do any conversion
    /// work before calling so the lock is held only for the copy.
    pub fn append(&self, samples: &[f32]) {
        self.lock().extend_from_slice(samples);
    }

    /// Copy of the entire buffer.
    pub fn snapshot(&self) -> Vec<f32> {
        self.lock().clone()
    }

    /// Copy of the trailing `window_ms` milliseconds.
    ///
    /// Returns the whole buffer when it is shorter than the window.
    pub fn tail(&self, window_ms: u64) -> Vec<f32> {
        let want = (self.sample_rate as u64 * window_ms / 1_000) as usize;
        let guard = self.lock();
        let start = guard.len().saturating_sub(want);
        guard[start..].to_vec()
    }

    /// Copy from `start` to the current end, for chunked consumption.
    ///
    /// A `start` at or past the end yields an empty vector.
    pub fn from_index(&self, start: usize) -> Vec<f32> {
        let guard = self.lock();
        if start >= guard.len() {
            return Vec::new();
        }
        guard[start..].to_vec()
    }

    /// Number of samples currently stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stored duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f32 / self.sample_rate as f32
    }

    /// Discard all samples.  Does not affect whether capture is running.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drain the buffer: returns all samples and leaves it empty, under a
    /// single lock acquisition.
    pub fn take(&self) -> Vec<f32> {
        std::mem::take(&mut *self.lock())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
