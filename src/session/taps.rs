//! Multi-tap counting and press-duration classification.
//!
//! Pure state, no timers: the controller owns the settle scheduling and
//! calls [`TapSequence::commit`] when the settle delay elapses
//! uninterrupted.

use std::time::Duration;

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// TapSequence
// ---------------------------------------------------------------------------

/// Counts key releases that fall inside the multi-tap window.
///
/// A release within `window` of the previous release extends the sequence;
/// a later release starts a new one.  Committing reads the final count and
/// resets, so one burst of taps yields exactly one commit.
#[derive(Debug, Default)]
pub struct TapSequence {
    release_count: u32,
    last_release: Option<Instant>,
}

impl TapSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release at `now` and return the updated count.
    pub fn register(&mut self, now: Instant, window: Duration) -> u32 {
        match self.last_release {
            Some(prev) if now.duration_since(prev) < window => self.release_count += 1,
            _ => self.release_count = 1,
        }
        self.last_release = Some(now);
        self.release_count
    }

    /// Final count at settle time; resets the sequence.
    pub fn commit(&mut self) -> u32 {
        let count = self.release_count;
        self.reset();
        count
    }

    /// Abandon the current sequence.
    pub fn reset(&mut self) {
        self.release_count = 0;
        self.last_release = None;
    }

    /// Current count (0 when no sequence is active).
    pub fn count(&self) -> u32 {
        self.release_count
    }
}

// ---------------------------------------------------------------------------
// PressSession
// ---------------------------------------------------------------------------

/// Per key-down-to-key-up lifecycle.
///
/// Records whether this press started a recording, so the release knows
/// whether the hands-free / push-to-talk classification applies.
#[derive(Debug, Clone, Copy)]
pub struct PressSession {
    /// `true` when the key-down of this press transitioned Idle → Recording.
    pub started_recording: bool,
    /// When the key went down.
    pub pressed_at: Instant,
}

impl PressSession {
    pub fn new(pressed_at: Instant, started_recording: bool) -> Self {
        Self {
            started_recording,
            pressed_at,
        }
    }

    /// Returns `true` when the press was shorter than `threshold` — the
    /// release enters hands-free mode instead of stopping the recording.
    pub fn is_brief(&self, released_at: Instant, threshold: Duration) -> bool {
        released_at.duration_since(self.pressed_at) < threshold
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
