//! Session state enum and observable publication.
//!
//! [`SessionState`] is the single high-level mode of the dictation session.
//! Exactly one instance exists, owned and mutated only by the
//! [`crate::session::SessionController`]; everyone else observes it through
//! a `tokio::sync::watch` receiver.

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// High-level mode of the dictation session.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──start-capture──▶ Recording
///      ◀─────────────────┤ stop-capture (empty buffer)
/// Recording ──stop-capture──▶ Transcribing
/// Transcribing ──completion──▶ Idle | Enhancing
/// Enhancing ──completion──▶ Idle
/// Idle ◀──dismiss── Error ◀──unrecoverable fault── any state
/// Idle ⇄ Busy   (external long-running operation)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for input; a press starts recording.
    Idle,

    /// Microphone is live; samples accumulate in the capture buffer.
    Recording,

    /// The finalized buffer is with the transcription backend.
    Transcribing,

    /// The raw transcript is with the post-processing backend.
    Enhancing,

    /// An unrelated long-running operation (e.g. a model download) holds
    /// the session; behaves like `Transcribing` for gating purposes.
    Busy,

    /// An unrecoverable fault occurred.  The next press dismisses it.
    Error,
}

impl SessionState {
    /// Returns `true` while no new recording may start but tap counting
    /// must still proceed.
    pub fn is_occupied(&self) -> bool {
        matches!(
            self,
            SessionState::Transcribing | SessionState::Enhancing | SessionState::Busy
        )
    }

    /// A short human-readable label suitable for a status display.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Transcribing => "Transcribing",
            SessionState::Enhancing => "Enhancing",
            SessionState::Busy => "Busy",
            SessionState::Error => "Error",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
