//! Session control — state machine, tap counting, disambiguation timers.
//!
//! [`SessionController`] is the single writer of all session state; see its
//! module docs for the disambiguation rules.  [`SessionState`] is published
//! over a `watch` channel for UI binding, and resolved [`SessionCommand`]s
//! stream over an `mpsc`.

pub mod controller;
pub mod state;
pub mod taps;
pub mod timer;

pub use controller::{
    ControlMessage, SessionCommand, SessionConfig, SessionController, SessionHandle,
    SessionResult,
};
pub use state::SessionState;
pub use taps::{PressSession, TapSequence};
pub use timer::CancellableTimer;
