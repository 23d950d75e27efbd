//! Push-to-talk input-disambiguation and audio-capture core.
//!
//! This crate turns a stream of raw keyboard/mouse events and a stream of
//! raw microphone samples into discrete dictation-session commands and
//! well-formed 16 kHz mono audio buffers.
//!
//! # Architecture
//!
//! ```text
//! rdev listener threads ──RawKeyEvent──▶ SessionController ──▶ SessionCommand
//!   (modifier / custom       (mpsc)      │  (tap windows,       (mpsc, to UI)
//!    shortcut / middle                   │   debounce,
//!    mouse channels)                     │   state machine)
//!                                        │
//! cpal audio callback ──▶ SampleBuffer ◀─┤ start / stop capture
//!                     └──▶ AudioMeter    └─▶ Transcriber / Enhancer
//!                          (watch, to UI)     (spawned tasks)
//! ```
//!
//! The [`session::SessionController`] is the single writer of all session
//! state; input channels and timers only post messages into its control
//! loop.  The [`audio::SampleBuffer`] is the one object shared with the
//! real-time audio callback, guarded by a single mutex.

pub mod audio;
pub mod config;
pub mod enhance;
pub mod input;
pub mod session;
pub mod transcribe;
