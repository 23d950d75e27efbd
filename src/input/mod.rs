//! Physical input normalisation.
//!
//! Three heterogeneous input channels — modifier keys, custom global
//! shortcuts, and the middle mouse button — are normalised into a single
//! stream of [`RawKeyEvent`]s.  Each channel implements [`EventChannel`] and
//! forwards into one shared `tokio::sync::mpsc` sender, so the session
//! controller depends only on the event stream, never on the input mechanism.
//!
//! # Usage
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use push_to_talk::input::{EventChannel, ModifierKey, RawKeyEvent};
//! use push_to_talk::input::channels::ModifierChannel;
//!
//! let (tx, mut rx) = mpsc::channel::<RawKeyEvent>(64);
//! let mut channel = ModifierChannel::new(ModifierKey::Fn);
//! channel.start(tx).expect("listener thread");
//!
//! // In your async loop:
//! // while let Some(ev) = rx.recv().await { ... }
//! ```

pub mod channels;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// ModifierKey
// ---------------------------------------------------------------------------

/// The closed set of modifier keys that can be bound to push-to-talk.
///
/// Each variant carries a fixed hardware key code — these are configuration
/// constants, not runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    /// The fn / globe key.  Its hardware signal flickers on key repeat, so
    /// the controller debounces it before acting.
    Fn,
    RightCommand,
    RightOption,
    RightControl,
    CapsLock,
}

impl ModifierKey {
    /// All bindable modifiers, for settings UIs and validation.
    pub const ALL: [ModifierKey; 5] = [
        ModifierKey::Fn,
        ModifierKey::RightCommand,
        ModifierKey::RightOption,
        ModifierKey::RightControl,
        ModifierKey::CapsLock,
    ];

    /// Fixed hardware key code for this modifier.
    pub fn code(self) -> u16 {
        match self {
            ModifierKey::Fn => 63,
            ModifierKey::RightCommand => 54,
            ModifierKey::RightOption => 61,
            ModifierKey::RightControl => 62,
            ModifierKey::CapsLock => 57,
        }
    }

    /// The `rdev` key this modifier is reported as.
    pub fn rdev_key(self) -> rdev::Key {
        match self {
            ModifierKey::Fn => rdev::Key::Function,
            ModifierKey::RightCommand => rdev::Key::MetaRight,
            ModifierKey::RightOption => rdev::Key::AltGr,
            ModifierKey::RightControl => rdev::Key::ControlRight,
            ModifierKey::CapsLock => rdev::Key::CapsLock,
        }
    }

    /// Returns `true` when this key's raw signal needs flicker debouncing
    /// before the controller may act on it.
    pub fn needs_debounce(self) -> bool {
        matches!(self, ModifierKey::Fn)
    }

    /// Config-file name of this modifier.
    pub fn name(self) -> &'static str {
        match self {
            ModifierKey::Fn => "Fn",
            ModifierKey::RightCommand => "RightCommand",
            ModifierKey::RightOption => "RightOption",
            ModifierKey::RightControl => "RightControl",
            ModifierKey::CapsLock => "CapsLock",
        }
    }

    /// Parse a modifier name from a config string.
    ///
    /// Returns `None` for unrecognised names so callers can fall back to a
    /// default or display an error to the user.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }
}

// ---------------------------------------------------------------------------
// LogicalKey
// ---------------------------------------------------------------------------

/// Identifier for one logical input binding.
///
/// At most one physical binding maps to a given `LogicalKey` at a time;
/// the mapping comes from [`crate::config::HotkeyConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    /// One of the named modifier keys.
    Modifier(ModifierKey),
    /// The first user-configurable shortcut slot.
    CustomShortcut1,
    /// The second user-configurable shortcut slot.
    CustomShortcut2,
    /// The middle mouse button.
    MiddleMouse,
}

impl LogicalKey {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            LogicalKey::Modifier(m) => m.name(),
            LogicalKey::CustomShortcut1 => "shortcut-1",
            LogicalKey::CustomShortcut2 => "shortcut-2",
            LogicalKey::MiddleMouse => "middle-mouse",
        }
    }
}

// ---------------------------------------------------------------------------
// RawKeyEvent
// ---------------------------------------------------------------------------

/// One normalised press or release from any input channel.
#[derive(Debug, Clone)]
pub struct RawKeyEvent {
    /// Which logical binding produced the event.
    pub key: LogicalKey,
    /// `true` for press, `false` for release.
    pub pressed: bool,
    /// Monotonic arrival time, used for all duration arithmetic.
    pub timestamp: Instant,
    /// Opaque platform event time.  Used only to drop re-delivered events;
    /// never compared across channels.
    pub source_timestamp: u64,
}

// ---------------------------------------------------------------------------
// EventChannel
// ---------------------------------------------------------------------------

/// One physical input mechanism normalised to [`RawKeyEvent`]s.
///
/// `start` spawns whatever platform machinery the channel needs and begins
/// forwarding events on `tx`; `stop` makes the channel discard further
/// events.  Channels may share a single `tx` — the controller treats the
/// merged stream uniformly.
pub trait EventChannel {
    /// Begin forwarding events.  Returns [`ChannelError::AlreadyRunning`]
    /// when called twice without an intervening `stop`.
    fn start(&mut self, tx: mpsc::Sender<RawKeyEvent>) -> Result<(), ChannelError>;

    /// Stop forwarding events.  Idempotent.
    fn stop(&mut self);
}

/// Errors that can occur while starting an input channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("input channel is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a shortcut key name from a config string into an [`rdev::Key`].
///
/// Supports F1–F12, common named keys, and single ASCII letters in either
/// case.  Returns `None` for unrecognised names.
///
/// # Examples
///
/// ```
/// use push_to_talk::input::parse_key;
///
/// assert_eq!(parse_key("F9"),     Some(rdev::Key::F9));
/// assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("a"),      Some(rdev::Key::KeyA));
/// assert_eq!(parse_key("xyz"),    None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;

    let key = match name {
        "F1" => F1,
        "F2" => F2,
        "F3" => F3,
        "F4" => F4,
        "F5" => F5,
        "F6" => F6,
        "F7" => F7,
        "F8" => F8,
        "F9" => F9,
        "F10" => F10,
        "F11" => F11,
        "F12" => F12,
        "Escape" | "Esc" => Escape,
        "Space" => Space,
        "Return" | "Enter" => Return,
        "Tab" => Tab,
        "Backspace" => Backspace,
        "Delete" | "Del" => Delete,
        "Home" => Home,
        "End" => End,
        "PageUp" => PageUp,
        "PageDown" => PageDown,
        "UpArrow" | "Up" => UpArrow,
        "DownArrow" | "Down" => DownArrow,
        "LeftArrow" | "Left" => LeftArrow,
        "RightArrow" | "Right" => RightArrow,
        "PrintScreen" => PrintScreen,
        "Pause" => Pause,
        other => return parse_letter(other),
    };
    Some(key)
}

/// Single ASCII letter, either case.
fn parse_letter(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;

    let mut chars = name.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    let key = match c.to_ascii_uppercase() {
        'A' => KeyA,
        'B' => KeyB,
        'C' => KeyC,
        'D' => KeyD,
        'E' => KeyE,
        'F' => KeyF,
        'G' => KeyG,
        'H' => KeyH,
        'I' => KeyI,
        'J' => KeyJ,
        'K' => KeyK,
        'L' => KeyL,
        'M' => KeyM,
        'N' => KeyN,
        'O' => KeyO,
        'P' => KeyP,
        'Q' => KeyQ,
        'R' => KeyR,
        'S' => KeyS,
        'T' => KeyT,
        'U' => KeyU,
        'V' => KeyV,
        'W' => KeyW,
        'X' => KeyX,
        'Y' => KeyY,
        'Z' => KeyZ,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
