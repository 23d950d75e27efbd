//! rdev-backed implementations of [`EventChannel`].
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! Each channel owns such a thread plus a stop flag; `stop()` (or drop)
//! sets the flag so the callback silently ignores further events.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  Setting the stop flag
//! prevents events from being forwarded, but the OS thread itself remains
//! blocked in the rdev event loop until the process exits.  This is safe —
//! rdev holds no resources that need explicit cleanup.
//!
//! # De-duplication
//!
//! Some platforms re-deliver the same hardware notification to multiple
//! listeners.  Each channel remembers the platform timestamp of the last
//! forwarded event and drops any event carrying the identical timestamp.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::UNIX_EPOCH;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{ChannelError, EventChannel, LogicalKey, ModifierKey, RawKeyEvent};

/// Sentinel meaning "no event forwarded yet".
const NO_TIMESTAMP: u64 = u64::MAX;

/// Platform event time as an opaque nanosecond count.
fn platform_timestamp(event: &rdev::Event) -> u64 {
    event
        .time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Spawn the shared listener thread.
///
/// `classify` maps a raw rdev event to `(logical key, pressed)` or `None`
/// for events this channel does not care about.  Everything else —
/// stop-flag check, timestamp de-duplication, forwarding — is identical
/// across channels.
fn spawn_listener<F>(
    thread_name: &str,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<RawKeyEvent>,
    classify: F,
) -> Result<(), ChannelError>
where
    F: Fn(&rdev::EventType) -> Option<(LogicalKey, bool)> + Send + 'static,
{
    std::thread::Builder::new()
        .name(thread_name.into())
        .spawn(move || {
            let last_timestamp = AtomicU64::new(NO_TIMESTAMP);

            let result = rdev::listen(move |event| {
                if stop.load(Ordering::Relaxed) {
                    return;
                }

                let Some((key, pressed)) = classify(&event.event_type) else {
                    return;
                };

                let source_timestamp = platform_timestamp(&event);
                if last_timestamp.load(Ordering::Relaxed) == source_timestamp {
                    // The platform re-delivered the same notification.
                    return;
                }
                last_timestamp.store(source_timestamp, Ordering::Relaxed);

                // blocking_send is safe to call from non-async threads.
                let _ = tx.blocking_send(RawKeyEvent {
                    key,
                    pressed,
                    timestamp: Instant::now(),
                    source_timestamp,
                });
            });

            if let Err(e) = result {
                log::error!("input listener: rdev::listen exited with error: {e:?}");
            }
        })
        .map_err(|e| ChannelError::ThreadSpawn(e.to_string()))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// ModifierChannel
// ---------------------------------------------------------------------------

/// Forwards press/release of one configured modifier key.
pub struct ModifierChannel {
    key: ModifierKey,
    stop: Option<Arc<AtomicBool>>,
}

impl ModifierChannel {
    pub fn new(key: ModifierKey) -> Self {
        Self { key, stop: None }
    }
}

impl EventChannel for ModifierChannel {
    fn start(&mut self, tx: mpsc::Sender<RawKeyEvent>) -> Result<(), ChannelError> {
        if self.stop.is_some() {
            return Err(ChannelError::AlreadyRunning);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let watched = self.key.rdev_key();
        let logical = LogicalKey::Modifier(self.key);

        spawn_listener("modifier-listener", Arc::clone(&stop), tx, move |ev| {
            match ev {
                rdev::EventType::KeyPress(k) if *k == watched => Some((logical, true)),
                rdev::EventType::KeyRelease(k) if *k == watched => Some((logical, false)),
                _ => None,
            }
        })?;

        self.stop = Some(stop);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

impl Drop for ModifierChannel {
    fn drop(&mut self) {
        EventChannel::stop(self);
    }
}

// ---------------------------------------------------------------------------
// ShortcutChannel
// ---------------------------------------------------------------------------

/// Forwards press/release of one custom global shortcut key.
///
/// The re-trigger cooldown lives in the session controller, not here — this
/// channel only normalises and de-duplicates.
pub struct ShortcutChannel {
    key: rdev::Key,
    slot: LogicalKey,
    stop: Option<Arc<AtomicBool>>,
}

impl ShortcutChannel {
    /// `slot` must be [`LogicalKey::CustomShortcut1`] or
    /// [`LogicalKey::CustomShortcut2`].
    pub fn new(key: rdev::Key, slot: LogicalKey) -> Self {
        debug_assert!(matches!(
            slot,
            LogicalKey::CustomShortcut1 | LogicalKey::CustomShortcut2
        ));
        Self {
            key,
            slot,
            stop: None,
        }
    }
}

impl EventChannel for ShortcutChannel {
    fn start(&mut self, tx: mpsc::Sender<RawKeyEvent>) -> Result<(), ChannelError> {
        if self.stop.is_some() {
            return Err(ChannelError::AlreadyRunning);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let watched = self.key;
        let logical = self.slot;

        spawn_listener("shortcut-listener", Arc::clone(&stop), tx, move |ev| {
            match ev {
                rdev::EventType::KeyPress(k) if *k == watched => Some((logical, true)),
                rdev::EventType::KeyRelease(k) if *k == watched => Some((logical, false)),
                _ => None,
            }
        })?;

        self.stop = Some(stop);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

impl Drop for ShortcutChannel {
    fn drop(&mut self) {
        EventChannel::stop(self);
    }
}

// ---------------------------------------------------------------------------
// MiddleMouseChannel
// ---------------------------------------------------------------------------

/// Forwards press/release of the middle mouse button.
///
/// The activation delay that separates deliberate holds from accidental
/// scroll-wheel clicks lives in the session controller.
pub struct MiddleMouseChannel {
    stop: Option<Arc<AtomicBool>>,
}

impl MiddleMouseChannel {
    pub fn new() -> Self {
        Self { stop: None }
    }
}

impl Default for MiddleMouseChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel for MiddleMouseChannel {
    fn start(&mut self, tx: mpsc::Sender<RawKeyEvent>) -> Result<(), ChannelError> {
        if self.stop.is_some() {
            return Err(ChannelError::AlreadyRunning);
        }

        let stop = Arc::new(AtomicBool::new(false));

        spawn_listener("middle-mouse-listener", Arc::clone(&stop), tx, |ev| {
            match ev {
                rdev::EventType::ButtonPress(rdev::Button::Middle) => {
                    Some((LogicalKey::MiddleMouse, true))
                }
                rdev::EventType::ButtonRelease(rdev::Button::Middle) => {
                    Some((LogicalKey::MiddleMouse, false))
                }
                _ => None,
            }
        })?;

        self.stop = Some(stop);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

impl Drop for MiddleMouseChannel {
    fn drop(&mut self) {
        EventChannel::stop(self);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_report_not_running_until_started() {
        // `start` would grab the real input devices, so these tests only
        // exercise the state handling around it.
        let mut ch = ModifierChannel::new(ModifierKey::Fn);
        ch.stop(); // stop before start is a no-op
        assert!(ch.stop.is_none());

        let mut ch = MiddleMouseChannel::new();
        EventChannel::stop(&mut ch);
        assert!(ch.stop.is_none());
    }

    #[test]
    fn platform_timestamp_is_stable_for_equal_times() {
        let now = std::time::SystemTime::now();
        let a = rdev::Event {
            time: now,
            name: None,
            event_type: rdev::EventType::KeyPress(rdev::Key::F9),
        };
        let b = rdev::Event {
            time: now,
            name: None,
            event_type: rdev::EventType::KeyRelease(rdev::Key::F9),
        };
        assert_eq!(platform_timestamp(&a), platform_timestamp(&b));
    }
}
