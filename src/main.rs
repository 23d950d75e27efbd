//! Application entry point — headless push-to-talk daemon.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Open the default input device ([`AudioCapture`]).
//! 5. Build the [`SessionController`] with the configured services.
//! 6. Start the input channels (modifier / shortcuts / middle mouse).
//! 7. Run the control loop on the main thread until ctrl-c.
//!
//! The controller future is not `Send` (it owns the cpal stream), so it
//! runs under `block_on` on the main thread; everything that must happen
//! concurrently is a spawned task posting messages into its control loop.

use std::sync::Arc;

use tokio::sync::mpsc;

use push_to_talk::{
    audio::AudioCapture,
    config::AppConfig,
    input::{
        channels::{MiddleMouseChannel, ModifierChannel, ShortcutChannel},
        parse_key, EventChannel, LogicalKey, ModifierKey, RawKeyEvent,
    },
    session::{ControlMessage, SessionConfig, SessionController, SessionResult},
    transcribe::{EnergySegmenter, SpeechSegmenter, StubTranscriber, Transcriber},
};

// ---------------------------------------------------------------------------
// Input channel setup
// ---------------------------------------------------------------------------

/// Build the input channels selected by `config` and start them all into
/// one shared event sender.
///
/// The returned channels must stay alive for the program's lifetime;
/// dropping one stops its event forwarding.
fn start_input_channels(
    config: &AppConfig,
    tx: mpsc::Sender<RawKeyEvent>,
) -> anyhow::Result<Vec<Box<dyn EventChannel>>> {
    let mut channels: Vec<Box<dyn EventChannel>> = Vec::new();

    let modifier = ModifierKey::parse(&config.hotkey.modifier).unwrap_or_else(|| {
        log::warn!(
            "unknown modifier {:?} in settings, falling back to Fn",
            config.hotkey.modifier
        );
        ModifierKey::Fn
    });
    channels.push(Box::new(ModifierChannel::new(modifier)));

    let slots = [
        (&config.hotkey.custom_shortcut_1, LogicalKey::CustomShortcut1),
        (&config.hotkey.custom_shortcut_2, LogicalKey::CustomShortcut2),
    ];
    for (binding, slot) in slots {
        if let Some(name) = binding {
            match parse_key(name) {
                Some(key) => channels.push(Box::new(ShortcutChannel::new(key, slot))),
                None => log::warn!("unknown shortcut key {name:?} in settings, slot unbound"),
            }
        }
    }

    if config.hotkey.middle_mouse {
        channels.push(Box::new(MiddleMouseChannel::new()));
    }

    for channel in &mut channels {
        channel.start(tx.clone())?;
    }

    Ok(channels)
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("push-to-talk starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Audio capture
    let capture = AudioCapture::new(config.audio.sample_rate)?;
    let meter = capture.meter();

    // 5. Session controller
    let transcriber: Arc<dyn Transcriber> = Arc::new(StubTranscriber);
    let segmenter: Option<Arc<dyn SpeechSegmenter>> = if config.audio.trim_silence {
        Some(Arc::new(EnergySegmenter::new(config.audio.speech_threshold)))
    } else {
        None
    };

    let (controller, handle) = SessionController::new(
        SessionConfig::from_app(&config),
        capture,
        transcriber,
        segmenter,
        None, // no enhancer backend wired in the headless daemon
    );

    // 6. Input channels
    let (key_tx, mut key_rx) = mpsc::channel::<RawKeyEvent>(64);
    let _channels = start_input_channels(&config, key_tx)?;

    // 7. Control loop
    rt.block_on(async move {
        let control = handle.control.clone();
        let mut commands = handle.commands;
        let mut results = handle.results;
        let mut state = handle.state;

        // Forward raw input events into the control loop.
        tokio::spawn(async move {
            while let Some(ev) = key_rx.recv().await {
                if control.send(ControlMessage::Key(ev)).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                log::info!("command: {command:?}");
            }
        });

        tokio::spawn(async move {
            while let Some(result) = results.recv().await {
                match result {
                    SessionResult::Transcript(text) => println!("{text}"),
                    SessionResult::Failed(message) => log::error!("session failed: {message}"),
                }
            }
        });

        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                log::info!("state: {}", *state.borrow());
            }
        });

        // Periodic input-level readout while recording.
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(500));
            loop {
                ticker.tick().await;
                let level = *meter.borrow();
                if level.peak_power > 0.0 {
                    log::debug!(
                        "input level: avg {:.2}, peak {:.2}",
                        level.average_power,
                        level.peak_power
                    );
                }
            }
        });

        tokio::select! {
            _ = controller.run() => {
                log::warn!("control loop ended on its own");
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("ctrl-c received, shutting down");
            }
        }
    });

    Ok(())
}
