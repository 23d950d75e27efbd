//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Physical input bindings.
///
/// Each binding maps one physical input channel to a logical key; at most one
/// physical binding exists per logical key.  Bindings are read once at
/// startup — changing them requires a restart (or an explicit reload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Name of the modifier key used for push-to-talk
    /// (e.g. `"Fn"`, `"RightCommand"`, `"RightOption"`).
    pub modifier: String,
    /// Key name for the first custom shortcut slot (e.g. `"F9"`), or `None`
    /// when the slot is unbound.
    pub custom_shortcut_1: Option<String>,
    /// Key name for the second custom shortcut slot.
    pub custom_shortcut_2: Option<String>,
    /// Whether the middle mouse button also triggers recording.
    pub middle_mouse: bool,
    /// Milliseconds the middle button must stay down before a press is
    /// confirmed.  Releasing earlier cancels the press entirely, so a
    /// scroll-wheel click does not start a recording.
    pub middle_mouse_activation_ms: u64,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            modifier: "Fn".into(),
            custom_shortcut_1: None,
            custom_shortcut_2: None,
            middle_mouse: false,
            middle_mouse_activation_ms: 150,
        }
    }
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

/// The five timing windows that drive input disambiguation.
///
/// | Window                | Default | Applies to                         |
/// |-----------------------|---------|------------------------------------|
/// | `hands_free_threshold`| 1700 ms | press duration classification      |
/// | `multi_tap_window`    |  500 ms | max gap between counted releases   |
/// | `settle_delay`        |  150 ms | wait before committing a tap count |
/// | `modifier_debounce`   |   75 ms | fn-key flicker suppression         |
/// | `shortcut_cooldown`   |  500 ms | custom-shortcut re-trigger guard   |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// A press shorter than this enters hands-free mode on release; a longer
    /// press stops recording on release (push-to-talk).
    pub hands_free_threshold_ms: u64,
    /// Maximum interval between consecutive releases for them to count as
    /// part of the same tap sequence.
    pub multi_tap_window_ms: u64,
    /// Wait after a qualifying release before the tap count is finalised,
    /// so further taps can still extend the sequence.
    pub settle_delay_ms: u64,
    /// The fn key's state must hold steady this long before it is acted on.
    pub modifier_debounce_ms: u64,
    /// A custom shortcut press within this window of the previous accepted
    /// press is suppressed.
    pub shortcut_cooldown_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hands_free_threshold_ms: 1_700,
            multi_tap_window_ms: 500,
            settle_delay_ms: 150,
            modifier_debounce_ms: 75,
            shortcut_cooldown_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture and silence trimming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz for the capture buffer (must be 16 000 for
    /// the transcription backends this core feeds).
    pub sample_rate: u32,
    /// Whether speech segments are detected and silence trimmed before the
    /// buffer is handed to the transcriber.
    pub trim_silence: bool,
    /// RMS amplitude threshold for the energy-based segmenter (0.0 – 1.0);
    /// frames above this level are considered speech.
    pub speech_threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            trim_silence: true,
            speech_threshold: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// EnhanceConfig
// ---------------------------------------------------------------------------

/// Settings for the optional transcript post-processing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Whether transcripts are passed through an [`crate::enhance::Enhancer`]
    /// after transcription.  When disabled the session skips the `Enhancing`
    /// state entirely.
    pub enabled: bool,
    /// Maximum seconds to wait for the enhancer before falling back to the
    /// raw transcript.
    pub timeout_secs: u64,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use push_to_talk::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Physical input bindings.
    pub hotkey: HotkeyConfig,
    /// Input-disambiguation timing windows.
    pub timing: TimingConfig,
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// Transcript post-processing settings.
    pub enhance: EnhanceConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        // HotkeyConfig
        assert_eq!(original.hotkey.modifier, loaded.hotkey.modifier);
        assert_eq!(
            original.hotkey.custom_shortcut_1,
            loaded.hotkey.custom_shortcut_1
        );
        assert_eq!(original.hotkey.middle_mouse, loaded.hotkey.middle_mouse);
        assert_eq!(
            original.hotkey.middle_mouse_activation_ms,
            loaded.hotkey.middle_mouse_activation_ms
        );

        // TimingConfig
        assert_eq!(
            original.timing.hands_free_threshold_ms,
            loaded.timing.hands_free_threshold_ms
        );
        assert_eq!(
            original.timing.multi_tap_window_ms,
            loaded.timing.multi_tap_window_ms
        );
        assert_eq!(original.timing.settle_delay_ms, loaded.timing.settle_delay_ms);
        assert_eq!(
            original.timing.modifier_debounce_ms,
            loaded.timing.modifier_debounce_ms
        );
        assert_eq!(
            original.timing.shortcut_cooldown_ms,
            loaded.timing.shortcut_cooldown_ms
        );

        // AudioConfig
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(original.audio.trim_silence, loaded.audio.trim_silence);
        assert_eq!(original.audio.speech_threshold, loaded.audio.speech_threshold);

        // EnhanceConfig
        assert_eq!(original.enhance.enabled, loaded.enhance.enabled);
        assert_eq!(original.enhance.timeout_secs, loaded.enhance.timeout_secs);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.hotkey.modifier, default.hotkey.modifier);
        assert_eq!(
            config.timing.multi_tap_window_ms,
            default.timing.multi_tap_window_ms
        );
        assert_eq!(config.audio.sample_rate, default.audio.sample_rate);
    }

    /// Verify defaults carry the documented timing windows.
    #[test]
    fn default_timing_windows() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.hotkey.modifier, "Fn");
        assert_eq!(cfg.hotkey.middle_mouse_activation_ms, 150);
        assert_eq!(cfg.timing.hands_free_threshold_ms, 1_700);
        assert_eq!(cfg.timing.multi_tap_window_ms, 500);
        assert_eq!(cfg.timing.settle_delay_ms, 150);
        assert_eq!(cfg.timing.modifier_debounce_ms, 75);
        assert_eq!(cfg.timing.shortcut_cooldown_ms, 500);
        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert!(!cfg.enhance.enabled);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.hotkey.modifier = "RightCommand".into();
        cfg.hotkey.custom_shortcut_1 = Some("F9".into());
        cfg.hotkey.middle_mouse = true;
        cfg.hotkey.middle_mouse_activation_ms = 250;
        cfg.timing.hands_free_threshold_ms = 2_000;
        cfg.timing.multi_tap_window_ms = 400;
        cfg.audio.trim_silence = false;
        cfg.enhance.enabled = true;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.hotkey.modifier, "RightCommand");
        assert_eq!(loaded.hotkey.custom_shortcut_1.as_deref(), Some("F9"));
        assert!(loaded.hotkey.middle_mouse);
        assert_eq!(loaded.hotkey.middle_mouse_activation_ms, 250);
        assert_eq!(loaded.timing.hands_free_threshold_ms, 2_000);
        assert_eq!(loaded.timing.multi_tap_window_ms, 400);
        assert!(!loaded.audio.trim_silence);
        assert!(loaded.enhance.enabled);
    }
}
