//! Channel mixing and sample-rate conversion.
//!
//! Transcription backends expect **16 kHz mono `f32`** audio while capture
//! devices deliver whatever they like (commonly 44.1/48 kHz, 1–2 channels).
//! This module provides the two conversion steps:
//!
//! 1. [`mix_to_mono`] — average interleaved channels down to one.
//! 2. [`resample_linear`] — convert between sample rates by linear
//!    interpolation.
//!
//! The linear resampler is fast enough to run inside the audio callback and
//! good enough for speech.  For higher fidelity swap the inner loop for the
//! `rubato` crate (`SincFixedIn` + `BlackmanHarris2` window) — rubato is
//! already listed in `Cargo.toml` for that upgrade path.

// ---------------------------------------------------------------------------
// mix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all
/// channels of each frame.
///
/// The output length is `samples.len() / channels`.
///
/// * `channels == 1` returns the input as an owned `Vec` unchanged.
/// * `channels == 0` returns an empty vector.
///
/// # Example
///
/// ```rust
/// use push_to_talk::audio::mix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = mix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!(mono[0].abs() < 1e-6);
/// assert!(mono[1].abs() < 1e-6);
/// ```
pub fn mix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample `samples` from `source_rate` to `target_rate` Hz using linear
/// interpolation.
///
/// * Equal rates return the input cloned unchanged (no interpolation).
/// * Empty input returns an empty vector.
///
/// The output length is `round(len · target_rate / source_rate)` within
/// one sample.
///
/// # Example
///
/// ```rust
/// use push_to_talk::audio::resample_linear;
///
/// // Downsample 48 kHz → 16 kHz (ratio 1/3)
/// let hi = vec![0.5_f32; 480];
/// let lo = resample_linear(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
