//! Audio preprocessing applied to a finished recording before transcription.
//!
//! A pure transform: peak normalization to 0.95 followed by an 80 Hz
//! high-pass biquad to strip low-frequency rumble. Operates on an owned
//! buffer and never fails.

/// Target peak amplitude after normalization.
const NORMALIZE_PEAK: f32 = 0.95;

/// High-pass cutoff frequency in Hz.
const HIGHPASS_CUTOFF_HZ: f32 = 80.0;

/// Normalize and high-pass filter a recorded buffer in place.
pub fn preprocess(samples: &mut Vec<f32>, sample_rate: u32) {
    normalize(samples);
    highpass(samples, sample_rate, HIGHPASS_CUTOFF_HZ);
}

/// Scale the buffer so its peak amplitude is [`NORMALIZE_PEAK`].
///
/// Silent buffers are left untouched.
fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        let gain = NORMALIZE_PEAK / peak;
        for s in samples.iter_mut() {
            *s *= gain;
        }
    }
}

/// Apply a second-order high-pass biquad (Q = 0.707) in place.
fn highpass(samples: &mut [f32], sample_rate: u32, cutoff_hz: f32) {
    if samples.is_empty() || sample_rate == 0 {
        return;
    }

    let omega = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate as f32;
    let (sin_w, cos_w) = omega.sin_cos();
    let q = std::f32::consts::FRAC_1_SQRT_2;
    let alpha = sin_w / (2.0 * q);

    let b0 = (1.0 + cos_w) / 2.0;
    let b1 = -(1.0 + cos_w);
    let b2 = (1.0 + cos_w) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w;
    let a2 = 1.0 - alpha;

    let (b0, b1, b2, a1, a2) = (b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0);

    let mut x1 = 0.0f32;
    let mut x2 = 0.0f32;
    let mut y1 = 0.0f32;
    let mut y2 = 0.0f32;

    for s in samples.iter_mut() {
        let x0 = *s;
        let y0 = b0 * x0 + b1 * x1 + b2 * x2 - a1 * y1 - a2 * y2;
        x2 = x1;
        x1 = x0;
        y2 = y1;
        y1 = y0;
        *s = y0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scales_to_peak() {
        let mut samples = vec![0.1, -0.5, 0.25];
        normalize(&mut samples);
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!((peak - NORMALIZE_PEAK).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_silence_untouched() {
        let mut samples = vec![0.0; 100];
        normalize(&mut samples);
        assert!(samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_highpass_removes_dc_offset() {
        // A constant (0 Hz) signal should decay toward zero.
        let mut samples = vec![1.0f32; 16_000];
        highpass(&mut samples, 16_000, HIGHPASS_CUTOFF_HZ);
        let tail_energy: f32 =
            samples[8_000..].iter().map(|s| s * s).sum::<f32>() / 8_000.0;
        assert!(tail_energy < 1e-4, "tail energy {} too high", tail_energy);
    }

    #[test]
    fn test_highpass_preserves_speech_band() {
        // A 1 kHz tone is well above the cutoff and should keep most of
        // its energy.
        let sample_rate = 16_000u32;
        let mut samples: Vec<f32> = (0..16_000)
            .map(|i| {
                (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / sample_rate as f32).sin()
            })
            .collect();
        let input_energy: f32 = samples.iter().map(|s| s * s).sum();

        highpass(&mut samples, sample_rate, HIGHPASS_CUTOFF_HZ);
        let output_energy: f32 = samples.iter().map(|s| s * s).sum();

        assert!(output_energy > input_energy * 0.9);
    }

    #[test]
    fn test_preprocess_empty_buffer() {
        let mut samples: Vec<f32> = Vec::new();
        preprocess(&mut samples, 16_000);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_preprocess_full_pipeline() {
        let mut samples: Vec<f32> = (0..1_600)
            .map(|i| 0.2 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin())
            .collect();
        preprocess(&mut samples, 16_000);
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.0);
        assert!(peak <= 1.0);
    }
}
