//! Alert tone synthesis.

/// Tone frequency in Hz.
pub const TONE_FREQUENCY_HZ: f32 = 1000.0;
/// Tone length in milliseconds.
pub const TONE_DURATION_MS: u64 = 300;
/// Peak amplitude, half of full scale.
pub const TONE_AMPLITUDE: f32 = 0.5;

/// Synthesize one alert beep: a 300 ms, 1 kHz sine at half amplitude,
/// mono f32 at the given sample rate.
pub fn alert_tone(sample_rate: u32) -> Vec<f32> {
    let total = (u64::from(sample_rate) * TONE_DURATION_MS / 1000) as usize;
    (0..total)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * TONE_FREQUENCY_HZ * t).sin() * TONE_AMPLITUDE
        })
        .collect()
}
