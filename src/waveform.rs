//! Waveform and pulse-timing generation.
//!
//! Everything in this module is a pure function of its inputs: no device
//! I/O, no hidden state. Buffers are generated once per burst, written once
//! to the output device, and never mutated after that.
//!
//! Sampling convention: `n = floor(sample_rate * duration)` points over the
//! half-open interval `[0, duration)`, with `t_i = i / sample_rate`. The
//! endpoint is excluded so back-to-back bursts tile without a repeated
//! sample.

use std::f64::consts::TAU;

/// A sampled analog waveform plus the rate it was sampled at.
///
/// The sample rate travels with the buffer so the output device can derive
/// its clock configuration from the data it is handed.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformBuffer {
    samples: Vec<f64>,
    sample_rate: f64,
}

impl WaveformBuffer {
    /// Wrap raw samples with their sample rate.
    pub fn new(samples: Vec<f64>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Sample values in device voltage units.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Samples per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration at the buffer's sample rate, in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Append the trailing 20% of the buffer to its own end.
    ///
    /// Covers the trigger-chain startup latency: the output device begins
    /// consuming samples slightly before the shared clock reaches the
    /// acquisition window, so the sweep needs extra material at the tail.
    pub fn extended_for_trigger_latency(mut self) -> Self {
        let tail = (0.2 * self.samples.len() as f64).floor() as usize;
        let keep_from = self.samples.len() - tail;
        self.samples.extend_from_within(keep_from..);
        self
    }
}

/// Generate a sinusoidal sweep between two endpoint values.
///
/// The amplitude is `(start_value - end_value) / 2` and the sequence is
/// `amplitude * sin(2π * frequency * t)`. Deterministic: identical arguments
/// produce bit-identical buffers.
pub fn generate_sine(
    start_value: f64,
    end_value: f64,
    frequency: f64,
    duration: f64,
    sample_rate: f64,
) -> WaveformBuffer {
    let amplitude = (start_value - end_value) / 2.0;
    let count = (sample_rate * duration).floor() as usize;
    let samples = (0..count)
        .map(|i| {
            let t = i as f64 / sample_rate;
            amplitude * (TAU * frequency * t).sin()
        })
        .collect();
    WaveformBuffer::new(samples, sample_rate)
}

/// Generate a triangle wave centered on zero with the given amplitude.
pub fn generate_triangle(
    amplitude: f64,
    frequency: f64,
    duration: f64,
    sample_rate: f64,
) -> WaveformBuffer {
    let count = (sample_rate * duration).floor() as usize;
    let samples = (0..count)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let phase = (t * frequency).rem_euclid(1.0);
            amplitude * (2.0 * (2.0 * (phase - 0.5)).abs()) - amplitude
        })
        .collect();
    WaveformBuffer::new(samples, sample_rate)
}

/// Generate a 50% duty-cycle square wave centered on zero.
pub fn generate_square(
    amplitude: f64,
    frequency: f64,
    duration: f64,
    sample_rate: f64,
) -> WaveformBuffer {
    let count = (sample_rate * duration).floor() as usize;
    let samples = (0..count)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let phase = (t * frequency).rem_euclid(1.0);
            if phase < 0.5 {
                amplitude
            } else {
                -amplitude
            }
        })
        .collect();
    WaveformBuffer::new(samples, sample_rate)
}

/// Generate a linear ramp where each `hold_samples`-sized block holds the
/// value the block started with.
///
/// Used to slave a slow drift channel to a faster sinusoidal trigger clock:
/// the ramp advances once per carrier period instead of once per sample.
/// If `hold_samples` does not evenly divide `n_samples`, the final hold
/// block is truncated, not padded.
pub fn generate_stepped_ramp(
    start: f64,
    stop: f64,
    n_samples: usize,
    hold_samples: usize,
) -> Vec<f64> {
    let step = if n_samples <= 1 {
        0.0
    } else {
        (stop - start) / (n_samples - 1) as f64
    };
    let mut values: Vec<f64> = (0..n_samples).map(|i| start + step * i as f64).collect();
    if hold_samples > 1 {
        let mut block_start = 0;
        while block_start < values.len() {
            let held = values[block_start];
            let block_end = usize::min(block_start + hold_samples, values.len());
            for value in &mut values[block_start..block_end] {
                *value = held;
            }
            block_start = block_end;
        }
    }
    values
}

/// Low/high durations for a hardware counter pulse channel, in seconds.
///
/// Both constructors produce a symmetric pulse train (equal low and high
/// times) with no initial delay, which is what the trigger chain expects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseTiming {
    /// Delay before the first edge, in seconds.
    pub initial_delay: f64,
    /// Time spent low per period, in seconds.
    pub low_time: f64,
    /// Time spent high per period, in seconds.
    pub high_time: f64,
}

impl PulseTiming {
    /// Camera-trigger pulse timing: half-period `1 / (2 * frequency)`.
    pub fn from_trigger_frequency(frequency: f64) -> Self {
        let half = 1.0 / (2.0 * frequency);
        Self {
            initial_delay: 0.0,
            low_time: half,
            high_time: half,
        }
    }

    /// Sample-clock pulse timing: half-period `1 / (2 * sample_rate)`.
    pub fn from_sample_rate(sample_rate: f64) -> Self {
        let half = 1.0 / (2.0 * sample_rate);
        Self {
            initial_delay: 0.0,
            low_time: half,
            high_time: half,
        }
    }

    /// Full pulse period in seconds.
    pub fn period(&self) -> f64 {
        self.low_time + self.high_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_sample_count_and_amplitude() {
        // 2 s at 2 kHz -> 4000 samples; amplitude (start - end) / 2 = -0.5.
        let wave = generate_sine(-0.5, 0.5, 200.0, 2.0, 2000.0);
        assert_eq!(wave.len(), 4000);
        assert_eq!(wave.samples()[0], 0.0);
        // Negative amplitude: the rising half of the carrier dips below zero.
        assert!(wave.samples()[2] < 0.0);
    }

    #[test]
    fn test_sine_peak_matches_amplitude() {
        // 4 samples per period puts sample 1 exactly on the carrier peak.
        let wave = generate_sine(-0.5, 0.5, 200.0, 1.0, 800.0);
        assert!((wave.samples()[1] + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sine_is_deterministic() {
        let a = generate_sine(-0.5, 0.5, 200.0, 2.0, 2000.0);
        let b = generate_sine(-0.5, 0.5, 200.0, 2.0, 2000.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sine_excludes_endpoint() {
        // One full period sampled at 4 Hz: t = 0, 0.25, 0.5, 0.75 only.
        let wave = generate_sine(1.0, -1.0, 1.0, 1.0, 4.0);
        assert_eq!(wave.len(), 4);
        assert!((wave.samples()[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_burst_extension_appends_trailing_fifth() {
        let wave = generate_sine(-0.5, 0.5, 10.0, 1.0, 100.0);
        let original = wave.samples().to_vec();
        let extended = wave.extended_for_trigger_latency();
        assert_eq!(extended.len(), 120);
        assert_eq!(&extended.samples()[..100], &original[..]);
        assert_eq!(&extended.samples()[100..], &original[80..]);
    }

    #[test]
    fn test_burst_extension_on_empty_buffer() {
        let wave = WaveformBuffer::new(Vec::new(), 1000.0).extended_for_trigger_latency();
        assert!(wave.is_empty());
    }

    #[test]
    fn test_stepped_ramp_holds_blocks() {
        let ramp = generate_stepped_ramp(0.0, 9.0, 10, 4);
        // Blocks of 4 hold their first value; the final block of 2 is truncated.
        assert_eq!(ramp, vec![0.0, 0.0, 0.0, 0.0, 4.0, 4.0, 4.0, 4.0, 8.0, 8.0]);
    }

    #[test]
    fn test_stepped_ramp_single_sample() {
        assert_eq!(generate_stepped_ramp(2.5, 7.5, 1, 3), vec![2.5]);
    }

    #[test]
    fn test_triangle_endpoints() {
        let wave = generate_triangle(0.05, 1.0, 1.0, 1000.0);
        assert_eq!(wave.len(), 1000);
        assert!((wave.samples()[0] - 0.05).abs() < 1e-9);
        // Half a period in, the triangle reaches its minimum.
        assert!((wave.samples()[500] + 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_square_levels() {
        let wave = generate_square(1.0, 2.0, 1.0, 100.0);
        assert_eq!(wave.samples()[0], 1.0);
        assert_eq!(wave.samples()[30], -1.0);
        assert_eq!(wave.samples()[60], 1.0);
    }

    #[test]
    fn test_pulse_timing_from_frequency() {
        let timing = PulseTiming::from_trigger_frequency(20.0);
        assert!((timing.low_time - 0.025).abs() < 1e-12);
        assert!((timing.high_time - 0.025).abs() < 1e-12);
        assert!((timing.period() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_pulse_timing_from_sample_rate() {
        // 10000 samples/period at 20 Hz -> 200 kHz sample clock.
        let timing = PulseTiming::from_sample_rate(10_000.0 * 20.0);
        assert!((timing.period() - 5e-6).abs() < 1e-15);
    }

    #[test]
    fn test_buffer_duration() {
        let wave = generate_sine(0.0, 1.0, 5.0, 2.0, 500.0);
        assert!((wave.duration() - 2.0).abs() < 1e-9);
    }
}
