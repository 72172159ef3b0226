use std::f32::consts::PI;

/// Shelf/peak response of an EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowShelf,
    Peaking,
    HighShelf,
}

/// Biquad filter implementation (2-pole IIR filter)
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
///
/// Coefficients follow the RBJ audio EQ cookbook with shelf slope S = 1, so a
/// band at 0 dB collapses to b = a and passes the signal through unchanged.
#[derive(Clone, Debug)]
pub struct BiquadFilter {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    // Direct Form II Transposed state, one pair per channel
    s1: [f32; 2],
    s2: [f32; 2],
}

impl BiquadFilter {
    /// Create a new biquad filter with unity gain (pass-through)
    pub fn new() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            s1: [0.0; 2],
            s2: [0.0; 2],
        }
    }

    /// Create a filter of the given kind
    ///
    /// # Arguments
    /// * `frequency` - Corner (shelf) or center (peak) frequency in Hz
    /// * `q` - Quality factor, only used by the peaking band
    /// * `gain_db` - Boost or cut in decibels
    /// * `sample_rate` - Sample rate in Hz
    pub fn with_kind(kind: FilterKind, frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let mut filter = Self::new();
        filter.set(kind, frequency, q, gain_db, sample_rate);
        filter
    }

    /// Recompute coefficients, keeping the filter state
    pub fn set(&mut self, kind: FilterKind, frequency: f32, q: f32, gain_db: f32, sample_rate: f32) {
        match kind {
            FilterKind::LowShelf => self.set_low_shelf(frequency, gain_db, sample_rate),
            FilterKind::Peaking => self.set_peaking(frequency, q, gain_db, sample_rate),
            FilterKind::HighShelf => self.set_high_shelf(frequency, gain_db, sample_rate),
        }
    }

    /// Set coefficients for a low-shelf filter
    pub fn set_low_shelf(&mut self, frequency: f32, gain_db: f32, sample_rate: f32) {
        let omega = 2.0 * PI * clamp_frequency(frequency, sample_rate) / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let a_gain = 10.0_f32.powf(gain_db / 40.0);
        let sqrt_a = a_gain.sqrt();
        // Shelf slope S = 1
        let alpha = sin_omega / 2.0 * 2.0_f32.sqrt();

        let a0 = (a_gain + 1.0) + (a_gain - 1.0) * cos_omega + 2.0 * sqrt_a * alpha;
        self.b0 = a_gain * ((a_gain + 1.0) - (a_gain - 1.0) * cos_omega + 2.0 * sqrt_a * alpha) / a0;
        self.b1 = 2.0 * a_gain * ((a_gain - 1.0) - (a_gain + 1.0) * cos_omega) / a0;
        self.b2 = a_gain * ((a_gain + 1.0) - (a_gain - 1.0) * cos_omega - 2.0 * sqrt_a * alpha) / a0;
        self.a1 = -2.0 * ((a_gain - 1.0) + (a_gain + 1.0) * cos_omega) / a0;
        self.a2 = ((a_gain + 1.0) + (a_gain - 1.0) * cos_omega - 2.0 * sqrt_a * alpha) / a0;
    }

    /// Set coefficients for a high-shelf filter
    pub fn set_high_shelf(&mut self, frequency: f32, gain_db: f32, sample_rate: f32) {
        let omega = 2.0 * PI * clamp_frequency(frequency, sample_rate) / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let a_gain = 10.0_f32.powf(gain_db / 40.0);
        let sqrt_a = a_gain.sqrt();
        let alpha = sin_omega / 2.0 * 2.0_f32.sqrt();

        let a0 = (a_gain + 1.0) - (a_gain - 1.0) * cos_omega + 2.0 * sqrt_a * alpha;
        self.b0 = a_gain * ((a_gain + 1.0) + (a_gain - 1.0) * cos_omega + 2.0 * sqrt_a * alpha) / a0;
        self.b1 = -2.0 * a_gain * ((a_gain - 1.0) + (a_gain + 1.0) * cos_omega) / a0;
        self.b2 = a_gain * ((a_gain + 1.0) + (a_gain - 1.0) * cos_omega - 2.0 * sqrt_a * alpha) / a0;
        self.a1 = 2.0 * ((a_gain - 1.0) - (a_gain + 1.0) * cos_omega) / a0;
        self.a2 = ((a_gain + 1.0) - (a_gain - 1.0) * cos_omega - 2.0 * sqrt_a * alpha) / a0;
    }

    /// Set coefficients for a peaking EQ filter
    pub fn set_peaking(&mut self, frequency: f32, q: f32, gain_db: f32, sample_rate: f32) {
        let omega = 2.0 * PI * clamp_frequency(frequency, sample_rate) / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let a_gain = 10.0_f32.powf(gain_db / 40.0);
        let alpha = sin_omega / (2.0 * q.max(1e-4));

        let a0 = 1.0 + alpha / a_gain;
        self.b0 = (1.0 + alpha * a_gain) / a0;
        self.b1 = (-2.0 * cos_omega) / a0;
        self.b2 = (1.0 - alpha * a_gain) / a0;
        self.a1 = (-2.0 * cos_omega) / a0;
        self.a2 = (1.0 - alpha / a_gain) / a0;
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, input: f32, channel: usize) -> f32 {
        let channel = channel.min(1);

        let output = self.b0 * input + self.s1[channel];
        self.s1[channel] = self.b1 * input - self.a1 * output + self.s2[channel];
        self.s2[channel] = self.b2 * input - self.a2 * output;

        output
    }

    /// Process a buffer of interleaved stereo samples in place
    pub fn process_stereo(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            frame[0] = self.process_sample(frame[0], 0);
            frame[1] = self.process_sample(frame[1], 1);
        }
    }

    /// Reset filter state (clear delay lines)
    pub fn reset(&mut self) {
        self.s1 = [0.0; 2];
        self.s2 = [0.0; 2];
    }
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the corner strictly inside (0, nyquist)
fn clamp_frequency(frequency: f32, sample_rate: f32) -> f32 {
    frequency.clamp(1.0, sample_rate * 0.5 - 1.0)
}
