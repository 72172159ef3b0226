use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ImpulseConfig;

/// Stereo impulse response used by every track's reverb send
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    /// Exponentially decaying white noise:
    /// `sample[i] = (rand * 2 - 1) * ((len - i) / len)^decay`
    pub fn synthetic<R: Rng>(sample_rate: u32, duration_secs: f32, decay: f32, rng: &mut R) -> Self {
        let length = (sample_rate as f32 * duration_secs.max(0.0)) as usize;
        let mut channel = || -> Vec<f32> {
            (0..length)
                .map(|i| {
                    let n = (length - i) as f32;
                    (rng.gen::<f32>() * 2.0 - 1.0) * (n / length as f32).powf(decay)
                })
                .collect()
        };
        let left = channel();
        let right = channel();

        Self {
            left,
            right,
            sample_rate,
        }
    }

    /// Build from config, seeding the noise if a seed is configured
    pub fn from_config(config: &ImpulseConfig, sample_rate: u32) -> Self {
        match config.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                Self::synthetic(sample_rate, config.duration_secs, config.decay, &mut rng)
            }
            None => Self::synthetic(sample_rate, config.duration_secs, config.decay, &mut rand::thread_rng()),
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Equal-power normalisation factor applied by convolvers.
    ///
    /// Scales the impulse so that its RMS maps to a fixed calibration level,
    /// adjusted for sample rate.
    pub fn normalization_scale(&self) -> f32 {
        const GAIN_CALIBRATION: f32 = 0.00125;
        const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
        const MIN_POWER: f32 = 0.000125;

        if self.is_empty() {
            return 1.0;
        }

        let energy: f64 = self
            .left
            .iter()
            .chain(self.right.iter())
            .map(|s| (*s as f64) * (*s as f64))
            .sum();
        let mut power = (energy / (2.0 * self.len() as f64)).sqrt() as f32;
        if !power.is_finite() || power < MIN_POWER {
            power = MIN_POWER;
        }

        (1.0 / power) * GAIN_CALIBRATION * GAIN_CALIBRATION_SAMPLE_RATE / self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_and_envelope() {
        let mut rng = StdRng::seed_from_u64(1);
        let ir = ImpulseResponse::synthetic(8000, 2.0, 2.0, &mut rng);
        assert_eq!(ir.len(), 16000);
        assert_eq!(ir.right.len(), 16000);

        // Amplitude never exceeds the envelope
        for (i, s) in ir.left.iter().enumerate() {
            let envelope = ((16000 - i) as f32 / 16000.0).powi(2);
            assert!(s.abs() <= envelope + 1e-6);
        }
        assert_ne!(ir.left, ir.right);
    }

    #[test]
    fn seeded_config_is_deterministic() {
        let config = ImpulseConfig {
            seed: Some(99),
            duration_secs: 0.1,
            ..ImpulseConfig::default()
        };
        assert_eq!(ImpulseResponse::from_config(&config, 8000), ImpulseResponse::from_config(&config, 8000));
    }

    #[test]
    fn silent_impulse_uses_minimum_power() {
        let ir = ImpulseResponse {
            left: vec![0.0; 10],
            right: vec![0.0; 10],
            sample_rate: 44100,
        };
        assert!((ir.normalization_scale() - 10.0).abs() < 1e-3);
    }
}
