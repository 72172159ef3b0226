use crate::audio::node_graph::{AudioNode, Parameter, ParameterUnit};

pub const PARAM_THRESHOLD: u32 = 0;
pub const PARAM_KNEE: u32 = 1;
pub const PARAM_RATIO: u32 = 2;
pub const PARAM_ATTACK: u32 = 3;
pub const PARAM_RELEASE: u32 = 4;

/// Stereo-linked dynamics compressor
///
/// Used twice on the master bus: once as the compressor and once, with a
/// high ratio and short attack, as the limiter. With ratio 1 the gain stays
/// at unity.
pub struct DynamicsCompressorNode {
    name: String,
    threshold_db: f32,
    knee_db: f32,
    ratio: f32,
    attack: f32,  // seconds
    release: f32, // seconds

    // State
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: u32,
    /// Most recent gain reduction in dB (<= 0)
    reduction_db: f32,

    parameters: Vec<Parameter>,
}

impl DynamicsCompressorNode {
    pub fn new(name: impl Into<String>, sample_rate: u32) -> Self {
        let parameters = vec![
            Parameter::new(PARAM_THRESHOLD, "Threshold", -100.0, 0.0, -24.0, ParameterUnit::Decibels),
            Parameter::new(PARAM_KNEE, "Knee", 0.0, 40.0, 30.0, ParameterUnit::Decibels),
            Parameter::new(PARAM_RATIO, "Ratio", 1.0, 20.0, 12.0, ParameterUnit::Generic),
            Parameter::new(PARAM_ATTACK, "Attack", 0.0, 1.0, 0.003, ParameterUnit::Time),
            Parameter::new(PARAM_RELEASE, "Release", 0.0, 1.0, 0.25, ParameterUnit::Time),
        ];

        let mut node = Self {
            name: name.into(),
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
            envelope: 1.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
            reduction_db: 0.0,
            parameters,
        };
        node.update_coefficients();
        node
    }

    /// Current gain reduction in dB
    pub fn reduction(&self) -> f32 {
        self.reduction_db
    }

    /// Convert a time constant to an exponential smoothing coefficient
    fn time_to_coeff(seconds: f32, sample_rate: u32) -> f32 {
        let samples = seconds * sample_rate as f32;
        if samples <= 0.0 {
            return 0.0;
        }
        (-1.0 / samples).exp()
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = Self::time_to_coeff(self.attack, self.sample_rate);
        self.release_coeff = Self::time_to_coeff(self.release, self.sample_rate);
    }

    fn linear_to_db(linear: f32) -> f32 {
        if linear > 0.0 {
            20.0 * linear.log10()
        } else {
            -160.0
        }
    }

    fn db_to_linear(db: f32) -> f32 {
        10.0_f32.powf(db / 20.0)
    }

    /// Gain reduction in dB (positive) for a given input level
    fn gain_reduction(&self, input_db: f32) -> f32 {
        let threshold = self.threshold_db;
        let knee = self.knee_db;
        let slope = 1.0 - 1.0 / self.ratio;

        if input_db < threshold - knee / 2.0 {
            0.0
        } else if knee <= 0.0 || input_db > threshold + knee / 2.0 {
            (input_db - threshold) * slope
        } else {
            // Quadratic soft knee
            let overshoot = input_db - threshold + knee / 2.0;
            overshoot * overshoot / (2.0 * knee) * slope
        }
    }
}

impl AudioNode for DynamicsCompressorNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        match id {
            PARAM_THRESHOLD => self.threshold_db = value,
            PARAM_KNEE => self.knee_db = value,
            PARAM_RATIO => self.ratio = value,
            PARAM_ATTACK => {
                self.attack = value;
                self.update_coefficients();
            }
            PARAM_RELEASE => {
                self.release = value;
                self.update_coefficients();
            }
            _ => {}
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_THRESHOLD => self.threshold_db,
            PARAM_KNEE => self.knee_db,
            PARAM_RATIO => self.ratio,
            PARAM_ATTACK => self.attack,
            PARAM_RELEASE => self.release,
            _ => 0.0,
        }
    }

    fn process(&mut self, input: &[f32], _feedback: &[f32], output: &mut [f32], sample_rate: u32) {
        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.update_coefficients();
        }

        for (out, frame) in output.chunks_exact_mut(2).zip(input.chunks_exact(2)) {
            // Linked detection keeps the stereo image stable
            let level = frame[0].abs().max(frame[1].abs());
            let target = Self::db_to_linear(-self.gain_reduction(Self::linear_to_db(level)));

            let coeff = if target < self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = target + coeff * (self.envelope - target);

            out[0] = frame[0] * self.envelope;
            out[1] = frame[1] * self.envelope;
        }

        self.reduction_db = Self::linear_to_db(self.envelope).min(0.0);
    }

    fn reset(&mut self) {
        self.envelope = 1.0;
        self.reduction_db = 0.0;
    }

    fn node_type(&self) -> &str {
        "DynamicsCompressor"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
