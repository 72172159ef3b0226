use crate::audio::node_graph::{AudioNode, Parameter, ParameterUnit};

pub const PARAM_GAIN: u32 = 0;

const MAX_GAIN: f32 = 4.0;

/// Linear gain stage. Also used as a summing point: all inputs are mixed
/// before the gain is applied.
pub struct GainNode {
    name: String,
    gain: f32,
    parameters: Vec<Parameter>,
}

impl GainNode {
    pub fn new(name: impl Into<String>, gain: f32) -> Self {
        let parameters = vec![Parameter::new(PARAM_GAIN, "Gain", 0.0, MAX_GAIN, 1.0, ParameterUnit::Generic)];

        Self {
            name: name.into(),
            gain: gain.clamp(0.0, MAX_GAIN),
            parameters,
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl AudioNode for GainNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == PARAM_GAIN {
            self.gain = value;
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_GAIN => self.gain,
            _ => 0.0,
        }
    }

    fn process(&mut self, input: &[f32], _feedback: &[f32], output: &mut [f32], _sample_rate: u32) {
        for (out, sample) in output.iter_mut().zip(input) {
            *out = sample * self.gain;
        }
    }

    fn reset(&mut self) {}

    fn node_type(&self) -> &str {
        "Gain"
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
