use crate::audio::node_graph::{AudioNode, Parameter, ParameterUnit};
use std::f32::consts::FRAC_PI_2;

pub const PARAM_PAN: u32 = 0;

/// Equal-power stereo panner for stereo input
///
/// Panning left folds part of the right channel into the left and
/// attenuates the right (and vice versa). Center leaves both channels as
/// they are.
pub struct StereoPannerNode {
    name: String,
    pan: f32,
    parameters: Vec<Parameter>,
}

impl StereoPannerNode {
    pub fn new(name: impl Into<String>) -> Self {
        let parameters = vec![Parameter::new(PARAM_PAN, "Pan", -1.0, 1.0, 0.0, ParameterUnit::Generic)];

        Self {
            name: name.into(),
            pan: 0.0,
            parameters,
        }
    }
}

impl AudioNode for StereoPannerNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == PARAM_PAN {
            self.pan = value;
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_PAN => self.pan,
            _ => 0.0,
        }
    }

    fn process(&mut self, input: &[f32], _feedback: &[f32], output: &mut [f32], _sample_rate: u32) {
        let pan = self.pan;
        let x = if pan <= 0.0 { pan + 1.0 } else { pan };
        let gain_l = (x * FRAC_PI_2).cos();
        let gain_r = (x * FRAC_PI_2).sin();

        for (out, frame) in output.chunks_exact_mut(2).zip(input.chunks_exact(2)) {
            let (left_in, right_in) = (frame[0], frame[1]);
            if pan <= 0.0 {
                out[0] = left_in + right_in * gain_l;
                out[1] = right_in * gain_r;
            } else {
                out[0] = left_in * gain_l;
                out[1] = right_in + left_in * gain_r;
            }
        }
    }

    fn reset(&mut self) {}

    fn node_type(&self) -> &str {
        "StereoPanner"
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
