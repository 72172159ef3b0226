use crate::audio::node_graph::{AudioNode, Parameter, ParameterUnit};
use crate::dsp::{BiquadFilter, FilterKind};

pub const PARAM_FREQUENCY: u32 = 0;
pub const PARAM_Q: u32 = 1;
pub const PARAM_GAIN: u32 = 2;

/// Single EQ band (low shelf, peak or high shelf)
pub struct BiquadFilterNode {
    name: String,
    kind: FilterKind,
    frequency: f32,
    q: f32,
    gain_db: f32,
    filter: BiquadFilter,
    sample_rate: u32,
    dirty: bool,
    parameters: Vec<Parameter>,
}

impl BiquadFilterNode {
    pub fn new(name: impl Into<String>, kind: FilterKind, frequency: f32, q: f32) -> Self {
        let parameters = vec![
            Parameter::new(PARAM_FREQUENCY, "Frequency", 10.0, 22050.0, frequency, ParameterUnit::Frequency),
            Parameter::new(PARAM_Q, "Q", 0.0001, 1000.0, q, ParameterUnit::Generic),
            Parameter::new(PARAM_GAIN, "Gain", -40.0, 40.0, 0.0, ParameterUnit::Decibels),
        ];

        Self {
            name: name.into(),
            kind,
            frequency,
            q,
            gain_db: 0.0,
            filter: BiquadFilter::new(),
            sample_rate: 0,
            dirty: true,
            parameters,
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    fn update_coefficients(&mut self) {
        self.filter
            .set(self.kind, self.frequency, self.q, self.gain_db, self.sample_rate as f32);
        self.dirty = false;
    }
}

impl AudioNode for BiquadFilterNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        match id {
            PARAM_FREQUENCY => self.frequency = value,
            PARAM_Q => self.q = value,
            PARAM_GAIN => self.gain_db = value,
            _ => return,
        }
        self.dirty = true;
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_FREQUENCY => self.frequency,
            PARAM_Q => self.q,
            PARAM_GAIN => self.gain_db,
            _ => 0.0,
        }
    }

    fn process(&mut self, input: &[f32], _feedback: &[f32], output: &mut [f32], sample_rate: u32) {
        if self.dirty || self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.update_coefficients();
        }

        output.copy_from_slice(&input[..output.len()]);
        self.filter.process_stereo(output);
    }

    fn reset(&mut self) {
        self.filter.reset();
    }

    fn node_type(&self) -> &str {
        "BiquadFilter"
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
