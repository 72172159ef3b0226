use crate::audio::node_graph::{AudioNode, Parameter};

/// Final sink of a context. Sums its inputs; the context reads its output.
pub struct DestinationNode {
    name: String,
    parameters: Vec<Parameter>,
}

impl DestinationNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: vec![],
        }
    }
}

impl AudioNode for DestinationNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, _id: u32, _value: f32) {}

    fn get_parameter(&self, _id: u32) -> f32 {
        0.0
    }

    fn process(&mut self, input: &[f32], _feedback: &[f32], output: &mut [f32], _sample_rate: u32) {
        output.copy_from_slice(&input[..output.len()]);
    }

    fn reset(&mut self) {}

    fn node_type(&self) -> &str {
        "Destination"
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
