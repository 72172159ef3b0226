use std::sync::Arc;

use crate::audio::node_graph::{AudioNode, Parameter};
use crate::audio::playback::SharedElement;
use crate::io::AudioBuffer;

/// Pulls audio from a live playback element
pub struct MediaElementSourceNode {
    name: String,
    element: SharedElement,
    parameters: Vec<Parameter>,
}

impl MediaElementSourceNode {
    pub fn new(name: impl Into<String>, element: SharedElement) -> Self {
        Self {
            name: name.into(),
            element,
            parameters: vec![],
        }
    }
}

impl AudioNode for MediaElementSourceNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, _id: u32, _value: f32) {}

    fn get_parameter(&self, _id: u32) -> f32 {
        0.0
    }

    fn accepts_input(&self) -> bool {
        false
    }

    fn process(&mut self, _input: &[f32], _feedback: &[f32], output: &mut [f32], _sample_rate: u32) {
        self.element.lock().read_quantum(output);
    }

    fn reset(&mut self) {}

    fn node_type(&self) -> &str {
        "MediaElementSource"
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

/// Plays a decoded buffer once from the moment it is started (offline bounce)
pub struct BufferSourceNode {
    name: String,
    buffer: Arc<AudioBuffer>,
    position: usize,
    started: bool,
    parameters: Vec<Parameter>,
}

impl BufferSourceNode {
    pub fn new(name: impl Into<String>, buffer: Arc<AudioBuffer>) -> Self {
        Self {
            name: name.into(),
            buffer,
            position: 0,
            started: false,
            parameters: vec![],
        }
    }

    /// Start playback at the next quantum
    pub fn start(&mut self) {
        self.started = true;
        self.position = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.started && self.position >= self.buffer.frames()
    }
}

impl AudioNode for BufferSourceNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, _id: u32, _value: f32) {}

    fn get_parameter(&self, _id: u32) -> f32 {
        0.0
    }

    fn accepts_input(&self) -> bool {
        false
    }

    fn process(&mut self, _input: &[f32], _feedback: &[f32], output: &mut [f32], _sample_rate: u32) {
        output.fill(0.0);
        if !self.started {
            return;
        }
        self.position += self.buffer.read_frames(self.position, output);
    }

    fn reset(&mut self) {
        self.position = 0;
        self.started = false;
    }

    fn node_type(&self) -> &str {
        "BufferSource"
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
