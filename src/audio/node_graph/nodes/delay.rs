use crate::audio::node_graph::types::RENDER_QUANTUM;
use crate::audio::node_graph::{AudioNode, Parameter, ParameterUnit};

pub const PARAM_DELAY_TIME: u32 = 0;

/// Stereo delay line
///
/// Feedback is not internal: a feedback edge (typically through a gain
/// node) brings the delayed signal back. That edge arrives one quantum
/// late, so the node writes it into the history it already emitted, and
/// clamps its delay to at least one quantum while a loop is attached.
pub struct DelayNode {
    name: String,
    delay_time: f32, // seconds
    max_delay: f32,

    // Ring buffers for left and right channels
    buffer_left: Vec<f32>,
    buffer_right: Vec<f32>,
    write_position: usize,
    sample_rate: u32,

    parameters: Vec<Parameter>,
}

impl DelayNode {
    pub fn new(name: impl Into<String>, max_delay: f32, sample_rate: u32) -> Self {
        let parameters = vec![Parameter::new(
            PARAM_DELAY_TIME,
            "Delay Time",
            0.0,
            max_delay,
            0.0,
            ParameterUnit::Time,
        )];

        let len = Self::buffer_len(max_delay, sample_rate);

        Self {
            name: name.into(),
            delay_time: 0.0,
            max_delay,
            buffer_left: vec![0.0; len],
            buffer_right: vec![0.0; len],
            write_position: 0,
            sample_rate,
            parameters,
        }
    }

    fn buffer_len(max_delay: f32, sample_rate: u32) -> usize {
        (max_delay * sample_rate as f32).ceil() as usize + 2 * RENDER_QUANTUM + 2
    }

    /// Linear interpolation between the two history samples around `delay` frames ago
    fn read(buffer: &[f32], write_position: usize, delay: f32) -> f32 {
        let len = buffer.len();
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let newer = buffer[(write_position + len - whole) % len];
        if frac == 0.0 {
            return newer;
        }
        let older = buffer[(write_position + len - whole - 1) % len];
        newer + (older - newer) * frac
    }
}

impl AudioNode for DelayNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == PARAM_DELAY_TIME {
            self.delay_time = value;
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_DELAY_TIME => self.delay_time,
            _ => 0.0,
        }
    }

    fn accepts_feedback(&self) -> bool {
        true
    }

    fn process(&mut self, input: &[f32], feedback: &[f32], output: &mut [f32], sample_rate: u32) {
        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            let len = Self::buffer_len(self.max_delay, sample_rate);
            self.buffer_left = vec![0.0; len];
            self.buffer_right = vec![0.0; len];
            self.write_position = 0;
        }

        let len = self.buffer_left.len();
        let frames = output.len() / 2;

        // The loop signal belongs to the previous quantum's positions
        if !feedback.is_empty() {
            for (i, frame) in feedback.chunks_exact(2).take(frames).enumerate() {
                let pos = (self.write_position + len - frames + i) % len;
                self.buffer_left[pos] += frame[0];
                self.buffer_right[pos] += frame[1];
            }
        }

        let min_delay = if feedback.is_empty() { 0.0 } else { RENDER_QUANTUM as f32 };
        let max_frames = (len - 2 * RENDER_QUANTUM - 2) as f32;
        let delay = (self.delay_time * sample_rate as f32).max(min_delay).min(max_frames);

        for frame in 0..frames {
            self.buffer_left[self.write_position] = input[frame * 2];
            self.buffer_right[self.write_position] = input[frame * 2 + 1];

            output[frame * 2] = Self::read(&self.buffer_left, self.write_position, delay);
            output[frame * 2 + 1] = Self::read(&self.buffer_right, self.write_position, delay);

            self.write_position = (self.write_position + 1) % len;
        }
    }

    fn reset(&mut self) {
        self.buffer_left.fill(0.0);
        self.buffer_right.fill(0.0);
        self.write_position = 0;
    }

    fn node_type(&self) -> &str {
        "Delay"
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
