use std::sync::Arc;

use crate::audio::node_graph::types::RENDER_QUANTUM;
use crate::audio::node_graph::{AudioNode, Parameter, ParameterUnit};
use crate::dsp::{ConvolutionKernel, ImpulseResponse, PartitionedConvolver};

pub const PARAM_ACTIVE: u32 = 0;

/// Filter spectra of a stereo impulse response, computed once and shared
/// by every convolver that uses it
pub struct ReverbKernel {
    left: Arc<ConvolutionKernel>,
    right: Arc<ConvolutionKernel>,
}

impl ReverbKernel {
    pub fn new(impulse: &ImpulseResponse, normalize: bool) -> Self {
        let scale = if normalize { impulse.normalization_scale() } else { 1.0 };
        let scaled = |taps: &[f32]| -> Vec<f32> { taps.iter().map(|s| s * scale).collect() };

        Self {
            left: Arc::new(ConvolutionKernel::new(&scaled(&impulse.left))),
            right: Arc::new(ConvolutionKernel::new(&scaled(&impulse.right))),
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Stereo convolution reverb: left input through the left impulse channel,
/// right through the right.
///
/// While inactive the node outputs silence without convolving, so a track
/// with no reverb send costs nothing.
pub struct ConvolverNode {
    name: String,
    active: bool,
    left: PartitionedConvolver,
    right: PartitionedConvolver,
    left_in: Vec<f32>,
    right_in: Vec<f32>,
    left_out: Vec<f32>,
    right_out: Vec<f32>,
    parameters: Vec<Parameter>,
}

impl ConvolverNode {
    pub fn new(name: impl Into<String>, kernel: &ReverbKernel) -> Self {
        let parameters = vec![Parameter::new(PARAM_ACTIVE, "Active", 0.0, 1.0, 1.0, ParameterUnit::Toggle)];

        Self {
            name: name.into(),
            active: true,
            left: PartitionedConvolver::new(kernel.left.clone()),
            right: PartitionedConvolver::new(kernel.right.clone()),
            left_in: vec![0.0; RENDER_QUANTUM],
            right_in: vec![0.0; RENDER_QUANTUM],
            left_out: vec![0.0; RENDER_QUANTUM],
            right_out: vec![0.0; RENDER_QUANTUM],
            parameters,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl AudioNode for ConvolverNode {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn set_parameter(&mut self, id: u32, value: f32) {
        if id == PARAM_ACTIVE {
            let active = value >= 0.5;
            if active && !self.active {
                // Don't replay a tail from before the send was muted
                self.left.reset();
                self.right.reset();
            }
            self.active = active;
        }
    }

    fn get_parameter(&self, id: u32) -> f32 {
        match id {
            PARAM_ACTIVE => {
                if self.active {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    fn process(&mut self, input: &[f32], _feedback: &[f32], output: &mut [f32], _sample_rate: u32) {
        if !self.active {
            output.fill(0.0);
            return;
        }

        for (i, frame) in input.chunks_exact(2).take(RENDER_QUANTUM).enumerate() {
            self.left_in[i] = frame[0];
            self.right_in[i] = frame[1];
        }

        self.left.process(&self.left_in, &mut self.left_out);
        self.right.process(&self.right_in, &mut self.right_out);

        for (i, out) in output.chunks_exact_mut(2).take(RENDER_QUANTUM).enumerate() {
            out[0] = self.left_out[i];
            out[1] = self.right_out[i];
        }
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn node_type(&self) -> &str {
        "Convolver"
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
