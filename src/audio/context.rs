use std::collections::VecDeque;

use super::node_graph::nodes::DestinationNode;
use super::node_graph::{AudioGraph, NodeIndex, CHANNELS};

/// A node graph plus its destination, rendered in fixed quanta
///
/// Drives both the output device (arbitrary callback sizes) and offline
/// bounces.
#[derive(Debug)]
pub struct AudioContext {
    graph: AudioGraph,
    destination: NodeIndex,
    /// Rendered samples not yet handed out
    pending: VecDeque<f32>,
    frames_rendered: u64,
}

impl AudioContext {
    pub fn new(sample_rate: u32) -> Self {
        let mut graph = AudioGraph::new(sample_rate);
        let destination = graph.add_node(Box::new(DestinationNode::new("destination")));
        Self {
            graph,
            destination,
            pending: VecDeque::new(),
            frames_rendered: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut AudioGraph {
        &mut self.graph
    }

    pub fn destination(&self) -> NodeIndex {
        self.destination
    }

    /// Seconds of audio produced so far
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate() as f64
    }

    /// Fill `output` with interleaved stereo, processing as many quanta as needed
    pub fn render(&mut self, output: &mut [f32]) {
        let mut written = 0;
        while written < output.len() {
            if self.pending.is_empty() {
                self.graph.process();
                self.frames_rendered += super::node_graph::RENDER_QUANTUM as u64;
                if let Some(quantum) = self.graph.output(self.destination) {
                    self.pending.extend(quantum.iter().copied());
                }
                if self.pending.is_empty() {
                    output[written..].fill(0.0);
                    return;
                }
            }
            let take = self.pending.len().min(output.len() - written);
            for (dst, src) in output[written..written + take].iter_mut().zip(self.pending.drain(..take)) {
                *dst = src;
            }
            written += take;
        }
    }

    /// Render `frames` frames into a new interleaved buffer
    pub fn render_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * CHANNELS];
        self.render(&mut out);
        out
    }
}
