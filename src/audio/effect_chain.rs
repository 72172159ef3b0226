//! Per-track effect chain construction and parameter projection
//!
//! ```text
//! source -> eq low -> eq mid -> eq high -+-> delay dry ------------------+-> delay merge
//!                                        +-> delay -+-> delay wet -------+
//!                                                   +-> delay feedback --(feedback)--> delay
//!
//! delay merge -+-> reverb dry ----------------+-> reverb merge -> analyser -> panner -> gain
//!              +-> convolver -> reverb wet ---+
//! ```

use std::sync::Arc;

use super::node_graph::nodes::{
    convolver, delay, filter, gain, panner, AnalyserNode, BiquadFilterNode, ConvolverNode, DelayNode,
    GainNode, ReverbKernel, StereoPannerNode,
};
use super::node_graph::{AudioGraph, ConnectionError, NodeIndex};
use crate::config::{AnalyserConfig, EngineConfig};
use crate::dsp::{FilterKind, ImpulseResponse};
use crate::state::Track;

pub const EQ_LOW_FREQUENCY: f32 = 200.0;
pub const EQ_MID_FREQUENCY: f32 = 1000.0;
pub const EQ_MID_Q: f32 = 1.0;
pub const EQ_HIGH_FREQUENCY: f32 = 3000.0;

/// Longest delay line a track can use, in seconds
pub const MAX_DELAY_SECONDS: f32 = 5.0;

/// Feedback gain ceiling; keeps the delay loop decaying
pub const MAX_DELAY_FEEDBACK: f32 = 0.95;

/// Shelf filters ignore Q; this is the value browsers report for them
const SHELF_Q: f32 = 1.0;

/// Parameters of a track chain that can be read back from the live graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackParam {
    Gain,
    Pan,
    EqLow,
    EqMid,
    EqHigh,
    DelayTime,
    DelayFeedback,
    DelayWet,
    DelayDry,
    ReverbWet,
    ReverbDry,
    ReverbActive,
}

/// Handles to every node of one track's chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackNodes {
    pub eq_low: NodeIndex,
    pub eq_mid: NodeIndex,
    pub eq_high: NodeIndex,
    pub delay_dry: NodeIndex,
    pub delay: NodeIndex,
    pub delay_feedback: NodeIndex,
    pub delay_wet: NodeIndex,
    pub delay_merge: NodeIndex,
    pub reverb_dry: NodeIndex,
    pub convolver: NodeIndex,
    pub reverb_wet: NodeIndex,
    pub reverb_merge: NodeIndex,
    pub analyser: NodeIndex,
    pub panner: NodeIndex,
    pub gain: NodeIndex,
}

impl TrackNodes {
    /// First node of the chain
    pub fn input(&self) -> NodeIndex {
        self.eq_low
    }

    /// Last node of the chain; connect it to a bus
    pub fn output(&self) -> NodeIndex {
        self.gain
    }

    pub fn all(&self) -> [NodeIndex; 15] {
        [
            self.eq_low,
            self.eq_mid,
            self.eq_high,
            self.delay_dry,
            self.delay,
            self.delay_feedback,
            self.delay_wet,
            self.delay_merge,
            self.reverb_dry,
            self.convolver,
            self.reverb_wet,
            self.reverb_merge,
            self.analyser,
            self.panner,
            self.gain,
        ]
    }

    /// Write a track's settings into the existing nodes
    ///
    /// Bypassed families are driven to their neutral values (0 dB EQ, dry
    /// only delay/reverb) while the stored settings stay untouched.
    pub fn apply(&self, graph: &mut AudioGraph, track: &Track, any_solo: bool) {
        let bypass = track.effects_bypassed;
        let effects = &track.effects;

        let eq = if bypass.eq { Default::default() } else { effects.eq };
        graph.set_parameter(self.eq_low, filter::PARAM_GAIN, eq.low);
        graph.set_parameter(self.eq_mid, filter::PARAM_GAIN, eq.mid);
        graph.set_parameter(self.eq_high, filter::PARAM_GAIN, eq.high);

        let delay_wet = if bypass.delay { 0.0 } else { effects.delay.mix as f32 / 100.0 };
        let feedback = (effects.delay.feedback as f32 / 100.0).min(MAX_DELAY_FEEDBACK);
        graph.set_parameter(self.delay, delay::PARAM_DELAY_TIME, effects.delay.time as f32 / 1000.0);
        graph.set_parameter(self.delay_feedback, gain::PARAM_GAIN, feedback);
        graph.set_parameter(self.delay_wet, gain::PARAM_GAIN, delay_wet);
        graph.set_parameter(self.delay_dry, gain::PARAM_GAIN, 1.0 - delay_wet);

        let reverb_wet = if bypass.reverb { 0.0 } else { effects.reverb as f32 / 100.0 };
        graph.set_parameter(self.reverb_wet, gain::PARAM_GAIN, reverb_wet);
        graph.set_parameter(self.reverb_dry, gain::PARAM_GAIN, 1.0 - reverb_wet);
        let active = if reverb_wet > 0.0 { 1.0 } else { 0.0 };
        graph.set_parameter(self.convolver, convolver::PARAM_ACTIVE, active);

        graph.set_parameter(self.panner, panner::PARAM_PAN, track.pan as f32 / 100.0);
        graph.set_parameter(self.gain, gain::PARAM_GAIN, track.effective_gain(any_solo));
    }

    /// Read a parameter back from the graph
    pub fn parameter(&self, graph: &AudioGraph, param: TrackParam) -> Option<f32> {
        let (node, id) = match param {
            TrackParam::Gain => (self.gain, gain::PARAM_GAIN),
            TrackParam::Pan => (self.panner, panner::PARAM_PAN),
            TrackParam::EqLow => (self.eq_low, filter::PARAM_GAIN),
            TrackParam::EqMid => (self.eq_mid, filter::PARAM_GAIN),
            TrackParam::EqHigh => (self.eq_high, filter::PARAM_GAIN),
            TrackParam::DelayTime => (self.delay, delay::PARAM_DELAY_TIME),
            TrackParam::DelayFeedback => (self.delay_feedback, gain::PARAM_GAIN),
            TrackParam::DelayWet => (self.delay_wet, gain::PARAM_GAIN),
            TrackParam::DelayDry => (self.delay_dry, gain::PARAM_GAIN),
            TrackParam::ReverbWet => (self.reverb_wet, gain::PARAM_GAIN),
            TrackParam::ReverbDry => (self.reverb_dry, gain::PARAM_GAIN),
            TrackParam::ReverbActive => (self.convolver, convolver::PARAM_ACTIVE),
        };
        graph.get_parameter(node, id)
    }

    /// Current meter level of the track, 0..100
    pub fn level(&self, graph: &mut AudioGraph) -> Option<f32> {
        graph.node_mut::<AnalyserNode>(self.analyser).map(|a| a.level())
    }

    /// Remove every node of the chain from the graph
    pub fn teardown(&self, graph: &mut AudioGraph) {
        for node in self.all() {
            graph.remove_node(node);
        }
    }
}

/// Builds track chains that share one reverb impulse response
#[derive(Clone)]
pub struct EffectChainFactory {
    kernel: Arc<ReverbKernel>,
    analyser: AnalyserConfig,
}

impl EffectChainFactory {
    pub fn new(kernel: Arc<ReverbKernel>, analyser: AnalyserConfig) -> Self {
        Self { kernel, analyser }
    }

    /// Synthesize the impulse response described by the config at `sample_rate`
    pub fn from_config(config: &EngineConfig, sample_rate: u32) -> Self {
        let impulse = ImpulseResponse::from_config(&config.impulse, sample_rate);
        log::debug!("reverb impulse: {} frames at {} Hz", impulse.len(), sample_rate);
        let kernel = ReverbKernel::new(&impulse, config.impulse.normalize);
        Self::new(Arc::new(kernel), config.analyser.clone())
    }

    pub fn kernel(&self) -> &Arc<ReverbKernel> {
        &self.kernel
    }

    /// Create and wire a chain fed by `source`
    ///
    /// Nothing is left in the graph if wiring fails.
    pub fn build(&self, graph: &mut AudioGraph, name: &str, source: NodeIndex) -> Result<TrackNodes, ConnectionError> {
        let sample_rate = graph.sample_rate();
        let node_name = |part: &str| format!("{}/{}", name, part);

        let nodes = TrackNodes {
            eq_low: graph.add_node(Box::new(BiquadFilterNode::new(
                node_name("eq-low"),
                FilterKind::LowShelf,
                EQ_LOW_FREQUENCY,
                SHELF_Q,
            ))),
            eq_mid: graph.add_node(Box::new(BiquadFilterNode::new(
                node_name("eq-mid"),
                FilterKind::Peaking,
                EQ_MID_FREQUENCY,
                EQ_MID_Q,
            ))),
            eq_high: graph.add_node(Box::new(BiquadFilterNode::new(
                node_name("eq-high"),
                FilterKind::HighShelf,
                EQ_HIGH_FREQUENCY,
                SHELF_Q,
            ))),
            delay_dry: graph.add_node(Box::new(GainNode::new(node_name("delay-dry"), 1.0))),
            delay: graph.add_node(Box::new(DelayNode::new(node_name("delay"), MAX_DELAY_SECONDS, sample_rate))),
            delay_feedback: graph.add_node(Box::new(GainNode::new(node_name("delay-feedback"), 0.0))),
            delay_wet: graph.add_node(Box::new(GainNode::new(node_name("delay-wet"), 0.0))),
            delay_merge: graph.add_node(Box::new(GainNode::new(node_name("delay-merge"), 1.0))),
            reverb_dry: graph.add_node(Box::new(GainNode::new(node_name("reverb-dry"), 1.0))),
            convolver: graph.add_node(Box::new(ConvolverNode::new(node_name("reverb"), &self.kernel))),
            reverb_wet: graph.add_node(Box::new(GainNode::new(node_name("reverb-wet"), 0.0))),
            reverb_merge: graph.add_node(Box::new(GainNode::new(node_name("reverb-merge"), 1.0))),
            analyser: graph.add_node(Box::new(AnalyserNode::new(node_name("analyser"), &self.analyser))),
            panner: graph.add_node(Box::new(StereoPannerNode::new(node_name("panner")))),
            gain: graph.add_node(Box::new(GainNode::new(node_name("gain"), 1.0))),
        };

        if let Err(e) = Self::wire(graph, &nodes, source) {
            log::warn!("could not wire chain '{}': {}", name, e);
            nodes.teardown(graph);
            return Err(e);
        }
        Ok(nodes)
    }

    fn wire(graph: &mut AudioGraph, n: &TrackNodes, source: NodeIndex) -> Result<(), ConnectionError> {
        // EQ
        graph.connect(source, n.eq_low)?;
        graph.connect(n.eq_low, n.eq_mid)?;
        graph.connect(n.eq_mid, n.eq_high)?;

        // Delay: parallel dry/wet with a loop through the feedback gain
        graph.connect(n.eq_high, n.delay_dry)?;
        graph.connect(n.eq_high, n.delay)?;
        graph.connect(n.delay, n.delay_feedback)?;
        graph.connect_feedback(n.delay_feedback, n.delay)?;
        graph.connect(n.delay, n.delay_wet)?;
        graph.connect(n.delay_dry, n.delay_merge)?;
        graph.connect(n.delay_wet, n.delay_merge)?;

        // Reverb
        graph.connect(n.delay_merge, n.reverb_dry)?;
        graph.connect(n.delay_merge, n.convolver)?;
        graph.connect(n.convolver, n.reverb_wet)?;
        graph.connect(n.reverb_dry, n.reverb_merge)?;
        graph.connect(n.reverb_wet, n.reverb_merge)?;

        // Metering, placement, level
        graph.connect(n.reverb_merge, n.analyser)?;
        graph.connect(n.analyser, n.panner)?;
        graph.connect(n.panner, n.gain)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::audio::node_graph::nodes::BufferSourceNode;
    use crate::config::{EngineConfig, ImpulseConfig};
    use crate::io::AudioBuffer;
    use crate::state::EffectFamily;

    fn factory(sample_rate: u32) -> EffectChainFactory {
        let config = EngineConfig {
            impulse: ImpulseConfig {
                duration_secs: 0.1,
                seed: Some(7),
                ..Default::default()
            },
            ..Default::default()
        };
        EffectChainFactory::from_config(&config, sample_rate)
    }

    fn chain(graph: &mut AudioGraph, frames: usize) -> (NodeIndex, TrackNodes) {
        let buffer = Arc::new(AudioBuffer::new(vec![0.25; frames * 2], graph.sample_rate()));
        let source = graph.add_node(Box::new(BufferSourceNode::new("src", buffer)));
        let nodes = factory(graph.sample_rate()).build(graph, "t", source).unwrap();
        (source, nodes)
    }

    #[test]
    fn builds_fifteen_nodes() {
        let mut graph = AudioGraph::new(8000);
        let (_, nodes) = chain(&mut graph, 10);
        assert_eq!(graph.node_count(), 16);
        // 17 forward edges plus the feedback edge
        assert_eq!(graph.edge_count(), 18);
        nodes.teardown(&mut graph);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn bypassed_eq_is_flat() {
        let mut graph = AudioGraph::new(8000);
        let (_, nodes) = chain(&mut graph, 10);
        let mut track = Track::new("t", "T", "");
        track.effects.eq.low = 10.0;
        track.effects_bypassed.toggle(EffectFamily::Eq);
        nodes.apply(&mut graph, &track, false);
        assert_eq!(nodes.parameter(&graph, TrackParam::EqLow), Some(0.0));

        track.effects_bypassed.toggle(EffectFamily::Eq);
        nodes.apply(&mut graph, &track, false);
        assert_eq!(nodes.parameter(&graph, TrackParam::EqLow), Some(10.0));
    }

    #[test]
    fn wet_dry_and_feedback_projection() {
        let mut graph = AudioGraph::new(8000);
        let (_, nodes) = chain(&mut graph, 10);
        let mut track = Track::new("t", "T", "");
        track.effects.delay.mix = 40;
        track.effects.delay.feedback = 100;
        track.effects.reverb = 25;
        nodes.apply(&mut graph, &track, false);

        assert_relative_eq!(nodes.parameter(&graph, TrackParam::DelayWet).unwrap(), 0.4);
        assert_relative_eq!(nodes.parameter(&graph, TrackParam::DelayDry).unwrap(), 0.6, epsilon = 1e-6);
        assert_eq!(nodes.parameter(&graph, TrackParam::DelayFeedback), Some(MAX_DELAY_FEEDBACK));
        assert_eq!(nodes.parameter(&graph, TrackParam::DelayTime), Some(0.25));
        assert_eq!(nodes.parameter(&graph, TrackParam::ReverbWet), Some(0.25));
        assert_eq!(nodes.parameter(&graph, TrackParam::ReverbActive), Some(1.0));

        track.effects_bypassed.toggle(EffectFamily::Reverb);
        track.effects_bypassed.toggle(EffectFamily::Delay);
        nodes.apply(&mut graph, &track, false);
        assert_eq!(nodes.parameter(&graph, TrackParam::DelayWet), Some(0.0));
        assert_eq!(nodes.parameter(&graph, TrackParam::ReverbDry), Some(1.0));
        assert_eq!(nodes.parameter(&graph, TrackParam::ReverbActive), Some(0.0));
    }

    #[test]
    fn neutral_chain_passes_signal() {
        let mut graph = AudioGraph::new(8000);
        let (source, nodes) = chain(&mut graph, 512);
        let track = Track::new("t", "T", "");
        nodes.apply(&mut graph, &track, false);
        graph.node_mut::<BufferSourceNode>(source).unwrap().start();

        graph.process();
        let out = graph.output(nodes.output()).unwrap();
        for sample in out {
            assert!((sample - 0.25).abs() < 1e-5, "{}", sample);
        }
    }

    #[test]
    fn solo_elsewhere_silences() {
        let mut graph = AudioGraph::new(8000);
        let (_, nodes) = chain(&mut graph, 10);
        let mut track = Track::new("t", "T", "");
        track.volume = 80;
        nodes.apply(&mut graph, &track, true);
        assert_eq!(nodes.parameter(&graph, TrackParam::Gain), Some(0.0));
        nodes.apply(&mut graph, &track, false);
        assert_eq!(nodes.parameter(&graph, TrackParam::Gain), Some(0.8));
    }
}
