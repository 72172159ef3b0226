use super::effect_chain::{EQ_HIGH_FREQUENCY, EQ_LOW_FREQUENCY, EQ_MID_FREQUENCY, EQ_MID_Q};
use super::node_graph::nodes::{compressor, filter, gain, BiquadFilterNode, DynamicsCompressorNode, GainNode};
use super::node_graph::{AudioGraph, ConnectionError, NodeIndex};
use crate::dsp::FilterKind;
use crate::state::{EqSettings, MasterBusSettings};

const LIMITER_RATIO: f32 = 20.0;
const LIMITER_ATTACK: f32 = 0.003;
const LIMITER_RELEASE: f32 = 0.25;

/// EQ, compressor and limiter after the master gain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterProcessing {
    pub eq_low: NodeIndex,
    pub eq_mid: NodeIndex,
    pub eq_high: NodeIndex,
    pub compressor: NodeIndex,
    pub limiter: NodeIndex,
}

/// Shared bus every track chain feeds into
///
/// `master gain -> eq low -> eq mid -> eq high -> compressor -> limiter -> destination`.
/// Without processing the gain feeds the destination directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterBus {
    gain: NodeIndex,
    processing: Option<MasterProcessing>,
}

impl MasterBus {
    pub fn build(graph: &mut AudioGraph, destination: NodeIndex, with_processing: bool) -> Result<Self, ConnectionError> {
        let sample_rate = graph.sample_rate();
        let gain = graph.add_node(Box::new(GainNode::new("master/gain", 1.0)));

        if !with_processing {
            graph.connect(gain, destination)?;
            return Ok(Self { gain, processing: None });
        }

        let processing = MasterProcessing {
            eq_low: graph.add_node(Box::new(BiquadFilterNode::new(
                "master/eq-low",
                FilterKind::LowShelf,
                EQ_LOW_FREQUENCY,
                1.0,
            ))),
            eq_mid: graph.add_node(Box::new(BiquadFilterNode::new(
                "master/eq-mid",
                FilterKind::Peaking,
                EQ_MID_FREQUENCY,
                EQ_MID_Q,
            ))),
            eq_high: graph.add_node(Box::new(BiquadFilterNode::new(
                "master/eq-high",
                FilterKind::HighShelf,
                EQ_HIGH_FREQUENCY,
                1.0,
            ))),
            compressor: graph.add_node(Box::new(DynamicsCompressorNode::new("master/compressor", sample_rate))),
            limiter: graph.add_node(Box::new(DynamicsCompressorNode::new("master/limiter", sample_rate))),
        };

        graph.connect(gain, processing.eq_low)?;
        graph.connect(processing.eq_low, processing.eq_mid)?;
        graph.connect(processing.eq_mid, processing.eq_high)?;
        graph.connect(processing.eq_high, processing.compressor)?;
        graph.connect(processing.compressor, processing.limiter)?;
        graph.connect(processing.limiter, destination)?;

        // Fixed limiter character
        graph.set_parameter(processing.limiter, compressor::PARAM_KNEE, 0.0);
        graph.set_parameter(processing.limiter, compressor::PARAM_RATIO, LIMITER_RATIO);
        graph.set_parameter(processing.limiter, compressor::PARAM_ATTACK, LIMITER_ATTACK);
        graph.set_parameter(processing.limiter, compressor::PARAM_RELEASE, LIMITER_RELEASE);
        graph.set_parameter(processing.compressor, compressor::PARAM_KNEE, 0.0);

        log::debug!("master bus built");
        Ok(Self {
            gain,
            processing: Some(processing),
        })
    }

    /// Node that track chains connect to
    pub fn input(&self) -> NodeIndex {
        self.gain
    }

    pub fn processing(&self) -> Option<&MasterProcessing> {
        self.processing.as_ref()
    }

    /// Project the master settings onto the bus nodes
    ///
    /// Disabled stages are set neutral: 0 dB EQ, compressor at threshold
    /// 0 dB and ratio 1, limiter at threshold 0 dB.
    pub fn apply(&self, graph: &mut AudioGraph, settings: &MasterBusSettings) {
        graph.set_parameter(self.gain, gain::PARAM_GAIN, settings.volume as f32 / 100.0);

        let Some(p) = &self.processing else {
            return;
        };

        let eq = if settings.eq_enabled { settings.eq } else { EqSettings::default() };
        graph.set_parameter(p.eq_low, filter::PARAM_GAIN, eq.low);
        graph.set_parameter(p.eq_mid, filter::PARAM_GAIN, eq.mid);
        graph.set_parameter(p.eq_high, filter::PARAM_GAIN, eq.high);

        let c = &settings.compressor;
        let (threshold, ratio) = if settings.compressor_enabled {
            (c.threshold_db, c.ratio)
        } else {
            (0.0, 1.0)
        };
        graph.set_parameter(p.compressor, compressor::PARAM_THRESHOLD, threshold);
        graph.set_parameter(p.compressor, compressor::PARAM_RATIO, ratio);
        graph.set_parameter(p.compressor, compressor::PARAM_ATTACK, c.attack_ms / 1000.0);
        graph.set_parameter(p.compressor, compressor::PARAM_RELEASE, c.release_ms / 1000.0);

        let limiter = &settings.limiter;
        let threshold = if limiter.enabled { limiter.threshold_db } else { 0.0 };
        graph.set_parameter(p.limiter, compressor::PARAM_THRESHOLD, threshold);
    }

    /// Remove the bus nodes from the graph
    pub fn teardown(&self, graph: &mut AudioGraph) {
        graph.remove_node(self.gain);
        if let Some(p) = &self.processing {
            for node in [p.eq_low, p.eq_mid, p.eq_high, p.compressor, p.limiter] {
                graph.remove_node(node);
            }
        }
    }
}
