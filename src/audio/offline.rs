//! Offline bounce of a mix snapshot to PCM and WAV
//!
//! The render graph is rebuilt from scratch with the same chain and bus
//! builders the live session uses, then rendered in one pass.

use std::collections::HashMap;
use std::sync::Arc;

use super::context::AudioContext;
use super::effect_chain::EffectChainFactory;
use super::master_bus::MasterBus;
use super::node_graph::nodes::{gain, panner, BufferSourceNode, GainNode, StereoPannerNode};
use super::node_graph::{NodeIndex, CHANNELS};
use crate::config::{EngineConfig, ExportConfig};
use crate::error::{ExportError, ExportResult};
use crate::io::{encode_wav, extension_hint, AudioBuffer, AudioFile};
use crate::state::{MixSnapshot, Track, TrackId};

/// Stages reported while exporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProgress {
    Decoding,
    Rendering,
    Encoding,
    Done,
}

impl ExportProgress {
    pub fn percent(self) -> u8 {
        match self {
            ExportProgress::Decoding => 0,
            ExportProgress::Rendering => 50,
            ExportProgress::Encoding => 75,
            ExportProgress::Done => 100,
        }
    }
}

/// Rendered interleaved stereo
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RenderedBuffer {
    pub fn channels(&self) -> u16 {
        CHANNELS as u16
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn to_wav(&self) -> Vec<u8> {
        encode_wav(&self.samples, self.channels(), self.sample_rate)
    }
}

pub struct OfflineRenderer {
    sample_rate: u32,
    include_effects: bool,
    include_master_chain: bool,
    factory: EffectChainFactory,
}

impl OfflineRenderer {
    pub fn new(export: &ExportConfig, factory: EffectChainFactory) -> Self {
        Self {
            sample_rate: export.sample_rate,
            include_effects: export.include_effects,
            include_master_chain: export.include_master_chain,
            factory,
        }
    }

    /// Renderer with its own reverb impulse at the export rate
    pub fn from_config(config: &EngineConfig) -> Self {
        let factory = EffectChainFactory::from_config(config, config.export.sample_rate);
        Self::new(&config.export, factory)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Mix every audible track of `snapshot` into one buffer
    ///
    /// `sources` holds each track's encoded bytes. Every track is decoded,
    /// muted ones included; any failure aborts the render. The result is
    /// as long as the longest track.
    pub fn render(
        &self,
        snapshot: &MixSnapshot,
        sources: &HashMap<TrackId, Vec<u8>>,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> ExportResult<RenderedBuffer> {
        if snapshot.tracks.is_empty() {
            return Err(ExportError::EmptyMix);
        }

        progress(ExportProgress::Decoding);
        let mut buffers = Vec::with_capacity(snapshot.tracks.len());
        for track in &snapshot.tracks {
            let bytes = sources.get(&track.id).ok_or_else(|| ExportError::Fetch {
                track: track.id.clone(),
                reason: "no audio supplied".to_string(),
            })?;
            let file = AudioFile::decode(bytes.clone(), extension_hint(&track.source)).map_err(|e| {
                ExportError::Decode {
                    track: track.id.clone(),
                    reason: e.to_string(),
                }
            })?;
            buffers.push(Arc::new(file.to_stereo_buffer(self.sample_rate)));
        }
        let frames = buffers.iter().map(|b| b.frames()).max().unwrap_or(0);

        let mut ctx = AudioContext::new(self.sample_rate);
        let destination = ctx.destination();
        let master = MasterBus::build(ctx.graph_mut(), destination, self.include_master_chain)?;
        master.apply(ctx.graph_mut(), &snapshot.master);

        let any_solo = snapshot.any_solo();
        let mut sources_started = Vec::new();
        for (track, buffer) in snapshot.tracks.iter().zip(buffers) {
            if track.is_effectively_muted(any_solo) {
                log::debug!("export: skipping muted track '{}'", track.id);
                continue;
            }
            let source = self.add_track(&mut ctx, track, buffer, master.input(), any_solo)?;
            sources_started.push(source);
        }

        for source in sources_started {
            if let Some(node) = ctx.graph_mut().node_mut::<BufferSourceNode>(source) {
                node.start();
            }
        }

        progress(ExportProgress::Rendering);
        log::info!(
            "export: rendering {} frames at {} Hz ({} effects)",
            frames,
            self.sample_rate,
            if self.include_effects { "with" } else { "without" }
        );
        let samples = ctx.render_frames(frames);

        Ok(RenderedBuffer {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    fn add_track(
        &self,
        ctx: &mut AudioContext,
        track: &Track,
        buffer: Arc<AudioBuffer>,
        bus_input: NodeIndex,
        any_solo: bool,
    ) -> ExportResult<NodeIndex> {
        let graph = ctx.graph_mut();
        let source = graph.add_node(Box::new(BufferSourceNode::new(format!("{}/source", track.id), buffer)));

        if self.include_effects {
            let nodes = self.factory.build(graph, track.id.as_str(), source)?;
            nodes.apply(graph, track, any_solo);
            graph.connect(nodes.output(), bus_input)?;
        } else {
            let pan = graph.add_node(Box::new(StereoPannerNode::new(format!("{}/panner", track.id))));
            let level = graph.add_node(Box::new(GainNode::new(format!("{}/gain", track.id), 1.0)));
            graph.connect(source, pan)?;
            graph.connect(pan, level)?;
            graph.connect(level, bus_input)?;
            graph.set_parameter(pan, panner::PARAM_PAN, track.pan as f32 / 100.0);
            graph.set_parameter(level, gain::PARAM_GAIN, track.effective_gain(any_solo));
        }
        Ok(source)
    }

    /// Render and encode as 16-bit PCM WAV
    pub fn export_wav(
        &self,
        snapshot: &MixSnapshot,
        sources: &HashMap<TrackId, Vec<u8>>,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> ExportResult<Vec<u8>> {
        let rendered = self.render(snapshot, sources, progress)?;
        progress(ExportProgress::Encoding);
        let bytes = rendered.to_wav();
        progress(ExportProgress::Done);
        log::info!("export: {} bytes, {:.2}s", bytes.len(), rendered.duration());
        Ok(bytes)
    }
}
