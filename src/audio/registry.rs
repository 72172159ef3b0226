//! Live track graphs keyed by track id
//!
//! The registry is the only owner of per-track nodes and playback
//! elements. Everything else refers to tracks by id.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::AudioContext;
use super::effect_chain::{EffectChainFactory, TrackNodes, TrackParam};
use super::node_graph::nodes::MediaElementSourceNode;
use super::node_graph::{ConnectionError, NodeIndex};
use super::playback::{MediaElement, MediaEvent, SharedElement};
use crate::command::SessionEvent;
use crate::error::{DecodeError, MixError, SourceError};
use crate::io::{extension_hint, AudioFile, AudioSource};
use crate::notify::Notifier;
use crate::state::{MixSnapshot, Track, TrackId};

/// Runtime state of one registered track
struct TrackBinding {
    element: SharedElement,
    source: NodeIndex,
    nodes: TrackNodes,
    source_url: String,
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("{0}")]
    Source(#[from] SourceError),
    #[error("{0}")]
    Decode(#[from] DecodeError),
}

pub struct TrackGraphRegistry {
    factory: EffectChainFactory,
    bindings: BTreeMap<TrackId, TrackBinding>,
}

impl TrackGraphRegistry {
    pub fn new(factory: EffectChainFactory) -> Self {
        Self {
            factory,
            bindings: BTreeMap::new(),
        }
    }

    pub fn factory(&self) -> &EffectChainFactory {
        &self.factory
    }

    /// Build a track's chain, connect it to `bus_input` and load its audio
    ///
    /// A load failure is reported and the track stays registered but
    /// silent until [`retry`](Self::retry). Only a wiring failure is an error.
    pub fn add_track(
        &mut self,
        ctx: &mut AudioContext,
        track: &Track,
        bus_input: NodeIndex,
        source: &dyn AudioSource,
        notifier: &dyn Notifier,
    ) -> Result<(), ConnectionError> {
        if self.bindings.contains_key(&track.id) {
            log::debug!("track '{}' already registered", track.id);
            return Ok(());
        }

        let element = MediaElement::shared();
        let graph = ctx.graph_mut();
        let source_node = graph.add_node(Box::new(MediaElementSourceNode::new(
            format!("{}/source", track.id),
            element.clone(),
        )));

        let nodes = match self.factory.build(graph, track.id.as_str(), source_node) {
            Ok(nodes) => nodes,
            Err(e) => {
                graph.remove_node(source_node);
                return Err(e);
            }
        };
        if let Err(e) = graph.connect(nodes.output(), bus_input) {
            nodes.teardown(graph);
            graph.remove_node(source_node);
            return Err(e);
        }

        Self::load(ctx.sample_rate(), track, &element, source, notifier);

        self.bindings.insert(
            track.id.clone(),
            TrackBinding {
                element,
                source: source_node,
                nodes,
                source_url: track.source.clone(),
            },
        );
        log::info!("registered track '{}'", track.id);
        Ok(())
    }

    fn load(sample_rate: u32, track: &Track, element: &SharedElement, source: &dyn AudioSource, notifier: &dyn Notifier) {
        let decoded = source
            .fetch(&track.source)
            .map_err(LoadError::from)
            .and_then(|bytes| Ok(AudioFile::decode(bytes, extension_hint(&track.source))?));

        match decoded {
            Ok(file) => {
                let buffer = file.to_stereo_buffer(sample_rate);
                log::debug!("track '{}': {:.2}s of audio", track.id, buffer.duration());
                element.lock().load(Arc::new(buffer));
            }
            Err(e) => {
                element.lock().fail(e.to_string());
                notifier.report(&MixError::SourceDecode {
                    track: track.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Fetch and decode a track's audio again. Returns true on success.
    pub fn retry(&mut self, sample_rate: u32, track: &Track, source: &dyn AudioSource, notifier: &dyn Notifier) -> bool {
        let Some(binding) = self.bindings.get_mut(&track.id) else {
            log::warn!("retry: {}", MixError::GraphState(track.id.clone()));
            return false;
        };
        binding.source_url = track.source.clone();
        Self::load(sample_rate, track, &binding.element, source, notifier);
        let loaded = binding.element.lock().duration().is_some();
        loaded
    }

    /// Stop and release a track and remove its nodes. Removing an unknown
    /// id does nothing.
    pub fn remove_track(&mut self, ctx: &mut AudioContext, id: &TrackId) -> bool {
        let Some(binding) = self.bindings.remove(id) else {
            return false;
        };
        binding.element.lock().release();
        let graph = ctx.graph_mut();
        binding.nodes.teardown(graph);
        graph.remove_node(binding.source);
        log::info!("removed track '{}'", id);
        true
    }

    /// Write one track's settings into its nodes. `any_solo` must be
    /// computed over the whole track set.
    pub fn apply_parameters(
        &self,
        ctx: &mut AudioContext,
        id: &TrackId,
        track: &Track,
        any_solo: bool,
    ) -> Result<(), MixError> {
        let binding = self.bindings.get(id).ok_or_else(|| MixError::GraphState(id.clone()))?;
        binding.nodes.apply(ctx.graph_mut(), track, any_solo);
        Ok(())
    }

    /// Project a whole snapshot onto the registered tracks
    pub fn apply_all(&self, ctx: &mut AudioContext, snapshot: &MixSnapshot) {
        let any_solo = snapshot.any_solo();
        for track in &snapshot.tracks {
            if let Err(e) = self.apply_parameters(ctx, &track.id, track, any_solo) {
                log::debug!("apply_all: {}", e);
            }
        }
    }

    /// Drain every element's lifecycle events as session events
    pub fn poll_events(&self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for (id, binding) in &self.bindings {
            for event in binding.element.lock().drain_events() {
                events.push(match event {
                    MediaEvent::LoadedMetadata(duration) => SessionEvent::DurationKnown(id.clone(), duration),
                    MediaEvent::Play => SessionEvent::PlayingChanged(id.clone(), true),
                    MediaEvent::Pause => SessionEvent::PlayingChanged(id.clone(), false),
                    MediaEvent::Ended => SessionEvent::Ended(id.clone()),
                    MediaEvent::Error(reason) => SessionEvent::LoadFailed(id.clone(), reason),
                });
            }
        }
        events
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.bindings.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.bindings.keys().cloned().collect()
    }

    pub fn element(&self, id: &TrackId) -> Option<SharedElement> {
        self.bindings.get(id).map(|b| b.element.clone())
    }

    /// Snapshot of every registered element, safe to iterate while the
    /// registry changes
    pub fn elements(&self) -> Vec<(TrackId, SharedElement)> {
        self.bindings
            .iter()
            .map(|(id, b)| (id.clone(), b.element.clone()))
            .collect()
    }

    pub fn nodes(&self, id: &TrackId) -> Option<&TrackNodes> {
        self.bindings.get(id).map(|b| &b.nodes)
    }

    pub fn source_url(&self, id: &TrackId) -> Option<&str> {
        self.bindings.get(id).map(|b| b.source_url.as_str())
    }

    /// Meter level of a track, 0..100
    pub fn analyser_level(&self, ctx: &mut AudioContext, id: &TrackId) -> Option<f32> {
        self.bindings.get(id)?.nodes.level(ctx.graph_mut())
    }

    /// Read a chain parameter back from the live graph
    pub fn parameter(&self, ctx: &AudioContext, id: &TrackId, param: TrackParam) -> Option<f32> {
        self.bindings.get(id)?.nodes.parameter(ctx.graph(), param)
    }

    /// Remove every track
    pub fn teardown(&mut self, ctx: &mut AudioContext) {
        for id in self.ids() {
            self.remove_track(ctx, &id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ImpulseConfig};
    use crate::io::{encode_wav, MemorySource};
    use crate::notify::CollectingNotifier;

    fn setup() -> (AudioContext, TrackGraphRegistry, MemorySource) {
        let config = EngineConfig {
            impulse: ImpulseConfig {
                duration_secs: 0.05,
                seed: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = AudioContext::new(8000);
        let registry = TrackGraphRegistry::new(EffectChainFactory::from_config(&config, 8000));
        let source = MemorySource::new().with("a.wav", encode_wav(&vec![0.1; 1600], 2, 8000));
        (ctx, registry, source)
    }

    #[test]
    fn add_and_remove_restore_the_graph() {
        let (mut ctx, mut registry, source) = setup();
        let notifier = CollectingNotifier::new();
        let before = ctx.graph().node_count();
        let bus = ctx.destination();

        registry
            .add_track(&mut ctx, &Track::new("a", "A", "a.wav"), bus, &source, &notifier)
            .unwrap();
        assert_eq!(ctx.graph().node_count(), before + 16);
        assert!(notifier.is_empty());
        assert_eq!(
            registry.poll_events(),
            vec![SessionEvent::DurationKnown(TrackId::from("a"), 0.1)]
        );

        let id = TrackId::from("a");
        let element = registry.element(&id).unwrap();
        assert!(registry.remove_track(&mut ctx, &id));
        assert!(!registry.remove_track(&mut ctx, &id));
        assert_eq!(ctx.graph().node_count(), before);
        assert_eq!(ctx.graph().edge_count(), 0);
        assert!(element.lock().play().is_err());
    }

    #[test]
    fn failed_load_keeps_track_registered() {
        let (mut ctx, mut registry, source) = setup();
        let notifier = CollectingNotifier::new();
        let bus = ctx.destination();
        let track = Track::new("b", "B", "missing.wav");

        registry.add_track(&mut ctx, &track, bus, &source, &notifier).unwrap();
        assert!(registry.contains(&track.id));
        assert!(matches!(notifier.drain()[..], [MixError::SourceDecode { .. }]));

        let source = source.with("missing.wav", encode_wav(&[0.0; 8], 2, 8000));
        assert!(registry.retry(8000, &track, &source, &notifier));
        assert!(notifier.is_empty());
    }

    #[test]
    fn unknown_id_is_a_graph_state_error() {
        let (mut ctx, registry, _) = setup();
        let track = Track::new("x", "X", "");
        let result = registry.apply_parameters(&mut ctx, &track.id, &track, false);
        assert_eq!(result, Err(MixError::GraphState(track.id.clone())));
        assert_eq!(registry.parameter(&ctx, &track.id, TrackParam::Gain), None);
    }

    #[test]
    fn apply_all_uses_solo_of_the_whole_set() {
        let (mut ctx, mut registry, source) = setup();
        let notifier = CollectingNotifier::new();
        let bus = ctx.destination();
        let mut a = Track::new("a", "A", "a.wav");
        let mut b = Track::new("b", "B", "a.wav");
        a.volume = 80;
        b.volume = 60;
        b.solo = true;
        for t in [&a, &b] {
            registry.add_track(&mut ctx, t, bus, &source, &notifier).unwrap();
        }
        registry.apply_all(&mut ctx, &MixSnapshot::new(vec![a.clone(), b.clone()]));
        assert_eq!(registry.parameter(&ctx, &a.id, TrackParam::Gain), Some(0.0));
        assert_eq!(registry.parameter(&ctx, &b.id, TrackParam::Gain), Some(0.6));
    }
}
