//! A mixing session: live graph, transport, state history and export
//!
//! Every edit follows the same path: compute the next snapshot, project it
//! onto the live graph, then record it in history. A reader that sees a
//! snapshot therefore also sees the graph already reflecting it.

use std::collections::HashMap;

use super::context::AudioContext;
use super::effect_chain::{EffectChainFactory, TrackParam};
use super::master_bus::MasterBus;
use super::offline::{ExportProgress, OfflineRenderer};
use super::registry::TrackGraphRegistry;
use super::transport::{LoopHandle, LoopKind, LoopWindow, TransportController};
use crate::command::{Command, SessionEvent};
use crate::config::EngineConfig;
use crate::error::{ExportError, MixError, SessionError};
use crate::io::{AudioSource, Catalog};
use crate::notify::Notifier;
use crate::state::{MixSnapshot, MixStateStore, Track, TrackId};

/// A finished export, ready to be saved
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMix {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct MixSession {
    config: EngineConfig,
    title: String,
    ctx: AudioContext,
    master: MasterBus,
    registry: TrackGraphRegistry,
    transport: TransportController,
    store: MixStateStore,
    renderer: OfflineRenderer,
    source: Box<dyn AudioSource>,
    notifier: Box<dyn Notifier>,
    levels: HashMap<TrackId, f32>,
    events: Vec<SessionEvent>,
    closed: bool,
}

impl MixSession {
    /// Open a session over `tracks`
    ///
    /// Track load failures are reported and leave the track silent. The
    /// only fatal condition is a master bus that cannot be built.
    pub fn open(
        config: EngineConfig,
        title: impl Into<String>,
        tracks: Vec<Track>,
        source: Box<dyn AudioSource>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self, SessionError> {
        let title = title.into();
        let mut ctx = AudioContext::new(config.sample_rate);
        let destination = ctx.destination();
        let master = MasterBus::build(ctx.graph_mut(), destination, true)?;

        let factory = EffectChainFactory::from_config(&config, config.sample_rate);
        let renderer = if config.export.sample_rate == config.sample_rate {
            OfflineRenderer::new(&config.export, factory.clone())
        } else {
            OfflineRenderer::from_config(&config)
        };

        let store = MixStateStore::new(MixSnapshot::new(tracks), config.history_depth);
        let mut session = Self {
            title,
            ctx,
            master,
            registry: TrackGraphRegistry::new(factory),
            transport: TransportController::new(),
            store,
            renderer,
            source,
            notifier,
            levels: HashMap::new(),
            events: Vec::new(),
            closed: false,
            config,
        };

        let initial = session.store.current().clone();
        session.project(&initial);
        session.transport.loops_mut().request(LoopKind::Sampling);
        session.pump_events();

        log::info!(
            "opened session '{}' with {} track(s) at {} Hz",
            session.title,
            session.registry.len(),
            session.ctx.sample_rate()
        );
        Ok(session)
    }

    /// Open the session `session_id` listed in a catalog
    pub fn from_catalog(
        config: EngineConfig,
        catalog: &Catalog,
        session_id: &str,
        source: Box<dyn AudioSource>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self, SessionError> {
        let title = catalog.title(session_id);
        Self::open(config, title, catalog.tracks(session_id), source, notifier)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate()
    }

    /// The snapshot the live graph reflects (including any preview)
    pub fn snapshot(&self) -> &MixSnapshot {
        self.store.current()
    }

    pub fn store(&self) -> &MixStateStore {
        &self.store
    }

    pub fn registry(&self) -> &TrackGraphRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &TransportController {
        &self.transport
    }

    pub fn context(&self) -> &AudioContext {
        &self.ctx
    }

    // Editing

    /// Apply one user edit as one history step. Returns false if it changed
    /// nothing.
    pub fn dispatch(&mut self, command: Command) -> bool {
        log::debug!("dispatch {:?}", command);
        self.report_clamped(&command);
        let next = command.apply(self.store.current());
        self.project(&next);
        let changed = self.store.commit(next);
        self.pump_events();
        changed
    }

    /// Apply an intermediate value of a gesture to the live graph only
    pub fn preview(&mut self, command: Command) {
        self.report_clamped(&command);
        let next = command.apply(self.store.current());
        self.project(&next);
        self.store.preview(next);
        self.pump_events();
    }

    fn report_clamped(&self, command: &Command) {
        for error in command.out_of_range() {
            self.notifier.report(&error);
        }
    }

    /// Record the previewed gesture as one history step
    pub fn commit(&mut self) -> bool {
        self.store.commit_preview()
    }

    /// Abandon the previewed gesture and restore the committed state
    pub fn cancel_preview(&mut self) {
        if self.store.discard_preview() {
            let committed = self.store.current().clone();
            self.project(&committed);
        }
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.store.undo().cloned() else {
            return false;
        };
        self.project(&snapshot);
        self.pump_events();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.store.redo().cloned() else {
            return false;
        };
        self.project(&snapshot);
        self.pump_events();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    /// Try loading a track's audio again
    pub fn retry(&mut self, id: &TrackId) -> bool {
        let Some(track) = self.store.current().track(id).cloned() else {
            log::warn!("retry: no track '{}'", id);
            return false;
        };
        let loaded = self.registry.retry(
            self.ctx.sample_rate(),
            &track,
            self.source.as_ref(),
            self.notifier.as_ref(),
        );
        self.pump_events();
        loaded
    }

    /// Bring the live graph in line with `snapshot`: add and remove chains
    /// for structural differences, then write every parameter
    fn project(&mut self, snapshot: &MixSnapshot) {
        for id in self.registry.ids() {
            if snapshot.track(&id).is_none() {
                self.registry.remove_track(&mut self.ctx, &id);
                self.transport.forget(&id);
                self.levels.remove(&id);
            }
        }

        for track in &snapshot.tracks {
            if self.registry.contains(&track.id) {
                continue;
            }
            let bus_input = self.master.input();
            if let Err(e) = self.registry.add_track(
                &mut self.ctx,
                track,
                bus_input,
                self.source.as_ref(),
                self.notifier.as_ref(),
            ) {
                log::error!("could not build graph for track '{}': {}", track.id, e);
                self.notifier.report(&MixError::GraphState(track.id.clone()));
            }
        }

        // Solo context is computed over the whole set before any gain is written
        self.registry.apply_all(&mut self.ctx, snapshot);
        self.master.apply(self.ctx.graph_mut(), &snapshot.master);
    }

    fn pump_events(&mut self) {
        for event in self.registry.poll_events() {
            self.transport.observe(&event);
            match &event {
                SessionEvent::DurationKnown(id, duration) => {
                    if self.store.record_duration(id, *duration) {
                        log::debug!("track '{}': default region 0..{:.2}", id, duration);
                    }
                }
                SessionEvent::LoadFailed(id, reason) => log::debug!("track '{}' load failed: {}", id, reason),
                SessionEvent::Ended(..) | SessionEvent::PlayingChanged(..) => {}
            }
            self.events.push(event);
        }
    }

    /// Lifecycle events since the last call
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read a chain parameter back from the live graph
    pub fn parameter(&self, id: &TrackId, param: TrackParam) -> Option<f32> {
        self.registry.parameter(&self.ctx, id, param)
    }

    // Transport

    pub fn play_all(&mut self) {
        self.transport.play_all(&self.registry, self.notifier.as_ref());
        self.pump_events();
    }

    pub fn pause_all(&mut self) {
        self.transport.pause_all(&self.registry);
        self.pump_events();
    }

    pub fn toggle_play_all(&mut self) {
        self.transport.toggle_play_all(&self.registry, self.notifier.as_ref());
        self.pump_events();
    }

    pub fn toggle_track(&mut self, id: &TrackId) {
        self.transport.toggle_track(&self.registry, id, self.notifier.as_ref());
        self.pump_events();
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_anything_playing(&self.registry)
    }

    pub fn seek(&mut self, id: &TrackId, time: f64) -> Option<f64> {
        self.transport.seek(&self.registry, id, time)
    }

    pub fn seek_all(&mut self, time: f64) {
        self.transport.seek_all(&self.registry, time);
    }

    pub fn set_loop(&mut self, enabled: bool, start: f64, end: f64) {
        self.transport.set_loop(enabled, start, end);
    }

    pub fn loop_window(&self) -> LoopWindow {
        self.transport.loop_window()
    }

    /// Last sampled play head of a track
    pub fn current_time(&self, id: &TrackId) -> Option<f64> {
        self.transport.current_time(id)
    }

    /// Longest known track duration
    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    // Frame loops and metering

    /// Run one UI frame: every active sampling and metering loop
    pub fn on_frame(&mut self) {
        // Ends reached during the last render must be known before sampling
        self.pump_events();
        for kind in self.transport.loops().kinds() {
            match kind {
                LoopKind::Sampling => self.transport.sample(&self.registry),
                LoopKind::Metering(id) => match self.registry.analyser_level(&mut self.ctx, &id) {
                    Some(level) => {
                        self.levels.insert(id, level);
                    }
                    None => {
                        self.transport.loops_mut().cancel_kind(&LoopKind::Metering(id));
                    }
                },
            }
        }
        self.pump_events();
    }

    pub fn start_metering(&mut self, id: &TrackId) -> Option<LoopHandle> {
        if !self.registry.contains(id) {
            log::warn!("start_metering: {}", MixError::GraphState(id.clone()));
            return None;
        }
        Some(self.transport.loops_mut().request(LoopKind::Metering(id.clone())))
    }

    pub fn stop_metering(&mut self, id: &TrackId) -> bool {
        self.levels.remove(id);
        self.transport.loops_mut().cancel_kind(&LoopKind::Metering(id.clone()))
    }

    /// Most recent meter level of a track, 0..100
    pub fn level(&self, id: &TrackId) -> Option<f32> {
        self.levels.get(id).copied()
    }

    // Output

    /// Pull interleaved stereo for the output device
    pub fn render(&mut self, output: &mut [f32]) {
        if self.closed {
            output.fill(0.0);
            return;
        }
        self.ctx.render(output);
    }

    /// Bounce the current mix to WAV
    ///
    /// Any failure aborts the export, is reported once and leaves the live
    /// session untouched.
    pub fn export(&mut self, progress: &mut dyn FnMut(ExportProgress)) -> Result<ExportedMix, ExportError> {
        let snapshot = self.store.current().clone();
        let result = self
            .fetch_sources(&snapshot)
            .and_then(|sources| self.renderer.export_wav(&snapshot, &sources, progress));

        match result {
            Ok(bytes) => {
                let filename = format!("{}{}", self.title, self.config.export.filename_suffix);
                log::info!("exported '{}'", filename);
                Ok(ExportedMix { filename, bytes })
            }
            Err(e) => {
                self.notifier.report(&MixError::Export(e.clone()));
                Err(e)
            }
        }
    }

    fn fetch_sources(&self, snapshot: &MixSnapshot) -> Result<HashMap<TrackId, Vec<u8>>, ExportError> {
        snapshot
            .tracks
            .iter()
            .map(|track| {
                self.source
                    .fetch(&track.source)
                    .map(|bytes| (track.id.clone(), bytes))
                    .map_err(|e| ExportError::Fetch {
                        track: track.id.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    /// Cancel every frame loop, stop playback and release all tracks
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let cancelled = self.transport.loops_mut().cancel_all();
        self.transport.pause_all(&self.registry);
        self.registry.teardown(&mut self.ctx);
        self.levels.clear();
        self.closed = true;
        log::info!("closed session '{}' ({} loop(s) cancelled)", self.title, cancelled);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
