//! Shared transport: play/pause/seek/loop over every registered track, and
//! the per-frame loops that sample play heads and meters

use std::collections::{BTreeMap, HashMap, HashSet};

use super::registry::TrackGraphRegistry;
use crate::command::SessionEvent;
use crate::error::MixError;
use crate::notify::Notifier;
use crate::state::TrackId;

/// Loop region in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopWindow {
    pub enabled: bool,
    pub start: f64,
    pub end: f64,
}

impl LoopWindow {
    /// Whether the window can rewind anything
    pub fn is_active(&self) -> bool {
        self.enabled && self.end > self.start
    }
}

/// What a frame loop does each tick
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoopKind {
    /// Record play heads and apply the loop window
    Sampling,
    /// Refresh one track's meter level
    Metering(TrackId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopHandle(u64);

/// Cancellable per-frame callbacks
#[derive(Debug, Default)]
pub struct FrameLoops {
    next_handle: u64,
    active: BTreeMap<LoopHandle, LoopKind>,
}

impl FrameLoops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a loop. Requesting a kind that already runs returns its handle.
    pub fn request(&mut self, kind: LoopKind) -> LoopHandle {
        if let Some((handle, _)) = self.active.iter().find(|(_, k)| **k == kind) {
            return *handle;
        }
        let handle = LoopHandle(self.next_handle);
        self.next_handle += 1;
        self.active.insert(handle, kind);
        handle
    }

    pub fn cancel(&mut self, handle: LoopHandle) -> bool {
        self.active.remove(&handle).is_some()
    }

    pub fn cancel_kind(&mut self, kind: &LoopKind) -> bool {
        let before = self.active.len();
        self.active.retain(|_, k| k != kind);
        self.active.len() != before
    }

    /// Cancel everything; returns how many loops were running
    pub fn cancel_all(&mut self) -> usize {
        let count = self.active.len();
        self.active.clear();
        count
    }

    pub fn is_running(&self, kind: &LoopKind) -> bool {
        self.active.values().any(|k| k == kind)
    }

    /// Kinds to run this frame
    pub fn kinds(&self) -> Vec<LoopKind> {
        self.active.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Coordinates playback across tracks
///
/// Play heads live in the elements; the controller keeps the last sampled
/// time of each track, known durations and the loop window. None of this is
/// part of the mix snapshot.
///
/// A track that runs out before the loop end is parked at its end and
/// rejoins at the loop start when the loop wraps, so shorter stems stay
/// aligned with the longest one.
#[derive(Debug)]
pub struct TransportController {
    loop_window: LoopWindow,
    /// The loop end tracks the longest duration until a loop is set
    loop_end_follows_duration: bool,
    durations: HashMap<TrackId, f64>,
    times: HashMap<TrackId, f64>,
    /// Tracks that ended while the loop was active
    parked: HashSet<TrackId>,
    loops: FrameLoops,
}

impl Default for TransportController {
    fn default() -> Self {
        Self {
            loop_window: LoopWindow::default(),
            loop_end_follows_duration: true,
            durations: HashMap::new(),
            times: HashMap::new(),
            parked: HashSet::new(),
            loops: FrameLoops::default(),
        }
    }
}

impl TransportController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play_all(&mut self, registry: &TrackGraphRegistry, notifier: &dyn Notifier) {
        for (id, element) in registry.elements() {
            let mut element = element.lock();
            if !element.is_paused() {
                continue;
            }
            if let Err(e) = element.play() {
                notifier.report(&MixError::Playback {
                    track: id,
                    reason: e.to_string(),
                });
            }
        }
    }

    pub fn pause_all(&mut self, registry: &TrackGraphRegistry) {
        self.parked.clear();
        for (_, element) in registry.elements() {
            element.lock().pause();
        }
    }

    /// Pause everything if anything plays, otherwise play everything
    pub fn toggle_play_all(&mut self, registry: &TrackGraphRegistry, notifier: &dyn Notifier) {
        if self.is_anything_playing(registry) {
            self.pause_all(registry);
        } else {
            self.play_all(registry, notifier);
        }
    }

    /// Play or pause one track
    pub fn toggle_track(&mut self, registry: &TrackGraphRegistry, id: &TrackId, notifier: &dyn Notifier) {
        let Some(element) = registry.element(id) else {
            log::warn!("toggle_track: {}", MixError::GraphState(id.clone()));
            return;
        };
        let mut element = element.lock();
        if !element.is_paused() {
            element.pause();
            drop(element);
            // Nothing left to wrap the loop for parked tracks
            if !self.is_anything_playing(registry) {
                self.parked.clear();
            }
        } else {
            self.parked.remove(id);
            if let Err(e) = element.play() {
                notifier.report(&MixError::Playback {
                    track: id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    pub fn is_anything_playing(&self, registry: &TrackGraphRegistry) -> bool {
        !self.playing(registry).is_empty()
    }

    /// Tracks whose element is not paused
    pub fn playing(&self, registry: &TrackGraphRegistry) -> Vec<TrackId> {
        registry
            .elements()
            .into_iter()
            .filter(|(_, element)| !element.lock().is_paused())
            .map(|(id, _)| id)
            .collect()
    }

    /// Where a seek to `time` lands for a track of `duration`
    pub fn clamp_time(&self, time: f64, duration: Option<f64>) -> f64 {
        let mut time = if time.is_finite() { time } else { 0.0 };
        if self.loop_window.is_active() {
            time = time.clamp(self.loop_window.start, self.loop_window.end);
        }
        let end = duration.unwrap_or(f64::INFINITY);
        time.clamp(0.0, end.max(0.0))
    }

    /// Move one track's play head. Returns the time applied, or `None` if
    /// the track is unknown or its duration is not known yet.
    pub fn seek(&mut self, registry: &TrackGraphRegistry, id: &TrackId, time: f64) -> Option<f64> {
        let Some(element) = registry.element(id) else {
            log::warn!("seek: {}", MixError::GraphState(id.clone()));
            return None;
        };
        let mut element = element.lock();
        let target = self.clamp_time(time, element.duration());
        if !element.set_current_time(target) {
            log::debug!("seek: '{}' has no duration yet, ignoring", id);
            return None;
        }
        self.times.insert(id.clone(), target);

        // A parked track moved back inside its audio plays along again
        if element.current_time() < element.duration().unwrap_or(0.0) && self.parked.remove(id) {
            if let Err(e) = element.play() {
                log::warn!("seek: could not resume '{}': {}", id, e);
            }
        }
        Some(target)
    }

    /// Move every play head to the same time
    pub fn seek_all(&mut self, registry: &TrackGraphRegistry, time: f64) {
        for id in registry.ids() {
            self.seek(registry, &id, time);
        }
    }

    pub fn set_loop(&mut self, enabled: bool, start: f64, end: f64) {
        let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
        let end = if end.is_finite() { end.max(start) } else { start };
        self.loop_window = LoopWindow { enabled, start, end };
        self.loop_end_follows_duration = false;
        if !self.loop_window.is_active() {
            self.parked.clear();
        }
        log::debug!("loop window {:?}", self.loop_window);
    }

    pub fn loop_window(&self) -> LoopWindow {
        self.loop_window
    }

    /// Longest known track duration
    pub fn duration(&self) -> f64 {
        self.durations.values().copied().fold(0.0, f64::max)
    }

    pub fn track_duration(&self, id: &TrackId) -> Option<f64> {
        self.durations.get(id).copied()
    }

    /// Last sampled play head of a track
    pub fn current_time(&self, id: &TrackId) -> Option<f64> {
        self.times.get(id).copied()
    }

    pub fn times(&self) -> &HashMap<TrackId, f64> {
        &self.times
    }

    /// Fold a lifecycle event into the transport state
    pub fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::DurationKnown(id, duration) => {
                self.durations.insert(id.clone(), *duration);
                let total = self.duration();
                if total > 0.0 && (self.loop_end_follows_duration || self.loop_window.end == 0.0) {
                    self.loop_window.end = total;
                }
            }
            SessionEvent::Ended(id) => {
                if self.loop_window.is_active() {
                    log::debug!("'{}' ended inside the loop, waiting for the wrap", id);
                    self.parked.insert(id.clone());
                }
            }
            SessionEvent::PlayingChanged(..) | SessionEvent::LoadFailed(..) => {}
        }
    }

    /// Tracks waiting at their end for the loop to wrap
    pub fn is_parked(&self, id: &TrackId) -> bool {
        self.parked.contains(id)
    }

    /// Drop everything known about a removed track
    pub fn forget(&mut self, id: &TrackId) {
        self.durations.remove(id);
        self.times.remove(id);
        self.parked.remove(id);
        self.loops.cancel_kind(&LoopKind::Metering(id.clone()));
    }

    /// One sampling tick: record the play head of every playing track and
    /// rewind the ones that reached the loop end
    ///
    /// The loop wraps when a playing track reaches the end, or when every
    /// track has run out before it. Parked tracks then restart from the
    /// loop start, unless it lies past their own end.
    pub fn sample(&mut self, registry: &TrackGraphRegistry) {
        let window = self.loop_window;
        let elements = registry.elements();
        let mut wrapped = false;
        let mut playing = 0;

        for (id, element) in &elements {
            let mut element = element.lock();
            if element.is_paused() {
                continue;
            }
            playing += 1;
            let mut time = element.current_time();
            if window.is_active() && time >= window.end {
                element.set_current_time(window.start);
                time = window.start;
                wrapped = true;
            }
            self.times.insert(id.clone(), time);
        }

        if !window.is_active() || self.parked.is_empty() || !(wrapped || playing == 0) {
            return;
        }
        for (id, element) in &elements {
            if !self.parked.contains(id) {
                continue;
            }
            let mut element = element.lock();
            element.set_current_time(window.start);
            self.times.insert(id.clone(), window.start);
            if element.current_time() >= element.duration().unwrap_or(0.0) {
                continue;
            }
            self.parked.remove(id);
            if let Err(e) = element.play() {
                log::warn!("loop restart of '{}' failed: {}", id, e);
            }
        }
    }

    pub fn loops(&self) -> &FrameLoops {
        &self.loops
    }

    pub fn loops_mut(&mut self) -> &mut FrameLoops {
        &mut self.loops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_window_clamps_seeks() {
        let mut transport = TransportController::new();
        transport.set_loop(true, 10.0, 20.0);
        assert_eq!(transport.clamp_time(5.0, Some(30.0)), 10.0);
        assert_eq!(transport.clamp_time(25.0, Some(30.0)), 20.0);
        assert_eq!(transport.clamp_time(15.0, Some(30.0)), 15.0);

        transport.set_loop(false, 10.0, 20.0);
        assert_eq!(transport.clamp_time(5.0, Some(30.0)), 5.0);
        assert_eq!(transport.clamp_time(45.0, Some(30.0)), 30.0);
        assert_eq!(transport.clamp_time(-3.0, None), 0.0);
    }

    #[test]
    fn loop_end_defaults_to_duration() {
        let mut transport = TransportController::new();
        transport.observe(&SessionEvent::DurationKnown(TrackId::from("a"), 12.0));
        assert_eq!(transport.loop_window().end, 12.0);
        transport.observe(&SessionEvent::DurationKnown(TrackId::from("b"), 30.0));
        assert_eq!(transport.duration(), 30.0);
        assert_eq!(transport.loop_window().end, 30.0);

        // A loop set by the user is kept
        transport.set_loop(true, 2.0, 8.0);
        transport.observe(&SessionEvent::DurationKnown(TrackId::from("c"), 45.0));
        assert_eq!(transport.loop_window().end, 8.0);
    }

    #[test]
    fn only_ends_inside_an_active_loop_park() {
        let mut transport = TransportController::new();
        transport.observe(&SessionEvent::Ended(TrackId::from("a")));
        assert!(!transport.is_parked(&TrackId::from("a")));

        transport.set_loop(true, 0.0, 10.0);
        transport.observe(&SessionEvent::Ended(TrackId::from("a")));
        assert!(transport.is_parked(&TrackId::from("a")));

        transport.set_loop(false, 0.0, 10.0);
        assert!(!transport.is_parked(&TrackId::from("a")));
    }

    #[test]
    fn frame_loops_are_cancellable() {
        let mut loops = FrameLoops::new();
        let sampling = loops.request(LoopKind::Sampling);
        assert_eq!(loops.request(LoopKind::Sampling), sampling);
        let meter = loops.request(LoopKind::Metering(TrackId::from("a")));
        assert_ne!(meter, sampling);
        assert_eq!(loops.len(), 2);

        assert!(loops.cancel(meter));
        assert!(!loops.cancel(meter));
        assert!(loops.is_running(&LoopKind::Sampling));
        assert_eq!(loops.cancel_all(), 1);
        assert!(loops.is_empty());
    }
}
