//! Playback elements: decoded audio with a play head
//!
//! An element is shared between the control side (transport, registry) and
//! the graph node that pulls audio from it, so it lives behind a mutex.
//! Lifecycle changes are queued as [`MediaEvent`]s and drained by the
//! registry.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::node_graph::CHANNELS;
use crate::error::PlaybackError;
use crate::io::AudioBuffer;

pub type SharedElement = Arc<Mutex<MediaElement>>;

/// Lifecycle notifications of a playback element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Audio is decoded; carries the duration in seconds
    LoadedMetadata(f64),
    Play,
    Pause,
    /// The play head reached the end of the audio
    Ended,
    /// The source could not be loaded
    Error(String),
}

#[derive(Debug, Default)]
pub struct MediaElement {
    buffer: Option<Arc<AudioBuffer>>,
    /// Play head in frames
    position: usize,
    paused: bool,
    released: bool,
    error: Option<String>,
    events: VecDeque<MediaEvent>,
}

impl MediaElement {
    /// An element with nothing loaded yet
    pub fn new() -> Self {
        Self {
            paused: true,
            ..Default::default()
        }
    }

    pub fn shared() -> SharedElement {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Attach decoded audio; the duration becomes known
    pub fn load(&mut self, buffer: Arc<AudioBuffer>) {
        let duration = buffer.duration();
        self.buffer = Some(buffer);
        self.position = 0;
        self.error = None;
        self.events.push_back(MediaEvent::LoadedMetadata(duration));
    }

    /// Mark the source as failed
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.buffer = None;
        self.paused = true;
        self.error = Some(reason.clone());
        self.events.push_back(MediaEvent::Error(reason));
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if self.released {
            return Err(PlaybackError::Released);
        }
        if let Some(reason) = &self.error {
            return Err(PlaybackError::LoadFailed(reason.clone()));
        }
        let Some(buffer) = &self.buffer else {
            return Err(PlaybackError::NotLoaded);
        };

        // Playing from the end restarts
        if self.position >= buffer.frames() {
            self.position = 0;
        }
        if self.paused {
            self.paused = false;
            self.events.push_back(MediaEvent::Play);
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.events.push_back(MediaEvent::Pause);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Duration in seconds, `None` until audio is loaded
    pub fn duration(&self) -> Option<f64> {
        self.buffer.as_ref().map(|b| b.duration())
    }

    /// Play head in seconds
    pub fn current_time(&self) -> f64 {
        match &self.buffer {
            Some(buffer) => self.position as f64 / buffer.sample_rate() as f64,
            None => 0.0,
        }
    }

    /// Move the play head. A no-op returning false while the duration is unknown.
    pub fn set_current_time(&mut self, seconds: f64) -> bool {
        let Some(buffer) = &self.buffer else {
            return false;
        };
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let frame = (seconds * buffer.sample_rate() as f64).round() as usize;
        self.position = frame.min(buffer.frames());
        true
    }

    /// Drop the audio and stop for good
    pub fn release(&mut self) {
        self.pause();
        self.buffer = None;
        self.released = true;
        self.position = 0;
    }

    /// Fill one quantum of interleaved stereo; silence while paused
    pub fn read_quantum(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if self.paused {
            return;
        }
        let Some(buffer) = &self.buffer else {
            return;
        };

        self.position += buffer.read_frames(self.position, output);
        if self.position >= buffer.frames() && output.len() >= CHANNELS {
            self.paused = true;
            self.events.push_back(MediaEvent::Pause);
            self.events.push_back(MediaEvent::Ended);
        }
    }

    /// Take the queued lifecycle events
    pub fn drain_events(&mut self) -> Vec<MediaEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(frames: usize) -> MediaElement {
        let mut element = MediaElement::new();
        element.load(Arc::new(AudioBuffer::new(vec![0.5; frames * 2], 1000)));
        element
    }

    #[test]
    fn seek_without_duration_is_a_noop() {
        let mut element = MediaElement::new();
        assert!(!element.set_current_time(3.0));
        assert_eq!(element.current_time(), 0.0);
        assert_eq!(element.play(), Err(PlaybackError::NotLoaded));
    }

    #[test]
    fn plays_to_the_end_and_reports() {
        let mut element = loaded(200);
        assert_eq!(element.drain_events(), vec![MediaEvent::LoadedMetadata(0.2)]);
        element.play().unwrap();

        let mut out = vec![0.0; 256];
        element.read_quantum(&mut out);
        assert_eq!(out[0], 0.5);
        element.read_quantum(&mut out);
        assert_eq!(out[143], 0.5);
        assert_eq!(out[144], 0.0);
        assert!(element.is_paused());
        assert_eq!(
            element.drain_events(),
            vec![MediaEvent::Play, MediaEvent::Pause, MediaEvent::Ended]
        );
    }

    #[test]
    fn paused_element_is_silent() {
        let mut element = loaded(500);
        let mut out = vec![1.0; 256];
        element.read_quantum(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(element.current_time(), 0.0);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let mut element = loaded(1000);
        assert!(element.set_current_time(5.0));
        assert_eq!(element.current_time(), 1.0);
        assert!(element.set_current_time(-1.0));
        assert_eq!(element.current_time(), 0.0);
    }

    #[test]
    fn failed_and_released_refuse_to_play() {
        let mut element = MediaElement::new();
        element.fail("bad header");
        assert_eq!(element.play(), Err(PlaybackError::LoadFailed("bad header".into())));

        let mut element = loaded(10);
        element.release();
        assert_eq!(element.play(), Err(PlaybackError::Released));
        assert_eq!(element.duration(), None);
    }
}
