use serde::{Deserialize, Serialize};

use super::track::{any_solo, EqSettings, Track, TrackId};

pub const MASTER_VOLUME_RANGE: (i32, i32) = (0, 100);
pub const COMPRESSOR_THRESHOLD_RANGE: (f32, f32) = (-100.0, 0.0);
pub const COMPRESSOR_RATIO_RANGE: (f32, f32) = (1.0, 20.0);
pub const COMPRESSOR_TIME_RANGE_MS: (f32, f32) = (0.0, 1000.0);
pub const LIMITER_THRESHOLD_RANGE: (f32, f32) = (-60.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -20.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterSettings {
    pub enabled: bool,
    pub threshold_db: f32,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_db: -1.0,
        }
    }
}

/// Session-wide processing after the track sum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterBusSettings {
    /// 0..100
    pub volume: u8,
    pub eq: EqSettings,
    pub eq_enabled: bool,
    pub compressor: CompressorSettings,
    pub compressor_enabled: bool,
    pub limiter: LimiterSettings,
}

impl Default for MasterBusSettings {
    fn default() -> Self {
        Self {
            volume: 100,
            eq: EqSettings::default(),
            eq_enabled: false,
            compressor: CompressorSettings::default(),
            compressor_enabled: false,
            limiter: LimiterSettings::default(),
        }
    }
}

/// Immutable value describing every track and the master bus at one
/// instant. Edits produce a new snapshot; the previous one is never mutated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixSnapshot {
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub master: MasterBusSettings,
}

impl MixSnapshot {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            master: MasterBusSettings::default(),
        }
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }

    pub fn any_solo(&self) -> bool {
        any_solo(&self.tracks)
    }

    /// Linear output gain of a track after mute/solo resolution
    pub fn effective_gain(&self, id: &TrackId) -> Option<f32> {
        let any_solo = self.any_solo();
        self.track(id).map(|t| t.effective_gain(any_solo))
    }
}
