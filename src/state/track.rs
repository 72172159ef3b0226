use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque track identifier, unique within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Colors assigned to tracks by position when a session is opened
pub const TRACK_COLORS: [&str; 6] = ["#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD"];

pub const VOLUME_RANGE: (i32, i32) = (0, 100);
pub const PAN_RANGE: (i32, i32) = (-100, 100);
pub const SEND_RANGE: (i32, i32) = (0, 100);
pub const DELAY_TIME_RANGE: (i32, i32) = (0, 1000);
pub const EQ_RANGE: (f32, f32) = (-12.0, 12.0);

/// A labelled time range on a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Region {
    /// The single whole-track region synthesized once a duration is known
    pub fn default_for(track: &TrackId, duration: f64) -> Self {
        Self {
            id: format!("{}-region-default", track),
            start: 0.0,
            end: duration.max(0.0),
            label: None,
        }
    }

    /// Ensure `0 <= start <= end`
    pub fn normalized(mut self) -> Self {
        self.start = if self.start.is_finite() { self.start.max(0.0) } else { 0.0 };
        self.end = if self.end.is_finite() { self.end.max(self.start) } else { self.start };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelaySettings {
    /// Delay time in milliseconds, 0..1000
    pub time: u16,
    /// Feedback percent, 0..100
    pub feedback: u8,
    /// Wet mix percent, 0..100
    pub mix: u8,
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            time: 250,
            feedback: 30,
            mix: 0,
        }
    }
}

/// Three-band EQ gains in dB, each -12..12
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EqSettings {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEffects {
    /// Reverb send percent, 0..100
    pub reverb: u8,
    pub delay: DelaySettings,
    pub eq: EqSettings,
}

/// Per-family bypass flags. A bypassed family keeps its stored values
/// but contributes neutrally to the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EffectBypass {
    pub reverb: bool,
    pub delay: bool,
    pub eq: bool,
}

impl EffectBypass {
    pub fn get(&self, family: EffectFamily) -> bool {
        match family {
            EffectFamily::Reverb => self.reverb,
            EffectFamily::Delay => self.delay,
            EffectFamily::Eq => self.eq,
        }
    }

    pub fn toggle(&mut self, family: EffectFamily) {
        match family {
            EffectFamily::Reverb => self.reverb = !self.reverb,
            EffectFamily::Delay => self.delay = !self.delay,
            EffectFamily::Eq => self.eq = !self.eq,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectFamily {
    Reverb,
    Delay,
    Eq,
}

/// One stem of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub color: String,
    /// Locator of the encoded audio
    pub source: String,
    /// 0..100
    pub volume: u8,
    /// -100 (left) ..100 (right)
    pub pan: i8,
    pub muted: bool,
    pub solo: bool,
    pub effects: TrackEffects,
    pub effects_bypassed: EffectBypass,
    pub regions: Vec<Region>,
}

impl Track {
    /// A track with default mix settings
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: TRACK_COLORS[0].to_string(),
            source: source.into(),
            volume: 100,
            pan: 0,
            muted: false,
            solo: false,
            effects: TrackEffects::default(),
            effects_bypassed: EffectBypass::default(),
            regions: Vec::new(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Restore mix settings to defaults, keeping identity and source
    pub fn reset(&mut self) {
        self.volume = 100;
        self.pan = 0;
        self.muted = false;
        self.solo = false;
        self.effects = TrackEffects::default();
        self.effects_bypassed = EffectBypass::default();
        self.regions.clear();
    }

    /// Muted outright, or silenced because another track is soloed
    pub fn is_effectively_muted(&self, any_solo: bool) -> bool {
        self.muted || (any_solo && !self.solo)
    }

    /// Linear gain the track's output stage should carry
    pub fn effective_gain(&self, any_solo: bool) -> f32 {
        if self.is_effectively_muted(any_solo) {
            0.0
        } else {
            self.volume as f32 / 100.0
        }
    }
}

/// True if any track in the list is soloed
pub fn any_solo(tracks: &[Track]) -> bool {
    tracks.iter().any(|t| t.solo)
}
