//! Keyed JSON store listing each session's stems
//!
//! ```json
//! {
//!   "track-stems": { "<session>": { "stems": [{ "id": "...", "name": "...", "url": "..." }] } },
//!   "tracks": [{ "id": "<session>", "title": "..." }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::state::{Track, TRACK_COLORS};

pub const UNTITLED: &str = "Untitled Project";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemRecord {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemGroup {
    #[serde(default)]
    pub stems: Vec<StemRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "track-stems", default)]
    pub track_stems: HashMap<String, StemGroup>,
    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&contents)?;
        log::info!("catalog: loaded {} session(s) from {:?}", catalog.track_stems.len(), path);
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn stems(&self, session: &str) -> &[StemRecord] {
        self.track_stems.get(session).map(|g| g.stems.as_slice()).unwrap_or(&[])
    }

    /// Human-readable title of a session
    pub fn title(&self, session: &str) -> String {
        self.tracks
            .iter()
            .find(|t| t.id == session)
            .and_then(|t| t.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    /// Initial tracks of a session, colored by position
    pub fn tracks(&self, session: &str) -> Vec<Track> {
        let stems = self.stems(session);
        if stems.is_empty() {
            log::warn!("catalog: no stems for session '{}'", session);
        }
        stems
            .iter()
            .enumerate()
            .map(|(i, stem)| {
                Track::new(stem.id.as_str(), stem.name.as_str(), stem.url.as_str())
                    .with_color(TRACK_COLORS[i % TRACK_COLORS.len()])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "track-stems": {
            "song-1": { "stems": [
                { "id": "d", "name": "Drums", "url": "drums.wav" },
                { "id": "b", "name": "Bass", "url": "bass.wav" },
                { "id": "v", "name": "Vocals", "url": "vox.wav" },
                { "id": "g", "name": "Guitar", "url": "gtr.wav" },
                { "id": "k", "name": "Keys", "url": "keys.wav" },
                { "id": "s", "name": "Synth", "url": "synth.wav" },
                { "id": "p", "name": "Perc", "url": "perc.wav" }
            ] }
        },
        "tracks": [{ "id": "song-1", "title": "Night Drive" }]
    }"#;

    #[test]
    fn tracks_cycle_colors() {
        let catalog = Catalog::from_json(JSON).unwrap();
        let tracks = catalog.tracks("song-1");
        assert_eq!(tracks.len(), 7);
        assert_eq!(tracks[0].color, TRACK_COLORS[0]);
        assert_eq!(tracks[5].color, TRACK_COLORS[5]);
        assert_eq!(tracks[6].color, TRACK_COLORS[0]);
        assert_eq!(tracks[1].source, "bass.wav");
        assert_eq!(tracks[1].volume, 100);
        assert_eq!(catalog.title("song-1"), "Night Drive");
    }

    #[test]
    fn unknown_session_is_empty_and_untitled() {
        let catalog = Catalog::from_json(JSON).unwrap();
        assert!(catalog.tracks("nope").is_empty());
        assert_eq!(catalog.title("nope"), UNTITLED);
        assert_eq!(Catalog::from_json("{}").unwrap(), Catalog::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = Catalog::from_json(JSON).unwrap();
        catalog.save(&path).unwrap();
        assert_eq!(Catalog::load(&path).unwrap(), catalog);
        assert!(matches!(
            Catalog::load(&dir.path().join("missing.json")),
            Err(CatalogError::Io { .. })
        ));
    }
}
