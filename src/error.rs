//! Error types shared across the mixing engine.
//!
//! User-facing operations never panic; they return one of these and the
//! session reports it through a [`crate::notify::Notifier`].

use thiserror::Error;

use crate::audio::node_graph::ConnectionError;
use crate::state::TrackId;

/// Reportable failures surfaced to the host.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixError {
    /// A track's source could not be fetched or decoded; the track stays
    /// registered but silent.
    #[error("could not load audio for track '{track}': {reason}")]
    SourceDecode { track: TrackId, reason: String },

    /// A playback element refused to start.
    #[error("playback failed for track '{track}': {reason}")]
    Playback { track: TrackId, reason: String },

    /// A parameter was outside its range and was clamped.
    #[error("{name} = {value} is out of range, clamped to {clamped}")]
    InvalidParameter { name: &'static str, value: f64, clamped: f64 },

    /// An operation referenced a track with no live node graph.
    #[error("track '{0}' has no live node graph")]
    GraphState(TrackId),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

/// Failures of the offline bounce. Any of these aborts the whole export.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("nothing to export: the mix has no tracks")]
    EmptyMix,

    #[error("could not fetch audio for track '{track}': {reason}")]
    Fetch { track: TrackId, reason: String },

    #[error("could not decode audio for track '{track}': {reason}")]
    Decode { track: TrackId, reason: String },

    #[error("could not build the render graph: {0}")]
    Render(#[from] ConnectionError),
}

/// Failures while fetching raw encoded bytes for a track.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("unsupported source location: {0}")]
    Unsupported(String),

    #[error("i/o error reading {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Failures while decoding encoded audio into PCM.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("failed to probe stream: {0}")]
    Probe(String),

    #[error("no decodable audio track found")]
    NoTrack,

    #[error("stream does not declare {0}")]
    MissingParameter(&'static str),

    #[error("decoder failure: {0}")]
    Decoder(String),
}

/// Reasons a playback element refuses to start.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("no audio loaded yet")]
    NotLoaded,

    #[error("source failed to load: {0}")]
    LoadFailed(String),

    #[error("element has been released")]
    Released,
}

/// Failures that prevent a session from opening at all.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("could not build the master bus: {0}")]
    MasterBus(#[from] ConnectionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("could not read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;
