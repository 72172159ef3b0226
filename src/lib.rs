// Stem Mixer
//
// Multi-track stems mixing engine: per-track EQ, delay and convolution
// reverb chains on a shared node graph, a master bus, a shared transport,
// undoable mix state and an offline WAV bounce of the same graph.
// Uses petgraph for the graph, symphonia for decoding and cpal for output.

pub mod audio;
pub mod command;
pub mod config;
pub mod dsp;
pub mod error;
pub mod io;
pub mod notify;
pub mod state;

// Re-export commonly used types
pub use audio::{ExportProgress, ExportedMix, MixSession, OfflineRenderer, TrackGraphRegistry, TransportController};
pub use command::{Command, SessionEvent};
pub use config::EngineConfig;
pub use error::{ExportError, MixError, SessionError};
pub use io::{AudioFile, AudioSource, Catalog, FileSource, MemorySource};
pub use notify::{CollectingNotifier, LogNotifier, Notifier};
pub use state::{MixSnapshot, MixStateStore, Track, TrackId, UndoRedoHistory};
