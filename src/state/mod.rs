pub mod history;
pub mod reducers;
pub mod snapshot;
pub mod store;
pub mod track;

pub use history::UndoRedoHistory;
pub use snapshot::{CompressorSettings, LimiterSettings, MasterBusSettings, MixSnapshot};
pub use store::MixStateStore;
pub use track::{
    any_solo, DelaySettings, EffectBypass, EffectFamily, EqSettings, Region, Track, TrackEffects, TrackId,
    TRACK_COLORS,
};
