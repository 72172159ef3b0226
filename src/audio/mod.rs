pub mod context;
pub mod effect_chain;
pub mod master_bus;
pub mod node_graph;
pub mod offline;
pub mod playback;
pub mod registry;
pub mod session;
pub mod transport;

pub use context::AudioContext;
pub use effect_chain::{EffectChainFactory, TrackNodes, TrackParam};
pub use master_bus::MasterBus;
pub use offline::{ExportProgress, OfflineRenderer, RenderedBuffer};
pub use playback::{MediaElement, MediaEvent, SharedElement};
pub use registry::TrackGraphRegistry;
pub use session::{ExportedMix, MixSession};
pub use transport::{FrameLoops, LoopHandle, LoopKind, LoopWindow, TransportController};
