pub mod analyser;
pub mod compressor;
pub mod convolver;
pub mod delay;
pub mod filter;
pub mod gain;
pub mod output;
pub mod panner;
pub mod source;

pub use analyser::AnalyserNode;
pub use compressor::DynamicsCompressorNode;
pub use convolver::{ConvolverNode, ReverbKernel};
pub use delay::DelayNode;
pub use filter::BiquadFilterNode;
pub use gain::GainNode;
pub use output::DestinationNode;
pub use panner::StereoPannerNode;
pub use source::{BufferSourceNode, MediaElementSourceNode};
