pub mod biquad;
pub mod convolution;
pub mod impulse;

pub use biquad::{BiquadFilter, FilterKind};
pub use convolution::{ConvolutionKernel, PartitionedConvolver, HEAD_BLOCK, TAIL_BLOCK};
pub use impulse::ImpulseResponse;
