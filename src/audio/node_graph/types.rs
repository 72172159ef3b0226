use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frames per render quantum. Every node processes exactly this many
/// interleaved stereo frames per call.
pub const RENDER_QUANTUM: usize = 128;

/// Channels carried on every edge (interleaved L/R)
pub const CHANNELS: usize = 2;

/// Samples in one quantum buffer
pub const QUANTUM_SAMPLES: usize = RENDER_QUANTUM * CHANNELS;

/// User-facing parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub id: u32,
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub unit: ParameterUnit,
}

impl Parameter {
    pub fn new(id: u32, name: impl Into<String>, min: f32, max: f32, default: f32, unit: ParameterUnit) -> Self {
        Self {
            id,
            name: name.into(),
            min,
            max,
            default,
            unit,
        }
    }

    /// Clamp a value into this parameter's range
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        value.clamp(self.min, self.max)
    }
}

/// Units for parameter values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterUnit {
    Generic,
    Frequency,  // Hz
    Decibels,   // dB
    Time,       // seconds
    Toggle,     // 0 or 1
}

/// Kind of edge between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Sample-synchronous connection; must not close a cycle
    Forward,
    /// Closes a loop; the target receives the source's previous quantum
    Feedback,
}

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("node does not exist")]
    InvalidNode,
    #[error("node '{0}' takes no input")]
    NoInput(String),
    #[error("connection would create a cycle")]
    WouldCreateCycle,
    #[error("node '{0}' cannot close a feedback loop")]
    NotFeedbackTarget(String),
}
