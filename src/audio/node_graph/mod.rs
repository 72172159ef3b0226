mod graph;
mod node_trait;
pub mod nodes;
pub mod types;

pub use graph::{AudioGraph, Connection, GraphNode};
pub use node_trait::AudioNode;
pub use petgraph::stable_graph::NodeIndex;
pub use types::{ConnectionError, EdgeKind, Parameter, ParameterUnit, CHANNELS, QUANTUM_SAMPLES, RENDER_QUANTUM};
