use super::node_trait::AudioNode;
use super::types::{ConnectionError, EdgeKind, QUANTUM_SAMPLES};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeFiltered, EdgeRef};
use petgraph::Direction;

/// Connection information between nodes
#[derive(Debug, Clone, Copy)]
pub struct Connection {
    pub kind: EdgeKind,
}

/// Wrapper for audio nodes in the graph
pub struct GraphNode {
    pub node: Box<dyn AudioNode>,
    /// Output of the most recent quantum (interleaved L/R)
    pub output: Vec<f32>,
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("node", &self.node.node_type())
            .field("name", &self.node.name())
            .finish()
    }
}

impl GraphNode {
    pub fn new(node: Box<dyn AudioNode>) -> Self {
        Self {
            node,
            output: vec![0.0; QUANTUM_SAMPLES],
        }
    }
}

/// Audio processing graph shared by every track chain and the master bus
///
/// Nodes live in a `StableGraph` arena so removing one track's chain never
/// invalidates the handles held for the others.
#[derive(Debug)]
pub struct AudioGraph {
    graph: StableGraph<GraphNode, Connection>,

    /// Cached processing order over forward edges
    order: Vec<NodeIndex>,
    order_dirty: bool,

    sample_rate: u32,

    /// Summed forward inputs of the node being processed
    input_scratch: Vec<f32>,

    /// Summed feedback inputs of the node being processed
    feedback_scratch: Vec<f32>,
}

impl AudioGraph {
    /// Create a new empty audio graph
    pub fn new(sample_rate: u32) -> Self {
        Self {
            graph: StableGraph::new(),
            order: Vec::new(),
            order_dirty: false,
            sample_rate,
            input_scratch: vec![0.0; QUANTUM_SAMPLES],
            feedback_scratch: vec![0.0; QUANTUM_SAMPLES],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Box<dyn AudioNode>) -> NodeIndex {
        self.order_dirty = true;
        self.graph.add_node(GraphNode::new(node))
    }

    /// Remove a node and every edge touching it. Returns false if the node
    /// was already gone.
    pub fn remove_node(&mut self, node: NodeIndex) -> bool {
        let removed = self.graph.remove_node(node).is_some();
        if removed {
            self.order_dirty = true;
        }
        removed
    }

    /// Get the number of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.graph.contains_node(node)
    }

    /// Connect two nodes with a sample-synchronous edge
    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex) -> Result<(), ConnectionError> {
        if self.find_connection(from, to, EdgeKind::Forward).is_some() {
            return Ok(());
        }

        self.validate_target(from, to)?;

        // If there's already a forward path from 'to' to 'from', adding
        // 'from' -> 'to' would close a cycle
        let forward = EdgeFiltered::from_fn(&self.graph, |e| e.weight().kind == EdgeKind::Forward);
        if from == to || has_path_connecting(&forward, to, from, None) {
            return Err(ConnectionError::WouldCreateCycle);
        }

        self.graph.add_edge(from, to, Connection { kind: EdgeKind::Forward });
        self.order_dirty = true;
        Ok(())
    }

    /// Connect two nodes with an edge that closes a loop. The target hears
    /// the source one quantum late, so it must be able to absorb that
    /// latency (a delay line).
    pub fn connect_feedback(&mut self, from: NodeIndex, to: NodeIndex) -> Result<(), ConnectionError> {
        if self.find_connection(from, to, EdgeKind::Feedback).is_some() {
            return Ok(());
        }

        self.validate_target(from, to)?;

        let target = &self.graph[to].node;
        if !target.accepts_feedback() {
            return Err(ConnectionError::NotFeedbackTarget(target.name().to_string()));
        }

        self.graph.add_edge(from, to, Connection { kind: EdgeKind::Feedback });
        self.order_dirty = true;
        Ok(())
    }

    fn find_connection(&self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> Option<EdgeIndex> {
        self.graph
            .edges_connecting(from, to)
            .find(|e| e.weight().kind == kind)
            .map(|e| e.id())
    }

    fn validate_target(&self, from: NodeIndex, to: NodeIndex) -> Result<(), ConnectionError> {
        if !self.graph.contains_node(from) {
            return Err(ConnectionError::InvalidNode);
        }
        let to_node = self.graph.node_weight(to).ok_or(ConnectionError::InvalidNode)?;
        if !to_node.node.accepts_input() {
            return Err(ConnectionError::NoInput(to_node.node.name().to_string()));
        }
        Ok(())
    }

    /// Set a parameter, clamped to the node's declared range.
    ///
    /// Returns the value actually applied, or `None` if the node or
    /// parameter does not exist.
    pub fn set_parameter(&mut self, node: NodeIndex, param_id: u32, value: f32) -> Option<f32> {
        let graph_node = self.graph.node_weight_mut(node)?;
        let param = graph_node.node.parameters().iter().find(|p| p.id == param_id)?;
        let clamped = param.clamp(value);
        if clamped != value {
            log::debug!(
                "{}: {} = {} clamped to {}",
                graph_node.node.name(),
                param.name,
                value,
                clamped
            );
        }
        graph_node.node.set_parameter(param_id, clamped);
        Some(clamped)
    }

    /// Read back a parameter value
    pub fn get_parameter(&self, node: NodeIndex, param_id: u32) -> Option<f32> {
        let graph_node = self.graph.node_weight(node)?;
        graph_node
            .node
            .parameters()
            .iter()
            .any(|p| p.id == param_id)
            .then(|| graph_node.node.get_parameter(param_id))
    }

    /// Borrow a node as its concrete type
    pub fn node<T: 'static>(&self, node: NodeIndex) -> Option<&T> {
        self.graph.node_weight(node)?.node.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow a node as its concrete type
    pub fn node_mut<T: 'static>(&mut self, node: NodeIndex) -> Option<&mut T> {
        self.graph.node_weight_mut(node)?.node.as_any_mut().downcast_mut::<T>()
    }

    /// Output of a node's most recent quantum
    pub fn output(&self, node: NodeIndex) -> Option<&[f32]> {
        self.graph.node_weight(node).map(|n| n.output.as_slice())
    }

    fn rebuild_order(&mut self) {
        let forward = EdgeFiltered::from_fn(&self.graph, |e| e.weight().kind == EdgeKind::Forward);
        self.order = toposort(&forward, None).unwrap_or_else(|_| {
            // connect() rejects forward cycles, so this is unreachable in practice
            log::error!("forward cycle in audio graph, falling back to index order");
            self.graph.node_indices().collect()
        });
        self.order_dirty = false;
    }

    /// Process one render quantum through every node
    pub fn process(&mut self) {
        if self.order_dirty {
            self.rebuild_order();
        }

        let Self {
            graph,
            order,
            sample_rate,
            input_scratch,
            feedback_scratch,
            ..
        } = self;

        for &node_idx in order.iter() {
            input_scratch.fill(0.0);
            feedback_scratch.fill(0.0);
            let mut has_feedback = false;

            // Feedback sources have not run yet this quantum, so their
            // buffers still hold the previous quantum
            for edge in graph.edges_directed(node_idx, Direction::Incoming) {
                let source = &graph[edge.source()].output;
                let target = match edge.weight().kind {
                    EdgeKind::Forward => &mut *input_scratch,
                    EdgeKind::Feedback => {
                        has_feedback = true;
                        &mut *feedback_scratch
                    }
                };
                for (dst, src) in target.iter_mut().zip(source.iter()) {
                    *dst += src;
                }
            }

            let feedback: &[f32] = if has_feedback { feedback_scratch } else { &[] };
            let GraphNode { node, output } = &mut graph[node_idx];
            node.process(input_scratch, feedback, output, *sample_rate);
        }
    }
}
