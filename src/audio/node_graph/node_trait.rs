use super::types::Parameter;

/// Custom node trait for audio processing nodes
///
/// All nodes must be Send so the live graph can move to the audio thread.
/// Nodes should be real-time safe: no allocations, no blocking operations.
pub trait AudioNode: Send {
    /// User-facing parameters
    fn parameters(&self) -> &[Parameter];

    /// Set parameter by ID. The graph clamps `value` to the declared range first.
    fn set_parameter(&mut self, id: u32, value: f32);

    /// Get parameter by ID
    fn get_parameter(&self, id: u32) -> f32;

    /// Whether other nodes may connect into this one. Sources return false.
    fn accepts_input(&self) -> bool {
        true
    }

    /// Whether this node can be the target of a feedback edge
    fn accepts_feedback(&self) -> bool {
        false
    }

    /// Process one render quantum
    ///
    /// # Arguments
    /// * `input` - Sum of all forward inputs, interleaved stereo
    /// * `feedback` - Sum of all feedback inputs from the previous quantum,
    ///   empty when the node has no feedback edges
    /// * `output` - Output buffer, interleaved stereo
    /// * `sample_rate` - Current sample rate in Hz
    fn process(&mut self, input: &[f32], feedback: &[f32], output: &mut [f32], sample_rate: u32);

    /// Reset internal state (clear delays, filter memory, etc.)
    fn reset(&mut self);

    /// Get the node type name
    fn node_type(&self) -> &str;

    /// Get a unique identifier for this node instance
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
