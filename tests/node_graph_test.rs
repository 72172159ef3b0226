use std::sync::Arc;

use approx::assert_relative_eq;
use stem_mixer::audio::node_graph::nodes::{
    delay, gain, BufferSourceNode, DelayNode, DestinationNode, GainNode, StereoPannerNode,
};
use stem_mixer::audio::node_graph::{AudioGraph, ConnectionError, RENDER_QUANTUM};
use stem_mixer::io::AudioBuffer;

fn impulse(frames: usize, sample_rate: u32) -> Arc<AudioBuffer> {
    let mut data = vec![0.0; frames * 2];
    data[0] = 1.0;
    data[1] = 1.0;
    Arc::new(AudioBuffer::new(data, sample_rate))
}

/// Render `quanta` quanta and collect the left channel of `node`
fn render_left(graph: &mut AudioGraph, node: stem_mixer::audio::node_graph::NodeIndex, quanta: usize) -> Vec<f32> {
    let mut left = Vec::new();
    for _ in 0..quanta {
        graph.process();
        left.extend(graph.output(node).unwrap().iter().step_by(2));
    }
    left
}

#[test]
fn test_basic_chain() {
    let mut graph = AudioGraph::new(44100);

    let data: Vec<f32> = vec![0.5; RENDER_QUANTUM * 2];
    let source = graph.add_node(Box::new(BufferSourceNode::new(
        "source",
        Arc::new(AudioBuffer::new(data, 44100)),
    )));
    let level = graph.add_node(Box::new(GainNode::new("gain", 0.5)));
    let output = graph.add_node(Box::new(DestinationNode::new("output")));

    assert!(graph.connect(source, level).is_ok());
    assert!(graph.connect(level, output).is_ok());
    graph.node_mut::<BufferSourceNode>(source).unwrap().start();

    graph.process();
    let out = graph.output(output).unwrap();
    assert!(out.iter().all(|s| (*s - 0.25).abs() < 1e-6));
}

#[test]
fn test_cycles_are_rejected() {
    let mut graph = AudioGraph::new(44100);
    let a = graph.add_node(Box::new(GainNode::new("a", 1.0)));
    let b = graph.add_node(Box::new(GainNode::new("b", 1.0)));
    let c = graph.add_node(Box::new(GainNode::new("c", 1.0)));

    graph.connect(a, b).unwrap();
    graph.connect(b, c).unwrap();
    assert_eq!(graph.connect(c, a), Err(ConnectionError::WouldCreateCycle));
    assert_eq!(graph.connect(a, a), Err(ConnectionError::WouldCreateCycle));

    // Only a delay line may close a loop
    assert!(matches!(
        graph.connect_feedback(c, a),
        Err(ConnectionError::NotFeedbackTarget(_))
    ));
}

#[test]
fn test_sources_take_no_input() {
    let mut graph = AudioGraph::new(44100);
    let level = graph.add_node(Box::new(GainNode::new("gain", 1.0)));
    let source = graph.add_node(Box::new(BufferSourceNode::new("source", impulse(4, 44100))));
    assert!(matches!(graph.connect(level, source), Err(ConnectionError::NoInput(_))));
}

#[test]
fn test_delay_feedback_loop_decays() {
    // 128 frames of delay at this rate is 10 ms
    let sample_rate = 12800;
    let mut graph = AudioGraph::new(sample_rate);
    let source = graph.add_node(Box::new(BufferSourceNode::new("source", impulse(8, sample_rate))));
    let line = graph.add_node(Box::new(DelayNode::new("delay", 1.0, sample_rate)));
    let feedback = graph.add_node(Box::new(GainNode::new("feedback", 0.5)));
    let output = graph.add_node(Box::new(DestinationNode::new("output")));

    graph.connect(source, line).unwrap();
    graph.connect(line, feedback).unwrap();
    graph.connect_feedback(feedback, line).unwrap();
    graph.connect(line, output).unwrap();
    graph.set_parameter(line, delay::PARAM_DELAY_TIME, 0.01);
    graph.node_mut::<BufferSourceNode>(source).unwrap().start();

    let left = render_left(&mut graph, output, 5);
    assert_relative_eq!(left[128], 1.0);
    assert_relative_eq!(left[256], 0.5);
    assert_relative_eq!(left[384], 0.25);
    assert_relative_eq!(left[512], 0.125);
    assert_eq!(left[0], 0.0);
    assert_eq!(left[200], 0.0);
}

#[test]
fn test_parameters_are_clamped() {
    let mut graph = AudioGraph::new(44100);
    let level = graph.add_node(Box::new(GainNode::new("gain", 1.0)));
    let pan = graph.add_node(Box::new(StereoPannerNode::new("pan")));

    assert_eq!(graph.set_parameter(level, gain::PARAM_GAIN, -3.0), Some(0.0));
    assert_eq!(graph.set_parameter(pan, 0, 7.0), Some(1.0));
    assert_eq!(graph.get_parameter(pan, 0), Some(1.0));
    assert_eq!(graph.set_parameter(pan, 42, 1.0), None);
}

#[test]
fn test_removing_a_node_keeps_other_handles() {
    let mut graph = AudioGraph::new(44100);
    let a = graph.add_node(Box::new(GainNode::new("a", 0.3)));
    let b = graph.add_node(Box::new(GainNode::new("b", 0.7)));
    let c = graph.add_node(Box::new(GainNode::new("c", 1.0)));
    graph.connect(a, b).unwrap();
    graph.connect(b, c).unwrap();

    assert!(graph.remove_node(b));
    assert!(!graph.remove_node(b));
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.node::<GainNode>(c).unwrap().gain(), 1.0);
    assert_eq!(graph.node::<GainNode>(a).unwrap().gain(), 0.3);
    assert!(graph.connect(a, c).is_ok());
    graph.process();
}
