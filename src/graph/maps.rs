//! Graph map types and builders
//!
//! Defines the core data structures for efficient graph traversal.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::proto::{GraphProto, NodeProto, TensorProto, ValueInfoProto};

/// Type alias for producer map: output_name → node_name
pub type ProducerMap = FxHashMap<String, String>;

/// Type alias for consumer map: tensor_name → [consumer_node_names]
///
/// Each consumer is listed once even when it reads the tensor through
/// several input slots. SmallVec optimized for common case of 1-4 consumers.
pub type ConsumerMap = FxHashMap<String, SmallVec<[String; 4]>>;

/// Type alias for node map: node_name → NodeProto (order preserved)
pub type NodeMap = IndexMap<String, NodeProto>;

/// Type alias for initializer map: name → TensorProto (order preserved)
pub type InitializerMap = IndexMap<String, TensorProto>;

/// Type alias for value info map: name → ValueInfoProto
pub type ValueInfoMap = FxHashMap<String, ValueInfoProto>;

/// Type alias for graph input/output maps (order preserved)
pub type GraphIoMap = IndexMap<String, ValueInfoProto>;

/// Build producer map from graph nodes
///
/// Maps each output tensor name to the node that produces it.
pub fn build_producer_map(graph: &GraphProto) -> ProducerMap {
    let mut map = FxHashMap::default();

    for node in &graph.node {
        for output in &node.output {
            if !output.is_empty() {
                map.insert(output.clone(), node.name.clone());
            }
        }
    }

    map
}

/// Build consumer map from graph nodes
///
/// Maps each tensor name to the list of nodes that consume it.
pub fn build_consumer_map(graph: &GraphProto) -> ConsumerMap {
    let mut map: ConsumerMap = FxHashMap::default();

    for node in &graph.node {
        for input in &node.input {
            add_consumer_entry(&mut map, input, &node.name);
        }
    }

    map
}

/// Register `node_name` as a consumer of `tensor`, skipping duplicates
pub(crate) fn add_consumer_entry(map: &mut ConsumerMap, tensor: &str, node_name: &str) {
    if tensor.is_empty() {
        return;
    }
    let consumers = map.entry(tensor.to_string()).or_default();
    if !consumers.iter().any(|n| n == node_name) {
        consumers.push(node_name.to_string());
    }
}

/// Build node map from graph nodes
///
/// Preserves node order using IndexMap.
pub fn build_node_map(graph: &GraphProto) -> NodeMap {
    graph
        .node
        .iter()
        .map(|node| (node.name.clone(), node.clone()))
        .collect()
}

/// Build initializer map from graph
pub fn build_initializer_map(graph: &GraphProto) -> InitializerMap {
    graph
        .initializer
        .iter()
        .map(|t| (t.name.clone(), t.clone()))
        .collect()
}

/// Build value info map from graph
///
/// Combines graph inputs, outputs, and intermediate value_info.
pub fn build_value_info_map(graph: &GraphProto) -> ValueInfoMap {
    let mut map = FxHashMap::default();

    // Graph inputs
    for vi in &graph.input {
        map.insert(vi.name.clone(), vi.clone());
    }

    // Graph outputs
    for vi in &graph.output {
        map.insert(vi.name.clone(), vi.clone());
    }

    // Intermediate value_info
    for vi in &graph.value_info {
        map.insert(vi.name.clone(), vi.clone());
    }

    map
}

/// Build graph input map
pub fn build_graph_input_map(graph: &GraphProto) -> GraphIoMap {
    graph
        .input
        .iter()
        .map(|vi| (vi.name.clone(), vi.clone()))
        .collect()
}

/// Build graph output map
pub fn build_graph_output_map(graph: &GraphProto) -> GraphIoMap {
    graph
        .output
        .iter()
        .map(|vi| (vi.name.clone(), vi.clone()))
        .collect()
}
