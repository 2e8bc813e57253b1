//! Graph context for ONNX model manipulation
//!
//! `GraphContext` is the central structure for working with ONNX graphs.
//! It maintains efficient maps for node lookup, traversal, and manipulation.

use crate::error::{OnnxResult, TransformError};
use crate::proto::{GraphProto, ModelProto, NodeProto, TensorProto, ValueInfoProto};

use super::maps::{
    build_consumer_map, build_graph_input_map, build_graph_output_map, build_initializer_map,
    build_node_map, build_producer_map, build_value_info_map, ConsumerMap, GraphIoMap,
    InitializerMap, NodeMap, ProducerMap, ValueInfoMap,
};

/// Graph context for efficient graph operations
///
/// Holds the node table together with a producer index and a consumer reverse
/// index. Every mutator keeps both indexes current, so lookups never rescan
/// the node list.
#[derive(Debug, Default)]
pub struct GraphContext {
    /// Graph name, carried through to the rebuilt graph
    pub name: String,

    /// Maps output tensor name → producer node name
    pub producer_map: ProducerMap,

    /// Maps tensor name → consumer node names
    pub consumer_map: ConsumerMap,

    /// Maps node name → node (preserves insertion order)
    pub node_map: NodeMap,

    /// Maps initializer name → TensorProto
    pub initializer_map: InitializerMap,

    /// Maps tensor name → ValueInfoProto (inputs + outputs + value_info)
    pub value_info_map: ValueInfoMap,

    /// Maps graph input name → ValueInfoProto
    pub graph_input_map: GraphIoMap,

    /// Maps graph output name → ValueInfoProto
    pub graph_output_map: GraphIoMap,

    /// Counter backing `make_name`
    pub(crate) name_counter: usize,
}

impl GraphContext {
    /// Create a new GraphContext from a GraphProto
    pub fn new(graph: &GraphProto) -> Self {
        Self {
            name: graph.name.clone(),
            producer_map: build_producer_map(graph),
            consumer_map: build_consumer_map(graph),
            node_map: build_node_map(graph),
            initializer_map: build_initializer_map(graph),
            value_info_map: build_value_info_map(graph),
            graph_input_map: build_graph_input_map(graph),
            graph_output_map: build_graph_output_map(graph),
            name_counter: 0,
        }
    }

    /// Create from a ModelProto
    pub fn from_model(model: &ModelProto) -> OnnxResult<Self> {
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| TransformError::MissingField("model.graph".to_string()))?;

        Ok(Self::new(graph))
    }

    // ========================================================================
    // Node accessors
    // ========================================================================

    /// Get a node by name
    pub fn get_node(&self, name: &str) -> Option<&NodeProto> {
        self.node_map.get(name)
    }

    /// Check if a node exists
    pub fn has_node(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }

    /// Iterate over all nodes in order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeProto> {
        self.node_map.values()
    }

    /// Iterate over node names in order
    pub fn node_names(&self) -> impl Iterator<Item = &String> {
        self.node_map.keys()
    }

    // ========================================================================
    // Graph traversal
    // ========================================================================

    /// Get the producer node for a tensor
    pub fn get_producer(&self, tensor_name: &str) -> Option<&NodeProto> {
        self.producer_map
            .get(tensor_name)
            .and_then(|name| self.get_node(name))
    }

    /// Get the producer node name for a tensor
    pub fn get_producer_name(&self, tensor_name: &str) -> Option<&String> {
        self.producer_map.get(tensor_name)
    }

    /// Get consumer nodes for a tensor
    pub fn get_consumers(&self, tensor_name: &str) -> Vec<&NodeProto> {
        self.consumer_map
            .get(tensor_name)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.get_node(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get consumer node names for a tensor
    pub fn get_consumer_names(&self, tensor_name: &str) -> Option<&[String]> {
        self.consumer_map.get(tensor_name).map(|v| v.as_slice())
    }

    /// Get the previous node (producer of first input)
    pub fn get_prev_node(&self, node: &NodeProto) -> Option<&NodeProto> {
        node.input.first().and_then(|inp| self.get_producer(inp))
    }

    /// Get the producer of the input at `index`
    pub fn get_input_node(&self, node: &NodeProto, index: usize) -> Option<&NodeProto> {
        node.input.get(index).and_then(|inp| self.get_producer(inp))
    }

    /// Check if a tensor is a graph input
    pub fn is_graph_input(&self, name: &str) -> bool {
        self.graph_input_map.contains_key(name)
    }

    /// Check if a tensor is a graph output
    pub fn is_graph_output(&self, name: &str) -> bool {
        self.graph_output_map.contains_key(name)
    }

    /// Check if a tensor is an initializer
    pub fn is_initializer(&self, name: &str) -> bool {
        self.initializer_map.contains_key(name)
    }

    /// Check whether a tensor has a producer, an initializer, or is a graph input
    pub fn tensor_exists(&self, name: &str) -> bool {
        self.producer_map.contains_key(name) || self.is_initializer(name) || self.is_graph_input(name)
    }

    // ========================================================================
    // Value info and initializer accessors
    // ========================================================================

    /// Get value info for a tensor
    pub fn get_value_info(&self, name: &str) -> Option<&ValueInfoProto> {
        self.value_info_map.get(name)
    }

    /// Get initializer by name
    pub fn get_initializer(&self, name: &str) -> Option<&TensorProto> {
        self.initializer_map.get(name)
    }
}
