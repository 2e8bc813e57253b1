//! Graph mutation operations
//!
//! Methods for modifying the graph structure: adding, removing, and rewiring
//! nodes. All of them keep the producer and consumer indexes current.

use log::debug;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::proto::extensions::make_tensor_value_info;
use crate::proto::{AttributeProto, NodeProto, TensorProto, ValueInfoProto};

use super::context::GraphContext;
use super::maps::add_consumer_entry;

impl GraphContext {
    // ========================================================================
    // Naming
    // ========================================================================

    /// Generate a node name that is not yet used in the graph
    pub fn make_name(&mut self, prefix: &str) -> String {
        loop {
            self.name_counter += 1;
            let candidate = format!("{}__{}", prefix, self.name_counter);
            if !self.has_node(&candidate) && !self.producer_map.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    // ========================================================================
    // Node construction
    // ========================================================================

    /// Create and insert a node with a fresh name
    ///
    /// Outputs are named `"{name}:{slot}"`. The inserted node is returned by
    /// value so callers can read its outputs while mutating the graph.
    pub fn make_node(
        &mut self,
        op_type: &str,
        inputs: &[&str],
        attributes: Vec<AttributeProto>,
        num_outputs: usize,
    ) -> NodeProto {
        let name = self.make_name(op_type);
        let node = NodeProto {
            output: (0..num_outputs).map(|i| format!("{}:{}", name, i)).collect(),
            input: inputs.iter().map(|s| s.to_string()).collect(),
            op_type: op_type.to_string(),
            name,
            attribute: attributes,
            ..Default::default()
        };
        self.insert_node(node.clone());
        node
    }

    /// Create an ONNX `Constant` node holding `value` and return its output
    ///
    /// The output's shape and element type are recorded from the tensor.
    pub fn make_const(&mut self, prefix: &str, mut value: TensorProto) -> String {
        let name = self.make_name(prefix);
        let output = format!("{}:0", name);
        value.name = name.clone();

        self.set_value_info(make_tensor_value_info(&output, value.data_type, &value.dims));
        self.insert_node(NodeProto {
            input: Vec::new(),
            output: vec![output.clone()],
            name,
            op_type: "Constant".to_string(),
            attribute: vec![AttributeProto::new_tensor("value", value)],
            ..Default::default()
        });

        output
    }

    // ========================================================================
    // Node mutation
    // ========================================================================

    /// Insert a new node into the graph
    ///
    /// Updates all relevant maps.
    pub fn insert_node(&mut self, node: NodeProto) {
        let name = node.name.clone();

        // Update producer_map for outputs
        for output in &node.output {
            if !output.is_empty() {
                self.producer_map.insert(output.clone(), name.clone());
            }
        }

        // Update consumer_map for inputs
        for input in &node.input {
            add_consumer_entry(&mut self.consumer_map, input, &name);
        }

        self.node_map.insert(name, node);
    }

    /// Remove a node from the graph
    ///
    /// Consumers of its outputs are left dangling; callers rewire them first.
    pub fn remove_node(&mut self, name: &str) -> Option<NodeProto> {
        let node = self.node_map.shift_remove(name)?;

        // Remove from producer_map
        for output in &node.output {
            if self.producer_map.get(output).map(|p| p == name).unwrap_or(false) {
                self.producer_map.remove(output);
            }
        }

        // Remove from consumer_map
        for input in &node.input {
            self.remove_consumer(input, name);
        }

        Some(node)
    }

    /// Replace every reference to `old` with `new` across the graph
    ///
    /// Uses the consumer index, so only the affected nodes are touched. The
    /// node producing `new` keeps reading `old`, which lets a freshly inserted
    /// node sit between `old` and its former consumers. Graph outputs named
    /// `old` are retargeted to `new`. Returns the number of rewired nodes.
    pub fn replace_all_inputs(&mut self, old: &str, new: &str) -> usize {
        if old == new {
            return 0;
        }

        let new_producer = self.producer_map.get(new).cloned();
        let consumers = self.consumer_map.remove(old).unwrap_or_default();
        let mut kept: SmallVec<[String; 4]> = SmallVec::new();
        let mut rewired = 0;

        for consumer in consumers {
            if new_producer.as_deref() == Some(consumer.as_str()) {
                kept.push(consumer);
                continue;
            }
            if let Some(node) = self.node_map.get_mut(&consumer) {
                for input in node.input.iter_mut().filter(|i| i.as_str() == old) {
                    *input = new.to_string();
                }
                rewired += 1;
            }
            add_consumer_entry(&mut self.consumer_map, new, &consumer);
        }

        if !kept.is_empty() {
            self.consumer_map.insert(old.to_string(), kept);
        }

        if self.is_graph_output(old) {
            self.retarget_graph_output(old, new);
        }

        debug!("replaced {} with {} in {} nodes", old, new, rewired);
        rewired
    }

    /// Point the graph output named `old` at `new`, keeping its position
    fn retarget_graph_output(&mut self, old: &str, new: &str) {
        let replacement = self
            .value_info_map
            .get(new)
            .cloned()
            .unwrap_or_else(|| ValueInfoProto {
                name: new.to_string(),
                ..Default::default()
            });

        self.graph_output_map = std::mem::take(&mut self.graph_output_map)
            .into_iter()
            .map(|(name, vi)| {
                if name == old {
                    (new.to_string(), replacement.clone())
                } else {
                    (name, vi)
                }
            })
            .collect();
    }

    /// Remove every node that is unreachable from the graph outputs
    ///
    /// Nodes named in `must_keep`, and everything they read from, survive.
    /// Returns the number of removed nodes.
    pub fn prune_unreachable(&mut self, must_keep: &FxHashSet<String>) -> usize {
        let reachable = self.reachable_nodes(must_keep);
        let dead: Vec<String> = self
            .node_names()
            .filter(|name| !reachable.contains(name.as_str()))
            .cloned()
            .collect();

        for name in &dead {
            self.remove_node(name);
        }

        dead.len()
    }

    // ========================================================================
    // Value info mutation
    // ========================================================================

    /// Add or update value info
    pub fn set_value_info(&mut self, vi: ValueInfoProto) {
        let name = vi.name.clone();
        self.value_info_map.insert(name, vi);
    }

    /// Record the shape of a tensor, keeping any known element type
    pub fn set_shape(&mut self, name: &str, shape: &[i64]) {
        let elem_type = self.get_elem_type(name).unwrap_or(0);
        self.set_value_info(make_tensor_value_info(name, elem_type, shape));
    }

    /// Record shape and element type of a tensor
    pub fn set_shape_and_type(&mut self, name: &str, elem_type: i32, shape: &[i64]) {
        self.set_value_info(make_tensor_value_info(name, elem_type, shape));
    }

    /// Copy shape and element type from one tensor to another
    pub fn copy_shape(&mut self, from: &str, to: &str) {
        if let Some(vi) = self.value_info_map.get(from) {
            let mut vi = vi.clone();
            vi.name = to.to_string();
            self.set_value_info(vi);
        } else if let Some(shape) = self.get_shape(from) {
            let elem_type = self.get_elem_type(from).unwrap_or(0);
            self.set_shape_and_type(to, elem_type, &shape);
        }
    }

    // ========================================================================
    // Map update helpers
    // ========================================================================

    /// Remove a consumer from a tensor
    pub fn remove_consumer(&mut self, tensor_name: &str, node_name: &str) {
        if let Some(consumers) = self.consumer_map.get_mut(tensor_name) {
            consumers.retain(|n| n != node_name);
            if consumers.is_empty() {
                self.consumer_map.remove(tensor_name);
            }
        }
    }
}
