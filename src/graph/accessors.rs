//! Advanced graph accessor methods
//!
//! High-level methods for pattern matching and graph analysis.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::proto::{NodeProto, TensorProto};
use crate::tensor::shape_from_value_info;

use super::context::GraphContext;

/// Op types whose `value` attribute holds a constant tensor
pub const CONSTANT_OPS: &[&str] = &["Const", "Constant"];

impl GraphContext {
    // ========================================================================
    // Pattern matching helpers
    // ========================================================================

    /// Find nodes by op type
    pub fn find_nodes_by_op(&self, op_type: &str) -> Vec<&NodeProto> {
        self.nodes().filter(|n| n.op_type == op_type).collect()
    }

    /// Find nodes matching any of the given op types
    pub fn find_nodes_by_ops(&self, op_types: &[&str]) -> Vec<&NodeProto> {
        self.nodes()
            .filter(|n| op_types.contains(&n.op_type.as_str()))
            .collect()
    }

    /// Nodes whose name sits under `scope`
    pub fn nodes_in_scope<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a NodeProto> + 'a {
        self.nodes().filter(move |n| in_scope(&n.name, scope))
    }

    /// Whether the producer of `tensor` lives under `scope`
    ///
    /// Graph inputs and initializers have no producer and are never in scope.
    pub fn is_tensor_in_scope(&self, tensor: &str, scope: &str) -> bool {
        self.get_producer_name(tensor)
            .map(|name| in_scope(name, scope))
            .unwrap_or(false)
    }

    // ========================================================================
    // Constant lookup
    // ========================================================================

    /// Get constant tensor from input name (checks Initializers and Const/Constant nodes)
    pub fn get_constant_tensor(&self, name: &str) -> Option<&TensorProto> {
        // 1. Check Initializers
        if let Some(init) = self.get_initializer(name) {
            return Some(init);
        }

        // 2. Check constant-producing nodes
        self.get_producer(name)
            .filter(|producer| is_constant_node(producer))
            .and_then(|producer| producer.get_attribute_tensor("value"))
    }

    /// Check whether a tensor resolves to a constant
    pub fn is_constant(&self, name: &str) -> bool {
        self.get_constant_tensor(name).is_some()
    }

    // ========================================================================
    // Shape and type queries
    // ========================================================================

    /// Get the shape of a tensor
    pub fn get_shape(&self, name: &str) -> Option<Vec<i64>> {
        // Check value_info first
        if let Some(shape) = self.value_info_map.get(name).and_then(shape_from_value_info) {
            return Some(shape);
        }

        // Constants carry their own dims
        self.get_constant_tensor(name).map(|t| t.dims.clone())
    }

    /// Get the element type of a tensor
    pub fn get_elem_type(&self, name: &str) -> Option<i32> {
        // Check value_info
        if let Some(elem_type) = self
            .value_info_map
            .get(name)
            .and_then(|vi| vi.get_elem_type())
            .filter(|&t| t != 0)
        {
            return Some(elem_type);
        }

        self.get_constant_tensor(name).map(|t| t.data_type)
    }

    // ========================================================================
    // Connectivity analysis
    // ========================================================================

    /// Names of all nodes reachable backward from the graph outputs and `roots`
    pub fn reachable_nodes(&self, roots: &FxHashSet<String>) -> FxHashSet<String> {
        let mut visited: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<&str> = VecDeque::new();

        let from_outputs = self
            .graph_output_map
            .keys()
            .filter_map(|out| self.get_producer_name(out));
        for name in from_outputs.chain(roots.iter()) {
            if self.has_node(name) && visited.insert(name.clone()) {
                queue.push_back(name.as_str());
            }
        }

        while let Some(name) = queue.pop_front() {
            let Some(node) = self.get_node(name) else {
                continue;
            };
            for input in &node.input {
                if let Some(producer) = self.get_producer_name(input) {
                    if visited.insert(producer.clone()) {
                        queue.push_back(producer.as_str());
                    }
                }
            }
        }

        visited
    }

    /// Get the topological order of nodes (using Kahn's algorithm)
    ///
    /// Ties are broken by node insertion order. Nodes left on a cycle are
    /// appended in insertion order.
    pub fn topological_order(&self) -> Vec<&str> {
        let mut in_degree: FxHashMap<&str, usize> = FxHashMap::default();

        // Count in-degrees (number of distinct predecessor nodes)
        for (name, node) in &self.node_map {
            let preds: FxHashSet<&str> = node
                .input
                .iter()
                .filter_map(|input| self.get_producer_name(input))
                .map(|p| p.as_str())
                .collect();
            in_degree.insert(name.as_str(), preds.len());
        }

        let mut queue: VecDeque<&str> = self
            .node_map
            .keys()
            .map(|k| k.as_str())
            .filter(|name| in_degree.get(name) == Some(&0))
            .collect();
        let mut result = Vec::with_capacity(self.node_map.len());
        let mut emitted: FxHashSet<&str> = FxHashSet::default();

        while let Some(name) = queue.pop_front() {
            if !emitted.insert(name) {
                continue;
            }
            result.push(name);

            let Some(node) = self.get_node(name) else {
                continue;
            };
            let mut successors: Vec<&str> = Vec::new();
            for output in &node.output {
                for consumer in self.get_consumer_names(output).unwrap_or_default() {
                    if !successors.contains(&consumer.as_str()) {
                        successors.push(consumer.as_str());
                    }
                }
            }
            for consumer in successors {
                if let Some(count) = in_degree.get_mut(consumer) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(consumer);
                    }
                }
            }
        }

        for name in self.node_map.keys() {
            if !emitted.contains(name.as_str()) {
                result.push(name.as_str());
            }
        }

        result
    }
}

/// Whether a node name sits under `scope`
pub fn in_scope(name: &str, scope: &str) -> bool {
    !scope.is_empty()
        && name
            .strip_prefix(scope)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// Whether a node holds a constant `value` attribute
pub fn is_constant_node(node: &NodeProto) -> bool {
    node.is_op_type_in(CONSTANT_OPS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_node, make_tensor_value_info};
    use crate::proto::{AttributeProto, GraphProto, ValueInfoProto};
    use crate::tensor::vec_to_tensor_f32;

    fn make_test_graph() -> GraphProto {
        let mut bias = make_node("Const", &[], &["rnn/bias:0"], "rnn/bias");
        bias.attribute.push(AttributeProto::new_tensor(
            "value",
            vec_to_tensor_f32(&[0.0; 8], "rnn/bias"),
        ));

        GraphProto {
            node: vec![
                bias,
                make_node("Transpose", &["x:0"], &["rnn/transpose:0"], "rnn/transpose"),
                make_node(
                    "BiasAdd",
                    &["rnn/transpose:0", "rnn/bias:0"],
                    &["rnn/while/BiasAdd:0"],
                    "rnn/while/BiasAdd",
                ),
                make_node("Relu", &["rnn/while/BiasAdd:0"], &["y:0"], "relu"),
                make_node("Neg", &["x:0"], &["dead:0"], "dead"),
            ],
            input: vec![make_tensor_value_info("x:0", 1, &[2, 5, 3])],
            output: vec![ValueInfoProto {
                name: "y:0".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_find_nodes_by_op() {
        let graph = make_test_graph();
        let ctx = GraphContext::new(&graph);

        let adds = ctx.find_nodes_by_op("BiasAdd");
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].name, "rnn/while/BiasAdd");
        assert!(ctx.find_nodes_by_op("Softmax").is_empty());
        assert_eq!(ctx.find_nodes_by_ops(&["Relu", "Neg"]).len(), 2);
    }

    #[test]
    fn test_in_scope() {
        assert!(in_scope("rnn/while/mul", "rnn"));
        assert!(!in_scope("rnn2/while/mul", "rnn"));
        assert!(!in_scope("rnn", "rnn"));
        assert!(!in_scope("rnn/while/mul", ""));

        let graph = make_test_graph();
        let ctx = GraphContext::new(&graph);
        assert_eq!(ctx.nodes_in_scope("rnn").count(), 3);
        assert!(ctx.is_tensor_in_scope("rnn/transpose:0", "rnn"));
        assert!(!ctx.is_tensor_in_scope("x:0", "rnn"));
    }

    #[test]
    fn test_constant_lookup() {
        let graph = make_test_graph();
        let ctx = GraphContext::new(&graph);

        let bias = ctx.get_constant_tensor("rnn/bias:0").unwrap();
        assert_eq!(bias.dims, vec![8]);
        assert!(!ctx.is_constant("x:0"));
        assert_eq!(ctx.get_shape("rnn/bias:0"), Some(vec![8]));
        assert_eq!(ctx.get_elem_type("rnn/bias:0"), Some(1));
    }

    #[test]
    fn test_get_shape_from_value_info() {
        let graph = make_test_graph();
        let ctx = GraphContext::new(&graph);

        assert_eq!(ctx.get_shape("x:0"), Some(vec![2, 5, 3]));
        assert_eq!(ctx.get_elem_type("x:0"), Some(1));
        assert!(ctx.get_shape("rnn/transpose:0").is_none());
    }

    #[test]
    fn test_reachable_nodes() {
        let graph = make_test_graph();
        let ctx = GraphContext::new(&graph);

        let reachable = ctx.reachable_nodes(&FxHashSet::default());
        assert!(reachable.contains("relu"));
        assert!(reachable.contains("rnn/bias"));
        assert!(!reachable.contains("dead"));

        let mut roots = FxHashSet::default();
        roots.insert("dead".to_string());
        assert!(ctx.reachable_nodes(&roots).contains("dead"));
    }

    #[test]
    fn test_topological_order() {
        let graph = make_test_graph();
        let ctx = GraphContext::new(&graph);

        let order = ctx.topological_order();
        assert_eq!(order.len(), 5);

        let pos = |n: &str| order.iter().position(|&x| x == n).unwrap();
        assert!(pos("rnn/transpose") < pos("rnn/while/BiasAdd"));
        assert!(pos("rnn/bias") < pos("rnn/while/BiasAdd"));
        assert!(pos("rnn/while/BiasAdd") < pos("relu"));
    }
}
