//! Common utilities for transformers
//!
//! Shared helper functions and types used across transformers.

use crate::error::OnnxResult;
use crate::graph::GraphContext;
use crate::tensor::tensor_to_array_i64;

/// Get attribute value as string
pub fn get_attr_s<'a>(node: &'a crate::proto::NodeProto, name: &str) -> Option<&'a str> {
    node.get_attribute_str(name)
}

/// Read an integer constant as a flat list
pub fn get_constant_ints(ctx: &GraphContext, name: &str) -> Option<Vec<i64>> {
    let tensor = ctx.get_constant_tensor(name)?;
    tensor_to_array_i64(tensor)
        .ok()
        .map(|a| a.iter().copied().collect())
}

/// Transformation result for statistics
#[derive(Debug, Default, Clone)]
pub struct TransformResult {
    /// Number of patterns matched
    pub patterns_matched: usize,
    /// Number of transformations applied
    pub transforms_applied: usize,
    /// Number of nodes eliminated
    pub nodes_eliminated: usize,
    /// Names of transformed nodes
    pub transformed_nodes: Vec<String>,
}

impl TransformResult {
    /// Create empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful transformation
    pub fn record(&mut self, node_name: &str) {
        self.transforms_applied += 1;
        self.transformed_nodes.push(node_name.to_string());
    }

    /// Record eliminated nodes
    pub fn record_eliminations(&mut self, count: usize) {
        self.nodes_eliminated += count;
    }

    /// Merge with another result
    pub fn merge(&mut self, other: TransformResult) {
        self.patterns_matched += other.patterns_matched;
        self.transforms_applied += other.transforms_applied;
        self.nodes_eliminated += other.nodes_eliminated;
        self.transformed_nodes.extend(other.transformed_nodes);
    }
}

/// Trait for individual transformers
pub trait OnnxTransformer {
    /// Name of the transformer
    fn name(&self) -> &'static str;

    /// Apply the transformation
    fn transform(&self, ctx: &mut GraphContext) -> OnnxResult<TransformResult>;

    /// Check if this transformer is applicable to the graph
    fn is_applicable(&self, _ctx: &GraphContext) -> bool {
        true
    }
}

/// Run multiple transformers in sequence
pub fn run_transformers(
    ctx: &mut GraphContext,
    transformers: &[&dyn OnnxTransformer],
) -> OnnxResult<TransformResult> {
    let mut total = TransformResult::new();

    for transformer in transformers {
        if transformer.is_applicable(ctx) {
            let result = transformer.transform(ctx)?;
            total.merge(result);
        }
    }

    Ok(total)
}
