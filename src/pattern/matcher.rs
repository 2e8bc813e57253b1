//! Tree pattern matching engine for ONNX graphs
//!
//! Matches an [`OpPattern`] tree against the graph in reverse
//! (output-to-input) order: the root of the pattern matches the anchor node,
//! and each child pattern matches the producer of the corresponding input.
//! Operands of commutative ops are tried in both orders.

use rustc_hash::FxHashMap;

use crate::graph::GraphContext;

use super::ops::COMMUTATIVE_OPS;
use super::roles::{CellMatch, CellRole};

/// A node in a pattern tree
#[derive(Debug, Clone)]
pub enum OpPattern {
    /// Matches any tensor, with or without a producer
    Any {
        /// Role bound to the matched tensor
        role: Option<CellRole>,
    },
    /// Matches a tensor produced by one of `ops`
    Op {
        /// Accepted op types
        ops: &'static [&'static str],
        /// Role bound to the matched tensor
        role: Option<CellRole>,
        /// Input patterns; empty means inputs are not inspected
        inputs: Vec<OpPattern>,
    },
}

impl OpPattern {
    /// Pattern matching any tensor
    pub fn any() -> Self {
        OpPattern::Any { role: None }
    }

    /// Pattern matching a node of one of `ops` with the given inputs
    pub fn op(ops: &'static [&'static str], inputs: Vec<OpPattern>) -> Self {
        OpPattern::Op {
            ops,
            role: None,
            inputs,
        }
    }

    /// Bind the matched tensor to `role`
    pub fn bind(self, role: CellRole) -> Self {
        match self {
            OpPattern::Any { .. } => OpPattern::Any { role: Some(role) },
            OpPattern::Op { ops, inputs, .. } => OpPattern::Op {
                ops,
                role: Some(role),
                inputs,
            },
        }
    }
}

/// Role bindings accumulated while matching
pub type Bindings = FxHashMap<CellRole, String>;

/// Pattern matcher for ONNX graphs
pub struct PatternMatcher<'a> {
    ctx: &'a GraphContext,
}

impl<'a> PatternMatcher<'a> {
    /// Create a new pattern matcher
    pub fn new(ctx: &'a GraphContext) -> Self {
        Self { ctx }
    }

    /// Match `pattern` against the tensor `tensor`
    ///
    /// Returns the role bindings on success.
    pub fn match_tensor(&self, tensor: &str, pattern: &OpPattern) -> Option<Bindings> {
        let mut bindings = Bindings::default();
        if self.match_at(tensor, pattern, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    /// Find every match of `pattern` anchored on nodes of `anchor_op`
    ///
    /// Bindings missing a required role are dropped.
    pub fn find_all_matches(&self, anchor_op: &str, pattern: &OpPattern) -> Vec<CellMatch> {
        let mut results = Vec::new();

        for node in self.ctx.nodes() {
            if node.op_type != anchor_op {
                continue;
            }
            let Some(output) = node.output.first() else {
                continue;
            };
            if let Some(bindings) = self.match_tensor(output, pattern) {
                if let Ok(m) = CellMatch::from_roles(bindings) {
                    results.push(m);
                }
            }
        }

        results
    }

    fn match_at(&self, tensor: &str, pattern: &OpPattern, bindings: &mut Bindings) -> bool {
        match pattern {
            OpPattern::Any { role } => bind(bindings, *role, tensor),
            OpPattern::Op { ops, role, inputs } => {
                let Some(node) = self.ctx.get_producer(tensor) else {
                    return false;
                };
                if !node.is_op_type_in(ops) || !bind(bindings, *role, tensor) {
                    return false;
                }
                if inputs.is_empty() {
                    return true;
                }
                if node.input.len() != inputs.len() {
                    return false;
                }

                if inputs.len() == 2 && node.is_op_type_in(COMMUTATIVE_OPS) {
                    let snapshot = bindings.clone();
                    if self.match_inputs(&node.input, inputs, [0, 1], bindings) {
                        return true;
                    }
                    *bindings = snapshot;
                    return self.match_inputs(&node.input, inputs, [1, 0], bindings);
                }

                node.input
                    .iter()
                    .zip(inputs)
                    .all(|(input, child)| self.match_at(input, child, bindings))
            }
        }
    }

    fn match_inputs(
        &self,
        node_inputs: &[String],
        patterns: &[OpPattern],
        order: [usize; 2],
        bindings: &mut Bindings,
    ) -> bool {
        order
            .iter()
            .zip(patterns)
            .all(|(&i, child)| self.match_at(&node_inputs[i], child, bindings))
    }
}

fn bind(bindings: &mut Bindings, role: Option<CellRole>, tensor: &str) -> bool {
    let Some(role) = role else {
        return true;
    };
    match bindings.get(&role) {
        Some(bound) => bound == tensor,
        None => {
            bindings.insert(role, tensor.to_string());
            true
        }
    }
}
