//! RNN input discovery and time-major handling

use indexmap::IndexSet;
use log::debug;
use rustc_hash::FxHashSet;

use crate::error::{OnnxResult, TransformError};
use crate::graph::{in_scope, GraphContext};
use crate::pattern::{CellMatch, CellRole};
use crate::proto::NodeProto;
use crate::transformers::common::get_constant_ints;

use super::ops::make_transpose;
use super::props::{LstmInput, RnnProps, RnnWeights};

/// Permutation swapping the batch and time axes
pub const TIME_MAJOR_PERM: [i64; 3] = [1, 0, 2];

/// Whether `node` swaps the leading two axes of a rank-3 tensor
pub fn is_time_major_transpose(ctx: &GraphContext, node: &NodeProto) -> bool {
    if !node.is_op_type("Transpose") {
        return false;
    }
    if let Some(perm) = node.get_attribute_ints("perm") {
        return perm == TIME_MAJOR_PERM;
    }
    node.input
        .get(1)
        .and_then(|p| get_constant_ints(ctx, p))
        .map(|perm| perm == TIME_MAJOR_PERM)
        .unwrap_or(false)
}

/// The one tensor that feeds `scope` from outside and is not a cell constant,
/// an initial state or the sequence lengths
pub fn find_rnn_input(
    ctx: &GraphContext,
    m: &CellMatch,
    weights: &RnnWeights,
    props: &RnnProps,
) -> OnnxResult<String> {
    let scope = props.scope.as_str();

    let mut skip_nodes: FxHashSet<&str> = [
        weights.kernel.node.as_str(),
        weights.bias.node.as_str(),
        weights.forget_bias.node.as_str(),
    ]
    .into_iter()
    .collect();
    let mut skip_tensors: FxHashSet<&str> = [CellRole::CellKernel, CellRole::CellBias, CellRole::FtBias]
        .into_iter()
        .filter_map(|role| m.get(role))
        .collect();

    for tensor in props.var_initializers.values() {
        skip_tensors.insert(tensor);
        if let Some(producer) = ctx.get_producer_name(tensor) {
            skip_nodes.insert(producer);
        }
    }
    if let Some(node) = props.sequence_length_node.as_deref() {
        skip_nodes.insert(node);
    }
    if let Some(tensor) = props.sequence_length.as_deref() {
        skip_tensors.insert(tensor);
    }

    let mut candidates: IndexSet<&str> = IndexSet::new();
    for node in ctx.nodes_in_scope(scope) {
        for input in &node.input {
            if input.is_empty() || skip_tensors.contains(input.as_str()) || ctx.is_constant(input) {
                continue;
            }
            let outside = match ctx.get_producer(input) {
                Some(producer) => {
                    !in_scope(&producer.name, scope) && !skip_nodes.contains(producer.name.as_str())
                }
                None => ctx.is_graph_input(input),
            };
            if outside {
                candidates.insert(input);
            }
        }
    }

    match candidates.len() {
        1 => {
            let input = candidates[0].to_string();
            debug!("found rnn input {}", input);
            Ok(input)
        }
        n => Err(TransformError::rejected(format!(
            "found {} candidate inputs for scope {}: {:?}",
            n, scope, candidates
        ))),
    }
}

/// Record whether the input is batch-major, without touching the graph
pub fn detect_time_major(ctx: &GraphContext, props: &mut RnnProps) -> OnnxResult<()> {
    let consumers: Vec<&NodeProto> = ctx
        .get_consumers(&props.input_id)
        .into_iter()
        .filter(|c| in_scope(&c.name, &props.scope))
        .collect();

    let consumer = match consumers.as_slice() {
        [only] => *only,
        other => {
            return Err(TransformError::rejected(format!(
                "rnn input {} has {} consumers in scope {}",
                props.input_id,
                other.len(),
                props.scope
            )))
        }
    };

    if is_time_major_transpose(ctx, consumer) {
        debug!("detect batch-major input through {}", consumer.name);
        props.time_major = false;
        props.input_transpose = Some(consumer.name.clone());
    } else {
        debug!("detect time-major input");
        props.time_major = true;
        props.input_transpose = None;
    }
    Ok(())
}

/// Replace the scope's batch-to-time transpose with an ONNX `Transpose`
/// and wire `X`
pub fn convert_input_transpose(ctx: &mut GraphContext, props: &mut RnnProps) -> OnnxResult<()> {
    let x = match props.input_transpose.as_deref() {
        None => props.input_id.clone(),
        Some(name) => {
            let old_output = ctx
                .get_node(name)
                .and_then(|n| n.output.first().cloned())
                .ok_or_else(|| {
                    TransformError::StructureMismatch(format!("input transpose {} disappeared", name))
                })?;

            let new_output = make_transpose(ctx, &props.input_id, &TIME_MAJOR_PERM);
            ctx.copy_shape(&old_output, &new_output);
            ctx.replace_all_inputs(&old_output, &new_output);
            new_output
        }
    };

    props.x_input_id = x.clone();
    props.set_input(LstmInput::X, x);
    Ok(())
}
