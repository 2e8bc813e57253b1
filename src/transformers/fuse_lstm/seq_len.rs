//! Sequence lengths and batch size
//!
//! `dynamic_rnn` names the caller's `sequence_length` argument inside its
//! scope. When it is absent every batch entry runs for the full time extent
//! of the input, which assumes no padding.

use log::debug;

use crate::error::{OnnxResult, TransformError};
use crate::graph::{in_scope, is_constant_node, GraphContext};
use crate::proto::tensor_proto::DataType;

use super::ops::{make_cast, make_plain, make_slice};
use super::props::{LstmInput, MustKeepSet, RnnProps};

/// Explicit sequence lengths located in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLength {
    /// Node producing `tensor`
    pub node: String,
    /// Tensor holding the lengths
    pub tensor: String,
}

fn is_sequence_length_node(node: &crate::proto::NodeProto) -> bool {
    (node.is_op_type("Identity") && node.name.ends_with("sequence_length"))
        || (is_constant_node(node) && node.name.contains("CheckSeqLen"))
}

/// Locate the caller-supplied sequence lengths of `scope`
///
/// A `Cast` between the caller's tensor and the scope's `Identity` is kept
/// and added to `must_keep`.
pub fn find_sequence_length(
    ctx: &GraphContext,
    scope: &str,
    must_keep: &mut MustKeepSet,
) -> OnnxResult<Option<SequenceLength>> {
    let candidates: Vec<_> = ctx
        .nodes_in_scope(scope)
        .filter(|n| is_sequence_length_node(n))
        .collect();

    let node = match candidates.as_slice() {
        [] => return Ok(None),
        [only] => *only,
        more => {
            return Err(TransformError::rejected(format!(
                "found {} sequence length nodes in scope {}",
                more.len(),
                scope
            )))
        }
    };

    if is_constant_node(node) {
        debug!("found const sequence length node {}", node.name);
        let tensor = node.output.first().cloned().ok_or_else(|| {
            TransformError::rejected(format!("sequence length node {} has no output", node.name))
        })?;
        return Ok(Some(SequenceLength {
            node: node.name.clone(),
            tensor,
        }));
    }

    let input = node.input.first().ok_or_else(|| {
        TransformError::rejected(format!("sequence length node {} has no input", node.name))
    })?;
    let producer = ctx.get_producer(input);

    if let Some(cast) = producer.filter(|p| p.is_op_type("Cast") && in_scope(&p.name, scope)) {
        let source = cast.input.first().map(String::as_str).unwrap_or_default();
        if ctx.is_tensor_in_scope(source, scope) {
            return Err(TransformError::rejected(format!(
                "sequence length cast {} reads from inside scope {}",
                cast.name, scope
            )));
        }
        debug!("found sequence length cast {}", cast.name);
        must_keep.insert(cast.name.clone());
        return Ok(Some(SequenceLength {
            node: cast.name.clone(),
            tensor: input.clone(),
        }));
    }

    if ctx.is_tensor_in_scope(input, scope) {
        return Err(TransformError::rejected(format!(
            "sequence length {} is produced inside scope {}",
            input, scope
        )));
    }
    if let Some(p) = producer {
        if p.is_op_type("Cast") {
            must_keep.insert(p.name.clone());
        }
    }

    Ok(Some(SequenceLength {
        node: producer
            .map(|p| p.name.clone())
            .unwrap_or_else(|| input.clone()),
        tensor: input.clone(),
    }))
}

/// Compute the batch size and wire `sequence_lens`
///
/// `Shape(X)` is cast to float because `Slice` below opset 10 rejects
/// integers. The float batch size is kept on `props` for the `Fill`
/// initial-state rewrite.
pub fn synthesize_sequence_length(
    ctx: &mut GraphContext,
    opset: i64,
    props: &mut RnnProps,
) -> OnnxResult<()> {
    let x = props.input(LstmInput::X)?.to_string();
    let x_shape = ctx.get_shape(&x);
    let batch_extent = x_shape.as_ref().and_then(|s| s.get(1).copied()).unwrap_or(-1);

    let shape = make_plain(ctx, "Shape", &[&x]);
    ctx.set_shape_and_type(&shape, DataType::Int64 as i32, &[3]);

    let shape_f = make_cast(ctx, &shape, DataType::Float);
    ctx.set_shape_and_type(&shape_f, DataType::Float as i32, &[3]);

    let batch = make_slice(ctx, opset, &shape_f, &[0], &[1], &[2]);
    ctx.set_shape_and_type(&batch, DataType::Float as i32, &[1]);
    props.batch_size = Some(batch.clone());

    let seq_len = match props.sequence_length.clone() {
        Some(explicit) => {
            debug!("using explicit sequence length {}", explicit);
            explicit
        }
        None => {
            let repeats = make_cast(ctx, &batch, DataType::Int64);
            ctx.set_shape_and_type(&repeats, DataType::Int64 as i32, &[1]);

            let time = make_slice(ctx, opset, &shape_f, &[0], &[0], &[1]);
            ctx.set_shape_and_type(&time, DataType::Float as i32, &[1]);

            let tiled = make_plain(ctx, "Tile", &[&time, &repeats]);
            ctx.set_shape_and_type(&tiled, DataType::Float as i32, &[batch_extent]);

            let lens = make_cast(ctx, &tiled, DataType::Int32);
            ctx.set_shape_and_type(&lens, DataType::Int32 as i32, &[batch_extent]);
            lens
        }
    };

    props.set_input(LstmInput::SequenceLens, seq_len);
    Ok(())
}
