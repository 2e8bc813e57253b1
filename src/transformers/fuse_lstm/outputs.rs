//! Output reconnection
//!
//! Each recognized loop variable leaves the loop through an `Exit`. The
//! tensors read after the loop are rewired to the matching `LSTM` output,
//! reshaped back to the layout TensorFlow produced.

use log::debug;

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::proto::tensor_proto::DataType;
use crate::proto::NodeProto;
use crate::tensor::squeeze_shape;

use super::input::{is_time_major_transpose, TIME_MAJOR_PERM};
use super::ops::{make_concat, make_squeeze, make_transpose};
use super::props::RnnProps;
use super::switch::{LoopSwitch, StateKind};

/// How the tensor leaving one `Exit` is rebuilt
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reconnect {
    Hidden { exit: String },
    Cell { exit: String },
    Shared { exit: String },
    Output {
        gathered: String,
        transpose: Option<String>,
    },
}

fn structure(msg: String) -> TransformError {
    TransformError::StructureMismatch(msg)
}

fn single_output(node: &NodeProto) -> OnnxResult<String> {
    node.output
        .first()
        .cloned()
        .ok_or_else(|| structure(format!("{} has no output", node.name)))
}

/// The unique `Exit` reading the switch's loop-exit branch
fn exit_of<'g>(ctx: &'g GraphContext, switch: &LoopSwitch) -> OnnxResult<&'g NodeProto> {
    let exits: Vec<&NodeProto> = ctx
        .get_consumers(&switch.exit_branch)
        .into_iter()
        .filter(|n| n.is_op_type("Exit"))
        .collect();
    match exits.as_slice() {
        [only] => Ok(*only),
        other => Err(structure(format!(
            "switch {} has {} Exit consumers",
            switch.switch,
            other.len()
        ))),
    }
}

/// Check the `TensorArray` read-out after an output exit
fn plan_output(ctx: &GraphContext, exit: &str, time_major: bool) -> OnnxResult<Reconnect> {
    let consumers = ctx.get_consumers(exit);
    let gathers: Vec<&NodeProto> = consumers
        .iter()
        .copied()
        .filter(|n| n.is_op_type("TensorArrayGatherV3"))
        .collect();
    let sizes = consumers
        .iter()
        .filter(|n| n.is_op_type("TensorArraySizeV3"))
        .count();

    let gather = match (consumers.len(), gathers.as_slice(), sizes) {
        (2, [gather], 1) => *gather,
        _ => {
            debug!("lstm output exit {} has {} consumers", exit, consumers.len());
            return Err(structure(format!(
                "output exit {} must feed exactly one TensorArraySizeV3 and one TensorArrayGatherV3",
                exit
            )));
        }
    };
    let gathered = single_output(gather)?;

    let transpose = if time_major {
        None
    } else {
        let transposes: Vec<&NodeProto> = ctx
            .get_consumers(&gathered)
            .into_iter()
            .filter(|n| is_time_major_transpose(ctx, n))
            .collect();
        match transposes.as_slice() {
            [only] => Some(only.name.clone()),
            other => {
                return Err(structure(format!(
                    "batch-major output {} has {} time-major transposes",
                    gathered,
                    other.len()
                )))
            }
        }
    };

    Ok(Reconnect::Output { gathered, transpose })
}

fn plan(
    ctx: &GraphContext,
    props: &RnnProps,
    exits: &[(LoopSwitch, StateKind)],
) -> OnnxResult<Vec<Reconnect>> {
    let mut plan = Vec::with_capacity(exits.len());
    for (switch, kind) in exits {
        let exit = single_output(exit_of(ctx, switch)?)?;
        plan.push(match kind {
            StateKind::Hidden => Reconnect::Hidden { exit },
            StateKind::Cell => Reconnect::Cell { exit },
            StateKind::SharedCellHidden => Reconnect::Shared { exit },
            StateKind::Output => plan_output(ctx, &exit, props.time_major)?,
        });
    }
    Ok(plan)
}

fn elem_type(ctx: &GraphContext, tensor: &str) -> i32 {
    ctx.get_elem_type(tensor).unwrap_or(DataType::Float as i32)
}

fn squeeze_state(ctx: &mut GraphContext, opset: i64, state: &str) -> OnnxResult<String> {
    let squeezed = make_squeeze(ctx, opset, state, &[0]);
    let shape = ctx.get_shape(state).unwrap_or_else(|| vec![1, -1, -1]);
    let ty = elem_type(ctx, state);
    ctx.set_shape_and_type(&squeezed, ty, &squeeze_shape(&shape, &[0])?);
    Ok(squeezed)
}

/// Rewire every classified exit to the outputs of `lstm`
///
/// All exits are checked before the first one is rewired. Returns the number
/// of reconnected exits.
pub fn connect_outputs(
    ctx: &mut GraphContext,
    opset: i64,
    props: &RnnProps,
    lstm: &NodeProto,
    exits: &[(LoopSwitch, StateKind)],
) -> OnnxResult<usize> {
    let (y, y_h, y_c) = match lstm.output.as_slice() {
        [y, y_h, y_c] => (y.as_str(), y_h.as_str(), y_c.as_str()),
        _ => return Err(structure(format!("{} must have three outputs", lstm.name))),
    };

    let steps = plan(ctx, props, exits)?;
    for step in &steps {
        match step {
            Reconnect::Hidden { exit } => {
                let squeezed = squeeze_state(ctx, opset, y_h)?;
                ctx.replace_all_inputs(exit, &squeezed);
            }
            Reconnect::Cell { exit } => {
                let squeezed = squeeze_state(ctx, opset, y_c)?;
                ctx.replace_all_inputs(exit, &squeezed);
            }
            Reconnect::Shared { exit } => {
                let concat = make_concat(ctx, &[y_c, y_h], 2);
                let mut shape = ctx.get_shape(y_c).unwrap_or_else(|| vec![1, -1, -1]);
                if let Some(last) = shape.last_mut().filter(|d| **d >= 0) {
                    *last *= 2;
                }
                let ty = elem_type(ctx, y_c);
                ctx.set_shape_and_type(&concat, ty, &shape);

                let squeezed = squeeze_state(ctx, opset, &concat)?;
                ctx.replace_all_inputs(exit, &squeezed);
            }
            Reconnect::Output { gathered, transpose } => {
                connect_sequence_output(ctx, opset, y, gathered, transpose.as_deref())?;
            }
        }
        debug!("reconnected {:?}", step);
    }

    Ok(steps.len())
}

fn connect_sequence_output(
    ctx: &mut GraphContext,
    opset: i64,
    y: &str,
    gathered: &str,
    transpose: Option<&str>,
) -> OnnxResult<()> {
    let ty = elem_type(ctx, y);
    let squeezed = make_squeeze(ctx, opset, y, &[1]);
    let y_shape = ctx.get_shape(y).unwrap_or_else(|| vec![-1, 1, -1, -1]);
    let time_major_shape = squeeze_shape(&y_shape, &[1])?;
    ctx.set_shape_and_type(&squeezed, ty, &time_major_shape);

    if let Some(old) = transpose {
        let old_output = ctx
            .get_node(old)
            .map(single_output)
            .transpose()?
            .ok_or_else(|| structure(format!("output transpose {} disappeared", old)))?;

        let batch_major = make_transpose(ctx, &squeezed, &TIME_MAJOR_PERM);
        let batch_major_shape = match time_major_shape.as_slice() {
            [t, b, h] => vec![*b, *t, *h],
            _ => vec![-1, -1, -1],
        };
        ctx.set_shape_and_type(&batch_major, ty, &batch_major_shape);
        ctx.replace_all_inputs(&old_output, &batch_major);
        ctx.remove_node(old);
    }

    ctx.replace_all_inputs(gathered, &squeezed);
    Ok(())
}
