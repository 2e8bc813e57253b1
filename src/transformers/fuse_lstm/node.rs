//! Fused `LSTM` node construction

use log::debug;

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::proto::tensor_proto::DataType;
use crate::proto::{AttributeProto, NodeProto};

use super::props::{LstmInput, RnnProps};

/// Only forward loops are recognized
const DIRECTION: &str = "forward";
const NUM_DIRECTIONS: i64 = 1;

/// Insert the `LSTM` node and record the shapes of its three outputs
pub fn create_lstm_node(ctx: &mut GraphContext, props: &RnnProps) -> OnnxResult<NodeProto> {
    let mut inputs = Vec::with_capacity(LstmInput::ORDER.len());
    for input in LstmInput::ORDER {
        let tensor = props.input(input)?;
        if !ctx.tensor_exists(tensor) {
            return Err(TransformError::StructureMismatch(format!(
                "LSTM input `{}` ({}) is not produced in the graph",
                input.as_str(),
                tensor
            )));
        }
        inputs.push(tensor);
    }

    let hidden = props.hidden_size as i64;
    let node = ctx.make_node(
        "LSTM",
        &inputs,
        vec![
            AttributeProto::new_string("direction", DIRECTION),
            AttributeProto::new_int("hidden_size", hidden),
        ],
        3,
    );

    let x = props.input(LstmInput::X)?;
    let x_shape = ctx.get_shape(x).unwrap_or_default();
    let seq = x_shape.first().copied().unwrap_or(-1);
    let batch = x_shape.get(1).copied().unwrap_or(-1);
    let elem_type = ctx.get_elem_type(x).unwrap_or(DataType::Float as i32);

    ctx.set_shape_and_type(&node.output[0], elem_type, &[seq, NUM_DIRECTIONS, batch, hidden]);
    for state in &node.output[1..] {
        ctx.set_shape_and_type(state, elem_type, &[NUM_DIRECTIONS, batch, hidden]);
    }

    debug!("created {} with hidden size {}", node.name, hidden);
    Ok(node)
}
