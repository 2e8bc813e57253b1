//! Opset-aware construction of glue nodes
//!
//! Each helper inserts one ONNX node and returns its output tensor.

use crate::graph::GraphContext;
use crate::proto::tensor_proto::DataType;
use crate::proto::AttributeProto;
use crate::tensor::vec_to_tensor_i64;

/// First opset taking `Slice` bounds as inputs
const SLICE_INPUTS_OPSET: i64 = 10;

/// First opset taking `Squeeze`/`Unsqueeze` axes as an input
const AXES_INPUT_OPSET: i64 = 13;

fn first_output(node: &crate::proto::NodeProto) -> String {
    format!("{}:0", node.name)
}

/// `Slice(input)` over `axes` from `starts` to `ends`
pub fn make_slice(
    ctx: &mut GraphContext,
    opset: i64,
    input: &str,
    axes: &[i64],
    starts: &[i64],
    ends: &[i64],
) -> String {
    let node = if opset < SLICE_INPUTS_OPSET {
        ctx.make_node(
            "Slice",
            &[input],
            vec![
                AttributeProto::new_ints("axes", axes.to_vec()),
                AttributeProto::new_ints("starts", starts.to_vec()),
                AttributeProto::new_ints("ends", ends.to_vec()),
            ],
            1,
        )
    } else {
        let starts = ctx.make_const("starts", vec_to_tensor_i64(starts, ""));
        let ends = ctx.make_const("ends", vec_to_tensor_i64(ends, ""));
        let axes = ctx.make_const("axes", vec_to_tensor_i64(axes, ""));
        ctx.make_node("Slice", &[input, &starts, &ends, &axes], Vec::new(), 1)
    };
    first_output(&node)
}

fn make_axes_op(ctx: &mut GraphContext, op_type: &str, opset: i64, input: &str, axes: &[i64]) -> String {
    let node = if opset < AXES_INPUT_OPSET {
        ctx.make_node(
            op_type,
            &[input],
            vec![AttributeProto::new_ints("axes", axes.to_vec())],
            1,
        )
    } else {
        let axes = ctx.make_const("axes", vec_to_tensor_i64(axes, ""));
        ctx.make_node(op_type, &[input, &axes], Vec::new(), 1)
    };
    first_output(&node)
}

/// `Squeeze(input, axes)`
pub fn make_squeeze(ctx: &mut GraphContext, opset: i64, input: &str, axes: &[i64]) -> String {
    make_axes_op(ctx, "Squeeze", opset, input, axes)
}

/// `Unsqueeze(input, axes)`
pub fn make_unsqueeze(ctx: &mut GraphContext, opset: i64, input: &str, axes: &[i64]) -> String {
    make_axes_op(ctx, "Unsqueeze", opset, input, axes)
}

/// `Cast(input, to)`
pub fn make_cast(ctx: &mut GraphContext, input: &str, to: DataType) -> String {
    let node = ctx.make_node(
        "Cast",
        &[input],
        vec![AttributeProto::new_int("to", to as i64)],
        1,
    );
    first_output(&node)
}

/// `Transpose(input, perm)`
pub fn make_transpose(ctx: &mut GraphContext, input: &str, perm: &[i64]) -> String {
    let node = ctx.make_node(
        "Transpose",
        &[input],
        vec![AttributeProto::new_ints("perm", perm.to_vec())],
        1,
    );
    first_output(&node)
}

/// `Concat(inputs, axis)`
pub fn make_concat(ctx: &mut GraphContext, inputs: &[&str], axis: i64) -> String {
    let node = ctx.make_node("Concat", inputs, vec![AttributeProto::new_int("axis", axis)], 1);
    first_output(&node)
}

/// Node without attributes, such as `Shape` or `Tile`
pub fn make_plain(ctx: &mut GraphContext, op_type: &str, inputs: &[&str]) -> String {
    let node = ctx.make_node(op_type, inputs, Vec::new(), 1);
    first_output(&node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::GraphProto;

    #[test]
    fn test_slice_encoding_follows_opset() {
        let mut ctx = GraphContext::new(&GraphProto::default());

        let old = make_slice(&mut ctx, 9, "x:0", &[0], &[1], &[2]);
        let node = ctx.get_producer(&old).unwrap();
        assert_eq!(node.input.len(), 1);
        assert_eq!(node.get_attribute_ints("starts"), Some(&[1i64][..]));

        let new = make_slice(&mut ctx, 10, "x:0", &[0], &[1], &[2]);
        let node = ctx.get_producer(&new).unwrap().clone();
        assert_eq!(node.input.len(), 4);
        assert!(node.attribute.is_empty());
        assert_eq!(
            crate::transformers::common::get_constant_ints(&ctx, &node.input[2]),
            Some(vec![2])
        );
    }

    #[test]
    fn test_axes_encoding_follows_opset() {
        let mut ctx = GraphContext::new(&GraphProto::default());

        let old = make_unsqueeze(&mut ctx, 12, "x:0", &[0]);
        let node = ctx.get_producer(&old).unwrap();
        assert_eq!(node.op_type, "Unsqueeze");
        assert_eq!(node.get_attribute_ints("axes"), Some(&[0i64][..]));

        let new = make_squeeze(&mut ctx, 13, "x:0", &[1]);
        let node = ctx.get_producer(&new).unwrap();
        assert_eq!(node.op_type, "Squeeze");
        assert_eq!(node.input.len(), 2);
        assert!(ctx.is_constant(&node.input[1]));
    }

    #[test]
    fn test_cast_and_transpose() {
        let mut ctx = GraphContext::new(&GraphProto::default());

        let cast = make_cast(&mut ctx, "x:0", DataType::Int64);
        assert_eq!(
            ctx.get_producer(&cast).unwrap().get_attribute_int("to", 0),
            DataType::Int64 as i64
        );

        let t = make_transpose(&mut ctx, &cast, &[1, 0, 2]);
        let node = ctx.get_producer(&t).unwrap();
        assert_eq!(node.input, vec![cast]);
        assert_eq!(node.get_attribute_ints("perm"), Some(&[1i64, 0, 2][..]));
    }
}
