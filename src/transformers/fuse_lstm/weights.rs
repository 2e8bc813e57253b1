//! Weight extraction
//!
//! Reads the kernel, bias and forget bias bound by the cell template and
//! checks that they describe a single LSTM cell. Nothing here mutates the
//! graph; every failure rejects the candidate.

use log::{debug, warn};

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::pattern::{CellMatch, CellRole};
use crate::proto::tensor_proto::DataType;
use crate::tensor::tensor_to_array_f64;
use crate::transformers::common::get_attr_s;

use super::props::{RnnWeights, Weight};

/// Layout expected on the gate `BiasAdd`
const SUPPORTED_DATA_FORMAT: &str = "NHWC";

/// Element types `LSTM` accepts for `W`, `R` and `B`
const SUPPORTED_WEIGHT_TYPES: &[DataType] = &[DataType::Float, DataType::Double];

/// Follow `Identity` reads back to the tensor they forward
pub fn skip_identities<'a>(ctx: &'a GraphContext, mut tensor: &'a str) -> &'a str {
    let mut hops = 0;
    while let Some(node) = ctx.get_producer(tensor) {
        if node.op_type != "Identity" || hops > ctx.node_count() {
            break;
        }
        match node.input.first() {
            Some(input) => tensor = input,
            None => break,
        }
        hops += 1;
    }
    tensor
}

/// Decode the constant behind `tensor`
pub fn get_weight(ctx: &GraphContext, tensor: &str) -> OnnxResult<Weight> {
    let source = skip_identities(ctx, tensor);
    let value = ctx.get_constant_tensor(source).ok_or_else(|| {
        TransformError::rejected(format!("weight {} is not a constant", tensor))
    })?;

    let dtype = value.data_type_enum();
    if !SUPPORTED_WEIGHT_TYPES.contains(&dtype) {
        return Err(TransformError::rejected(format!(
            "weight {} has element type {:?}, expected Float or Double",
            tensor, dtype
        )));
    }

    let array = tensor_to_array_f64(value)
        .map_err(|e| TransformError::rejected(format!("weight {} cannot be read: {}", tensor, e)))?;
    let node = ctx
        .get_producer_name(source)
        .cloned()
        .unwrap_or_else(|| source.to_string());
    debug!("found weights {}", node);

    Ok(Weight {
        node,
        value: array,
        dtype,
    })
}

/// Extract and validate the cell constants of a match
pub fn extract_weights(ctx: &GraphContext, m: &CellMatch) -> OnnxResult<RnnWeights> {
    let kernel = get_weight(ctx, m.tensor(CellRole::CellKernel)?)?;
    if kernel.value.ndim() != 2 {
        return Err(TransformError::rejected(format!(
            "kernel {} has rank {}, expected 2",
            kernel.node,
            kernel.value.ndim()
        )));
    }

    let bias_add = m.node(ctx, CellRole::BiasAdd)?;
    let data_format = get_attr_s(bias_add, "data_format").unwrap_or(SUPPORTED_DATA_FORMAT);
    if data_format != SUPPORTED_DATA_FORMAT {
        return Err(TransformError::rejected(format!(
            "BiasAdd data_format is {}, not {}",
            data_format, SUPPORTED_DATA_FORMAT
        )));
    }

    let bias = get_weight(ctx, m.tensor(CellRole::CellBias)?)?;
    let columns = kernel.value.shape()[1];
    if bias.value.ndim() != 1 || bias.value.len() != columns {
        warn!(
            "cell_kernel {:?} and cell_bias {:?} dimensions do not match, skip",
            kernel.value.shape(),
            bias.value.shape()
        );
        return Err(TransformError::rejected("kernel and bias dimensions differ"));
    }
    if columns % 4 != 0 {
        return Err(TransformError::rejected(format!(
            "bias length {} is not a multiple of 4",
            columns
        )));
    }
    let hidden_size = columns / 4;
    if kernel.value.shape()[0] <= hidden_size {
        return Err(TransformError::rejected(format!(
            "kernel has {} rows, too few for hidden size {}",
            kernel.value.shape()[0],
            hidden_size
        )));
    }

    let forget_bias = get_weight(ctx, m.tensor(CellRole::FtBias)?)?;
    if forget_bias.value.len() != 1 || forget_bias.dtype != bias.dtype {
        return Err(TransformError::rejected(format!(
            "forget bias must be one element of {:?}, found {} of {:?}",
            bias.dtype,
            forget_bias.value.len(),
            forget_bias.dtype
        )));
    }

    Ok(RnnWeights {
        kernel,
        bias,
        forget_bias,
    })
}
