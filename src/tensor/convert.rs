//! Tensor conversion utilities
//!
//! Convert between ONNX TensorProto and ndarray types.

use ndarray::{Array, ArrayD, IxDyn};

use crate::error::{OnnxResult, TransformError};
use crate::proto::tensor_proto::DataType;
use crate::proto::TensorProto;

use super::dtype::{dtype_size, i32_to_dtype};
use super::shape::numel;

/// Convert a numeric TensorProto to an f64 ndarray
///
/// This handles both raw_data and typed data formats. `Float` and `Double`
/// values are widened without loss.
pub fn tensor_to_array_f64(tensor: &TensorProto) -> OnnxResult<ArrayD<f64>> {
    let dtype = i32_to_dtype(tensor.data_type)?;
    let expected_len = numel(&tensor.dims);

    let data: Vec<f64> = if !tensor.raw_data.is_empty() {
        decode_raw(&tensor.raw_data, dtype, expected_len, |bytes| match dtype {
            DataType::Float => Some(f32::from_le_bytes(bytes.try_into().ok()?) as f64),
            DataType::Double => Some(f64::from_le_bytes(bytes.try_into().ok()?)),
            DataType::Int32 => Some(i32::from_le_bytes(bytes.try_into().ok()?) as f64),
            DataType::Int64 => Some(i64::from_le_bytes(bytes.try_into().ok()?) as f64),
            _ => None,
        })?
    } else {
        match dtype {
            DataType::Float => tensor.float_data.iter().map(|&v| v as f64).collect(),
            DataType::Double => tensor.double_data.clone(),
            DataType::Int32 => tensor.int32_data.iter().map(|&v| v as f64).collect(),
            DataType::Int64 => tensor.int64_data.iter().map(|&v| v as f64).collect(),
            _ => return Err(TransformError::InvalidDataType(tensor.data_type)),
        }
    };

    into_array(data, &tensor.dims)
}

/// Convert TensorProto to i64 ndarray
pub fn tensor_to_array_i64(tensor: &TensorProto) -> OnnxResult<ArrayD<i64>> {
    let dtype = i32_to_dtype(tensor.data_type)?;
    let expected_len = numel(&tensor.dims);

    let data: Vec<i64> = if !tensor.raw_data.is_empty() {
        decode_raw(&tensor.raw_data, dtype, expected_len, |bytes| match dtype {
            DataType::Int64 => Some(i64::from_le_bytes(bytes.try_into().ok()?)),
            DataType::Int32 => Some(i32::from_le_bytes(bytes.try_into().ok()?) as i64),
            _ => None,
        })?
    } else {
        match dtype {
            DataType::Int64 => tensor.int64_data.clone(),
            DataType::Int32 => tensor.int32_data.iter().map(|&v| v as i64).collect(),
            _ => return Err(TransformError::InvalidDataType(tensor.data_type)),
        }
    };

    into_array(data, &tensor.dims)
}

/// Create TensorProto from an f64 array, stored with the given element type
///
/// Only `Float` and `Double` are accepted; weights of other types are
/// rejected before they reach this point.
pub fn array_to_tensor(array: &ArrayD<f64>, dtype: DataType, name: &str) -> OnnxResult<TensorProto> {
    let dims: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let mut tensor = TensorProto {
        dims,
        data_type: dtype as i32,
        name: name.to_string(),
        ..Default::default()
    };

    match dtype {
        DataType::Float => tensor.float_data = array.iter().map(|&v| v as f32).collect(),
        DataType::Double => tensor.double_data = array.iter().copied().collect(),
        _ => return Err(TransformError::InvalidDataType(dtype as i32)),
    }

    Ok(tensor)
}

/// Create 1D TensorProto from f32 slice
pub fn vec_to_tensor_f32(data: &[f32], name: &str) -> TensorProto {
    TensorProto {
        dims: vec![data.len() as i64],
        data_type: DataType::Float as i32,
        float_data: data.to_vec(),
        name: name.to_string(),
        ..Default::default()
    }
}

/// Create 1D TensorProto from i64 slice
pub fn vec_to_tensor_i64(data: &[i64], name: &str) -> TensorProto {
    TensorProto {
        dims: vec![data.len() as i64],
        data_type: DataType::Int64 as i32,
        int64_data: data.to_vec(),
        name: name.to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Internal helpers
// ============================================================================

fn into_array<T>(data: Vec<T>, dims: &[i64]) -> OnnxResult<ArrayD<T>> {
    let expected_len = numel(dims);
    if data.len() != expected_len {
        return Err(TransformError::ShapeInferenceFailed(format!(
            "Data length {} does not match shape {:?} (expected {})",
            data.len(),
            dims,
            expected_len
        )));
    }

    let shape: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
    Array::from_shape_vec(IxDyn(&shape), data).map_err(|e| TransformError::Internal(e.to_string()))
}

fn decode_raw<T, F>(raw: &[u8], dtype: DataType, expected: usize, decode: F) -> OnnxResult<Vec<T>>
where
    F: Fn(&[u8]) -> Option<T>,
{
    let elem_size = dtype_size(dtype)?;
    if raw.len() != expected * elem_size {
        return Err(TransformError::ShapeInferenceFailed(format!(
            "Raw data size {} does not match expected {} * {}",
            raw.len(),
            expected,
            elem_size
        )));
    }

    raw.chunks_exact(elem_size)
        .map(|chunk| decode(chunk).ok_or(TransformError::InvalidDataType(dtype as i32)))
        .collect()
}
