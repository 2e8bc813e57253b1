//! Shape utilities for ONNX tensors
//!
//! Functions for working with tensor shapes and dimensions. Unknown extents
//! are represented as -1 throughout.

use crate::error::{OnnxResult, TransformError};
use crate::proto::ValueInfoProto;

/// Calculate total number of elements from shape
pub fn numel(shape: &[i64]) -> usize {
    if shape.is_empty() {
        1 // scalar
    } else {
        shape.iter().map(|&d| d.max(0) as usize).product()
    }
}

/// Check if shape contains dynamic dimensions (negative values)
pub fn is_dynamic(shape: &[i64]) -> bool {
    shape.iter().any(|&d| d < 0)
}

/// Extract shape from ValueInfoProto
pub fn shape_from_value_info(vi: &ValueInfoProto) -> Option<Vec<i64>> {
    vi.get_shape()
}

/// Normalize axis to positive index
pub fn normalize_axis(axis: i64, ndim: usize) -> OnnxResult<usize> {
    let ndim_i64 = ndim as i64;
    let normalized = if axis < 0 { axis + ndim_i64 } else { axis };

    if normalized < 0 || normalized >= ndim_i64 {
        return Err(TransformError::InvalidNode(format!(
            "Axis {} out of bounds for ndim {}",
            axis, ndim
        )));
    }

    Ok(normalized as usize)
}

/// Shape after removing the given axes
pub fn squeeze_shape(shape: &[i64], axes: &[i64]) -> OnnxResult<Vec<i64>> {
    let mut drop = Vec::with_capacity(axes.len());
    for &axis in axes {
        let axis = normalize_axis(axis, shape.len())?;
        if shape[axis] > 1 {
            return Err(TransformError::ShapeInferenceFailed(format!(
                "Cannot squeeze axis {} of shape {:?}",
                axis, shape
            )));
        }
        drop.push(axis);
    }

    Ok(shape
        .iter()
        .enumerate()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, &d)| d)
        .collect())
}

/// Shape after inserting size-1 axes at the given output positions
pub fn unsqueeze_shape(shape: &[i64], axes: &[i64]) -> OnnxResult<Vec<i64>> {
    let rank = shape.len() + axes.len();
    let mut positions = axes
        .iter()
        .map(|&a| normalize_axis(a, rank))
        .collect::<OnnxResult<Vec<_>>>()?;
    positions.sort_unstable();

    let mut result = Vec::with_capacity(rank);
    let mut source = shape.iter();
    for i in 0..rank {
        if positions.binary_search(&i).is_ok() {
            result.push(1);
        } else if let Some(&d) = source.next() {
            result.push(d);
        }
    }

    Ok(result)
}
