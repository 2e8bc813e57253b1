//! Tensor utilities for ONNX models
//!
//! This module provides utilities for working with ONNX tensors:
//! - Data type mappings (`dtype`)
//! - Shape utilities (`shape`)
//! - Conversion between TensorProto and ndarray (`convert`)
//!
//! # Example
//!
//! ```ignore
//! use lstm_fuse::tensor::{tensor_to_array_f64, array_to_tensor};
//!
//! // Convert TensorProto to ndarray
//! let kernel = tensor_to_array_f64(&tensor)?;
//!
//! // Perform operations...
//! let transposed = kernel.t().to_owned().into_dyn();
//!
//! // Convert back to TensorProto, keeping the source element type
//! let output = array_to_tensor(&transposed, DataType::Float, "W")?;
//! ```

pub mod convert;
pub mod dtype;
pub mod shape;

// Re-export commonly used items
pub use convert::{
    array_to_tensor, tensor_to_array_f64, tensor_to_array_i64,
    vec_to_tensor_f32, vec_to_tensor_i64,
};
pub use dtype::{dtype_size, i32_to_dtype, is_float_type};
pub use shape::{
    is_dynamic, normalize_axis, numel, shape_from_value_info, squeeze_shape, unsqueeze_shape,
};
