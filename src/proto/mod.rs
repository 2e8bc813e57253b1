//! ONNX Protocol Buffer types
//!
//! This module re-exports the prost message types for the ONNX schema subset
//! the optimizer reads and writes. Both TensorFlow-level nodes (before
//! rewriting) and ONNX nodes (after rewriting) are carried as [`NodeProto`]s;
//! only their `op_type` differs.
//! Additional extension methods are provided in the `extensions` submodule.

/// ONNX protobuf types
#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod onnx;

// Re-export commonly used types at module level
pub use onnx::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    TensorShapeProto, TypeProto, ValueInfoProto,
};

// Re-export submodules for nested types
pub use onnx::attribute_proto;
pub use onnx::tensor_proto;
pub use onnx::tensor_shape_proto;
pub use onnx::type_proto;

/// Extension methods for ONNX protobuf types
pub mod extensions;
