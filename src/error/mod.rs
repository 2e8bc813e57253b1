//! Error types for lstm-fuse
//!
//! This module defines all error types used throughout the crate.
//!
//! Errors come in two severities. [`TransformError::PatternNotMatched`] means a
//! single candidate was rejected before the graph was touched; the pass logs
//! it and moves on to the next candidate. Everything else aborts the pass.

use thiserror::Error;

/// Main error type for ONNX transformation operations
#[derive(Error, Debug)]
pub enum TransformError {
    /// Pattern matching failed (recoverable, the candidate is skipped)
    #[error("Pattern matching failed: {0}")]
    PatternNotMatched(String),

    /// Invalid node configuration
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Invalid model
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Shape inference failed
    #[error("Shape inference failed: {0}")]
    ShapeInferenceFailed(String),

    /// Graph structure violates an assumption after rewriting has begun
    #[error("Unexpected graph structure: {0}")]
    StructureMismatch(String),

    /// Unsupported opset version
    #[error("Unsupported opset version: {version}, expected {min}..={max}")]
    UnsupportedOpset {
        /// Actual version
        version: i64,
        /// Minimum supported
        min: i64,
        /// Maximum supported
        max: i64,
    },

    /// Invalid tensor data type
    #[error("Invalid data type: {0}")]
    InvalidDataType(i32),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protobuf decode error
    #[error("Protobuf decode error: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransformError {
    /// Shorthand for a rejected candidate
    pub fn rejected(reason: impl Into<String>) -> Self {
        TransformError::PatternNotMatched(reason.into())
    }

    /// Whether the pass may continue with the next candidate
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransformError::PatternNotMatched(_))
    }
}

/// Result type alias for ONNX operations
pub type OnnxResult<T> = Result<T, TransformError>;
