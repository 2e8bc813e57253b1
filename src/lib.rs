//! # LSTM Fuse
//!
//! Rewrites the TensorFlow `dynamic_rnn` LSTM loops found in tf2onnx output
//! into single ONNX `LSTM` nodes.
//!
//! An imported TF graph still carries the `while` loop (`Enter`, `Merge`,
//! `Switch`, `LoopCond`, `Exit`, `TensorArrayV3`) that `dynamic_rnn` builds
//! around an `LSTMCell`. This crate finds the cell arithmetic by pattern
//! matching, recovers weights, initial states, sequence lengths and layout,
//! then replaces the whole loop with a fused `LSTM` node plus a little glue.
//!
//! ## Features
//!
//! - **Pattern Matching**: locate `LSTMCell` / `BasicLSTMCell` arithmetic
//! - **Weight Fusion**: regroup TF gate columns into ONNX `W`, `R`, `B`
//! - **Loop Rewiring**: retarget every loop exit to the fused node's outputs
//!
//! ## Example
//!
//! ```ignore
//! use lstm_fuse::prelude::*;
//!
//! let model = load_model("tf_lstm.onnx")?;
//! let config = FuseLstmConfig::from_model(&model)?;
//! let (fused, stats) = fuse_lstm_model(&model, &config)?;
//! save_model(&fused, "fused.onnx")?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod builder;
pub mod error;
pub mod graph;
pub mod io;
pub mod pattern;
pub mod proto;
pub mod tensor;
pub mod transformers;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use lstm_fuse::prelude::*`
pub mod prelude {
    pub use crate::builder::{build_model, ModelBuilder};
    pub use crate::error::{OnnxResult, TransformError};
    pub use crate::graph::GraphContext;
    pub use crate::io::{fuse_lstm_file, fuse_lstm_model, load_model, save_model, FuseStats};
    pub use crate::pattern::{CellMatch, CellRole, PatternMatcher};
    pub use crate::proto::onnx::*;
    pub use crate::transformers::{FuseLstm, FuseLstmConfig, OnnxTransformer, TransformResult};
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use error::{OnnxResult, TransformError};

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported ONNX opset version
pub const SUPPORTED_OPSET_MIN: i64 = 7;
/// Maximum supported ONNX opset version
pub const SUPPORTED_OPSET_MAX: i64 = 17;
