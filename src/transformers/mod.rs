//! ONNX transformers module
//!
//! Graph passes over a [`GraphContext`](crate::graph::GraphContext). Each
//! pass implements the [`OnnxTransformer`] trait and reports what it did in a
//! [`TransformResult`].
//!
//! # Example
//!
//! ```ignore
//! use lstm_fuse::transformers::{FuseLstm, OnnxTransformer};
//! use lstm_fuse::graph::GraphContext;
//!
//! let mut ctx = GraphContext::new(&graph);
//! let result = FuseLstm::new().transform(&mut ctx)?;
//!
//! println!("Fused {} LSTM cells", result.transforms_applied);
//! println!("Pruned {} nodes", result.nodes_eliminated);
//! ```

/// Common utilities and types
pub mod common;
/// Fuse `dynamic_rnn` LSTM loops
pub mod fuse_lstm;

// Re-export common types
pub use common::{
    get_attr_s, get_constant_ints, run_transformers, OnnxTransformer,
    TransformResult,
};

// Re-export fusion transformers
pub use fuse_lstm::{FuseLstm, FuseLstmConfig};
