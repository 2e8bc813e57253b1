//! Pattern matching module for ONNX graph optimization
//!
//! This module provides tools for identifying the LSTM cell computation that
//! TensorFlow lowers into a `while` loop body.
//!
//! # Overview
//!
//! The pattern matching system works by:
//! 1. Defining patterns as trees of op types with optional role bindings
//! 2. Matching patterns in reverse order (output → input)
//! 3. Trying both operand orders for commutative ops
//! 4. Collecting the bound roles into a [`CellMatch`]
//!
//! # Example
//!
//! ```ignore
//! use lstm_fuse::pattern::{lstm_cell_pattern, PatternMatcher, CellRole, LSTM_CELL_ANCHOR};
//!
//! let matcher = PatternMatcher::new(&ctx);
//! for m in matcher.find_all_matches(LSTM_CELL_ANCHOR, &lstm_cell_pattern()) {
//!     println!("cell kernel: {}", m.tensor(CellRole::CellKernel)?);
//! }
//! ```

pub mod matcher;
pub mod ops;
pub mod roles;

// Re-export main types
pub use matcher::{Bindings, OpPattern, PatternMatcher};
pub use ops::{lstm_cell_pattern, COMMUTATIVE_OPS, CONCAT_OPS, LSTM_CELL_ANCHOR};
pub use roles::{CellMatch, CellRole};
