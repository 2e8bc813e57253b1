//! Model builder module
//!
//! After the rewrite has run on a `GraphContext`, the builder assembles the
//! final model:
//!
//! - [`ModelBuilder`]: fluent builder for constructing models
//! - [`build_model`]: one-call rebuild keeping the original metadata
//!
//! # Example
//!
//! ```ignore
//! use lstm_fuse::builder::{ModelBuilder, build_model};
//!
//! // Using ModelBuilder (fluent API)
//! let model = ModelBuilder::new(original_model)
//!     .with_context(ctx)
//!     .producer_name("lstm-fuse")
//!     .opset(9)
//!     .build()?;
//!
//! // Or using the simple function
//! let model = build_model(&ctx, &original_model, None);
//! ```

pub mod model;

// Re-export main types and functions
pub use model::{build_graph_from_context, build_model, set_opset_version, ModelBuilder};
