//! Graph manipulation module for ONNX models
//!
//! This module provides the core infrastructure for working with ONNX graphs:
//!
//! - [`GraphContext`]: Central structure for graph operations with O(1) lookups
//! - [`maps`]: Type definitions and builders for graph maps
//!
//! # Overview
//!
//! A TensorFlow graph that went through first-stage conversion still carries
//! its loop constructs (`Enter`, `Merge`, `Switch`, `Exit`, ...) as plain
//! [`NodeProto`](crate::proto::NodeProto)s. The context indexes those nodes so
//! rewriters can walk producers and consumers without rescanning the graph.
//!
//! # Example
//!
//! ```ignore
//! use lstm_fuse::graph::GraphContext;
//!
//! let mut ctx = GraphContext::new(&graph);
//!
//! // Traverse graph
//! let producer = ctx.get_producer("rnn/while/Exit_2:0");
//! let consumers = ctx.get_consumers("rnn/while/Exit_2:0");
//!
//! // Rewire every consumer of a tensor
//! let squeeze = ctx.make_node("Squeeze", &[&y_h], attrs, 1);
//! ctx.replace_all_inputs("rnn/while/Exit_2:0", &squeeze.output[0]);
//! ```
//!
//! # Maps
//!
//! The context maintains several maps for O(1) lookups:
//!
//! | Map | Description |
//! |-----|-------------|
//! | `producer_map` | output_name → producer node name |
//! | `consumer_map` | tensor_name → consumer node names |
//! | `node_map` | node_name → NodeProto (order preserved) |
//! | `initializer_map` | name → TensorProto |
//! | `value_info_map` | name → ValueInfoProto |

pub mod accessors;
pub mod context;
pub mod maps;
pub mod mutators;

// Re-export main types
pub use accessors::{in_scope, is_constant_node, CONSTANT_OPS};
pub use context::GraphContext;
pub use maps::{ConsumerMap, GraphIoMap, InitializerMap, NodeMap, ProducerMap, ValueInfoMap};
