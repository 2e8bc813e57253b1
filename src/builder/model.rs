//! Model builder for ONNX models
//!
//! Assembles a `ModelProto` from a rewritten [`GraphContext`].

use rustc_hash::FxHashSet;

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::proto::{GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto, ValueInfoProto};

/// Model builder for constructing rewritten models
#[derive(Debug)]
pub struct ModelBuilder {
    /// Original model (for metadata)
    original: ModelProto,
    /// Working graph context
    ctx: Option<GraphContext>,
    /// Producer name override
    producer_name: Option<String>,
    /// Producer version override
    producer_version: Option<String>,
    /// Default-domain opset override
    opset: Option<i64>,
}

impl ModelBuilder {
    /// Create a new builder from an original model
    pub fn new(model: ModelProto) -> Self {
        Self {
            original: model,
            ctx: None,
            producer_name: None,
            producer_version: None,
            opset: None,
        }
    }

    /// Set the graph context
    pub fn with_context(mut self, ctx: GraphContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Set producer name
    pub fn producer_name(mut self, name: &str) -> Self {
        self.producer_name = Some(name.to_string());
        self
    }

    /// Set producer version
    pub fn producer_version(mut self, version: &str) -> Self {
        self.producer_version = Some(version.to_string());
        self
    }

    /// Declare the default-domain opset of the output
    pub fn opset(mut self, version: i64) -> Self {
        self.opset = Some(version);
        self
    }

    /// Build the final model
    pub fn build(self) -> OnnxResult<ModelProto> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| TransformError::MissingField("context".to_string()))?;

        let mut model = build_model(ctx, &self.original, self.opset);

        if let Some(name) = self.producer_name {
            model.producer_name = name;
        }
        if let Some(version) = self.producer_version {
            model.producer_version = version;
        }

        Ok(model)
    }
}

/// Build a GraphProto from a GraphContext
///
/// Nodes are emitted in dependency order. Initializers and value infos that
/// no remaining node or graph boundary refers to are dropped.
pub fn build_graph_from_context(ctx: &GraphContext) -> GraphProto {
    let nodes: Vec<NodeProto> = ctx
        .topological_order()
        .into_iter()
        .filter_map(|name| ctx.get_node(name))
        .cloned()
        .collect();

    // Collect used tensor names
    let mut used_tensors: FxHashSet<&str> = FxHashSet::default();
    for node in &nodes {
        for name in node.input.iter().chain(&node.output) {
            if !name.is_empty() {
                used_tensors.insert(name);
            }
        }
    }
    used_tensors.extend(ctx.graph_input_map.keys().map(String::as_str));
    used_tensors.extend(ctx.graph_output_map.keys().map(String::as_str));

    let initializers: Vec<TensorProto> = ctx
        .initializer_map
        .values()
        .filter(|t| used_tensors.contains(t.name.as_str()))
        .cloned()
        .collect();

    let inputs: Vec<ValueInfoProto> = ctx.graph_input_map.values().cloned().collect();
    let outputs: Vec<ValueInfoProto> = ctx.graph_output_map.values().cloned().collect();

    // value_info excludes graph inputs and outputs
    let mut value_info: Vec<ValueInfoProto> = ctx
        .value_info_map
        .values()
        .filter(|vi| {
            used_tensors.contains(vi.name.as_str())
                && !ctx.is_graph_input(&vi.name)
                && !ctx.is_graph_output(&vi.name)
        })
        .cloned()
        .collect();
    value_info.sort_by(|a, b| a.name.cmp(&b.name));

    GraphProto {
        node: nodes,
        initializer: initializers,
        input: inputs,
        output: outputs,
        value_info,
        name: ctx.name.clone(),
        ..Default::default()
    }
}

/// Set the version of `domain` in the model's opset imports
pub fn set_opset_version(model: &mut ModelProto, domain: &str, version: i64) {
    for opset in &mut model.opset_import {
        if opset.domain == domain {
            opset.version = version;
            return;
        }
    }

    model.opset_import.push(OperatorSetIdProto {
        domain: domain.to_string(),
        version,
    });
}

/// Copy `original` with the graph rebuilt from `ctx`
pub fn build_model(ctx: &GraphContext, original: &ModelProto, opset: Option<i64>) -> ModelProto {
    let mut model = original.clone();
    model.graph = Some(build_graph_from_context(ctx));

    if let Some(version) = opset {
        let domain = original
            .opset_import
            .iter()
            .find(|op| op.domain == "ai.onnx")
            .map(|op| op.domain.clone())
            .unwrap_or_default();
        set_opset_version(&mut model, &domain, version);
    }

    model
}
