//! ONNX I/O module
//!
//! Loading and saving models, plus one-call LSTM fusion over a model or file.
//!
//! # Example
//!
//! ```ignore
//! use lstm_fuse::io::{fuse_lstm_file, load_model, save_model};
//!
//! let model = load_model("tf_lstm.onnx")?;
//! save_model(&model, "copy.onnx")?;
//!
//! let stats = fuse_lstm_file("tf_lstm.onnx", "fused.onnx")?;
//! println!("fused {} cells", stats.transform.transforms_applied);
//! ```

pub mod reader;
pub mod writer;

// Re-exports
pub use reader::{get_model_info, load_graph, load_model, load_model_from_bytes, ModelInfo};
pub use writer::{model_size, model_to_bytes, save_model};

use std::path::Path;

use log::info;

use crate::builder::build_model;
use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::proto::ModelProto;
use crate::transformers::{FuseLstm, FuseLstmConfig, OnnxTransformer, TransformResult};

/// Statistics of one fusion run
#[derive(Debug, Clone, Default)]
pub struct FuseStats {
    /// Node count before fusion
    pub original_nodes: usize,
    /// Node count after fusion
    pub fused_nodes: usize,
    /// Encoded size before fusion
    pub original_size: usize,
    /// Encoded size after fusion
    pub fused_size: usize,
    /// Pass statistics
    pub transform: TransformResult,
}

impl FuseStats {
    /// Nodes removed by the rewrite
    pub fn nodes_reduced(&self) -> usize {
        self.original_nodes.saturating_sub(self.fused_nodes)
    }

    /// Node reduction as a percentage
    pub fn node_reduction_percent(&self) -> f64 {
        if self.original_nodes == 0 {
            0.0
        } else {
            (self.nodes_reduced() as f64 / self.original_nodes as f64) * 100.0
        }
    }
}

/// Fuse every LSTM loop of `model` in memory
///
/// The returned model keeps the original metadata. Its default-domain opset
/// import is raised to `config.target_opset` when the model declared a lower
/// one, since the glue nodes follow that opset's encoding.
pub fn fuse_lstm_model(
    model: &ModelProto,
    config: &FuseLstmConfig,
) -> OnnxResult<(ModelProto, FuseStats)> {
    config.validate()?;

    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| TransformError::InvalidModel("No graph".to_string()))?;

    let original_nodes = graph.node.len();
    let original_size = model_size(model);

    let mut ctx = GraphContext::new(graph);
    let pass = FuseLstm::new().with_config(config.clone());
    let transform = pass.transform(&mut ctx)?;

    let opset = match model.get_opset_version() {
        Some(declared) if declared >= config.target_opset => None,
        _ => Some(config.target_opset),
    };
    let fused = build_model(&ctx, model, opset);

    let stats = FuseStats {
        original_nodes,
        fused_nodes: fused.graph.as_ref().map(|g| g.node.len()).unwrap_or(0),
        original_size,
        fused_size: model_size(&fused),
        transform,
    };

    Ok((fused, stats))
}

/// Fuse the LSTM loops of a model file and save the result
///
/// The target opset is taken from the input model.
pub fn fuse_lstm_file<P1: AsRef<Path>, P2: AsRef<Path>>(input: P1, output: P2) -> OnnxResult<FuseStats> {
    let model = load_model(&input)?;
    let config = FuseLstmConfig::from_model(&model)?;
    let (fused, stats) = fuse_lstm_model(&model, &config)?;
    save_model(&fused, &output)?;

    info!(
        "{} -> {}: {} cells fused, {} -> {} nodes",
        input.as_ref().display(),
        output.as_ref().display(),
        stats.transform.transforms_applied,
        stats.original_nodes,
        stats.fused_nodes
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::make_node;
    use crate::proto::{GraphProto, OperatorSetIdProto, ValueInfoProto};

    fn make_test_model(opset: i64) -> ModelProto {
        ModelProto {
            ir_version: 7,
            producer_name: "tf2onnx".to_string(),
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: opset,
            }],
            graph: Some(GraphProto {
                name: "tf_graph".to_string(),
                node: vec![make_node("Relu", &["X"], &["Y"], "relu")],
                input: vec![ValueInfoProto {
                    name: "X".to_string(),
                    ..Default::default()
                }],
                output: vec![ValueInfoProto {
                    name: "Y".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_fuse_model_without_loops() {
        let model = make_test_model(9);
        let (fused, stats) = fuse_lstm_model(&model, &FuseLstmConfig::new()).unwrap();

        assert_eq!(stats.transform.transforms_applied, 0);
        assert_eq!(stats.nodes_reduced(), 0);
        assert_eq!(fused.graph.unwrap().node.len(), 1);
    }

    #[test]
    fn test_opset_import_is_raised() {
        let model = make_test_model(7);
        let config = FuseLstmConfig::new().with_target_opset(13);
        let (fused, _) = fuse_lstm_model(&model, &config).unwrap();
        assert_eq!(fused.get_opset_version(), Some(13));

        let model = make_test_model(15);
        let (fused, _) = fuse_lstm_model(&model, &config).unwrap();
        assert_eq!(fused.get_opset_version(), Some(15));
    }

    #[test]
    fn test_missing_graph() {
        let err = fuse_lstm_model(&ModelProto::default(), &FuseLstmConfig::new()).unwrap_err();
        assert!(matches!(err, TransformError::InvalidModel(_)));
    }

    #[test]
    fn test_fuse_file() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("lstm_fuse_in_{}.onnx", std::process::id()));
        let output = dir.join(format!("lstm_fuse_out_{}.onnx", std::process::id()));

        save_model(&make_test_model(11), &input).unwrap();
        let stats = fuse_lstm_file(&input, &output).unwrap();
        let loaded = load_model(&output).unwrap();

        std::fs::remove_file(&input).ok();
        std::fs::remove_file(&output).ok();

        assert_eq!(stats.original_nodes, 1);
        assert_eq!(loaded.get_opset_version(), Some(11));
    }

    #[test]
    fn test_stats_percent() {
        let stats = FuseStats {
            original_nodes: 200,
            fused_nodes: 50,
            ..Default::default()
        };
        assert_eq!(stats.nodes_reduced(), 150);
        assert!((stats.node_reduction_percent() - 75.0).abs() < 0.01);
    }
}
