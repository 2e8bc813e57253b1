//! ONNX model reader
//!
//! Load ONNX models from files or bytes.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use prost::Message;

use crate::error::{OnnxResult, TransformError};
use crate::proto::{GraphProto, ModelProto};

/// Load an ONNX model from a file path
///
/// # Example
///
/// ```ignore
/// use lstm_fuse::io::load_model;
///
/// let model = load_model("tf_lstm.onnx")?;
/// println!("opset: {:?}", model.get_opset_version());
/// ```
pub fn load_model<P: AsRef<Path>>(path: P) -> OnnxResult<ModelProto> {
    let path = path.as_ref();

    let file = File::open(path).map_err(|e| {
        TransformError::InvalidModel(format!("Failed to open file '{}': {}", path.display(), e))
    })?;

    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();

    reader.read_to_end(&mut buffer).map_err(|e| {
        TransformError::InvalidModel(format!("Failed to read file '{}': {}", path.display(), e))
    })?;

    load_model_from_bytes(&buffer)
}

/// Decode an ONNX model from bytes
pub fn load_model_from_bytes(bytes: &[u8]) -> OnnxResult<ModelProto> {
    Ok(ModelProto::decode(bytes)?)
}

/// Load only the graph from an ONNX model file
pub fn load_graph<P: AsRef<Path>>(path: P) -> OnnxResult<GraphProto> {
    let model = load_model(path)?;
    model
        .graph
        .ok_or_else(|| TransformError::InvalidModel("Model does not contain a graph".to_string()))
}

/// Summary of a model relevant to LSTM fusion
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// IR version
    pub ir_version: i64,
    /// Producer name
    pub producer_name: String,
    /// Default-domain opset, if declared
    pub opset: Option<i64>,
    /// Graph name
    pub graph_name: String,
    /// Number of nodes
    pub node_count: usize,
    /// Number of initializers
    pub initializer_count: usize,
    /// `LoopCond` nodes, one per TensorFlow while loop
    pub loop_count: usize,
    /// Fused `LSTM` nodes already present
    pub lstm_count: usize,
}

impl ModelInfo {
    /// Extract metadata from a model
    pub fn from_model(model: &ModelProto) -> Self {
        let graph = model.graph.as_ref();
        let count_op = |op: &str| {
            graph
                .map(|g| g.node.iter().filter(|n| n.op_type == op).count())
                .unwrap_or(0)
        };

        Self {
            ir_version: model.ir_version,
            producer_name: model.producer_name.clone(),
            opset: model.get_opset_version(),
            graph_name: graph.map(|g| g.name.clone()).unwrap_or_default(),
            node_count: graph.map(|g| g.node.len()).unwrap_or(0),
            initializer_count: graph.map(|g| g.initializer.len()).unwrap_or(0),
            loop_count: count_op("LoopCond"),
            lstm_count: count_op("LSTM"),
        }
    }
}

/// Load a model file and summarize it
pub fn get_model_info<P: AsRef<Path>>(path: P) -> OnnxResult<ModelInfo> {
    let model = load_model(path)?;
    Ok(ModelInfo::from_model(&model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::make_node;
    use crate::proto::OperatorSetIdProto;

    fn create_test_model() -> ModelProto {
        ModelProto {
            ir_version: 7,
            producer_name: "tf2onnx".to_string(),
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: 9,
            }],
            graph: Some(GraphProto {
                name: "tf_graph".to_string(),
                node: vec![
                    make_node("Less", &["i:0", "n:0"], &["less:0"], "rnn/while/Less"),
                    make_node("LoopCond", &["less:0"], &["cond:0"], "rnn/while/LoopCond"),
                ],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_from_bytes() {
        let model = create_test_model();
        let bytes = model.encode_to_vec();

        let loaded = load_model_from_bytes(&bytes).unwrap();
        assert_eq!(loaded.ir_version, 7);
        assert_eq!(loaded.producer_name, "tf2onnx");
    }

    #[test]
    fn test_model_info() {
        let info = ModelInfo::from_model(&create_test_model());

        assert_eq!(info.opset, Some(9));
        assert_eq!(info.graph_name, "tf_graph");
        assert_eq!(info.node_count, 2);
        assert_eq!(info.loop_count, 1);
        assert_eq!(info.lstm_count, 0);
    }

    #[test]
    fn test_load_invalid_bytes() {
        let err = load_model_from_bytes(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, TransformError::ProtoDecode(_)));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_model("/nonexistent/model.onnx").is_err());
    }
}
