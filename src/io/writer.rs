//! ONNX model writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use prost::Message;

use crate::error::{OnnxResult, TransformError};
use crate::proto::ModelProto;

/// Save an ONNX model to a file
///
/// ```ignore
/// use lstm_fuse::io::save_model;
///
/// save_model(&model, "fused.onnx")?;
/// ```
pub fn save_model<P: AsRef<Path>>(model: &ModelProto, path: P) -> OnnxResult<()> {
    let path = path.as_ref();

    let file = File::create(path).map_err(|e| {
        TransformError::InvalidModel(format!("Failed to create file '{}': {}", path.display(), e))
    })?;

    let mut writer = BufWriter::new(file);
    writer.write_all(&model_to_bytes(model)).map_err(|e| {
        TransformError::InvalidModel(format!("Failed to write file '{}': {}", path.display(), e))
    })?;
    writer.flush()?;

    Ok(())
}

/// Encode an ONNX model to bytes
pub fn model_to_bytes(model: &ModelProto) -> Vec<u8> {
    model.encode_to_vec()
}

/// Size of the encoded model in bytes
pub fn model_size(model: &ModelProto) -> usize {
    model.encoded_len()
}
