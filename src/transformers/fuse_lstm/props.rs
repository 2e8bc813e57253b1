//! Per-match state of the LSTM rewrite

use ndarray::ArrayD;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{OnnxResult, TransformError};
use crate::proto::tensor_proto::DataType;

use super::switch::StateKind;

/// Nodes that must survive dead-node pruning
pub type MustKeepSet = FxHashSet<String>;

/// Inputs of the ONNX `LSTM` operator, in operator order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LstmInput {
    X,
    W,
    R,
    B,
    SequenceLens,
    InitialH,
    InitialC,
}

impl LstmInput {
    /// Operator input order
    pub const ORDER: [LstmInput; 7] = [
        LstmInput::X,
        LstmInput::W,
        LstmInput::R,
        LstmInput::B,
        LstmInput::SequenceLens,
        LstmInput::InitialH,
        LstmInput::InitialC,
    ];

    /// ONNX input name
    pub fn as_str(self) -> &'static str {
        match self {
            LstmInput::X => "X",
            LstmInput::W => "W",
            LstmInput::R => "R",
            LstmInput::B => "B",
            LstmInput::SequenceLens => "sequence_lens",
            LstmInput::InitialH => "initial_h",
            LstmInput::InitialC => "initial_c",
        }
    }
}

/// A constant read out of the graph
#[derive(Debug, Clone)]
pub struct Weight {
    /// Node holding the value, or the initializer name
    pub node: String,
    /// Decoded value
    pub value: ArrayD<f64>,
    /// Element type of the stored tensor
    pub dtype: DataType,
}

/// Validated cell constants
#[derive(Debug, Clone)]
pub struct RnnWeights {
    /// Kernel, shape `(input_size + hidden_size, 4 * hidden_size)`
    pub kernel: Weight,
    /// Bias, shape `(4 * hidden_size,)`
    pub bias: Weight,
    /// Single-element forget bias
    pub forget_bias: Weight,
}

/// Mutable state of one rewrite attempt
#[derive(Debug, Clone, Default)]
pub struct RnnProps {
    /// Name scope of the `dynamic_rnn` call
    pub scope: String,
    /// Tensor feeding the loop from outside the scope
    pub input_id: String,
    /// Input as consumed by the fused node (time-major)
    pub x_input_id: String,
    /// Whether the caller already supplied time-major input
    pub time_major: bool,
    /// Batch-to-time transpose found after the input, if any
    pub input_transpose: Option<String>,
    /// Explicit per-batch sequence lengths, if the caller supplied them
    pub sequence_length: Option<String>,
    /// Node supplying the sequence lengths
    pub sequence_length_node: Option<String>,
    /// Width of one input step
    pub input_size: usize,
    /// Number of hidden units
    pub hidden_size: usize,
    /// Verified loop-entry tensor per state slot
    pub var_initializers: FxHashMap<StateKind, String>,
    /// Tensor wired to each operator input
    pub onnx_input_ids: FxHashMap<LstmInput, String>,
    /// Float `[batch]` tensor, once synthesized
    pub batch_size: Option<String>,
}

impl RnnProps {
    /// Start a new attempt in `scope`
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            time_major: true,
            ..Default::default()
        }
    }

    /// Record the tensor wired to `input`
    pub fn set_input(&mut self, input: LstmInput, tensor: impl Into<String>) {
        self.onnx_input_ids.insert(input, tensor.into());
    }

    /// Tensor wired to `input`
    pub fn input(&self, input: LstmInput) -> OnnxResult<&str> {
        self.onnx_input_ids
            .get(&input)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                TransformError::StructureMismatch(format!(
                    "LSTM input `{}` was never assigned in scope {}",
                    input.as_str(),
                    self.scope
                ))
            })
    }

    /// Batch-size tensor produced by sequence-length synthesis
    pub fn batch_size(&self) -> OnnxResult<&str> {
        self.batch_size.as_deref().ok_or_else(|| {
            TransformError::StructureMismatch(format!(
                "batch size is not available in scope {}",
                self.scope
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_are_tracked() {
        let mut props = RnnProps::new("rnn");
        assert!(props.time_major);

        props.set_input(LstmInput::W, "W__1:0");
        assert_eq!(props.input(LstmInput::W).unwrap(), "W__1:0");

        let err = props.input(LstmInput::InitialC).unwrap_err();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("initial_c"));
        assert!(props.batch_size().is_err());
    }

    #[test]
    fn test_operator_order() {
        let names: Vec<_> = LstmInput::ORDER.iter().map(|i| i.as_str()).collect();
        assert_eq!(
            names,
            vec!["X", "W", "R", "B", "sequence_lens", "initial_h", "initial_c"]
        );
    }
}
