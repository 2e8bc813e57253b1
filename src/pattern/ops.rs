//! Common operation patterns
//!
//! Op-type groups and the pre-defined LSTM cell template.

use super::matcher::OpPattern;
use super::roles::CellRole;

/// Ops whose two operands may appear in either order
pub const COMMUTATIVE_OPS: &[&str] = &["Add", "Mul"];

/// TensorFlow concatenation ops
pub const CONCAT_OPS: &[&str] = &["ConcatV2", "Concat"];

/// Anchor op type of the LSTM cell template
pub const LSTM_CELL_ANCHOR: &str = "Mul";

/// Gate pre-activations: `Split(axis, BiasAdd(MatMul(xh, Enter(kernel)), Enter(bias)))`
fn gate_inputs_pattern() -> OpPattern {
    OpPattern::op(
        &["Split"],
        vec![
            OpPattern::op(&["Const", "Constant"], vec![]),
            OpPattern::op(
                &["BiasAdd"],
                vec![
                    OpPattern::op(
                        &["MatMul"],
                        vec![
                            OpPattern::op(CONCAT_OPS, vec![]).bind(CellRole::Xh),
                            OpPattern::op(&["Enter"], vec![OpPattern::any().bind(CellRole::CellKernel)]),
                        ],
                    ),
                    OpPattern::op(&["Enter"], vec![OpPattern::any().bind(CellRole::CellBias)]),
                ],
            )
            .bind(CellRole::BiasAdd),
        ],
    )
}

/// Template for `LSTMCell` and `BasicLSTMCell` inside a `dynamic_rnn` loop
///
/// ```text
/// ht = sigmoid(o) * tanh(ct)
/// ct = sigmoid(f + forget_bias) * c_prev + sigmoid(i) * tanh(j)
/// ```
pub fn lstm_cell_pattern() -> OpPattern {
    OpPattern::op(
        &["Mul"],
        vec![
            OpPattern::op(&["Sigmoid"], vec![gate_inputs_pattern()]).bind(CellRole::Ot),
            OpPattern::op(
                &["Tanh"],
                vec![OpPattern::op(
                    &["Add"],
                    vec![
                        OpPattern::op(
                            &["Mul"],
                            vec![
                                OpPattern::op(
                                    &["Sigmoid"],
                                    vec![OpPattern::op(
                                        &["Add"],
                                        vec![
                                            gate_inputs_pattern(),
                                            OpPattern::any().bind(CellRole::FtBias),
                                        ],
                                    )],
                                )
                                .bind(CellRole::Ft),
                                OpPattern::any(),
                            ],
                        ),
                        OpPattern::op(
                            &["Mul"],
                            vec![
                                OpPattern::op(&["Sigmoid"], vec![gate_inputs_pattern()])
                                    .bind(CellRole::It),
                                OpPattern::op(&["Tanh"], vec![gate_inputs_pattern()])
                                    .bind(CellRole::Gt),
                            ],
                        ),
                    ],
                )
                .bind(CellRole::Ct)],
            ),
        ],
    )
    .bind(CellRole::Ht)
}
