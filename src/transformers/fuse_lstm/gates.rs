//! Gate reordering for kernel and bias
//!
//! TensorFlow packs the four gates as `(i, c, f, o)` along the kernel columns
//! and adds a scalar forget bias at runtime. ONNX `LSTM` expects `(i, o, f, c)`
//! with the forget bias folded into `Wb` and a separate recurrent bias `Rb`.

use ndarray::{concatenate, s, Array2, Array3, ArrayView1, ArrayView2, Axis, LinalgScalar};

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::tensor::array_to_tensor;

use super::props::{LstmInput, RnnProps, RnnWeights};

/// Number of gates in an LSTM cell
pub const NUM_GATES: usize = 4;

/// Native gate feeding each fused position
pub const NATIVE_TO_FUSED: [usize; NUM_GATES] = [0, 3, 2, 1];

/// Native index of the forget gate
pub const FORGET_GATE: usize = 2;

/// Kernel and biases in ONNX layout
#[derive(Debug, Clone, PartialEq)]
pub struct FusedWeights {
    /// Input weights, `(1, 4h, input_size)`
    pub w: Array3<f64>,
    /// Recurrent weights, `(1, 4h, h)`
    pub r: Array3<f64>,
    /// `Wb` followed by zero `Rb`, `(1, 8h)`
    pub b: Array2<f64>,
    /// Width of one input step
    pub input_size: usize,
    /// Number of hidden units
    pub hidden_size: usize,
}

/// Hidden size implied by a packed bias
pub fn hidden_size_of(bias_len: usize) -> OnnxResult<usize> {
    if bias_len == 0 || bias_len % NUM_GATES != 0 {
        return Err(TransformError::rejected(format!(
            "bias length {} is not a positive multiple of {}",
            bias_len, NUM_GATES
        )));
    }
    Ok(bias_len / NUM_GATES)
}

/// Reorder the gate column groups of a `(rows, 4h)` block
pub fn reorder_gate_columns<A: LinalgScalar>(block: ArrayView2<A>, hidden: usize) -> OnnxResult<Array2<A>> {
    let groups: Vec<_> = NATIVE_TO_FUSED
        .iter()
        .map(|&g| block.slice(s![.., g * hidden..(g + 1) * hidden]))
        .collect();
    concatenate(Axis(1), &groups).map_err(|e| TransformError::Internal(e.to_string()))
}

/// Fold the forget bias into gate 2, reorder, and append a zero `Rb`
///
/// Values are only moved, except the forget block which gains `forget_bias`.
pub fn fuse_bias<A: LinalgScalar>(bias: ArrayView1<A>, forget_bias: A) -> OnnxResult<Array2<A>> {
    let hidden = hidden_size_of(bias.len())?;
    let mut fused = Array2::<A>::zeros((1, 2 * bias.len()));

    for (p, &g) in NATIVE_TO_FUSED.iter().enumerate() {
        let block = bias.slice(s![g * hidden..(g + 1) * hidden]);
        let mut dst = fused.slice_mut(s![0, p * hidden..(p + 1) * hidden]);
        if g == FORGET_GATE {
            dst.assign(&block.mapv(|v| v + forget_bias));
        } else {
            dst.assign(&block);
        }
    }

    Ok(fused)
}

/// Split the kernel into input and recurrent parts in ONNX layout
///
/// Returns `W (1, 4h, input_size)` and `R (1, 4h, h)`.
pub fn fuse_kernel<A: LinalgScalar>(
    kernel: ArrayView2<A>,
    hidden: usize,
) -> OnnxResult<(Array3<A>, Array3<A>)> {
    let (rows, cols) = kernel.dim();
    if cols != NUM_GATES * hidden || rows <= hidden {
        return Err(TransformError::rejected(format!(
            "kernel {:?} does not fit hidden size {}",
            kernel.dim(),
            hidden
        )));
    }
    let input_size = rows - hidden;

    let wx = reorder_gate_columns(kernel.slice(s![..input_size, ..]), hidden)?;
    let wh = reorder_gate_columns(kernel.slice(s![input_size.., ..]), hidden)?;

    Ok((
        wx.t().to_owned().insert_axis(Axis(0)),
        wh.t().to_owned().insert_axis(Axis(0)),
    ))
}

/// Recover the TensorFlow kernel from `W` and `R`
pub fn unfuse_kernel<A: LinalgScalar>(w: &Array3<A>, r: &Array3<A>) -> OnnxResult<Array2<A>> {
    let hidden = r.shape()[2];
    let wx = restore_gate_columns(w.index_axis(Axis(0), 0).t(), hidden)?;
    let wh = restore_gate_columns(r.index_axis(Axis(0), 0).t(), hidden)?;
    concatenate(Axis(0), &[wx.view(), wh.view()]).map_err(|e| TransformError::Internal(e.to_string()))
}

/// Recover the TensorFlow bias from `B`, removing the folded forget bias
pub fn unfuse_bias<A: LinalgScalar>(b: &Array2<A>, forget_bias: A) -> OnnxResult<Array2<A>> {
    let hidden = hidden_size_of(b.shape()[1] / 2)?;
    let mut native = restore_gate_columns(b.slice(s![.., ..NUM_GATES * hidden]), hidden)?;
    native
        .slice_mut(s![.., FORGET_GATE * hidden..(FORGET_GATE + 1) * hidden])
        .mapv_inplace(|v| v - forget_bias);
    Ok(native)
}

fn restore_gate_columns<A: LinalgScalar>(block: ArrayView2<A>, hidden: usize) -> OnnxResult<Array2<A>> {
    let mut fused_of = [0usize; NUM_GATES];
    for (fused, &native) in NATIVE_TO_FUSED.iter().enumerate() {
        fused_of[native] = fused;
    }
    let groups: Vec<_> = fused_of
        .iter()
        .map(|&p| block.slice(s![.., p * hidden..(p + 1) * hidden]))
        .collect();
    concatenate(Axis(1), &groups).map_err(|e| TransformError::Internal(e.to_string()))
}

/// Convert validated TensorFlow weights to ONNX layout
pub fn fuse_weights(weights: &RnnWeights) -> OnnxResult<FusedWeights> {
    let bias = weights
        .bias
        .value
        .view()
        .into_dimensionality::<ndarray::Ix1>()
        .map_err(|e| TransformError::rejected(format!("bias is not rank 1: {}", e)))?;
    let kernel = weights
        .kernel
        .value
        .view()
        .into_dimensionality::<ndarray::Ix2>()
        .map_err(|e| TransformError::rejected(format!("kernel is not rank 2: {}", e)))?;
    let forget_bias = weights
        .forget_bias
        .value
        .iter()
        .next()
        .copied()
        .ok_or_else(|| TransformError::rejected("forget bias is empty"))?;

    let hidden_size = hidden_size_of(bias.len())?;
    let b = fuse_bias(bias, forget_bias)?;
    let (w, r) = fuse_kernel(kernel, hidden_size)?;

    Ok(FusedWeights {
        input_size: w.shape()[2],
        hidden_size,
        w,
        r,
        b,
    })
}

/// Emit `W`, `R` and `B` as constants and record them on `props`
pub fn transform_weights(
    ctx: &mut GraphContext,
    weights: &RnnWeights,
    props: &mut RnnProps,
) -> OnnxResult<()> {
    let fused = fuse_weights(weights)?;
    let dtype = weights.kernel.dtype;

    let w = ctx.make_const("W", array_to_tensor(&fused.w.into_dyn(), dtype, "")?);
    let r = ctx.make_const("R", array_to_tensor(&fused.r.into_dyn(), dtype, "")?);
    let b = ctx.make_const("B", array_to_tensor(&fused.b.into_dyn(), dtype, "")?);

    props.input_size = fused.input_size;
    props.hidden_size = fused.hidden_size;
    props.set_input(LstmInput::W, w);
    props.set_input(LstmInput::R, r);
    props.set_input(LstmInput::B, b);
    Ok(())
}
