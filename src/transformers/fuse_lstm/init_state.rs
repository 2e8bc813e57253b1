//! Initial hidden and cell states
//!
//! TensorFlow keeps `c` and `h` as `[batch, hidden]`, either as a tuple of
//! two loop variables or packed into one `[batch, 2 * hidden]` variable.
//! ONNX `LSTM` wants each as `[num_directions, batch, hidden]`.

use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::proto::tensor_proto::DataType;
use crate::proto::TensorProto;
use crate::tensor::{unsqueeze_shape, vec_to_tensor_f32};

use super::ops::{make_cast, make_concat, make_plain, make_slice, make_unsqueeze};
use super::props::{LstmInput, MustKeepSet, RnnProps};
use super::switch::StateKind;

/// Tensors built for one initializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateTensors {
    /// One tuple slot
    Single(String),
    /// Both halves of a shared slot
    Pair {
        /// `initial_h`
        h: String,
        /// `initial_c`
        c: String,
    },
}

/// Key of a built initial state
///
/// A `Fill` result is tiled against the batch size of the scope that built
/// it, so its key also carries that batch-size tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InitStateKey {
    /// Slot the tensor was built for
    pub kind: StateKind,
    /// Loop-entry tensor
    pub source: String,
    /// Batch-size tensor of a `Fill` result
    pub batch: Option<String>,
}

/// Built initial states
pub type InitStateCache = FxHashMap<InitStateKey, StateTensors>;

/// Shared state for building initial states of one rewrite
pub struct InitStateBuilder<'s> {
    /// Target opset of glue nodes
    pub opset: i64,
    /// Results of earlier calls in this pass
    pub cache: &'s mut InitStateCache,
    /// Nodes the pruning step keeps
    pub must_keep: &'s mut MustKeepSet,
}

/// Whether `tensor` is produced by a TensorFlow `Fill`
fn fill_producer<'g>(ctx: &'g GraphContext, tensor: &str) -> Option<&'g crate::proto::NodeProto> {
    ctx.get_producer(tensor).filter(|n| n.is_op_type("Fill"))
}

/// Reject `Fill` initializers whose fill value cannot be read
pub fn validate_initial_states(ctx: &GraphContext, props: &RnnProps) -> OnnxResult<()> {
    for tensor in props.var_initializers.values() {
        if let Some(fill) = fill_producer(ctx, tensor) {
            let value = fill
                .input
                .get(1)
                .and_then(|v| ctx.get_constant_tensor(v))
                .ok_or_else(|| {
                    TransformError::rejected(format!("fill value of {} is not constant", fill.name))
                })?;
            if value.num_elements() != 1 {
                return Err(TransformError::rejected(format!(
                    "fill value of {} has {} elements",
                    fill.name,
                    value.num_elements()
                )));
            }
        }
    }
    Ok(())
}

fn batch_extent(ctx: &GraphContext, props: &RnnProps) -> i64 {
    props
        .onnx_input_ids
        .get(&LstmInput::X)
        .and_then(|x| ctx.get_shape(x))
        .and_then(|s| s.get(1).copied())
        .unwrap_or(-1)
}

fn state_key(
    ctx: &GraphContext,
    props: &RnnProps,
    kind: StateKind,
    source: &str,
) -> OnnxResult<InitStateKey> {
    let batch = match fill_producer(ctx, source) {
        Some(_) => Some(props.batch_size()?.to_string()),
        None => None,
    };
    Ok(InitStateKey {
        kind,
        source: source.to_string(),
        batch,
    })
}

fn elem_type_of(ctx: &GraphContext, tensor: &str) -> i32 {
    ctx.get_elem_type(tensor).unwrap_or(DataType::Float as i32)
}

impl InitStateBuilder<'_> {
    /// Build `initial_h` and `initial_c` and record them on `props`
    pub fn build(&mut self, ctx: &mut GraphContext, props: &mut RnnProps) -> OnnxResult<()> {
        let inits = &props.var_initializers;
        let (h, c) = if let Some(shared) = inits.get(&StateKind::SharedCellHidden) {
            let shared = shared.clone();
            self.shared(ctx, props, &shared)?
        } else if let (Some(h), Some(c)) = (inits.get(&StateKind::Hidden), inits.get(&StateKind::Cell)) {
            let (h, c) = (h.clone(), c.clone());
            let h = self.tuple_slot(ctx, props, StateKind::Hidden, &h)?;
            let c = self.tuple_slot(ctx, props, StateKind::Cell, &c)?;
            (h, c)
        } else {
            return Err(TransformError::StructureMismatch(format!(
                "no usable initial states in scope {}",
                props.scope
            )));
        };

        props.set_input(LstmInput::InitialH, h);
        props.set_input(LstmInput::InitialC, c);
        Ok(())
    }

    fn shared(
        &mut self,
        ctx: &mut GraphContext,
        props: &RnnProps,
        init: &str,
    ) -> OnnxResult<(String, String)> {
        let key = state_key(ctx, props, StateKind::SharedCellHidden, init)?;
        if let Some(StateTensors::Pair { h, c }) = self.cache.get(&key) {
            return Ok((h.clone(), c.clone()));
        }

        let (h, c) = if key.batch.is_some() {
            let filled = self.fill(ctx, props, init)?;
            (filled.clone(), filled)
        } else {
            keep_producer(ctx, self.must_keep, init);
            let hidden = props.hidden_size as i64;
            let elem_type = elem_type_of(ctx, init);
            let state_shape = [1, batch_extent(ctx, props), hidden];

            let c_slice = make_slice(ctx, self.opset, init, &[1], &[0], &[hidden]);
            let c = make_unsqueeze(ctx, self.opset, &c_slice, &[0]);
            let h_slice = make_slice(ctx, self.opset, init, &[1], &[hidden], &[2 * hidden]);
            let h = make_unsqueeze(ctx, self.opset, &h_slice, &[0]);

            for slice in [&c_slice, &h_slice] {
                ctx.set_shape_and_type(slice, elem_type, &state_shape[1..]);
            }
            ctx.set_shape_and_type(&c, elem_type, &state_shape);
            ctx.set_shape_and_type(&h, elem_type, &state_shape);
            (h, c)
        };

        debug!("shared initial state {} split into {} and {}", init, h, c);
        self.cache.insert(key, StateTensors::Pair { h: h.clone(), c: c.clone() });
        Ok((h, c))
    }

    fn tuple_slot(
        &mut self,
        ctx: &mut GraphContext,
        props: &RnnProps,
        kind: StateKind,
        init: &str,
    ) -> OnnxResult<String> {
        let key = state_key(ctx, props, kind, init)?;
        if let Some(StateTensors::Single(t)) = self.cache.get(&key) {
            return Ok(t.clone());
        }

        let tensor = if key.batch.is_some() {
            self.fill(ctx, props, init)?
        } else {
            keep_producer(ctx, self.must_keep, init);
            if let Some(value) = ctx.get_constant_tensor(init) {
                let mut value = value.clone();
                value.dims.insert(0, 1);
                ctx.make_const("Const", value)
            } else {
                let expanded = make_unsqueeze(ctx, self.opset, init, &[0]);
                let shape = ctx
                    .get_shape(init)
                    .and_then(|s| unsqueeze_shape(&s, &[0]).ok())
                    .unwrap_or_else(|| vec![1, batch_extent(ctx, props), props.hidden_size as i64]);
                let elem_type = elem_type_of(ctx, init);
                ctx.set_shape_and_type(&expanded, elem_type, &shape);
                ctx.replace_all_inputs(init, &expanded);
                expanded
            }
        };

        debug!("{} initial state {} becomes {}", kind, init, tensor);
        // h and c may enter from the same tensor, and later scopes read the
        // migrated tensor
        for slot in [StateKind::Hidden, StateKind::Cell] {
            for (source, batch) in [(init, &key.batch), (tensor.as_str(), &None)] {
                let alias = InitStateKey {
                    kind: slot,
                    source: source.to_string(),
                    batch: batch.clone(),
                };
                self.cache.insert(alias, StateTensors::Single(tensor.clone()));
            }
        }
        Ok(tensor)
    }

    /// Broadcast a `Fill` value to `[1, batch, hidden]`
    fn fill(&mut self, ctx: &mut GraphContext, props: &RnnProps, init: &str) -> OnnxResult<String> {
        let (fill_name, value) = {
            let fill = fill_producer(ctx, init).ok_or_else(|| {
                TransformError::StructureMismatch(format!("{} is not produced by Fill", init))
            })?;
            let value = fill
                .input
                .get(1)
                .and_then(|v| ctx.get_constant_tensor(v))
                .cloned()
                .ok_or_else(|| {
                    TransformError::StructureMismatch(format!(
                        "fill value of {} is not constant",
                        fill.name
                    ))
                })?;
            (fill.name.clone(), value)
        };
        self.must_keep.remove(&fill_name);

        let batch = props.batch_size()?.to_string();
        let one = ctx.make_const("Const", vec_to_tensor_f32(&[1.0], ""));
        let hidden = ctx.make_const("Const", vec_to_tensor_f32(&[props.hidden_size as f32], ""));

        let shape = make_concat(ctx, &[&one, &batch, &hidden], 0);
        ctx.set_shape_and_type(&shape, DataType::Float as i32, &[3]);
        let repeats = make_cast(ctx, &shape, DataType::Int64);
        ctx.set_shape_and_type(&repeats, DataType::Int64 as i32, &[3]);

        let elem_type = value.data_type;
        let cell = ctx.make_const("Const", TensorProto {
            dims: vec![1, 1, 1],
            ..value
        });
        let tiled = make_plain(ctx, "Tile", &[&cell, &repeats]);
        ctx.set_shape_and_type(
            &tiled,
            elem_type,
            &[1, batch_extent(ctx, props), props.hidden_size as i64],
        );

        debug!("fill {} replaced by {}", fill_name, tiled);
        Ok(tiled)
    }
}

fn keep_producer(ctx: &GraphContext, must_keep: &mut MustKeepSet, tensor: &str) {
    if let Some(name) = ctx.get_producer_name(tensor) {
        must_keep.insert(name.clone());
    }
}
