//! Loop-state classification
//!
//! TensorFlow carries every piece of loop state through an
//! `Enter -> Merge -> Switch -> Identity` chain. Each `Switch` gated by the
//! scope's `LoopCond` is classified by what its `Identity` feeds inside the
//! cell, which tells us whether it carries the cell state, the hidden state,
//! both packed together, or the output `TensorArray` flow.

use std::fmt;

use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::pattern::{CellMatch, CellRole};
use crate::proto::NodeProto;
use crate::transformers::common::get_constant_ints;

/// What a loop switch carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateKind {
    /// Cell state `c`
    Cell,
    /// Hidden state `h`
    Hidden,
    /// `c` and `h` concatenated along axis 1 (non-tuple state)
    SharedCellHidden,
    /// Flow of the output `TensorArray`
    Output,
}

impl StateKind {
    /// Short name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Cell => "ct",
            StateKind::Hidden => "ht",
            StateKind::SharedCellHidden => "ct_ht",
            StateKind::Output => "output",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check run against the consumers of a switch's `Identity`
type StateCheck = fn(&GraphContext, &CellMatch, &LoopSwitch) -> bool;

/// One row of the classification table
pub struct StateHandler {
    /// Kind recognized by this row
    pub kind: StateKind,
    check: StateCheck,
    /// Whether the loop-entry value becomes an `LSTM` initial state
    pub needs_initializer: bool,
}

impl StateHandler {
    /// Run the check for this row
    pub fn accepts(&self, ctx: &GraphContext, m: &CellMatch, switch: &LoopSwitch) -> bool {
        (self.check)(ctx, m, switch)
    }
}

/// Classification table, tried in order
pub static STATE_HANDLERS: [StateHandler; 4] = [
    StateHandler {
        kind: StateKind::Cell,
        check: check_cell,
        needs_initializer: true,
    },
    StateHandler {
        kind: StateKind::Hidden,
        check: check_hidden,
        needs_initializer: true,
    },
    StateHandler {
        kind: StateKind::SharedCellHidden,
        check: check_shared,
        needs_initializer: true,
    },
    StateHandler {
        kind: StateKind::Output,
        check: check_output,
        needs_initializer: false,
    },
];

/// A traced loop switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSwitch {
    /// `Switch` node name
    pub switch: String,
    /// Tensor leaving the loop, read by the `Exit`
    pub exit_branch: String,
    /// Value entering the loop through `Enter`
    pub entry: String,
    /// Nodes reading the in-loop `Identity`
    pub identity_consumers: Vec<String>,
}

/// Trace `switch` back to its loop entry and forward to its in-loop readers
pub fn trace_switch(ctx: &GraphContext, switch: &NodeProto) -> OnnxResult<LoopSwitch> {
    let merge = ctx
        .get_input_node(switch, 0)
        .filter(|n| n.is_op_type("Merge"))
        .ok_or_else(|| {
            TransformError::rejected(format!("switch {} is not fed by a Merge", switch.name))
        })?;

    let enter = merge
        .input
        .iter()
        .filter_map(|input| ctx.get_producer(input))
        .find(|n| n.is_op_type("Enter"))
        .ok_or_else(|| {
            TransformError::rejected(format!("merge {} has no Enter input", merge.name))
        })?;
    let entry = enter
        .input
        .first()
        .cloned()
        .ok_or_else(|| TransformError::rejected(format!("enter {} has no input", enter.name)))?;

    let (exit_branch, body_branch) = match switch.output.as_slice() {
        [exit, body, ..] => (exit.clone(), body),
        _ => {
            return Err(TransformError::rejected(format!(
                "switch {} has fewer than two outputs",
                switch.name
            )))
        }
    };

    let identity = match ctx.get_consumers(body_branch).as_slice() {
        [only] if only.is_op_type("Identity") => *only,
        other => {
            return Err(TransformError::rejected(format!(
                "switch {} body branch has {} consumers, expected a single Identity",
                switch.name,
                other.len()
            )))
        }
    };

    let identity_consumers = identity
        .output
        .first()
        .and_then(|out| ctx.get_consumer_names(out))
        .map(|names| names.to_vec())
        .unwrap_or_default();

    Ok(LoopSwitch {
        switch: switch.name.clone(),
        exit_branch,
        entry,
        identity_consumers,
    })
}

/// Every `Switch` gated by the single `LoopCond` in `scope`
pub fn find_loop_switches(ctx: &GraphContext, scope: &str) -> OnnxResult<Vec<LoopSwitch>> {
    let loop_conds: Vec<&NodeProto> = ctx
        .nodes_in_scope(scope)
        .filter(|n| n.is_op_type("LoopCond"))
        .collect();
    let loop_cond = match loop_conds.as_slice() {
        [only] => *only,
        other => {
            return Err(TransformError::rejected(format!(
                "found {} LoopCond nodes in scope {}",
                other.len(),
                scope
            )))
        }
    };

    let output = loop_cond.output.first().ok_or_else(|| {
        TransformError::rejected(format!("LoopCond {} has no output", loop_cond.name))
    })?;

    let mut switches = Vec::new();
    for consumer in ctx.get_consumers(output) {
        if !consumer.is_op_type("Switch") {
            return Err(TransformError::rejected(format!(
                "LoopCond {} feeds non-Switch node {}",
                loop_cond.name, consumer.name
            )));
        }
        switches.push(trace_switch(ctx, consumer)?);
    }

    Ok(switches)
}

/// First kind among `handlers` that accepts `switch`
pub fn classify<'h>(
    ctx: &GraphContext,
    m: &CellMatch,
    switch: &LoopSwitch,
    handlers: impl IntoIterator<Item = &'h StateHandler>,
) -> Option<StateKind> {
    handlers
        .into_iter()
        .find(|h| h.accepts(ctx, m, switch))
        .map(|h| h.kind)
}

/// Loop-entry tensor of every state slot that needs an initial value
///
/// The resulting set must be either a shared `c`/`h` slot or both tuple
/// slots; anything else rejects the match.
pub fn find_initializers(
    ctx: &GraphContext,
    m: &CellMatch,
    scope: &str,
) -> OnnxResult<FxHashMap<StateKind, String>> {
    let mut initializers = FxHashMap::default();

    for switch in find_loop_switches(ctx, scope)? {
        let handlers = STATE_HANDLERS.iter().filter(|h| h.needs_initializer);
        if let Some(kind) = classify(ctx, m, &switch, handlers) {
            debug!("switch {} carries {} from {}", switch.switch, kind, switch.entry);
            initializers.insert(kind, switch.entry);
        }
    }

    validate_initializers(&initializers)?;
    Ok(initializers)
}

/// Every switch of `scope` that any handler accepts, with its kind
///
/// Switches nothing recognizes are left out; their exits stay untouched.
pub fn classify_switches(
    ctx: &GraphContext,
    m: &CellMatch,
    scope: &str,
) -> OnnxResult<Vec<(LoopSwitch, StateKind)>> {
    let mut classified = Vec::new();
    for switch in find_loop_switches(ctx, scope)? {
        match classify(ctx, m, &switch, STATE_HANDLERS.iter()) {
            Some(kind) => classified.push((switch, kind)),
            None => debug!("switch {} is not recognized, skip", switch.switch),
        }
    }
    Ok(classified)
}

/// Accept a shared slot, or a cell slot together with a hidden slot
pub fn validate_initializers(initializers: &FxHashMap<StateKind, String>) -> OnnxResult<()> {
    let shared = initializers.contains_key(&StateKind::SharedCellHidden);
    let tuple = initializers.contains_key(&StateKind::Cell)
        && initializers.contains_key(&StateKind::Hidden);
    if shared || tuple {
        Ok(())
    } else {
        let mut found: Vec<_> = initializers.keys().map(|k| k.as_str()).collect();
        found.sort_unstable();
        Err(TransformError::rejected(format!(
            "initial states {:?} are neither shared nor a complete tuple",
            found
        )))
    }
}

fn identity_consumers<'g>(ctx: &'g GraphContext, switch: &LoopSwitch) -> Vec<&'g NodeProto> {
    switch
        .identity_consumers
        .iter()
        .filter_map(|name| ctx.get_node(name))
        .collect()
}

fn check_cell(ctx: &GraphContext, m: &CellMatch, switch: &LoopSwitch) -> bool {
    let Some(ft) = m.get(CellRole::Ft) else {
        return false;
    };
    let muls = identity_consumers(ctx, switch)
        .into_iter()
        .filter(|c| c.is_op_type("Mul") && c.input.iter().any(|i| i == ft))
        .count();
    if muls != 1 {
        debug!("{} Mul nodes read ft from switch {}", muls, switch.switch);
    }
    muls == 1
}

fn check_hidden(ctx: &GraphContext, m: &CellMatch, switch: &LoopSwitch) -> bool {
    let Some(xh) = m.get(CellRole::Xh).and_then(|t| ctx.get_producer_name(t)) else {
        return false;
    };
    let concats = switch
        .identity_consumers
        .iter()
        .filter(|c| *c == xh)
        .count();
    if concats != 1 {
        debug!("{} concat matches for switch {}", concats, switch.switch);
    }
    concats == 1
}

fn check_shared(ctx: &GraphContext, _m: &CellMatch, switch: &LoopSwitch) -> bool {
    let mut c_slices = 0;
    let mut h_slices = 0;

    for slice in identity_consumers(ctx, switch)
        .into_iter()
        .filter(|c| c.is_op_type("Slice"))
    {
        let downstream = slice
            .output
            .first()
            .and_then(|out| ctx.get_consumer_names(out))
            .map_or(0, |c| c.len());
        if downstream != 1 {
            continue;
        }

        let begin = slice.input.get(1).and_then(|t| get_constant_ints(ctx, t));
        let size = slice.input.get(2).and_then(|t| get_constant_ints(ctx, t));
        let (Some(begin), Some(size)) = (begin, size) else {
            continue;
        };
        let Some(&hidden) = size.get(1) else {
            continue;
        };

        if begin == [0, 0] {
            c_slices += 1;
        } else if begin == [0, hidden] {
            h_slices += 1;
        }
    }

    if c_slices != 1 || h_slices != 1 {
        debug!(
            "switch {} has {} c slices and {} h slices",
            switch.switch, c_slices, h_slices
        );
    }
    c_slices == 1 && h_slices == 1
}

fn check_output(ctx: &GraphContext, _m: &CellMatch, switch: &LoopSwitch) -> bool {
    let writes = identity_consumers(ctx, switch)
        .into_iter()
        .filter(|c| c.is_op_type("TensorArrayWriteV3"))
        .count();
    if writes != 1 {
        debug!(
            "{} TensorArrayWriteV3 readers on switch {}",
            writes, switch.switch
        );
        return false;
    }

    ctx.get_producer(&switch.entry)
        .map(|n| n.is_op_type("TensorArrayV3"))
        .unwrap_or(false)
}
