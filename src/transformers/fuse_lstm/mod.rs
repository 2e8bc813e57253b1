//! LSTM loop fusion
//!
//! Replaces the `while` loop that TensorFlow's `dynamic_rnn` builds around an
//! `LSTMCell` or `BasicLSTMCell` with one ONNX `LSTM` node.
//!
//! Each candidate cell goes through two phases:
//!
//! 1. **Validation**: weights, loop state, sequence lengths and the RNN input
//!    are inspected without touching the graph. Any failure rejects only this
//!    candidate.
//! 2. **Rewrite**: constants, glue nodes and the `LSTM` node are inserted and
//!    the loop's exits are rewired. Failures here abort the pass, since the
//!    graph is already partially rewritten.
//!
//! Once every candidate has been handled, nodes no longer reachable from the
//! graph outputs are pruned.
//!
//! ```ignore
//! use lstm_fuse::transformers::{FuseLstm, OnnxTransformer};
//!
//! let result = FuseLstm::new().with_target_opset(13).transform(&mut ctx)?;
//! println!("fused {} cells", result.transforms_applied);
//! ```

pub mod config;
pub mod gates;
pub mod init_state;
pub mod input;
pub mod node;
pub mod ops;
pub mod outputs;
pub mod props;
pub mod seq_len;
pub mod switch;
pub mod weights;

pub use config::{FuseLstmConfig, DEFAULT_TARGET_OPSET};
pub use init_state::{InitStateBuilder, InitStateCache, InitStateKey, StateTensors};
pub use props::{LstmInput, MustKeepSet, RnnProps, RnnWeights, Weight};
pub use switch::{LoopSwitch, StateKind};

use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::pattern::{lstm_cell_pattern, CellMatch, CellRole, PatternMatcher, LSTM_CELL_ANCHOR};

use super::common::{OnnxTransformer, TransformResult};

/// Name segments between `ht` and the `dynamic_rnn` scope (`while/cell/mul`)
const CELL_DEPTH: usize = 3;

/// `dynamic_rnn` scope of a cell whose output node is `ht_node`
///
/// `rnn/while/lstm_cell/mul_2` lives in scope `rnn`.
pub fn rnn_scope_name(ht_node: &str) -> OnnxResult<String> {
    let parts: Vec<&str> = ht_node.split('/').collect();
    let keep = parts.len().saturating_sub(CELL_DEPTH);
    let scope = parts[..keep].join("/");
    if scope.is_empty() {
        return Err(TransformError::rejected(format!(
            "cell output {} is not nested in an rnn scope",
            ht_node
        )));
    }
    Ok(scope)
}

/// State shared by all rewrites of one pass
#[derive(Debug, Default)]
pub struct RewriteSession {
    /// Nodes kept by the final pruning step
    pub must_keep: MustKeepSet,
    /// Initial states built so far
    pub init_states: InitStateCache,
    /// Scopes already replaced by an `LSTM` node
    pub fused_scopes: FxHashSet<String>,
}

/// Everything learned about one candidate before rewriting it
#[derive(Debug)]
struct CellPlan {
    props: RnnProps,
    weights: RnnWeights,
    exits: Vec<(LoopSwitch, StateKind)>,
    must_keep: MustKeepSet,
}

/// Fuse `dynamic_rnn` LSTM loops into ONNX `LSTM` nodes
#[derive(Debug, Default)]
pub struct FuseLstm {
    /// Pass options
    pub config: FuseLstmConfig,
}

impl FuseLstm {
    /// Pass with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all options
    pub fn with_config(mut self, config: FuseLstmConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the opset of emitted glue nodes
    pub fn with_target_opset(mut self, opset: i64) -> Self {
        self.config.target_opset = opset;
        self
    }

    /// Enable or disable dead-node pruning
    pub fn with_prune_dead_nodes(mut self, enable: bool) -> Self {
        self.config.prune_dead_nodes = enable;
        self
    }

    /// Check a candidate without modifying the graph
    fn validate_match(&self, ctx: &GraphContext, m: &CellMatch) -> OnnxResult<CellPlan> {
        let ht = m.node(ctx, CellRole::Ht)?;
        let scope = rnn_scope_name(&ht.name)?;
        debug!("checking lstm cell {} in scope {}", ht.name, scope);

        let weights = weights::extract_weights(ctx, m)?;

        let mut props = RnnProps::new(&scope);
        props.var_initializers = switch::find_initializers(ctx, m, &scope)?;
        init_state::validate_initial_states(ctx, &props)?;

        let mut must_keep = MustKeepSet::default();
        if let Some(seq_len) = seq_len::find_sequence_length(ctx, &scope, &mut must_keep)? {
            props.sequence_length = Some(seq_len.tensor);
            props.sequence_length_node = Some(seq_len.node);
        }

        props.input_id = input::find_rnn_input(ctx, m, &weights, &props)?;
        input::detect_time_major(ctx, &mut props)?;

        let exits = switch::classify_switches(ctx, m, &scope)?;

        Ok(CellPlan {
            props,
            weights,
            exits,
            must_keep,
        })
    }

    /// Rewrite a validated candidate and return the `LSTM` node name
    fn rewrite_match(
        &self,
        ctx: &mut GraphContext,
        plan: CellPlan,
        session: &mut RewriteSession,
    ) -> OnnxResult<String> {
        let opset = self.config.target_opset;
        let CellPlan {
            mut props,
            weights,
            exits,
            must_keep,
        } = plan;
        session.must_keep.extend(must_keep);

        input::convert_input_transpose(ctx, &mut props)?;
        gates::transform_weights(ctx, &weights, &mut props)?;
        seq_len::synthesize_sequence_length(ctx, opset, &mut props)?;
        InitStateBuilder {
            opset,
            cache: &mut session.init_states,
            must_keep: &mut session.must_keep,
        }
        .build(ctx, &mut props)?;

        let lstm = node::create_lstm_node(ctx, &props)?;
        let reconnected = outputs::connect_outputs(ctx, opset, &props, &lstm, &exits)?;
        debug!("reconnected {} loop exits of {}", reconnected, props.scope);

        session.fused_scopes.insert(props.scope.clone());
        Ok(lstm.name)
    }
}

impl OnnxTransformer for FuseLstm {
    fn name(&self) -> &'static str {
        "FuseLstm"
    }

    fn transform(&self, ctx: &mut GraphContext) -> OnnxResult<TransformResult> {
        self.config.validate()?;

        let mut result = TransformResult::new();
        let mut session = RewriteSession::default();

        let matches = PatternMatcher::new(ctx).find_all_matches(LSTM_CELL_ANCHOR, &lstm_cell_pattern());
        for m in matches {
            let Some(ht) = m.get(CellRole::Ht) else {
                continue;
            };
            if !ctx.tensor_exists(ht) {
                continue;
            }
            result.patterns_matched += 1;

            let plan = match self.validate_match(ctx, &m) {
                Ok(plan) => plan,
                Err(e) if e.is_recoverable() => {
                    debug!("skip lstm cell {}: {}", ht, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if session.fused_scopes.contains(&plan.props.scope) {
                debug!("scope {} is already fused", plan.props.scope);
                continue;
            }

            let scope = plan.props.scope.clone();
            let lstm = self
                .rewrite_match(ctx, plan, &mut session)
                .map_err(|e| match e {
                    TransformError::PatternNotMatched(reason) => TransformError::StructureMismatch(
                        format!("rewrite of scope {} failed: {}", scope, reason),
                    ),
                    other => other,
                })?;

            info!("fused lstm cell in scope {} into {}", scope, lstm);
            result.record(&lstm);
        }

        if self.config.prune_dead_nodes && result.transforms_applied > 0 {
            let removed = ctx.prune_unreachable(&session.must_keep);
            info!("pruned {} unreachable nodes", removed);
            result.record_eliminations(removed);
        }

        Ok(result)
    }

    fn is_applicable(&self, ctx: &GraphContext) -> bool {
        ctx.nodes().any(|n| n.is_op_type("LoopCond"))
    }
}
