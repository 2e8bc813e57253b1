//! Role bindings produced by the cell template matcher
//!
//! A [`CellMatch`] maps each [`CellRole`] of the LSTM cell template to the
//! tensor the matched node produces. Nodes are recovered through the graph's
//! producer index, so a role can also bind an initializer or a graph input.

use rustc_hash::FxHashMap;

use crate::error::{OnnxResult, TransformError};
use crate::graph::GraphContext;
use crate::proto::NodeProto;

/// Named positions in the LSTM cell template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellRole {
    /// New hidden state, `ot * tanh(ct)`; the anchor of the match
    Ht,
    /// Output gate activation
    Ot,
    /// New cell state
    Ct,
    /// Forget gate activation
    Ft,
    /// Scalar added to the forget gate pre-activation
    FtBias,
    /// Input gate activation
    It,
    /// Candidate cell value
    Gt,
    /// Concatenation of the step input with the previous hidden state
    Xh,
    /// Bias addition over the gate pre-activations
    BiasAdd,
    /// Kernel read inside the loop
    CellKernel,
    /// Bias read inside the loop
    CellBias,
}

impl CellRole {
    /// Every role, in declaration order
    pub const ALL: [CellRole; 11] = [
        CellRole::Ht,
        CellRole::Ot,
        CellRole::Ct,
        CellRole::Ft,
        CellRole::FtBias,
        CellRole::It,
        CellRole::Gt,
        CellRole::Xh,
        CellRole::BiasAdd,
        CellRole::CellKernel,
        CellRole::CellBias,
    ];

    /// Whether the rewrite cannot proceed without this role
    pub fn is_required(self) -> bool {
        !matches!(self, CellRole::Ot | CellRole::Ct | CellRole::It | CellRole::Gt)
    }

    /// Template name of the role
    pub fn as_str(self) -> &'static str {
        match self {
            CellRole::Ht => "ht",
            CellRole::Ot => "ot",
            CellRole::Ct => "ct",
            CellRole::Ft => "ft",
            CellRole::FtBias => "ft_bias",
            CellRole::It => "it",
            CellRole::Gt => "gt",
            CellRole::Xh => "xh",
            CellRole::BiasAdd => "bias_add",
            CellRole::CellKernel => "cell_kernel",
            CellRole::CellBias => "cell_bias",
        }
    }
}

impl std::fmt::Display for CellRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only role → tensor lookup for one matched cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMatch {
    slots: [Option<String>; CellRole::ALL.len()],
}

impl CellMatch {
    /// Build a match from raw bindings
    ///
    /// Fails with `PatternNotMatched` as soon as a required role is absent.
    pub fn from_roles(mut roles: FxHashMap<CellRole, String>) -> OnnxResult<Self> {
        let mut slots: [Option<String>; CellRole::ALL.len()] = Default::default();
        for role in CellRole::ALL {
            match roles.remove(&role) {
                Some(tensor) => slots[role as usize] = Some(tensor),
                None if role.is_required() => {
                    return Err(TransformError::rejected(format!(
                        "required role `{}` is not bound",
                        role
                    )))
                }
                None => {}
            }
        }
        Ok(Self { slots })
    }

    /// Tensor bound to `role`, if any
    pub fn get(&self, role: CellRole) -> Option<&str> {
        self.slots[role as usize].as_deref()
    }

    /// Tensor bound to `role`, rejecting the match when it is absent
    pub fn tensor(&self, role: CellRole) -> OnnxResult<&str> {
        self.get(role)
            .ok_or_else(|| TransformError::rejected(format!("role `{}` is not bound", role)))
    }

    /// Node producing the tensor bound to `role`
    pub fn node<'g>(&self, ctx: &'g GraphContext, role: CellRole) -> OnnxResult<&'g NodeProto> {
        let tensor = self.tensor(role)?;
        ctx.get_producer(tensor).ok_or_else(|| {
            TransformError::rejected(format!("role `{}` ({}) has no producing node", role, tensor))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required_roles() -> FxHashMap<CellRole, String> {
        CellRole::ALL
            .iter()
            .filter(|r| r.is_required())
            .map(|r| (*r, format!("{}:0", r)))
            .collect()
    }

    #[test]
    fn test_from_roles_accepts_required_only() {
        let m = CellMatch::from_roles(required_roles()).unwrap();
        assert_eq!(m.get(CellRole::Xh), Some("xh:0"));
        assert_eq!(m.get(CellRole::Gt), None);
        assert!(m.tensor(CellRole::Gt).is_err());
    }

    #[test]
    fn test_from_roles_fails_fast_on_missing_required() {
        let mut roles = required_roles();
        roles.remove(&CellRole::CellKernel);

        let err = CellMatch::from_roles(roles).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("cell_kernel"));
    }

    #[test]
    fn test_role_markers() {
        assert!(CellRole::Ht.is_required());
        assert!(CellRole::FtBias.is_required());
        assert!(!CellRole::Ot.is_required());
        assert_eq!(CellRole::BiasAdd.to_string(), "bias_add");
    }
}
