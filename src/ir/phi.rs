//! Phi nodes: the SSA data-flow-merge points attached to a basic block.

use crate::ir::Value;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One incoming edge of a `DataFlowPhi`: the predecessor block the value
/// flows from, and a `ValueUse` (`alias`) pointing at whatever value
/// currently represents it coming out of that block.
///
/// `alias` starts out pointing directly at the producer in `source`; the
/// collector rewrites it to point at the trailing `PseudoMoveMultiple`'s
/// per-edge result once it inserts that pseudo (§4.4).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DataFlowEdge {
    /// Predecessor block this edge flows from.
    pub source: crate::ir::Block,
    /// The value (as of the current rewrite state) flowing in from `source`.
    pub alias: Value,
}

/// A phi node attached to a basic block.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum PhiData {
    /// A function-entry argument. Register-fixed by the SysV ABI sequence
    /// at `index` (see `abi_arg_register`).
    ArgumentPhi {
        /// This phi's SSA output.
        value: Value,
        /// Zero-based argument position, used to look up the fixed
        /// register via `abi_arg_register`.
        index: usize,
    },
    /// An SSA merge point fed by one or more predecessor blocks.
    DataFlowPhi {
        /// This phi's SSA output (the "sink").
        value: Value,
        /// Incoming edges, one per predecessor this phi merges.
        edges: SmallVec<[DataFlowEdge; 4]>,
    },
}

impl PhiData {
    /// This phi's SSA output value, regardless of variant.
    pub fn value(&self) -> Value {
        match self {
            PhiData::ArgumentPhi { value, .. } => *value,
            PhiData::DataFlowPhi { value, .. } => *value,
        }
    }
}
