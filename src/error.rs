//! Errors returned by the IR construction surface.
//!
//! The allocator itself has no recoverable error taxonomy (see the crate's
//! top-level docs): malformed IR that the allocator discovers mid-run is a
//! programmer error and is reported with `panic!`/`assert!`. The
//! [`crate::ir::FunctionBuilder`], by contrast, is a boundary API that a
//! caller can misuse, so its fallible methods return `Result<_, IrBuildError>`.

use crate::ir::{Block, Value};
use thiserror::Error;

/// Conditions a caller of [`crate::ir::FunctionBuilder`] can trigger by
/// constructing IR incorrectly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrBuildError {
    /// A block was referenced (as a jump target, or as a `DataFlowEdge`
    /// source) that was never declared on this function.
    #[error("block {0} was not declared in this function")]
    UnknownBlock(Block),

    /// A value was referenced that was never defined in this function's
    /// value table (most likely it belongs to a different `Function`).
    #[error("value {0} does not belong to this function")]
    ForeignValue(Value),

    /// A block already has a terminating branch; a `Function` permits
    /// exactly one per block.
    #[error("block {0} already has a terminating branch")]
    BranchAlreadySet(Block),

    /// An instruction was built with a phi/edge/argument count that its
    /// opcode cannot carry (e.g. a `Call` with zero arguments wired through
    /// the ABI table, or a `PseudoMoveMultiple` of arity zero).
    #[error("{0}")]
    MalformedOperands(String),
}
