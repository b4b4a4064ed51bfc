//! Opaque entity references into a [`crate::ir::Function`]'s backing tables.
//!
//! Rather than wire the IR together with pointers, `Rc`/`RefCell`, or an
//! intrusive doubly-linked use list, every referenceable thing is a small
//! `Copy` index newtype, in the style of `cranelift-entity`'s `EntityRef`.
//! `Function` owns the dense [`crate::entity::PrimaryMap`] backing stores;
//! side tables keyed by these references (use lists, register assignments,
//! defining instructions) live alongside them rather than inside the
//! entities themselves.

use crate::entity_impl;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A reference to an SSA value.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A reference to an instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A reference to a basic block.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A reference to a phi node (either an `ArgumentPhi` or a `DataFlowPhi`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Phi(u32);
entity_impl!(Phi, "phi");
