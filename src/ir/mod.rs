//! The x86-64 SSA IR the allocator consumes: values, uses, instructions,
//! branches, phis, basic blocks, and functions (C1/C2), plus the minimal
//! construction surface (C7/§10.1) tests use to build one.
//!
//! This module does not implement a verifier, a textual printer/parser, or
//! general control-flow construction helpers; those are front-end concerns
//! this crate does not own (§1).

pub mod builder;
pub mod entities;
pub mod function;
pub mod instruction;
pub mod phi;

pub use builder::FunctionBuilder;
pub use entities::{Block, Inst, Phi, Value};
pub use function::{Function, UseSite, ValueDef};
pub use instruction::{
    abi_arg_register, reg_mask, Branch, ExternalName, InstructionData, ABI_ARG_REGISTERS,
    MASK_GENERIC, MASK_RAX, R8, R9, RAX, RBP, RBX, RCX, RDI, RDX, RSI, RSP,
};
pub use phi::{DataFlowEdge, PhiData};
