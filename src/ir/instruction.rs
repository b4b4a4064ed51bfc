//! The x86-64 instruction set this crate allocates registers for.
//!
//! For the allocator, the observable contract of each variant is the
//! placement and cardinality of its operands (`ValueUse`s, in the spec's
//! terms) and results (`ValueOrigin`s), plus any fixed-register
//! constraints. That contract is documented on each variant below; the
//! actual operand/result enumeration used by the collector and rewriter
//! lives in `operands()`/`set_operand()`/`results()` so they don't need a
//! match arm per opcode scattered through the rest of the crate.

use crate::ir::Value;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// rax. Also the fixed location of a `Call`'s result.
pub const RAX: u8 = 0;
/// rcx.
pub const RCX: u8 = 1;
/// rdx.
pub const RDX: u8 = 2;
/// rbx.
pub const RBX: u8 = 3;
/// rsp.
pub const RSP: u8 = 4;
/// rbp.
pub const RBP: u8 = 5;
/// rsi.
pub const RSI: u8 = 6;
/// rdi.
pub const RDI: u8 = 7;
/// r8. Only reachable through the extended SysV integer-argument sequence;
/// outside the crate's default 0..8 allocatable pool (see `AllocatorConfig`).
pub const R8: u8 = 8;
/// r9. See [`R8`].
pub const R9: u8 = 9;

/// Bitmask selecting the first four GPRs (rax, rcx, rdx, rbx): the free
/// choice offered to an unconstrained mode-M result.
pub const MASK_GENERIC: u16 = 0x000f;
/// Bitmask selecting only rax: where a `Call`'s result always lands.
pub const MASK_RAX: u16 = 1 << (RAX as u16);

/// Bitmask selecting a single register.
pub const fn reg_mask(reg: u8) -> u16 {
    1u16 << reg
}

/// The SysV integer-argument register sequence: rdi, rsi, rdx, rcx, r8, r9.
/// Used both for `Call` operands and for `ArgumentPhi` registers, since a
/// function's incoming arguments and an outgoing call's arguments are
/// populated by the same calling convention.
///
/// Extends the distilled reference's hard-coded two-argument table (rdi,
/// rsi only) to the full six-register SysV sequence; see `REDESIGN FLAGS`
/// in the design notes. A seventh or later integer argument remains fatal:
/// stack-passed arguments are out of scope, matching the no-spill non-goal.
pub const ABI_ARG_REGISTERS: [u8; 6] = [RDI, RSI, RDX, RCX, R8, R9];

/// Look up the fixed register for the `index`-th integer argument (zero
/// based) under the SysV sequence, or `None` if `index` falls off the end
/// of the register-passed arguments this crate supports.
pub fn abi_arg_register(index: usize) -> Option<u8> {
    ABI_ARG_REGISTERS.get(index).copied()
}

/// A reference to an external callee. The allocator treats this as an
/// opaque label; only the IR-construction/rewriting passes need to carry
/// it through.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ExternalName(pub String);

impl fmt::Display for ExternalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One instruction's worth of operands and results.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum InstructionData {
    /// Load an immediate constant into a fresh mode-M result. No operands.
    MovMC {
        /// The constant to materialize.
        imm: i64,
        /// Fresh mode-M result; register is free (`MASK_GENERIC`).
        result: Value,
    },
    /// Move register/memory `src` into a fresh mode-M result.
    MovMR {
        /// Value read (not consumed in place).
        src: Value,
        /// Fresh mode-M result; register is free (`MASK_GENERIC`).
        result: Value,
    },
    /// Load from `src` plus a constant byte offset into a fresh result.
    MovRmWithOffset {
        /// Base address value.
        src: Value,
        /// Byte offset added to `src`.
        offset: i32,
        /// Fresh mode-M result; register is free (`MASK_GENERIC`).
        result: Value,
    },
    /// Two's-complement negate `primary` in place: `primary` is consumed
    /// and replaced by `result`, which must share a register (and hence a
    /// `LiveCompound`) with whatever currently occupies `primary`.
    NegM {
        /// Operand consumed and "replaced" by `result`.
        primary: Value,
        /// The post-negate value; routed through a `PseudoMoveSingle` by
        /// the collector so it can share `primary`'s compound.
        result: Value,
    },
    /// `primary += secondary`, in place on `primary`.
    AddMR {
        /// Consumed and replaced by `result`, as with [`NegM`].
        primary: Value,
        /// Ordinary read-only operand.
        secondary: Value,
        /// Post-add value.
        result: Value,
    },
    /// `primary &= secondary`, in place on `primary`.
    AndMR {
        /// Consumed and replaced by `result`, as with [`NegM`].
        primary: Value,
        /// Ordinary read-only operand.
        secondary: Value,
        /// Post-and value.
        result: Value,
    },
    /// Call `callee` with `args` populated through the SysV integer
    /// argument registers and a single result constrained to rax.
    Call {
        /// The callee.
        callee: ExternalName,
        /// Arguments, in ABI order. The collector routes these through a
        /// `PseudoMoveMultiple` and constrains each slot to
        /// `abi_arg_register(i)`.
        args: SmallVec<[Value; 4]>,
        /// Fresh result, constrained to `MASK_RAX`.
        result: Value,
    },
    /// Exchange the contents of the registers currently holding `a` and
    /// `b`. Emitted only by the rewriter to resolve a length-2 move cycle;
    /// never produced by the collector. Carries no fresh SSA result: it
    /// mutates which register a value's already-assigned home is found in,
    /// which the rewriter commits directly via `Function::set_value_register`.
    XchgMR {
        /// One side of the exchange.
        a: Value,
        /// The other side.
        b: Value,
    },
    /// Architectural no-op introduced by the collector to give the
    /// allocator a place to assign a possibly-different register to an
    /// in-place operand. Eliminated by the rewriter: either fused away (no
    /// code emitted) or reassociated into a real `MovMR`.
    PseudoMoveSingle {
        /// Value being copied.
        operand: Value,
        /// Placeholder result, fused or reassociated away before codegen.
        result: Value,
    },
    /// A parallel copy `{results[i] <- operands[i]}`, all conceptually
    /// simultaneous. Used both for `Call` argument lowering and for
    /// `DataFlowEdge` materialization at a block's exit. Eliminated by the
    /// rewriter's move-sequencing algorithm.
    PseudoMoveMultiple {
        /// Sources, one per slot.
        operands: SmallVec<[Value; 4]>,
        /// Placeholders, one per slot, fused/reassociated/cycled away.
        results: SmallVec<[Value; 4]>,
    },
}

impl InstructionData {
    /// `true` for the two pseudo-instruction kinds the rewriter must
    /// eliminate before `run()` returns (property P5).
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self,
            InstructionData::PseudoMoveSingle { .. } | InstructionData::PseudoMoveMultiple { .. }
        )
    }

    /// `true` for `NegM`/`AddMR`/`AndMR`: instructions whose `primary`
    /// operand is consumed and replaced in place, requiring a
    /// `PseudoMoveSingle` per §4.4 step 2.
    pub fn is_in_place(&self) -> bool {
        matches!(
            self,
            InstructionData::NegM { .. } | InstructionData::AddMR { .. } | InstructionData::AndMR { .. }
        )
    }

    /// Short mnemonic used in diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            InstructionData::MovMC { .. } => "mov.mc",
            InstructionData::MovMR { .. } => "mov.mr",
            InstructionData::MovRmWithOffset { .. } => "mov.rm+off",
            InstructionData::NegM { .. } => "neg.m",
            InstructionData::AddMR { .. } => "add.mr",
            InstructionData::AndMR { .. } => "and.mr",
            InstructionData::Call { .. } => "call",
            InstructionData::XchgMR { .. } => "xchg.mr",
            InstructionData::PseudoMoveSingle { .. } => "pseudo.move1",
            InstructionData::PseudoMoveMultiple { .. } => "pseudo.moveN",
        }
    }

    /// Operands, in the fixed slot order `set_operand` addresses by index.
    pub fn operands(&self) -> SmallVec<[Value; 4]> {
        match self {
            InstructionData::MovMC { .. } => SmallVec::new(),
            InstructionData::MovMR { src, .. } => SmallVec::from_slice(&[*src]),
            InstructionData::MovRmWithOffset { src, .. } => SmallVec::from_slice(&[*src]),
            InstructionData::NegM { primary, .. } => SmallVec::from_slice(&[*primary]),
            InstructionData::AddMR { primary, secondary, .. } => {
                SmallVec::from_slice(&[*primary, *secondary])
            }
            InstructionData::AndMR { primary, secondary, .. } => {
                SmallVec::from_slice(&[*primary, *secondary])
            }
            InstructionData::Call { args, .. } => args.clone(),
            InstructionData::XchgMR { a, b } => SmallVec::from_slice(&[*a, *b]),
            InstructionData::PseudoMoveSingle { operand, .. } => SmallVec::from_slice(&[*operand]),
            InstructionData::PseudoMoveMultiple { operands, .. } => operands.clone(),
        }
    }

    /// Overwrite operand slot `slot` (as enumerated by `operands()`) with
    /// `value`. Panics if `slot` is out of range for this opcode.
    pub fn set_operand(&mut self, slot: usize, value: Value) {
        match self {
            InstructionData::MovMC { .. } => panic!("MovMC has no operands"),
            InstructionData::MovMR { src, .. } => {
                assert_eq!(slot, 0);
                *src = value;
            }
            InstructionData::MovRmWithOffset { src, .. } => {
                assert_eq!(slot, 0);
                *src = value;
            }
            InstructionData::NegM { primary, .. } => {
                assert_eq!(slot, 0);
                *primary = value;
            }
            InstructionData::AddMR { primary, secondary, .. } => match slot {
                0 => *primary = value,
                1 => *secondary = value,
                _ => panic!("AddMR has 2 operands"),
            },
            InstructionData::AndMR { primary, secondary, .. } => match slot {
                0 => *primary = value,
                1 => *secondary = value,
                _ => panic!("AndMR has 2 operands"),
            },
            InstructionData::Call { args, .. } => {
                args[slot] = value;
            }
            InstructionData::XchgMR { a, b } => match slot {
                0 => *a = value,
                1 => *b = value,
                _ => panic!("XchgMR has 2 operands"),
            },
            InstructionData::PseudoMoveSingle { operand, .. } => {
                assert_eq!(slot, 0);
                *operand = value;
            }
            InstructionData::PseudoMoveMultiple { operands, .. } => {
                operands[slot] = value;
            }
        }
    }

    /// Results (`ValueOrigin`s), in the fixed slot order the rewriter
    /// addresses by index when lowering a `PseudoMoveMultiple`.
    pub fn results(&self) -> SmallVec<[Value; 2]> {
        match self {
            InstructionData::MovMC { result, .. }
            | InstructionData::MovMR { result, .. }
            | InstructionData::MovRmWithOffset { result, .. }
            | InstructionData::NegM { result, .. }
            | InstructionData::AddMR { result, .. }
            | InstructionData::AndMR { result, .. }
            | InstructionData::Call { result, .. }
            | InstructionData::PseudoMoveSingle { result, .. } => SmallVec::from_slice(&[*result]),
            InstructionData::XchgMR { .. } => SmallVec::new(),
            InstructionData::PseudoMoveMultiple { results, .. } => {
                results.iter().copied().collect()
            }
        }
    }

    /// The register-constraint mask for this instruction's result(s),
    /// ignoring any per-slot ABI override (callers needing `Call`'s
    /// per-argument masks query `abi_arg_register` directly; this is the
    /// mask for the *result*, where a single mask always applies).
    pub fn result_mask(&self) -> u16 {
        match self {
            InstructionData::Call { .. } => MASK_RAX,
            InstructionData::XchgMR { .. } => 0,
            _ => MASK_GENERIC,
        }
    }
}

/// A basic block's terminator.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Branch {
    /// Return from the function.
    Ret,
    /// Unconditionally jump to `target`.
    Jmp(crate::ir::Block),
}
