//! Program-counter order: the fine-grained total order over program points
//! that live intervals are keyed by (§3/§4.3, C3).
//!
//! A `ProgramCounter` is a 4-tuple `(block, sub_block, inst, sub_inst)`.
//! Comparing two of them needs the owning `Function` (to resolve an
//! instruction to its position within its block), so `ProgramCounter` is not
//! itself `Ord`; instead `pc_key` resolves one down to a plain, `Ord`
//! `PcKey` tuple of integers that *is* directly comparable and cheap to hold
//! in an interval-tree node, exactly mirroring the "cache a position, avoid
//! re-walking the block" approach the design notes call for.

use crate::entity::EntityRef;
use crate::ir::{Block, Function, Inst};

/// Where within a block a program point falls.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubBlock {
    /// Before any phi/instruction in the block has run.
    Before,
    /// Inside the block, anchored to a specific instruction.
    In,
    /// After the block's terminator, on the way out.
    After,
}

/// Finer position relative to the anchoring instruction (or the block
/// boundary, when `inst` is `None`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubInstruction {
    /// Just before the instruction executes.
    Before,
    /// Exactly at the instruction.
    At,
    /// Just after the instruction has produced its result(s).
    After,
}

/// A point in the program, finer-grained than an instruction boundary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProgramCounter {
    /// The block this point falls in.
    pub block: Block,
    /// Coarse block-relative position.
    pub sub_block: SubBlock,
    /// The anchoring instruction, or `None` (`⊥`) for block-boundary points.
    pub inst: Option<Inst>,
    /// Fine instruction-relative position.
    pub sub_inst: SubInstruction,
}

impl ProgramCounter {
    /// `(block, Before, ⊥, After)`: immediately after entering `block`,
    /// where `ArgumentPhi`s and `DataFlowPhi`s materialize.
    pub fn block_entry(block: Block) -> Self {
        Self {
            block,
            sub_block: SubBlock::Before,
            inst: None,
            sub_inst: SubInstruction::After,
        }
    }

    /// `(block, After, ⊥, After)`: leaving `block`, where `DataFlowEdge`
    /// source values die.
    pub fn block_exit(block: Block) -> Self {
        Self {
            block,
            sub_block: SubBlock::After,
            inst: None,
            sub_inst: SubInstruction::After,
        }
    }

    /// `(block, In, inst, After)`: where `inst`'s result(s) become live.
    pub fn result_of(block: Block, inst: Inst) -> Self {
        Self {
            block,
            sub_block: SubBlock::In,
            inst: Some(inst),
            sub_inst: SubInstruction::After,
        }
    }

    /// `(block, In, inst, Before)`: where `inst` consumes its last operand,
    /// used as the `finalPc` of a value whose last use is `inst`.
    pub fn before_inst(block: Block, inst: Inst) -> Self {
        Self {
            block,
            sub_block: SubBlock::In,
            inst: Some(inst),
            sub_inst: SubInstruction::Before,
        }
    }
}

/// A plain, totally-ordered resolution of a `ProgramCounter`, suitable for
/// use as an interval-tree key without re-consulting the `Function`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct PcKey(u32, u8, i64, u8);

fn sub_block_rank(s: SubBlock) -> u8 {
    match s {
        SubBlock::Before => 0,
        SubBlock::In => 1,
        SubBlock::After => 2,
    }
}

fn sub_inst_rank(s: SubInstruction) -> u8 {
    match s {
        SubInstruction::Before => 0,
        SubInstruction::At => 1,
        SubInstruction::After => 2,
    }
}

/// Resolve `pc` to a comparable key. `⊥` (no anchoring instruction) sorts
/// before every real instruction in the block, matching its use at block
/// entry/exit boundaries.
pub fn pc_key(func: &Function, pc: ProgramCounter) -> PcKey {
    let inst_pos = match pc.inst {
        Some(inst) => func.index_of_inst(inst) as i64,
        None => -1,
    };
    PcKey(
        pc.block.index() as u32,
        sub_block_rank(pc.sub_block),
        inst_pos,
        sub_inst_rank(pc.sub_inst),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InstructionData;

    #[test]
    fn entry_precedes_instructions_which_precede_exit() {
        let mut func = Function::new();
        let b0 = func.make_block();
        let result = func.make_value(crate::ir::function::ValueClass::ModeM);
        let inst = func.append_inst(b0, InstructionData::MovMC { imm: 1, result });

        let entry = pc_key(&func, ProgramCounter::block_entry(b0));
        let before = pc_key(&func, ProgramCounter::before_inst(b0, inst));
        let after = pc_key(&func, ProgramCounter::result_of(b0, inst));
        let exit = pc_key(&func, ProgramCounter::block_exit(b0));

        assert!(entry < before);
        assert!(before < after);
        assert!(after < exit);
    }
}
