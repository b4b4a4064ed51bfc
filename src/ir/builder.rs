//! A minimal function-construction surface, grounded on the teacher's
//! `FuncCursor`/`Cursor` lineage (`cranelift_codegen::cursor`): just enough
//! to let test code (and, eventually, a front-end this crate does not own)
//! build an x86-64 `Function` one block at a time and hand it to
//! [`crate::AllocateRegistersPass`].
//!
//! This is deliberately not a general-purpose IR builder: there is no
//! verifier, printer, or parser here, and it only knows how to emit the
//! instruction/phi/branch shapes §4.1/§4.2 define. Anything past that
//! (control-flow construction helpers, type checking of operands) is the
//! front-end's job, which this crate does not own (§1).

use crate::entity::EntityRef;
use crate::error::IrBuildError;
use crate::ir::function::ValueClass;
use crate::ir::{Block, Branch, DataFlowEdge, ExternalName, Function, InstructionData, PhiData, Value};
use smallvec::SmallVec;

/// Builds one [`Function`] by appending blocks/instructions/phis/branches
/// to a cursor position (the "current block").
pub struct FunctionBuilder<'f> {
    func: &'f mut Function,
    current: Option<Block>,
}

impl<'f> FunctionBuilder<'f> {
    /// Start building into `func` (which may already contain blocks; the
    /// cursor starts unpositioned).
    pub fn new(func: &'f mut Function) -> Self {
        Self { func, current: None }
    }

    /// Declare a new block. Does not move the cursor.
    pub fn create_block(&mut self) -> Block {
        self.func.make_block()
    }

    /// Move the cursor to `block`, so subsequent instructions/phis append
    /// there. Errors if `block` was never declared on this function.
    pub fn switch_to_block(&mut self, block: Block) -> Result<(), IrBuildError> {
        if block.index() >= self.func.block_count() {
            return Err(IrBuildError::UnknownBlock(block));
        }
        self.current = Some(block);
        Ok(())
    }

    fn current_block(&self) -> Block {
        self.current.expect("FunctionBuilder has no current block")
    }

    /// Append an `ArgumentPhi` for the `index`-th function argument
    /// (zero-based; fixed to the SysV integer-argument register sequence)
    /// to the current block and return its SSA output.
    pub fn argument_phi(&mut self, index: usize) -> Value {
        let value = self.func.make_value(ValueClass::ModeR);
        let block = self.current_block();
        self.func
            .make_phi(block, PhiData::ArgumentPhi { value, index });
        value
    }

    /// Append a `DataFlowPhi` merging `edges` (each a predecessor block and
    /// the value flowing in from it) to the current block. Errors if any
    /// edge source block was never declared.
    pub fn dataflow_phi(&mut self, edges: &[(Block, Value)]) -> Result<Value, IrBuildError> {
        for (source, _) in edges {
            if source.index() >= self.func.block_count() {
                return Err(IrBuildError::UnknownBlock(*source));
            }
        }
        let value = self.func.make_value(ValueClass::ModeM);
        let edges: SmallVec<[DataFlowEdge; 4]> = edges
            .iter()
            .map(|(source, alias)| DataFlowEdge {
                source: *source,
                alias: *alias,
            })
            .collect();
        let block = self.current_block();
        self.func
            .make_phi(block, PhiData::DataFlowPhi { value, edges });
        Ok(value)
    }

    /// `v = imm`.
    pub fn mov_mc(&mut self, imm: i64) -> Value {
        let result = self.func.make_value(ValueClass::ModeM);
        let block = self.current_block();
        self.func
            .append_inst(block, InstructionData::MovMC { imm, result });
        result
    }

    /// `v = src`.
    pub fn mov_mr(&mut self, src: Value) -> Value {
        let result = self.func.make_value(ValueClass::ModeM);
        let block = self.current_block();
        self.func
            .append_inst(block, InstructionData::MovMR { src, result });
        result
    }

    /// `v = *(src + offset)`.
    pub fn mov_rm_with_offset(&mut self, src: Value, offset: i32) -> Value {
        let result = self.func.make_value(ValueClass::ModeM);
        let block = self.current_block();
        self.func.append_inst(
            block,
            InstructionData::MovRmWithOffset {
                src,
                offset,
                result,
            },
        );
        result
    }

    /// `v = -primary` (in place on `primary`).
    pub fn neg_m(&mut self, primary: Value) -> Value {
        let result = self.func.make_value(ValueClass::ModeM);
        let block = self.current_block();
        self.func
            .append_inst(block, InstructionData::NegM { primary, result });
        result
    }

    /// `v = primary + secondary` (in place on `primary`).
    pub fn add_mr(&mut self, primary: Value, secondary: Value) -> Value {
        let result = self.func.make_value(ValueClass::ModeM);
        let block = self.current_block();
        self.func.append_inst(
            block,
            InstructionData::AddMR {
                primary,
                secondary,
                result,
            },
        );
        result
    }

    /// `v = primary & secondary` (in place on `primary`).
    pub fn and_mr(&mut self, primary: Value, secondary: Value) -> Value {
        let result = self.func.make_value(ValueClass::ModeM);
        let block = self.current_block();
        self.func.append_inst(
            block,
            InstructionData::AndMR {
                primary,
                secondary,
                result,
            },
        );
        result
    }

    /// `v = callee(args...)`. Errors if `args` has more elements than this
    /// crate's SysV integer-argument sequence can route through registers
    /// (6; see `abi_arg_register`).
    pub fn call(&mut self, callee: &str, args: &[Value]) -> Result<Value, IrBuildError> {
        if args.len() > crate::ir::instruction::ABI_ARG_REGISTERS.len() {
            return Err(IrBuildError::MalformedOperands(format!(
                "call to {} has {} arguments, only {} can be passed in registers",
                callee,
                args.len(),
                crate::ir::instruction::ABI_ARG_REGISTERS.len()
            )));
        }
        let result = self.func.make_value(ValueClass::ModeM);
        let block = self.current_block();
        self.func.append_inst(
            block,
            InstructionData::Call {
                callee: ExternalName(callee.to_string()),
                args: args.iter().copied().collect(),
                result,
            },
        );
        Ok(result)
    }

    /// Terminate the current block with `ret`. Errors if it already has a
    /// terminator.
    pub fn ret(&mut self) -> Result<(), IrBuildError> {
        let block = self.current_block();
        if self.func.block(block).branch.is_some() {
            return Err(IrBuildError::BranchAlreadySet(block));
        }
        self.func.set_branch(block, Branch::Ret);
        Ok(())
    }

    /// Terminate the current block with an unconditional jump to `target`.
    /// Errors if `target` was never declared or the block already has a
    /// terminator.
    pub fn jmp(&mut self, target: Block) -> Result<(), IrBuildError> {
        let block = self.current_block();
        if target.index() >= self.func.block_count() {
            return Err(IrBuildError::UnknownBlock(target));
        }
        if self.func.block(block).branch.is_some() {
            return Err(IrBuildError::BranchAlreadySet(block));
        }
        self.func.set_branch(block, Branch::Jmp(target));
        Ok(())
    }
}
