//! `Function`: the owning container for blocks, instructions, phis, and
//! values, plus the side tables (use lists, defining sites, register
//! assignments) that stand in for the spec's intrusive back-references.
//!
//! Per the design notes, this deliberately does not try to preserve the
//! intrusive-doubly-linked-list shape of `ValueUse`/`ValueOrigin`: a `Value`
//! is a dense entity reference, and everything that would have been a
//! back-pointer is instead a `SecondaryMap` keyed by that reference.
//! `replaceAllUses` (the one piece of real algorithmic weight in the use-list
//! protocol) becomes a splice on `Function::uses`.

use crate::entity::{PrimaryMap, SecondaryMap};
use crate::ir::{Block, Branch, Inst, InstructionData, Phi, PhiData, Value};

/// Addressing class of an SSA value, carried purely for documentation and
/// the P3 "every mode-M value ends up with a concrete register" sanity
/// check: this crate never spills, so mode M and mode R are allocated
/// identically.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueClass {
    /// May, in a spilling allocator, live in memory. Ordinary instruction
    /// results and `DataFlowPhi` outputs are mode M.
    ModeM,
    /// Register-only. `ArgumentPhi` outputs are mode R.
    ModeR,
}

/// Who defines a value: the instruction or phi whose `ValueOrigin` owns it.
#[derive(Clone, Copy, Debug)]
pub enum ValueDef {
    /// Defined as an instruction's result.
    Inst(Inst),
    /// Defined as an `ArgumentPhi`'s output.
    ArgumentPhi(Phi),
    /// Defined as a `DataFlowPhi`'s output.
    DataFlowPhi(Phi),
}

/// A back-reference to one operand slot: either an instruction's operand
/// at a given index (as enumerated by `InstructionData::operands`), or a
/// `DataFlowPhi` edge's `alias`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UseSite {
    /// Operand `slot` of `Inst`.
    Inst(Inst, u16),
    /// The `alias` of edge `edge_index` of `Phi` (a `DataFlowPhi`).
    PhiEdge(Phi, u16),
}

#[derive(Clone, Debug, Default)]
struct ValueData {
    class: Option<ValueClass>,
}

/// One basic block: an ordered phi list, an ordered instruction list, and
/// (once built) a terminating branch.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    /// Phis attached to this block, in declaration order.
    pub phis: Vec<Phi>,
    /// Instructions, in program order. This vector's indices are exactly
    /// the ordinal `Function::index_of_inst` returns.
    pub insts: Vec<Inst>,
    /// This block's terminator, once set.
    pub branch: Option<Branch>,
}

/// An SSA-style x86-64 IR function: an ordered list of basic blocks owning
/// phis, instructions, and a terminating branch apiece.
#[derive(Debug, Default)]
pub struct Function {
    blocks: PrimaryMap<Block, BlockData>,
    insts: PrimaryMap<Inst, InstructionData>,
    phis: PrimaryMap<Phi, PhiData>,
    values: PrimaryMap<Value, ValueData>,

    inst_block: SecondaryMap<Inst, Option<Block>>,
    value_def: SecondaryMap<Value, Option<ValueDef>>,
    value_reg: SecondaryMap<Value, Option<u8>>,
    uses: SecondaryMap<Value, Vec<UseSite>>,
}

impl Function {
    /// Create an empty function.
    pub fn new() -> Self {
        Self::default()
    }

    // -- blocks --------------------------------------------------------

    /// Declare a new, empty basic block and return its reference.
    pub fn make_block(&mut self) -> Block {
        self.blocks.push(BlockData::default())
    }

    /// Iterate blocks in function (declaration) order.
    pub fn blocks(&self) -> impl Iterator<Item = (Block, &BlockData)> {
        self.blocks.iter()
    }

    /// Number of declared blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Borrow a block's data.
    pub fn block(&self, block: Block) -> &BlockData {
        self.blocks.get(block).expect("unknown block")
    }

    fn block_mut(&mut self, block: Block) -> &mut BlockData {
        &mut self.blocks[block]
    }

    /// Set `block`'s terminator. Panics if one is already set; callers at
    /// the IR-construction boundary should check `block.branch.is_some()`
    /// first and report `IrBuildError::BranchAlreadySet` instead.
    pub fn set_branch(&mut self, block: Block, branch: Branch) {
        let data = self.block_mut(block);
        assert!(data.branch.is_none(), "block already has a terminator");
        data.branch = Some(branch);
    }

    // -- values ----------------------------------------------------------

    /// Mint a fresh value of the given addressing class, with no defining
    /// site yet (set by `append_inst`/`make_phi`) and no register assigned.
    pub fn make_value(&mut self, class: ValueClass) -> Value {
        self.values.push(ValueData { class: Some(class) })
    }

    /// The addressing class a value was minted with.
    pub fn value_class(&self, value: Value) -> ValueClass {
        self.values
            .get(value)
            .and_then(|d| d.class)
            .expect("unknown value")
    }

    /// The instruction or phi that defines `value`.
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.value_def[value].expect("value has no recorded definition")
    }

    /// The register currently assigned to `value`, if allocation has
    /// reached it yet.
    pub fn value_register(&self, value: Value) -> Option<u8> {
        self.value_reg[value]
    }

    /// Commit a concrete register assignment to `value`.
    pub fn set_value_register(&mut self, value: Value, reg: u8) {
        self.value_reg[value] = Some(reg);
    }

    /// Rebind `value`'s defining site without touching its uses. Used by
    /// the rewriter when a `PseudoMoveSingle`'s result is "reassociated"
    /// into a newly emitted `MovMR`'s result (§4.6.1): the live interval
    /// keeps tracking the same register-holding value, but that value's
    /// identity moves to the new move's result.
    pub fn set_value_def(&mut self, value: Value, def: ValueDef) {
        self.value_def[value] = Some(def);
    }

    /// All currently recorded use sites of `value`, in insertion order.
    pub fn value_uses(&self, value: Value) -> &[UseSite] {
        &self.uses[value]
    }

    fn add_use(&mut self, value: Value, site: UseSite) {
        self.uses[value].push(site);
    }

    fn remove_use(&mut self, value: Value, site: UseSite) {
        let list = &mut self.uses[value];
        let pos = list
            .iter()
            .position(|s| *s == site)
            .expect("use site not recorded against this value");
        list.swap_remove(pos);
    }

    /// Read the value currently occupying a use site.
    pub fn get_operand(&self, site: UseSite) -> Value {
        match site {
            UseSite::Inst(inst, slot) => self.insts[inst].operands()[slot as usize],
            UseSite::PhiEdge(phi, idx) => match &self.phis[phi] {
                PhiData::DataFlowPhi { edges, .. } => edges[idx as usize].alias,
                PhiData::ArgumentPhi { .. } => panic!("ArgumentPhi has no edges"),
            },
        }
    }

    fn write_operand(&mut self, site: UseSite, value: Value) {
        match site {
            UseSite::Inst(inst, slot) => self.insts[inst].set_operand(slot as usize, value),
            UseSite::PhiEdge(phi, idx) => match &mut self.phis[phi] {
                PhiData::DataFlowPhi { edges, .. } => edges[idx as usize].alias = value,
                PhiData::ArgumentPhi { .. } => panic!("ArgumentPhi has no edges"),
            },
        }
    }

    /// Redirect a single use site from whatever value it currently names
    /// to `new_value`, maintaining the use-list invariant for both the old
    /// and new target. Used for the targeted edge-alias rewrite in §4.4
    /// (as opposed to `replace_all_uses`, which moves *every* use of a
    /// value at once).
    pub fn redirect_use(&mut self, site: UseSite, new_value: Value) {
        let old = self.get_operand(site);
        if old == new_value {
            return;
        }
        self.remove_use(old, site);
        self.write_operand(site, new_value);
        self.add_use(new_value, site);
    }

    /// `replaceAllUses(from -> to)`: every use of `from` is detached and
    /// appended to `to`'s use list, in an unspecified but deterministic
    /// order (P1). `from`'s use list is left empty.
    pub fn replace_all_uses(&mut self, from: Value, to: Value) {
        if from == to {
            return;
        }
        let sites = std::mem::take(&mut self.uses[from]);
        for site in &sites {
            self.write_operand(*site, to);
        }
        self.uses[to].extend(sites);
    }

    // -- phis --------------------------------------------------------

    /// Attach a phi to `block` and record its output value's defining site.
    pub fn make_phi(&mut self, block: Block, data: PhiData) -> Phi {
        let value = data.value();
        let is_argument = matches!(data, PhiData::ArgumentPhi { .. });
        let phi = self.phis.push(data);
        if is_argument {
            self.value_def[value] = Some(ValueDef::ArgumentPhi(phi));
        } else {
            self.value_def[value] = Some(ValueDef::DataFlowPhi(phi));
        }
        if let PhiData::DataFlowPhi { edges, .. } = &self.phis[phi] {
            for (idx, edge) in edges.iter().enumerate() {
                self.uses[edge.alias].push(UseSite::PhiEdge(phi, idx as u16));
            }
        }
        self.block_mut(block).phis.push(phi);
        phi
    }

    /// Borrow a phi's data.
    pub fn phi_data(&self, phi: Phi) -> &PhiData {
        &self.phis[phi]
    }

    /// Mutably borrow a phi's data.
    pub fn phi_data_mut(&mut self, phi: Phi) -> &mut PhiData {
        &mut self.phis[phi]
    }

    // -- instructions --------------------------------------------------

    fn record_new_inst(&mut self, block: Block, inst: Inst) {
        self.inst_block[inst] = Some(block);
        let data = self.insts[inst].clone();
        for (slot, operand) in data.operands().into_iter().enumerate() {
            self.add_use(operand, UseSite::Inst(inst, slot as u16));
        }
        for result in data.results() {
            self.value_def[result] = Some(ValueDef::Inst(inst));
        }
    }

    /// Append `data` to the end of `block`'s instruction list.
    pub fn append_inst(&mut self, block: Block, data: InstructionData) -> Inst {
        let inst = self.insts.push(data);
        self.block_mut(block).insts.push(inst);
        self.record_new_inst(block, inst);
        inst
    }

    /// Insert `data` immediately before `before` in `before`'s block,
    /// returning the new instruction's reference. `before` keeps its
    /// existing, now-higher, position (per §4.1: "new instructions are
    /// inserted before the current one and are therefore assigned a lower
    /// index").
    pub fn insert_inst_before(&mut self, before: Inst, data: InstructionData) -> Inst {
        let block = self.inst_block(before);
        let inst = self.insts.push(data);
        let list = &mut self.block_mut(block).insts;
        let pos = list
            .iter()
            .position(|&i| i == before)
            .expect("`before` is not in its own block's instruction list");
        list.insert(pos, inst);
        self.record_new_inst(block, inst);
        inst
    }

    /// Remove `inst` from its block's instruction list and drop its
    /// operand use-sites. Callers must already have redirected away any
    /// uses of `inst`'s results (e.g. via `replace_all_uses`); this does
    /// not check that no dangling references remain, matching the
    /// allocator's single-pass, non-suspending execution model.
    pub fn erase_inst(&mut self, inst: Inst) {
        let block = self.inst_block(inst);
        let data = self.insts[inst].clone();
        for (slot, operand) in data.operands().into_iter().enumerate() {
            self.remove_use(operand, UseSite::Inst(inst, slot as u16));
        }
        self.block_mut(block).insts.retain(|&i| i != inst);
    }

    /// Borrow an instruction's data.
    pub fn inst_data(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    /// Mutably borrow an instruction's data.
    pub fn inst_data_mut(&mut self, inst: Inst) -> &mut InstructionData {
        &mut self.insts[inst]
    }

    /// The block `inst` currently lives in.
    pub fn inst_block(&self, inst: Inst) -> Block {
        self.inst_block[inst].expect("instruction is not attached to a block")
    }

    /// `indexOfInstruction`: `inst`'s position in its own block's
    /// instruction list. Implemented as a direct scan of that block's (small)
    /// instruction vector rather than a maintained position cache; see
    /// `DESIGN.md` for why that tradeoff is safe at this crate's scale.
    pub fn index_of_inst(&self, inst: Inst) -> u32 {
        let block = self.inst_block(inst);
        self.block(block)
            .insts
            .iter()
            .position(|&i| i == inst)
            .expect("instruction not found in its own block") as u32
    }

    /// The instruction within `block` at which `value` is used last (as an
    /// instruction operand only; phi-edge aliases are handled separately by
    /// `DataFlowPhi` interval construction), or `None` if it has no such use.
    pub fn last_use_in_block(&self, value: Value, block: Block) -> Option<Inst> {
        self.value_uses(value)
            .iter()
            .filter_map(|site| match *site {
                UseSite::Inst(inst, _) if self.inst_block(inst) == block => Some(inst),
                _ => None,
            })
            .max_by_key(|&inst| self.index_of_inst(inst))
    }
}
