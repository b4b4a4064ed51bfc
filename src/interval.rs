//! Live intervals, compounds, and the interval tree that queries them for
//! overlap (§3/§4.3, C3). Owned for the duration of one
//! `AllocateRegistersPass::run()` — see the crate's concurrency notes.

use crate::entity::PrimaryMap;
use crate::entity_impl;
use crate::ir::{Function, Value};
use crate::pc::{pc_key, PcKey, ProgramCounter};
use smallvec::SmallVec;

/// A reference to a [`LiveInterval`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntervalId(u32);
entity_impl!(IntervalId, "ival");

/// A reference to a [`LiveCompound`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompoundId(u32);
entity_impl!(CompoundId, "cmpd");

/// `{ value, compound, originPc, finalPc }`. Invariant: `originPc <=
/// finalPc`; at `finalPc` the value's last use has completed.
#[derive(Clone, Copy, Debug)]
pub struct LiveInterval {
    /// The SSA value this interval tracks.
    pub value: Value,
    /// The compound this interval belongs to; all intervals in a compound
    /// share one physical register.
    pub compound: CompoundId,
    /// Where the interval begins.
    pub origin: ProgramCounter,
    /// Where the interval ends (inclusive).
    pub final_pc: ProgramCounter,
    origin_key: PcKey,
    final_key: PcKey,
}

impl LiveInterval {
    fn new(
        func: &Function,
        value: Value,
        compound: CompoundId,
        origin: ProgramCounter,
        final_pc: ProgramCounter,
    ) -> Self {
        let origin_key = pc_key(func, origin);
        let final_key = pc_key(func, final_pc);
        debug_assert!(
            origin_key <= final_key,
            "interval origin must not come after its final point"
        );
        Self {
            value,
            compound,
            origin,
            final_pc,
            origin_key,
            final_key,
        }
    }

    /// Extend `final_pc` forward (used when the rewriter fuses a
    /// `PseudoMoveSingle` into its operand's interval, §4.6.1).
    fn set_final_pc(&mut self, func: &Function, final_pc: ProgramCounter) {
        self.final_key = pc_key(func, final_pc);
        self.final_pc = final_pc;
    }
}

/// A set of live intervals that must share one physical register.
#[derive(Clone, Debug)]
pub struct LiveCompound {
    /// Bitmask (bit `i` = register `i`) of registers this compound may be
    /// assigned to.
    pub possible_registers: u16,
    /// The register the first-fit allocator chose, once it has run.
    pub allocated_register: Option<u8>,
    /// The intervals sharing this compound's register.
    pub intervals: SmallVec<[IntervalId; 4]>,
}

impl LiveCompound {
    fn new(possible_registers: u16) -> Self {
        Self {
            possible_registers,
            allocated_register: None,
            intervals: SmallVec::new(),
        }
    }
}

/// Owns every `LiveInterval`/`LiveCompound` minted during one allocator
/// run, plus the interval tree C5/C6 query for overlap.
///
/// The tree itself is a flat list of currently-inserted interval ids rather
/// than a balanced/augmented tree: functions this crate allocates for are
/// small enough (no spilling, no loops the allocator itself unrolls) that a
/// linear overlap scan is not a hot path, and it keeps `insert`/`remove`
/// trivial. See `DESIGN.md`.
#[derive(Default)]
pub struct IntervalStore {
    intervals: PrimaryMap<IntervalId, LiveInterval>,
    compounds: PrimaryMap<CompoundId, LiveCompound>,
    tree: Vec<IntervalId>,
}

impl IntervalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new compound with the given register-constraint mask.
    pub fn new_compound(&mut self, possible_registers: u16) -> CompoundId {
        self.compounds.push(LiveCompound::new(possible_registers))
    }

    /// Add a new interval to `compound` and return its id.
    pub fn add_interval(
        &mut self,
        func: &Function,
        compound: CompoundId,
        value: Value,
        origin: ProgramCounter,
        final_pc: ProgramCounter,
    ) -> IntervalId {
        let interval = LiveInterval::new(func, value, compound, origin, final_pc);
        let id = self.intervals.push(interval);
        self.compounds[compound].intervals.push(id);
        id
    }

    /// Borrow a compound.
    pub fn compound(&self, id: CompoundId) -> &LiveCompound {
        &self.compounds[id]
    }

    /// Borrow an interval.
    pub fn interval(&self, id: IntervalId) -> &LiveInterval {
        &self.intervals[id]
    }

    /// Record the register the first-fit allocator chose for `compound`.
    pub fn set_allocated_register(&mut self, compound: CompoundId, reg: u8) {
        self.compounds[compound].allocated_register = Some(reg);
    }

    /// Extend `interval`'s `final_pc` (the fuse path of §4.6.1).
    pub fn extend_final_pc(&mut self, func: &Function, interval: IntervalId, final_pc: ProgramCounter) {
        self.intervals[interval].set_final_pc(func, final_pc);
    }

    /// Rebind `interval`'s tracked value (the reassociate path of §4.6.1,
    /// where a `PseudoMoveSingle`'s placeholder result is replaced by a
    /// freshly emitted `MovMR`'s result without changing which register or
    /// PC range the interval covers).
    pub fn rebind_value(&mut self, interval: IntervalId, value: Value) {
        self.intervals[interval].value = value;
    }

    /// Insert `interval` into the queryable tree. Per §4.3, an interval is
    /// only inserted once its compound has been allocated a register.
    pub fn insert(&mut self, interval: IntervalId) {
        debug_assert!(
            self.compounds[self.intervals[interval].compound]
                .allocated_register
                .is_some(),
            "interval's compound must be allocated before insertion"
        );
        debug_assert!(
            !self.tree.contains(&interval),
            "interval already present in the tree"
        );
        self.tree.push(interval);
    }

    /// Remove `interval` from the tree (the dst side of a fuse, §4.6.1).
    pub fn remove(&mut self, interval: IntervalId) {
        let pos = self
            .tree
            .iter()
            .position(|&id| id == interval)
            .expect("interval not present in the tree");
        self.tree.swap_remove(pos);
    }

    /// Invoke `f` for every interval currently in the tree whose
    /// `[originPc, finalPc]` range intersects `[lo, hi]` (inclusive on both
    /// ends). Order of invocation is unspecified.
    pub fn for_overlaps(&self, lo: PcKey, hi: PcKey, mut f: impl FnMut(IntervalId, &LiveInterval)) {
        for &id in &self.tree {
            let iv = &self.intervals[id];
            if iv.origin_key <= hi && iv.final_key >= lo {
                f(id, iv);
            }
        }
    }

    /// Convenience: overlap query for the single-point range `[pc, pc]`.
    pub fn for_overlaps_at(&self, func: &Function, pc: ProgramCounter, f: impl FnMut(IntervalId, &LiveInterval)) {
        let key = pc_key(func, pc);
        self.for_overlaps(key, key, f);
    }
}
