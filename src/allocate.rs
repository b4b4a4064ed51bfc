//! The first-fit greedy register allocator (§4.5, C5): drains the
//! collector's FIFO work queue, picks the lowest free register each
//! compound's mask allows, and inserts every accepted interval into the
//! tree so later compounds see it as blocking.

use crate::config::AllocatorConfig;
use crate::interval::{CompoundId, IntervalStore};
use crate::ir::Function;
use crate::pc::pc_key;
use log::trace;

/// Registers this crate's allocator will ever consider, regardless of the
/// generic pool narrowing `AllocatorConfig` exposes: ABI-fixed slots reach
/// as high as r9 (register 9), so the scan range must cover it even though
/// the unconstrained generic mask only ever proposes registers 0-7.
const REGISTER_COUNT: u8 = 16;

/// Assign a concrete register to every compound in `queue`, in order.
/// Panics (no recoverable error: see the crate's error-handling design) if
/// a compound's mask and the registers already occupied by overlapping
/// intervals leave no register free.
pub fn allocate(func: &Function, store: &mut IntervalStore, config: &AllocatorConfig, queue: &[CompoundId]) {
    for &compound in queue {
        let mask = store.compound(compound).possible_registers;
        let intervals = store.compound(compound).intervals.clone();

        let mut blocked: u16 = 0;
        for &id in &intervals {
            let iv = *store.interval(id);
            let lo = pc_key(func, iv.origin);
            let hi = pc_key(func, iv.final_pc);
            store.for_overlaps(lo, hi, |_, overlapping| {
                if overlapping.compound != compound {
                    if let Some(reg) = store.compound(overlapping.compound).allocated_register {
                        blocked |= 1 << reg;
                    }
                }
            });
        }

        let candidates = mask & !blocked;
        let reg = (0..REGISTER_COUNT)
            .find(|&r| candidates & (1 << r) != 0)
            .unwrap_or_else(|| {
                panic!(
                    "first-fit allocator exhausted registers for compound {}: mask {:#x}, blocked {:#x}",
                    compound, mask, blocked
                )
            });

        store.set_allocated_register(compound, reg);
        if config.trace {
            trace!("{} -> register {}", compound, reg);
        }
        for id in intervals {
            store.insert(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::ValueClass;
    use crate::ir::InstructionData;

    #[test]
    fn picks_lowest_free_register_in_mask() {
        let mut func = Function::new();
        let b0 = func.make_block();
        let v = func.make_value(ValueClass::ModeM);
        let inst = func.append_inst(b0, InstructionData::MovMC { imm: 1, result: v });

        let mut store = IntervalStore::new();
        let c = store.new_compound(0x0f);
        let origin = crate::pc::ProgramCounter::result_of(b0, inst);
        store.add_interval(&func, c, v, origin, origin);

        allocate(&func, &mut store, &AllocatorConfig::default(), &[c]);
        assert_eq!(store.compound(c).allocated_register, Some(0));
    }

    #[test]
    fn skips_registers_blocked_by_an_overlapping_compound() {
        let mut func = Function::new();
        let b0 = func.make_block();
        let v1 = func.make_value(ValueClass::ModeM);
        let inst1 = func.append_inst(b0, InstructionData::MovMC { imm: 1, result: v1 });
        let v2 = func.make_value(ValueClass::ModeM);
        func.append_inst(b0, InstructionData::MovMR { src: v1, result: v2 });

        let mut store = IntervalStore::new();
        let inst2 = func.block(b0).insts[1];
        let origin1 = crate::pc::ProgramCounter::result_of(b0, inst1);
        // `final1` coincides with `origin2` below, so the two intervals
        // overlap at that single program point.
        let final1 = crate::pc::ProgramCounter::result_of(b0, inst2);
        let c1 = store.new_compound(0x0f);
        store.add_interval(&func, c1, v1, origin1, final1);

        let c2 = store.new_compound(0x0f);
        let origin2 = crate::pc::ProgramCounter::result_of(b0, inst2);
        store.add_interval(&func, c2, v1, origin2, origin2);

        allocate(&func, &mut store, &AllocatorConfig::default(), &[c1, c2]);
        assert_eq!(store.compound(c1).allocated_register, Some(0));
        assert_eq!(store.compound(c2).allocated_register, Some(1));
    }

    #[test]
    #[should_panic(expected = "exhausted registers")]
    fn exhausting_the_mask_is_fatal() {
        let mut func = Function::new();
        let b0 = func.make_block();
        let v1 = func.make_value(ValueClass::ModeM);
        let inst1 = func.append_inst(b0, InstructionData::MovMC { imm: 1, result: v1 });
        let v2 = func.make_value(ValueClass::ModeM);
        let inst2 = func.append_inst(b0, InstructionData::MovMC { imm: 2, result: v2 });

        let mut store = IntervalStore::new();
        let origin1 = crate::pc::ProgramCounter::result_of(b0, inst1);
        let final1 = crate::pc::ProgramCounter::result_of(b0, inst2);
        let c1 = store.new_compound(0x01);
        store.add_interval(&func, c1, v1, origin1, final1);

        let origin2 = crate::pc::ProgramCounter::result_of(b0, inst2);
        let c2 = store.new_compound(0x01);
        store.add_interval(&func, c2, v2, origin2, origin2);

        allocate(&func, &mut store, &AllocatorConfig::default(), &[c1, c2]);
    }
}
