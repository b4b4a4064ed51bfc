//! The rewriter (§4.6, C6): walks each block a second time, now that every
//! compound carries a concrete register, lowering `PseudoMoveSingle` and
//! `PseudoMoveMultiple` into real move instructions (or eliminating them
//! outright by fusion) and committing a register onto every value.

use crate::config::AllocatorConfig;
use crate::interval::{IntervalId, IntervalStore};
use crate::ir::function::ValueClass;
use crate::ir::{Block, Function, Inst, InstructionData, Value};
use crate::pc::{pc_key, ProgramCounter};
use log::trace;
use std::collections::{HashMap, VecDeque};

/// Rewrite every block of `func` in place. Must run after `allocate` has
/// given every compound in `store` a register.
pub fn rewrite(func: &mut Function, store: &mut IntervalStore, config: &AllocatorConfig) {
    let blocks: Vec<Block> = func.blocks().map(|(b, _)| b).collect();
    for bb in blocks {
        rewrite_block(func, store, config, bb);
    }
}

fn reg_of_interval(store: &IntervalStore, id: IntervalId) -> u8 {
    store.compound(store.interval(id).compound)
        .allocated_register
        .expect("compound must be allocated before the rewriter runs")
}

fn seed_live_map(func: &Function, store: &IntervalStore, bb: Block) -> HashMap<Value, IntervalId> {
    let mut live = HashMap::new();
    store.for_overlaps_at(func, ProgramCounter::block_entry(bb), |id, iv| {
        live.insert(iv.value, id);
    });
    live
}

fn populate_result_map(func: &Function, store: &IntervalStore, bb: Block, inst: Inst) -> HashMap<Value, IntervalId> {
    let mut results = HashMap::new();
    let after = ProgramCounter::result_of(bb, inst);
    let after_key = pc_key(func, after);
    store.for_overlaps_at(func, after, |id, iv| {
        if pc_key(func, iv.origin) == after_key {
            results.insert(iv.value, id);
        }
    });
    results
}

fn retire(func: &Function, store: &IntervalStore, live: &mut HashMap<Value, IntervalId>, pc: ProgramCounter) {
    let key = pc_key(func, pc);
    live.retain(|_, &mut id| pc_key(func, store.interval(id).final_pc) != key);
}

fn assert_register_file_consistent(live: &HashMap<Value, IntervalId>, store: &IntervalStore) {
    let mut seen: u16 = 0;
    for &id in live.values() {
        let bit = 1u16 << reg_of_interval(store, id);
        debug_assert!(seen & bit == 0, "two live values are assigned the same register");
        seen |= bit;
    }
}

fn rewrite_block(func: &mut Function, store: &mut IntervalStore, config: &AllocatorConfig, bb: Block) {
    let mut live = seed_live_map(func, store, bb);
    for (&value, &id) in &live {
        func.set_value_register(value, reg_of_interval(store, id));
    }

    let insts = func.block(bb).insts.clone();
    for inst in insts {
        assert_register_file_consistent(&live, store);

        let mut result_map = populate_result_map(func, store, bb, inst);

        let data = func.inst_data(inst).clone();
        let was_pseudo = data.is_pseudo();
        match data {
            InstructionData::PseudoMoveSingle { operand, result } => {
                lower_pseudo_single(func, store, inst, operand, result, &live, &mut result_map);
            }
            InstructionData::PseudoMoveMultiple { operands, results } => {
                lower_pseudo_multiple(func, store, inst, &operands, &results, &live, &mut result_map);
            }
            _ => {}
        }

        for (&value, &id) in &result_map {
            func.set_value_register(value, reg_of_interval(store, id));
        }

        let before = ProgramCounter::before_inst(bb, inst);
        retire(func, store, &mut live, before);

        for (value, id) in result_map {
            live.insert(value, id);
        }

        let after = ProgramCounter::result_of(bb, inst);
        retire(func, store, &mut live, after);

        if was_pseudo {
            func.erase_inst(inst);
        }
    }

    if config.trace {
        trace!("{}: rewrite complete, {} value(s) live at exit", bb, live.len());
    }
}

/// Fuse `placeholder`'s interval into `operand`'s: every use of the
/// pseudo-move's result becomes a use of its operand directly, and the
/// operand's interval is extended to cover what the placeholder covered.
fn fuse(
    func: &mut Function,
    store: &mut IntervalStore,
    operand: Value,
    placeholder: Value,
    src_id: IntervalId,
    dst_id: IntervalId,
    result_map: &mut HashMap<Value, IntervalId>,
) {
    func.replace_all_uses(placeholder, operand);
    let dst_final = store.interval(dst_id).final_pc;
    store.remove(dst_id);
    store.extend_final_pc(func, src_id, dst_final);
    result_map.remove(&placeholder);
}

/// Emit a real `MovMR(operand) -> newResult` before `inst`, rebind
/// `dst_id`'s interval to track `newResult` instead of `placeholder`, and
/// update `result_map` so the caller's generic commit step assigns
/// `target_reg` to the right value.
fn reassociate(
    func: &mut Function,
    store: &mut IntervalStore,
    inst: Inst,
    operand: Value,
    placeholder: Value,
    dst_id: IntervalId,
    target_reg: u8,
    result_map: &mut HashMap<Value, IntervalId>,
) -> Value {
    let _ = target_reg; // the register itself is committed by the caller's generic step.
    let new_result = func.make_value(ValueClass::ModeM);
    func.insert_inst_before(inst, InstructionData::MovMR { src: operand, result: new_result });
    func.replace_all_uses(placeholder, new_result);
    store.remove(dst_id);
    store.rebind_value(dst_id, new_result);
    store.insert(dst_id);
    result_map.remove(&placeholder);
    result_map.insert(new_result, dst_id);
    new_result
}

fn lower_pseudo_single(
    func: &mut Function,
    store: &mut IntervalStore,
    inst: Inst,
    operand: Value,
    result: Value,
    live: &HashMap<Value, IntervalId>,
    result_map: &mut HashMap<Value, IntervalId>,
) {
    let src_id = *live.get(&operand).expect("pseudo-move operand is not live");
    let dst_id = *result_map
        .get(&result)
        .expect("pseudo-move result missing from this instruction's result map");

    let src_reg = reg_of_interval(store, src_id);
    let dst_reg = reg_of_interval(store, dst_id);

    if src_reg == dst_reg {
        fuse(func, store, operand, result, src_id, dst_id, result_map);
    } else {
        reassociate(func, store, inst, operand, result, dst_id, dst_reg, result_map);
    }
}

fn occupied_registers(
    store: &IntervalStore,
    live: &HashMap<Value, IntervalId>,
    result_map: &HashMap<Value, IntervalId>,
) -> u16 {
    let mut mask = 0u16;
    for &id in live.values().chain(result_map.values()) {
        mask |= 1 << reg_of_interval(store, id);
    }
    mask
}

/// Resolve one simple cycle of the permutation graph: a length-2 cycle
/// becomes a single `XchgMR`; longer cycles allocate a scratch register to
/// save the first member's value, rotate the rest through plain moves, and
/// restore the saved value into the last member (§4.6.2 step 5).
#[allow(clippy::too_many_arguments)]
fn resolve_cycle(
    func: &mut Function,
    store: &mut IntervalStore,
    inst: Inst,
    cycle: &[u8],
    in_edge: &HashMap<u8, usize>,
    operands: &[Value],
    results: &[Value],
    slot_dst_id: &[Option<IntervalId>],
    live: &HashMap<Value, IntervalId>,
    result_map: &mut HashMap<Value, IntervalId>,
) {
    let k = cycle.len();
    debug_assert!(k >= 2, "a cycle needs at least two distinct registers");

    if k == 2 {
        let slot_a = in_edge[&cycle[0]];
        let slot_b = in_edge[&cycle[1]];
        func.insert_inst_before(
            inst,
            InstructionData::XchgMR {
                a: operands[slot_a],
                b: operands[slot_b],
            },
        );
        return;
    }

    let occupied = occupied_registers(store, live, result_map);
    let scratch_reg = (0u8..16)
        .find(|&r| !cycle.contains(&r) && occupied & (1u16 << r) == 0)
        .expect("no free register available to resolve a move cycle");

    let prev_of_first = cycle[k - 1];
    let value_at_first = operands[in_edge[&prev_of_first]];

    let scratch_value = func.make_value(ValueClass::ModeM);
    func.insert_inst_before(
        inst,
        InstructionData::MovMR {
            src: value_at_first,
            result: scratch_value,
        },
    );
    func.set_value_register(scratch_value, scratch_reg);

    for &target_reg in &cycle[..k - 1] {
        let slot = in_edge[&target_reg];
        let dst_id = slot_dst_id[slot].expect("cycle slot has no destination interval");
        reassociate(func, store, inst, operands[slot], results[slot], dst_id, target_reg, result_map);
    }

    let last_reg = cycle[k - 1];
    let last_slot = in_edge[&last_reg];
    let dst_id = slot_dst_id[last_slot].expect("cycle slot has no destination interval");
    reassociate(func, store, inst, scratch_value, results[last_slot], dst_id, last_reg, result_map);
}

/// Lower a parallel copy: fuse away self-loops, drain the resulting tails
/// (a path of reassociated moves), then resolve whatever cycles remain
/// (§4.6.2).
fn lower_pseudo_multiple(
    func: &mut Function,
    store: &mut IntervalStore,
    inst: Inst,
    operands: &[Value],
    results: &[Value],
    live: &HashMap<Value, IntervalId>,
    result_map: &mut HashMap<Value, IntervalId>,
) {
    let arity = operands.len();
    let mut slot_operand_reg = vec![0u8; arity];
    let mut slot_dst_id: Vec<Option<IntervalId>> = vec![None; arity];
    let mut active_slots = Vec::new();

    for i in 0..arity {
        let operand = operands[i];
        let placeholder = results[i];
        let src_id = *live.get(&operand).expect("pseudo-move operand is not live");
        let dst_id = *result_map
            .get(&placeholder)
            .expect("pseudo-move result missing from this instruction's result map");
        let src_reg = reg_of_interval(store, src_id);
        let dst_reg = reg_of_interval(store, dst_id);

        if src_reg == dst_reg {
            fuse(func, store, operand, placeholder, src_id, dst_id, result_map);
        } else {
            slot_operand_reg[i] = src_reg;
            slot_dst_id[i] = Some(dst_id);
            active_slots.push(i);
        }
    }

    if active_slots.is_empty() {
        return;
    }

    let mut in_edge: HashMap<u8, usize> = HashMap::new();
    let mut out_count: HashMap<u8, usize> = HashMap::new();
    for &i in &active_slots {
        let target_reg = reg_of_interval(store, slot_dst_id[i].unwrap());
        in_edge.insert(target_reg, i);
        *out_count.entry(slot_operand_reg[i]).or_insert(0) += 1;
    }

    let mut queue: VecDeque<u8> = in_edge
        .keys()
        .copied()
        .filter(|r| out_count.get(r).copied().unwrap_or(0) == 0)
        .collect();

    while let Some(target_reg) = queue.pop_front() {
        let slot = match in_edge.remove(&target_reg) {
            Some(slot) => slot,
            None => continue,
        };
        let dst_id = slot_dst_id[slot].unwrap();
        reassociate(func, store, inst, operands[slot], results[slot], dst_id, target_reg, result_map);

        let source_reg = slot_operand_reg[slot];
        if let Some(count) = out_count.get_mut(&source_reg) {
            *count -= 1;
            if *count == 0 && in_edge.contains_key(&source_reg) {
                queue.push_back(source_reg);
            }
        }
    }

    while let Some(&start) = in_edge.keys().next() {
        let mut cycle = vec![start];
        let mut cur = slot_operand_reg[in_edge[&start]];
        while cur != start {
            cycle.push(cur);
            cur = slot_operand_reg[in_edge[&cur]];
        }
        resolve_cycle(func, store, inst, &cycle, &in_edge, operands, results, &slot_dst_id, live, result_map);
        for r in &cycle {
            in_edge.remove(r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::ValueClass;
    use crate::ir::InstructionData;
    use smallvec::SmallVec;

    /// Build `b0: v0 = mov 1; v1 = mov 2; pseudo(operands, results); ret`,
    /// wire `v0`/`v1` into one compound apiece at `operand_regs`, and give
    /// `results` a fresh compound apiece pinned to `target_regs`. Returns the
    /// function, store, and the pseudo's `Inst` so callers can rewrite and
    /// inspect.
    fn build_parallel_copy(operand_regs: &[u8], target_regs: &[u8]) -> (Function, IntervalStore, crate::ir::Block) {
        let arity = operand_regs.len();
        assert_eq!(arity, target_regs.len());

        let mut func = Function::new();
        let b0 = func.make_block();
        let operands: SmallVec<[Value; 4]> = (0..arity)
            .map(|i| {
                let v = func.make_value(ValueClass::ModeM);
                func.append_inst(b0, InstructionData::MovMC { imm: i as i64, result: v });
                v
            })
            .collect();
        let results: SmallVec<[Value; 4]> = (0..arity).map(|_| func.make_value(ValueClass::ModeM)).collect();
        let pseudo = func.append_inst(
            b0,
            InstructionData::PseudoMoveMultiple {
                operands: operands.clone(),
                results: results.clone(),
            },
        );
        func.set_branch(b0, crate::ir::Branch::Ret);

        let mut store = IntervalStore::new();
        for i in 0..arity {
            let c = store.new_compound(crate::ir::MASK_GENERIC);
            let origin = ProgramCounter::result_of(b0, func.block(b0).insts[i]);
            let final_pc = ProgramCounter::before_inst(b0, pseudo);
            let id = store.add_interval(&func, c, operands[i], origin, final_pc);
            store.set_allocated_register(c, operand_regs[i]);
            store.insert(id);
        }
        for i in 0..arity {
            let c = store.new_compound(crate::ir::MASK_GENERIC);
            let origin = ProgramCounter::result_of(b0, pseudo);
            let id = store.add_interval(&func, c, results[i], origin, origin);
            store.set_allocated_register(c, target_regs[i]);
            store.insert(id);
        }

        (func, store, b0)
    }

    fn count_kind(func: &Function, bb: crate::ir::Block, pred: impl Fn(&InstructionData) -> bool) -> usize {
        func.block(bb).insts.iter().filter(|&&i| pred(func.inst_data(i))).count()
    }

    #[test]
    fn two_cycle_lowers_to_one_exchange() {
        let (mut func, mut store, b0) = build_parallel_copy(&[0, 1], &[1, 0]);
        rewrite(&mut func, &mut store, &AllocatorConfig::default());

        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::XchgMR { .. })), 1);
        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::MovMR { .. })), 0);
        assert_eq!(count_kind(&func, b0, InstructionData::is_pseudo), 0);
    }

    #[test]
    fn path_permutation_lowers_to_plain_moves_with_no_cycle() {
        // operand regs {0,1} feeding target regs {2,3}: a path, not a cycle.
        let (mut func, mut store, b0) = build_parallel_copy(&[0, 1], &[2, 3]);
        rewrite(&mut func, &mut store, &AllocatorConfig::default());

        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::MovMR { .. })), 2);
        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::XchgMR { .. })), 0);
        assert_eq!(count_kind(&func, b0, InstructionData::is_pseudo), 0);
    }

    #[test]
    fn already_aligned_slots_fuse_away_with_no_real_moves() {
        let (mut func, mut store, b0) = build_parallel_copy(&[0, 1], &[0, 1]);
        rewrite(&mut func, &mut store, &AllocatorConfig::default());

        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::MovMR { .. })), 0);
        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::XchgMR { .. })), 0);
        assert_eq!(count_kind(&func, b0, InstructionData::is_pseudo), 0);
    }

    #[test]
    fn three_cycle_resolves_with_a_scratch_register() {
        let (mut func, mut store, b0) = build_parallel_copy(&[0, 1, 2], &[1, 2, 0]);
        rewrite(&mut func, &mut store, &AllocatorConfig::default());

        // A 3-cycle needs no exchange (only XchgMR handles length-2 cycles)
        // and must fully eliminate the pseudo.
        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::XchgMR { .. })), 0);
        assert_eq!(count_kind(&func, b0, InstructionData::is_pseudo), 0);
        assert!(count_kind(&func, b0, |d| matches!(d, InstructionData::MovMR { .. })) >= 3);
    }

    #[test]
    fn fuse_path_extends_source_interval_and_drops_the_pseudo_single() {
        let mut func = Function::new();
        let b0 = func.make_block();
        let v1 = func.make_value(ValueClass::ModeM);
        let mov = func.append_inst(b0, InstructionData::MovMC { imm: 1, result: v1 });
        let pseudo_result = func.make_value(ValueClass::ModeM);
        let pseudo = func.append_inst(
            b0,
            InstructionData::PseudoMoveSingle { operand: v1, result: pseudo_result },
        );
        let v2 = func.make_value(ValueClass::ModeM);
        func.append_inst(b0, InstructionData::NegM { primary: pseudo_result, result: v2 });
        func.set_branch(b0, crate::ir::Branch::Ret);

        let mut store = IntervalStore::new();
        let c = store.new_compound(crate::ir::MASK_GENERIC);
        let origin = ProgramCounter::result_of(b0, mov);
        let final_pc = ProgramCounter::before_inst(b0, pseudo);
        let id1 = store.add_interval(&func, c, v1, origin, final_pc);
        let pseudo_origin = ProgramCounter::result_of(b0, pseudo);
        let pseudo_final = ProgramCounter::before_inst(b0, func.block(b0).insts[2]);
        let id2 = store.add_interval(&func, c, pseudo_result, pseudo_origin, pseudo_final);
        store.set_allocated_register(c, 0);
        store.insert(id1);
        store.insert(id2);

        rewrite(&mut func, &mut store, &AllocatorConfig::default());

        assert_eq!(count_kind(&func, b0, InstructionData::is_pseudo), 0);
        assert_eq!(count_kind(&func, b0, |d| matches!(d, InstructionData::MovMR { .. })), 0);
        assert_eq!(func.value_register(v1), Some(0));
    }
}
