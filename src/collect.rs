//! The interval collector (§4.4, C4): walks every block's original
//! instructions, inserts the pseudo-moves that expose in-place operands and
//! parallel copies to the allocator, and emits `LiveCompound`s onto a work
//! queue. Within one block's pass this also appends the trailing
//! `PseudoMoveMultiple` that materializes its outbound `DataFlowEdge`s
//! *before* finalizing that block's interval endpoints, so a value used only
//! by that trailing move still has its last use accounted for. Phis are
//! collected in a second pass over all blocks, after every block's
//! instruction pass has run, so `DataFlowEdge` intervals can reference
//! pseudo-move results materialized during the first pass (§5).

use crate::config::AllocatorConfig;
use crate::interval::{CompoundId, IntervalStore};
use crate::ir::function::ValueClass;
use crate::ir::{abi_arg_register, reg_mask, Block, Function, InstructionData, MASK_GENERIC, MASK_RAX, Phi, PhiData, UseSite, Value, ValueDef};
use crate::pc::ProgramCounter;
use log::{debug, trace};
use smallvec::SmallVec;

/// Run the collector over every block of `func`, returning the FIFO work
/// queue of compounds for the first-fit allocator (C5) to consume.
pub fn collect(func: &mut Function, store: &mut IntervalStore, config: &AllocatorConfig) -> Vec<CompoundId> {
    let mut queue = Vec::new();
    let blocks: Vec<Block> = func.blocks().map(|(b, _)| b).collect();

    for &bb in &blocks {
        collect_block_instructions(func, store, config, bb, &mut queue);
    }
    for &bb in &blocks {
        collect_phi_intervals(func, store, config, bb, &mut queue);
    }

    debug!("interval collector enqueued {} compounds", queue.len());
    queue
}

fn finalize_and_enqueue(
    func: &Function,
    store: &mut IntervalStore,
    config: &AllocatorConfig,
    compound: CompoundId,
    block: Block,
    queue: &mut Vec<CompoundId>,
) {
    let interval_ids: SmallVec<[_; 4]> = store.compound(compound).intervals.clone();
    for id in interval_ids {
        let value = store.interval(id).value;
        let origin = store.interval(id).origin;
        let final_pc = match func.last_use_in_block(value, block) {
            Some(last_user) => ProgramCounter::before_inst(block, last_user),
            None => origin,
        };
        store.extend_final_pc(func, id, final_pc);
        if config.trace {
            trace!(
                "{}: interval for {} spans {:?} .. {:?}",
                block,
                value,
                origin,
                final_pc
            );
        }
    }
    queue.push(compound);
}

fn collect_block_instructions(
    func: &mut Function,
    store: &mut IntervalStore,
    config: &AllocatorConfig,
    bb: Block,
    queue: &mut Vec<CompoundId>,
) {
    let original_insts = func.block(bb).insts.clone();
    let mut block_compounds: SmallVec<[CompoundId; 8]> = SmallVec::new();

    for inst in original_insts {
        let data = func.inst_data(inst).clone();
        match data {
            InstructionData::MovMC { result, .. }
            | InstructionData::MovMR { result, .. }
            | InstructionData::MovRmWithOffset { result, .. } => {
                let mask = MASK_GENERIC & config.generic_register_mask;
                let compound = store.new_compound(mask);
                let origin = ProgramCounter::result_of(bb, inst);
                store.add_interval(func, compound, result, origin, origin);
                block_compounds.push(compound);
            }
            InstructionData::NegM { primary, result } => {
                let mask = MASK_GENERIC & config.generic_register_mask;
                let compound = store.new_compound(mask);
                let origin = ProgramCounter::result_of(bb, inst);
                store.add_interval(func, compound, result, origin, origin);
                add_in_place_pseudo(func, store, bb, inst, 0, primary, compound);
                block_compounds.push(compound);
            }
            InstructionData::AddMR { primary, result, .. }
            | InstructionData::AndMR { primary, result, .. } => {
                let mask = MASK_GENERIC & config.generic_register_mask;
                let compound = store.new_compound(mask);
                let origin = ProgramCounter::result_of(bb, inst);
                store.add_interval(func, compound, result, origin, origin);
                add_in_place_pseudo(func, store, bb, inst, 0, primary, compound);
                block_compounds.push(compound);
            }
            InstructionData::Call { args, result, .. } => {
                let result_compound = store.new_compound(MASK_RAX);
                let origin = ProgramCounter::result_of(bb, inst);
                store.add_interval(func, result_compound, result, origin, origin);
                block_compounds.push(result_compound);

                let arity = args.len();
                if arity > 0 {
                    let results: SmallVec<[Value; 4]> = (0..arity)
                        .map(|_| func.make_value(ValueClass::ModeM))
                        .collect();
                    let pseudo = func.insert_inst_before(
                        inst,
                        InstructionData::PseudoMoveMultiple {
                            operands: args.clone(),
                            results: results.clone(),
                        },
                    );
                    for i in 0..arity {
                        func.redirect_use(UseSite::Inst(inst, i as u16), results[i]);
                        let reg = abi_arg_register(i)
                            .unwrap_or_else(|| panic!("call argument {} has no ABI register slot", i));
                        let slot_compound = store.new_compound(reg_mask(reg));
                        let origin = ProgramCounter::result_of(bb, pseudo);
                        store.add_interval(func, slot_compound, results[i], origin, origin);
                        block_compounds.push(slot_compound);
                    }
                }
            }
            InstructionData::PseudoMoveSingle { .. }
            | InstructionData::PseudoMoveMultiple { .. }
            | InstructionData::XchgMR { .. } => {
                panic!(
                    "interval collector encountered a {} instruction already present in the IR; \
                     these are only ever introduced by the collector/rewriter themselves",
                    data.mnemonic()
                );
            }
        }
    }

    collect_block_edges(func, bb);

    for compound in block_compounds {
        finalize_and_enqueue(func, store, config, compound, bb, queue);
    }
}

/// Insert the `PseudoMoveSingle` for an in-place operand (`NegM`/`AddMR`/
/// `AndMR`'s `primary`), rewrite the consuming instruction's operand slot
/// to read from it, and add the pseudo's result as a second interval in
/// `compound` (§4.4 step 2).
fn add_in_place_pseudo(
    func: &mut Function,
    store: &mut IntervalStore,
    bb: Block,
    inst: crate::ir::Inst,
    operand_slot: u16,
    primary: Value,
    compound: CompoundId,
) {
    let pseudo_result = func.make_value(ValueClass::ModeM);
    let pseudo = func.insert_inst_before(
        inst,
        InstructionData::PseudoMoveSingle {
            operand: primary,
            result: pseudo_result,
        },
    );
    func.redirect_use(UseSite::Inst(inst, operand_slot), pseudo_result);
    let origin = ProgramCounter::result_of(bb, pseudo);
    store.add_interval(func, compound, pseudo_result, origin, origin);
}

/// Append the trailing `PseudoMoveMultiple` that materializes `bb`'s
/// outbound `DataFlowEdge`s, if it has any (§4.4 tail step). No compound is
/// created here: the resulting values are picked up as interval endpoints
/// by `collect_phi_intervals` when it processes the successor's
/// `DataFlowPhi`.
fn collect_block_edges(func: &mut Function, bb: Block) {
    let outbound = outbound_edges(func, bb);
    if outbound.is_empty() {
        return;
    }
    let arity = outbound.len();
    let operands: SmallVec<[Value; 4]> = outbound
        .iter()
        .map(|&(phi, idx)| func.get_operand(UseSite::PhiEdge(phi, idx as u16)))
        .collect();
    let results: SmallVec<[Value; 4]> = (0..arity).map(|_| func.make_value(ValueClass::ModeM)).collect();
    func.append_inst(
        bb,
        InstructionData::PseudoMoveMultiple {
            operands,
            results: results.clone(),
        },
    );
    for (i, &(phi, idx)) in outbound.iter().enumerate() {
        func.redirect_use(UseSite::PhiEdge(phi, idx as u16), results[i]);
    }
}

/// Every `(phi, edge_index)` pair, across the whole function, whose edge's
/// `source` is `bb`: i.e. `bb`'s outbound data-flow edges.
fn outbound_edges(func: &Function, bb: Block) -> Vec<(Phi, usize)> {
    let mut out = Vec::new();
    for (block, data) in func.blocks() {
        let _ = block;
        for &phi in &data.phis {
            if let PhiData::DataFlowPhi { edges, .. } = func.phi_data(phi) {
                for (idx, edge) in edges.iter().enumerate() {
                    if edge.source == bb {
                        out.push((phi, idx));
                    }
                }
            }
        }
    }
    out
}

fn collect_phi_intervals(
    func: &mut Function,
    store: &mut IntervalStore,
    config: &AllocatorConfig,
    bb: Block,
    queue: &mut Vec<CompoundId>,
) {
    let phis = func.block(bb).phis.clone();
    for phi in phis {
        match func.phi_data(phi).clone() {
            PhiData::ArgumentPhi { value, index } => {
                let reg = abi_arg_register(index)
                    .unwrap_or_else(|| panic!("argument phi {} has no ABI register slot", index));
                let compound = store.new_compound(reg_mask(reg));
                let origin = ProgramCounter::block_entry(bb);
                store.add_interval(func, compound, value, origin, origin);
                finalize_and_enqueue(func, store, config, compound, bb, queue);
            }
            PhiData::DataFlowPhi { value, edges } => {
                let mask = MASK_GENERIC & config.generic_register_mask;
                let compound = store.new_compound(mask);
                let origin = ProgramCounter::block_entry(bb);
                let final_pc = match func.last_use_in_block(value, bb) {
                    Some(last_user) => ProgramCounter::before_inst(bb, last_user),
                    None => origin,
                };
                store.add_interval(func, compound, value, origin, final_pc);

                for edge in &edges {
                    let producer = match func.value_def(edge.alias) {
                        ValueDef::Inst(inst) => inst,
                        other => panic!(
                            "data-flow edge alias must be produced by an instruction, found {:?}",
                            other
                        ),
                    };
                    let origin = ProgramCounter::result_of(edge.source, producer);
                    let final_pc = ProgramCounter::block_exit(edge.source);
                    store.add_interval(func, compound, edge.alias, origin, final_pc);
                }
                queue.push(compound);
                if config.trace {
                    trace!("{}: data-flow phi compound spans {} edge(s)", bb, edges.len());
                }
            }
        }
    }
}
