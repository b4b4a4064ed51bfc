//! End-to-end coverage driving the public surface
//! (`FunctionBuilder`/`Function` + `AllocateRegistersPass`) the way a real
//! front-end would, rather than exercising the collector/allocator/rewriter
//! in isolation as the `src/` unit tests do.

use lewis_regalloc::ir::function::ValueClass;
use lewis_regalloc::ir::{Branch, Function, FunctionBuilder, InstructionData};
use lewis_regalloc::AllocateRegistersPass;

fn no_pseudos_remain(func: &Function) -> bool {
    func.blocks()
        .all(|(_, data)| data.insts.iter().all(|&i| !func.inst_data(i).is_pseudo()))
}

fn count_insts(func: &Function, block: lewis_regalloc::ir::Block, pred: impl Fn(&InstructionData) -> bool) -> usize {
    func.block(block).insts.iter().filter(|&&i| pred(func.inst_data(i))).count()
}

/// v1 = 5; v2 = -v1 (in place). The negate's pseudo move fuses into v1's
/// compound, so v1 and v2 end up sharing a register and no real move is
/// ever emitted.
#[test]
fn const_then_negate_fuses_the_in_place_move() {
    let mut func = Function::new();
    let mut b = FunctionBuilder::new(&mut func);
    let b0 = b.create_block();
    b.switch_to_block(b0).unwrap();
    let v1 = b.mov_mc(5);
    let v2 = b.neg_m(v1);
    b.ret().unwrap();

    AllocateRegistersPass::create(&mut func).run();

    assert!(no_pseudos_remain(&func));
    assert_eq!(func.block(b0).insts.len(), 2);
    assert_eq!(func.value_register(v1), Some(0));
    assert_eq!(func.value_register(v2), Some(0));
}

/// v1 = 1; v2 = 2; v3 = v1 + v2 (in place on v1). v2 overlaps v1's whole
/// lifetime up to the add, so it lands in a different register; the add's
/// pseudo fuses the same way the negate's did.
#[test]
fn const_then_add_keeps_the_running_sum_in_one_register() {
    let mut func = Function::new();
    let mut b = FunctionBuilder::new(&mut func);
    let b0 = b.create_block();
    b.switch_to_block(b0).unwrap();
    let v1 = b.mov_mc(1);
    let v2 = b.mov_mc(2);
    let v3 = b.add_mr(v1, v2);
    b.ret().unwrap();

    AllocateRegistersPass::create(&mut func).run();

    assert!(no_pseudos_remain(&func));
    assert_eq!(func.block(b0).insts.len(), 3);
    assert_eq!(func.value_register(v1), Some(0));
    assert_eq!(func.value_register(v2), Some(1));
    assert_eq!(func.value_register(v3), Some(0));
}

/// Three values whose live ranges all cross one another: v3 stays live
/// across both in-place adds, so it must never share a register with
/// either side of the running sum.
#[test]
fn three_overlapping_values_get_pairwise_distinct_registers() {
    let mut func = Function::new();
    let mut b = FunctionBuilder::new(&mut func);
    let b0 = b.create_block();
    b.switch_to_block(b0).unwrap();
    let v1 = b.mov_mc(1);
    let v2 = b.mov_mc(2);
    let v3 = b.mov_mc(3);
    let v4 = b.add_mr(v1, v2);
    let v5 = b.add_mr(v4, v3);
    b.ret().unwrap();

    AllocateRegistersPass::create(&mut func).run();

    assert!(no_pseudos_remain(&func));
    assert_eq!(func.block(b0).insts.len(), 5);

    let r1 = func.value_register(v1).unwrap();
    let r2 = func.value_register(v2).unwrap();
    let r3 = func.value_register(v3).unwrap();
    let r4 = func.value_register(v4).unwrap();
    let r5 = func.value_register(v5).unwrap();

    assert_ne!(r1, r2);
    assert_ne!(r2, r3);
    assert_ne!(r1, r3);
    assert_ne!(r3, r4);
    assert_ne!(r3, r5);
    assert_eq!(r1, r4, "the running sum stays in one register across the in-place chain");
    assert_eq!(r4, r5);
}

/// A two-argument call routes its operands through rdi/rsi and its result
/// through rax, regardless of where the arguments happened to land.
#[test]
fn call_with_two_args_routes_through_the_sysv_registers() {
    let mut func = Function::new();
    let mut b = FunctionBuilder::new(&mut func);
    let b0 = b.create_block();
    b.switch_to_block(b0).unwrap();
    let v1 = b.mov_mc(1);
    let v2 = b.mov_mc(2);
    let v3 = b.call("f", &[v1, v2]).unwrap();
    b.ret().unwrap();

    AllocateRegistersPass::create(&mut func).run();

    assert!(no_pseudos_remain(&func));
    assert_eq!(func.value_register(v1), Some(0));
    assert_eq!(func.value_register(v2), Some(1));
    assert_eq!(func.value_register(v3), Some(lewis_regalloc::ir::RAX));

    let call_inst = func
        .block(b0)
        .insts
        .iter()
        .copied()
        .find(|&i| matches!(func.inst_data(i), InstructionData::Call { .. }))
        .expect("call instruction survives rewriting");
    match func.inst_data(call_inst) {
        InstructionData::Call { args, .. } => {
            assert_eq!(func.value_register(args[0]), Some(lewis_regalloc::ir::RDI));
            assert_eq!(func.value_register(args[1]), Some(lewis_regalloc::ir::RSI));
        }
        _ => unreachable!(),
    }

    assert_eq!(count_insts(&func, b0, |d| matches!(d, InstructionData::MovMR { .. })), 2);
    assert_eq!(count_insts(&func, b0, |d| matches!(d, InstructionData::XchgMR { .. })), 0);
}

/// A value produced in one block and merged by a single-edge `DataFlowPhi`
/// in its successor: the phi's trailing pseudo move fuses away with no real
/// copy, since nothing else contends for the source's register.
#[test]
fn single_edge_phi_fuses_across_a_block_boundary() {
    let mut func = Function::new();
    let mut b = FunctionBuilder::new(&mut func);
    let b0 = b.create_block();
    let b1 = b.create_block();
    b.switch_to_block(b0).unwrap();
    let v1 = b.mov_mc(5);
    b.jmp(b1).unwrap();

    b.switch_to_block(b1).unwrap();
    let merged = b.dataflow_phi(&[(b0, v1)]).unwrap();
    b.ret().unwrap();

    AllocateRegistersPass::create(&mut func).run();

    assert!(no_pseudos_remain(&func));
    assert_eq!(func.block(b0).insts.len(), 1);
    assert_eq!(func.block(b1).insts.len(), 0);
    assert_eq!(func.value_register(v1), func.value_register(merged));
    assert!(func.value_register(merged).is_some());
}

/// A loop header that swaps two values on its back edge: `x` and `y` are
/// simultaneously live entering the header (each feeds the other's next
/// iteration), so the allocator is forced to give them different registers
/// from the values that feed them, and both the preheader's and the
/// header's trailing parallel copies resolve to a single `xchg` apiece
/// rather than a `mov` sequence.
#[test]
fn swapped_loop_carried_values_resolve_to_one_exchange_per_edge() {
    let mut func = Function::new();
    let b0 = func.make_block();
    let b1 = func.make_block();

    let x0 = func.make_value(ValueClass::ModeM);
    func.append_inst(b0, InstructionData::MovMC { imm: 1, result: x0 });
    let y0 = func.make_value(ValueClass::ModeM);
    func.append_inst(b0, InstructionData::MovMC { imm: 2, result: y0 });
    func.set_branch(b0, Branch::Jmp(b1));

    let x = func.make_value(ValueClass::ModeM);
    let y = func.make_value(ValueClass::ModeM);
    let x_exit = func.make_value(ValueClass::ModeM);
    let y_exit = func.make_value(ValueClass::ModeM);

    func.make_phi(
        b1,
        lewis_regalloc::ir::PhiData::DataFlowPhi {
            value: x,
            edges: smallvec::smallvec![
                lewis_regalloc::ir::DataFlowEdge { source: b0, alias: x0 },
                lewis_regalloc::ir::DataFlowEdge { source: b1, alias: x_exit },
            ],
        },
    );
    func.make_phi(
        b1,
        lewis_regalloc::ir::PhiData::DataFlowPhi {
            value: y,
            edges: smallvec::smallvec![
                lewis_regalloc::ir::DataFlowEdge { source: b0, alias: y0 },
                lewis_regalloc::ir::DataFlowEdge { source: b1, alias: y_exit },
            ],
        },
    );

    func.append_inst(b1, InstructionData::MovMR { src: y, result: x_exit });
    func.append_inst(b1, InstructionData::MovMR { src: x, result: y_exit });
    func.set_branch(b1, Branch::Jmp(b1));

    AllocateRegistersPass::create(&mut func).run();

    assert!(no_pseudos_remain(&func));

    assert_eq!(count_insts(&func, b0, |d| matches!(d, InstructionData::XchgMR { .. })), 1);
    assert_eq!(count_insts(&func, b0, |d| matches!(d, InstructionData::MovMR { .. })), 0);
    assert_eq!(count_insts(&func, b1, |d| matches!(d, InstructionData::XchgMR { .. })), 1);
    assert_eq!(count_insts(&func, b1, |d| matches!(d, InstructionData::MovMR { .. })), 2);

    let rx0 = func.value_register(x0).unwrap();
    let ry0 = func.value_register(y0).unwrap();
    let rx = func.value_register(x).unwrap();
    let ry = func.value_register(y).unwrap();
    let rxe = func.value_register(x_exit).unwrap();
    let rye = func.value_register(y_exit).unwrap();

    assert_ne!(rx0, ry0, "x0 and y0 are simultaneously live up to the preheader's exchange");
    assert_ne!(rx, ry, "x and y are simultaneously live entering the header");
    assert_ne!(rxe, rye, "x_exit and y_exit are simultaneously live leaving the header");
}
