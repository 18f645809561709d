#![allow(dead_code)]
//! Shared helpers for the integration suites: compile source text through
//! the whole pipeline and execute the resulting IR directly, so end-to-end
//! scenarios can assert on real exit codes without a native back end.

use std::collections::HashMap;

use c99cc::ir::{BinOp, BlockId, IcmpPred, InstId, InstKind, ModuleIr, SlotId, Terminator, Value};
use c99cc::CompilePipeline;

pub fn compile(source: &str) -> ModuleIr {
    CompilePipeline::default()
        .compile("test.c", source)
        .expect("test source must compile")
}

/// Execute `main` of a lowered module and return its exit value.
pub fn run_main(module: &ModuleIr) -> i32 {
    let f = module.function("main").expect("module must define main");

    let mut values: HashMap<InstId, i64> = HashMap::new();
    let mut slots: HashMap<SlotId, i32> = HashMap::new();
    let mut prev: Option<BlockId> = None;
    let mut cur = f.entry;
    let mut steps = 0usize;

    let read = |values: &HashMap<InstId, i64>, v: Value| -> i64 {
        match v {
            Value::ConstI32(c) => c as i64,
            Value::ConstBool(b) => b as i64,
            Value::Inst(id) => *values
                .get(&id)
                .unwrap_or_else(|| panic!("use of %{} before definition", id.0)),
        }
    };

    loop {
        steps += 1;
        assert!(steps < 1_000_000, "interpreter ran away");

        let block = f.block(cur);
        for inst_id in &block.insts {
            let inst = f.inst(*inst_id);
            let result = match &inst.kind {
                InstKind::Binary { op, lhs, rhs } => {
                    let l = read(&values, *lhs) as i32;
                    let r = read(&values, *rhs) as i32;
                    let v = match op {
                        BinOp::Add => l.wrapping_add(r),
                        BinOp::Sub => l.wrapping_sub(r),
                        BinOp::Mul => l.wrapping_mul(r),
                        BinOp::Sdiv => {
                            assert!(r != 0, "sdiv by zero at %{}", inst.id.0);
                            l.wrapping_div(r)
                        }
                    };
                    v as i64
                }
                InstKind::Neg(v) => (read(&values, *v) as i32).wrapping_neg() as i64,
                InstKind::Not(v) => !(read(&values, *v) as i32) as i64,
                InstKind::Icmp { pred, lhs, rhs } => {
                    let l = read(&values, *lhs) as i32;
                    let r = read(&values, *rhs) as i32;
                    i64::from(match pred {
                        IcmpPred::Eq => l == r,
                        IcmpPred::Ne => l != r,
                        IcmpPred::Slt => l < r,
                        IcmpPred::Sgt => l > r,
                        IcmpPred::Sle => l <= r,
                        IcmpPred::Sge => l >= r,
                    })
                }
                InstKind::Zext(v) => read(&values, *v),
                InstKind::Load { slot } => i64::from(*slots.get(slot).unwrap_or(&0)),
                InstKind::Store { slot, value } => {
                    slots.insert(*slot, read(&values, *value) as i32);
                    0
                }
                InstKind::Phi { incomings, .. } => {
                    let from = prev.expect("phi in the entry block");
                    let (value, _) = incomings
                        .iter()
                        .find(|(_, b)| *b == from)
                        .unwrap_or_else(|| panic!("phi has no edge from block {}", from.0));
                    read(&values, *value)
                }
            };
            values.insert(inst.id, result);
        }

        let term = block
            .terminator
            .as_ref()
            .unwrap_or_else(|| panic!("block '{}' has no terminator", block.label));
        match term {
            Terminator::Br { target } => {
                prev = Some(cur);
                cur = *target;
            }
            Terminator::CondBr {
                cond,
                then_dest,
                else_dest,
            } => {
                let taken = read(&values, *cond) != 0;
                prev = Some(cur);
                cur = if taken { *then_dest } else { *else_dest };
            }
            Terminator::Ret { value } => return read(&values, *value) as i32,
        }
    }
}

/// Compile and run in one step.
pub fn exit_code(source: &str) -> i32 {
    run_main(&compile(source))
}
