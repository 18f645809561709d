//! AST → IR lowering.
//!
//! Lowering never fails: everything that could go wrong here was rejected
//! by sema, so an inconsistency found mid-lowering is an internal fault and
//! panics.
//!
//! Statement lowering returns whether the current insertion block got
//! terminated. A terminated block is never appended to; subsequent
//! statements in the same block sequence are silently skipped, and a
//! function body that falls off the end gets an implicit `return 0`.

use std::collections::HashMap;

use crate::ir::{
    BinOp, BlockId, Function, IcmpPred, InstKind, ModuleIr, SlotId, Terminator, Ty, Value,
};
use crate::syntax::ast::{BinaryOp, Expr, Stmt, TranslationUnit, UnaryOp};

/// Lower a validated translation unit into a module.
pub fn lower(tu: &TranslationUnit, module_name: &str) -> ModuleIr {
    let mut ctx = LowerCtx::new(&tu.func_name);
    ctx.push_scope();

    let mut terminated = false;
    for stmt in &tu.body {
        terminated = ctx.lower_stmt(stmt);
        if terminated {
            break;
        }
    }
    if !terminated {
        ctx.terminate(Terminator::Ret {
            value: Value::ConstI32(0),
        });
    }
    ctx.pop_scope();

    ModuleIr {
        name: module_name.to_string(),
        functions: vec![ctx.func],
    }
}

/// Branch targets of the innermost loop.
struct LoopTargets {
    break_target: BlockId,
    continue_target: BlockId,
}

struct LowerCtx {
    func: Function,
    cur: BlockId,
    scopes: Vec<HashMap<String, SlotId>>,
    loop_stack: Vec<LoopTargets>,
    label_counts: HashMap<String, u32>,
    slot_name_counts: HashMap<String, u32>,
}

impl LowerCtx {
    fn new(func_name: &str) -> Self {
        let func = Function::new(func_name);
        let cur = func.entry;
        Self {
            func,
            cur,
            scopes: Vec::new(),
            loop_stack: Vec::new(),
            label_counts: HashMap::new(),
            slot_name_counts: HashMap::new(),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Allocate a slot for a freshly declared name. Shadowed names get a
    /// numeric suffix so every slot name stays unique in the function.
    fn declare_slot(&mut self, name: &str) -> SlotId {
        let count = self.slot_name_counts.entry(name.to_string()).or_insert(0);
        let slot_name = if *count == 0 {
            name.to_string()
        } else {
            format!("{}.{}", name, count)
        };
        *count += 1;
        let slot = self.func.add_slot(slot_name);
        self.scopes
            .last_mut()
            .expect("scope stack is never empty during lowering")
            .insert(name.to_string(), slot);
        slot
    }

    fn lookup_slot(&self, name: &str) -> SlotId {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.get(name).copied())
            .unwrap_or_else(|| panic!("slot for '{}' missing after sema", name))
    }

    fn fresh_label(&mut self, base: &str) -> String {
        let count = self.label_counts.entry(base.to_string()).or_insert(0);
        let label = if *count == 0 {
            base.to_string()
        } else {
            format!("{}{}", base, count)
        };
        *count += 1;
        label
    }

    fn add_block(&mut self, base: &str) -> BlockId {
        let label = self.fresh_label(base);
        self.func.add_block(label)
    }

    fn emit(&mut self, kind: InstKind) -> Value {
        Value::Inst(self.func.append(self.cur, kind))
    }

    fn terminate(&mut self, term: Terminator) {
        self.func.set_terminator(self.cur, term);
    }

    /// Compare a 32-bit value against zero to get the 1-bit branch
    /// predicate.
    fn truthiness(&mut self, v: Value) -> Value {
        self.emit(InstKind::Icmp {
            pred: IcmpPred::Ne,
            lhs: v,
            rhs: Value::ConstI32(0),
        })
    }

    fn lower_cond(&mut self, e: &Expr) -> Value {
        let v = self.lower_expr(e);
        self.truthiness(v)
    }

    fn lower_expr(&mut self, e: &Expr) -> Value {
        match e {
            Expr::IntLiteral { value, .. } => Value::ConstI32(*value as i32),

            Expr::VarRef { name, .. } => {
                let slot = self.lookup_slot(name);
                self.emit(InstKind::Load { slot })
            }

            Expr::Assign { name, value, .. } => {
                let v = self.lower_expr(value);
                let slot = self.lookup_slot(name);
                self.emit(InstKind::Store { slot, value: v });
                v
            }

            Expr::Unary { op, operand, .. } => {
                let v = self.lower_expr(operand);
                match op {
                    UnaryOp::Plus => v,
                    UnaryOp::Neg => self.emit(InstKind::Neg(v)),
                    UnaryOp::BitNot => self.emit(InstKind::Not(v)),
                    UnaryOp::LogicalNot => {
                        let is_zero = self.emit(InstKind::Icmp {
                            pred: IcmpPred::Eq,
                            lhs: v,
                            rhs: Value::ConstI32(0),
                        });
                        self.emit(InstKind::Zext(is_zero))
                    }
                }
            }

            Expr::Binary { op, lhs, rhs, .. } => match op {
                BinaryOp::LogicalAnd => self.lower_logical_and(lhs, rhs),
                BinaryOp::LogicalOr => self.lower_logical_or(lhs, rhs),
                BinaryOp::Comma => {
                    self.lower_expr(lhs);
                    self.lower_expr(rhs)
                }
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                    let l = self.lower_expr(lhs);
                    let r = self.lower_expr(rhs);
                    let op = match op {
                        BinaryOp::Add => BinOp::Add,
                        BinaryOp::Sub => BinOp::Sub,
                        BinaryOp::Mul => BinOp::Mul,
                        _ => BinOp::Sdiv,
                    };
                    self.emit(InstKind::Binary { op, lhs: l, rhs: r })
                }
                BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne => {
                    let l = self.lower_expr(lhs);
                    let r = self.lower_expr(rhs);
                    let pred = match op {
                        BinaryOp::Lt => IcmpPred::Slt,
                        BinaryOp::Le => IcmpPred::Sle,
                        BinaryOp::Gt => IcmpPred::Sgt,
                        BinaryOp::Ge => IcmpPred::Sge,
                        BinaryOp::Eq => IcmpPred::Eq,
                        _ => IcmpPred::Ne,
                    };
                    let cmp = self.emit(InstKind::Icmp {
                        pred,
                        lhs: l,
                        rhs: r,
                    });
                    self.emit(InstKind::Zext(cmp))
                }
            },
        }
    }

    /// `lhs && rhs`: a false left side skips the right side entirely.
    fn lower_logical_and(&mut self, lhs: &Expr, rhs: &Expr) -> Value {
        let rhs_bb = self.add_block("land.rhs");
        let false_bb = self.add_block("land.false");
        let merge_bb = self.add_block("land.end");

        let lhs_pred = self.lower_cond(lhs);
        self.terminate(Terminator::CondBr {
            cond: lhs_pred,
            then_dest: rhs_bb,
            else_dest: false_bb,
        });

        self.cur = false_bb;
        self.terminate(Terminator::Br { target: merge_bb });

        self.cur = rhs_bb;
        let rhs_pred = self.lower_cond(rhs);
        // nested short-circuits move the insertion point, so the phi edge
        // comes from wherever the right side ended up
        let rhs_end = self.cur;
        self.terminate(Terminator::Br { target: merge_bb });

        self.cur = merge_bb;
        let phi = self.emit(InstKind::Phi {
            ty: Ty::I1,
            incomings: vec![(Value::ConstBool(false), false_bb), (rhs_pred, rhs_end)],
        });
        self.emit(InstKind::Zext(phi))
    }

    /// `lhs || rhs`: a true left side skips the right side entirely.
    fn lower_logical_or(&mut self, lhs: &Expr, rhs: &Expr) -> Value {
        let rhs_bb = self.add_block("lor.rhs");
        let true_bb = self.add_block("lor.true");
        let merge_bb = self.add_block("lor.end");

        let lhs_pred = self.lower_cond(lhs);
        self.terminate(Terminator::CondBr {
            cond: lhs_pred,
            then_dest: true_bb,
            else_dest: rhs_bb,
        });

        self.cur = true_bb;
        self.terminate(Terminator::Br { target: merge_bb });

        self.cur = rhs_bb;
        let rhs_pred = self.lower_cond(rhs);
        let rhs_end = self.cur;
        self.terminate(Terminator::Br { target: merge_bb });

        self.cur = merge_bb;
        let phi = self.emit(InstKind::Phi {
            ty: Ty::I1,
            incomings: vec![(Value::ConstBool(true), true_bb), (rhs_pred, rhs_end)],
        });
        self.emit(InstKind::Zext(phi))
    }

    /// Returns true when the current insertion block has been terminated.
    fn lower_stmt(&mut self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Decl { name, init, .. } => {
                // the initializer may reference an outer binding of the
                // same name, so evaluate it before the new slot shadows it
                let init_value = init.as_ref().map(|e| self.lower_expr(e));
                let slot = self.declare_slot(name);
                if let Some(value) = init_value {
                    self.emit(InstKind::Store { slot, value });
                }
                false
            }

            Stmt::Assign { name, value, .. } => {
                let v = self.lower_expr(value);
                let slot = self.lookup_slot(name);
                self.emit(InstKind::Store { slot, value: v });
                false
            }

            Stmt::Expr { expr, .. } => {
                self.lower_expr(expr);
                false
            }

            Stmt::Block { stmts, .. } => {
                self.push_scope();
                let mut terminated = false;
                for s in stmts {
                    if self.lower_stmt(s) {
                        terminated = true;
                        break;
                    }
                }
                self.pop_scope();
                terminated
            }

            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let cond_pred = self.lower_cond(cond);

                let then_bb = self.add_block("if.then");
                let else_bb = else_branch.as_ref().map(|_| self.add_block("if.else"));
                let merge_bb = self.add_block("if.end");

                self.terminate(Terminator::CondBr {
                    cond: cond_pred,
                    then_dest: then_bb,
                    else_dest: else_bb.unwrap_or(merge_bb),
                });

                self.cur = then_bb;
                if !self.lower_stmt(then_branch) {
                    self.terminate(Terminator::Br { target: merge_bb });
                }

                if let (Some(else_bb), Some(else_branch)) = (else_bb, else_branch) {
                    self.cur = else_bb;
                    if !self.lower_stmt(else_branch) {
                        self.terminate(Terminator::Br { target: merge_bb });
                    }
                }

                self.cur = merge_bb;
                false
            }

            Stmt::While { cond, body, .. } => {
                let cond_bb = self.add_block("while.cond");
                let body_bb = self.add_block("while.body");
                let end_bb = self.add_block("while.end");

                self.terminate(Terminator::Br { target: cond_bb });

                self.cur = cond_bb;
                let pred = self.lower_cond(cond);
                self.terminate(Terminator::CondBr {
                    cond: pred,
                    then_dest: body_bb,
                    else_dest: end_bb,
                });

                self.cur = body_bb;
                self.loop_stack.push(LoopTargets {
                    break_target: end_bb,
                    continue_target: cond_bb,
                });
                let body_terminated = self.lower_stmt(body);
                self.loop_stack.pop();
                if !body_terminated {
                    self.terminate(Terminator::Br { target: cond_bb });
                }

                self.cur = end_bb;
                false
            }

            Stmt::DoWhile { body, cond, .. } => {
                let body_bb = self.add_block("do.body");
                let cond_bb = self.add_block("do.cond");
                let end_bb = self.add_block("do.end");

                self.terminate(Terminator::Br { target: body_bb });

                self.cur = body_bb;
                self.loop_stack.push(LoopTargets {
                    break_target: end_bb,
                    continue_target: cond_bb,
                });
                let body_terminated = self.lower_stmt(body);
                self.loop_stack.pop();
                if !body_terminated {
                    self.terminate(Terminator::Br { target: cond_bb });
                }

                self.cur = cond_bb;
                let pred = self.lower_cond(cond);
                self.terminate(Terminator::CondBr {
                    cond: pred,
                    then_dest: body_bb,
                    else_dest: end_bb,
                });

                self.cur = end_bb;
                false
            }

            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.lower_stmt(init);
                }

                let cond_bb = self.add_block("for.cond");
                let body_bb = self.add_block("for.body");
                let step_bb = self.add_block("for.step");
                let end_bb = self.add_block("for.end");

                self.terminate(Terminator::Br { target: cond_bb });

                self.cur = cond_bb;
                let pred = match cond {
                    Some(cond) => self.lower_cond(cond),
                    None => Value::ConstBool(true),
                };
                self.terminate(Terminator::CondBr {
                    cond: pred,
                    then_dest: body_bb,
                    else_dest: end_bb,
                });

                self.cur = body_bb;
                self.loop_stack.push(LoopTargets {
                    break_target: end_bb,
                    continue_target: step_bb,
                });
                let body_terminated = self.lower_stmt(body);
                self.loop_stack.pop();
                if !body_terminated {
                    self.terminate(Terminator::Br { target: step_bb });
                }

                self.cur = step_bb;
                if let Some(step) = step {
                    self.lower_expr(step);
                }
                self.terminate(Terminator::Br { target: cond_bb });

                self.cur = end_bb;
                self.pop_scope();
                false
            }

            Stmt::Break { .. } => {
                let target = self
                    .loop_stack
                    .last()
                    .map(|t| t.break_target)
                    .unwrap_or_else(|| panic!("'break' outside of a loop after sema"));
                self.terminate(Terminator::Br { target });
                true
            }

            Stmt::Continue { .. } => {
                let target = self
                    .loop_stack
                    .last()
                    .map(|t| t.continue_target)
                    .unwrap_or_else(|| panic!("'continue' outside of a loop after sema"));
                self.terminate(Terminator::Br { target });
                true
            }

            Stmt::Return { value, .. } => {
                let v = self.lower_expr(value);
                self.terminate(Terminator::Ret { value: v });
                true
            }

            Stmt::Empty { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::syntax::{Lexer, Parser};

    fn lower_source(src: &str) -> ModuleIr {
        let mut diags = Diagnostics::new();
        let tu = Parser::new(Lexer::new(src), &mut diags)
            .parse()
            .expect("test source must parse");
        assert!(!diags.has_error(), "test source must be clean");
        lower(&tu, "test")
    }

    fn single_function(module: &ModuleIr) -> &Function {
        assert_eq!(module.functions.len(), 1);
        &module.functions[0]
    }

    fn assert_all_blocks_terminated(f: &Function) {
        for (_, block) in f.blocks() {
            assert!(
                block.terminator.is_some(),
                "block '{}' has no terminator",
                block.label
            );
        }
    }

    #[test]
    fn implicit_return_zero() {
        let module = lower_source("int main() { int x = 1; }");
        let f = single_function(&module);
        assert_eq!(
            f.block(f.entry).terminator,
            Some(Terminator::Ret {
                value: Value::ConstI32(0)
            })
        );
    }

    #[test]
    fn statements_after_return_are_skipped() {
        let module = lower_source("int main() { return 1; return 2; }");
        let f = single_function(&module);
        assert_eq!(
            f.block(f.entry).terminator,
            Some(Terminator::Ret {
                value: Value::ConstI32(1)
            })
        );
        assert_all_blocks_terminated(f);
    }

    #[test]
    fn if_else_creates_three_armed_cfg() {
        let module = lower_source("int main() { int x = 1; if (x) return 7; else return 9; }");
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        let labels: Vec<_> = f.blocks().map(|(_, b)| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry", "if.then", "if.else", "if.end"]);

        let Some(Terminator::CondBr {
            then_dest,
            else_dest,
            ..
        }) = &f.block(f.entry).terminator
        else {
            panic!("entry must end in a conditional branch");
        };
        assert_eq!(
            f.block(*then_dest).terminator,
            Some(Terminator::Ret {
                value: Value::ConstI32(7)
            })
        );
        assert_eq!(
            f.block(*else_dest).terminator,
            Some(Terminator::Ret {
                value: Value::ConstI32(9)
            })
        );
    }

    #[test]
    fn while_loop_targets() {
        let module =
            lower_source("int main() { int i = 0; while (i < 3) { i = i + 1; } return i; }");
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        let cond = f
            .blocks()
            .find(|(_, b)| b.label == "while.cond")
            .map(|(id, _)| id)
            .unwrap();
        let body = f
            .blocks()
            .find(|(_, b)| b.label == "while.body")
            .map(|(id, _)| id)
            .unwrap();
        // the body loops back to the condition
        assert_eq!(
            f.block(body).terminator,
            Some(Terminator::Br { target: cond })
        );
        // entry branches into the condition
        assert_eq!(
            f.block(f.entry).terminator,
            Some(Terminator::Br { target: cond })
        );
    }

    #[test]
    fn break_and_continue_branch_to_loop_targets() {
        let module = lower_source(
            "int main() { int i = 0; while (1) { if (i) break; else continue; } return 0; }",
        );
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        let cond = f
            .blocks()
            .find(|(_, b)| b.label == "while.cond")
            .map(|(id, _)| id)
            .unwrap();
        let end = f
            .blocks()
            .find(|(_, b)| b.label == "while.end")
            .map(|(id, _)| id)
            .unwrap();
        let then_bb = f
            .blocks()
            .find(|(_, b)| b.label == "if.then")
            .map(|(id, _)| id)
            .unwrap();
        let else_bb = f
            .blocks()
            .find(|(_, b)| b.label == "if.else")
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(
            f.block(then_bb).terminator,
            Some(Terminator::Br { target: end })
        );
        assert_eq!(
            f.block(else_bb).terminator,
            Some(Terminator::Br { target: cond })
        );
    }

    #[test]
    fn do_while_body_runs_before_condition() {
        let module = lower_source("int main() { int i = 0; do i = i + 1; while (i < 3); return i; }");
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        let body = f
            .blocks()
            .find(|(_, b)| b.label == "do.body")
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(
            f.block(f.entry).terminator,
            Some(Terminator::Br { target: body })
        );
        let cond = f
            .blocks()
            .find(|(_, b)| b.label == "do.cond")
            .map(|(id, _)| id)
            .unwrap();
        let Some(Terminator::CondBr { then_dest, .. }) = &f.block(cond).terminator else {
            panic!("do.cond must end in a conditional branch");
        };
        assert_eq!(*then_dest, body);
    }

    #[test]
    fn for_loop_continue_goes_to_step() {
        let module = lower_source(
            "int main() { int s = 0; for (int i = 0; i < 9; i = i + 1) { if (i == 2) continue; s = s + i; } return s; }",
        );
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        let step = f
            .blocks()
            .find(|(_, b)| b.label == "for.step")
            .map(|(id, _)| id)
            .unwrap();
        let then_bb = f
            .blocks()
            .find(|(_, b)| b.label == "if.then")
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(
            f.block(then_bb).terminator,
            Some(Terminator::Br { target: step })
        );
    }

    #[test]
    fn for_without_condition_branches_on_constant_true() {
        let module = lower_source("int main() { for (;;) break; return 0; }");
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        let cond = f
            .blocks()
            .find(|(_, b)| b.label == "for.cond")
            .map(|(id, _)| id)
            .unwrap();
        assert!(matches!(
            f.block(cond).terminator,
            Some(Terminator::CondBr {
                cond: Value::ConstBool(true),
                ..
            })
        ));
    }

    #[test]
    fn short_circuit_and_has_phi_with_one_incoming_per_predecessor() {
        let module = lower_source("int main() { int x = 0; int y = 0; if (x && (y = 1)) return 1; return y; }");
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        let (merge_id, merge) = f.blocks().find(|(_, b)| b.label == "land.end").unwrap();
        let phi = merge
            .insts
            .iter()
            .map(|id| f.inst(*id))
            .find(|i| matches!(i.kind, InstKind::Phi { .. }))
            .expect("merge block must hold the phi");
        let InstKind::Phi { incomings, .. } = &phi.kind else {
            unreachable!()
        };
        let preds = f.predecessors(merge_id);
        assert_eq!(incomings.len(), preds.len());
        for (_, from) in incomings {
            assert!(preds.contains(from));
        }
    }

    #[test]
    fn rhs_of_and_is_a_separate_block() {
        let module = lower_source("int main() { int x = 0; int y = 0; if (x && (y = 1)) return 1; return y; }");
        let f = single_function(&module);

        // the store to y must sit in land.rhs, reachable only through the
        // true edge of the left side
        let (rhs_id, rhs) = f.blocks().find(|(_, b)| b.label == "land.rhs").unwrap();
        assert!(rhs
            .insts
            .iter()
            .any(|id| matches!(f.inst(*id).kind, InstKind::Store { .. })));

        let Some(Terminator::CondBr {
            then_dest,
            else_dest,
            ..
        }) = &f.block(f.entry).terminator
        else {
            panic!("entry must end in the short-circuit branch");
        };
        assert_eq!(*then_dest, rhs_id);
        assert_ne!(*else_dest, rhs_id);
    }

    #[test]
    fn nested_short_circuit_phi_edges_come_from_inner_merge() {
        let module = lower_source("int main() { int a = 1; int b = 1; int c = 1; if (a && (b && c)) return 1; return 0; }");
        let f = single_function(&module);
        assert_all_blocks_terminated(f);

        // outer merge phi edges must match real predecessors even though
        // the rhs ended in the inner merge block
        for (id, block) in f.blocks() {
            for inst_id in &block.insts {
                if let InstKind::Phi { incomings, .. } = &f.inst(*inst_id).kind {
                    let preds = f.predecessors(id);
                    assert_eq!(incomings.len(), preds.len(), "phi in '{}'", block.label);
                    for (_, from) in incomings {
                        assert!(preds.contains(from), "phi edge in '{}'", block.label);
                    }
                }
            }
        }
    }

    #[test]
    fn shadowed_names_get_distinct_slots() {
        let module = lower_source("int main() { int x = 1; { int x = 2; x = 3; } return x; }");
        let f = single_function(&module);
        let names: Vec<_> = f.slots().map(|(_, s)| s.name.as_str()).collect();
        assert_eq!(names, vec!["x", "x.1"]);
    }

    #[test]
    fn comma_yields_the_right_operand() {
        let module = lower_source("int main() { int a = 0; int b = 0; return (a = 1, b = 2); }");
        let f = single_function(&module);
        let Some(Terminator::Ret { value }) = &f.block(f.entry).terminator else {
            panic!("expected return");
        };
        // the returned value is the store of 2 into b
        assert_eq!(*value, Value::ConstI32(2));
    }

    #[test]
    fn every_block_has_exactly_one_terminator() {
        let module = lower_source(
            "int main() { int s = 0; for (int i = 0; i < 10; i = i + 1) { if (i == 3) continue; if (i == 7) break; s = s + i; } while (s > 100) s = s - 1; do s = s + 0; while (0); return s; }",
        );
        let f = single_function(&module);
        assert_all_blocks_terminated(f);
    }
}
