//! The typed intermediate representation handed to the back end.
//!
//! A module owns functions; a function owns an arena of basic blocks and an
//! arena of instructions, both addressed by stable ids. Branch edges are
//! stored as block ids rather than pointers, so the control-flow graph may
//! contain cycles while the ownership graph stays acyclic.
//!
//! Every completed block ends in exactly one terminator and has no
//! terminator anywhere else; [`Function::set_terminator`] enforces this at
//! construction time.
//!
//! All scalar values are 32-bit signed integers. Comparisons and branch
//! predicates are 1-bit and get zero-extended back to 32 bits at expression
//! boundaries. Named stack slots live in [`Function::slots`]; the printer
//! renders them as allocas at the top of the entry block.

pub mod lower;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    I1,
    I32,
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::I1 => write!(f, "i1"),
            Ty::I32 => write!(f, "i32"),
        }
    }
}

/// An operand: a constant or the result of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    ConstI32(i32),
    ConstBool(bool),
    Inst(InstId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Sdiv,
}

impl BinOp {
    fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Sdiv => "sdiv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpPred {
    Eq,
    Ne,
    Slt,
    Sgt,
    Sle,
    Sge,
}

impl IcmpPred {
    fn name(self) -> &'static str {
        match self {
            IcmpPred::Eq => "eq",
            IcmpPred::Ne => "ne",
            IcmpPred::Slt => "slt",
            IcmpPred::Sgt => "sgt",
            IcmpPred::Sle => "sle",
            IcmpPred::Sge => "sge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    /// Two-operand i32 arithmetic.
    Binary { op: BinOp, lhs: Value, rhs: Value },
    /// i32 negation.
    Neg(Value),
    /// i32 bitwise complement.
    Not(Value),
    /// i32 comparison producing an i1.
    Icmp {
        pred: IcmpPred,
        lhs: Value,
        rhs: Value,
    },
    /// Zero-extend an i1 to i32.
    Zext(Value),
    /// Read a named local slot.
    Load { slot: SlotId },
    /// Write a named local slot; produces no value.
    Store { slot: SlotId, value: Value },
    /// Select a value by predecessor block; one incoming per predecessor.
    Phi {
        ty: Ty,
        incomings: Vec<(Value, BlockId)>,
    },
}

impl InstKind {
    /// Whether the instruction produces a value worth naming.
    pub fn has_result(&self) -> bool {
        !matches!(self, InstKind::Store { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub id: InstId,
    pub kind: InstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br {
        target: BlockId,
    },
    CondBr {
        cond: Value,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Ret {
        value: Value,
    },
}

impl Terminator {
    /// Successor blocks of this terminator, in edge order.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br { target } => vec![*target],
            Terminator::CondBr {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            Terminator::Ret { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub label: String,
    pub insts: Vec<InstId>,
    pub terminator: Option<Terminator>,
}

/// A named local stack slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub entry: BlockId,
    blocks: Vec<Block>,
    insts: Vec<Inst>,
    slots: Vec<Slot>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let mut f = Self {
            name: name.into(),
            entry: BlockId(0),
            blocks: Vec::new(),
            insts: Vec::new(),
            slots: Vec::new(),
        };
        f.entry = f.add_block("entry");
        f
    }

    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            label: label.into(),
            insts: Vec::new(),
            terminator: None,
        });
        id
    }

    pub fn add_slot(&mut self, name: impl Into<String>) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Slot { name: name.into() });
        id
    }

    /// Append an instruction to a block. The block must not be terminated.
    pub fn append(&mut self, block: BlockId, kind: InstKind) -> InstId {
        assert!(
            self.blocks[block.0].terminator.is_none(),
            "append to terminated block '{}'",
            self.blocks[block.0].label
        );
        let id = InstId(self.insts.len());
        self.insts.push(Inst { id, kind });
        self.blocks[block.0].insts.push(id);
        id
    }

    /// Terminate a block. Terminating twice is an internal fault.
    pub fn set_terminator(&mut self, block: BlockId, term: Terminator) {
        let b = &mut self.blocks[block.0];
        assert!(
            b.terminator.is_none(),
            "block '{}' already has a terminator",
            b.label
        );
        b.terminator = Some(term);
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.blocks[block.0].terminator.is_some()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter().enumerate().map(|(i, b)| (BlockId(i), b))
    }

    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.0]
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.0]
    }

    pub fn slots(&self) -> impl Iterator<Item = (SlotId, &Slot)> {
        self.slots.iter().enumerate().map(|(i, s)| (SlotId(i), s))
    }

    /// Predecessors of `target`, in block order.
    pub fn predecessors(&self, target: BlockId) -> Vec<BlockId> {
        self.blocks()
            .filter(|(_, b)| {
                b.terminator
                    .as_ref()
                    .map_or(false, |t| t.successors().contains(&target))
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn fmt_value(&self, v: Value) -> String {
        match v {
            Value::ConstI32(c) => c.to_string(),
            Value::ConstBool(b) => b.to_string(),
            Value::Inst(id) => format!("%{}", id.0),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "define i32 @{}() {{", self.name)?;
        for (id, block) in self.blocks() {
            writeln!(f, "{}:", block.label)?;
            if id == self.entry {
                for (_, slot) in self.slots() {
                    writeln!(f, "  %{} = alloca i32", slot.name)?;
                }
            }
            for inst_id in &block.insts {
                let inst = self.inst(*inst_id);
                match &inst.kind {
                    InstKind::Binary { op, lhs, rhs } => writeln!(
                        f,
                        "  %{} = {} i32 {}, {}",
                        inst.id.0,
                        op.name(),
                        self.fmt_value(*lhs),
                        self.fmt_value(*rhs)
                    )?,
                    InstKind::Neg(v) => writeln!(
                        f,
                        "  %{} = sub i32 0, {}",
                        inst.id.0,
                        self.fmt_value(*v)
                    )?,
                    InstKind::Not(v) => writeln!(
                        f,
                        "  %{} = xor i32 {}, -1",
                        inst.id.0,
                        self.fmt_value(*v)
                    )?,
                    InstKind::Icmp { pred, lhs, rhs } => writeln!(
                        f,
                        "  %{} = icmp {} i32 {}, {}",
                        inst.id.0,
                        pred.name(),
                        self.fmt_value(*lhs),
                        self.fmt_value(*rhs)
                    )?,
                    InstKind::Zext(v) => writeln!(
                        f,
                        "  %{} = zext i1 {} to i32",
                        inst.id.0,
                        self.fmt_value(*v)
                    )?,
                    InstKind::Load { slot } => writeln!(
                        f,
                        "  %{} = load i32, ptr %{}",
                        inst.id.0,
                        self.slot(*slot).name
                    )?,
                    InstKind::Store { slot, value } => writeln!(
                        f,
                        "  store i32 {}, ptr %{}",
                        self.fmt_value(*value),
                        self.slot(*slot).name
                    )?,
                    InstKind::Phi { ty, incomings } => {
                        let joined = incomings
                            .iter()
                            .map(|(v, b)| {
                                format!("[ {}, %{} ]", self.fmt_value(*v), self.block(*b).label)
                            })
                            .collect::<Vec<_>>()
                            .join(", ");
                        writeln!(f, "  %{} = phi {} {}", inst.id.0, ty, joined)?
                    }
                }
            }
            match &block.terminator {
                Some(Terminator::Br { target }) => {
                    writeln!(f, "  br label %{}", self.block(*target).label)?
                }
                Some(Terminator::CondBr {
                    cond,
                    then_dest,
                    else_dest,
                }) => writeln!(
                    f,
                    "  br i1 {}, label %{}, label %{}",
                    self.fmt_value(*cond),
                    self.block(*then_dest).label,
                    self.block(*else_dest).label
                )?,
                Some(Terminator::Ret { value }) => {
                    writeln!(f, "  ret i32 {}", self.fmt_value(*value))?
                }
                None => writeln!(f, "  ; <unterminated>")?,
            }
        }
        writeln!(f, "}}")
    }
}

/// A compiled module: named, with one externally linked function per
/// translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleIr {
    pub name: String,
    pub functions: Vec<Function>,
}

impl ModuleIr {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for ModuleIr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module '{}'", self.name)?;
        for func in &self.functions {
            writeln!(f)?;
            fmt::Display::fmt(func, f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "already has a terminator")]
    fn double_termination_is_a_fault() {
        let mut f = Function::new("t");
        let entry = f.entry;
        f.set_terminator(
            entry,
            Terminator::Ret {
                value: Value::ConstI32(0),
            },
        );
        f.set_terminator(
            entry,
            Terminator::Ret {
                value: Value::ConstI32(1),
            },
        );
    }

    #[test]
    #[should_panic(expected = "append to terminated block")]
    fn append_after_terminator_is_a_fault() {
        let mut f = Function::new("t");
        let entry = f.entry;
        f.set_terminator(
            entry,
            Terminator::Ret {
                value: Value::ConstI32(0),
            },
        );
        f.append(
            entry,
            InstKind::Load {
                slot: SlotId(0),
            },
        );
    }

    #[test]
    fn predecessors_follow_branch_edges() {
        let mut f = Function::new("t");
        let entry = f.entry;
        let a = f.add_block("a");
        let b = f.add_block("b");
        f.set_terminator(
            entry,
            Terminator::CondBr {
                cond: Value::ConstBool(true),
                then_dest: a,
                else_dest: b,
            },
        );
        f.set_terminator(a, Terminator::Br { target: b });
        f.set_terminator(
            b,
            Terminator::Ret {
                value: Value::ConstI32(0),
            },
        );
        assert_eq!(f.predecessors(b), vec![entry, a]);
        assert_eq!(f.predecessors(entry), vec![]);
    }

    #[test]
    fn printer_produces_block_labels_and_ret() {
        let mut f = Function::new("main");
        let entry = f.entry;
        let x = f.add_slot("x");
        f.append(
            entry,
            InstKind::Store {
                slot: x,
                value: Value::ConstI32(3),
            },
        );
        let l = f.append(entry, InstKind::Load { slot: x });
        f.set_terminator(
            entry,
            Terminator::Ret {
                value: Value::Inst(l),
            },
        );
        let text = f.to_string();
        assert!(text.contains("define i32 @main()"));
        assert!(text.contains("entry:"));
        assert!(text.contains("%x = alloca i32"));
        assert!(text.contains("store i32 3, ptr %x"));
        assert!(text.contains("ret i32 %1"));
    }
}
