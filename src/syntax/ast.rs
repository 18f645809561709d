//! The abstract syntax tree.
//!
//! Nodes are tagged sums so that every consumer match is checked for
//! exhaustiveness. All nodes are immutable after construction and carry the
//! location of the token that introduced them inside the preprocessed
//! buffer.

use crate::source::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+x` - value-preserving
    Plus,
    /// `-x`
    Neg,
    /// `!x`
    LogicalNot,
    /// `~x`
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    LogicalAnd,
    LogicalOr,
    /// The comma operator: evaluate left, discard, yield right.
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral {
        value: i64,
        loc: SourceLocation,
    },
    VarRef {
        name: String,
        loc: SourceLocation,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        loc: SourceLocation,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        loc: SourceLocation,
    },
    /// `name = value`; the left-hand side is always a variable reference,
    /// enforced at parse time.
    Assign {
        name: String,
        name_loc: SourceLocation,
        value: Box<Expr>,
        loc: SourceLocation,
    },
}

impl Expr {
    pub fn loc(&self) -> SourceLocation {
        match self {
            Expr::IntLiteral { loc, .. }
            | Expr::VarRef { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Assign { loc, .. } => *loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `int name [= init] ;`
    Decl {
        name: String,
        name_loc: SourceLocation,
        init: Option<Expr>,
        loc: SourceLocation,
    },
    /// `name = value ;`
    Assign {
        name: String,
        name_loc: SourceLocation,
        value: Expr,
        loc: SourceLocation,
    },
    Expr {
        expr: Expr,
        loc: SourceLocation,
    },
    /// `{ stmt* }` - opens a lexical scope.
    Block {
        stmts: Vec<Stmt>,
        loc: SourceLocation,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        loc: SourceLocation,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        loc: SourceLocation,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        loc: SourceLocation,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        loc: SourceLocation,
    },
    Break {
        loc: SourceLocation,
    },
    Continue {
        loc: SourceLocation,
    },
    Return {
        value: Expr,
        loc: SourceLocation,
    },
    Empty {
        loc: SourceLocation,
    },
}

/// The root produced from one source file after preprocessing: a single
/// `int`-returning function and its body.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub func_name: String,
    pub body: Vec<Stmt>,
}
