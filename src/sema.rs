//! Semantic checks over the AST.
//!
//! A single pass with a lexical symbol table: blocks (and `for` headers)
//! push a scope, declarations land in the innermost scope, and lookups walk
//! outward. The pass emits diagnostics only and never mutates the AST; it
//! keeps walking after an error so one run collects as much as possible.

use std::collections::HashSet;

use crate::diagnostics::Diagnostics;
use crate::syntax::ast::{Expr, Stmt, TranslationUnit};

pub struct Sema<'a> {
    diags: &'a mut Diagnostics,
    scopes: Vec<HashSet<String>>,
    loop_depth: u32,
}

impl<'a> Sema<'a> {
    pub fn new(diags: &'a mut Diagnostics) -> Self {
        Self {
            diags,
            scopes: Vec::new(),
            loop_depth: 0,
        }
    }

    /// Check one translation unit. Returns `false` when any error was
    /// recorded.
    pub fn run(&mut self, tu: &TranslationUnit) -> bool {
        self.scopes.push(HashSet::new());
        for stmt in &tu.body {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
        !self.diags.has_error()
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl {
                name,
                name_loc,
                init,
                ..
            } => {
                let innermost = self.scopes.last().expect("scope stack is never empty");
                if innermost.contains(name) {
                    self.diags
                        .error(*name_loc, format!("redefinition of '{}'", name));
                    return;
                }
                // the name being declared is not yet in scope inside its
                // own initializer
                if let Some(init) = init {
                    self.check_expr(init);
                }
                self.scopes
                    .last_mut()
                    .expect("scope stack is never empty")
                    .insert(name.clone());
            }

            Stmt::Assign {
                name,
                name_loc,
                value,
                ..
            } => {
                self.check_expr(value);
                if !self.is_declared(name) {
                    self.diags.error(
                        *name_loc,
                        format!("assignment to undeclared identifier '{}'", name),
                    );
                }
            }

            Stmt::Expr { expr, .. } => self.check_expr(expr),

            Stmt::Block { stmts, .. } => {
                self.scopes.push(HashSet::new());
                for s in stmts {
                    self.check_stmt(s);
                }
                self.scopes.pop();
            }

            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_expr(cond);
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }

            Stmt::While { cond, body, .. } => {
                self.check_expr(cond);
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
            }

            Stmt::DoWhile { body, cond, .. } => {
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.check_expr(cond);
            }

            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                // a declaration in the init position is scoped to the loop
                self.scopes.push(HashSet::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(step) = step {
                    self.check_expr(step);
                }
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.scopes.pop();
            }

            Stmt::Break { loc } => {
                if self.loop_depth == 0 {
                    self.diags
                        .error(*loc, "'break' statement not in a loop");
                }
            }

            Stmt::Continue { loc } => {
                if self.loop_depth == 0 {
                    self.diags
                        .error(*loc, "'continue' statement not in a loop");
                }
            }

            Stmt::Return { value, .. } => self.check_expr(value),

            Stmt::Empty { .. } => {}
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::IntLiteral { .. } => {}

            Expr::VarRef { name, loc } => {
                if !self.is_declared(name) {
                    self.diags
                        .error(*loc, format!("use of undeclared identifier '{}'", name));
                }
            }

            Expr::Unary { operand, .. } => self.check_expr(operand),

            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }

            Expr::Assign {
                name,
                name_loc,
                value,
                ..
            } => {
                self.check_expr(value);
                if !self.is_declared(name) {
                    self.diags.error(
                        *name_loc,
                        format!("assignment to undeclared identifier '{}'", name),
                    );
                }
            }
        }
    }
}
