//! Recursive-descent parser over the token stream.
//!
//! The expression grammar is layered, highest precedence innermost:
//!
//! ```text
//! expr            := assignment ( ',' assignment )*    // left-assoc comma
//! assignment      := logical_or ( '=' assignment )?    // right-assoc
//! logical_or      := logical_and ( '||' logical_and )*
//! logical_and     := equality ( '&&' equality )*
//! equality        := relational ( ('==' | '!=') relational )*
//! relational      := additive ( ('<' | '<=' | '>' | '>=') additive )*
//! additive        := multiplicative ( ('+' | '-') multiplicative )*
//! multiplicative  := unary ( ('*' | '/') unary )*
//! unary           := ('+' | '-' | '!' | '~') unary | primary
//! primary         := integer_literal | identifier | '(' expr ')'
//! ```
//!
//! Each parse function reports one focused diagnostic at the first
//! unexpected token and returns `None`; callers propagate with `?`.

use crate::diagnostics::Diagnostics;
use crate::syntax::ast::{BinaryOp, Expr, Stmt, TranslationUnit, UnaryOp};
use crate::syntax::lexer::Lexer;
use crate::syntax::token::{Token, TokenKind};

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    diags: &'a mut Diagnostics,
    cur: Token,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>, diags: &'a mut Diagnostics) -> Self {
        let cur = lexer.next(diags);
        Self { lexer, diags, cur }
    }

    fn advance(&mut self) {
        self.cur = self.lexer.next(self.diags);
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.cur.kind == kind {
            return true;
        }
        self.diags
            .error(self.cur.loc, format!("expected {}", what));
        false
    }

    /// `int <name>() { <stmts> }`
    pub fn parse(&mut self) -> Option<TranslationUnit> {
        if !self.expect(TokenKind::KwInt, "'int'") {
            return None;
        }
        self.advance();

        if !self.expect(TokenKind::Identifier, "identifier") {
            return None;
        }
        let func_name = self.cur.text.clone();
        self.advance();

        if !self.expect(TokenKind::LParen, "'('") {
            return None;
        }
        self.advance();
        if !self.expect(TokenKind::RParen, "')'") {
            return None;
        }
        self.advance();

        if !self.expect(TokenKind::LBrace, "'{'") {
            return None;
        }
        self.advance();

        let mut body = Vec::new();
        while self.cur.kind != TokenKind::RBrace && self.cur.kind != TokenKind::Eof {
            body.push(self.parse_stmt()?);
        }

        if !self.expect(TokenKind::RBrace, "'}'") {
            return None;
        }
        self.advance();

        Some(TranslationUnit { func_name, body })
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.cur.kind {
            TokenKind::KwInt => self.parse_decl_stmt(),
            TokenKind::KwReturn => self.parse_return_stmt(),
            TokenKind::KwIf => self.parse_if_stmt(),
            TokenKind::KwWhile => self.parse_while_stmt(),
            TokenKind::KwDo => self.parse_do_while_stmt(),
            TokenKind::KwFor => self.parse_for_stmt(),
            TokenKind::KwBreak => self.parse_break_stmt(),
            TokenKind::KwContinue => self.parse_continue_stmt(),
            TokenKind::LBrace => self.parse_block_stmt(),
            TokenKind::Identifier => self.parse_assign_stmt(),
            TokenKind::Semicolon => {
                let loc = self.cur.loc;
                self.advance();
                Some(Stmt::Empty { loc })
            }
            _ => {
                // expression statement: <expr> ';'
                let loc = self.cur.loc;
                let expr = self.parse_expr()?;
                if !self.expect(TokenKind::Semicolon, "';'") {
                    return None;
                }
                self.advance();
                Some(Stmt::Expr { expr, loc })
            }
        }
    }

    fn parse_block_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        if !self.expect(TokenKind::LBrace, "'{'") {
            return None;
        }
        self.advance();

        let mut stmts = Vec::new();
        while self.cur.kind != TokenKind::RBrace && self.cur.kind != TokenKind::Eof {
            stmts.push(self.parse_stmt()?);
        }

        if !self.expect(TokenKind::RBrace, "'}'") {
            return None;
        }
        self.advance();

        Some(Stmt::Block { stmts, loc })
    }

    fn parse_if_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        self.advance(); // 'if'

        if !self.expect(TokenKind::LParen, "'('") {
            return None;
        }
        self.advance();

        let cond = self.parse_expr()?;

        if !self.expect(TokenKind::RParen, "')'") {
            return None;
        }
        self.advance();

        let then_branch = Box::new(self.parse_stmt()?);

        let mut else_branch = None;
        if self.cur.kind == TokenKind::KwElse {
            self.advance();
            else_branch = Some(Box::new(self.parse_stmt()?));
        }

        Some(Stmt::If {
            cond,
            then_branch,
            else_branch,
            loc,
        })
    }

    fn parse_while_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        self.advance(); // 'while'

        if !self.expect(TokenKind::LParen, "'('") {
            return None;
        }
        self.advance();

        let cond = self.parse_expr()?;

        if !self.expect(TokenKind::RParen, "')'") {
            return None;
        }
        self.advance();

        let body = Box::new(self.parse_stmt()?);

        Some(Stmt::While { cond, body, loc })
    }

    fn parse_do_while_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        self.advance(); // 'do'

        let body = Box::new(self.parse_stmt()?);

        if !self.expect(TokenKind::KwWhile, "'while'") {
            return None;
        }
        self.advance();

        if !self.expect(TokenKind::LParen, "'('") {
            return None;
        }
        self.advance();

        let cond = self.parse_expr()?;

        if !self.expect(TokenKind::RParen, "')'") {
            return None;
        }
        self.advance();

        if !self.expect(TokenKind::Semicolon, "';'") {
            return None;
        }
        self.advance();

        Some(Stmt::DoWhile { body, cond, loc })
    }

    fn parse_for_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        self.advance(); // 'for'

        if !self.expect(TokenKind::LParen, "'('") {
            return None;
        }
        self.advance();

        // init: empty ';' | declaration | any comma-expression ';'
        let init = if self.cur.kind == TokenKind::Semicolon {
            self.advance();
            None
        } else if self.cur.kind == TokenKind::KwInt {
            Some(Box::new(self.parse_decl_stmt()?)) // consumes trailing ';'
        } else {
            let expr_loc = self.cur.loc;
            let expr = self.parse_expr()?;
            if !self.expect(TokenKind::Semicolon, "';'") {
                return None;
            }
            self.advance();
            Some(Box::new(Stmt::Expr {
                expr,
                loc: expr_loc,
            }))
        };

        // cond (optional) until ';'
        let cond = if self.cur.kind == TokenKind::Semicolon {
            self.advance();
            None
        } else {
            let c = self.parse_expr()?;
            if !self.expect(TokenKind::Semicolon, "';'") {
                return None;
            }
            self.advance();
            Some(c)
        };

        // step (optional) until ')'
        let step = if self.cur.kind == TokenKind::RParen {
            self.advance();
            None
        } else {
            let s = self.parse_expr()?;
            if !self.expect(TokenKind::RParen, "')'") {
                return None;
            }
            self.advance();
            Some(s)
        };

        let body = Box::new(self.parse_stmt()?);

        Some(Stmt::For {
            init,
            cond,
            step,
            body,
            loc,
        })
    }

    fn parse_decl_stmt(&mut self) -> Option<Stmt> {
        // int <name> ["=" expr] ";"
        let loc = self.cur.loc;
        self.advance(); // 'int'

        if !self.expect(TokenKind::Identifier, "identifier") {
            return None;
        }
        let name = self.cur.text.clone();
        let name_loc = self.cur.loc;
        self.advance();

        let mut init = None;
        if self.cur.kind == TokenKind::Assign {
            self.advance();
            init = Some(self.parse_expr()?);
        }

        if !self.expect(TokenKind::Semicolon, "';'") {
            return None;
        }
        self.advance();

        Some(Stmt::Decl {
            name,
            name_loc,
            init,
            loc,
        })
    }

    fn parse_assign_stmt(&mut self) -> Option<Stmt> {
        // <name> "=" expr ";"
        let loc = self.cur.loc;
        let name = self.cur.text.clone();
        let name_loc = self.cur.loc;
        self.advance();

        if !self.expect(TokenKind::Assign, "'='") {
            return None;
        }
        self.advance();

        let value = self.parse_expr()?;

        if !self.expect(TokenKind::Semicolon, "';'") {
            return None;
        }
        self.advance();

        Some(Stmt::Assign {
            name,
            name_loc,
            value,
            loc,
        })
    }

    fn parse_return_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        self.advance(); // 'return'

        let value = self.parse_expr()?;

        if !self.expect(TokenKind::Semicolon, "';'") {
            return None;
        }
        self.advance();

        Some(Stmt::Return { value, loc })
    }

    fn parse_break_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        self.advance(); // 'break'
        if !self.expect(TokenKind::Semicolon, "';'") {
            return None;
        }
        self.advance();
        Some(Stmt::Break { loc })
    }

    fn parse_continue_stmt(&mut self) -> Option<Stmt> {
        let loc = self.cur.loc;
        self.advance(); // 'continue'
        if !self.expect(TokenKind::Semicolon, "';'") {
            return None;
        }
        self.advance();
        Some(Stmt::Continue { loc })
    }

    /// comma-expression: assignment (',' assignment)*
    pub fn parse_expr(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_assignment()?;

        while self.cur.kind == TokenKind::Comma {
            let comma_loc = self.cur.loc;
            let loc = lhs.loc();
            self.advance();

            // a trailing comma with nothing after it is not an operand
            if matches!(
                self.cur.kind,
                TokenKind::RParen | TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
            ) {
                self.diags.error(comma_loc, "expected expression");
                return None;
            }

            let rhs = self.parse_assignment()?;
            lhs = Expr::Binary {
                op: BinaryOp::Comma,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                loc,
            };
        }

        Some(lhs)
    }

    /// Right-associative: `a = b = c` parses as `a = (b = c)`.
    fn parse_assignment(&mut self) -> Option<Expr> {
        let lhs = self.parse_logical_or()?;

        if self.cur.kind == TokenKind::Assign {
            let assign_loc = self.cur.loc;
            let Expr::VarRef {
                name,
                loc: name_loc,
            } = lhs
            else {
                self.diags.error(
                    assign_loc,
                    "expected identifier on left-hand side of assignment",
                );
                return None;
            };
            self.advance();
            let rhs = self.parse_assignment()?;
            return Some(Expr::Assign {
                name,
                name_loc,
                value: Box::new(rhs),
                loc: assign_loc,
            });
        }

        Some(lhs)
    }

    fn parse_binary_level(
        &mut self,
        op_of: fn(TokenKind) -> Option<BinaryOp>,
        next: fn(&mut Self) -> Option<Expr>,
    ) -> Option<Expr> {
        let mut lhs = next(self)?;
        while let Some(op) = op_of(self.cur.kind) {
            let loc = lhs.loc();
            self.advance();
            let rhs = next(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                loc,
            };
        }
        Some(lhs)
    }

    fn parse_logical_or(&mut self) -> Option<Expr> {
        self.parse_binary_level(
            |k| match k {
                TokenKind::PipePipe => Some(BinaryOp::LogicalOr),
                _ => None,
            },
            Self::parse_logical_and,
        )
    }

    fn parse_logical_and(&mut self) -> Option<Expr> {
        self.parse_binary_level(
            |k| match k {
                TokenKind::AmpAmp => Some(BinaryOp::LogicalAnd),
                _ => None,
            },
            Self::parse_equality,
        )
    }

    fn parse_equality(&mut self) -> Option<Expr> {
        self.parse_binary_level(
            |k| match k {
                TokenKind::EqualEqual => Some(BinaryOp::Eq),
                TokenKind::BangEqual => Some(BinaryOp::Ne),
                _ => None,
            },
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Option<Expr> {
        self.parse_binary_level(
            |k| match k {
                TokenKind::Less => Some(BinaryOp::Lt),
                TokenKind::LessEqual => Some(BinaryOp::Le),
                TokenKind::Greater => Some(BinaryOp::Gt),
                TokenKind::GreaterEqual => Some(BinaryOp::Ge),
                _ => None,
            },
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        self.parse_binary_level(
            |k| match k {
                TokenKind::Plus => Some(BinaryOp::Add),
                TokenKind::Minus => Some(BinaryOp::Sub),
                _ => None,
            },
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        self.parse_binary_level(
            |k| match k {
                TokenKind::Star => Some(BinaryOp::Mul),
                TokenKind::Slash => Some(BinaryOp::Div),
                _ => None,
            },
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let op = match self.cur.kind {
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::LogicalNot),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            let loc = self.cur.loc;
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            return Some(Expr::Unary { op, operand, loc });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.cur.kind {
            TokenKind::IntegerLiteral => {
                let loc = self.cur.loc;
                let value = match self.cur.text.parse::<i64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.diags.error(
                            loc,
                            format!("integer literal '{}' out of range", self.cur.text),
                        );
                        return None;
                    }
                };
                self.advance();
                Some(Expr::IntLiteral { value, loc })
            }
            TokenKind::Identifier => {
                let loc = self.cur.loc;
                let name = self.cur.text.clone();
                self.advance();
                Some(Expr::VarRef { name, loc })
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                if !self.expect(TokenKind::RParen, "')'") {
                    return None;
                }
                self.advance();
                Some(expr)
            }
            _ => {
                self.diags
                    .error(self.cur.loc, "expected primary expression");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_unit(src: &str) -> (Option<TranslationUnit>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tu = Parser::new(Lexer::new(src), &mut diags).parse();
        (tu, diags)
    }

    fn parse_expression(src: &str) -> (Option<Expr>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let expr = Parser::new(Lexer::new(src), &mut diags).parse_expr();
        (expr, diags)
    }

    #[test]
    fn assignment_is_right_associative() {
        let (expr, diags) = parse_expression("a = b = c");
        assert!(!diags.has_error());
        let Some(Expr::Assign { name, value, .. }) = expr else {
            panic!("expected assignment");
        };
        assert_eq!(name, "a");
        assert!(matches!(*value, Expr::Assign { .. }));
    }

    #[test]
    fn comma_is_left_associative() {
        let (expr, _) = parse_expression("a, b, c");
        let Some(Expr::Binary {
            op: BinaryOp::Comma,
            lhs,
            ..
        }) = expr
        else {
            panic!("expected comma expression");
        };
        assert!(matches!(
            *lhs,
            Expr::Binary {
                op: BinaryOp::Comma,
                ..
            }
        ));
    }

    #[test]
    fn trailing_comma_reports_expected_expression() {
        let (expr, diags) = parse_expression("a,");
        assert!(expr.is_none());
        assert!(diags.has_error());
        let d = diags.iter().next().unwrap();
        assert_eq!(d.message, "expected expression");
        assert_eq!(d.loc.col, 2);
    }

    #[test]
    fn precedence_mul_over_add() {
        let (expr, _) = parse_expression("1 + 2 * 3");
        let Some(Expr::Binary {
            op: BinaryOp::Add,
            rhs,
            ..
        }) = expr
        else {
            panic!("expected addition at the root");
        };
        assert!(matches!(
            *rhs,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn invalid_assignment_target() {
        let (expr, diags) = parse_expression("1 = 2");
        assert!(expr.is_none());
        let d = diags.iter().next().unwrap();
        assert_eq!(
            d.message,
            "expected identifier on left-hand side of assignment"
        );
    }

    #[test]
    fn parenthesized_name_is_still_a_valid_target() {
        let (expr, diags) = parse_expression("(a) = 2");
        assert!(!diags.has_error());
        assert!(matches!(expr, Some(Expr::Assign { .. })));
    }

    #[test]
    fn unary_chain() {
        let (expr, _) = parse_expression("-!~+x");
        let Some(Expr::Unary {
            op: UnaryOp::Neg, ..
        }) = expr
        else {
            panic!("expected unary minus at the root");
        };
    }

    #[test]
    fn translation_unit_shape() {
        let (tu, diags) = parse_unit("int main() { int x = 1; return x; }");
        assert!(!diags.has_error());
        let tu = tu.unwrap();
        assert_eq!(tu.func_name, "main");
        assert_eq!(tu.body.len(), 2);
    }

    #[test]
    fn else_binds_to_nearest_if() {
        let (tu, _) = parse_unit("int main() { if (1) if (2) return 1; else return 2; return 3; }");
        let tu = tu.unwrap();
        let Stmt::If {
            then_branch,
            else_branch,
            ..
        } = &tu.body[0]
        else {
            panic!("expected if");
        };
        assert!(else_branch.is_none());
        assert!(matches!(
            **then_branch,
            Stmt::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn for_accepts_declaration_and_empty_positions() {
        let (tu, diags) = parse_unit("int main() { for (int i = 0; ; ) break; return 0; }");
        assert!(!diags.has_error());
        let tu = tu.unwrap();
        let Stmt::For {
            init, cond, step, ..
        } = &tu.body[0]
        else {
            panic!("expected for");
        };
        assert!(matches!(init.as_deref(), Some(Stmt::Decl { .. })));
        assert!(cond.is_none());
        assert!(step.is_none());
    }

    #[test]
    fn for_accepts_comma_expression_init() {
        let (tu, diags) = parse_unit(
            "int main() { int i; int s; for (i = 0, s = 0; i < 3; i = i + 1) s = s + i; return s; }",
        );
        assert!(!diags.has_error());
        assert!(tu.is_some());
    }

    #[test]
    fn do_while_requires_trailing_semicolon() {
        let (tu, diags) = parse_unit("int main() { do { } while (0) return 0; }");
        assert!(tu.is_none());
        assert!(diags.has_error());
    }

    #[test]
    fn missing_semicolon_is_one_focused_error() {
        let (tu, diags) = parse_unit("int main() { return 1 }");
        assert!(tu.is_none());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.iter().next().unwrap().message, "expected ';'");
    }
}
