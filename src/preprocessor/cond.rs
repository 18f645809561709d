//! Constant-expression evaluation for `#if` / `#elif`.
//!
//! Arithmetic is 64-bit signed with two's-complement wraparound on every
//! operator; division and modulo by zero yield 0. Operands are decimal
//! integer literals, `defined X` / `defined(X)`, and identifiers: an
//! object-like macro evaluates its body as an integer, while unknown or
//! function-like names evaluate to 0.

use thiserror::Error;

use crate::preprocessor::macros::{is_ident_char, is_ident_start, MacroTable};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IfExprError {
    #[error("expected expression after '#if'")]
    Empty,
    #[error("invalid #if expression")]
    Invalid,
    #[error("expected macro name in defined()")]
    ExpectedMacroName,
    #[error("unterminated defined()")]
    UnterminatedDefined,
    #[error("expected ')'")]
    ExpectedRParen,
}

/// Evaluate a `#if` expression to its truth value.
pub(super) fn eval_if_expr(expr: &str, macros: &MacroTable) -> Result<bool, IfExprError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(IfExprError::Empty);
    }
    let mut parser = ExprParser::new(trimmed, macros);
    let value = parser.parse_or()?;
    if parser.cur != ExprToken::End {
        return Err(IfExprError::Invalid);
    }
    Ok(value != 0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExprToken {
    End,
    Number(i64),
    Ident(String),
    LParen,
    RParen,
    Op(String),
}

struct ExprLexer<'a> {
    s: &'a [u8],
    i: usize,
}

impl<'a> ExprLexer<'a> {
    fn new(s: &'a str) -> Self {
        Self { s: s.as_bytes(), i: 0 }
    }

    fn next(&mut self) -> ExprToken {
        while self.i < self.s.len() && self.s[self.i].is_ascii_whitespace() {
            self.i += 1;
        }
        if self.i >= self.s.len() {
            return ExprToken::End;
        }
        let c = self.s[self.i];
        if c.is_ascii_digit() {
            let start = self.i;
            while self.i < self.s.len() && self.s[self.i].is_ascii_digit() {
                self.i += 1;
            }
            let text = std::str::from_utf8(&self.s[start..self.i]).unwrap_or("0");
            // saturating keeps pathological literals finite; arithmetic wraps
            let value = text.parse::<i64>().unwrap_or(i64::MAX);
            return ExprToken::Number(value);
        }
        if is_ident_start(c) {
            let start = self.i;
            self.i += 1;
            while self.i < self.s.len() && is_ident_char(self.s[self.i]) {
                self.i += 1;
            }
            let text = std::str::from_utf8(&self.s[start..self.i]).unwrap_or("");
            return ExprToken::Ident(text.to_string());
        }
        if c == b'(' {
            self.i += 1;
            return ExprToken::LParen;
        }
        if c == b')' {
            self.i += 1;
            return ExprToken::RParen;
        }
        if self.i + 1 < self.s.len() {
            let two = &self.s[self.i..self.i + 2];
            if matches!(
                two,
                b"&&" | b"||" | b"==" | b"!=" | b"<=" | b">=" | b"<<" | b">>"
            ) {
                self.i += 2;
                return ExprToken::Op(String::from_utf8_lossy(two).into_owned());
            }
        }
        self.i += 1;
        ExprToken::Op((c as char).to_string())
    }
}

struct ExprParser<'a> {
    lex: ExprLexer<'a>,
    macros: &'a MacroTable,
    cur: ExprToken,
}

impl<'a> ExprParser<'a> {
    fn new(s: &'a str, macros: &'a MacroTable) -> Self {
        let mut lex = ExprLexer::new(s);
        let cur = lex.next();
        Self { lex, macros, cur }
    }

    fn consume(&mut self) {
        self.cur = self.lex.next();
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(&self.cur, ExprToken::Op(o) if o == op)
    }

    /// An object-like macro body used as an operand must be a bare integer.
    fn parse_macro_body_number(&self, body: &str) -> Result<i64, IfExprError> {
        let t = body.trim();
        if t.is_empty() {
            return Ok(0);
        }
        t.parse::<i64>().map_err(|_| IfExprError::Invalid)
    }

    fn parse_primary(&mut self) -> Result<i64, IfExprError> {
        match self.cur.clone() {
            ExprToken::Number(v) => {
                self.consume();
                Ok(v)
            }
            ExprToken::Ident(name) => {
                if name == "defined" {
                    self.consume();
                    let name = if self.cur == ExprToken::LParen {
                        self.consume();
                        let ExprToken::Ident(n) = self.cur.clone() else {
                            return Err(IfExprError::ExpectedMacroName);
                        };
                        self.consume();
                        if self.cur != ExprToken::RParen {
                            return Err(IfExprError::UnterminatedDefined);
                        }
                        self.consume();
                        n
                    } else {
                        let ExprToken::Ident(n) = self.cur.clone() else {
                            return Err(IfExprError::ExpectedMacroName);
                        };
                        self.consume();
                        n
                    };
                    return Ok(i64::from(self.macros.contains_key(&name)));
                }
                self.consume();
                match self.macros.get(&name) {
                    None => Ok(0),
                    Some(def) if def.function_like => Ok(0),
                    Some(def) => self.parse_macro_body_number(&def.body),
                }
            }
            ExprToken::LParen => {
                self.consume();
                let v = self.parse_or()?;
                if self.cur != ExprToken::RParen {
                    return Err(IfExprError::ExpectedRParen);
                }
                self.consume();
                Ok(v)
            }
            _ => Err(IfExprError::Invalid),
        }
    }

    fn parse_unary(&mut self) -> Result<i64, IfExprError> {
        for op in ["!", "+", "-", "~"] {
            if self.at_op(op) {
                self.consume();
                let v = self.parse_unary()?;
                return Ok(match op {
                    "!" => i64::from(v == 0),
                    "-" => v.wrapping_neg(),
                    "~" => !v,
                    _ => v,
                });
            }
        }
        self.parse_primary()
    }

    fn parse_mul(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_unary()?;
        loop {
            let op = if self.at_op("*") {
                "*"
            } else if self.at_op("/") {
                "/"
            } else if self.at_op("%") {
                "%"
            } else {
                break;
            };
            self.consume();
            let rhs = self.parse_unary()?;
            v = match op {
                "*" => v.wrapping_mul(rhs),
                "/" => {
                    if rhs == 0 {
                        0
                    } else {
                        v.wrapping_div(rhs)
                    }
                }
                _ => {
                    if rhs == 0 {
                        0
                    } else {
                        v.wrapping_rem(rhs)
                    }
                }
            };
        }
        Ok(v)
    }

    fn parse_add(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_mul()?;
        loop {
            let negate = if self.at_op("+") {
                false
            } else if self.at_op("-") {
                true
            } else {
                break;
            };
            self.consume();
            let rhs = self.parse_mul()?;
            v = if negate {
                v.wrapping_sub(rhs)
            } else {
                v.wrapping_add(rhs)
            };
        }
        Ok(v)
    }

    fn parse_shift(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_add()?;
        loop {
            let left = if self.at_op("<<") {
                true
            } else if self.at_op(">>") {
                false
            } else {
                break;
            };
            self.consume();
            let rhs = self.parse_add()?;
            let amount = rhs as u32; // wrapping shift masks the count
            v = if left {
                v.wrapping_shl(amount)
            } else {
                v.wrapping_shr(amount)
            };
        }
        Ok(v)
    }

    fn parse_rel(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_shift()?;
        loop {
            let op = if self.at_op("<=") {
                "<="
            } else if self.at_op(">=") {
                ">="
            } else if self.at_op("<") {
                "<"
            } else if self.at_op(">") {
                ">"
            } else {
                break;
            };
            self.consume();
            let rhs = self.parse_shift()?;
            v = i64::from(match op {
                "<" => v < rhs,
                "<=" => v <= rhs,
                ">" => v > rhs,
                _ => v >= rhs,
            });
        }
        Ok(v)
    }

    fn parse_eq(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_rel()?;
        loop {
            let eq = if self.at_op("==") {
                true
            } else if self.at_op("!=") {
                false
            } else {
                break;
            };
            self.consume();
            let rhs = self.parse_rel()?;
            v = i64::from((v == rhs) == eq);
        }
        Ok(v)
    }

    fn parse_bit_and(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_eq()?;
        while self.at_op("&") {
            self.consume();
            v &= self.parse_eq()?;
        }
        Ok(v)
    }

    fn parse_bit_xor(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_bit_and()?;
        while self.at_op("^") {
            self.consume();
            v ^= self.parse_bit_and()?;
        }
        Ok(v)
    }

    fn parse_bit_or(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_bit_xor()?;
        while self.at_op("|") {
            self.consume();
            v |= self.parse_bit_xor()?;
        }
        Ok(v)
    }

    fn parse_and(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_bit_or()?;
        while self.at_op("&&") {
            self.consume();
            let rhs = self.parse_bit_or()?;
            v = i64::from(v != 0 && rhs != 0);
        }
        Ok(v)
    }

    fn parse_or(&mut self) -> Result<i64, IfExprError> {
        let mut v = self.parse_and()?;
        while self.at_op("||") {
            self.consume();
            let rhs = self.parse_and()?;
            v = i64::from(v != 0 || rhs != 0);
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::macros::MacroDef;

    fn eval(expr: &str) -> Result<bool, IfExprError> {
        eval_if_expr(expr, &MacroTable::new())
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(eval("1 + 2 * 3 == 7"), Ok(true));
        assert_eq!(eval("(1 + 2) * 3 == 9"), Ok(true));
        assert_eq!(eval("2 + 3 * 4 == 14 && (2 + 3) * 4 == 20"), Ok(true));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval("!0 && !!1 && -(-5) == 5"), Ok(true));
        assert_eq!(eval("~0 == -1"), Ok(true));
    }

    #[test]
    fn shifts_and_bitwise() {
        assert_eq!(eval("1 << 4 == 16"), Ok(true));
        assert_eq!(eval("(12 & 10) == 8"), Ok(true));
        assert_eq!(eval("(12 | 10) == 14"), Ok(true));
        assert_eq!(eval("(12 ^ 10) == 6"), Ok(true));
    }

    #[test]
    fn division_by_zero_yields_zero() {
        assert_eq!(eval("5 / 0"), Ok(false));
        assert_eq!(eval("5 % 0"), Ok(false));
    }

    #[test]
    fn overflow_wraps() {
        assert_eq!(eval("9223372036854775807 + 1 < 0"), Ok(true));
    }

    #[test]
    fn defined_forms() {
        let mut macros = MacroTable::new();
        macros.insert("FOO".to_string(), MacroDef::default());
        assert_eq!(eval_if_expr("defined FOO", &macros), Ok(true));
        assert_eq!(eval_if_expr("defined(FOO)", &macros), Ok(true));
        assert_eq!(eval_if_expr("defined(BAR)", &macros), Ok(false));
    }

    #[test]
    fn identifiers_evaluate_macro_bodies() {
        let mut macros = MacroTable::new();
        macros.insert(
            "V".to_string(),
            MacroDef {
                body: "2".to_string(),
                ..MacroDef::default()
            },
        );
        macros.insert(
            "F".to_string(),
            MacroDef {
                function_like: true,
                body: "3".to_string(),
                ..MacroDef::default()
            },
        );
        assert_eq!(eval_if_expr("V == 2", &macros), Ok(true));
        // function-like and unknown names read as zero
        assert_eq!(eval_if_expr("F == 0", &macros), Ok(true));
        assert_eq!(eval_if_expr("UNKNOWN == 0", &macros), Ok(true));
    }

    #[test]
    fn malformed_expressions() {
        assert_eq!(eval(""), Err(IfExprError::Empty));
        assert_eq!(eval("1 +"), Err(IfExprError::Invalid));
        assert_eq!(eval("(1"), Err(IfExprError::ExpectedRParen));
        assert_eq!(eval("1 2"), Err(IfExprError::Invalid));
        assert_eq!(eval("defined()"), Err(IfExprError::ExpectedMacroName));
    }
}
