//! Single-pass lexer over preprocessed source text.
//!
//! Lookahead never exceeds one character, except for `.`-led numbers and
//! the `<<=`/`>>=` punctuators which need two. Lexing is never fatal: bad
//! input produces a diagnostic plus a recoverable token so the parser can
//! keep going.

use crate::diagnostics::Diagnostics;
use crate::source::SourceLocation;
use crate::syntax::token::{Token, TokenKind};

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            src: input.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> u8 {
        if self.eof() {
            0
        } else {
            self.src[self.pos]
        }
    }

    fn peek2(&self) -> u8 {
        if self.pos + 1 >= self.src.len() {
            0
        } else {
            self.src[self.pos + 1]
        }
    }

    fn bump(&mut self) -> u8 {
        if self.eof() {
            return 0;
        }
        let c = self.src[self.pos];
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn here(&self) -> SourceLocation {
        SourceLocation {
            offset: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.bump();
                }
                b'/' if self.peek2() == b'/' => {
                    while !self.eof() && self.peek() != b'\n' {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// The next token; returns an `Eof` sentinel at end of input.
    pub fn next(&mut self, diags: &mut Diagnostics) -> Token {
        loop {
            self.skip_trivia();
            let loc = self.here();

            if self.eof() {
                return Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    loc,
                };
            }

            let c = self.peek();
            if c.is_ascii_alphabetic() || c == b'_' {
                return self.lex_identifier_or_keyword();
            }
            if c.is_ascii_digit() {
                return self.lex_number();
            }
            if c == b'.' && self.peek2().is_ascii_digit() {
                return self.lex_number();
            }
            if c == b'"' {
                return self.lex_string_literal(diags);
            }
            if c == b'\'' {
                return self.lex_char_literal(diags);
            }

            if let Some(tok) = self.lex_punctuator(loc) {
                return tok;
            }

            diags.error(loc, format!("unexpected character: '{}'", c as char));
            self.bump();
        }
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        let loc = self.here();
        let start = self.pos;
        while !self.eof() {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .unwrap_or_default()
            .to_string();

        let kind = match text.as_str() {
            "char" => TokenKind::KwChar,
            "short" => TokenKind::KwShort,
            "int" => TokenKind::KwInt,
            "long" => TokenKind::KwLong,
            "unsigned" => TokenKind::KwUnsigned,
            "float" => TokenKind::KwFloat,
            "double" => TokenKind::KwDouble,
            "void" => TokenKind::KwVoid,
            "struct" => TokenKind::KwStruct,
            "enum" => TokenKind::KwEnum,
            "typedef" => TokenKind::KwTypedef,
            "sizeof" => TokenKind::KwSizeof,
            "return" => TokenKind::KwReturn,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "while" => TokenKind::KwWhile,
            "for" => TokenKind::KwFor,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            "do" => TokenKind::KwDo,
            "switch" => TokenKind::KwSwitch,
            "case" => TokenKind::KwCase,
            "default" => TokenKind::KwDefault,
            // NULL is supplied by the front end itself; it reads as integer zero.
            "NULL" => {
                return Token {
                    kind: TokenKind::IntegerLiteral,
                    text: "0".to_string(),
                    loc,
                }
            }
            _ => TokenKind::Identifier,
        };

        Token { kind, text, loc }
    }

    fn lex_number(&mut self) -> Token {
        let loc = self.here();
        let mut text = String::new();
        let mut is_float = false;

        if self.peek() == b'.' {
            is_float = true;
            text.push(self.bump() as char);
            while self.peek().is_ascii_digit() {
                text.push(self.bump() as char);
            }
        } else {
            while self.peek().is_ascii_digit() {
                text.push(self.bump() as char);
            }
            if self.peek() == b'.' {
                is_float = true;
                text.push(self.bump() as char);
                while self.peek().is_ascii_digit() {
                    text.push(self.bump() as char);
                }
            }
        }

        if self.peek() == b'e' || self.peek() == b'E' {
            is_float = true;
            text.push(self.bump() as char);
            if self.peek() == b'+' || self.peek() == b'-' {
                text.push(self.bump() as char);
            }
            while self.peek().is_ascii_digit() {
                text.push(self.bump() as char);
            }
        }

        if self.peek() == b'f' || self.peek() == b'F' {
            is_float = true;
            text.push(self.bump() as char);
        }

        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntegerLiteral
        };
        Token { kind, text, loc }
    }

    fn lex_escape_char(&mut self, loc: SourceLocation, diags: &mut Diagnostics) -> Option<u8> {
        if self.eof() {
            diags.error(loc, "unterminated escape sequence");
            return None;
        }
        let c = self.bump();
        match c {
            b'n' => Some(b'\n'),
            b't' => Some(b'\t'),
            b'r' => Some(b'\r'),
            b'0' => Some(0),
            b'\\' => Some(b'\\'),
            b'\'' => Some(b'\''),
            b'"' => Some(b'"'),
            _ => {
                diags.error(
                    loc,
                    format!("unsupported escape sequence: \\{}", c as char),
                );
                None
            }
        }
    }

    fn lex_string_literal(&mut self, diags: &mut Diagnostics) -> Token {
        let loc = self.here();
        let mut value = String::new();
        self.bump(); // opening "
        loop {
            if self.eof() {
                diags.error(loc, "unterminated string literal");
                break;
            }
            let c = self.bump();
            if c == b'"' {
                break;
            }
            if c == b'\\' {
                if let Some(esc) = self.lex_escape_char(loc, diags) {
                    value.push(esc as char);
                }
                continue;
            }
            if c == b'\n' {
                diags.error(loc, "unterminated string literal");
                break;
            }
            value.push(c as char);
        }
        Token {
            kind: TokenKind::StringLiteral,
            text: value,
            loc,
        }
    }

    /// A character literal becomes an integer literal carrying the
    /// character's numeric value.
    fn lex_char_literal(&mut self, diags: &mut Diagnostics) -> Token {
        let loc = self.here();
        self.bump(); // opening '
        if self.eof() {
            diags.error(loc, "unterminated char literal");
            return Token {
                kind: TokenKind::IntegerLiteral,
                text: "0".to_string(),
                loc,
            };
        }
        let mut value = 0u8;
        let c = self.bump();
        if c == b'\\' {
            value = self.lex_escape_char(loc, diags).unwrap_or(0);
        } else if c == b'\'' || c == b'\n' {
            diags.error(loc, "empty char literal");
        } else {
            value = c;
        }
        if self.eof() || self.bump() != b'\'' {
            diags.error(loc, "unterminated char literal");
        }
        Token {
            kind: TokenKind::IntegerLiteral,
            text: value.to_string(),
            loc,
        }
    }

    fn lex_punctuator(&mut self, loc: SourceLocation) -> Option<Token> {
        let tok = |kind, text: &str| {
            Some(Token {
                kind,
                text: text.to_string(),
                loc,
            })
        };

        match self.peek() {
            b'(' => {
                self.bump();
                tok(TokenKind::LParen, "(")
            }
            b')' => {
                self.bump();
                tok(TokenKind::RParen, ")")
            }
            b'{' => {
                self.bump();
                tok(TokenKind::LBrace, "{")
            }
            b'}' => {
                self.bump();
                tok(TokenKind::RBrace, "}")
            }
            b'[' => {
                self.bump();
                tok(TokenKind::LBracket, "[")
            }
            b']' => {
                self.bump();
                tok(TokenKind::RBracket, "]")
            }
            b';' => {
                self.bump();
                tok(TokenKind::Semicolon, ";")
            }
            b':' => {
                self.bump();
                tok(TokenKind::Colon, ":")
            }
            b',' => {
                self.bump();
                tok(TokenKind::Comma, ",")
            }
            b'.' => {
                self.bump();
                tok(TokenKind::Dot, ".")
            }
            b'?' => {
                self.bump();
                tok(TokenKind::Question, "?")
            }
            b'~' => {
                self.bump();
                tok(TokenKind::Tilde, "~")
            }
            b'+' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::PlusAssign, "+=");
                }
                if self.peek() == b'+' {
                    self.bump();
                    return tok(TokenKind::PlusPlus, "++");
                }
                tok(TokenKind::Plus, "+")
            }
            b'-' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::MinusAssign, "-=");
                }
                if self.peek() == b'-' {
                    self.bump();
                    return tok(TokenKind::MinusMinus, "--");
                }
                if self.peek() == b'>' {
                    self.bump();
                    return tok(TokenKind::Arrow, "->");
                }
                tok(TokenKind::Minus, "-")
            }
            b'*' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::StarAssign, "*=");
                }
                tok(TokenKind::Star, "*")
            }
            b'/' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::SlashAssign, "/=");
                }
                tok(TokenKind::Slash, "/")
            }
            b'%' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::PercentAssign, "%=");
                }
                tok(TokenKind::Percent, "%")
            }
            b'&' => {
                self.bump();
                if self.peek() == b'&' {
                    self.bump();
                    return tok(TokenKind::AmpAmp, "&&");
                }
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::AmpAssign, "&=");
                }
                tok(TokenKind::Amp, "&")
            }
            b'|' => {
                self.bump();
                if self.peek() == b'|' {
                    self.bump();
                    return tok(TokenKind::PipePipe, "||");
                }
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::PipeAssign, "|=");
                }
                tok(TokenKind::Pipe, "|")
            }
            b'^' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::CaretAssign, "^=");
                }
                tok(TokenKind::Caret, "^")
            }
            b'=' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::EqualEqual, "==");
                }
                tok(TokenKind::Assign, "=")
            }
            b'!' => {
                self.bump();
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::BangEqual, "!=");
                }
                tok(TokenKind::Bang, "!")
            }
            b'<' => {
                self.bump();
                if self.peek() == b'<' {
                    self.bump();
                    if self.peek() == b'=' {
                        self.bump();
                        return tok(TokenKind::LessLessAssign, "<<=");
                    }
                    return tok(TokenKind::LessLess, "<<");
                }
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::LessEqual, "<=");
                }
                tok(TokenKind::Less, "<")
            }
            b'>' => {
                self.bump();
                if self.peek() == b'>' {
                    self.bump();
                    if self.peek() == b'=' {
                        self.bump();
                        return tok(TokenKind::GreaterGreaterAssign, ">>=");
                    }
                    return tok(TokenKind::GreaterGreater, ">>");
                }
                if self.peek() == b'=' {
                    self.bump();
                    return tok(TokenKind::GreaterEqual, ">=");
                }
                tok(TokenKind::Greater, ">")
            }
            _ => None,
        }
    }
}
