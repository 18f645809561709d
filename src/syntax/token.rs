//! Token kinds and the token value produced by the lexer.

use crate::source::SourceLocation;

/// Every token class the lexer can produce. Keywords are recognized only
/// after an identifier has been scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,

    Identifier,
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,

    KwChar,
    KwShort,
    KwInt,
    KwLong,
    KwUnsigned,
    KwFloat,
    KwDouble,
    KwVoid,
    KwStruct,
    KwEnum,
    KwTypedef,
    KwSizeof,
    KwReturn,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwBreak,
    KwContinue,
    KwDo,
    KwSwitch,
    KwCase,
    KwDefault,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    PlusPlus,
    MinusMinus,
    Arrow,

    Amp,
    AmpAmp,
    AmpAssign,
    Pipe,
    PipePipe,
    PipeAssign,
    Caret,
    CaretAssign,
    Tilde,
    Bang,

    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    LessLess,
    LessLessAssign,
    Greater,
    GreaterEqual,
    GreaterGreater,
    GreaterGreaterAssign,
}

/// A lexed token: kind, the text it was scanned from, and where it starts.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub loc: SourceLocation,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}
