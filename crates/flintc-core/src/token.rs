//! Token kinds consumed by the signature engine.
//!
//! Lexical analysis itself is out of scope (spec.md §1: "lexical analysis...
//! emits the token stream consumed by §4.2"); this enum is the minimal
//! contract the signature engine needs from whatever lexer produces it.

use serde::{Deserialize, Serialize};

/// A lexical token kind. Value-carrying kinds (identifiers and literals)
/// record their lexeme in [`Token::lexeme`] so that `stringify` can encode it;
/// all other kinds are fully determined by their variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    BoolLiteral,
    TypePrimitive,
    Keyword,
    BinaryOperator,
    UnaryOperator,
    AssignOperator,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Arrow,
    Indent,
    Newline,
    Eof,
}

impl TokenKind {
    /// Whether tokens of this kind carry a lexeme that must be recorded in
    /// the stringified form to distinguish otherwise-identical signatures
    /// (e.g. two different identifiers both stringify to `#Identifier` unless
    /// the lexeme is included).
    pub fn carries_lexeme(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
                | TokenKind::CharLiteral
                | TokenKind::BoolLiteral
                | TokenKind::TypePrimitive
                | TokenKind::Keyword
                | TokenKind::BinaryOperator
                | TokenKind::UnaryOperator
                | TokenKind::AssignOperator
        )
    }
}

/// A single lexical token: a kind, its source lexeme, and the 1-based source
/// line it appeared on (used by the signature engine's line-scoping queries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Self {
        Token { kind, lexeme: lexeme.into(), line }
    }
}
