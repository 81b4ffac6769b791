//! Token catalog for M.
//!
//! A fixed, closed set of token kinds plus whatever literal text the lexer
//! sliced out for it (identifiers, numbers, strings).

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Illegal,
    Eof,

    Ident,
    Int,
    Str,

    Assign,
    Plus,
    Minus,
    Bang,
    Asterisk,
    Slash,

    Lt,
    Gt,
    Eq,
    NotEq,

    Comma,
    Semicolon,
    Colon,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Function,
    Let,
    True,
    False,
    If,
    Else,
    Return,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>) -> Self {
        Self {
            kind,
            literal: literal.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.literal)
    }
}

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("fn", TokenKind::Function);
    m.insert("let", TokenKind::Let);
    m.insert("true", TokenKind::True);
    m.insert("false", TokenKind::False);
    m.insert("if", TokenKind::If);
    m.insert("else", TokenKind::Else);
    m.insert("return", TokenKind::Return);
    m
});

/// Classify an identifier-shaped slice as a reserved word or a plain ident.
pub fn lookup_ident(ident: &str) -> TokenKind {
    *KEYWORDS.get(ident).unwrap_or(&TokenKind::Ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_resolve() {
        assert_eq!(lookup_ident("fn"), TokenKind::Function);
        assert_eq!(lookup_ident("let"), TokenKind::Let);
        assert_eq!(lookup_ident("return"), TokenKind::Return);
    }

    #[test]
    fn plain_identifier_is_ident() {
        assert_eq!(lookup_ident("foobar"), TokenKind::Ident);
    }
}
