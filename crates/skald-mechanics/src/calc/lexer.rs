//! Tokens of the arithmetic grammar.

use logos::Logos;
use std::fmt;
use std::ops::Range;

use crate::error::{ExprError, ExprResult};

/// Token of the arithmetic grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal.
    Number(f64),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// A bare name; only `floor` is meaningful.
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Ident(name) => write!(f, "identifier {name}"),
        }
    }
}

#[derive(Logos, Debug)]
#[logos(skip r"[ \t\r\n]+")]
enum RawToken {
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    #[regex(r"\.[0-9]+")]
    Number,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// Lex an expression into `(Token, Span)` pairs, stopping at the first bad character.
pub fn lex(source: &str) -> ExprResult<Vec<(Token, Range<usize>)>> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let token = match result {
            Ok(RawToken::Number) => {
                let text = lexer.slice();
                let value = text.parse::<f64>().map_err(|_| ExprError::UnexpectedChar {
                    text: text.to_string(),
                    offset: span.start,
                })?;
                Token::Number(value)
            }
            Ok(RawToken::Plus) => Token::Plus,
            Ok(RawToken::Minus) => Token::Minus,
            Ok(RawToken::Star) => Token::Star,
            Ok(RawToken::Slash) => Token::Slash,
            Ok(RawToken::LParen) => Token::LParen,
            Ok(RawToken::RParen) => Token::RParen,
            Ok(RawToken::Ident) => Token::Ident(lexer.slice().to_string()),
            Err(()) => {
                return Err(ExprError::UnexpectedChar {
                    text: source[span.clone()].to_string(),
                    offset: span.start,
                });
            }
        };
        tokens.push((token, span));
    }
    Ok(tokens)
}
