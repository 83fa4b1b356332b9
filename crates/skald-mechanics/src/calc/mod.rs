//! Restricted arithmetic for rules math.
//!
//! Expressions may use numbers, `+ - * /`, parentheses, unary signs and
//! `floor(...)`. There are no variables and no other functions, so
//! evaluating untrusted input cannot do anything but compute a number.

pub mod lexer;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{ExprError, ExprResult};
use lexer::{Token, lex};

/// Longest accepted expression, in characters.
pub const MAX_EXPR_LEN: usize = 256;

/// Deepest accepted nesting of parentheses and unary signs.
pub const MAX_DEPTH: usize = 64;

/// Evaluate an arithmetic expression.
pub fn eval_expr(expression: &str) -> ExprResult<f64> {
    let len = expression.chars().count();
    if len > MAX_EXPR_LEN {
        return Err(ExprError::TooLong {
            len,
            max: MAX_EXPR_LEN,
        });
    }
    let tokens = lex(expression)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: expression.len(),
    };
    let value = parser.expr()?;
    if let Some((token, span)) = parser.tokens.get(parser.pos) {
        return Err(ExprError::UnexpectedToken {
            found: token.to_string(),
            offset: span.start,
        });
    }
    if !value.is_finite() {
        return Err(ExprError::NotFinite);
    }
    tracing::debug!(expression, value, "evaluated expression");
    Ok(value)
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, Range<usize>)> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn expect(&mut self, wanted: &Token) -> ExprResult<()> {
        match self.advance() {
            Some((token, _)) if &token == wanted => Ok(()),
            Some((token, span)) => Err(ExprError::UnexpectedToken {
                found: token.to_string(),
                offset: span.start,
            }),
            None => Err(self.unexpected_end()),
        }
    }

    fn unexpected_end(&self) -> ExprError {
        ExprError::UnexpectedToken {
            found: "end of expression".to_string(),
            offset: self.end,
        }
    }

    fn enter(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn expr(&mut self) -> ExprResult<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> ExprResult<f64> {
        let mut value = self.unary()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Token::Slash => {
                    self.pos += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> ExprResult<f64> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.enter()?;
                let value = -self.unary()?;
                self.depth -= 1;
                Ok(value)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.enter()?;
                let value = self.unary()?;
                self.depth -= 1;
                Ok(value)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> ExprResult<f64> {
        let Some((token, span)) = self.advance() else {
            return Err(self.unexpected_end());
        };
        match token {
            Token::Number(n) => Ok(n),
            Token::LParen => self.group(),
            Token::Ident(name) if name.eq_ignore_ascii_case("floor") => {
                self.expect(&Token::LParen)?;
                Ok(self.group()?.floor())
            }
            Token::Ident(name) => Err(ExprError::UnknownIdentifier(name)),
            other => Err(ExprError::UnexpectedToken {
                found: other.to_string(),
                offset: span.start,
            }),
        }
    }

    /// The rest of a parenthesized group, after its opening parenthesis.
    fn group(&mut self) -> ExprResult<f64> {
        self.enter()?;
        let value = self.expr()?;
        self.expect(&Token::RParen)?;
        self.depth -= 1;
        Ok(value)
    }
}

/// A comparison operator for threshold checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `==`
    #[serde(rename = "==")]
    Eq,
}

impl Comparator {
    /// Apply the comparison.
    pub fn compare(self, value: f64, target: f64) -> bool {
        match self {
            Self::Ge => value >= target,
            Self::Gt => value > target,
            Self::Le => value <= target,
            Self::Lt => value < target,
            Self::Eq => value == target,
        }
    }

    /// The operator's symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
            Self::Eq => "==",
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for Comparator {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">=" => Ok(Self::Ge),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            "<" => Ok(Self::Lt),
            "==" => Ok(Self::Eq),
            other => Err(ExprError::Comparator(other.to_string())),
        }
    }
}

/// Compare `value` against `target`.
pub fn check_threshold(value: f64, comparator: Comparator, target: f64) -> bool {
    comparator.compare(value, target)
}

/// Ability modifier: `floor((attribute - 10) / 2)`.
pub fn compute_modifier(attribute: i64) -> i64 {
    attribute.saturating_sub(10).div_euclid(2)
}

/// Sum damage parts plus a flat bonus. The total may be negative.
pub fn sum_damage(parts: &[i64], bonus: i64) -> i64 {
    parts.iter().fold(bonus, |acc, part| acc.saturating_add(*part))
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(eval_expr("2 + 3 * 4"), Ok(14.0));
        assert_eq!(eval_expr("(2 + 3) * 4"), Ok(20.0));
        assert_eq!(eval_expr("10 - 4 - 3"), Ok(3.0));
        assert_eq!(eval_expr("8 / 4 / 2"), Ok(1.0));
        assert_eq!(eval_expr("7 / 2"), Ok(3.5));
    }

    #[test]
    fn unary_signs_and_floor() {
        assert_eq!(eval_expr("-3 + +5"), Ok(2.0));
        assert_eq!(eval_expr("--4"), Ok(4.0));
        assert_eq!(eval_expr("floor((8 - 10) / 2)"), Ok(-1.0));
        assert_eq!(eval_expr("floor(7 / 2) * 2"), Ok(6.0));
        assert_eq!(eval_expr("FLOOR(1.5)"), Ok(1.0));
    }

    #[test]
    fn rejects_unsafe_or_malformed_input() {
        assert_eq!(eval_expr("1 / 0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval_expr("   "), Err(ExprError::Empty));
        assert_eq!(eval_expr("abs(3)"), Err(ExprError::UnknownIdentifier("abs".into())));
        assert!(matches!(eval_expr("open(1)"), Err(ExprError::UnknownIdentifier(_))));
        assert!(matches!(eval_expr("2 +"), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(eval_expr("(1 + 2"), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(eval_expr("1 2"), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(eval_expr("2 ** 3"), Err(ExprError::UnexpectedToken { .. })));
    }

    #[test]
    fn rejects_oversize_and_deep_input() {
        let long = "1+".repeat(200) + "1";
        assert!(matches!(eval_expr(&long), Err(ExprError::TooLong { .. })));
        let deep = format!("{}1{}", "(".repeat(65), ")".repeat(65));
        assert_eq!(eval_expr(&deep), Err(ExprError::TooDeep(MAX_DEPTH)));
        let ok = format!("{}1{}", "(".repeat(60), ")".repeat(60));
        assert_eq!(eval_expr(&ok), Ok(1.0));
    }

    #[test]
    fn thresholds() {
        assert!(check_threshold(15.0, Comparator::Ge, 15.0));
        assert!(!check_threshold(14.0, Comparator::Ge, 15.0));
        assert!(check_threshold(3.0, Comparator::Lt, 4.0));
        assert!(check_threshold(4.0, Comparator::Eq, 4.0));
        assert_eq!(">=".parse::<Comparator>(), Ok(Comparator::Ge));
        assert!("=>".parse::<Comparator>().is_err());
    }

    #[test]
    fn comparator_serde_uses_symbols() {
        let c: Comparator = serde_json::from_str("\"<=\"").unwrap();
        assert_eq!(c, Comparator::Le);
        assert_eq!(serde_json::to_string(&Comparator::Gt).unwrap(), "\">\"");
    }

    #[test]
    fn modifiers() {
        assert_eq!(compute_modifier(16), 3);
        assert_eq!(compute_modifier(8), -1);
        assert_eq!(compute_modifier(10), 0);
        assert_eq!(compute_modifier(9), -1);
        assert_eq!(compute_modifier(1), -5);
    }

    #[test]
    fn damage_sums_are_not_clamped() {
        assert_eq!(sum_damage(&[4, 5], 3), 12);
        assert_eq!(sum_damage(&[], 0), 0);
        assert_eq!(sum_damage(&[1], -4), -3);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(-1.0), "-1");
        assert_eq!(format_number(3.5), "3.5");
    }

    proptest! {
        #[test]
        fn modifier_matches_floor_formula(attr in -100i64..200) {
            let expected = ((attr - 10) as f64 / 2.0).floor() as i64;
            prop_assert_eq!(compute_modifier(attr), expected);
        }
    }
}
