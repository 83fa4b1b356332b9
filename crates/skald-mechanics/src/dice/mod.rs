//! Dice notation, die sources, and rolling.
//!
//! Notation follows the familiar `NdM+K` form. Only the standard
//! polyhedral set from d4 to d20 is accepted, with at most 20 dice per
//! roll. Rolling never fails: unusable notation falls back to `1d20` and
//! the record says so.

pub mod roller;
pub mod source;

pub use roller::{DiceRoller, RollRequest};
pub use source::{DieSource, FixedDice, SeededDice};

use serde::{Deserialize, Serialize};

use crate::error::{NotationError, NotationResult};

/// Most dice a single notation may roll.
pub const MAX_DICE: u32 = 20;

/// A supported polyhedral die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Die {
    /// Four-sided die.
    D4,
    /// Six-sided die.
    D6,
    /// Eight-sided die.
    D8,
    /// Ten-sided die.
    D10,
    /// Twelve-sided die.
    D12,
    /// Twenty-sided die.
    D20,
}

impl Die {
    /// Returns the number of sides on this die.
    pub fn sides(self) -> u32 {
        match self {
            Self::D4 => 4,
            Self::D6 => 6,
            Self::D8 => 8,
            Self::D10 => 10,
            Self::D12 => 12,
            Self::D20 => 20,
        }
    }

    /// The die with `sides` sides, if it is supported.
    pub fn from_sides(sides: u32) -> Option<Self> {
        match sides {
            4 => Some(Self::D4),
            6 => Some(Self::D6),
            8 => Some(Self::D8),
            10 => Some(Self::D10),
            12 => Some(Self::D12),
            20 => Some(Self::D20),
            _ => None,
        }
    }
}

impl From<Die> for u32 {
    fn from(die: Die) -> Self {
        die.sides()
    }
}

impl TryFrom<u32> for Die {
    type Error = NotationError;

    fn try_from(sides: u32) -> Result<Self, Self::Error> {
        Self::from_sides(sides).ok_or_else(|| NotationError::UnsupportedDie(sides.to_string()))
    }
}

impl std::fmt::Display for Die {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A parsed `NdM±K` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notation {
    /// Number of dice, `1..=20`.
    pub count: u32,
    /// The die rolled.
    pub die: Die,
    /// Flat modifier.
    pub modifier: i64,
}

impl Notation {
    /// The notation rolled when a request is unusable.
    pub const FALLBACK: Notation = Notation {
        count: 1,
        die: Die::D20,
        modifier: 0,
    };

    /// Smallest possible total.
    pub fn min_total(&self) -> i64 {
        i64::from(self.count).saturating_add(self.modifier)
    }

    /// Largest possible total.
    pub fn max_total(&self) -> i64 {
        i64::from(self.count * self.die.sides()).saturating_add(self.modifier)
    }
}

impl std::fmt::Display for Notation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.count, self.die)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

impl std::str::FromStr for Notation {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_notation(s)
    }
}

/// Parse dice notation such as `2d6+3`, `d20` or `"1D8 − 1"`.
///
/// Case, whitespace, one pair of surrounding quotes and parenthesized
/// remarks are ignored, and unicode plus and minus signs are accepted.
/// Text around the `NdM` core is tolerated; the first signed number after
/// it is the modifier.
pub fn parse_notation(text: &str) -> NotationResult<Notation> {
    let chars: Vec<char> = clean(text).chars().collect();
    if chars.is_empty() {
        return Err(NotationError::Empty);
    }
    let d_pos = (0..chars.len())
        .find(|&i| chars[i] == 'd' && chars.get(i + 1).is_some_and(char::is_ascii_digit))
        .ok_or_else(|| NotationError::Malformed(text.trim().to_string()))?;

    let count_start = chars[..d_pos]
        .iter()
        .rposition(|c| !c.is_ascii_digit())
        .map_or(0, |p| p + 1);
    let count_text: String = chars[count_start..d_pos].iter().collect();
    let sides_end = chars[d_pos + 1..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(chars.len(), |p| d_pos + 1 + p);
    let sides_text: String = chars[d_pos + 1..sides_end].iter().collect();
    let modifier = parse_modifier(&chars[sides_end..], text)?;

    let count = if count_text.is_empty() {
        1
    } else {
        count_text
            .parse::<u32>()
            .ok()
            .filter(|n| (1..=MAX_DICE).contains(n))
            .ok_or(NotationError::Count(count_text))?
    };
    let die = sides_text
        .parse::<u32>()
        .ok()
        .and_then(Die::from_sides)
        .ok_or(NotationError::UnsupportedDie(sides_text))?;

    Ok(Notation {
        count,
        die,
        modifier,
    })
}

fn clean(text: &str) -> String {
    let mut text = text.trim().to_lowercase();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            text = text[1..text.len() - 1].trim().to_string();
        }
    }
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth > 0 => {}
            '＋' => out.push('+'),
            '−' | '–' | '—' => out.push('-'),
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

fn parse_modifier(tail: &[char], original: &str) -> NotationResult<i64> {
    let Some(sign_pos) = (0..tail.len()).find(|&i| {
        matches!(tail[i], '+' | '-') && tail.get(i + 1).is_some_and(char::is_ascii_digit)
    }) else {
        return Ok(0);
    };
    let digits: String = tail[sign_pos + 1..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let magnitude = digits
        .parse::<i64>()
        .map_err(|_| NotationError::Malformed(original.trim().to_string()))?;
    Ok(if tail[sign_pos] == '-' {
        -magnitude
    } else {
        magnitude
    })
}

/// Outcome of checking a notation without rolling it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotationCheck {
    /// The notation as supplied.
    pub notation: String,
    /// Whether it parses.
    pub valid: bool,
    /// Why it does not, when it does not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The parsed form, when it parses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Notation>,
    /// Canonical spelling, when it parses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
}

/// Check notation without consuming any randomness.
pub fn validate_notation(text: &str) -> NotationCheck {
    match parse_notation(text) {
        Ok(parsed) => NotationCheck {
            notation: text.to_string(),
            valid: true,
            reason: None,
            canonical: Some(parsed.to_string()),
            parsed: Some(parsed),
        },
        Err(err) => NotationCheck {
            notation: text.to_string(),
            valid: false,
            reason: Some(err.to_string()),
            parsed: None,
            canonical: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(text: &str) -> (u32, u32, i64) {
        let n = parse_notation(text).unwrap();
        (n.count, n.die.sides(), n.modifier)
    }

    #[test]
    fn parses_standard_forms() {
        assert_eq!(parsed("2d6+3"), (2, 6, 3));
        assert_eq!(parsed("1d20"), (1, 20, 0));
        assert_eq!(parsed("d20"), (1, 20, 0));
        assert_eq!(parsed("1D8-1"), (1, 8, -1));
        assert_eq!(parsed("20d4"), (20, 4, 0));
    }

    #[test]
    fn tolerates_noise() {
        assert_eq!(parsed("  '2d6 + 3'  "), (2, 6, 3));
        assert_eq!(parsed("\"1d20+5\""), (1, 20, 5));
        assert_eq!(parsed("1d20 (with advantage) +2"), (1, 20, 2));
        assert_eq!(parsed("1d8 − 1"), (1, 8, -1));
        assert_eq!(parsed("1d6 ＋ 4"), (1, 6, 4));
        assert_eq!(parsed("1d20+5 to hit"), (1, 20, 5));
        assert_eq!(parsed("attack: 1d20+4"), (1, 20, 4));
    }

    #[test]
    fn rejects_bad_counts_and_dice() {
        assert!(matches!(parse_notation("0d6"), Err(NotationError::Count(_))));
        assert!(matches!(parse_notation("21d6"), Err(NotationError::Count(_))));
        assert!(matches!(parse_notation("1d7"), Err(NotationError::UnsupportedDie(_))));
        assert!(matches!(parse_notation("1d100"), Err(NotationError::UnsupportedDie(_))));
    }

    #[test]
    fn rejects_non_notation() {
        assert_eq!(parse_notation("   "), Err(NotationError::Empty));
        assert!(matches!(parse_notation("attack"), Err(NotationError::Malformed(_))));
        assert!(matches!(parse_notation("17"), Err(NotationError::Malformed(_))));
    }

    #[test]
    fn canonical_display() {
        assert_eq!(parse_notation("D20").unwrap().to_string(), "1d20");
        assert_eq!(parse_notation("2d6 + 3").unwrap().to_string(), "2d6+3");
        assert_eq!(parse_notation("1d8-1").unwrap().to_string(), "1d8-1");
    }

    #[test]
    fn bounds() {
        let n = parse_notation("2d6+3").unwrap();
        assert_eq!((n.min_total(), n.max_total()), (5, 15));
    }

    #[test]
    fn validate_reports_reason() {
        let ok = validate_notation("2d6+3");
        assert!(ok.valid);
        assert_eq!(ok.canonical.as_deref(), Some("2d6+3"));
        let bad = validate_notation("3d7");
        assert!(!bad.valid);
        assert_eq!(bad.reason.as_deref(), Some("unsupported die type: d7"));
    }

    #[test]
    fn die_serializes_as_sides() {
        assert_eq!(serde_json::to_string(&Die::D12).unwrap(), "12");
        assert_eq!(serde_json::from_str::<Die>("8").unwrap(), Die::D8);
        assert!(serde_json::from_str::<Die>("7").is_err());
    }
}
