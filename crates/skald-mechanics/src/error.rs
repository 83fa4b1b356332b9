//! Error types for the dice and expression engines.

use skald_core::EngineError;

/// Why a dice notation could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotationError {
    /// Nothing left after trimming.
    #[error("empty dice notation")]
    Empty,

    /// No `NdM` core could be found.
    #[error("invalid dice notation: {0}")]
    Malformed(String),

    /// Dice count outside `1..=20`.
    #[error("invalid dice count: {0} (must be 1 to 20)")]
    Count(String),

    /// A die size other than 4, 6, 8, 10, 12 or 20.
    #[error("unsupported die type: d{0}")]
    UnsupportedDie(String),
}

/// Why an arithmetic expression was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// The expression is empty.
    #[error("empty expression")]
    Empty,

    /// The expression is longer than the allowed maximum.
    #[error("expression too long: {len} characters (max {max})")]
    TooLong {
        /// Actual length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// Parentheses or unary operators nest too deeply.
    #[error("expression nested deeper than {0}")]
    TooDeep(usize),

    /// A character that is not part of the grammar.
    #[error("unexpected character {text:?} at {offset}")]
    UnexpectedChar {
        /// The offending text.
        text: String,
        /// Byte offset in the expression.
        offset: usize,
    },

    /// A name other than `floor`.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// A token in a position the grammar does not allow.
    #[error("unexpected {found} at {offset}")]
    UnexpectedToken {
        /// Description of the token.
        found: String,
        /// Byte offset in the expression.
        offset: usize,
    },

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// The result overflowed to infinity or NaN.
    #[error("result is not a finite number")]
    NotFinite,

    /// A comparator other than `>= > <= < ==`.
    #[error("invalid comparator: {0}")]
    Comparator(String),
}

impl From<NotationError> for EngineError {
    fn from(err: NotationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<ExprError> for EngineError {
    fn from(err: ExprError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

/// Convenience result type for notation parsing.
pub type NotationResult<T> = Result<T, NotationError>;

/// Convenience result type for expression evaluation.
pub type ExprResult<T> = Result<T, ExprError>;
