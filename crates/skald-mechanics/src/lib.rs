//! Deterministic engines for Skald: dice rolling and restricted arithmetic.
//!
//! Both engines are pure apart from the dice roller's die source, so every
//! number that enters a session can be traced back to a roll record or an
//! evaluated expression.

pub mod calc;
pub mod dice;
pub mod error;

pub use calc::{Comparator, check_threshold, compute_modifier, eval_expr, sum_damage};
pub use dice::{
    DiceRoller, Die, DieSource, FixedDice, Notation, NotationCheck, RollRequest, SeededDice,
    parse_notation, validate_notation,
};
pub use error::{ExprError, ExprResult, NotationError, NotationResult};
