//! Digit Codes
//!
//! A [`Code`] is an ordered sequence of decimal digits. Secrets and guesses
//! share the type; digits may repeat.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::rng::RandomSource;

/// Number of symbols in the digit alphabet (`0`–`9`).
pub const DIGIT_ALPHABET: u32 = 10;

/// A sequence of digits in `0..=9`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(Vec<u8>);

/// Errors when parsing or validating a code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    /// A character outside `0`–`9`.
    #[error("invalid digit {0:?} (only 0-9 allowed)")]
    InvalidDigit(char),

    /// Wrong number of digits.
    #[error("expected {expected} digits, got {actual}")]
    WrongLength {
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
}

impl Code {
    /// Build from raw digit values.
    ///
    /// Returns `None` if any value is not a decimal digit.
    pub fn from_digits(digits: Vec<u8>) -> Option<Self> {
        if digits.iter().all(|d| *d < DIGIT_ALPHABET as u8) {
            Some(Self(digits))
        } else {
            None
        }
    }

    /// Parse and require an exact length.
    pub fn parse_with_len(s: &str, expected: usize) -> Result<Self, CodeError> {
        let code: Code = s.parse()?;
        code.expect_len(expected)?;
        Ok(code)
    }

    /// Uniformly random code of `len` digits.
    pub fn random<R: RandomSource>(rng: &mut R, len: usize) -> Self {
        Self((0..len).map(|_| rng.next_int(DIGIT_ALPHABET) as u8).collect())
    }

    /// Fail unless the code has exactly `expected` digits.
    pub fn expect_len(&self, expected: usize) -> Result<(), CodeError> {
        if self.0.len() == expected {
            Ok(())
        } else {
            Err(CodeError::WrongLength { expected, actual: self.0.len() })
        }
    }

    /// Digit values.
    pub fn digits(&self) -> &[u8] {
        &self.0
    }

    /// Number of digits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the unset code.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for Code {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| c.to_digit(DIGIT_ALPHABET).map(|d| d as u8).ok_or(CodeError::InvalidDigit(c)))
            .collect::<Result<Vec<_>, _>>()
            .map(Code)
    }
}

impl TryFrom<String> for Code {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.0 {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}
