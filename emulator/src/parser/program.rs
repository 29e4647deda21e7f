//! Raw program text parsing
//!
//! The wire format of a program is comma-separated decimal integers, e.g.
//! `1,9,10,3,2,3,11,0,99,30,40,50`. Surrounding whitespace is trimmed;
//! every token must be a decimal integer on its own.

use thiserror::Error;

use super::parse_value;
use crate::constants::Value;

/// Represents errors from parsing raw program text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgramParseError {
    /// A comma-separated token is not a decimal integer
    #[error("invalid program token: {0:?}")]
    InvalidToken(String),
}

/// Parse comma-separated program text into a program
///
/// # Errors
///
/// Any token that is not a bare decimal integer is a fatal parse error; the
/// error carries the offending token.
pub fn parse_program(input: &str) -> Result<Vec<Value>, ProgramParseError> {
    input
        .trim()
        .split(',')
        .map(|token| match parse_value(token) {
            Ok(("", value)) => Ok(value),
            _ => Err(ProgramParseError::InvalidToken(token.to_string())),
        })
        .collect()
}
