//! Producers of programs
//!
//! A program reaches the machine either as raw comma-separated text or as
//! mnemonic assembly; both front ends produce the same thing, an ordered
//! sequence of cell values. The parsing is handled by the `nom` library.

use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::{map_res, opt, recognize};
use nom::sequence::preceded;
use nom::IResult;

pub mod assembly;
pub mod program;

pub use self::assembly::{assemble, AssemblyError};
pub use self::program::{parse_program, ProgramParseError};

use crate::constants::Value;

/// Parse a signed decimal integer
pub(crate) fn parse_value(input: &str) -> IResult<&str, Value> {
    map_res(
        recognize(preceded(
            opt(char('-')),
            take_while1(|c: char| c.is_ascii_digit()),
        )),
        str::parse,
    )(input)
}
