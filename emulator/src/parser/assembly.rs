//! The mnemonic assembler
//!
//! One instruction per line; fields separated by one or more tabs. The
//! first field is the case-sensitive opcode mnemonic (plus the `DATA`
//! pseudo-instruction, which emits a single literal integer verbatim);
//! the remaining fields are arguments, each a bare integer (position mode)
//! or an integer prefixed with `i` (immediate mode, `i10` = literal 10).
//! Blank lines and surrounding indentation are ignored.

use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::{all_consuming, opt};
use nom::multi::many0;
use nom::sequence::preceded;
use nom::{Finish, IResult};
use thiserror::Error;
use tracing::trace;

use super::parse_value;
use crate::constants::Value;
use crate::runtime::{Mode, Opcode};

/// Represents errors from assembling mnemonic text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblyError {
    /// The line is not a tab-separated mnemonic and arguments
    #[error("line {line}: invalid syntax")]
    Syntax { line: usize },

    /// The first field matches no opcode mnemonic
    #[error("line {line}: unknown mnemonic {mnemonic:?}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    /// The argument count does not match the opcode's parameter count
    #[error("line {line}: {mnemonic} takes {expected} argument(s), got {got}")]
    WrongArity {
        line: usize,
        mnemonic: String,
        expected: usize,
        got: usize,
    },

    /// `DATA` emits a literal cell; an immediate marker makes no sense there
    #[error("line {line}: DATA takes a bare integer")]
    ImmediateData { line: usize },
}

/// One parsed argument: its raw value and the mode it was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Argument {
    value: Value,
    mode: Mode,
}

fn parse_argument(input: &str) -> IResult<&str, Argument> {
    let (input, immediate) = opt(char('i'))(input)?;
    let (input, value) = parse_value(input)?;

    let mode = if immediate.is_some() {
        Mode::Immediate
    } else {
        Mode::Position
    };

    Ok((input, Argument { value, mode }))
}

fn parse_mnemonic(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_uppercase() || c == '-')(input)
}

/// Parse one trimmed line into its mnemonic and arguments
///
/// Runs of consecutive tabs collapse into a single field separator.
fn parse_line(input: &str) -> IResult<&str, (&str, Vec<Argument>)> {
    let (input, mnemonic) = parse_mnemonic(input)?;
    let (input, arguments) = many0(preceded(
        take_while1(|c: char| c == '\t'),
        parse_argument,
    ))(input)?;

    Ok((input, (mnemonic, arguments)))
}

/// Pack an instruction word: the two low digits are the opcode, and each
/// immediate argument sets the mode digit at its own position above them.
fn pack(opcode: Opcode, arguments: &[Argument]) -> Value {
    let mut word = opcode.code();
    let mut weight = 100;

    for argument in arguments {
        if argument.mode == Mode::Immediate {
            word += weight;
        }
        weight *= 10;
    }

    word
}

/// Assemble mnemonic text into a program
///
/// Each instruction becomes its packed opcode word followed by its raw
/// argument values (write addresses unmodified); `DATA` lines emit their
/// integer verbatim.
///
/// # Errors
///
/// It fails on malformed lines, unknown mnemonics, argument-count
/// mismatches and immediate-mode `DATA` arguments, reporting the
/// 1-based line number.
pub fn assemble(source: &str) -> Result<Vec<Value>, AssemblyError> {
    let mut program = Vec::new();

    for (index, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let number = index + 1;

        let (_, (mnemonic, arguments)) = all_consuming(parse_line)(line)
            .finish()
            .map_err(|_| AssemblyError::Syntax { line: number })?;

        if mnemonic == "DATA" {
            match arguments.as_slice() {
                [Argument {
                    value,
                    mode: Mode::Position,
                }] => program.push(*value),
                [Argument {
                    mode: Mode::Immediate,
                    ..
                }] => return Err(AssemblyError::ImmediateData { line: number }),
                _ => {
                    return Err(AssemblyError::WrongArity {
                        line: number,
                        mnemonic: String::from("DATA"),
                        expected: 1,
                        got: arguments.len(),
                    })
                }
            }
            continue;
        }

        let opcode: Opcode = mnemonic.parse().map_err(|_| AssemblyError::UnknownMnemonic {
            line: number,
            mnemonic: mnemonic.to_string(),
        })?;

        let expected = opcode.directions().len();
        if arguments.len() != expected {
            return Err(AssemblyError::WrongArity {
                line: number,
                mnemonic: mnemonic.to_string(),
                expected,
                got: arguments.len(),
            });
        }

        trace!(line = number, opcode = %opcode, "assembled instruction");

        program.push(pack(opcode, &arguments));
        program.extend(arguments.iter().map(|argument| argument.value));
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::Computer;

    #[test]
    fn parse_argument_test() {
        assert_eq!(
            parse_argument("10"),
            Ok((
                "",
                Argument {
                    value: 10,
                    mode: Mode::Position
                }
            ))
        );
        assert_eq!(
            parse_argument("i10"),
            Ok((
                "",
                Argument {
                    value: 10,
                    mode: Mode::Immediate
                }
            ))
        );
        assert_eq!(
            parse_argument("-3"),
            Ok((
                "",
                Argument {
                    value: -3,
                    mode: Mode::Position
                }
            ))
        );
    }

    #[test]
    fn simple_halt_program_test() {
        assert_eq!(assemble("HALT"), Ok(vec![99]));
    }

    #[test]
    fn opcode_with_parameters_test() {
        assert_eq!(assemble("ADD\t0\t0\t0"), Ok(vec![1, 0, 0, 0]));
    }

    #[test]
    fn multiple_instructions_test() {
        let program = assemble(indoc! {"
            ADD\t0\t0\t0
            HALT
        "});

        assert_eq!(program, Ok(vec![1, 0, 0, 0, 99]));
    }

    #[test]
    fn multiple_tabs_collapse_test() {
        let program = assemble(indoc! {"
            ADD\t\t\t\t\t0\t0\t0
            MULTIPLY\t\t0\t0\t0
            HALT
        "});

        assert_eq!(program, Ok(vec![1, 0, 0, 0, 2, 0, 0, 0, 99]));
    }

    #[test]
    fn argument_modes_test() {
        let program = assemble(indoc! {"
            ADD\ti10\ti10\t0
            HALT
        "});

        assert_eq!(program, Ok(vec![1101, 10, 10, 0, 99]));
    }

    #[test]
    fn data_test() {
        let program = assemble(indoc! {"
            ADD\ti10\ti10\t0
            HALT
            DATA\t10
            DATA\t-1
        "});

        assert_eq!(program, Ok(vec![1101, 10, 10, 0, 99, 10, -1]));
    }

    #[test]
    fn unknown_mnemonic_test() {
        assert_eq!(
            assemble("HCF"),
            Err(AssemblyError::UnknownMnemonic {
                line: 1,
                mnemonic: String::from("HCF")
            })
        );
    }

    #[test]
    fn wrong_arity_test() {
        assert_eq!(
            assemble("HALT\nADD\t0\t0"),
            Err(AssemblyError::WrongArity {
                line: 2,
                mnemonic: String::from("ADD"),
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn immediate_data_test() {
        assert_eq!(
            assemble("DATA\ti10"),
            Err(AssemblyError::ImmediateData { line: 1 })
        );
    }

    #[test]
    fn invalid_syntax_test() {
        // Space-separated fields are not accepted
        assert_eq!(
            assemble("ADD 0 0 0"),
            Err(AssemblyError::Syntax { line: 1 })
        );
    }

    // Test some more complicated programs

    #[test]
    fn add_two_numbers_test() {
        let program = assemble(indoc! {"
            ADD\ti11\ti22\t0
            HALT
        "})
        .unwrap();
        let mut computer = Computer::new(&program);

        computer.run();

        assert_eq!(computer.memory().get(0), Ok(33));
    }

    // Take an input, double it and output it
    #[test]
    fn double_input_test() {
        let program = assemble(indoc! {"
            INPUT\t0
            MULTIPLY\t0\ti2\t0
            OUTPUT\t0
            HALT
        "})
        .unwrap();
        let mut computer = Computer::new(&program);

        computer.send_input(11);

        let output = computer.output();
        let listener = thread::spawn(move || output.recv());

        computer.run();

        assert_eq!(listener.join().unwrap(), Ok(22));
    }

    // Test if the input is greater than zero
    #[test]
    fn is_greater_than_zero_test() {
        let program = assemble(indoc! {"
            INPUT\t12
            JUMP-IF-FALSE\t12\t15
            ADD\t13\t14\t13
            OUTPUT\t13
            HALT
            DATA\t-1
            DATA\t0
            DATA\t1
            DATA\t9
        "})
        .unwrap();
        let mut computer = Computer::new(&program);

        computer.send_input(22);

        let output = computer.output();
        let listener = thread::spawn(move || output.recv());

        computer.run();

        assert_eq!(listener.join().unwrap(), Ok(1));
    }
}
