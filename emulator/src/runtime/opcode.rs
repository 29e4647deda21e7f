use parse_display::{Display, FromStr};
use tracing::debug;

use super::{Computer, ExecutionError};
use crate::constants::Value;

/// Read/write behavior of one parameter, fixed per opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The parameter is an operand whose value is consumed
    Read,
    /// The parameter is the address the result is written to
    Write,
}

/// How a parameter's raw value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The raw value is an address to dereference
    Position,
    /// The raw value is used literally
    Immediate,
}

impl Mode {
    fn from_digit(digit: Value) -> Result<Self, ExecutionError> {
        match digit {
            0 => Ok(Self::Position),
            1 => Ok(Self::Immediate),
            other => Err(ExecutionError::InvalidMode(other)),
        }
    }
}

/// The instruction set
///
/// The mnemonics double as the assembly text format, hence the
/// `Display`/`FromStr` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromStr)]
pub enum Opcode {
    #[display("ADD")]
    Add,

    #[display("MULTIPLY")]
    Multiply,

    /// Receive one value from the input channel
    #[display("INPUT")]
    Input,

    /// Send one value to the output channel
    #[display("OUTPUT")]
    Output,

    #[display("JUMP-IF-TRUE")]
    JumpIfTrue,

    #[display("JUMP-IF-FALSE")]
    JumpIfFalse,

    #[display("LESS-THAN")]
    LessThan,

    #[display("EQUALS")]
    Equals,

    #[display("HALT")]
    Halt,
}

impl Opcode {
    /// Look up an opcode by its numeric code
    #[must_use]
    pub fn from_code(code: Value) -> Option<Self> {
        match code {
            1 => Some(Self::Add),
            2 => Some(Self::Multiply),
            3 => Some(Self::Input),
            4 => Some(Self::Output),
            5 => Some(Self::JumpIfTrue),
            6 => Some(Self::JumpIfFalse),
            7 => Some(Self::LessThan),
            8 => Some(Self::Equals),
            99 => Some(Self::Halt),
            _ => None,
        }
    }

    /// Numeric code of this opcode
    #[must_use]
    pub const fn code(self) -> Value {
        match self {
            Self::Add => 1,
            Self::Multiply => 2,
            Self::Input => 3,
            Self::Output => 4,
            Self::JumpIfTrue => 5,
            Self::JumpIfFalse => 6,
            Self::LessThan => 7,
            Self::Equals => 8,
            Self::Halt => 99,
        }
    }

    /// Parameter directions, in parameter order
    #[must_use]
    pub const fn directions(self) -> &'static [Direction] {
        use Direction::{Read, Write};

        match self {
            Self::Add | Self::Multiply | Self::LessThan | Self::Equals => &[Read, Read, Write],
            Self::Input => &[Write],
            Self::Output => &[Read],
            Self::JumpIfTrue | Self::JumpIfFalse => &[Read, Read],
            Self::Halt => &[],
        }
    }

    /// Number of cells the full instruction occupies (opcode word plus
    /// parameters)
    #[must_use]
    pub const fn length(self) -> usize {
        1 + self.directions().len()
    }

    /// Decode a raw instruction word into an opcode and per-parameter modes
    ///
    /// The two low digits are the numeric opcode. The remaining digits are
    /// mode digits, one per parameter starting from the least significant;
    /// digits beyond those present default to position mode. Decoding is
    /// plain integer arithmetic, no string formatting involved.
    ///
    /// # Errors
    ///
    /// It fails if the numeric code has no opcode or a mode digit is neither
    /// 0 nor 1.
    pub fn decode(word: Value) -> Result<(Self, Vec<Mode>), ExecutionError> {
        let code = word % 100;
        let opcode = Self::from_code(code).ok_or(ExecutionError::InvalidOpcode(code))?;

        let mut digits = word / 100;
        let mut modes = Vec::with_capacity(opcode.directions().len());
        for _ in opcode.directions() {
            modes.push(Mode::from_digit(digits % 10)?);
            digits /= 10;
        }

        Ok((opcode, modes))
    }

    /// Execute the opcode against a machine
    ///
    /// `parameters` are already resolved: read parameters hold operand
    /// values, write parameters hold raw target addresses. Every opcode but
    /// the jumps and HALT advances the instruction pointer by its own length;
    /// a taken jump overwrites the pointer instead.
    pub(crate) fn execute(
        self,
        computer: &mut Computer,
        parameters: &[Value],
    ) -> Result<(), ExecutionError> {
        match self {
            Self::Add => {
                let result = parameters[0] + parameters[1];
                debug!(lhs = parameters[0], rhs = parameters[1], result, "add");
                computer.store(parameters[2], result)?;
                computer.advance(self.length());
            }

            Self::Multiply => {
                let result = parameters[0] * parameters[1];
                debug!(lhs = parameters[0], rhs = parameters[1], result, "multiply");
                computer.store(parameters[2], result)?;
                computer.advance(self.length());
            }

            Self::Input => {
                let value = computer.receive()?;
                debug!(value, "input");
                computer.store(parameters[0], value)?;
                computer.advance(self.length());
            }

            Self::Output => {
                debug!(value = parameters[0], "output");
                computer.send(parameters[0])?;
                computer.advance(self.length());
            }

            Self::JumpIfTrue => {
                if parameters[0] == 0 {
                    computer.advance(self.length());
                } else {
                    computer.jump(parameters[1])?;
                }
            }

            Self::JumpIfFalse => {
                if parameters[0] == 0 {
                    computer.jump(parameters[1])?;
                } else {
                    computer.advance(self.length());
                }
            }

            Self::LessThan => {
                let result = Value::from(parameters[0] < parameters[1]);
                debug!(lhs = parameters[0], rhs = parameters[1], result, "less-than");
                computer.store(parameters[2], result)?;
                computer.advance(self.length());
            }

            Self::Equals => {
                let result = Value::from(parameters[0] == parameters[1]);
                debug!(lhs = parameters[0], rhs = parameters[1], result, "equals");
                computer.store(parameters[2], result)?;
                computer.advance(self.length());
            }

            // Termination is handled by the run loop; the pointer stays put
            Self::Halt => {
                debug!("halt");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_code_test() {
        assert_eq!(Opcode::from_code(1), Some(Opcode::Add));
        assert_eq!(Opcode::from_code(99), Some(Opcode::Halt));
        assert_eq!(Opcode::from_code(0), None);
        assert_eq!(Opcode::from_code(50), None);
        assert_eq!(Opcode::from_code(-1), None);
    }

    #[test]
    fn code_round_trip_test() {
        for code in [1, 2, 3, 4, 5, 6, 7, 8, 99] {
            let opcode = Opcode::from_code(code).unwrap();
            assert_eq!(opcode.code(), code);
        }
    }

    #[test]
    fn mnemonic_test() {
        assert_eq!("ADD".parse::<Opcode>().unwrap(), Opcode::Add);
        assert_eq!("JUMP-IF-TRUE".parse::<Opcode>().unwrap(), Opcode::JumpIfTrue);
        assert_eq!(Opcode::JumpIfFalse.to_string(), "JUMP-IF-FALSE");
        assert_eq!(Opcode::Halt.to_string(), "HALT");
        assert!("add".parse::<Opcode>().is_err());
        assert!("DATA".parse::<Opcode>().is_err());
    }

    #[test]
    fn decode_test() {
        // Plain words default every parameter to position mode
        let (opcode, modes) = Opcode::decode(2).unwrap();
        assert_eq!(opcode, Opcode::Multiply);
        assert_eq!(modes, vec![Mode::Position, Mode::Position, Mode::Position]);

        // The least significant mode digit governs the first parameter
        let (opcode, modes) = Opcode::decode(1101).unwrap();
        assert_eq!(opcode, Opcode::Add);
        assert_eq!(
            modes,
            vec![Mode::Immediate, Mode::Immediate, Mode::Position]
        );

        let (opcode, modes) = Opcode::decode(1002).unwrap();
        assert_eq!(opcode, Opcode::Multiply);
        assert_eq!(modes, vec![Mode::Position, Mode::Immediate, Mode::Position]);

        let (opcode, modes) = Opcode::decode(104).unwrap();
        assert_eq!(opcode, Opcode::Output);
        assert_eq!(modes, vec![Mode::Immediate]);

        let (opcode, modes) = Opcode::decode(99).unwrap();
        assert_eq!(opcode, Opcode::Halt);
        assert!(modes.is_empty());
    }

    #[test]
    fn decode_invalid_opcode_test() {
        let err = Opcode::decode(1050).unwrap_err();
        assert_eq!(err.to_string(), "invalid opcode: 50");

        // Negative words carry their code into the error untouched
        let err = Opcode::decode(-1).unwrap_err();
        assert_eq!(err.to_string(), "invalid opcode: -1");
    }

    #[test]
    fn decode_invalid_mode_test() {
        // Third mode digit is 2
        let err = Opcode::decode(21101).unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter mode: 2");
    }

    #[test]
    fn length_test() {
        assert_eq!(Opcode::Add.length(), 4);
        assert_eq!(Opcode::Input.length(), 2);
        assert_eq!(Opcode::JumpIfTrue.length(), 3);
        assert_eq!(Opcode::Halt.length(), 1);
    }
}
