//! The machine execution engine
//!
//! A [`Computer`] owns one [`Memory`], an instruction pointer and the
//! machine-side halves of two rendezvous channels. It runs a
//! fetch-decode-execute loop over the fixed instruction set until the HALT
//! opcode executes. The only suspension points are the INPUT opcode (blocks
//! until a value is available on the input channel) and the OUTPUT opcode
//! (blocks until a receiver accepts the value).

use std::fmt::Debug;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use parse_display::Display;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::constants::{Address, Value};

mod memory;
mod opcode;

pub use self::memory::{Memory, MemoryError};
pub use self::opcode::{Direction, Mode, Opcode};

/// Represents errors surfaced by [`Computer::step`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The numeric code at the instruction pointer has no opcode
    #[error("invalid opcode: {0}")]
    InvalidOpcode(Value),

    /// A decoded mode digit is neither position (0) nor immediate (1)
    #[error("invalid parameter mode: {0}")]
    InvalidMode(Value),

    /// A write parameter was decoded under immediate mode
    #[error("write parameter cannot be in immediate mode: {0}")]
    ImmediateWrite(Value),

    /// A parameter used as an address is negative
    #[error("invalid address: {0}")]
    InvalidAddress(Value),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The input channel disconnected while an INPUT was waiting
    #[error("input channel closed")]
    InputClosed,

    /// The output channel disconnected while an OUTPUT was waiting
    #[error("output channel disconnected")]
    OutputDisconnected,
}

/// Lifecycle of a machine
///
/// Each edge is crossed exactly once, in order; a halted machine is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "kebab-case")]
pub enum State {
    PreRun,
    Running,
    Halted,
}

impl State {
    const fn as_u8(self) -> u8 {
        match self {
            Self::PreRun => 0,
            Self::Running => 1,
            Self::Halted => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::PreRun,
            1 => Self::Running,
            _ => Self::Halted,
        }
    }
}

/// Shareable view of a machine's lifecycle state
///
/// The machine is the only writer; other threads (the feedback relay of a
/// machine network, in particular) observe the state through clones of this
/// handle.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(State::PreRun.as_u8())))
    }

    /// Current lifecycle state
    #[must_use]
    pub fn get(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: State) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

type ErrorHandler = Box<dyn FnMut(&ExecutionError) + Send>;

fn default_error_handler(err: &ExecutionError) {
    error!(error = %err, "uncaught machine error");
    panic!("{err}");
}

/// One running instance of the execution engine
pub struct Computer {
    memory: Memory,
    instruction_pointer: Address,
    state: StateHandle,
    name: String,
    input: Option<Receiver<Value>>,
    input_sender: Option<Sender<Value>>,
    output: Option<Sender<Value>>,
    output_receiver: Option<Receiver<Value>>,
    error_handler: ErrorHandler,
}

impl Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ name: {:?}, state: {}, instruction_pointer: {}, memory: [...] }}",
            self.name,
            self.state(),
            self.instruction_pointer
        )
    }
}

impl Computer {
    /// Create a machine from an initial program
    ///
    /// The program is copied into a fresh [`Memory`]; the caller's slice is
    /// never mutated. The instruction pointer starts at 0 and both channels
    /// are open, unbuffered and empty.
    #[must_use]
    pub fn new(program: &[Value]) -> Self {
        debug!("machine created");

        let (input_sender, input) = bounded(0);
        let (output, output_receiver) = bounded(0);

        Self {
            memory: Memory::from(program),
            instruction_pointer: 0,
            state: StateHandle::new(),
            name: String::from("computer"),
            input: Some(input),
            input_sender: Some(input_sender),
            output: Some(output),
            output_receiver: Some(output_receiver),
            error_handler: Box::new(default_error_handler),
        }
    }

    /// Label used in log output when several machines run at once
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the fatal-error handler invoked by [`Computer::run`]
    ///
    /// The default handler logs the error and panics with its message.
    pub fn on_error(&mut self, handler: impl FnMut(&ExecutionError) + Send + 'static) {
        self.error_handler = Box::new(handler);
    }

    /// Sending half of the machine's input channel
    ///
    /// # Panics
    ///
    /// Panics if the machine has halted; both channels are closed at halt.
    #[must_use]
    pub fn input(&self) -> Sender<Value> {
        self.input_sender.clone().expect("machine has halted")
    }

    /// Receiving half of the machine's output channel
    ///
    /// # Panics
    ///
    /// Panics if the machine has halted; both channels are closed at halt.
    #[must_use]
    pub fn output(&self) -> Receiver<Value> {
        self.output_receiver.clone().expect("machine has halted")
    }

    /// Send one value to the machine's input from a detached thread
    ///
    /// The channels are rendezvous channels, so sending from the current
    /// thread would block until the machine executes its next INPUT. The
    /// value is silently discarded if the machine halts without consuming it.
    ///
    /// # Panics
    ///
    /// Panics if the machine has halted.
    pub fn send_input(&self, value: Value) {
        let sender = self.input();
        thread::spawn(move || {
            let _ = sender.send(value);
        });
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> State {
        self.state.get()
    }

    /// Handle for observing the lifecycle state from another thread
    #[must_use]
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    #[must_use]
    pub fn instruction_pointer(&self) -> Address {
        self.instruction_pointer
    }

    /// Override the instruction pointer
    ///
    /// Jump instructions use this internally; it is exposed for composition
    /// and debugging.
    pub fn set_instruction_pointer(&mut self, address: Address) {
        self.instruction_pointer = address;
    }

    fn address_from(value: Value) -> Result<Address, ExecutionError> {
        Address::try_from(value).map_err(|_| ExecutionError::InvalidAddress(value))
    }

    pub(crate) fn store(&mut self, target: Value, value: Value) -> Result<(), ExecutionError> {
        let address = Self::address_from(target)?;
        self.memory.set(address, value)?;
        Ok(())
    }

    pub(crate) fn advance(&mut self, length: usize) {
        self.instruction_pointer += length;
    }

    pub(crate) fn jump(&mut self, target: Value) -> Result<(), ExecutionError> {
        let address = Self::address_from(target)?;
        trace!(address, "jump");
        self.set_instruction_pointer(address);
        Ok(())
    }

    pub(crate) fn receive(&mut self) -> Result<Value, ExecutionError> {
        self.input
            .as_ref()
            .ok_or(ExecutionError::InputClosed)?
            .recv()
            .map_err(|_| ExecutionError::InputClosed)
    }

    pub(crate) fn send(&mut self, value: Value) -> Result<(), ExecutionError> {
        self.output
            .as_ref()
            .ok_or(ExecutionError::OutputDisconnected)?
            .send(value)
            .map_err(|_| ExecutionError::OutputDisconnected)
    }

    /// Resolve raw parameters against their modes and directions
    ///
    /// Read parameters become operand values (position mode dereferences,
    /// immediate mode is literal); write parameters stay raw addresses. A
    /// write parameter under immediate mode is a structural violation of the
    /// instruction set, caught here before anything executes.
    fn resolve_parameters(
        &self,
        opcode: Opcode,
        raw: &[Value],
        modes: &[Mode],
    ) -> Result<Vec<Value>, ExecutionError> {
        let mut resolved = Vec::with_capacity(raw.len());

        for ((&parameter, &mode), &direction) in
            raw.iter().zip(modes).zip(opcode.directions())
        {
            let value = match (mode, direction) {
                (Mode::Position, Direction::Write) | (Mode::Immediate, Direction::Read) => {
                    parameter
                }
                (Mode::Position, Direction::Read) => {
                    self.memory.get(Self::address_from(parameter)?)?
                }
                (Mode::Immediate, Direction::Write) => {
                    return Err(ExecutionError::ImmediateWrite(parameter))
                }
            };
            resolved.push(value);
        }

        Ok(resolved)
    }

    /// Execute the single instruction at the instruction pointer
    ///
    /// Fetches the word at the pointer, decodes the opcode and parameter
    /// modes, resolves the parameters and invokes the opcode behavior.
    /// Returns the opcode that executed. Lifecycle state is not touched;
    /// that is [`Computer::run`]'s job.
    ///
    /// # Errors
    ///
    /// It fails on an unknown opcode, an invalid mode digit, a write
    /// parameter in immediate mode, an out-of-bounds access or a
    /// disconnected channel. Nothing is executed in that case.
    pub fn step(&mut self) -> Result<Opcode, ExecutionError> {
        let word = self.memory.get(self.instruction_pointer)?;
        let (opcode, modes) = Opcode::decode(word)?;
        trace!(word, opcode = %opcode, "decoded instruction");

        let raw = self
            .memory
            .get_range(self.instruction_pointer + 1, opcode.directions().len())?
            .to_vec();
        let parameters = self.resolve_parameters(opcode, &raw, &modes)?;
        trace!(?parameters, "resolved parameters");

        opcode.execute(self, &parameters)?;

        Ok(opcode)
    }

    /// Run the machine to completion
    ///
    /// Transitions to `running`, then steps until the HALT opcode executes,
    /// at which point the machine transitions to `halted` and both channels
    /// are closed, exactly once. Any step error is fatal: it goes to the
    /// error handler (which panics by default) and the loop stops. There is
    /// no resumption path; calling `run` on a machine that already ran is a
    /// logged no-op.
    pub fn run(&mut self) {
        if self.state() != State::PreRun {
            warn!(machine = %self.name, state = %self.state(), "machine already ran");
            return;
        }
        self.state.set(State::Running);

        loop {
            match self.step() {
                Ok(Opcode::Halt) => {
                    self.state.set(State::Halted);
                    info!(machine = %self.name, "halt");
                    self.close_channels();
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    (self.error_handler)(&err);
                    break;
                }
            }
        }
    }

    // Closing is dropping: both halves of both channels are released here,
    // exactly once. Relay threads observe the disconnect and wind down.
    fn close_channels(&mut self) {
        self.input.take();
        self.input_sender.take();
        self.output.take();
        self.output_receiver.take();
    }
}
