//! An Intcode virtual machine
//!
//! The [`runtime`] module holds the execution engine, the [`parser`] module
//! the two program front ends (raw text and mnemonic assembly), and the
//! [`pipeline`] module wires independent machines into chains and feedback
//! loops over blocking channels.

pub mod constants;
pub mod parser;
pub mod pipeline;
pub mod runtime;

pub use self::parser::{assemble, parse_program};
pub use self::pipeline::{run_feedback_loop, run_pipeline};
pub use self::runtime::Computer;
