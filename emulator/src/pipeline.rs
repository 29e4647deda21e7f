//! Wiring several machines into pipelines and feedback loops
//!
//! Every machine of a network is built from the same program and runs on
//! its own thread; values move between machines exclusively through their
//! rendezvous channels, relayed by dedicated threads that drain one channel
//! into the next. The zero-capacity channels enforce strict FIFO ordering
//! between any two parties and give natural backpressure: a producer cannot
//! outrun a slow consumer.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::constants::Value;
use crate::runtime::{Computer, State, StateHandle};

/// Represents errors from assembling or running a machine network
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The phase list was empty
    #[error("a network needs at least one machine")]
    Empty,

    /// A worker thread could not be spawned
    #[error("failed to spawn a worker thread")]
    Spawn(#[from] io::Error),

    /// A machine halted before accepting its phase value
    #[error("machine {0} halted before accepting its phase value")]
    PhaseRejected(usize),

    /// Every machine halted but nothing ever reached the network output
    #[error("the network halted without producing a value")]
    NoOutput,

    /// A machine thread panicked, which the default error handler does on
    /// any execution error
    #[error("a machine thread panicked")]
    MachineFailed,
}

/// Machines of a network, started but not yet wired together
struct Network {
    inputs: Vec<Sender<Value>>,
    outputs: Vec<Receiver<Value>>,
    terminal_state: StateHandle,
    workers: Vec<JoinHandle<()>>,
}

/// Build one machine per phase value from the same program, start them all
/// and hand every machine its phase before anything else flows.
fn start_machines(program: &[Value], phases: &[Value]) -> Result<Network, PipelineError> {
    if phases.is_empty() {
        return Err(PipelineError::Empty);
    }

    let mut inputs = Vec::with_capacity(phases.len());
    let mut outputs = Vec::with_capacity(phases.len());
    let mut workers = Vec::with_capacity(phases.len());
    let mut terminal_state = None;

    for index in 0..phases.len() {
        let mut computer = Computer::new(program).with_name(format!("amp-{index}"));
        inputs.push(computer.input());
        outputs.push(computer.output());
        terminal_state = Some(computer.state_handle());

        let handle = thread::Builder::new()
            .name(format!("amp-{index}"))
            .spawn(move || computer.run())?;
        workers.push(handle);
    }

    for (index, (input, &phase)) in inputs.iter().zip(phases).enumerate() {
        debug!(machine = index, phase, "sending phase value");
        input
            .send(phase)
            .map_err(|_| PipelineError::PhaseRejected(index))?;
    }

    Ok(Network {
        inputs,
        outputs,
        terminal_state: terminal_state.expect("at least one machine"),
        workers,
    })
}

/// Drain one channel into another until either side disconnects
fn relay(from: Receiver<Value>, to: Sender<Value>) {
    for value in from {
        trace!(value, "relaying value");
        if to.send(value).is_err() {
            break;
        }
    }
}

/// Spawn the relay threads coupling each machine's output to the next
/// machine's input, and the seeding thread that starts the whole chain off
/// with a 0. Returns the tail machine's output.
fn wire_chain(network: &mut Network) -> Result<(Receiver<Value>, Vec<JoinHandle<()>>), PipelineError> {
    let tail_output = network.outputs.pop().expect("at least one machine");

    let mut relays = Vec::with_capacity(network.outputs.len() + 1);
    let downstream = network.inputs.iter().skip(1).cloned();
    for (index, (output, input)) in network.outputs.drain(..).zip(downstream).enumerate() {
        let handle = thread::Builder::new()
            .name(format!("relay-{index}"))
            .spawn(move || relay(output, input))?;
        relays.push(handle);
    }

    // Seed the head of the chain. The send has to happen off-thread: it only
    // completes once the head machine asks for its second input.
    let head = network.inputs[0].clone();
    let seeder = thread::Builder::new()
        .name(String::from("seed"))
        .spawn(move || {
            let _ = head.send(0);
        })?;
    relays.push(seeder);

    Ok((tail_output, relays))
}

fn join_all(handles: Vec<JoinHandle<()>>) -> Result<(), PipelineError> {
    for handle in handles {
        handle.join().map_err(|_| PipelineError::MachineFailed)?;
    }
    Ok(())
}

/// Run a linear chain of machines built from one program
///
/// Each machine receives its phase value first, then values flow from each
/// machine's output into the next machine's input; a single 0 seeds the head
/// of the chain. The result is the first value the tail machine produces.
///
/// # Errors
///
/// It fails on an empty phase list, a machine that halts without accepting
/// its phase, a network that halts without output, or a panicked machine.
pub fn run_pipeline(program: &[Value], phases: &[Value]) -> Result<Value, PipelineError> {
    let mut network = start_machines(program, phases)?;
    let (tail_output, relays) = wire_chain(&mut network)?;

    let result = tail_output.recv().ok();
    if let Some(result) = result {
        debug!(result, "pipeline produced its result");
    }

    // Let the tail machine drain any remaining output so it can halt
    for value in &tail_output {
        trace!(value, "discarding trailing output");
    }

    join_all(network.workers)?;
    join_all(relays)?;

    result.ok_or(PipelineError::NoOutput)
}

/// Run a closed loop of machines built from one program
///
/// Identical wiring to [`run_pipeline`], except the tail machine's output is
/// routed back into the head machine's input. Every value the tail produces
/// is recorded on a separate channel; the value emitted by the
/// halt-triggering final step is recorded but never fed back upstream. The
/// result is the last recorded value.
///
/// # Errors
///
/// Same failure modes as [`run_pipeline`].
pub fn run_feedback_loop(program: &[Value], phases: &[Value]) -> Result<Value, PipelineError> {
    let mut network = start_machines(program, phases)?;
    let terminal_state = network.terminal_state.clone();
    let head = network.inputs[0].clone();
    let (tail_output, mut relays) = wire_chain(&mut network)?;

    // Tail-to-head relay: record every value, and feed it back upstream only
    // while the tail machine has not been observed halted. A rejected
    // upstream send means the head machine is gone; forwarding stops for
    // good but the recording drain keeps going.
    let (record, recorded) = bounded(0);
    let feedback = thread::Builder::new()
        .name(String::from("feedback"))
        .spawn(move || {
            let mut upstream = Some(head);
            for value in tail_output {
                if record.send(value).is_err() {
                    break;
                }
                if terminal_state.get() == State::Halted {
                    upstream = None;
                }
                if let Some(to) = &upstream {
                    if to.send(value).is_err() {
                        upstream = None;
                    }
                }
            }
        })?;
    relays.push(feedback);

    let mut last = None;
    for value in recorded {
        info!(value, "terminal machine output");
        last = Some(value);
    }

    join_all(network.workers)?;
    join_all(relays)?;

    last.ok_or(PipelineError::NoOutput)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    // Adds its second input to its first and outputs the sum
    const ADDER: [Value; 11] = [3, 0, 3, 1, 1, 0, 1, 0, 4, 0, 99];

    #[test]
    fn single_machine_pipeline_test() {
        // One machine: phase 7 plus the seed 0
        assert_eq!(run_pipeline(&ADDER, &[7]).unwrap(), 7);
    }

    #[test]
    fn adder_chain_test() {
        // Each machine adds its phase to the running total
        assert_eq!(run_pipeline(&ADDER, &[3, 4]).unwrap(), 7);
        assert_eq!(run_pipeline(&ADDER, &[1, 2, 3, 4, 5]).unwrap(), 15);
    }

    #[test]
    fn pipeline_reference_programs_test() {
        let program = [
            3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0,
        ];
        assert_eq!(run_pipeline(&program, &[4, 3, 2, 1, 0]).unwrap(), 43210);

        let program = [
            3, 23, 3, 24, 1002, 24, 10, 24, 1002, 23, -1, 23, 101, 5, 23, 23, 1, 24, 23, 23, 4,
            23, 99, 0, 0,
        ];
        assert_eq!(run_pipeline(&program, &[0, 1, 2, 3, 4]).unwrap(), 54321);

        let program = [
            3, 31, 3, 32, 1002, 32, 10, 32, 1001, 31, -2, 31, 1007, 31, 0, 33, 1002, 33, 7, 33, 1,
            33, 31, 31, 1, 32, 31, 31, 4, 31, 99, 0, 0, 0,
        ];
        assert_eq!(run_pipeline(&program, &[1, 0, 4, 3, 2]).unwrap(), 65210);
    }

    #[test]
    fn feedback_loop_reference_programs_test() {
        let program = [
            3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1,
            28, 1005, 28, 6, 99, 0, 0, 5,
        ];
        assert_eq!(
            run_feedback_loop(&program, &[9, 8, 7, 6, 5]).unwrap(),
            139_629_729
        );

        let program = [
            3, 52, 1001, 52, -5, 52, 3, 53, 1, 52, 56, 54, 1007, 54, 5, 55, 1005, 55, 26, 1001,
            54, -5, 54, 1105, 1, 12, 1, 53, 54, 53, 1008, 54, 0, 55, 1001, 55, 1, 55, 2, 53, 55,
            53, 4, 53, 1001, 56, -1, 56, 1005, 56, 6, 99, 0, 0, 0, 0, 10,
        ];
        assert_eq!(
            run_feedback_loop(&program, &[9, 7, 8, 5, 6]).unwrap(),
            18216
        );
    }

    #[test]
    fn empty_network_test() {
        assert!(matches!(
            run_pipeline(&ADDER, &[]),
            Err(PipelineError::Empty)
        ));
        assert!(matches!(
            run_feedback_loop(&ADDER, &[]),
            Err(PipelineError::Empty)
        ));
    }

    #[test]
    fn phase_rejected_test() {
        // The program halts without ever reading its input
        assert!(matches!(
            run_pipeline(&[99], &[0, 1]),
            Err(PipelineError::PhaseRejected(0))
        ));
    }

    #[test]
    fn no_output_test() {
        // Consumes the phase, then halts silently
        assert!(matches!(
            run_pipeline(&[3, 0, 99], &[1, 2]),
            Err(PipelineError::NoOutput)
        ));
    }
}
