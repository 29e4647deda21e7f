use std::fs;
use std::thread;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use intcode_emulator::constants::Value;
use intcode_emulator::Computer;
use tracing::{debug, info};

use super::load_program;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Input file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Treat the input as mnemonic assembly instead of raw program text
    #[clap(short, long, action = ArgAction::SetTrue)]
    assembly: bool,

    /// Values fed to the machine's input channel, in order
    #[clap(short, long = "send", value_name = "VALUE")]
    sends: Vec<Value>,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.input, "Reading program");
        let source = fs::read_to_string(&self.input)?;
        let program = load_program(&source, self.assembly)?;

        debug!("Building machine");
        let mut computer = Computer::new(&program);

        // Queue the input values on a feeder thread; sends rendezvous with
        // the machine's INPUT instructions one by one, in order
        let input = computer.input();
        let sends = self.sends;
        thread::spawn(move || {
            for value in sends {
                if input.send(value).is_err() {
                    break;
                }
            }
        });

        let output = computer.output();
        let printer = thread::spawn(move || {
            for value in output {
                println!("{value}");
            }
        });

        info!("Running machine");
        computer.run();
        printer.join().expect("printer thread panicked");

        info!(state = %computer.state(), "End of program");

        Ok(())
    }
}
