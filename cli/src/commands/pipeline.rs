use std::fs;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use intcode_emulator::constants::Value;
use intcode_emulator::{run_feedback_loop, run_pipeline};
use itertools::Itertools;
use tracing::{debug, info};

use super::load_program;

#[derive(Parser, Debug)]
pub struct PipelineOpt {
    /// Input file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Treat the input as mnemonic assembly instead of raw program text
    #[clap(short, long, action = ArgAction::SetTrue)]
    assembly: bool,

    /// Wire the last machine's output back into the first machine's input
    #[clap(short, long, action = ArgAction::SetTrue)]
    feedback: bool,

    /// Comma-separated phase values, one machine per value
    #[clap(short, long, value_delimiter = ',', required = true)]
    phases: Vec<Value>,

    /// Try every permutation of the phase values and report the maximum
    #[clap(short, long, action = ArgAction::SetTrue)]
    search: bool,
}

impl PipelineOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.input, "Reading program");
        let source = fs::read_to_string(&self.input)?;
        let program = load_program(&source, self.assembly)?;

        let result = if self.search {
            self.search_phases(&program)?
        } else {
            self.run_once(&program, &self.phases)?
        };

        println!("{result}");

        Ok(())
    }

    fn run_once(&self, program: &[Value], phases: &[Value]) -> anyhow::Result<Value> {
        debug!(?phases, feedback = self.feedback, "starting network");

        let result = if self.feedback {
            run_feedback_loop(program, phases)?
        } else {
            run_pipeline(program, phases)?
        };

        Ok(result)
    }

    /// Run the network once per permutation of the phase values and keep the
    /// maximum observed result
    fn search_phases(&self, program: &[Value]) -> anyhow::Result<Value> {
        let mut best = None;

        for phases in self.phases.iter().copied().permutations(self.phases.len()) {
            let result = self.run_once(program, &phases)?;
            debug!(?phases, result, "permutation finished");
            best = Some(best.map_or(result, |best: Value| best.max(result)));
        }

        best.ok_or_else(|| anyhow::anyhow!("no phase values given"))
    }
}
