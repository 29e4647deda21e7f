use anyhow::Context;
use intcode_emulator::constants::Value;
use tracing::debug;

mod assemble;
mod completion;
mod dump;
mod pipeline;
mod run;

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Parse (or assemble) a program and run it on a single machine
    Run(self::run::RunOpt),

    /// Assemble a program and print it as comma-separated text
    Assemble(self::assemble::AssembleOpt),

    /// Print the memory image of a parsed program
    Dump(self::dump::DumpOpt),

    /// Run a chain of machines over the same program
    Pipeline(self::pipeline::PipelineOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Subcommand::Run(opt) => opt.exec(),
            Subcommand::Assemble(opt) => opt.exec(),
            Subcommand::Dump(opt) => opt.exec(),
            Subcommand::Pipeline(opt) => opt.exec(),
            Subcommand::Completion(opt) => opt.exec(),
        }
    }
}

/// Turn source text into a program, through the assembler or the raw text
/// parser
pub(crate) fn load_program(source: &str, assembly: bool) -> anyhow::Result<Vec<Value>> {
    let program = if assembly {
        intcode_emulator::assemble(source).context("failed to assemble program")?
    } else {
        intcode_emulator::parse_program(source).context("failed to parse program")?
    };

    debug!(cells = program.len(), "program loaded");

    Ok(program)
}
