use std::fs;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use tracing::info;

use super::load_program;

#[derive(Parser, Debug)]
pub struct DumpOpt {
    /// Input file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Treat the input as mnemonic assembly instead of raw program text
    #[clap(short, long, action = ArgAction::SetTrue)]
    assembly: bool,
}

impl DumpOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.input, "Reading program");
        let source = fs::read_to_string(&self.input)?;
        let program = load_program(&source, self.assembly)?;

        for (address, value) in program.iter().enumerate() {
            println!("{address:>5}: {value}");
        }

        Ok(())
    }
}
