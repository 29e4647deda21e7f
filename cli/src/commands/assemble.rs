use std::fs;

use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use itertools::Itertools;
use tracing::info;

use super::load_program;

#[derive(Parser, Debug)]
pub struct AssembleOpt {
    /// Input file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,
}

impl AssembleOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.input, "Reading program");
        let source = fs::read_to_string(&self.input)?;
        let program = load_program(&source, true)?;

        println!("{}", program.iter().join(","));

        Ok(())
    }
}
