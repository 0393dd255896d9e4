pub mod action;
pub mod config;
pub mod run;

use std::error::Error;
use std::fs;
use std::path::Path;

use cdt_mcmc::ActionFormula;
use clap::ValueEnum;

/// Command-line spelling of [`ActionFormula`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormulaArg {
    General,
    AlphaOne,
    AlphaMinusOne,
}

impl From<FormulaArg> for ActionFormula {
    fn from(value: FormulaArg) -> Self {
        match value {
            FormulaArg::General => ActionFormula::General,
            FormulaArg::AlphaOne => ActionFormula::AlphaOne,
            FormulaArg::AlphaMinusOne => ActionFormula::AlphaMinusOne,
        }
    }
}

pub fn write_json<P: AsRef<Path>, T: serde::Serialize>(
    path: P,
    value: &T,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
