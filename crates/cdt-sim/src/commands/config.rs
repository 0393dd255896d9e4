use std::error::Error;
use std::path::PathBuf;

use cdt_mcmc::RunConfig;
use clap::Args;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Existing configuration to normalise; defaults are printed when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &ConfigArgs) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    config.parameters()?;
    config.precision()?;
    print!("{}", config.to_yaml()?);
    Ok(())
}
