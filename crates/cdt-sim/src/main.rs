use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    action::{self, ActionArgs},
    config::{self, ConfigArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "cdt-sim", version, about = "CDT Metropolis-Hastings sampler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run seeding and passes on a foliated universe and write the run artefacts.
    Run(RunArgs),
    /// Evaluate the bulk action for explicit counts.
    Action(ActionArgs),
    /// Print a configuration file with every default filled in.
    Config(ConfigArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Action(args) => action::run(&args),
        Command::Config(args) => config::run(&args),
    }
}
