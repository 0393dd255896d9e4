use std::error::Error;
use std::fs;
use std::path::PathBuf;

use cdt_mcmc::{run as run_chain, AttemptBudget, JsonCheckpointSink, RunConfig, RunManifest};
use clap::Args;
use tracing::{error, info};

use super::{write_json, FormulaArg};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML configuration; defaults are used when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output directory for run artefacts.
    #[arg(long)]
    pub out: PathBuf,
    #[arg(long, allow_negative_numbers = true)]
    pub alpha: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub k: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub lambda: Option<f64>,
    #[arg(long, value_enum)]
    pub formula: Option<FormulaArg>,
    #[arg(long)]
    pub passes: Option<usize>,
    /// Fixed number of attempts per pass instead of one per simplex.
    #[arg(long)]
    pub attempts: Option<u64>,
    /// Simplices in the initial foliated universe.
    #[arg(long)]
    pub simplices: Option<u64>,
    #[arg(long)]
    pub timeslices: Option<u64>,
    /// Checkpoint every N passes; 0 disables checkpoints.
    #[arg(long)]
    pub checkpoint: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Speculative batch size; 1 runs the sequential driver.
    #[arg(long)]
    pub batch: Option<usize>,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = load_config(args)?;
    let checkpoint_dir = config
        .checkpoint
        .directory
        .clone()
        .unwrap_or_else(|| args.out.join("checkpoints"));
    let mut sink = JsonCheckpointSink::new(checkpoint_dir, config.checkpoint.max_to_keep);

    let output = match run_chain(&config, &mut sink) {
        Ok(output) => output,
        Err(failure) => {
            let (err, universe) = failure.into_parts();
            if let Some(universe) = universe {
                error!(
                    universe = %universe.canonical_hash(),
                    cardinalities = ?universe.cardinalities(),
                    "run failed; triangulation at failure"
                );
            }
            return Err(err.into());
        }
    };
    let universe_hash = output.universe.canonical_hash();
    info!(
        passes = output.summary.passes_completed,
        attempted = output.summary.total_attempted,
        successful = output.summary.total_successful,
        universe = %universe_hash,
        "run complete"
    );

    write_json(args.out.join("summary.json"), &output.summary)?;
    let manifest = RunManifest::new(
        &config,
        output.summary.clone(),
        Some(universe_hash),
        sink.written().to_vec(),
    )?;
    manifest.write(&args.out.join("manifest.json"))?;
    fs::write(args.out.join("config.yaml"), config.to_yaml()?)?;

    println!("{}", serde_json::to_string_pretty(&output.summary)?);
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<RunConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(k) = args.k {
        config.k = k;
    }
    if let Some(lambda) = args.lambda {
        config.lambda = lambda;
    }
    if let Some(formula) = args.formula {
        config.action = formula.into();
    }
    if let Some(passes) = args.passes {
        config.passes = passes;
    }
    if let Some(attempts) = args.attempts {
        config.budget = AttemptBudget::Fixed { attempts };
    }
    if let Some(simplices) = args.simplices {
        config.universe.simplices = simplices;
    }
    if let Some(timeslices) = args.timeslices {
        config.universe.timeslices = timeslices;
    }
    if let Some(interval) = args.checkpoint {
        config.checkpoint.interval = interval;
    }
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    if let Some(batch) = args.batch {
        config.parallel.batch_size = batch;
    }
    Ok(config)
}
