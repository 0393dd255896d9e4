use std::error::Error;

use cdt_core::precision::to_f64;
use cdt_core::{ActionEvaluator, ConfigurationCounts, Couplings, Precision, DEFAULT_PRECISION_BITS};
use cdt_mcmc::S3BulkAction;
use clap::Args;
use serde::Serialize;

use super::FormulaArg;

#[derive(Args, Debug)]
pub struct ActionArgs {
    /// Timelike edges, N1_TL.
    #[arg(long = "n1-tl")]
    pub timelike_edges: u64,
    /// (3,1) plus (1,3) simplices, N3_31.
    #[arg(long = "n3-31")]
    pub three_one: u64,
    /// (2,2) simplices, N3_22.
    #[arg(long = "n3-22")]
    pub two_two: u64,
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub alpha: f64,
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub k: f64,
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub lambda: f64,
    #[arg(long, value_enum, default_value_t = FormulaArg::General)]
    pub formula: FormulaArg,
    /// Working precision in bits.
    #[arg(long, default_value_t = DEFAULT_PRECISION_BITS)]
    pub precision: usize,
}

#[derive(Debug, Serialize)]
struct ActionReport {
    counts: ConfigurationCounts,
    couplings: Couplings,
    coefficients: cdt_mcmc::action::ActionCoefficients,
    action: f64,
}

pub fn run(args: &ActionArgs) -> Result<(), Box<dyn Error>> {
    let couplings = Couplings::new(args.alpha, args.k, args.lambda)?;
    let precision = Precision::new(args.precision)?;
    let counts = ConfigurationCounts::new(args.timelike_edges, args.three_one, args.two_two);
    let evaluator = S3BulkAction::new(args.formula.into());
    let action = evaluator.bulk_action(&counts, &couplings, precision)?;
    let report = ActionReport {
        counts,
        couplings,
        coefficients: evaluator.coefficients(&couplings)?,
        action: to_f64(&action),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
