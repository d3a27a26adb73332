use std::path::PathBuf;

use clap::Parser;
use log::info;

use resistance_estimation::batch::least_squares;
use resistance_estimation::config::Config;
use resistance_estimation::history::write_csv_file;
use resistance_estimation::{Dataset, RecursiveEstimator, Result};

/// Estimate the resistance and offset of a resistor from current/voltage readings
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Csv file with `current` and `voltage` columns
    #[arg(short, long)]
    measurements: PathBuf,

    /// Toml file holding the prior and noise variance, defaults to the reference scenario
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the estimate after every step to this csv file
    #[arg(long)]
    history: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let dataset = Dataset::from_csv_file(&args.measurements)?;
    info!("loaded {} measurements", dataset.len());

    let mut estimator = RecursiveEstimator::initialize_with(
        config.prior_mean(),
        config.prior_covariance(),
        config.settings,
    )?;
    estimator.process(&dataset, config.noise_variance)?;

    let (resistance_variance, offset_variance) = estimator.latest().variances();
    println!(
        "recursive: R = {:.4} +/- {:.4} Ohm, b = {:.4} +/- {:.4} V",
        estimator.resistance(),
        resistance_variance.sqrt(),
        estimator.offset(),
        offset_variance.sqrt()
    );

    match least_squares(&dataset) {
        Ok(batch) => println!(
            "batch:     R = {:.4} Ohm, b = {:.4} V",
            batch.resistance(),
            batch.offset()
        ),
        Err(err) => log::warn!("no batch reference solution: {err}"),
    }

    if let Some(path) = &args.history {
        write_csv_file(estimator.history(), path)?;
    }

    Ok(())
}
