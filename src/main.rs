// kbnet - trains feed-forward networks on knowledge-base derived tables
//
// Run with:
//   cargo run --release -- train --config kbnet.toml

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kbnet::report::{JsonReporter, ScoreReporter, TextReporter};
use kbnet::train::load_checkpoint;
use kbnet::{Config, Table, Trainer};

#[derive(Parser, Debug)]
#[command(name = "kbnet")]
#[command(about = "Train feed-forward networks on knowledge-base features", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model with early stopping, then evaluate it on the test split
    Train {
        /// TOML configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// CSV table; overrides `data.path`
        #[arg(long)]
        data: Option<PathBuf>,

        /// Overrides `training.max_epochs`
        #[arg(long)]
        epochs: Option<usize>,

        /// Also write the score history as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Reload the best checkpoint before the test evaluation
        #[arg(long = "restore-best")]
        restore_best: bool,
    },
    /// Show the metadata stored in a checkpoint
    Report {
        #[arg(long)]
        checkpoint: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Train { config, data, epochs, report, restore_best } => {
            run_train(config, data, epochs, report, restore_best)
        }
        Command::Report { checkpoint } => run_report(checkpoint),
    }
}

fn run_train(
    config_path: PathBuf,
    data: Option<PathBuf>,
    epochs: Option<usize>,
    report: Option<PathBuf>,
    restore_best: bool,
) -> Result<()> {
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(path) = data {
        config.data.path = Some(path);
    }
    if let Some(epochs) = epochs {
        config.training.max_epochs = epochs;
    }

    let data_path = config.data.path.clone()
        .context("No dataset given: set data.path in the config or pass --data")?;
    let table = Table::load(&data_path)
        .with_context(|| format!("Failed to read table {}", data_path.display()))?;

    let mut trainer = Trainer::from_config(&config, &table, &config.provider())
        .context("Failed to set up training")?;
    let summary = trainer.fit(config.training.max_epochs).context("Training failed")?;

    let scores = trainer.score_report();
    TextReporter::new(std::io::stdout().lock()).report(&scores)?;
    if let Some(path) = report {
        JsonReporter::new(&path)
            .report(&scores)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if restore_best {
        trainer.restore_best().context("Failed to restore best checkpoint")?;
    }
    let test = trainer.test().context("Test evaluation failed")?;

    println!();
    println!(
        "Trained {} epochs{} (checkpoint: {})",
        summary.epochs_run,
        if summary.stopped_early { ", stopped early" } else { "" },
        trainer.early_stopping().sink().path().display()
    );
    match test.accuracy {
        Some(acc) => println!("Test loss: {:.4}, Test accuracy: {acc:.4}", test.loss),
        None => println!("Test loss: {:.4}", test.loss),
    }
    Ok(())
}

fn run_report(path: PathBuf) -> Result<()> {
    let (metadata, model) = load_checkpoint(&path)
        .with_context(|| format!("Failed to load checkpoint {}", path.display()))?;
    let widths: Vec<String> = model.network().layers.iter().map(|l| l.size.to_string()).collect();
    println!("task:        {}", metadata.task);
    println!("layers:      {} -> {}", metadata.input_dim, widths.join(" -> "));
    println!("best epoch:  {}", metadata.epoch);
    println!("best {}: {:.4}", metadata.mode.metric_name().to_lowercase(), metadata.best_score);
    if !metadata.feature_names.is_empty() {
        println!("features:    {}", metadata.feature_names.join(", "));
    }
    Ok(())
}
