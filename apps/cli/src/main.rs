//! Detprep CLI - prepare datasets and configuration for object-detection training
//!
//! Each subcommand runs one independent preparation step for a training run:
//! path computation, dataset export, label map creation, class counting and
//! base config download.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{dataset, download, models, train, RunArgs};

/// Detprep - object-detection training preparation
#[derive(Parser, Debug)]
#[command(
    name = "detprep",
    author,
    version,
    about = "Prepare datasets, label maps and pipeline configs for TensorFlow object-detection training"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Config file (overrides ./detprep.toml and ~/.detprep/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new training run
    ///
    /// Checks that the training name is unused and the base model exists, then
    /// prints every path the run will use.
    Train {
        #[command(flatten)]
        run: RunArgs,

        /// Output paths as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the paths for a training run without any checks
    Paths {
        #[command(flatten)]
        run: RunArgs,

        /// Output paths as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split a dataset into validation/training partitions and export TFRecords
    Export {
        #[command(flatten)]
        run: RunArgs,

        /// Dataset name in the dataset store
        #[arg(long)]
        dataset: String,

        /// Label field holding ground-truth detections
        #[arg(long)]
        label_field: String,

        /// Fraction of samples used for training (defaults to config, 0.8)
        #[arg(long)]
        training_fraction: Option<f64>,

        /// Take class ids from the run's saved label map
        #[arg(long)]
        use_label_map: bool,
    },

    /// Build the class-name to id mapping for a dataset
    LabelMap {
        #[command(flatten)]
        run: RunArgs,

        /// Dataset name in the dataset store
        #[arg(long)]
        dataset: String,

        /// Label field holding ground-truth detections
        #[arg(long)]
        label_field: String,

        /// Write the mapping to the run's label map file
        #[arg(long)]
        save: bool,
    },

    /// Count the classes in the run's saved label map
    CountClasses {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Download the base pipeline config for the chosen model
    DownloadConfig {
        #[command(flatten)]
        run: RunArgs,
    },

    /// List the base models in the catalog
    Models {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let prep_config = config::load_config(args.config.as_deref())?;

    match command {
        Command::Train { run, json } => train::execute(&prep_config, &run, json)?,
        Command::Paths { run, json } => train::paths(&prep_config, &run, json)?,
        Command::Export { run, dataset: dataset_name, label_field, training_fraction, use_label_map } => {
            let fraction = training_fraction.unwrap_or(prep_config.training_fraction);
            dataset::export(&prep_config, &run, &dataset_name, &label_field, fraction, use_label_map)?;
        }
        Command::LabelMap { run, dataset: dataset_name, label_field, save } => {
            dataset::label_map(&prep_config, &run, &dataset_name, &label_field, save)?;
        }
        Command::CountClasses { run } => dataset::count_classes(&prep_config, &run)?,
        Command::DownloadConfig { run } => download::execute(&prep_config, &run)?,
        Command::Models { json } => models::execute(&prep_config, json)?,
    }

    Ok(())
}
