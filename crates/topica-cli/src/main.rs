//! Topica CLI - train a next-topic link predictor.
//!
//! # Usage
//!
//! ```bash
//! # lr 0.001, no infosphere, only new topics
//! topica 0.001 false 0 true
//!
//! # depth-2 infosphere, all topics, custom data location
//! topica 0.0005 true 2 false --root data --models-dir runs -v
//! ```
//!
//! Each run first creates `<models-dir>/<name>_<timestamp>/` with `info.json`,
//! then adds `history.json` and the best checkpoint.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use topica_nn::EncoderConfig;
use topica_train::config::{ExperimentConfig, RunConfig, TrainingConfig};
use topica_train::pipeline;
use topica_train::run::RunDirectory;
use topica_train::trainer::{Phase, ProgressCallback, Trainer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "topica")]
#[command(about = "Train a heterogeneous graph transformer to predict authors' next topics", long_about = None)]
struct Cli {
    /// Adam learning rate
    learning_rate: f64,

    /// Merge precomputed infosphere edges (true/false)
    #[arg(value_parser = parse_bool, action = ArgAction::Set)]
    use_infosphere: bool,

    /// Infosphere expansion depth
    infosphere_depth: u32,

    /// Predict only topics new to each author (true/false)
    #[arg(value_parser = parse_bool, action = ArgAction::Set)]
    only_new: bool,

    /// Dataset root
    #[arg(long, default_value = "../anp_data")]
    root: PathBuf,

    /// Where run directories are created
    #[arg(long, default_value = "../anp_models")]
    models_dir: PathBuf,

    /// Run directory prefix
    #[arg(long, default_value = "topica")]
    name: String,

    /// Last year of training data
    #[arg(long, default_value = "2019")]
    year: u16,

    /// Labeled pairs per batch
    #[arg(long, default_value = "1024")]
    batch_size: usize,

    /// Neighbors sampled per relation, one value per hop
    #[arg(long, value_delimiter = ',', default_value = "20,10")]
    fanout: Vec<usize>,

    /// Epoch cap
    #[arg(long, default_value = "100")]
    max_epochs: usize,

    /// Epochs without validation improvement before stopping
    #[arg(long, default_value = "5")]
    patience: usize,

    /// Hidden width
    #[arg(long, default_value = "32")]
    hidden: usize,

    /// Attention heads
    #[arg(long, default_value = "2")]
    heads: usize,

    /// HGT layers
    #[arg(long, default_value = "1")]
    layers: usize,

    /// Random seed for splits and sampling
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Force CPU
    #[arg(long)]
    cpu: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_bool(s: &str) -> std::result::Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("expected true or false, got '{s}'")),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn progress_bar() -> ProgressCallback {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{msg:>14} [{bar:30}] {pos}/{len} batches")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    Box::new(move |phase: Phase, epoch: usize, done: usize, total: usize| {
        if done == 1 {
            pb.reset();
            pb.set_length(total as u64);
            pb.set_message(format!("epoch {epoch} {phase}"));
        }
        pb.set_position(done as u64);
        if done == total {
            pb.finish_and_clear();
        }
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let run = RunConfig {
        learning_rate: cli.learning_rate,
        use_infosphere: cli.use_infosphere,
        infosphere_depth: cli.infosphere_depth,
        only_new: cli.only_new,
    };
    run.validate()?;

    let exp = ExperimentConfig::default()
        .with_root(&cli.root)
        .with_models_dir(&cli.models_dir)
        .with_run_name(&cli.name)
        .with_year(cli.year)
        .with_batch_size(cli.batch_size)
        .with_fanout(cli.fanout.clone())
        .with_seed(cli.seed)
        .with_cpu(cli.cpu);
    let training = TrainingConfig::default()
        .with_max_epochs(cli.max_epochs)
        .with_patience(cli.patience);
    let encoder = EncoderConfig::default()
        .with_hidden(cli.hidden)
        .with_heads(cli.heads)
        .with_layers(cli.layers);
    info!(?run, "starting run");

    // info.json is written before the dataset is read
    let start = Instant::now();
    let mut dir = RunDirectory::create(&exp.models_dir, &exp.run_name, &run).with_context(|| {
        format!("Failed to create run directory in {}", exp.models_dir.display())
    })?;

    let mut data = pipeline::prepare(&run, &exp)
        .with_context(|| format!("Failed to prepare dataset under {}", exp.root.display()))?;
    info!(elapsed = ?start.elapsed(), "data ready");

    let device = exp.device().context("Failed to select device")?;
    let mut checkpointer = dir.checkpointer();

    let mut trainer = Trainer::new(
        &data.metadata,
        data.target.clone(),
        &encoder,
        run.learning_rate,
        training,
        device,
    )
    .context("Failed to build model")?
    .with_progress(progress_bar());

    let result = trainer
        .fit(
            &mut data.train_loader,
            &mut data.val_loader,
            &mut checkpointer,
            &mut dir,
        )
        .context("Training failed")?;

    println!("Run:            {}", dir.path().display());
    println!("Epochs:         {}", result.epochs_run);
    match result.best_epoch {
        Some(epoch) => println!(
            "Best epoch:     {epoch} (val loss {:.4})",
            result.best_val_loss
        ),
        None => println!("Best epoch:     none"),
    }
    println!("Stopped early:  {}", result.stopped_early);
    println!("Elapsed:        {:.2?}", start.elapsed());
    Ok(())
}
