//! Bookbandit command-line tool
//!
//! Inspects persisted models, replays logged feedback into a model and ranks
//! candidates offline with the same core the recommender service embeds.

use anyhow::{bail, Context};
use bookbandit_core::{
    ArmId, ContextVector, FeedbackSample, LinearArmBank, PersistedBankState, RecommenderConfig,
    RuntimeCoordinator,
};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bookbandit")]
#[command(about = "LinUCB book recommender: inspect, replay and rank", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Model file, overrides config and BOOKBANDIT_MODEL_PATH
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show dimension, alpha and per-arm parameter norms of a model file
    Inspect,

    /// Apply logged feedback (JSON lines of {context, arm_id, reward}) to the model
    Replay {
        /// JSON array of catalog arm ids
        #[arg(long)]
        catalog: PathBuf,

        /// JSON-lines feedback log
        #[arg(long)]
        feedback: PathBuf,
    },

    /// Rank candidates with the persisted model
    Rank {
        /// JSON array of candidate arm ids (also used as the catalog)
        #[arg(long)]
        catalog: PathBuf,

        /// JSON array of context vectors, one per candidate
        #[arg(long)]
        contexts: PathBuf,

        /// Number of ids to return
        #[arg(short, default_value_t = 10)]
        k: usize,
    },
}

/// Resolve configuration: CLI flag > environment > file > defaults
fn load_config(cli: &Cli) -> anyhow::Result<RecommenderConfig> {
    let mut config = match &cli.config {
        Some(path) => RecommenderConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RecommenderConfig::default(),
    }
    .with_env_overrides()?;

    if let Some(path) = &cli.model_path {
        config.model_path = path.clone();
    }
    config.validate()?;

    debug!("Using model file {}", config.model_path.display());
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn inspect(config: &RecommenderConfig) -> anyhow::Result<()> {
    let path = &config.model_path;
    let Some(state) = PersistedBankState::read_from(path)? else {
        println!("No model at {}", path.display());
        return Ok(());
    };

    let bank = LinearArmBank::from_state(&state)
        .with_context(|| format!("model at {} is inconsistent", path.display()))?;

    println!("Model:  {}", path.display());
    println!("d:      {}", bank.dim());
    println!("alpha:  {}", bank.alpha());
    println!("arms:   {}", bank.len());
    println!();

    let mut trained = 0;
    for arm_id in bank.arm_ids() {
        let Some(arm) = bank.arm(arm_id) else {
            continue;
        };
        if arm.is_untrained() {
            continue;
        }
        trained += 1;
        let norm = arm.theta().iter().map(|v| v * v).sum::<f64>().sqrt();
        println!("  {:>10}  |theta| = {:.4}", arm_id, norm);
    }
    println!();
    println!("{} of {} arms have feedback", trained, bank.len());

    Ok(())
}

async fn replay(
    config: RecommenderConfig,
    catalog_path: &Path,
    feedback_path: &Path,
) -> anyhow::Result<()> {
    let catalog: Vec<ArmId> = read_json(catalog_path)?;
    let coordinator = RuntimeCoordinator::init(config, &catalog).await?;
    info!(
        "Replaying {} into model with d={}",
        feedback_path.display(),
        coordinator.dim()
    );

    let file = std::fs::File::open(feedback_path)
        .with_context(|| format!("failed to open {}", feedback_path.display()))?;

    let (mut applied, mut skipped) = (0usize, 0usize);
    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: FeedbackSample = match serde_json::from_str(&line) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Line {}: not a feedback record: {}", line_no + 1, e);
                skipped += 1;
                continue;
            }
        };
        match coordinator.record_feedback(sample.context, sample.arm_id, sample.reward) {
            Ok(_) => applied += 1,
            Err(e) => {
                warn!("Line {}: rejected: {}", line_no + 1, e);
                skipped += 1;
            }
        }
    }

    coordinator.shutdown().await?;
    println!(
        "Replayed {} samples ({} skipped) into {}",
        applied,
        skipped,
        coordinator.config().model_path.display()
    );
    Ok(())
}

async fn rank(
    config: RecommenderConfig,
    catalog_path: &Path,
    contexts_path: &Path,
    k: usize,
) -> anyhow::Result<()> {
    let candidates: Vec<ArmId> = read_json(catalog_path)?;
    let contexts: Vec<ContextVector> = read_json(contexts_path)?;
    if candidates.len() != contexts.len() {
        bail!(
            "{} candidates but {} contexts",
            candidates.len(),
            contexts.len()
        );
    }

    let coordinator = RuntimeCoordinator::init(config, &candidates).await?;
    let ranked = coordinator.recommend(&candidates, &contexts, k)?;
    println!("{}", serde_json::to_string(&ranked)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::new(format!(
        "bookbandit={level},bookbandit_core={level}",
        level = level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Logs on stderr, results on stdout
        .init();

    debug!("Bookbandit v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Inspect => inspect(&config),
        Commands::Replay { catalog, feedback } => replay(config, &catalog, &feedback).await,
        Commands::Rank {
            catalog,
            contexts,
            k,
        } => rank(config, &catalog, &contexts, k).await,
    }
}
