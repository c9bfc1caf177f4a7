//! Fallwatch CLI: replay pose streams through the fall detector.
//!
//! Usage:
//!   fallwatch run --poses FILE      Monitor a recorded pose stream
//!   fallwatch simulate --output F   Write a synthetic fall sequence
//!   fallwatch config                Show the effective configuration
//!   fallwatch notify-test           Send one test alert

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use fallwatch_common::config::{AppConfig, ScoringStrategy};

mod commands;

#[derive(Parser)]
#[command(
    name = "fallwatch",
    about = "Pose-based fall detection with photo alerts",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Ratio,
    TorsoAngle,
}

impl From<StrategyArg> for ScoringStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Ratio => ScoringStrategy::Ratio,
            StrategyArg::TorsoAngle => ScoringStrategy::TorsoAngle,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor a recorded pose stream
    Run {
        /// Pose stream (JSONL)
        #[arg(long)]
        poses: PathBuf,

        /// Directory of raw frames matching the pose stream
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Scoring strategy (overrides the config file)
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Also save evidence images to this directory
        #[arg(long)]
        save_evidence: Option<PathBuf>,

        /// Log alerts instead of sending them
        #[arg(long)]
        dry_run: bool,

        /// Pace the replay at the stream's frame rate
        #[arg(long)]
        realtime: bool,

        /// Frame rate for --realtime (defaults to the stream header)
        #[arg(long)]
        fps: Option<u32>,

        /// Write every per-frame decision to this JSONL file
        #[arg(long)]
        decisions: Option<PathBuf>,
    },

    /// Write a synthetic fall sequence as a pose stream
    Simulate {
        /// Output file (JSONL)
        #[arg(short, long)]
        output: PathBuf,

        /// Number of falls
        #[arg(long, default_value = "1")]
        falls: usize,

        /// Frame width
        #[arg(long, default_value = "640")]
        width: u32,

        /// Frame height
        #[arg(long, default_value = "480")]
        height: u32,

        /// Frame rate
        #[arg(long, default_value = "30")]
        fps: u32,
    },

    /// Show the effective configuration
    Config {
        /// Show built-in defaults instead
        #[arg(long)]
        defaults: bool,

        /// Write the effective configuration to the standard location
        #[arg(long, conflicts_with = "defaults")]
        save: bool,
    },

    /// Send one test alert through the configured sinks
    NotifyTest {
        /// Message text
        #[arg(short, long, default_value = "Fallwatch test alert")]
        message: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    fallwatch_common::logging::init_logging(&fallwatch_common::logging::level_for_verbosity(
        &config.logging,
        cli.verbose,
    ));

    match cli.command {
        Commands::Run {
            poses,
            frames,
            strategy,
            save_evidence,
            dry_run,
            realtime,
            fps,
            decisions,
        } => {
            commands::run::run(
                config,
                commands::run::RunOptions {
                    poses,
                    frames,
                    strategy: strategy.map(Into::into),
                    save_evidence,
                    dry_run,
                    realtime,
                    fps,
                    decisions,
                },
            )
            .await
        }
        Commands::Simulate {
            output,
            falls,
            width,
            height,
            fps,
        } => commands::simulate::run(output, falls, width, height, fps),
        Commands::Config { defaults, save } => commands::config::run(config, defaults, save),
        Commands::NotifyTest { message } => commands::notify_test::run(&config, message).await,
    }
}
