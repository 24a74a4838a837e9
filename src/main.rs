//! # hevcify - Batch HEVC Transcoding CLI
//!
//! Mirrors an input tree of video files into an output tree, re-encoding H.264
//! content to HEVC and copying everything else verbatim.
//!
//! ## Usage
//!
//! ```bash
//! # Transcode a tree with 5 workers
//! hevcify run /media/in /media/out
//!
//! # Show what a run would do
//! hevcify scan /media/in /media/out
//!
//! # Remove staging files left by an interrupted run
//! hevcify clean /media/out
//! ```
//!
//! Exit status: 0 when every file succeeded, 2 when some files failed, 1 on fatal errors.

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hevcify::commands::{clean::CleanCommand, run::RunCommand, scan::ScanCommand};
use hevcify::config::{Config, EncoderSettings, DEFAULT_WORKERS};
use hevcify::progress::ProgressWriter;

/// hevcify - Batch HEVC transcoding CLI
#[derive(Parser)]
#[command(
    name = "hevcify",
    about = "Batch re-encode H.264 video trees to HEVC",
    long_about = "Mirrors an input directory into an output directory, transcoding H.264 video to HEVC and copying everything else. Existing outputs are skipped.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Transcode or copy every file of the input tree into the output tree
    Run {
        /// Directory to read source files from
        input: PathBuf,
        /// Directory to write outputs to (created if missing)
        output: PathBuf,
        /// Number of worker threads
        #[arg(long, short = 'j', env = "HEVCIFY_WORKERS", default_value_t = NonZeroUsize::new(DEFAULT_WORKERS).unwrap_or(NonZeroUsize::MIN))]
        workers: NonZeroUsize,
        /// Run encoders with low priority
        #[arg(long, short)]
        background: bool,
        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
        /// Only process files with these extensions (comma separated)
        #[arg(long, short = 'e', value_delimiter = ',')]
        extensions: Vec<String>,
    },
    /// List pending and already produced files without processing anything
    Scan {
        /// Directory to read source files from
        input: PathBuf,
        /// Directory outputs would be written to
        output: PathBuf,
        /// Only consider files with these extensions (comma separated)
        #[arg(long, short = 'e', value_delimiter = ',')]
        extensions: Vec<String>,
    },
    /// Remove staging files left behind by interrupted runs
    Clean {
        /// Output directory to clean
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; log lines pause the progress bar while they are written
    let progress = MultiProgress::new();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hevcify=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(ProgressWriter::new(progress.clone(), std::io::stderr)),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            workers,
            background,
            json,
            extensions,
        } => {
            info!(
                "Starting run command for input: {:?}, output: {:?}, workers: {}",
                input, output, workers
            );
            let encoder = EncoderSettings {
                background,
                ..EncoderSettings::from_env()
            };
            let config = Config::new(input, output, workers)
                .with_extensions(extensions)
                .with_encoder(encoder);

            match RunCommand::new(config, json)
                .with_progress(progress)
                .execute()
                .await
            {
                Ok(summary) if summary.has_failures() => {
                    warn!("{} of {} files failed", summary.failed, summary.total());
                    std::process::exit(2);
                }
                Ok(_) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Commands::Scan {
            input,
            output,
            extensions,
        } => {
            info!("Starting scan command for input: {:?}, output: {:?}", input, output);
            let config = Config::new(input, output, NonZeroUsize::MIN)
                .with_extensions(extensions)
                .with_encoder(EncoderSettings::from_env());
            ScanCommand::new(config).execute().await.map(|report| {
                println!(
                    "{} pending, {} already produced",
                    report.pending, report.already_done
                );
            })
        }
        Commands::Clean { output } => {
            info!("Starting clean command for output: {:?}", output);
            CleanCommand::new(output).execute().await.map(|_| ())
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
