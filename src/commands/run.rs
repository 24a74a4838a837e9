use anyhow::{anyhow, Result};
use indicatif::MultiProgress;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::ffmpeg::{CodecClassifier, FFmpegTools};
use crate::processor::FileProcessor;
use crate::progress::task_bar;
use crate::report::{render, ResultReporter, Summary};
use crate::scanner::MediaScanner;

/// Command to transcode an input tree into a mirrored output tree
pub struct RunCommand {
    config: Config,
    json: bool,
    progress: MultiProgress,
}

impl RunCommand {
    pub fn new(config: Config, json: bool) -> Self {
        Self {
            config,
            json,
            progress: MultiProgress::new(),
        }
    }

    /// Draw the progress bar through `progress`, shared with the log writer
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = progress;
        self
    }

    pub async fn execute(&self) -> Result<Summary> {
        let classifier = CodecClassifier::new(&self.config.encoder.transcode_codecs)
            .map_err(|e| anyhow!("Invalid transcode codec pattern: {e}"))?;

        if self.config.input_root.is_dir() {
            tokio::fs::create_dir_all(&self.config.output_root).await?;
        }

        let mode = if self.config.encoder.background {
            "Low Priority"
        } else {
            "Foreground"
        };
        info!(
            "✅ Starting {} run with {} workers: {:?} -> {:?}",
            mode, self.config.workers, self.config.input_root, self.config.output_root
        );

        let processor = FileProcessor::new(FFmpegTools::new(self.config.encoder.clone()), classifier);
        let mut dispatcher = Dispatcher::new(
            MediaScanner::new(&self.config),
            processor,
            self.config.workers,
        );
        if !self.json {
            dispatcher = dispatcher.with_progress(self.progress.add(task_bar()));
        }
        let stop = dispatcher.stop_signal();

        let mut handle = tokio::task::spawn_blocking(move || dispatcher.run());
        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = signal::ctrl_c() => {
                warn!("🛑 Shutdown signal received. Finishing in-flight files, remaining files will be marked failed. Press Ctrl-C again to exit immediately.");
                stop.request();
                tokio::select! {
                    joined = &mut handle => joined,
                    _ = signal::ctrl_c() => {
                        error!("🛑 Second shutdown signal received. Exiting now, run `hevcify clean` on the output to remove staging files.");
                        std::process::exit(1);
                    }
                }
            }
        };
        let report = joined.map_err(|e| anyhow!("Dispatcher thread failed: {e}"))??;

        let summary = ResultReporter::from_report(&report).summary();
        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print!("{}", render(&summary));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(input: PathBuf, output: PathBuf) -> Config {
        Config::new(input, output, NonZeroUsize::new(2).unwrap())
    }

    #[tokio::test]
    async fn test_run_nonexistent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let cmd = RunCommand::new(
            config(PathBuf::from("/nonexistent/path"), temp_dir.path().join("out")),
            true,
        );

        assert!(cmd.execute().await.is_err());
        assert!(!temp_dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_run_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        let cmd = RunCommand::new(config(input, temp_dir.path().join("out")), true);

        let summary = cmd.execute().await.unwrap();

        assert_eq!(summary.total(), 0);
        assert_eq!(summary.workers, 0);
        assert!(temp_dir.path().join("out").is_dir());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_codec_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(temp_dir.path().to_path_buf(), temp_dir.path().join("out"));
        config.encoder.transcode_codecs = "(h264".to_string();

        let err = RunCommand::new(config, true).execute().await.unwrap_err();
        assert!(err.to_string().contains("Invalid transcode codec pattern"));
    }
}
