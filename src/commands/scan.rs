use anyhow::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::dispatcher::TaskSource;
use crate::scanner::MediaScanner;

/// What a dry run found
#[derive(Debug, Default, PartialEq)]
pub struct ScanReport {
    pub pending: usize,
    pub already_done: usize,
}

/// Command to list the work a run would do, without starting any worker
pub struct ScanCommand {
    config: Config,
}

impl ScanCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn execute(&self) -> Result<ScanReport> {
        let tasks = MediaScanner::new(&self.config).enumerate()?;

        let mut report = ScanReport::default();
        for task in &tasks {
            if task.output_exists() {
                debug!("Output already exists for: {:?}", task.source_path());
                report.already_done += 1;
            } else {
                info!("➕ {:?} -> {:?}", task.source_path(), task.output_path());
                report.pending += 1;
            }
        }

        info!(
            "✅ Scan complete. {} files pending, {} already produced.",
            report.pending, report.already_done
        );
        Ok(report)
    }
}
