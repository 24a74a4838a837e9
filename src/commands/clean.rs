use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::job::is_staging_file;

/// Command to remove staging files left behind by interrupted runs
pub struct CleanCommand {
    output_root: PathBuf,
}

impl CleanCommand {
    pub fn new(output_root: PathBuf) -> Self {
        Self { output_root }
    }

    /// Returns the number of files removed
    pub async fn execute(&self) -> Result<usize> {
        if !self.output_root.exists() {
            return Err(anyhow!(
                "Output directory does not exist: {:?}",
                self.output_root
            ));
        }

        if !self.output_root.is_dir() {
            return Err(anyhow!("Path is not a directory: {:?}", self.output_root));
        }

        info!("🧹 Cleaning up staging files...");

        let mut removed = 0;
        for entry in WalkDir::new(&self.output_root).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() && is_staging_file(entry.path()) {
                tokio::fs::remove_file(entry.path()).await?;
                debug!("Removed staging file: {:?}", entry.path());
                removed += 1;
            }
        }

        info!("✅ Cleanup complete. Removed {} staging files.", removed);
        Ok(removed)
    }
}
