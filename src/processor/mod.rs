use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ProcessingError;
use crate::ffmpeg::{CodecClassifier, MediaTools};
use crate::job::TaskItem;
use crate::worker::{Disposition, TaskProcessor};

/// Turns one task into a finished output file.
///
/// Outputs are first written to a staging file next to the destination and
/// renamed into place, so an existing output is always a complete one.
pub struct FileProcessor<M> {
    tools: M,
    classifier: CodecClassifier,
}

impl<M: MediaTools> FileProcessor<M> {
    pub fn new(tools: M, classifier: CodecClassifier) -> Self {
        Self { tools, classifier }
    }

    fn ensure_output_dir(&self, output: &Path) -> Result<(), ProcessingError> {
        let Some(parent) = output.parent() else {
            return Ok(());
        };
        // create_dir_all tolerates a concurrent creator winning the race
        fs::create_dir_all(parent).map_err(|e| ProcessingError::CreateDir {
            path: parent.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn copy_verbatim(&self, input: &Path, staging: &Path) -> Result<(), ProcessingError> {
        fs::copy(input, staging)
            .map(|_| ())
            .map_err(|e| ProcessingError::Copy {
                path: input.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

impl<M: MediaTools> TaskProcessor for FileProcessor<M> {
    fn process(&self, task: &TaskItem) -> Result<Disposition, ProcessingError> {
        let output = task.output_path();
        self.ensure_output_dir(output)?;

        if task.output_exists() {
            return Ok(Disposition::Skipped);
        }

        let codec = self.tools.probe_video_codec(task.source_path())?;
        debug!(
            "Probed {}: {}",
            task.display_name(),
            codec.as_deref().unwrap_or("no video stream")
        );

        let staging = StagingFile::new(task.staging_path());
        let disposition = if self.classifier.needs_transcode(codec.as_deref()) {
            self.tools.transcode(task.source_path(), staging.path())?;
            Disposition::Converted
        } else {
            self.copy_verbatim(task.source_path(), staging.path())?;
            Disposition::Copied
        };

        staging
            .commit(output)
            .map_err(|e| ProcessingError::Commit {
                path: output.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(disposition)
    }
}

/// A partially written output that is deleted unless committed
struct StagingFile {
    path: PathBuf,
    committed: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically move the staging file onto its final name
    fn commit(mut self, destination: &Path) -> io::Result<()> {
        fs::rename(&self.path, destination)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staging file {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staging file {:?}: {}", self.path, e),
        }
    }
}
