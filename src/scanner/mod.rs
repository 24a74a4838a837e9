use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::dispatcher::TaskSource;
use crate::error::EnumerationError;
use crate::ignore::IgnoreFilter;
use crate::job::{is_staging_file, TaskItem};

/// Enumerates the input tree into a complete, deduplicated task list
pub struct MediaScanner {
    input_root: PathBuf,
    output_root: PathBuf,
    extensions: Vec<String>,
    output_extension: String,
}

impl MediaScanner {
    pub fn new(config: &Config) -> Self {
        Self {
            input_root: config.input_root.clone(),
            output_root: config.output_root.clone(),
            extensions: config.extensions.clone(),
            output_extension: config.encoder.output_extension.clone(),
        }
    }

    /// Where the output root sits below the input root, if it does. Both roots
    /// are resolved first, so `.` and `out` are recognised as nested.
    fn nested_output(&self) -> Option<PathBuf> {
        let input = resolve(&self.input_root)?;
        let output = resolve(&self.output_root)?;
        output
            .strip_prefix(&input)
            .ok()
            .filter(|relative| !relative.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(extension) = path.extension() else {
            return false;
        };
        if is_staging_file(path) {
            return false;
        }
        self.extensions.is_empty()
            || self
                .extensions
                .contains(&extension.to_string_lossy().to_lowercase())
    }
}

impl TaskSource for MediaScanner {
    fn enumerate(&self) -> Result<Vec<TaskItem>, EnumerationError> {
        if !self.input_root.exists() {
            return Err(EnumerationError::MissingRoot(self.input_root.clone()));
        }
        if !self.input_root.is_dir() {
            return Err(EnumerationError::NotADirectory(self.input_root.clone()));
        }

        info!("🔎 Scanning directory: {:?}", self.input_root);
        let nested_output = self.nested_output();
        let mut filter = IgnoreFilter::empty(&self.input_root);
        let mut ignore_error = None;

        let walker = WalkDir::new(&self.input_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                let path = entry.path();
                if !entry.file_type().is_dir() {
                    return !filter.should_ignore(path);
                }
                if entry.depth() > 0 {
                    // The output tree may live inside the input tree
                    let in_output = nested_output.as_deref().is_some_and(|nested| {
                        path.strip_prefix(&self.input_root)
                            .is_ok_and(|relative| relative.starts_with(nested))
                    });
                    if in_output {
                        debug!("Not descending into output tree {:?}", path);
                        return false;
                    }
                    if filter.should_skip_dir(path) {
                        return false;
                    }
                }
                match filter.load_dir(path) {
                    Ok(()) => true,
                    Err(e) => {
                        ignore_error.get_or_insert(e);
                        false
                    }
                }
            });

        let mut sources = Vec::new();
        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && self.accepts(path) {
                sources.push(path.to_path_buf());
            }
        }
        if let Some(e) = ignore_error {
            return Err(e);
        }
        sources.sort();
        sources.dedup();

        let mut claimed_outputs = HashSet::new();
        let mut tasks = Vec::with_capacity(sources.len());
        for source in sources {
            let Some(task) = TaskItem::derive(
                &source,
                &self.input_root,
                &self.output_root,
                &self.output_extension,
            ) else {
                continue;
            };
            if !claimed_outputs.insert(task.output_path().to_path_buf()) {
                warn!(
                    "⚠️ SKIPPING: {:?} maps to {:?}, which another source already produces",
                    source,
                    task.output_path()
                );
                continue;
            }
            tasks.push(task);
        }

        info!("Found {} files to process", tasks.len());
        Ok(tasks)
    }
}

/// Absolute form of `path`, with symlinks resolved when it exists
fn resolve(path: &Path) -> Option<PathBuf> {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .ok()
}
