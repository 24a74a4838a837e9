use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

/// One source file and the output it should produce
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskItem {
    source_path: PathBuf,
    output_path: PathBuf,
}

impl TaskItem {
    /// Derive the task for `source_path`, mirroring its position under `input_root`
    /// into `output_root` and swapping the extension for `output_extension`.
    ///
    /// Returns `None` when the source does not live under `input_root` or has no file stem.
    pub fn derive(
        source_path: &Path,
        input_root: &Path,
        output_root: &Path,
        output_extension: &str,
    ) -> Option<Self> {
        let relative = source_path.strip_prefix(input_root).ok()?;
        let stem = relative.file_stem()?;

        let mut file_name = stem.to_os_string();
        file_name.push(".");
        file_name.push(output_extension);

        let output_path = match relative.parent() {
            Some(parent) => output_root.join(parent).join(file_name),
            None => output_root.join(file_name),
        };

        Some(Self {
            source_path: source_path.to_path_buf(),
            output_path,
        })
    }

    /// Build a task from already computed paths
    pub fn new(source_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            source_path,
            output_path,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Short name for log lines
    pub fn display_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.to_string_lossy().into_owned())
    }

    /// Check if the output file already exists
    pub fn output_exists(&self) -> bool {
        self.output_path.exists()
    }

    /// A unique sibling of the output path used while the output is being written.
    /// The extension is preserved so ffmpeg still picks the right muxer.
    pub fn staging_path(&self) -> PathBuf {
        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match self.output_path.extension() {
            Some(ext) => format!("{}.{}.part.{}", stem, Uuid::new_v4(), ext.to_string_lossy()),
            None => format!("{}.{}.part", stem, Uuid::new_v4()),
        };
        self.output_path.with_file_name(name)
    }
}

/// Whether a file name looks like a staging file left behind by an interrupted write
pub fn is_staging_file(path: &Path) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PATTERN.get_or_init(|| {
        Regex::new(r"^.+\.[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.part(\.[^.]+)?$").ok()
    }) else {
        return false;
    };

    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| pattern.is_match(n))
        .unwrap_or(false)
}
