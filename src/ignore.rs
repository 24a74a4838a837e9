use glob::Pattern;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::EnumerationError;

/// Name of the per-directory ignore file
pub const IGNORE_FILE_NAME: &str = ".hevcifyignore";

/// Gitignore-style exclusion rules collected from `.hevcifyignore` files.
///
/// Rules in a nested file apply to that directory and below; later rules win,
/// deeper files are evaluated after shallower ones.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    rules_by_dir: HashMap<PathBuf, Vec<IgnoreRule>>,
    root: PathBuf,
}

#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: Pattern,
    original: String,
    negation: bool,
    directory_only: bool,
}

impl IgnoreFilter {
    /// A filter that ignores nothing until directories are loaded into it
    pub fn empty(root: &Path) -> Self {
        Self {
            rules_by_dir: HashMap::new(),
            root: root.to_path_buf(),
        }
    }

    /// Add the rules of `dir`'s ignore file, if it has one. They apply to
    /// entries below `dir`, so load a directory before walking into it.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), EnumerationError> {
        let ignore_file = dir.join(IGNORE_FILE_NAME);
        if !ignore_file.is_file() {
            return Ok(());
        }
        let content = fs::read_to_string(&ignore_file)
            .map_err(|e| EnumerationError::Ignore(format!("{}: {}", ignore_file.display(), e)))?;

        let rules: Vec<IgnoreRule> = content
            .lines()
            .enumerate()
            .filter_map(|(line_num, line)| {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return None;
                }
                match IgnoreRule::parse(trimmed) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        debug!(
                            "Invalid pattern '{}' in {}:{}: {}",
                            trimmed,
                            ignore_file.display(),
                            line_num + 1,
                            e
                        );
                        None
                    }
                }
            })
            .collect();

        debug!("Loaded {} patterns from {:?}", rules.len(), ignore_file);
        if !rules.is_empty() {
            self.rules_by_dir.insert(dir.to_path_buf(), rules);
        }
        Ok(())
    }

    /// Whether a file (or directory) is excluded, including through an ignored ancestor
    pub fn should_ignore(&self, path: &Path) -> bool {
        let is_dir = path.is_dir();

        let ancestor_ignored = path
            .ancestors()
            .skip(1)
            .take_while(|ancestor| *ancestor != self.root && ancestor.starts_with(&self.root))
            .any(|ancestor| self.evaluate(ancestor, true));
        if ancestor_ignored {
            trace!("{:?} ignored through a parent directory", path);
            return true;
        }

        self.evaluate(path, is_dir)
    }

    /// Whether traversal should prune this directory. Ancestors are not rechecked,
    /// since walkdir never descends into an already pruned parent.
    pub fn should_skip_dir(&self, path: &Path) -> bool {
        path != self.root && self.evaluate(path, true)
    }

    fn evaluate(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let root_relative = to_slash(relative);

        let mut dirs: Vec<&PathBuf> = self
            .rules_by_dir
            .keys()
            .filter(|dir| path.starts_with(dir))
            .collect();
        dirs.sort_by_key(|dir| dir.components().count());

        let mut ignored = false;
        for dir in dirs {
            let dir_relative = path
                .strip_prefix(dir)
                .map(to_slash)
                .unwrap_or_else(|_| root_relative.clone());

            for rule in &self.rules_by_dir[dir] {
                if rule.matches(&dir_relative, is_dir) || rule.matches(&root_relative, is_dir) {
                    ignored = !rule.negation;
                    trace!(
                        "Pattern '{}' from {} {} '{}'",
                        rule.original,
                        dir.display(),
                        if ignored { "ignores" } else { "includes" },
                        root_relative
                    );
                }
            }
        }
        ignored
    }
}

impl IgnoreRule {
    fn parse(line: &str) -> Result<Self, glob::PatternError> {
        let (negation, rest) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (directory_only, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        Ok(Self {
            pattern: Pattern::new(&gitignore_to_glob(rest))?,
            original: rest.to_string(),
            negation,
            directory_only,
        })
    }

    fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        if self.pattern.matches(path) {
            return true;
        }

        // Slash-free patterns also match on the bare file name
        !self.original.contains('/')
            && Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| self.pattern.matches(n))
                .unwrap_or(false)
    }
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// A leading slash anchors at the ignore file's directory; anything else matches at any depth
fn gitignore_to_glob(pattern: &str) -> String {
    match pattern.strip_prefix('/') {
        Some(anchored) => anchored.to_string(),
        None => format!("**/{pattern}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(root: &Path, dirs: &[&str]) -> IgnoreFilter {
        let mut filter = IgnoreFilter::empty(root);
        filter.load_dir(root).unwrap();
        for dir in dirs {
            filter.load_dir(&root.join(dir)).unwrap();
        }
        filter
    }

    #[test]
    fn test_basic_ignore_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(IGNORE_FILE_NAME), "*.nfo\nSamples/\nextras").unwrap();
        fs::create_dir_all(root.join("Samples")).unwrap();
        fs::create_dir_all(root.join("extras")).unwrap();
        fs::create_dir_all(root.join("Movies")).unwrap();
        fs::write(root.join("movie.nfo"), "").unwrap();
        fs::write(root.join("movie.mkv"), "").unwrap();

        let filter = load(root, &[]);

        assert!(filter.should_ignore(&root.join("movie.nfo")));
        assert!(filter.should_ignore(&root.join("Samples")));
        assert!(filter.should_ignore(&root.join("extras")));
        assert!(!filter.should_ignore(&root.join("movie.mkv")));
        assert!(!filter.should_ignore(&root.join("Movies")));
    }

    #[test]
    fn test_nested_ignore_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(IGNORE_FILE_NAME), "*.nfo").unwrap();
        fs::create_dir_all(root.join("Series/old")).unwrap();
        fs::write(root.join("Series").join(IGNORE_FILE_NAME), "old/\n!keep.nfo").unwrap();
        fs::write(root.join("info.nfo"), "").unwrap();
        fs::write(root.join("Series/show.mkv"), "").unwrap();
        fs::write(root.join("Series/old/episode.mkv"), "").unwrap();
        fs::write(root.join("Series/keep.nfo"), "").unwrap();

        let filter = load(root, &["Series", "Series/old"]);

        assert!(filter.should_ignore(&root.join("info.nfo")));
        assert!(filter.should_ignore(&root.join("Series/old")));
        assert!(filter.should_ignore(&root.join("Series/old/episode.mkv")));
        assert!(!filter.should_ignore(&root.join("Series/show.mkv")));
        assert!(!filter.should_ignore(&root.join("Series/keep.nfo")));
    }

    #[test]
    fn test_directory_only_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(IGNORE_FILE_NAME), "temp/").unwrap();
        fs::create_dir_all(root.join("temp")).unwrap();
        fs::write(root.join("temp_file"), "").unwrap();

        let filter = load(root, &[]);

        assert!(filter.should_ignore(&root.join("temp")));
        assert!(!filter.should_ignore(&root.join("temp_file")));
    }

    #[test]
    fn test_negation_patterns() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(IGNORE_FILE_NAME), "*.mkv\n!important.mkv").unwrap();
        fs::write(root.join("video.mkv"), "").unwrap();
        fs::write(root.join("important.mkv"), "").unwrap();
        fs::write(root.join("clip.mov"), "").unwrap();

        let filter = load(root, &[]);

        assert!(filter.should_ignore(&root.join("video.mkv")));
        assert!(!filter.should_ignore(&root.join("important.mkv")));
        assert!(!filter.should_ignore(&root.join("clip.mov")));
    }

    #[test]
    fn test_gitignore_to_glob() {
        assert_eq!(gitignore_to_glob("*.nfo"), "**/*.nfo");
        assert_eq!(gitignore_to_glob("/Samples"), "Samples");
        assert_eq!(gitignore_to_glob("extras"), "**/extras");
        assert_eq!(gitignore_to_glob("path/to/file"), "**/path/to/file");
    }

    #[test]
    fn test_should_skip_dir() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join(IGNORE_FILE_NAME), "Samples/\n*.nfo\nextras").unwrap();
        fs::create_dir_all(root.join("Samples")).unwrap();
        fs::create_dir_all(root.join("extras")).unwrap();
        fs::create_dir_all(root.join("Movies")).unwrap();

        let filter = load(root, &[]);

        assert!(filter.should_skip_dir(&root.join("Samples")));
        assert!(filter.should_skip_dir(&root.join("extras")));
        assert!(!filter.should_skip_dir(&root.join("Movies")));
        assert!(!filter.should_skip_dir(root));
    }

    #[test]
    fn test_load_dir_without_ignore_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut filter = IgnoreFilter::empty(temp_dir.path());

        filter.load_dir(temp_dir.path()).unwrap();
        filter.load_dir(&temp_dir.path().join("missing")).unwrap();

        assert!(filter.rules_by_dir.is_empty());
    }

    #[test]
    fn test_empty_filter_ignores_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let filter = IgnoreFilter::empty(temp_dir.path());
        assert!(!filter.should_ignore(&temp_dir.path().join("anything.mkv")));
    }
}
