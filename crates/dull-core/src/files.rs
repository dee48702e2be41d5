use std::{
    collections::HashSet,
    fmt, fs, io,
    path::{Component, Path, PathBuf},
};

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// File pattern that selects a recursive scan of the collector root.
pub const SCAN_ALL: &str = ".";

/// Extension scanned when none is configured.
pub const DEFAULT_EXTENSION: &str = "py";

/// A file read into memory for linting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path as shown to the model, relative to the collector root when possible.
    pub path: String,
    pub content: String,
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "# File: {}\n{}", self.path, self.content)
    }
}

/// Errors raised while resolving file patterns.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("requested file not found: `{pattern}`")]
    NotFound { pattern: String },
    #[error("invalid file pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves user-supplied path patterns into [`SourceFile`] records.
#[derive(Debug, Clone)]
pub struct FileCollector {
    root: PathBuf,
    extension: String,
    exclude: Vec<Pattern>,
}

impl FileCollector {
    /// Create a collector that resolves patterns against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            exclude: Vec::new(),
        }
    }

    /// Restrict recursive scans to files with the given extension (`py`, `.rs`, ...).
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Self {
        let trimmed = extension.as_ref().trim().trim_start_matches('.');
        if !trimmed.is_empty() {
            self.extension = trimmed.to_string();
        }
        self
    }

    /// Drop every file whose path relative to the root, or one of its parent
    /// directories, matches one of `patterns` (`build`, `tests/fixtures`, `*_pb2.py`).
    pub fn with_exclude<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, CollectError> {
        for raw in patterns {
            let normalized = raw
                .as_ref()
                .trim()
                .trim_start_matches("./")
                .trim_end_matches('/');
            if normalized.is_empty() {
                continue;
            }
            let pattern = Pattern::new(normalized).map_err(|err| CollectError::Pattern {
                pattern: raw.as_ref().to_string(),
                message: err.msg.to_string(),
            })?;
            self.exclude.push(pattern);
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolve `patterns` and read every matching file.
    ///
    /// If the list is empty or contains [`SCAN_ALL`] anywhere, the result is the
    /// recursive scan of the root and every other entry is ignored. Otherwise each
    /// entry must resolve to at least one existing file; the first entry that does
    /// not fails the whole call before any file is read. Excluded files are
    /// dropped after resolution, so an explicit path that is also excluded is
    /// skipped rather than reported as missing.
    pub fn collect<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<SourceFile>, CollectError> {
        let scan_all = patterns.is_empty() || patterns.iter().any(|p| p.as_ref() == SCAN_ALL);
        let mut paths = if scan_all {
            let ignored: Vec<&str> = patterns
                .iter()
                .map(AsRef::as_ref)
                .filter(|p| *p != SCAN_ALL)
                .collect();
            if !ignored.is_empty() {
                warn!(?ignored, "`.` selects every file; remaining patterns are ignored");
            }
            self.scan(&self.root)?
        } else {
            let mut seen = HashSet::new();
            let mut paths = Vec::new();
            for pattern in patterns {
                for path in self.resolve(pattern.as_ref())? {
                    if seen.insert(path.clone()) {
                        paths.push(path);
                    }
                }
            }
            paths
        };
        if !self.exclude.is_empty() {
            let before = paths.len();
            paths.retain(|path| !self.is_excluded(path));
            debug!(excluded = before - paths.len(), "applied exclude patterns");
        }

        debug!(count = paths.len(), root = %self.root.display(), "resolved file patterns");
        paths.iter().map(|path| self.read(path)).collect()
    }

    fn resolve(&self, pattern: &str) -> Result<Vec<PathBuf>, CollectError> {
        if is_glob(pattern) {
            let expression =
                Path::new(&Pattern::escape(&self.root.to_string_lossy())).join(pattern);
            let matches = self.expand(&expression, pattern)?;
            if matches.is_empty() {
                return Err(CollectError::NotFound {
                    pattern: pattern.to_string(),
                });
            }
            return Ok(matches);
        }
        let candidate = self.root.join(pattern);
        if candidate.is_dir() {
            return self.scan(&candidate);
        }
        if candidate.is_file() {
            return Ok(vec![candidate]);
        }
        Err(CollectError::NotFound {
            pattern: pattern.to_string(),
        })
    }

    /// Every file with the configured extension below `dir`, skipping hidden entries.
    fn scan(&self, dir: &Path) -> Result<Vec<PathBuf>, CollectError> {
        let pattern = format!(
            "{}/**/*.{}",
            Pattern::escape(&dir.to_string_lossy()),
            self.extension
        );
        let mut paths: Vec<PathBuf> = glob_files(&pattern, &pattern)?
            .into_iter()
            .filter(|path| !is_hidden(path.strip_prefix(dir).unwrap_or(path)))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn expand(&self, expression: &Path, pattern: &str) -> Result<Vec<PathBuf>, CollectError> {
        let mut paths = glob_files(&expression.to_string_lossy(), pattern)?;
        paths.sort();
        Ok(paths)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .ancestors()
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .any(|ancestor| self.exclude.iter().any(|p| p.matches_path(ancestor)))
    }

    fn read(&self, path: &Path) -> Result<SourceFile, CollectError> {
        let content = fs::read_to_string(path).map_err(|source| CollectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let display = path.strip_prefix(&self.root).unwrap_or(path);
        Ok(SourceFile {
            path: display.to_string_lossy().into_owned(),
            content,
        })
    }
}

fn glob_files(expression: &str, pattern: &str) -> Result<Vec<PathBuf>, CollectError> {
    let entries = glob::glob(expression).map_err(|err| CollectError::Pattern {
        pattern: pattern.to_string(),
        message: err.msg.to_string(),
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| CollectError::Read {
            path: err.path().to_path_buf(),
            source: err.into_error(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn is_hidden(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn sample_tree() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("app.py"), "print('app')\n");
        write(&temp.path().join("pkg/service.py"), "def run(): ...\n");
        write(&temp.path().join("pkg/deep/repo.py"), "class Repo: ...\n");
        write(&temp.path().join("pkg/README.md"), "# docs\n");
        write(&temp.path().join(".venv/lib/site.py"), "hidden\n");
        write(&temp.path().join("src/main.rs"), "fn main() {}\n");
        temp
    }

    fn paths(files: &[SourceFile]) -> Vec<String> {
        files.iter().map(|f| f.path.replace('\\', "/")).collect()
    }

    #[test]
    fn sentinel_scans_root_recursively() {
        let temp = sample_tree();
        let files = FileCollector::new(temp.path()).collect(&["."]).unwrap();
        assert_eq!(
            paths(&files),
            vec!["app.py", "pkg/deep/repo.py", "pkg/service.py"]
        );
        assert_eq!(files[0].content, "print('app')\n");
    }

    #[test]
    fn empty_pattern_list_behaves_like_sentinel() {
        let temp = sample_tree();
        let collector = FileCollector::new(temp.path());
        let none: [&str; 0] = [];
        assert_eq!(
            collector.collect(&none).unwrap(),
            collector.collect(&["."]).unwrap()
        );
    }

    #[test]
    fn sentinel_ignores_other_patterns() {
        let temp = sample_tree();
        let collector = FileCollector::new(temp.path());
        let scan = collector.collect(&["."]).unwrap();
        let mixed = collector
            .collect(&[".", "missing.py", "pkg/README.md"])
            .unwrap();
        assert_eq!(scan, mixed);
    }

    #[test]
    fn missing_explicit_path_fails_without_partial_results() {
        let temp = sample_tree();
        let err = FileCollector::new(temp.path())
            .collect(&["app.py", "missing.py"])
            .expect_err("missing file should abort collection");
        assert!(matches!(err, CollectError::NotFound { ref pattern } if pattern == "missing.py"));
        assert!(err.to_string().contains("requested file not found"));
    }

    #[test]
    fn explicit_files_keep_requested_order() {
        let temp = sample_tree();
        let files = FileCollector::new(temp.path())
            .collect(&["pkg/README.md", "app.py", "app.py"])
            .unwrap();
        assert_eq!(paths(&files), vec!["pkg/README.md", "app.py"]);
    }

    #[test]
    fn directory_pattern_expands_to_scan() {
        let temp = sample_tree();
        let files = FileCollector::new(temp.path()).collect(&["pkg"]).unwrap();
        assert_eq!(paths(&files), vec!["pkg/deep/repo.py", "pkg/service.py"]);
    }

    #[test]
    fn glob_pattern_expands_and_must_match() {
        let temp = sample_tree();
        let collector = FileCollector::new(temp.path());
        let files = collector.collect(&["pkg/*.py"]).unwrap();
        assert_eq!(paths(&files), vec!["pkg/service.py"]);

        let err = collector.collect(&["nothing/*.py"]).unwrap_err();
        assert!(matches!(err, CollectError::NotFound { .. }));
    }

    #[test]
    fn extension_override_changes_scan() {
        let temp = sample_tree();
        let files = FileCollector::new(temp.path())
            .with_extension(".rs")
            .collect(&["."])
            .unwrap();
        assert_eq!(paths(&files), vec!["src/main.rs"]);
    }

    #[test]
    fn excluded_directories_and_globs_are_skipped() {
        let temp = sample_tree();
        let collector = FileCollector::new(temp.path())
            .with_exclude(&["pkg/deep/", "./app.py"])
            .unwrap();
        assert_eq!(paths(&collector.collect(&["."]).unwrap()), vec!["pkg/service.py"]);

        let collector = FileCollector::new(temp.path())
            .with_exclude(&["*service*"])
            .unwrap();
        assert_eq!(
            paths(&collector.collect(&["pkg"]).unwrap()),
            vec!["pkg/deep/repo.py"]
        );
    }

    #[test]
    fn excluded_explicit_file_is_dropped_not_missing() {
        let temp = sample_tree();
        let files = FileCollector::new(temp.path())
            .with_exclude(&["pkg"])
            .unwrap()
            .collect(&["app.py", "pkg/service.py"])
            .unwrap();
        assert_eq!(paths(&files), vec!["app.py"]);
    }

    #[test]
    fn invalid_exclude_pattern_is_rejected() {
        let err = FileCollector::new(".").with_exclude(&["[oops"]).unwrap_err();
        assert!(matches!(err, CollectError::Pattern { ref pattern, .. } if pattern == "[oops"));
    }

    #[test]
    fn glob_metacharacters_in_root_are_literal() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("we[ird]?*");
        write(&root.join("keep.py"), "x = 1\n");
        write(&root.join("nested/skip.py"), "y = 2\n");
        let files = FileCollector::new(&root).collect(&["*.py"]).unwrap();
        assert_eq!(paths(&files), vec!["keep.py"]);
    }

    #[test]
    fn non_utf8_file_is_a_read_error() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("bad.py"), [0xff, 0xfe, 0x00]).unwrap();
        let err = FileCollector::new(temp.path())
            .collect(&["bad.py"])
            .unwrap_err();
        assert!(matches!(err, CollectError::Read { .. }));
    }

    #[test]
    fn source_file_renders_with_path_header() {
        let file = SourceFile {
            path: "pkg/service.py".into(),
            content: "def run(): ...".into(),
        };
        assert_eq!(file.to_string(), "# File: pkg/service.py\ndef run(): ...");
    }

    proptest! {
        #[test]
        fn sentinel_anywhere_yields_scan(
            extras in proptest::collection::vec("[a-z]{1,8}(\\.py)?", 0..6),
            position in 0usize..6,
        ) {
            let temp = sample_tree();
            let collector = FileCollector::new(temp.path());
            let mut patterns = extras.clone();
            let index = position.min(patterns.len());
            patterns.insert(index, SCAN_ALL.to_string());

            let scan = collector.collect(&["."]).unwrap();
            let result = collector.collect(&patterns).unwrap();
            prop_assert_eq!(result, scan);
        }
    }
}
