//! Discovery and loading of specification documents on disk.
//!
//! Paths are enumerated in a fixed, sorted order and parsed in parallel; the
//! results are merged back in that order so identical inputs always give an
//! identical set of specifications.

use std::{
    fmt, io,
    path::{Component, Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::domain::{header::InsertError, Grammar, Specification};

/// Errors that can occur when loading a single specification document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file extension does not select a grammar.
    #[error("unsupported specification format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    /// The header tree could not be built.
    #[error("failed to build header tree for {}: {source}", path.display())]
    Tree {
        /// The document being parsed.
        path: PathBuf,
        /// The underlying error.
        source: InsertError,
    },
}

impl LoadError {
    /// Whether the error is an internal defect that must abort the run,
    /// rather than a problem with one file.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Tree { .. })
    }
}

/// A file that was skipped while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// The file that was skipped.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// The outcome of loading a set of specification documents.
#[derive(Debug, Default)]
pub struct SpecLoad {
    /// Parsed specifications, ordered by source URI.
    pub specifications: Vec<Specification>,
    /// Files that could not be loaded.
    pub skipped: Vec<Skipped>,
}

/// Expands configured specification paths into a sorted list of documents.
///
/// Directories are walked recursively for files with a supported extension.
/// Plain file entries are kept as given, even if they do not exist, so that
/// a missing file is reported when it is loaded.
#[must_use]
pub fn collect_spec_paths(root: &Path, entries: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = entries
        .iter()
        .map(|entry| root.join(entry))
        .flat_map(|path| {
            if path.is_dir() {
                WalkDir::new(&path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                    .filter(|entry| Grammar::from_path(entry.path()).is_some())
                    .map(walkdir::DirEntry::into_path)
                    .collect()
            } else {
                vec![path]
            }
        })
        .collect();

    paths.sort();
    paths.dedup();
    paths
}

/// Loads and parses every specification named by `entries`.
///
/// Unreadable or unsupported files are skipped with a warning; the rest of
/// the run continues.
///
/// # Errors
///
/// Returns an error if a header tree cannot be built, since that signals a
/// defect rather than bad input.
#[instrument(level = "debug", skip(entries))]
pub fn load_specifications(root: &Path, entries: &[PathBuf]) -> Result<SpecLoad, LoadError> {
    let paths = collect_spec_paths(root, entries);
    debug!(count = paths.len(), "loading specifications");

    let (loaded, failed): (Vec<_>, Vec<_>) = paths
        .par_iter()
        .map(|path| load_specification(root, path))
        .partition(Result::is_ok);

    let mut specifications: Vec<Specification> =
        loaded.into_iter().filter_map(Result::ok).collect();
    specifications.sort_by(|a, b| a.source_uri().cmp(b.source_uri()));

    let mut skipped = Vec::new();
    for error in failed.into_iter().filter_map(Result::err) {
        if error.is_fatal() {
            return Err(error);
        }
        let path = match &error {
            LoadError::Io { path, .. } | LoadError::Tree { path, .. } => path.clone(),
            LoadError::UnsupportedFormat(path) => path.clone(),
        };
        warn!("skipping specification: {error}");
        skipped.push(Skipped {
            path,
            reason: error.to_string(),
        });
    }

    Ok(SpecLoad {
        specifications,
        skipped,
    })
}

/// Reads and parses one specification document.
///
/// # Errors
///
/// Returns an error if the file has an unsupported extension, cannot be read,
/// or its header tree cannot be built.
pub fn load_specification(root: &Path, path: &Path) -> Result<Specification, LoadError> {
    let grammar =
        Grammar::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source_uri = source_uri(root, path);
    debug!(%source_uri, %grammar, "parsing specification");

    Specification::parse(&source_uri, &text, grammar).map_err(|source| LoadError::Tree {
        path: path.to_path_buf(),
        source,
    })
}

/// The document path used as a specification's source URI: relative to
/// `root` where possible, with `/` separators.
#[must_use]
pub fn source_uri(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::domain::Report;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "specs/b.md", "# B\n\nIt MUST work.\n");
        write(tmp.path(), "specs/a.md", "# A\n\nIt SHOULD work.\n");
        write(
            tmp.path(),
            "specs/nested/rfc.txt",
            "1.  Intro\n\n   Peers MAY talk.\n",
        );
        write(tmp.path(), "specs/notes.rst", "ignored");
        tmp
    }

    #[test]
    fn collects_supported_files_sorted() {
        let tmp = fixture();
        let paths = collect_spec_paths(tmp.path(), &[PathBuf::from("specs")]);
        let uris: Vec<_> = paths.iter().map(|p| source_uri(tmp.path(), p)).collect();
        assert_eq!(uris, ["specs/a.md", "specs/b.md", "specs/nested/rfc.txt"]);
    }

    #[test]
    fn duplicate_entries_are_collapsed() {
        let tmp = fixture();
        let paths = collect_spec_paths(
            tmp.path(),
            &[PathBuf::from("specs/a.md"), PathBuf::from("specs")],
        );
        assert_eq!(paths.len(), 3);
    }

    #[test]
    fn loads_every_specification_in_order() {
        let tmp = fixture();
        let load = load_specifications(tmp.path(), &[PathBuf::from("specs")]).unwrap();
        let uris: Vec<_> = load
            .specifications
            .iter()
            .map(Specification::source_uri)
            .collect();
        assert_eq!(uris, ["specs/a.md", "specs/b.md", "specs/nested/rfc.txt"]);
        assert!(load.skipped.is_empty());

        let rfc = &load.specifications[2];
        assert!(rfc.section("specs/nested/rfc.txt#1").is_some());
        assert_eq!(rfc.requirements().count(), 1);
    }

    #[test]
    fn bad_files_are_skipped_not_fatal() {
        let tmp = fixture();
        let load = load_specifications(
            tmp.path(),
            &[
                PathBuf::from("specs/a.md"),
                PathBuf::from("specs/missing.md"),
                PathBuf::from("specs/notes.rst"),
            ],
        )
        .unwrap();

        assert_eq!(load.specifications.len(), 1);
        assert_eq!(load.skipped.len(), 2);
        assert!(load.skipped.iter().any(|s| s.path.ends_with("missing.md")));
        assert!(load.skipped.iter().any(|s| s.path.ends_with("notes.rst")));
    }

    #[test]
    fn report_over_skipped_files_does_not_pass() {
        let tmp = fixture();
        let load =
            load_specifications(tmp.path(), &[PathBuf::from("specs/typo.md")]).unwrap();
        assert!(load.specifications.is_empty());
        assert_eq!(load.skipped.len(), 1);

        let mut report = Report::new(load.specifications);
        report.record_skipped(load.skipped.len());
        let summary = report.summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.skipped_files, 1);
        assert!(!summary.passes(false));
    }

    #[test]
    fn loading_is_deterministic() {
        let tmp = fixture();
        let first = load_specifications(tmp.path(), &[PathBuf::from("specs")]).unwrap();
        let second = load_specifications(tmp.path(), &[PathBuf::from("specs")]).unwrap();
        assert_eq!(first.specifications, second.specifications);
    }

    #[test]
    fn source_uri_is_relative_with_forward_slashes() {
        let root = Path::new("/project");
        assert_eq!(
            source_uri(root, Path::new("/project/specs/a.md")),
            "specs/a.md"
        );
        assert_eq!(
            source_uri(root, Path::new("/elsewhere/b.md")),
            "elsewhere/b.md"
        );
    }

    #[test]
    fn internal_errors_are_fatal() {
        let error = LoadError::Tree {
            path: PathBuf::from("a.md"),
            source: InsertError {
                title: "x".to_string(),
                level: 0,
            },
        };
        assert!(error.is_fatal());
        assert!(!LoadError::UnsupportedFormat(PathBuf::from("a.rst")).is_fatal());
    }
}
