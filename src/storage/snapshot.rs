//! Requirement snapshots: one TOML file per section.
//!
//! A snapshot records a section's target URI and its requirements, so a
//! report can be built later without re-parsing the source documents.
//!
//! ```toml
//! target = "specs/protocol.md#Handshake"
//!
//! [[spec]]
//! level = "MUST"
//! quote = "Clients MUST send a greeting."
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Write,
    io,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::{
    domain::{Level, Requirement, Section, Specification},
    storage::directory::Skipped,
};

/// Errors that can occur when reading or writing a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The snapshot is not valid TOML or is missing a required key.
    #[error("{}: {source}", path.display())]
    Parse {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying error.
        source: toml::de::Error,
    },
    /// The snapshot could not be serialized.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
    /// The target has no `#` separating document from section.
    #[error("snapshot target '{0}' has no section fragment")]
    MalformedTarget(String),
    /// Two sections map to the same snapshot file.
    #[error("snapshot {} would hold both '{first}' and '{second}'", path.display())]
    PathCollision {
        /// The snapshot path.
        path: PathBuf,
        /// The target written first.
        first: String,
        /// The target that would overwrite it.
        second: String,
    },
}

/// The on-disk form of a section's requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The section URI.
    pub target: String,
    /// The section's requirements.
    #[serde(rename = "spec", default)]
    pub requirements: Vec<Quote>,
}

/// One requirement in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// The requirement level.
    pub level: Level,
    /// The requirement statement.
    pub quote: String,
}

impl Snapshot {
    /// Captures a section's requirements.
    #[must_use]
    pub fn from_section(section: &Section) -> Self {
        Self {
            target: section.uri().to_string(),
            requirements: section
                .requirements()
                .map(|requirement| Quote {
                    level: requirement.level(),
                    quote: requirement.content().to_string(),
                })
                .collect(),
        }
    }

    /// Rebuilds the section the snapshot was taken from.
    ///
    /// Line numbers and section text are not recorded, so only the title,
    /// URI and requirements are restored.
    ///
    /// # Errors
    ///
    /// Returns an error if the target has no section fragment.
    pub fn into_section(self) -> Result<Section, SnapshotError> {
        let Some(separator) = self.target.find('#') else {
            return Err(SnapshotError::MalformedTarget(self.target));
        };
        let fragment = self.target[separator + 1..].to_string();
        let mut section = Section::new(fragment, self.target.clone());
        for Quote { level, quote } in self.requirements {
            section.insert(Requirement::new(&self.target, level, quote));
        }
        Ok(section)
    }

    /// The document part of the target.
    #[must_use]
    pub fn document(&self) -> &str {
        self.target
            .split_once('#')
            .map_or(self.target.as_str(), |(document, _)| document)
    }

    /// Reads a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// snapshot.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the snapshot, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let content = toml::to_string(self)?;
        let io_error = |source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, content).map_err(io_error)
    }
}

/// The relative path of the snapshot for a section URI.
///
/// The document path becomes a directory and the fragment the file stem.
#[must_use]
pub fn snapshot_path(target: &str) -> PathBuf {
    let (document, fragment) = target.split_once('#').unwrap_or((target, ""));
    let mut path: PathBuf = Path::new(document)
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect();
    path.push(format!("{}.toml", sanitize(fragment)));
    path
}

/// Escapes a fragment into a file stem.
///
/// ASCII letters, digits, `-` and `.` are kept; every other byte, `_`
/// included, becomes `_XX`. A leading `.` is escaped as well, and the empty
/// fragment is `_`, so distinct fragments always give distinct stems.
fn sanitize(fragment: &str) -> String {
    if fragment.is_empty() {
        return "_".to_string();
    }
    let mut name = String::with_capacity(fragment.len());
    for (i, byte) in fragment.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'-' || (byte == b'.' && i > 0);
        if keep {
            name.push(char::from(byte));
        } else {
            let _ = write!(name, "_{byte:02X}");
        }
    }
    name
}

/// Snapshot paths already written in one call, with the target each was
/// written for.
#[derive(Debug, Default)]
struct Claims(HashMap<PathBuf, String>);

impl Claims {
    fn claim(&mut self, path: &Path, target: &str) -> Result<(), SnapshotError> {
        if let Some(first) = self.0.get(path) {
            return Err(SnapshotError::PathCollision {
                path: path.to_path_buf(),
                first: first.clone(),
                second: target.to_string(),
            });
        }
        self.0.insert(path.to_path_buf(), target.to_string());
        Ok(())
    }
}

/// Writes one snapshot per section that has requirements.
///
/// Returns the paths written, in section order.
///
/// # Errors
///
/// Returns an error if any snapshot cannot be written, or if two sections
/// would be written to the same file.
#[instrument(level = "debug", skip(specification), fields(source = specification.source_uri()))]
pub fn write_snapshots(
    specification: &Specification,
    dir: &Path,
) -> Result<Vec<PathBuf>, SnapshotError> {
    let mut claims = Claims::default();
    let mut written = Vec::new();
    for section in specification.sections().filter(|section| !section.is_empty()) {
        let path = dir.join(snapshot_path(section.uri()));
        claims.claim(&path, section.uri())?;
        Snapshot::from_section(section).save(&path)?;
        debug!(path = %path.display(), "wrote snapshot");
        written.push(path);
    }
    Ok(written)
}

/// The outcome of loading a snapshot directory.
#[derive(Debug, Default)]
pub struct SnapshotLoad {
    /// Specifications rebuilt from the snapshots, ordered by source URI.
    pub specifications: Vec<Specification>,
    /// Snapshot files that could not be loaded.
    pub skipped: Vec<Skipped>,
}

/// Loads every `.toml` snapshot under `dir` and regroups the sections into
/// specifications by document.
///
/// Malformed snapshots are skipped with a warning.
///
/// # Errors
///
/// Returns an error if `dir` is not a readable directory.
#[instrument(level = "debug")]
pub fn load_snapshots(dir: &Path) -> Result<SnapshotLoad, SnapshotError> {
    std::fs::read_dir(dir).map_err(|source| SnapshotError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut documents: BTreeMap<String, Specification> = BTreeMap::new();
    let mut skipped = Vec::new();

    let files = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "toml"));

    for entry in files {
        let path = entry.path();
        let loaded = Snapshot::load(path).and_then(|snapshot| {
            let document = snapshot.document().to_string();
            snapshot.into_section().map(|section| (document, section))
        });
        match loaded {
            Ok((document, section)) => {
                documents
                    .entry(document.clone())
                    .or_insert_with(|| Specification::new(document.clone(), document))
                    .insert(section);
            }
            Err(error) => {
                warn!("skipping snapshot: {error}");
                skipped.push(Skipped {
                    path: path.to_path_buf(),
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(SnapshotLoad {
        specifications: documents.into_values().collect(),
        skipped,
    })
}
