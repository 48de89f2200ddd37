//! Annotation input.
//!
//! Annotations are scanned from source code by an external tool and handed
//! over as a JSON array of records:
//!
//! ```json
//! [
//!   {
//!     "target": "specs/protocol.md#Handshake",
//!     "type": "citation",
//!     "content": "Clients MUST send a greeting.",
//!     "source": "src/client.rs",
//!     "start_line": 10,
//!     "end_line": 12
//!   }
//! ]
//! ```

use std::{io, path::Path};

use serde::{Deserialize, Serialize};

use crate::domain::{Annotation, AnnotationType};

/// Errors that can occur when reading annotation input.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationLoadError {
    /// The file could not be read.
    #[error("failed to read annotations: {0}")]
    Io(#[from] io::Error),
    /// The input is not a valid annotation array.
    #[error("failed to parse annotations: {0}")]
    Json(#[from] serde_json::Error),
}

/// One annotation as it appears in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// A section URI or a full requirement id.
    pub target: String,
    /// The annotation type.
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    /// The quoted requirement text.
    #[serde(default)]
    pub content: String,
    /// The source file the annotation was found in.
    pub source: String,
    /// First line of the annotation.
    #[serde(default)]
    pub start_line: usize,
    /// Last line of the annotation.
    #[serde(default)]
    pub end_line: usize,
}

impl From<AnnotationRecord> for Annotation {
    fn from(record: AnnotationRecord) -> Self {
        Self::new(
            &record.target,
            record.kind,
            &record.content,
            &record.source,
            record.start_line,
            record.end_line,
        )
    }
}

/// Parses a JSON annotation array.
///
/// # Errors
///
/// Returns an error if the input is not a JSON array of annotation records.
pub fn parse_annotations(json: &str) -> Result<Vec<Annotation>, AnnotationLoadError> {
    let records: Vec<AnnotationRecord> = serde_json::from_str(json)?;
    Ok(records.into_iter().map(Annotation::from).collect())
}

/// Reads a JSON annotation file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_annotations(path: &Path) -> Result<Vec<Annotation>, AnnotationLoadError> {
    let json = std::fs::read_to_string(path)?;
    let annotations = parse_annotations(&json)?;
    tracing::debug!(count = annotations.len(), path = %path.display(), "loaded annotations");
    Ok(annotations)
}
