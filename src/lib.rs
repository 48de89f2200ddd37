//! Specification compliance tracing
//!
//! Requirement statements ("MUST", "SHOULD", "MAY") are extracted from
//! Markdown and RFC plain-text specifications and linked to annotations found
//! in source code, to report which requirements are implemented, tested,
//! excepted, or missing.

pub mod domain;
pub use domain::{
    Annotation, AnnotationType, Config, Grammar, Level, LinkError, Report, Requirement, Section,
    Specification, Status, CONFIG_FILE,
};

/// Filesystem storage: specification discovery, snapshots and annotation input.
pub mod storage;
pub use storage::{load_specifications, SpecLoad};
