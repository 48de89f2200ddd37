//! Domain models for requirement extraction and tracing.
//!
//! This module contains the filesystem-agnostic pipeline: document text is
//! tokenized into headers, arranged into a header tree, materialised into
//! sections, and split into requirements that annotations are linked to.

/// Source annotations and their types.
pub mod annotation;
pub use annotation::{Annotation, AnnotationType};

mod config;
pub use config::{Config, CONFIG_FILE};

/// Header and list grammars for Markdown and RFC documents.
pub mod grammar;
pub use grammar::Grammar;

/// The header hierarchy of a document.
pub mod header;
pub use header::{Header, HeaderTree};

/// Compliance reports and annotation routing.
pub mod report;
pub use report::{LinkError, LinkSummary, Report, Summary};

/// Requirement statements and their status.
pub mod requirement;
pub use requirement::{Level, Requirement, Status};

/// Sections and specifications.
pub mod section;
pub use section::{Section, Specification};

mod span;
pub use span::Span;

/// Splitting section text into requirement statements.
pub mod splitter;
