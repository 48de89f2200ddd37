//! The compliance report: every specification, with annotations linked to
//! their requirements.

use std::collections::{btree_map::Entry, BTreeMap};

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::{Annotation, Level, Requirement, Specification, Status};

/// Errors that can occur when routing an annotation to its requirement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// The target has no `#` separating document from section.
    #[error("annotation target '{0}' has no section fragment")]
    MalformedTarget(String),
    /// No specification was parsed from the target's document.
    #[error("no specification '{0}'")]
    SpecificationNotFound(String),
    /// The specification has no matching section or requirement.
    #[error("no requirement matches '{0}'")]
    RequirementNotFound(String),
}

/// Counts of annotations processed by [`Report::link`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    /// Annotations attached to a requirement.
    pub linked: usize,
    /// Annotations whose target did not resolve.
    pub skipped: usize,
}

/// A set of specifications keyed by source URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    specifications: BTreeMap<String, Specification>,
    /// Specification files that could not be loaded into the report.
    skipped_files: usize,
}

impl Report {
    /// Builds a report from parsed specifications.
    ///
    /// Specifications are ordered by source URI regardless of input order. If
    /// two share a source URI, the first is kept and the later one is counted
    /// as skipped.
    #[must_use]
    pub fn new(specifications: impl IntoIterator<Item = Specification>) -> Self {
        let mut report = Self::default();
        for specification in specifications {
            match report
                .specifications
                .entry(specification.source_uri().to_string())
            {
                Entry::Vacant(entry) => {
                    entry.insert(specification);
                }
                Entry::Occupied(entry) => {
                    warn!(source = entry.key(), "ignoring duplicate specification");
                    report.skipped_files += 1;
                }
            }
        }
        report
    }

    /// Records specification files that failed to load.
    ///
    /// A report with skipped files never passes.
    pub fn record_skipped(&mut self, count: usize) {
        self.skipped_files += count;
    }

    /// The number of specification files that were not loaded.
    #[must_use]
    pub const fn skipped_files(&self) -> usize {
        self.skipped_files
    }

    /// Specifications in source URI order.
    pub fn specifications(&self) -> impl Iterator<Item = &Specification> {
        self.specifications.values()
    }

    /// Looks up a specification by source URI.
    #[must_use]
    pub fn specification(&self, source_uri: &str) -> Option<&Specification> {
        self.specifications.get(source_uri)
    }

    /// All requirements of all specifications.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.specifications
            .values()
            .flat_map(Specification::requirements)
    }

    /// Routes one annotation to its requirement.
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not resolve to a known requirement.
    /// The annotation is dropped in that case.
    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<(), LinkError> {
        let target = annotation.target_uri();
        let Some((document, _)) = target.split_once('#') else {
            return Err(LinkError::MalformedTarget(target.to_string()));
        };
        let Some(specification) = self.specifications.get_mut(document) else {
            return Err(LinkError::SpecificationNotFound(document.to_string()));
        };

        let target = target.to_string();
        if specification.add_annotation(annotation) {
            Ok(())
        } else {
            Err(LinkError::RequirementNotFound(target))
        }
    }

    /// Links a batch of annotations, logging and counting those that do not
    /// resolve.
    #[instrument(level = "debug", skip_all)]
    pub fn link(&mut self, annotations: impl IntoIterator<Item = Annotation>) -> LinkSummary {
        let mut summary = LinkSummary::default();
        for annotation in annotations {
            let source = format!(
                "{}:{}",
                annotation.source_location(),
                annotation.start_line()
            );
            match self.add_annotation(annotation) {
                Ok(()) => summary.linked += 1,
                Err(error) => {
                    warn!(%source, "skipping annotation: {error}");
                    summary.skipped += 1;
                }
            }
        }
        info!(
            linked = summary.linked,
            skipped = summary.skipped,
            "linked annotations"
        );
        summary
    }

    /// Tallies requirements by status and level.
    #[must_use]
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            specifications: self.specifications.len(),
            skipped_files: self.skipped_files,
            ..Summary::default()
        };
        for requirement in self.requirements() {
            *summary.by_status.entry(requirement.status()).or_default() += 1;
            *summary.by_level.entry(requirement.level()).or_default() += 1;
            summary.total += 1;
        }
        summary
    }
}

/// Requirement counts for a [`Report`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Specifications in the report.
    pub specifications: usize,
    /// Specification files that could not be loaded.
    pub skipped_files: usize,
    /// Total number of requirements.
    pub total: usize,
    /// Requirements per status.
    pub by_status: BTreeMap<Status, usize>,
    /// Requirements per level.
    pub by_level: BTreeMap<Level, usize>,
}

impl Summary {
    /// The number of requirements with `status`.
    #[must_use]
    pub fn count(&self, status: Status) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Whether the report passes.
    ///
    /// At least one specification must have loaded and none may have been
    /// skipped. Every requirement must be complete or excepted. When
    /// `require_tests` is `false`, implemented but untested requirements also
    /// pass.
    #[must_use]
    pub fn passes(&self, require_tests: bool) -> bool {
        if self.specifications == 0 || self.skipped_files > 0 {
            return false;
        }
        self.by_status.iter().all(|(&status, &count)| {
            count == 0
                || match status {
                    Status::Complete | Status::Exception => true,
                    Status::MissingTest => !require_tests,
                    Status::NotStarted | Status::MissingImplementation => false,
                }
        })
    }
}
