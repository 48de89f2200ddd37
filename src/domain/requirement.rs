use std::{collections::BTreeMap, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{annotation::AnnotationType, Annotation};

static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(MUST|SHOULD|MAY)\b").expect("valid regex"));

/// The RFC 2119 requirement level of a statement.
///
/// Negated forms (`MUST NOT`, `SHOULD NOT`) share the level of their keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// `MUST` / `MUST NOT`
    Must,
    /// `SHOULD` / `SHOULD NOT`
    Should,
    /// `MAY`
    May,
}

impl Level {
    /// The level of the first RFC 2119 keyword in `text`, if any.
    ///
    /// When a statement mixes keywords, the first one wins.
    #[must_use]
    pub fn detect(text: &str) -> Option<Self> {
        KEYWORD
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|keyword| keyword.as_str().parse().ok())
    }

    /// The keyword as written in a specification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Must => "MUST",
            Self::Should => "SHOULD",
            Self::May => "MAY",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a requirement level.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown requirement level '{0}', expected MUST, SHOULD or MAY")]
pub struct UnknownLevel(String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MUST" => Ok(Self::Must),
            "SHOULD" => Ok(Self::Should),
            "MAY" => Ok(Self::May),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// Implementation progress of a requirement, derived from its annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Neither implemented nor tested.
    NotStarted,
    /// Implemented but not tested.
    MissingTest,
    /// Tested but not implemented.
    MissingImplementation,
    /// Explicitly excepted from implementation.
    Exception,
    /// Implemented and tested.
    Complete,
}

impl Status {
    /// Every status, in report order.
    pub const ALL: [Self; 5] = [
        Self::Complete,
        Self::Exception,
        Self::MissingTest,
        Self::MissingImplementation,
        Self::NotStarted,
    ];

    /// Computes the status from a requirement's flags.
    #[must_use]
    pub const fn from_flags(omitted: bool, implemented: bool, attested: bool) -> Self {
        match (omitted, implemented, attested) {
            (true, _, _) => Self::Exception,
            (false, true, true) => Self::Complete,
            (false, true, false) => Self::MissingTest,
            (false, false, true) => Self::MissingImplementation,
            (false, false, false) => Self::NotStarted,
        }
    }

    /// The status name as it appears in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::MissingTest => "MISSING_TEST",
            Self::MissingImplementation => "MISSING_IMPLEMENTATION",
            Self::Exception => "EXCEPTION",
            Self::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normative, terminated statement extracted from a section.
///
/// The progress flags only ever go from `false` to `true`, and the status is
/// always computed from them, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    level: Level,
    content: String,
    id: String,
    implemented: bool,
    attested: bool,
    omitted: bool,
    matched_annotations: BTreeMap<String, Annotation>,
}

impl Requirement {
    /// Creates a requirement belonging to the section at `section_uri`.
    ///
    /// The requirement id is `section_uri + "$" + content`.
    #[must_use]
    pub fn new(section_uri: &str, level: Level, content: String) -> Self {
        let id = format!("{section_uri}${content}");
        Self {
            level,
            content,
            id,
            implemented: false,
            attested: false,
            omitted: false,
            matched_annotations: BTreeMap::new(),
        }
    }

    /// The requirement level.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    /// The whitespace-normalised requirement statement.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The identifier annotations are matched against.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether an implementing annotation has been linked.
    #[must_use]
    pub const fn implemented(&self) -> bool {
        self.implemented
    }

    /// Whether a testing annotation has been linked.
    #[must_use]
    pub const fn attested(&self) -> bool {
        self.attested
    }

    /// Whether an exception annotation has been linked.
    #[must_use]
    pub const fn omitted(&self) -> bool {
        self.omitted
    }

    /// The current status.
    #[must_use]
    pub const fn status(&self) -> Status {
        Status::from_flags(self.omitted, self.implemented, self.attested)
    }

    /// The annotations linked to this requirement, keyed by annotation id.
    #[must_use]
    pub const fn annotations(&self) -> &BTreeMap<String, Annotation> {
        &self.matched_annotations
    }

    /// Links an annotation and returns the resulting status.
    ///
    /// The annotation is assumed to already target this requirement; routing
    /// happens in the enclosing containers.
    pub fn add_annotation(&mut self, annotation: Annotation) -> Status {
        let kind: AnnotationType = annotation.kind();
        self.implemented |= kind.implements();
        self.attested |= kind.attests();
        self.omitted |= kind.omits();
        self.matched_annotations
            .insert(annotation.id().to_string(), annotation);
        self.status()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn requirement() -> Requirement {
        Requirement::new(
            "spec.md#Section",
            Level::Must,
            "A header MUST NOT itself be a requirement.".to_string(),
        )
    }

    fn annotation(kind: AnnotationType, line: usize) -> Annotation {
        Annotation::new(
            "spec.md#Section",
            kind,
            "A header MUST NOT itself be a requirement.",
            "src/lib.rs",
            line,
            line + 1,
        )
    }

    #[test]
    fn id_joins_section_and_content() {
        assert_eq!(
            requirement().id(),
            "spec.md#Section$A header MUST NOT itself be a requirement."
        );
    }

    #[test_case("The client MUST NOT retry.", Some(Level::Must); "negated must")]
    #[test_case("Servers SHOULD log this.", Some(Level::Should); "should")]
    #[test_case("Clients MAY cache the result.", Some(Level::May); "may")]
    #[test_case("It SHOULD work and MUST NOT fail.", Some(Level::Should); "first keyword wins")]
    #[test_case("Nothing normative here.", None; "no keyword")]
    #[test_case("MUSTARD is not a keyword.", None; "word boundary")]
    #[test_case("lowercase must is not normative.", None; "case sensitive")]
    fn level_detection(text: &str, expected: Option<Level>) {
        assert_eq!(Level::detect(text), expected);
    }

    #[test_case(false, false, false, Status::NotStarted; "nothing")]
    #[test_case(false, true, false, Status::MissingTest; "implemented only")]
    #[test_case(false, false, true, Status::MissingImplementation; "attested only")]
    #[test_case(false, true, true, Status::Complete; "implemented and attested")]
    #[test_case(true, false, false, Status::Exception; "omitted")]
    #[test_case(true, true, true, Status::Exception; "omitted overrides")]
    fn status_table(omitted: bool, implemented: bool, attested: bool, expected: Status) {
        assert_eq!(Status::from_flags(omitted, implemented, attested), expected);
    }

    #[test_case(AnnotationType::Citation, Status::MissingTest; "citation")]
    #[test_case(AnnotationType::Test, Status::MissingImplementation; "test")]
    #[test_case(AnnotationType::Untestable, Status::Complete; "untestable")]
    #[test_case(AnnotationType::Deviation, Status::MissingTest; "deviation")]
    #[test_case(AnnotationType::Implication, Status::Complete; "implication")]
    #[test_case(AnnotationType::Exception, Status::Exception; "exception")]
    #[test_case(AnnotationType::Todo, Status::NotStarted; "todo")]
    fn single_annotation(kind: AnnotationType, expected: Status) {
        let mut requirement = requirement();
        assert_eq!(requirement.add_annotation(annotation(kind, 1)), expected);
        assert_eq!(requirement.status(), expected);
    }

    #[test]
    fn citation_then_test_completes() {
        let mut requirement = requirement();
        requirement.add_annotation(annotation(AnnotationType::Citation, 1));
        let status = requirement.add_annotation(annotation(AnnotationType::Test, 10));
        assert_eq!(status, Status::Complete);
        assert_eq!(requirement.annotations().len(), 2);
    }

    #[test]
    fn flags_never_clear() {
        let mut requirement = requirement();
        let sequence = [
            AnnotationType::Test,
            AnnotationType::Todo,
            AnnotationType::Citation,
            AnnotationType::Todo,
            AnnotationType::Exception,
            AnnotationType::Todo,
        ];

        let mut seen = (false, false, false);
        for (line, kind) in sequence.into_iter().enumerate() {
            requirement.add_annotation(annotation(kind, line * 10));
            assert!(requirement.implemented() >= seen.0);
            assert!(requirement.attested() >= seen.1);
            assert!(requirement.omitted() >= seen.2);
            seen = (
                requirement.implemented(),
                requirement.attested(),
                requirement.omitted(),
            );
            assert_eq!(
                requirement.status(),
                Status::from_flags(seen.2, seen.0, seen.1)
            );
        }
        assert_eq!(requirement.status(), Status::Exception);
    }

    #[test]
    fn duplicate_annotation_is_recorded_once() {
        let mut requirement = requirement();
        requirement.add_annotation(annotation(AnnotationType::Citation, 1));
        requirement.add_annotation(annotation(AnnotationType::Citation, 1));
        assert_eq!(requirement.annotations().len(), 1);
    }

    #[test]
    fn level_round_trips_through_strings() {
        for level in [Level::Must, Level::Should, Level::May] {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
        assert!("SHALL".parse::<Level>().is_err());
    }
}
