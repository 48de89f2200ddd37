use std::{fmt, str::FromStr};

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The relationship an annotation claims to a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    /// The annotated code implements the requirement.
    Citation,
    /// The annotated code tests the requirement.
    Test,
    /// The requirement is implemented but cannot be tested.
    Untestable,
    /// The implementation knowingly deviates from the requirement.
    Deviation,
    /// The requirement is intentionally not implemented.
    Exception,
    /// The requirement is implied, and so both implemented and tested, by the
    /// annotated code.
    Implication,
    /// Implementation is planned but not done.
    Todo,
}

impl AnnotationType {
    /// Every annotation type.
    pub const ALL: [Self; 7] = [
        Self::Citation,
        Self::Test,
        Self::Untestable,
        Self::Deviation,
        Self::Exception,
        Self::Implication,
        Self::Todo,
    ];

    /// Whether this annotation marks the requirement as implemented.
    #[must_use]
    pub const fn implements(self) -> bool {
        matches!(
            self,
            Self::Citation | Self::Untestable | Self::Deviation | Self::Implication
        )
    }

    /// Whether this annotation marks the requirement as tested.
    #[must_use]
    pub const fn attests(self) -> bool {
        matches!(self, Self::Test | Self::Untestable | Self::Implication)
    }

    /// Whether this annotation excepts the requirement.
    #[must_use]
    pub const fn omits(self) -> bool {
        matches!(self, Self::Exception)
    }

    /// The lowercase type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Citation => "citation",
            Self::Test => "test",
            Self::Untestable => "untestable",
            Self::Deviation => "deviation",
            Self::Exception => "exception",
            Self::Implication => "implication",
            Self::Todo => "todo",
        }
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not an annotation type.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown annotation type '{0}'")]
pub struct UnknownAnnotationType(String);

impl FromStr for AnnotationType {
    type Err = UnknownAnnotationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAnnotationType(s.to_string()))
    }
}

/// A developer-supplied marker in source code claiming a relationship to a
/// requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    target_uri: String,
    kind: AnnotationType,
    content: String,
    start_line: usize,
    end_line: usize,
    id: String,
    source_location: String,
}

impl Annotation {
    /// Creates an annotation.
    ///
    /// `target` is either a full requirement id (`path#fragment$content`) or a
    /// section URI (`path#fragment`). In the latter case the whitespace
    /// normalised `content` completes the requirement id.
    #[must_use]
    pub fn new(
        target: &str,
        kind: AnnotationType,
        content: &str,
        source_location: &str,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        let content = normalize_whitespace(content);
        let target_uri = if target.contains('$') {
            target.to_string()
        } else {
            format!("{target}${content}")
        };
        let id = fingerprint(&target_uri, kind, source_location, start_line, end_line);
        Self {
            target_uri,
            kind,
            content,
            start_line,
            end_line,
            id,
            source_location: source_location.to_string(),
        }
    }

    /// The id of the requirement this annotation targets.
    #[must_use]
    pub fn target_uri(&self) -> &str {
        &self.target_uri
    }

    /// The annotation type.
    #[must_use]
    pub const fn kind(&self) -> AnnotationType {
        self.kind
    }

    /// The quoted requirement text, whitespace-normalised.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// First line of the annotation in its source file.
    #[must_use]
    pub const fn start_line(&self) -> usize {
        self.start_line
    }

    /// Last line of the annotation in its source file.
    #[must_use]
    pub const fn end_line(&self) -> usize {
        self.end_line
    }

    /// A stable identifier derived from the annotation's location and target.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The file the annotation was found in.
    #[must_use]
    pub fn source_location(&self) -> &str {
        &self.source_location
    }
}

/// Hashes the identifying parts of an annotation.
fn fingerprint(
    target_uri: &str,
    kind: AnnotationType,
    source_location: &str,
    start_line: usize,
    end_line: usize,
) -> String {
    #[derive(BorshSerialize)]
    struct FingerprintData<'a> {
        target_uri: &'a str,
        kind: &'a str,
        source_location: &'a str,
        start_line: u64,
        end_line: u64,
    }

    let data = FingerprintData {
        target_uri,
        kind: kind.as_str(),
        source_location,
        start_line: start_line as u64,
        end_line: end_line as u64,
    };

    // encode using [borsh](https://borsh.io/)
    let encoded = borsh::to_vec(&data).expect("this should never fail");

    let hash = Sha256::digest(encoded);
    format!("{hash:x}")
}

/// Collapses every whitespace run to a single space and trims the ends.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn section_target_is_completed_with_content() {
        let annotation = Annotation::new(
            "spec.md#Section",
            AnnotationType::Citation,
            "A header MUST NOT\n   itself be a requirement.",
            "src/lib.rs",
            3,
            5,
        );
        assert_eq!(
            annotation.target_uri(),
            "spec.md#Section$A header MUST NOT itself be a requirement."
        );
        assert_eq!(
            annotation.content(),
            "A header MUST NOT itself be a requirement."
        );
    }

    #[test]
    fn full_requirement_target_is_kept() {
        let annotation = Annotation::new(
            "spec.md#Section$Quoted.",
            AnnotationType::Test,
            "ignored for routing",
            "tests/it.rs",
            1,
            1,
        );
        assert_eq!(annotation.target_uri(), "spec.md#Section$Quoted.");
    }

    #[test]
    fn id_depends_on_location() {
        let a = Annotation::new("s.md#A", AnnotationType::Citation, "x", "a.rs", 1, 2);
        let b = Annotation::new("s.md#A", AnnotationType::Citation, "x", "a.rs", 1, 2);
        let c = Annotation::new("s.md#A", AnnotationType::Citation, "x", "b.rs", 1, 2);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().len(), 64);
    }

    #[test_case("citation", AnnotationType::Citation; "citation")]
    #[test_case("TEST", AnnotationType::Test; "uppercase")]
    #[test_case("Implication", AnnotationType::Implication; "mixed case")]
    #[test_case("todo", AnnotationType::Todo; "todo")]
    fn parse_type(input: &str, expected: AnnotationType) {
        assert_eq!(input.parse::<AnnotationType>().unwrap(), expected);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!("spec".parse::<AnnotationType>().is_err());
    }

    #[test]
    fn flag_contributions() {
        let implementing: Vec<_> = AnnotationType::ALL
            .into_iter()
            .filter(|kind| kind.implements())
            .collect();
        let attesting: Vec<_> = AnnotationType::ALL
            .into_iter()
            .filter(|kind| kind.attests())
            .collect();
        assert_eq!(
            implementing,
            [
                AnnotationType::Citation,
                AnnotationType::Untestable,
                AnnotationType::Deviation,
                AnnotationType::Implication
            ]
        );
        assert_eq!(
            attesting,
            [
                AnnotationType::Test,
                AnnotationType::Untestable,
                AnnotationType::Implication
            ]
        );
        assert!(AnnotationType::Exception.omits());
        assert!(!AnnotationType::Todo.omits());
    }
}
