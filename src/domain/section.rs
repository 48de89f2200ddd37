//! Sections and specifications: the materialised, URI-addressable view of a
//! parsed document.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::domain::{
    header::{HeaderTree, InsertError},
    splitter, Annotation, Grammar, Requirement,
};

/// The unit of a specification derived from one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    title: String,
    uri: String,
    start_line: usize,
    end_line: usize,
    lines: Vec<String>,
    /// Requirements in extraction order.
    requirements: Vec<Requirement>,
    /// Position of each requirement in `requirements`, keyed by id.
    index: HashMap<String, usize>,
}

impl Section {
    /// Creates an empty section.
    #[must_use]
    pub fn new(title: String, uri: String) -> Self {
        Self {
            title,
            uri,
            start_line: 0,
            end_line: 0,
            lines: Vec::new(),
            requirements: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The header title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The section URI, `<document path>#<fragment>`.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The part of the URI after `#`.
    #[must_use]
    pub fn fragment(&self) -> &str {
        self.uri.split_once('#').map_or("", |(_, fragment)| fragment)
    }

    /// Number of line breaks before the start of the section body.
    #[must_use]
    pub const fn start_line(&self) -> usize {
        self.start_line
    }

    /// Number of line breaks before the end of the section body.
    #[must_use]
    pub const fn end_line(&self) -> usize {
        self.end_line
    }

    /// The reconstructed header line followed by the body lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Requirements in extraction order.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    /// The number of distinct requirements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Whether the section holds no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Looks up a requirement by id.
    #[must_use]
    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.index.get(id).map(|&i| &self.requirements[i])
    }

    /// Adds a requirement.
    ///
    /// A requirement with the same id replaces the earlier one in place;
    /// textually identical statements in one section are one requirement.
    pub fn insert(&mut self, requirement: Requirement) {
        if let Some(&existing) = self.index.get(requirement.id()) {
            debug!(id = requirement.id(), "merging duplicate requirement");
            self.requirements[existing] = requirement;
        } else {
            self.index
                .insert(requirement.id().to_string(), self.requirements.len());
            self.requirements.push(requirement);
        }
    }

    /// Links an annotation to the requirement it targets.
    ///
    /// Returns `false` when no requirement in this section has the
    /// annotation's target id.
    pub fn add_annotation(&mut self, annotation: Annotation) -> bool {
        let Some(&position) = self.index.get(annotation.target_uri()) else {
            debug!(
                section = %self.uri,
                target = annotation.target_uri(),
                "no matching requirement"
            );
            return false;
        };
        self.requirements[position].add_annotation(annotation);
        true
    }
}

/// One parsed specification document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specification {
    title: String,
    source_uri: String,
    sections: Vec<Section>,
    index: HashMap<String, usize>,
}

impl Specification {
    /// Creates an empty specification.
    #[must_use]
    pub fn new(title: String, source_uri: String) -> Self {
        Self {
            title,
            source_uri,
            sections: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Parses a document into sections and requirements.
    ///
    /// `source_uri` is the document path used as the prefix of every section
    /// URI. A document without headers yields a specification with no
    /// sections.
    ///
    /// # Errors
    ///
    /// Returns an error if the header tree cannot be built, which signals a
    /// defect rather than a malformed document.
    #[instrument(level = "debug", skip(text))]
    pub fn parse(source_uri: &str, text: &str, grammar: Grammar) -> Result<Self, InsertError> {
        let tree = HeaderTree::build(text.len(), grammar.headers(text))?;
        let newlines = LineIndex::new(text);

        let title = tree
            .roots()
            .first()
            .and_then(|&id| tree.header(id))
            .map_or_else(|| source_uri.to_string(), |header| header.title().to_string());
        let mut specification = Self::new(title, source_uri.to_string());

        for id in tree.descendants() {
            let lineage = tree.lineage(id);
            let Some(header) = lineage.last() else {
                continue;
            };
            let chain: Vec<(&str, &str)> = lineage
                .iter()
                .map(|header| (header.marker(), header.title()))
                .collect();

            let body_span = header.body_span();
            let body = body_span.slice(text);
            let uri = specification.unique_uri(format!("{source_uri}#{}", grammar.fragment(&chain)));

            let mut section = Section::new(header.title().to_string(), uri);
            section.start_line = newlines.line_of(body_span.start());
            section.end_line = newlines.line_of(body_span.end());
            // the body opens with the header line's own terminator
            let body_lines = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            section.lines = std::iter::once(format!("{}   {}", header.marker(), header.title()))
                .chain(body_lines.lines().map(str::to_string))
                .collect();

            for statement in splitter::split(body, grammar) {
                let requirement = Requirement::new(section.uri(), statement.level, statement.content);
                section.insert(requirement);
            }

            debug!(
                uri = section.uri(),
                requirements = section.len(),
                "materialised section"
            );
            specification.insert(section);
        }

        Ok(specification)
    }

    /// Returns `uri`, or `uri-N` for the smallest `N` not already taken.
    fn unique_uri(&self, uri: String) -> String {
        if !self.index.contains_key(&uri) {
            return uri;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{uri}-{n}");
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// The specification title: the first top-level header, or the source URI
    /// for documents without headers.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The document path this specification was parsed from.
    #[must_use]
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Sections in document order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Looks up a section by URI.
    #[must_use]
    pub fn section(&self, uri: &str) -> Option<&Section> {
        self.index.get(uri).map(|&i| &self.sections[i])
    }

    /// Adds a section, replacing any section with the same URI.
    pub fn insert(&mut self, section: Section) {
        if let Some(&existing) = self.index.get(section.uri()) {
            self.sections[existing] = section;
        } else {
            self.index
                .insert(section.uri().to_string(), self.sections.len());
            self.sections.push(section);
        }
    }

    /// All requirements of all sections, in document order.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.sections.iter().flat_map(Section::requirements)
    }

    /// Routes an annotation to the section named by its target.
    ///
    /// The section URI is the part of the target before `$`. Returns `false`
    /// if the section or the requirement is unknown.
    pub fn add_annotation(&mut self, annotation: Annotation) -> bool {
        let section_uri = annotation
            .target_uri()
            .split_once('$')
            .map_or(annotation.target_uri(), |(section, _)| section);
        let Some(&position) = self.index.get(section_uri) else {
            debug!(
                specification = %self.source_uri,
                section = section_uri,
                "no matching section"
            );
            return false;
        };
        self.sections[position].add_annotation(annotation)
    }
}

/// Offsets of every line break in a document, for offset → line lookups.
struct LineIndex(Vec<usize>);

impl LineIndex {
    fn new(text: &str) -> Self {
        Self(text.match_indices('\n').map(|(i, _)| i).collect())
    }

    /// Number of line breaks strictly before `offset`.
    fn line_of(&self, offset: usize) -> usize {
        self.0.partition_point(|&newline| newline < offset)
    }
}
