//! An in-memory header hierarchy for a single document.
//!
//! The [`HeaderTree`] is an arena: headers are stored contiguously and refer
//! to their parent and children by index. The document itself is the implicit
//! root at level 0, so every real header (level >= 1) can always be attached.

use thiserror::Error;
use tracing::instrument;

use crate::domain::{grammar::HeaderToken, Span};

/// The level of the implicit document root.
const ROOT_LEVEL: usize = 0;

/// Index of a header within its [`HeaderTree`].
pub type HeaderId = usize;

/// A titled section marker in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    level: usize,
    title: String,
    marker: String,
    title_span: Span,
    body_span: Span,
}

impl Header {
    /// Nesting level, starting at 1.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// The trimmed title text.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The `#` run (Markdown) or section number (RFC) preceding the title.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// The span of the header line.
    #[must_use]
    pub const fn title_span(&self) -> Span {
        self.title_span
    }

    /// The text between this header line and the next header, or the end of
    /// the document.
    #[must_use]
    pub const fn body_span(&self) -> Span {
        self.body_span
    }
}

impl From<HeaderToken> for Header {
    fn from(token: HeaderToken) -> Self {
        let HeaderToken {
            level,
            title,
            marker,
            title_span,
        } = token;
        Self {
            level,
            title,
            marker,
            title_span,
            body_span: Span::empty(title_span.end()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    header: Header,
    parent: Option<HeaderId>,
    children: Vec<HeaderId>,
}

/// A header could not be placed in the tree.
///
/// This indicates a broken contract between the tokenizer and the tree
/// builder, not a problem with the document.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("header '{title}' at level {level} cannot be attached below the document root")]
pub struct InsertError {
    /// Title of the offending header.
    pub title: String,
    /// Level of the offending header.
    pub level: usize,
}

/// The header hierarchy of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTree {
    nodes: Vec<Node>,
    /// Top-level headers, children of the implicit document root.
    roots: Vec<HeaderId>,
}

impl HeaderTree {
    /// Builds the tree for a document of `document_len` bytes from its headers,
    /// which must be in document order.
    ///
    /// # Errors
    ///
    /// Returns [`InsertError`] if a header cannot be attached anywhere, which
    /// only happens for headers at or below the root level.
    #[instrument(level = "trace", skip(headers))]
    pub fn build(
        document_len: usize,
        headers: impl IntoIterator<Item = HeaderToken>,
    ) -> Result<Self, InsertError> {
        let mut builder = Builder::default();
        for token in headers {
            builder.insert(Header::from(token))?;
        }
        Ok(builder.finish(document_len))
    }

    /// The number of headers in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Retrieves a header by id.
    #[must_use]
    pub fn header(&self, id: HeaderId) -> Option<&Header> {
        self.nodes.get(id).map(|node| &node.header)
    }

    /// The parent of a header, or `None` for top-level headers.
    #[must_use]
    pub fn parent(&self, id: HeaderId) -> Option<HeaderId> {
        self.nodes.get(id)?.parent
    }

    /// The direct children of a header, in document order.
    #[must_use]
    pub fn children(&self, id: HeaderId) -> &[HeaderId] {
        self.nodes.get(id).map_or(&[], |node| &node.children)
    }

    /// The top-level headers, in document order.
    #[must_use]
    pub fn roots(&self) -> &[HeaderId] {
        &self.roots
    }

    /// The chain of headers from the outermost ancestor down to `id` itself.
    #[must_use]
    pub fn lineage(&self, id: HeaderId) -> Vec<&Header> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current) else {
                break;
            };
            chain.push(&node.header);
            cursor = node.parent;
        }
        chain.reverse();
        chain
    }

    /// All headers in depth-first pre-order: parents before children,
    /// siblings in document order.
    pub fn descendants(&self) -> impl Iterator<Item = HeaderId> + '_ {
        let mut stack: Vec<HeaderId> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.children(id).iter().rev());
            Some(id)
        })
    }
}

/// Per-call state for building a [`HeaderTree`].
///
/// The cursor points at the most recently inserted header; `None` is the
/// document root.
#[derive(Debug, Default)]
struct Builder {
    tree: HeaderTree,
    cursor: Option<HeaderId>,
}

impl Builder {
    fn level(&self, id: Option<HeaderId>) -> usize {
        id.map_or(ROOT_LEVEL, |id| self.tree.nodes[id].header.level)
    }

    fn children_of(&self, id: Option<HeaderId>) -> &[HeaderId] {
        id.map_or(&self.tree.roots, |id| &self.tree.nodes[id].children)
    }

    /// Finds the node the new header attaches under, walking up from the
    /// cursor until a shallower node is found.
    fn attachment_point(&self, header: &Header) -> Result<Option<HeaderId>, InsertError> {
        let mut candidate = self.cursor;
        loop {
            if self.level(candidate) < header.level {
                // Prefer the deepest existing child that is still shallower.
                let deeper = self
                    .children_of(candidate)
                    .iter()
                    .rev()
                    .copied()
                    .find(|&child| self.tree.nodes[child].header.level < header.level);
                return Ok(deeper.or(candidate));
            }

            match candidate {
                Some(id) => candidate = self.tree.nodes[id].parent,
                None => {
                    return Err(InsertError {
                        title: header.title.clone(),
                        level: header.level,
                    });
                }
            }
        }
    }

    fn insert(&mut self, header: Header) -> Result<HeaderId, InsertError> {
        let parent = self.attachment_point(&header)?;
        let next_title_start = header.title_span.start();

        if let Some(previous) = self.cursor {
            let previous = &mut self.tree.nodes[previous].header;
            previous.body_span = Span::new(previous.title_span.end(), next_title_start);
        }

        let id = self.tree.nodes.len();
        self.tree.nodes.push(Node {
            header,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.tree.nodes[parent].children.push(id),
            None => self.tree.roots.push(id),
        }

        self.cursor = Some(id);
        Ok(id)
    }

    fn finish(mut self, document_len: usize) -> HeaderTree {
        if let Some(last) = self.cursor {
            let last = &mut self.tree.nodes[last].header;
            last.body_span = Span::new(last.title_span.end(), document_len);
        }
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Grammar;

    fn build(text: &str) -> HeaderTree {
        HeaderTree::build(text.len(), Grammar::Markdown.headers(text)).unwrap()
    }

    fn titles(tree: &HeaderTree, ids: &[HeaderId]) -> Vec<String> {
        ids.iter()
            .map(|&id| tree.header(id).unwrap().title().to_string())
            .collect()
    }

    const DOCUMENT: &str = "\
preamble
# Root
root body
## First
first body
### Deep
deep body
## Second
second body
# Other
";

    #[test]
    fn nests_by_level() {
        let tree = build(DOCUMENT);

        assert_eq!(titles(&tree, tree.roots()), ["Root", "Other"]);
        let root = tree.roots()[0];
        assert_eq!(titles(&tree, tree.children(root)), ["First", "Second"]);
        let first = tree.children(root)[0];
        assert_eq!(titles(&tree, tree.children(first)), ["Deep"]);
        assert_eq!(tree.parent(first), Some(root));
        assert_eq!(tree.parent(root), None);
    }

    #[test]
    fn descendants_are_preorder() {
        let tree = build(DOCUMENT);
        let order: Vec<_> = tree.descendants().collect();
        assert_eq!(
            titles(&tree, &order),
            ["Root", "First", "Deep", "Second", "Other"]
        );
    }

    #[test]
    fn body_spans_run_to_the_next_header() {
        let tree = build(DOCUMENT);
        let bodies: Vec<_> = tree
            .descendants()
            .map(|id| tree.header(id).unwrap().body_span().slice(DOCUMENT))
            .collect();
        assert_eq!(
            bodies,
            [
                "\nroot body\n",
                "\nfirst body\n",
                "\ndeep body\n",
                "\nsecond body\n",
                "\n"
            ]
        );
    }

    #[test]
    fn spans_partition_the_document() {
        let tree = build(DOCUMENT);
        let mut headers: Vec<_> = (0..tree.len()).map(|id| tree.header(id).unwrap()).collect();
        headers.sort_by_key(|h| h.title_span().start());

        let mut rebuilt = DOCUMENT[..headers[0].title_span().start()].to_string();
        for header in headers {
            rebuilt.push_str(header.title_span().slice(DOCUMENT));
            rebuilt.push_str(header.body_span().slice(DOCUMENT));
        }
        assert_eq!(rebuilt, DOCUMENT);
    }

    #[test]
    fn skipped_levels_attach_to_nearest_shallower_header() {
        let text = "# A\n### B\n## C\n#### D\n";
        let tree = build(text);
        let a = tree.roots()[0];
        assert_eq!(titles(&tree, tree.children(a)), ["B", "C"]);
        let c = tree.children(a)[1];
        assert_eq!(titles(&tree, tree.children(c)), ["D"]);
    }

    #[test]
    fn document_starting_below_top_level() {
        let text = "### Deep first\n# Top\n";
        let tree = build(text);
        assert_eq!(titles(&tree, tree.roots()), ["Deep first", "Top"]);
    }

    #[test]
    fn lineage_runs_from_outermost_ancestor() {
        let tree = build(DOCUMENT);
        let deep = tree.descendants().nth(2).unwrap();
        let chain: Vec<_> = tree.lineage(deep).iter().map(|h| h.title()).collect();
        assert_eq!(chain, ["Root", "First", "Deep"]);
    }

    #[test]
    fn empty_document_has_no_headers() {
        let tree = build("no headers here\n");
        assert!(tree.is_empty());
        assert_eq!(tree.descendants().count(), 0);
    }

    #[test]
    fn rebuilding_is_idempotent() {
        assert_eq!(build(DOCUMENT), build(DOCUMENT));
    }

    #[test]
    fn root_level_header_is_rejected() {
        let token = HeaderToken {
            level: 0,
            title: "impossible".to_string(),
            marker: String::new(),
            title_span: Span::new(0, 10),
        };
        let error = HeaderTree::build(10, [token]).unwrap_err();
        assert_eq!(error.level, 0);
    }
}
