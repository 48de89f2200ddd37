//! Lexical grammars for the two supported document formats.
//!
//! A [`Grammar`] knows how to recognise headers, how to turn a chain of
//! headers into a URI fragment, and how list items are marked. Everything
//! downstream (tree building, splitting) is format-agnostic beyond this
//! boundary.

use std::{fmt, path::Path, sync::LazyLock};

use regex::Regex;

use crate::domain::Span;

static MARKDOWN_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,4})[ \t]+(\S[^\n]*)").expect("valid regex"));

static RFC_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\d+(?:\.\d+)*\.?)  (\S[^\n]*)").expect("valid regex"));

static MARKDOWN_LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)(?:[-+*]|\d+\.)[ \t]+\S").expect("valid regex"));

static RFC_LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)(?:[-*o]|\d+\.|[a-z]\.)[ \t]+\S").expect("valid regex")
});

/// The header and list syntax of a specification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    /// `#`-style Markdown headers and `-`/`+`/`*`/`N.` list items.
    Markdown,
    /// IETF plain-text headers (`2.3.1.  Title`) and indented `-`/`*`/`o`/`N.`/`a.` list
    /// items.
    Rfc,
}

/// A header recognised by the tokenizer, before it is placed in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderToken {
    /// Nesting level, starting at 1.
    pub level: usize,
    /// The trimmed header title.
    pub title: String,
    /// The leading marker: the `#` run for Markdown, the section number for RFCs.
    pub marker: String,
    /// The span of the header line, excluding its line terminator.
    pub title_span: Span,
}

/// A list item marker found at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ListItem {
    /// Offset of the start of the line holding the marker.
    pub line_start: usize,
    /// Indentation width of the marker, with tabs counted as four columns.
    pub indent: usize,
}

impl Grammar {
    /// Picks a grammar from a file extension.
    ///
    /// `.md` and `.markdown` are Markdown, `.txt` is RFC plain text.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Rfc),
            _ => None,
        }
    }

    /// Scans `text` for headers, in document order.
    ///
    /// Matching is purely line-based. A line of bare `#` characters is not a
    /// header.
    #[must_use]
    pub fn headers(self, text: &str) -> Vec<HeaderToken> {
        let pattern = match self {
            Self::Markdown => &*MARKDOWN_HEADER,
            Self::Rfc => &*RFC_HEADER,
        };

        pattern
            .captures_iter(text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let marker = captures.get(1)?.as_str();
                let title = captures.get(2)?.as_str().trim();
                let level = match self {
                    Self::Markdown => marker.len(),
                    Self::Rfc => marker.trim_end_matches('.').split('.').count(),
                };
                Some(HeaderToken {
                    level,
                    title: title.to_string(),
                    marker: marker.to_string(),
                    title_span: Span::new(whole.start(), whole.end()),
                })
            })
            .collect()
    }

    /// Builds the URI fragment for a header given its ancestor chain.
    ///
    /// `chain` runs from the outermost ancestor down to the header itself, as
    /// `(marker, title)` pairs. Markdown fragments join the titles with `.`
    /// after replacing spaces with `-` and dots with `_`; `$` is written as
    /// `%24` since it separates a section URI from requirement text. RFC
    /// fragments are the
    /// header's own section number, which already encodes its ancestry.
    #[must_use]
    pub fn fragment(self, chain: &[(&str, &str)]) -> String {
        match self {
            Self::Markdown => chain
                .iter()
                .map(|(_, title)| {
                    title
                        .replace(' ', "-")
                        .replace('.', "_")
                        .replace('$', "%24")
                })
                .collect::<Vec<_>>()
                .join("."),
            Self::Rfc => chain
                .last()
                .map(|(marker, _)| marker.trim_end_matches('.').to_string())
                .unwrap_or_default(),
        }
    }

    /// Finds the first list item marker in `text`.
    ///
    /// Thematic breaks such as `* * *` are not list items.
    pub(crate) fn first_list_item(self, text: &str) -> Option<ListItem> {
        self.list_pattern().captures_iter(text).find_map(|captures| {
            let whole = captures.get(0)?;
            let line = text[whole.start()..].lines().next().unwrap_or_default();
            if is_thematic_break(line) {
                return None;
            }
            Some(ListItem {
                line_start: whole.start(),
                indent: captures.get(1).map_or(0, |m| indent_width(m.as_str())),
            })
        })
    }

    /// Returns the marker indentation if `line` opens a list item.
    pub(crate) fn list_item_indent(self, line: &str) -> Option<usize> {
        if is_thematic_break(line) {
            return None;
        }
        let captures = self.list_pattern().captures(line)?;
        (captures.get(0)?.start() == 0)
            .then(|| captures.get(1).map_or(0, |m| indent_width(m.as_str())))
    }

    fn list_pattern(self) -> &'static Regex {
        match self {
            Self::Markdown => &*MARKDOWN_LIST_ITEM,
            Self::Rfc => &*RFC_LIST_ITEM,
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Rfc => write!(f, "rfc"),
        }
    }
}

/// Whether `line` is a Markdown thematic break: three or more of the same
/// `*`, `-` or `_`, optionally separated by spaces or tabs.
pub(crate) fn is_thematic_break(line: &str) -> bool {
    let mut marks = line.chars().filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'));
    let Some(first) = marks.next() else {
        return false;
    };
    let mut count = 1;
    for mark in marks {
        if mark != first {
            return false;
        }
        count += 1;
    }
    matches!(first, '*' | '-' | '_') && count >= 3
}

/// Width of a run of leading whitespace, counting tabs as four columns.
pub(crate) fn indent_width(whitespace: &str) -> usize {
    whitespace
        .chars()
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}
