//! Splits a section body into requirement statements.
//!
//! Plain text is cut into sentences and every sentence carrying an RFC 2119
//! keyword becomes a statement. A list is attached to the sentence that
//! introduces it (its "parent"): each item yields one statement of the form
//! `"<parent> <item>"`, at the level of the parent's first keyword. Nested
//! list items are folded into the text of the item that contains them.

use crate::domain::{
    annotation::normalize_whitespace,
    grammar::{indent_width, is_thematic_break},
    Grammar, Level,
};

/// Abbreviations whose trailing period never ends a sentence.
const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "vs", "cf", "al", "approx", "fig", "no", "resp", "incl", "mr", "mrs", "ms",
    "dr",
];

/// A requirement statement found in a section body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Level of the governing keyword.
    pub level: Level,
    /// The whitespace-normalised statement text.
    pub content: String,
}

/// Extracts the requirement statements from a section body, in document
/// order.
///
/// `text` must not include the section's own header line.
#[must_use]
pub fn split(text: &str, grammar: Grammar) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut rest = text;

    while !rest.trim().is_empty() {
        let Some(item) = grammar.first_list_item(rest) else {
            statements.extend(inline_statements(rest));
            break;
        };

        let prefix = &rest[..item.line_start];
        let parent_start = list_parent_start(prefix);
        statements.extend(inline_statements(&prefix[..parent_start]));

        let parent = normalize_whitespace(&prefix[parent_start..]);
        let block = &rest[item.line_start..];
        let block_len = list_extent(block, item.indent, grammar);

        match Level::detect(&parent) {
            Some(level) => statements.extend(
                list_items(&block[..block_len], item.indent, grammar)
                    .into_iter()
                    .map(|entry| Statement {
                        level,
                        content: format!("{parent} {entry}"),
                    }),
            ),
            None => tracing::trace!(%parent, "list parent has no keyword, skipping list"),
        }

        rest = &block[block_len..];
    }

    statements
}

/// Sentences of a block of plain text that carry a keyword.
fn inline_statements(text: &str) -> impl Iterator<Item = Statement> + '_ {
    sentences(text).into_iter().filter_map(|sentence| {
        let content = normalize_whitespace(sentence);
        Level::detect(&content).map(|level| Statement { level, content })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    /// A `.`, `!` or `?` followed by whitespace or the end of the text.
    Terminator,
    /// The line break before a blank line, or around a thematic break.
    Paragraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundary {
    /// Offset just past the end of the sentence.
    offset: usize,
    kind: BoundaryKind,
}

fn boundaries(text: &str) -> Vec<Boundary> {
    let mut found = Vec::new();
    for (i, c) in text.char_indices() {
        match c {
            '.' | '!' | '?' => {
                let end = i + c.len_utf8();
                let at_break = text[end..].chars().next().is_none_or(char::is_whitespace);
                if at_break && (c != '.' || !is_protected_period(text, i)) {
                    found.push(Boundary {
                        offset: end,
                        kind: BoundaryKind::Terminator,
                    });
                }
            }
            '\n' => {
                let line_start = text[..i].rfind('\n').map_or(0, |p| p + 1);
                let next_line = &text[i + 1..];
                let next_line = &next_line[..next_line.find('\n').unwrap_or(next_line.len())];
                let blank_follows =
                    next_line.trim().is_empty() && text[i + 1..].contains('\n');
                if blank_follows
                    || is_thematic_break(&text[line_start..i])
                    || is_thematic_break(next_line)
                {
                    found.push(Boundary {
                        offset: i,
                        kind: BoundaryKind::Paragraph,
                    });
                }
            }
            _ => {}
        }
    }
    found
}

/// Whether the period at byte `index` belongs to an abbreviation, acronym or
/// line-leading ordinal rather than ending a sentence.
fn is_protected_period(text: &str, index: usize) -> bool {
    let before = &text[..index];
    let word_start = before
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8());
    let word = before[word_start..].trim_start_matches(['(', '[', '"', '\'']);

    if word.is_empty() {
        return false;
    }

    if ABBREVIATIONS.contains(&word.to_lowercase().as_str()) {
        return true;
    }

    let segments: Vec<&str> = word.split('.').collect();
    let single_letters = segments
        .iter()
        .all(|segment| segment.chars().count() == 1 && segment.chars().all(char::is_alphabetic));
    if single_letters {
        // `U.S.` and `e.g.`; a lone letter such as `Appendix B.` ends a sentence
        return segments.len() > 1;
    }

    if word.chars().all(|c| c.is_ascii_digit()) {
        let line_start = before[..word_start].rfind('\n').map_or(0, |i| i + 1);
        return before[line_start..word_start].trim().is_empty();
    }

    false
}

/// Cuts plain text into sentences, dropping blank ones.
fn sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in boundaries(text) {
        sentences.push(&text[start..boundary.offset]);
        start = boundary.offset;
    }
    sentences.push(&text[start..]);
    sentences.retain(|sentence| !sentence.trim().is_empty());
    sentences
}

/// Finds where the sentence introducing a list begins.
///
/// This is the end of the last terminated sentence before the list. A
/// paragraph break also bounds the parent, unless only whitespace follows it
/// (a blank line between the parent and its first item).
fn list_parent_start(prefix: &str) -> usize {
    boundaries(prefix)
        .into_iter()
        .rev()
        .find(|boundary| match boundary.kind {
            BoundaryKind::Terminator => true,
            BoundaryKind::Paragraph => !prefix[boundary.offset..].trim().is_empty(),
        })
        .map_or(0, |boundary| boundary.offset)
}

/// Length of the list block starting at the beginning of `block`.
///
/// The block ends at a thematic break, or at the first blank line that is not
/// followed by another list item or by text indented deeper than the items.
fn list_extent(block: &str, item_indent: usize, grammar: Grammar) -> usize {
    let mut offset = 0;
    let mut blank_run_start = None;

    for line in block.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if line.trim().is_empty() {
            blank_run_start.get_or_insert(line_start);
            continue;
        }

        if is_thematic_break(line) {
            return blank_run_start.unwrap_or(line_start);
        }

        if let Some(blank) = blank_run_start.take() {
            let continues = grammar.list_item_indent(line).is_some()
                || leading_indent(line) > item_indent;
            if !continues {
                return blank;
            }
        }
    }

    blank_run_start.unwrap_or(block.len())
}

/// Splits a list block into whitespace-normalised items, markers included.
///
/// Lines that are not markers at the item indentation continue the current
/// item; this includes nested list items.
fn list_items(block: &str, item_indent: usize, grammar: Grammar) -> Vec<String> {
    let mut items: Vec<Vec<&str>> = Vec::new();

    for line in block.lines() {
        let opens_item = grammar
            .list_item_indent(line)
            .is_some_and(|indent| indent <= item_indent);
        match items.last_mut() {
            Some(current) if !opens_item => current.push(line),
            _ => items.push(vec![line]),
        }
    }

    items
        .into_iter()
        .map(|lines| normalize_whitespace(&lines.join("\n")))
        .filter(|item| !item.is_empty())
        .collect()
}

fn leading_indent(line: &str) -> usize {
    let trimmed = line.trim_start_matches([' ', '\t']);
    indent_width(&line[..line.len() - trimmed.len()])
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn contents(statements: &[Statement]) -> Vec<&str> {
        statements.iter().map(|s| s.content.as_str()).collect()
    }

    #[test]
    fn one_statement_per_keyword_sentence() {
        let text = "\nThe name of the sections MUST NOT be nested.\nA requirements section MUST be the top level containing header.\nA header MUST NOT itself be a requirement.\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(
            contents(&statements),
            [
                "The name of the sections MUST NOT be nested.",
                "A requirements section MUST be the top level containing header.",
                "A header MUST NOT itself be a requirement.",
            ]
        );
        assert!(statements.iter().all(|s| s.level == Level::Must));
    }

    #[test]
    fn sentences_without_keywords_are_dropped() {
        let text = "Duvet is a tool. It helps! Clients MAY cache results? Yes.";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(contents(&statements), ["Clients MAY cache results?"]);
        assert_eq!(statements[0].level, Level::May);
    }

    #[test]
    fn list_items_are_joined_to_their_parent() {
        let text = "A requirement MUST be terminated by one of the following\n* period (.)\n- exclamation point (!)\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(
            contents(&statements),
            [
                "A requirement MUST be terminated by one of the following * period (.)",
                "A requirement MUST be terminated by one of the following - exclamation point (!)",
            ]
        );
        assert!(statements.iter().all(|s| s.level == Level::Must));
    }

    #[test]
    fn text_around_a_list_is_split_inline() {
        let text = "Intro sentence MAY apply. The client MUST send:\n\n- a\n- b\n\nAfter the list, servers SHOULD reply.\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(
            contents(&statements),
            [
                "Intro sentence MAY apply.",
                "The client MUST send: - a",
                "The client MUST send: - b",
                "After the list, servers SHOULD reply.",
            ]
        );
        let levels: Vec<_> = statements.iter().map(|s| s.level).collect();
        assert_eq!(levels, [Level::May, Level::Must, Level::Must, Level::Should]);
    }

    #[test]
    fn list_without_keyword_parent_contributes_nothing() {
        let text = "Options:\n- MUST a\n- SHOULD b\n";
        assert!(split(text, Grammar::Markdown).is_empty());
    }

    #[test]
    fn terminated_sentence_before_list_is_not_a_parent() {
        let text = "Servers MUST log.\n- first\n- second\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(contents(&statements), ["Servers MUST log."]);
    }

    #[test]
    fn first_parent_keyword_sets_item_level() {
        let text = "Clients SHOULD, and servers MUST, support:\n1. gzip\n2. brotli\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(statements.len(), 2);
        assert!(statements.iter().all(|s| s.level == Level::Should));
    }

    #[test]
    fn nested_items_fold_into_their_parent_item() {
        let text = "The server MUST support:\n- alpha\n  - alpha one\n  - alpha two\n- beta\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(
            contents(&statements),
            [
                "The server MUST support: - alpha - alpha one - alpha two",
                "The server MUST support: - beta",
            ]
        );
    }

    #[test]
    fn continuation_lines_join_their_item() {
        let text = "Values MUST be one of:\n- the first value,\n  which wraps\n- the second\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(
            contents(&statements),
            [
                "Values MUST be one of: - the first value, which wraps",
                "Values MUST be one of: - the second",
            ]
        );
    }

    #[test]
    fn consecutive_lists_each_find_their_parent() {
        let text = "Clients MUST send:\n- a\n\nServers MAY answer with:\n- b\n- c\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(
            contents(&statements),
            [
                "Clients MUST send: - a",
                "Servers MAY answer with: - b",
                "Servers MAY answer with: - c",
            ]
        );
    }

    #[test]
    fn paragraph_break_bounds_the_parent() {
        let text = "Some heading text\n\nThe parser MUST accept:\n- one\n";
        let statements = split(text, Grammar::Markdown);
        assert_eq!(contents(&statements), ["The parser MUST accept: - one"]);
    }

    #[test]
    fn rfc_lists_with_blank_lines() {
        let text = "\n   The client MUST send one of:\n\n   o  foo\n\n   o  bar,\n      wrapped\n\n   Following paragraphs SHOULD stand alone.\n";
        let statements = split(text, Grammar::Rfc);
        assert_eq!(
            contents(&statements),
            [
                "The client MUST send one of: o foo",
                "The client MUST send one of: o bar, wrapped",
                "Following paragraphs SHOULD stand alone.",
            ]
        );
    }

    #[test]
    fn unterminated_final_sentence_is_kept() {
        let statements = split("The value MUST be set", Grammar::Markdown);
        assert_eq!(contents(&statements), ["The value MUST be set"]);
    }

    #[test]
    fn duplicate_sentences_are_all_reported() {
        let statements = split("It MUST work. It MUST work.", Grammar::Markdown);
        assert_eq!(statements.len(), 2);
    }

    #[test_case("Implementations MUST accept e.g. spaces. They MAY log.", 2; "abbreviation")]
    #[test_case("Version 1.5 MUST be supported. Version 2.0 MAY be.", 2; "decimal")]
    #[test_case("The U.S. office MUST comply. Others SHOULD.", 2; "acronym")]
    #[test_case("See Appendix B. Clients MUST send hello.", 1; "single letter ends a sentence")]
    #[test_case("Wait... it MUST work.", 1; "ellipsis mid sentence")]
    fn protected_periods(text: &str, expected: usize) {
        assert_eq!(split(text, Grammar::Markdown).len(), expected);
    }

    #[test_case("See Appendix B. Clients MUST send hello."; "appendix")]
    #[test_case("Use Option D. Clients MUST send hello."; "option")]
    #[test_case("As in Table C. Clients MUST send hello."; "table")]
    fn lettered_reference_ends_its_sentence(text: &str) {
        assert_eq!(
            contents(&split(text, Grammar::Markdown)),
            ["Clients MUST send hello."]
        );
    }

    #[test]
    fn thematic_break_is_neither_list_nor_text() {
        let text = "Values MUST be set\n* * *\nNext, clients MUST retry.\n";
        assert_eq!(
            contents(&split(text, Grammar::Markdown)),
            ["Values MUST be set", "Next, clients MUST retry."]
        );
    }

    #[test]
    fn thematic_break_ends_a_list() {
        let text = "Values MUST be:\n- a\n- - -\nClients MAY stop.\n";
        assert_eq!(
            contents(&split(text, Grammar::Markdown)),
            ["Values MUST be: - a", "Clients MAY stop."]
        );
    }

    #[test]
    fn line_leading_ordinal_does_not_end_a_sentence() {
        assert_eq!(
            sentences("See step\n3. It continues here."),
            ["See step\n3. It continues here."]
        );
    }

    #[test]
    fn blank_lines_separate_sentences() {
        assert_eq!(
            sentences("Title without period\n\nBody MUST follow."),
            ["Title without period", "\n\nBody MUST follow."]
        );
    }

    #[test]
    fn empty_text_has_no_statements() {
        assert!(split("", Grammar::Markdown).is_empty());
        assert!(split("\n\n   \n", Grammar::Rfc).is_empty());
    }
}
