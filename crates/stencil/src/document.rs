//
// document.rs
//
// One ParseResult per document: the token and comment streams, the
// per-line length table, and the root JSON value, addressable by
// character offset. Built once from the document text and immutable
// thereafter; an edit produces a new ParseResult, never a mutation.
//

use std::sync::Arc;

use url::Url;

use crate::json::tokenizer::{self, Token, TokenStream};
use crate::json::{self, Value};
use crate::span::{ContainsBehavior, LineColPosition, Span};

/// Whether token queries see comment tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentPolicy {
    Include,
    Exclude,
}

pub struct ParseResult {
    uri: Url,
    text: String,
    tokens: Vec<Token>,
    comments: Vec<Token>,
    line_lengths: Vec<usize>,
    root: Option<Arc<Value>>,
}

impl ParseResult {
    /// Parse `text` into a document snapshot. Never fails: a malformed or
    /// empty document simply has no (or a partial) root value.
    pub fn parse(uri: Url, text: &str) -> Arc<Self> {
        let TokenStream { tokens, comments } = tokenizer::tokenize(text);
        let root = json::parse_value_tree(text, &tokens);
        Arc::new(Self {
            uri,
            text: text.to_string(),
            tokens,
            comments,
            line_lengths: tokenizer::line_lengths(text),
            root,
        })
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The root JSON value, or `None` for an empty/fatally malformed
    /// document. All downstream queries degrade through this.
    pub fn root_value(&self) -> Option<&Arc<Value>> {
        self.root.as_ref()
    }

    pub fn comment_tokens(&self) -> &[Token] {
        &self.comments
    }

    // -- offset <-> line/column ---------------------------------------------

    pub fn line_count(&self) -> usize {
        self.line_lengths.len()
    }

    pub fn max_line_index(&self) -> usize {
        self.line_lengths.len() - 1
    }

    /// The largest valid character offset: one less than the total text
    /// length, or 0 for an empty document.
    pub fn max_character_index(&self) -> usize {
        let total: usize = self.line_lengths.iter().sum();
        total.saturating_sub(1)
    }

    /// The largest addressable column on `line`. The terminating newline
    /// is excluded from addressable columns except on the last line,
    /// which has no newline and admits the end-of-document column.
    ///
    /// Panics when `line` does not exist — that is a caller bug.
    pub fn max_column_index(&self, line: usize) -> usize {
        let length = *self
            .line_lengths
            .get(line)
            .unwrap_or_else(|| panic!("line {line} out of range (document has {} lines)", self.line_count()));
        if line == self.max_line_index() {
            length
        } else {
            length.saturating_sub(1)
        }
    }

    /// Convert a line/column to an absolute character offset.
    ///
    /// Without `allow_out_of_bounds` an out-of-range position panics (a
    /// bad position is a caller bug that would corrupt offset math
    /// invisibly). With it, the position is clamped to the nearest valid
    /// offset.
    pub fn character_index(&self, position: LineColPosition, allow_out_of_bounds: bool) -> usize {
        let line = if position.line > self.max_line_index() {
            assert!(
                allow_out_of_bounds,
                "line {} out of range (document has {} lines)",
                position.line,
                self.line_count()
            );
            self.max_line_index()
        } else {
            position.line
        };

        let max_column = self.max_column_index(line);
        let column = if position.column > max_column {
            assert!(
                allow_out_of_bounds,
                "column {} out of range on line {line} (max {max_column})",
                position.column
            );
            max_column
        } else {
            position.column
        };

        self.line_lengths[..line].iter().sum::<usize>() + column
    }

    /// Convert an absolute character offset back to a line/column.
    /// Round-trips with [`Self::character_index`] for every valid offset.
    ///
    /// Panics when the offset lies beyond the end of the document.
    pub fn position_at(&self, offset: usize) -> LineColPosition {
        let mut remaining = offset;
        let last_line = self.max_line_index();
        for (line, &length) in self.line_lengths.iter().enumerate() {
            let addressable = if line == last_line { length + 1 } else { length };
            if remaining < addressable {
                return LineColPosition::new(line, remaining);
            }
            remaining -= length;
        }
        panic!(
            "offset {offset} out of range (max character index {})",
            self.max_character_index()
        );
    }

    // -- token and value lookup ---------------------------------------------

    /// The token containing `offset` under `Extended` containment, so a
    /// cursor sitting just past a token still finds it.
    pub fn token_at(&self, offset: usize, comments: CommentPolicy) -> Option<&Token> {
        let hit = self
            .tokens
            .iter()
            .find(|t| t.span.contains(offset, ContainsBehavior::Extended));
        match comments {
            CommentPolicy::Exclude => hit,
            CommentPolicy::Include => {
                // Comments win over the adjacent token when both match
                // under extended containment: the cursor is visibly
                // inside the comment text.
                self.comment_at(offset).or(hit)
            }
        }
    }

    /// The comment token containing `offset`, if any.
    pub fn comment_at(&self, offset: usize) -> Option<&Token> {
        self.comments
            .iter()
            .find(|t| t.span.contains(offset, ContainsBehavior::Extended))
    }

    /// All tokens overlapping `span`, in document order.
    pub fn tokens_in_span(&self, span: Span, comments: CommentPolicy) -> Vec<&Token> {
        let mut hits: Vec<&Token> = self
            .tokens
            .iter()
            .filter(|t| t.span.intersect(Some(span)).is_some())
            .collect();
        if comments == CommentPolicy::Include {
            hits.extend(
                self.comments
                    .iter()
                    .filter(|t| t.span.intersect(Some(span)).is_some()),
            );
            hits.sort_by_key(|t| t.span.start_index());
        }
        hits
    }

    /// The deepest value node containing `offset` under `behavior`, or
    /// `None` when the offset is outside the tree or inside a comment.
    pub fn value_at(&self, offset: usize, behavior: ContainsBehavior) -> Option<Arc<Value>> {
        if self.comment_at(offset).is_some() {
            return None;
        }
        self.root.as_ref()?.value_at(offset, behavior)
    }
}

impl std::fmt::Debug for ParseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseResult")
            .field("uri", &self.uri.as_str())
            .field("tokens", &self.tokens.len())
            .field("comments", &self.comments.len())
            .field("lines", &self.line_lengths.len())
            .field("has_root", &self.root.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::tokenizer::TokenKind;
    use proptest::prelude::*;

    fn doc(text: &str) -> Arc<ParseResult> {
        ParseResult::parse(Url::parse("file:///template.json").unwrap(), text)
    }

    #[test]
    fn test_max_character_index() {
        assert_eq!(doc("abc\ndef").max_character_index(), 6);
        assert_eq!(doc("").max_character_index(), 0);
    }

    #[test]
    fn test_max_column_index() {
        let d = doc("ab\ncdef");
        // "ab\n" has length 3; the newline at column 2 is addressable but
        // column 3 is not (it belongs to the next line).
        assert_eq!(d.max_column_index(0), 2);
        // Final line: the end-of-document column is addressable.
        assert_eq!(d.max_column_index(1), 4);
    }

    #[test]
    fn test_character_index_round_trip() {
        let d = doc("{\n  \"a\": 1\n}");
        for offset in 0..=d.max_character_index() {
            let position = d.position_at(offset);
            assert_eq!(d.character_index(position, false), offset);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_character_index_panics_out_of_bounds() {
        doc("ab").character_index(LineColPosition::new(5, 0), false);
    }

    #[test]
    fn test_character_index_clamps_when_allowed() {
        let d = doc("ab\ncd");
        assert_eq!(d.character_index(LineColPosition::new(9, 9), true), 5);
        assert_eq!(d.character_index(LineColPosition::new(0, 99), true), 2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_position_at_panics_past_end() {
        doc("ab").position_at(10);
    }

    #[test]
    fn test_token_at_extended_containment() {
        let text = r#"{ "a": 1 }"#;
        let d = doc(text);
        // Offset 5 is just past the closing quote of "a".
        let token = d.token_at(5, CommentPolicy::Exclude).unwrap();
        assert_eq!(token.kind, TokenKind::QuotedString);
    }

    #[test]
    fn test_token_at_comment_policies() {
        let text = "{ /* c */ }";
        let d = doc(text);
        assert!(d
            .token_at(4, CommentPolicy::Exclude)
            .map_or(true, |t| !t.is_comment()));
        let token = d.token_at(4, CommentPolicy::Include).unwrap();
        assert_eq!(token.kind, TokenKind::BlockComment);
    }

    #[test]
    fn test_value_at_ignores_comments() {
        let text = r#"{ "a": /* note */ 1 }"#;
        let d = doc(text);
        let comment_offset = text.find("note").unwrap();
        assert!(d.value_at(comment_offset, ContainsBehavior::Strict).is_none());
        let digit_offset = text.find('1').unwrap();
        assert!(d.value_at(digit_offset, ContainsBehavior::Strict).is_some());
    }

    #[test]
    fn test_tokens_in_span() {
        let text = r#"{ "a": 1, "b": 2 }"#;
        let d = doc(text);
        let hits = d.tokens_in_span(Span::new(0, 9), CommentPolicy::Exclude);
        // {, "a", :, 1, and the comma at offset 8.
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_tokens_in_span_excludes_adjacent_tokens() {
        let text = "1 2";
        let d = doc(text);
        // The token at offset 2 only touches the query span's boundary.
        let hits = d.tokens_in_span(Span::new(0, 2), CommentPolicy::Exclude);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(0, 1));
    }

    #[test]
    fn test_malformed_document_degrades() {
        let d = doc("not json at all @@@");
        assert!(d.root_value().is_none());
        assert!(d.value_at(3, ContainsBehavior::Strict).is_none());
    }

    proptest! {
        #[test]
        fn prop_offset_position_round_trip(text in "[a-z\n ]{0,40}") {
            let d = doc(&text);
            for offset in 0..=d.max_character_index() {
                let position = d.position_at(offset);
                prop_assert_eq!(d.character_index(position, false), offset);
            }
        }
    }
}
