//
// json/tokenizer.rs
//
// Lenient single-pass JSON scanner. Never fails: unterminated strings run
// to the end of the line, unknown characters become one-character tokens,
// and comments are collected into their own stream so comment-aware
// operations can be composed without re-scanning.
//

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftCurlyBracket,
    RightCurlyBracket,
    LeftSquareBracket,
    RightSquareBracket,
    Comma,
    Colon,
    QuotedString,
    Number,
    Boolean,
    Null,
    /// A bare word that is not `true`/`false`/`null`. Kept as a token so
    /// position queries still work over malformed documents.
    Literal,
    LineComment,
    BlockComment,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// The tokenizer's complete output for one document.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    /// Non-comment tokens, in document order.
    pub tokens: Vec<Token>,
    /// Comment tokens, in document order.
    pub comments: Vec<Token>,
}

/// Per-line byte lengths. Every line's length includes its terminating
/// newline except possibly the last line. An empty document has one line
/// of length zero.
pub fn line_lengths(text: &str) -> Vec<usize> {
    let mut lengths = Vec::new();
    let mut current = 0usize;
    for b in text.bytes() {
        current += 1;
        if b == b'\n' {
            lengths.push(current);
            current = 0;
        }
    }
    lengths.push(current);
    lengths
}

/// Scan `text` into its token and comment streams. Total: every byte of
/// input is either inside some token's span or whitespace.
pub fn tokenize(text: &str) -> TokenStream {
    let bytes = text.as_bytes();
    let mut stream = TokenStream::default();
    let mut i = 0usize;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'{' => {
                i += 1;
                stream.tokens.push(Token {
                    kind: TokenKind::LeftCurlyBracket,
                    span: Span::new(start, 1),
                });
            }
            b'}' => {
                i += 1;
                stream.tokens.push(Token {
                    kind: TokenKind::RightCurlyBracket,
                    span: Span::new(start, 1),
                });
            }
            b'[' => {
                i += 1;
                stream.tokens.push(Token {
                    kind: TokenKind::LeftSquareBracket,
                    span: Span::new(start, 1),
                });
            }
            b']' => {
                i += 1;
                stream.tokens.push(Token {
                    kind: TokenKind::RightSquareBracket,
                    span: Span::new(start, 1),
                });
            }
            b',' => {
                i += 1;
                stream.tokens.push(Token {
                    kind: TokenKind::Comma,
                    span: Span::new(start, 1),
                });
            }
            b':' => {
                i += 1;
                stream.tokens.push(Token {
                    kind: TokenKind::Colon,
                    span: Span::new(start, 1),
                });
            }
            b'"' => {
                i = scan_string(bytes, start);
                stream.tokens.push(Token {
                    kind: TokenKind::QuotedString,
                    span: Span::from_bounds(start, i),
                });
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = scan_line_comment(bytes, start);
                stream.comments.push(Token {
                    kind: TokenKind::LineComment,
                    span: Span::from_bounds(start, i),
                });
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = scan_block_comment(bytes, start);
                stream.comments.push(Token {
                    kind: TokenKind::BlockComment,
                    span: Span::from_bounds(start, i),
                });
            }
            b'-' | b'0'..=b'9' => {
                i = scan_number(bytes, start);
                stream.tokens.push(Token {
                    kind: TokenKind::Number,
                    span: Span::from_bounds(start, i),
                });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                i = scan_word(bytes, start);
                let word = &text[start..i];
                let kind = match word {
                    "true" | "false" => TokenKind::Boolean,
                    "null" => TokenKind::Null,
                    _ => TokenKind::Literal,
                };
                stream.tokens.push(Token {
                    kind,
                    span: Span::from_bounds(start, i),
                });
            }
            _ => {
                // Skip over the whole UTF-8 sequence so spans stay on
                // character boundaries.
                let len = utf8_len(b);
                i = (start + len).min(bytes.len());
                stream.tokens.push(Token {
                    kind: TokenKind::Unknown,
                    span: Span::from_bounds(start, i),
                });
            }
        }
    }

    stream
}

/// Scan a double-quoted string starting at `start`. An unterminated string
/// runs to the end of the line (or input), matching how editors recover
/// while the user is still typing the closing quote.
fn scan_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return i + 1,
            b'\n' => return i,
            b'\\' if i + 1 < bytes.len() && bytes[i + 1] != b'\n' => i += 2,
            _ => i += 1,
        }
    }
    i
}

fn scan_line_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn scan_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i < bytes.len() {
        if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            return i + 2;
        }
        i += 1;
    }
    i
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len()
        && matches!(bytes[i], b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-')
    {
        i += 1;
    }
    i
}

fn scan_word(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len()
        && matches!(bytes[i], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
    {
        i += 1;
    }
    i
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_object() {
        assert_eq!(
            kinds(r#"{ "a": 1 }"#),
            vec![
                TokenKind::LeftCurlyBracket,
                TokenKind::QuotedString,
                TokenKind::Colon,
                TokenKind::Number,
                TokenKind::RightCurlyBracket,
            ]
        );
    }

    #[test]
    fn test_string_span_includes_quotes() {
        let stream = tokenize(r#"  "ab"  "#);
        assert_eq!(stream.tokens[0].span, Span::new(2, 4));
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let stream = tokenize("\"abc\n1");
        assert_eq!(stream.tokens[0].kind, TokenKind::QuotedString);
        assert_eq!(stream.tokens[0].span, Span::new(0, 4));
        assert_eq!(stream.tokens[1].kind, TokenKind::Number);
    }

    #[test]
    fn test_escaped_quote_does_not_terminate() {
        let stream = tokenize(r#""a\"b""#);
        assert_eq!(stream.tokens.len(), 1);
        assert_eq!(stream.tokens[0].span.length(), 6);
    }

    #[test]
    fn test_comments_in_separate_stream() {
        let stream = tokenize("{ // note\n/* block */ }");
        assert_eq!(stream.tokens.len(), 2);
        assert_eq!(stream.comments.len(), 2);
        assert_eq!(stream.comments[0].kind, TokenKind::LineComment);
        assert_eq!(stream.comments[1].kind, TokenKind::BlockComment);
    }

    #[test]
    fn test_unclosed_block_comment_runs_to_end() {
        let stream = tokenize("/* never closed");
        assert_eq!(stream.comments.len(), 1);
        assert_eq!(stream.comments[0].span, Span::new(0, 15));
    }

    #[test]
    fn test_literals_and_bare_words() {
        assert_eq!(
            kinds("true false null truex"),
            vec![
                TokenKind::Boolean,
                TokenKind::Boolean,
                TokenKind::Null,
                TokenKind::Literal,
            ]
        );
    }

    #[test]
    fn test_unknown_characters_become_tokens() {
        let stream = tokenize("@");
        assert_eq!(stream.tokens[0].kind, TokenKind::Unknown);
        assert_eq!(stream.tokens[0].span.length(), 1);
    }

    #[test]
    fn test_line_lengths_include_newlines() {
        assert_eq!(line_lengths("ab\ncd\ne"), vec![3, 3, 1]);
        assert_eq!(line_lengths("ab\n"), vec![3, 0]);
        assert_eq!(line_lengths(""), vec![0]);
    }
}
