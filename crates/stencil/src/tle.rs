//
// tle.rs
//
// Lexer and lenient parser for the template expression language embedded
// in JSON strings: a string whose unquoted text starts with "[" (but not
// "[[") and ends with "]" holds an expression such as
// [concat(parameters('prefix'), '-store')]. All spans are relative to the
// unquoted string content; callers translate by the string's start offset
// when mapping back into the document.
//

use crate::span::Span;

/// Whether a JSON string's unquoted text is an expression. "[[" escapes
/// the marker: the string is literal text beginning with "[".
pub fn is_expression_string(unquoted: &str) -> bool {
    unquoted.starts_with('[')
        && !unquoted.starts_with("[[")
        && unquoted.trim_end().ends_with(']')
        && unquoted.trim_end().len() >= 2
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TleTokenKind {
    LeftParenthesis,
    RightParenthesis,
    LeftSquareBracket,
    RightSquareBracket,
    Comma,
    Period,
    QuotedString,
    Number,
    Literal,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TleToken {
    pub kind: TleTokenKind,
    pub span: Span,
    pub text: String,
}

fn tokenize(text: &str) -> Vec<TleToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let start = i;
        let b = bytes[i];
        let kind = match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                TleTokenKind::LeftParenthesis
            }
            b')' => {
                i += 1;
                TleTokenKind::RightParenthesis
            }
            b'[' => {
                i += 1;
                TleTokenKind::LeftSquareBracket
            }
            b']' => {
                i += 1;
                TleTokenKind::RightSquareBracket
            }
            b',' => {
                i += 1;
                TleTokenKind::Comma
            }
            b'.' => {
                i += 1;
                TleTokenKind::Period
            }
            b'\'' => {
                i = scan_string(bytes, start);
                TleTokenKind::QuotedString
            }
            b'0'..=b'9' => {
                i = scan_number(bytes, start);
                TleTokenKind::Number
            }
            b'-' if matches!(bytes.get(i + 1), Some(b'0'..=b'9')) => {
                i = scan_number(bytes, start + 1);
                TleTokenKind::Number
            }
            _ if is_literal_start(b) => {
                i += 1;
                while i < bytes.len() && is_literal_continue(bytes[i]) {
                    i += 1;
                }
                TleTokenKind::Literal
            }
            _ => {
                i += 1;
                TleTokenKind::Unknown
            }
        };
        tokens.push(TleToken {
            kind,
            span: Span::from_bounds(start, i),
            text: text[start..i].to_string(),
        });
    }

    tokens
}

/// Single-quoted string with '' as the escaped quote. Unterminated
/// strings run to the end of the expression text.
fn scan_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    i
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() && matches!(bytes[i], b'0'..=b'9') {
        i += 1;
    }
    i
}

fn is_literal_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

// The expression grammar is laxer about name characters than JSON's
// tokenizer is: '-', '!' and '$' all occur in the wild.
fn is_literal_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'-' | b'!')
}

// ---------------------------------------------------------------------------
// Expression tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    FunctionCall(FunctionCallExpression),
    StringLiteral(StringLiteralExpression),
    NumberLiteral(NumberLiteralExpression),
    PropertyAccess(PropertyAccessExpression),
    ArrayAccess(ArrayAccessExpression),
}

/// A call such as `concat(a, b)` or `contoso.uniqueName('x')`. A bare
/// name mid-edit (no parentheses yet) parses as a call with no arguments
/// so completion can still see it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallExpression {
    pub namespace_token: Option<TleToken>,
    pub name_token: TleToken,
    pub argument_expressions: Vec<Expression>,
    pub span: Span,
}

impl FunctionCallExpression {
    pub fn name(&self) -> &str {
        &self.name_token.text
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace_token.as_ref().map(|t| t.text.as_str())
    }

    /// Whether this is an unnamespaced call to `name` (case-insensitive).
    pub fn is_call_to(&self, name: &str) -> bool {
        self.namespace_token.is_none() && self.name_token.text.eq_ignore_ascii_case(name)
    }

    /// The single string-literal argument, when the call has exactly that
    /// shape. Any other shape yields `None` — no guessing.
    pub fn single_string_argument(&self) -> Option<&StringLiteralExpression> {
        match self.argument_expressions.as_slice() {
            [Expression::StringLiteral(literal)] => Some(literal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteralExpression {
    pub token: TleToken,
}

impl StringLiteralExpression {
    /// The text between the quotes, with '' unescaped to '.
    pub fn unquoted_value(&self) -> String {
        let raw = &self.token.text;
        let body = raw.strip_prefix('\'').unwrap_or(raw);
        let body = if raw.len() >= 2 && raw.ends_with('\'') {
            &body[..body.len() - 1]
        } else {
            body
        };
        body.replace("''", "'")
    }

    /// The span of the text between the quotes (relative to the
    /// expression string, like every TLE span).
    pub fn unquoted_span(&self) -> Span {
        let raw = &self.token.text;
        let close = usize::from(raw.len() >= 2 && raw.ends_with('\''));
        Span::new(
            self.token.span.start_index() + 1,
            raw.len().saturating_sub(1 + close),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteralExpression {
    pub token: TleToken,
}

/// `source.name`, e.g. `resourceGroup().location`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccessExpression {
    pub source: Box<Expression>,
    pub name_token: Option<TleToken>,
    pub span: Span,
}

/// `source[index]`, e.g. `variables('list')[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayAccessExpression {
    pub source: Box<Expression>,
    pub index: Option<Box<Expression>>,
    pub span: Span,
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::FunctionCall(e) => e.span,
            Expression::StringLiteral(e) => e.token.span,
            Expression::NumberLiteral(e) => e.token.span,
            Expression::PropertyAccess(e) => e.span,
            Expression::ArrayAccess(e) => e.span,
        }
    }

    /// Pre-order walk over this expression and every sub-expression. The
    /// reference indexer drives its accumulator through this.
    pub fn walk(&self, visit: &mut impl FnMut(&Expression)) {
        visit(self);
        match self {
            Expression::FunctionCall(call) => {
                for argument in &call.argument_expressions {
                    argument.walk(visit);
                }
            }
            Expression::PropertyAccess(access) => access.source.walk(visit),
            Expression::ArrayAccess(access) => {
                access.source.walk(visit);
                if let Some(index) = &access.index {
                    index.walk(visit);
                }
            }
            Expression::StringLiteral(_) | Expression::NumberLiteral(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse the unquoted text of an expression string. Lenient: missing
/// closing tokens produce a partial tree; hopeless input yields `None`.
pub fn parse(unquoted: &str) -> Option<Expression> {
    let tokens = tokenize(unquoted);
    let mut cursor = Cursor {
        tokens: &tokens,
        index: 0,
    };
    // Skip the leading "[" expression marker when present.
    if cursor.peek_kind() == Some(TleTokenKind::LeftSquareBracket) {
        cursor.advance();
    }
    parse_expression(&mut cursor)
}

struct Cursor<'a> {
    tokens: &'a [TleToken],
    index: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<&TleToken> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self) -> Option<TleTokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_kind_at(&self, ahead: usize) -> Option<TleTokenKind> {
        self.tokens.get(self.index + ahead).map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<TleToken> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }
}

fn parse_expression(cursor: &mut Cursor) -> Option<Expression> {
    let mut expression = parse_primary(cursor)?;

    loop {
        match cursor.peek_kind() {
            Some(TleTokenKind::Period) => {
                let period = cursor.advance().expect("peeked");
                let name_token = if cursor.peek_kind() == Some(TleTokenKind::Literal) {
                    cursor.advance()
                } else {
                    None
                };
                let end = name_token
                    .as_ref()
                    .map(|t| t.span.after_end_index())
                    .unwrap_or_else(|| period.span.after_end_index());
                let span = Span::from_bounds(expression.span().start_index(), end);
                expression = Expression::PropertyAccess(PropertyAccessExpression {
                    source: Box::new(expression),
                    name_token,
                    span,
                });
            }
            Some(TleTokenKind::LeftSquareBracket) => {
                let open = cursor.advance().expect("peeked");
                let index = parse_expression(cursor).map(Box::new);
                let mut end = index
                    .as_ref()
                    .map(|e| e.span().after_end_index())
                    .unwrap_or_else(|| open.span.after_end_index());
                if cursor.peek_kind() == Some(TleTokenKind::RightSquareBracket) {
                    end = cursor.advance().expect("peeked").span.after_end_index();
                }
                let span = Span::from_bounds(expression.span().start_index(), end);
                expression = Expression::ArrayAccess(ArrayAccessExpression {
                    source: Box::new(expression),
                    index,
                    span,
                });
            }
            _ => break,
        }
    }

    Some(expression)
}

fn parse_primary(cursor: &mut Cursor) -> Option<Expression> {
    match cursor.peek_kind()? {
        TleTokenKind::QuotedString => {
            let token = cursor.advance().expect("peeked");
            Some(Expression::StringLiteral(StringLiteralExpression { token }))
        }
        TleTokenKind::Number => {
            let token = cursor.advance().expect("peeked");
            Some(Expression::NumberLiteral(NumberLiteralExpression { token }))
        }
        TleTokenKind::Literal => Some(parse_function_call(cursor)),
        _ => {
            // Unknown leading token: drop it and keep trying, so one bad
            // character doesn't hide the rest of the expression.
            cursor.advance();
            parse_primary(cursor)
        }
    }
}

fn parse_function_call(cursor: &mut Cursor) -> Expression {
    let first = cursor.advance().expect("caller checked for a literal");

    // "ns.member" — a namespace qualifier is only recognized when a
    // literal follows the period; "a.b" without a call still parses as a
    // namespaced call so reference queries work mid-edit.
    let (namespace_token, name_token) = if cursor.peek_kind() == Some(TleTokenKind::Period)
        && cursor.peek_kind_at(1) == Some(TleTokenKind::Literal)
    {
        cursor.advance(); // period
        let member = cursor.advance().expect("peeked");
        (Some(first), member)
    } else {
        (None, first)
    };

    let mut end = name_token.span.after_end_index();
    let mut argument_expressions = Vec::new();

    if cursor.peek_kind() == Some(TleTokenKind::LeftParenthesis) {
        end = cursor.advance().expect("peeked").span.after_end_index();
        loop {
            match cursor.peek_kind() {
                None => break,
                Some(TleTokenKind::RightParenthesis) => {
                    end = cursor.advance().expect("peeked").span.after_end_index();
                    break;
                }
                Some(TleTokenKind::Comma) => {
                    end = cursor.advance().expect("peeked").span.after_end_index();
                }
                Some(TleTokenKind::RightSquareBracket) => {
                    // The expression's closing bracket: the call was never
                    // closed. Leave the bracket for the caller.
                    break;
                }
                _ => match parse_expression(cursor) {
                    Some(argument) => {
                        end = argument.span().after_end_index();
                        argument_expressions.push(argument);
                    }
                    None => break,
                },
            }
        }
    }

    let start = namespace_token
        .as_ref()
        .map(|t| t.span.start_index())
        .unwrap_or_else(|| name_token.span.start_index());
    Expression::FunctionCall(FunctionCallExpression {
        namespace_token,
        name_token,
        argument_expressions,
        span: Span::from_bounds(start, end),
    })
}
