//
// json/mod.rs
//
// Span-carrying JSON value tree and a lenient recursive-descent parser
// over the token stream. Parsing never fails: missing values, trailing
// commas and unclosed brackets produce a partial tree, because the
// analyzer must answer queries while the user is still typing.
//

pub mod tokenizer;

use std::sync::Arc;

use crate::span::{ContainsBehavior, Span};
use tokenizer::{Token, TokenKind};

/// A parsed JSON value. Every node carries the span of its own text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Object(ObjectValue),
    Array(ArrayValue),
    String(StringValue),
    Number(NumberValue),
    Boolean(BooleanValue),
    Null(NullValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    pub span: Span,
    pub properties: Vec<Property>,
}

/// One `"name": value` member of an object. The value is absent when the
/// document is malformed mid-edit (`"name":` with nothing after it).
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: StringValue,
    pub value: Option<Arc<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub span: Span,
    pub elements: Vec<Arc<Value>>,
}

/// A string token as a value. `unquoted` is the raw text between the
/// quotes (escapes are not processed, so offsets within it line up with
/// document offsets).
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub span: Span,
    pub unquoted: String,
    has_close_quote: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberValue {
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BooleanValue {
    pub span: Span,
    pub value: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NullValue {
    pub span: Span,
}

impl StringValue {
    pub fn from_token(span: Span, text: &str) -> Self {
        let raw = span.text_of(text, 0);
        let body = raw.strip_prefix('"').unwrap_or(raw);
        // A final quote preceded by an odd number of backslashes is an
        // escaped character at end of input, not a terminator.
        let escaped_final_quote = raw
            .as_bytes()
            .iter()
            .rev()
            .skip(1)
            .take_while(|&&b| b == b'\\')
            .count()
            % 2
            == 1;
        let has_close_quote = raw.len() >= 2 && raw.ends_with('"') && !escaped_final_quote;
        let unquoted = if has_close_quote {
            &body[..body.len() - 1]
        } else {
            body
        };
        Self {
            span,
            unquoted: unquoted.to_string(),
            has_close_quote,
        }
    }

    /// The span of the text between the quotes.
    pub fn unquoted_span(&self) -> Span {
        Span::new(self.span.start_index() + 1, self.unquoted.len())
    }

    /// The string including its quotes as it appears in the document.
    pub fn quoted(&self) -> String {
        if self.has_close_quote {
            format!("\"{}\"", self.unquoted)
        } else {
            format!("\"{}", self.unquoted)
        }
    }
}

impl Value {
    pub fn span(&self) -> Span {
        match self {
            Value::Object(v) => v.span,
            Value::Array(v) => v.span,
            Value::String(v) => v.span,
            Value::Number(v) => v.span,
            Value::Boolean(v) => v.span,
            Value::Null(v) => v.span,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringValue> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Child values in document order (object property values, array
    /// elements). Leaves have none.
    pub fn children(&self) -> Vec<&Arc<Value>> {
        match self {
            Value::Object(v) => v.properties.iter().filter_map(|p| p.value.as_ref()).collect(),
            Value::Array(v) => v.elements.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// The deepest descendant (or self) whose span contains `offset`
    /// under `behavior`, or `None` when the offset is outside this value.
    pub fn value_at(self: &Arc<Value>, offset: usize, behavior: ContainsBehavior) -> Option<Arc<Value>> {
        if !self.span().contains(offset, behavior) {
            return None;
        }
        // Property name strings are not reachable through children(), so
        // check them explicitly before descending into values.
        if let Value::Object(obj) = self.as_ref() {
            for property in &obj.properties {
                if property.name.span.contains(offset, behavior) {
                    return Some(Arc::new(Value::String(property.name.clone())));
                }
            }
        }
        for child in self.children() {
            if let Some(deepest) = child.value_at(offset, behavior) {
                return Some(deepest);
            }
        }
        Some(self.clone())
    }
}

impl ObjectValue {
    /// Look up a property by name, case-insensitively (deployment
    /// documents treat property names as case-insensitive). First match
    /// wins here; last-match-wins shadowing is a symbol-table rule, not a
    /// JSON one, and is applied by the scope layer.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.unquoted.eq_ignore_ascii_case(name))
    }

    pub fn property_value(&self, name: &str) -> Option<&Arc<Value>> {
        self.property(name).and_then(|p| p.value.as_ref())
    }

    pub fn string_property(&self, name: &str) -> Option<&StringValue> {
        self.property_value(name).and_then(|v| v.as_string())
    }
}

// ---------------------------------------------------------------------------
// Lenient parser
// ---------------------------------------------------------------------------

/// Build the value tree from a token stream. Returns `None` for an empty
/// document or one that opens with something unusable.
pub fn parse_value_tree(text: &str, tokens: &[Token]) -> Option<Arc<Value>> {
    let mut cursor = Cursor { tokens, index: 0 };
    parse_value(text, &mut cursor)
}

struct Cursor<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).copied();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    /// The span just past the last consumed token, for closing unclosed
    /// containers at end of input.
    fn previous_after_end(&self) -> usize {
        self.index
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.after_end_index())
            .unwrap_or(0)
    }
}

fn parse_value(text: &str, cursor: &mut Cursor) -> Option<Arc<Value>> {
    let token = *cursor.peek()?;
    match token.kind {
        TokenKind::LeftCurlyBracket => Some(parse_object(text, cursor)),
        TokenKind::LeftSquareBracket => Some(parse_array(text, cursor)),
        TokenKind::QuotedString => {
            cursor.next();
            Some(Arc::new(Value::String(StringValue::from_token(token.span, text))))
        }
        TokenKind::Number => {
            cursor.next();
            Some(Arc::new(Value::Number(NumberValue { span: token.span })))
        }
        TokenKind::Boolean => {
            cursor.next();
            let value = token.span.text_of(text, 0) == "true";
            Some(Arc::new(Value::Boolean(BooleanValue {
                span: token.span,
                value,
            })))
        }
        TokenKind::Null => {
            cursor.next();
            Some(Arc::new(Value::Null(NullValue { span: token.span })))
        }
        _ => None,
    }
}

fn parse_object(text: &str, cursor: &mut Cursor) -> Arc<Value> {
    let open = cursor.next().expect("caller checked for '{'");
    let mut properties = Vec::new();
    let mut close_span: Option<Span> = None;

    while let Some(&token) = cursor.peek() {
        match token.kind {
            TokenKind::RightCurlyBracket => {
                cursor.next();
                close_span = Some(token.span);
                break;
            }
            TokenKind::QuotedString => {
                let name = StringValue::from_token(token.span, text);
                cursor.next();
                let mut value = None;
                if cursor.peek().map(|t| t.kind) == Some(TokenKind::Colon) {
                    cursor.next();
                    value = parse_value(text, cursor);
                }
                properties.push(Property { name, value });
            }
            TokenKind::Comma => {
                cursor.next();
            }
            _ => {
                // Not a member and not a close brace. Skip it so a stray
                // token mid-edit doesn't hide the rest of the object.
                log::debug!(
                    "skipping unexpected {:?} at offset {}",
                    token.kind,
                    token.span.start_index()
                );
                cursor.next();
            }
        }
    }

    let after_end = close_span
        .map(|s| s.after_end_index())
        .unwrap_or_else(|| cursor.previous_after_end());
    Arc::new(Value::Object(ObjectValue {
        span: Span::from_bounds(open.span.start_index(), after_end),
        properties,
    }))
}

fn parse_array(text: &str, cursor: &mut Cursor) -> Arc<Value> {
    let open = cursor.next().expect("caller checked for '['");
    let mut elements = Vec::new();
    let mut close_span: Option<Span> = None;

    while let Some(&token) = cursor.peek() {
        match token.kind {
            TokenKind::RightSquareBracket => {
                cursor.next();
                close_span = Some(token.span);
                break;
            }
            TokenKind::Comma => {
                cursor.next();
            }
            _ => {
                if let Some(value) = parse_value(text, cursor) {
                    elements.push(value);
                } else {
                    log::debug!(
                        "skipping unexpected {:?} at offset {}",
                        token.kind,
                        token.span.start_index()
                    );
                    cursor.next();
                }
            }
        }
    }

    let after_end = close_span
        .map(|s| s.after_end_index())
        .unwrap_or_else(|| cursor.previous_after_end());
    Arc::new(Value::Array(ArrayValue {
        span: Span::from_bounds(open.span.start_index(), after_end),
        elements,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenizer::tokenize;

    fn parse(text: &str) -> Option<Arc<Value>> {
        let stream = tokenize(text);
        parse_value_tree(text, &stream.tokens)
    }

    #[test]
    fn test_object_properties_in_order() {
        let root = parse(r#"{ "b": 1, "a": "x" }"#).unwrap();
        let obj = root.as_object().unwrap();
        assert_eq!(obj.properties.len(), 2);
        assert_eq!(obj.properties[0].name.unquoted, "b");
        assert_eq!(obj.properties[1].name.unquoted, "a");
    }

    #[test]
    fn test_object_span_covers_braces() {
        let text = r#"  { "a": 1 }"#;
        let root = parse(text).unwrap();
        assert_eq!(root.span(), Span::new(2, 10));
    }

    #[test]
    fn test_case_insensitive_property_lookup() {
        let root = parse(r#"{ "Parameters": {} }"#).unwrap();
        let obj = root.as_object().unwrap();
        assert!(obj.property_value("parameters").is_some());
        assert!(obj.property_value("PARAMETERS").is_some());
        assert!(obj.property_value("missing").is_none());
    }

    #[test]
    fn test_string_value_unquoted_span() {
        let text = r#"{ "a": "hello" }"#;
        let root = parse(text).unwrap();
        let s = root
            .as_object()
            .unwrap()
            .property_value("a")
            .unwrap()
            .as_string()
            .unwrap()
            .clone();
        assert_eq!(s.unquoted, "hello");
        assert_eq!(s.unquoted_span(), Span::new(8, 5));
        assert_eq!(s.quoted(), "\"hello\"");
    }

    #[test]
    fn test_escaped_quote_at_end_of_input_is_not_a_terminator() {
        // "ab\" followed by end of input: the final quote is escaped, so
        // the string is unterminated and the escape stays unprocessed.
        let text = "\"ab\\\"";
        let s = StringValue::from_token(Span::new(0, text.len()), text);
        assert_eq!(s.unquoted, "ab\\\"");
        assert_eq!(s.quoted(), "\"ab\\\"");

        // An even number of backslashes leaves the final quote closing.
        let text = "\"ab\\\\\"";
        let s = StringValue::from_token(Span::new(0, text.len()), text);
        assert_eq!(s.unquoted, "ab\\\\");
        assert_eq!(s.quoted(), "\"ab\\\\\"");
    }

    #[test]
    fn test_missing_value_keeps_property() {
        let root = parse(r#"{ "a": }"#).unwrap();
        let obj = root.as_object().unwrap();
        assert_eq!(obj.properties.len(), 1);
        assert!(obj.properties[0].value.is_none());
    }

    #[test]
    fn test_unclosed_object_is_partial_not_error() {
        let root = parse(r#"{ "a": 1, "b": 2"#).unwrap();
        let obj = root.as_object().unwrap();
        assert_eq!(obj.properties.len(), 2);
        assert_eq!(obj.span.after_end_index(), 16);
    }

    #[test]
    fn test_empty_input_has_no_root() {
        assert!(parse("").is_none());
        assert!(parse("   ").is_none());
    }

    #[test]
    fn test_nested_arrays_and_objects() {
        let root = parse(r#"{ "r": [ { "x": 1 }, 2, [3] ] }"#).unwrap();
        let arr = root
            .as_object()
            .unwrap()
            .property_value("r")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(arr.elements.len(), 3);
        assert!(arr.elements[0].as_object().is_some());
    }

    #[test]
    fn test_value_at_descends_to_deepest() {
        let text = r#"{ "a": { "b": 7 } }"#;
        let root = parse(text).unwrap();
        // Offset of the digit 7.
        let offset = text.find('7').unwrap();
        let hit = root.value_at(offset, ContainsBehavior::Strict).unwrap();
        assert!(matches!(hit.as_ref(), Value::Number(_)));
        // The property name "b" is reachable too.
        let name_offset = text.find('b').unwrap();
        let hit = root.value_at(name_offset, ContainsBehavior::Strict).unwrap();
        assert_eq!(hit.as_string().unwrap().unquoted, "b");
    }

    #[test]
    fn test_value_at_outside_returns_none() {
        let text = r#"  { "a": 1 }  "#;
        let root = parse(text).unwrap();
        assert!(root.value_at(0, ContainsBehavior::Strict).is_none());
    }
}
