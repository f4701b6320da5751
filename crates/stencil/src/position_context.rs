//
// position_context.rs
//
// The façade external collaborators call through: for one
// (document, offset) pair, what token and value is here, does the cursor
// touch a definition or a reference, where would a completion replace,
// and what container would an insertion land in.
//

use std::sync::Arc;

use url::Url;

use crate::cache::CachedValue;
use crate::definitions::Definition;
use crate::document::{CommentPolicy, ParseResult};
use crate::json::Value;
use crate::json::tokenizer::Token;
use crate::parameter_file::ParameterFile;
use crate::references::{self, ReferenceList, ReferenceMap};
use crate::scope::TemplateScope;
use crate::span::{ContainsBehavior, LineColPosition, Span};

/// Whether the cursor touches the definition itself or a use of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSiteKind {
    Definition,
    Reference,
}

/// The link between "where the cursor is" and "what it means".
#[derive(Debug, Clone)]
pub struct ReferenceSiteInfo {
    pub site_kind: ReferenceSiteKind,
    /// The span the cursor touches (unquoted name text).
    pub referencing_span: Span,
    pub referencing_document_uri: Url,
    pub definition: Definition,
    /// `None` for built-in functions, which live in no document.
    pub definition_document_uri: Option<Url>,
}

/// Characters the completion replacement span extends through. The
/// expression grammar allows name characters ('-', '!', '$') that the
/// raw JSON tokenizer does not group into one token.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'!' | b'$' | b'-')
}

pub struct PositionContext {
    document: Arc<ParseResult>,
    root_scope: Arc<TemplateScope>,
    offset: usize,
    /// The template's reference map, indexed on first query and reused by
    /// every later one.
    template_references: CachedValue<ReferenceMap>,
}

impl PositionContext {
    /// Context at a character offset. `document` is the document the
    /// offset addresses — the template itself, or an associated
    /// parameter file analyzed against the template's scope tree.
    ///
    /// Panics when the offset lies past the end of the document: a bad
    /// offset is a caller bug, not a document problem.
    pub fn from_offset(
        document: &Arc<ParseResult>,
        root_scope: &Arc<TemplateScope>,
        offset: usize,
    ) -> Self {
        assert!(
            offset <= document.text().len(),
            "offset {offset} past end of document ({} bytes)",
            document.text().len()
        );
        Self {
            document: document.clone(),
            root_scope: root_scope.clone(),
            offset,
            template_references: CachedValue::new(),
        }
    }

    /// Context at a line/column position, converted through the
    /// document's line table. Panics on an out-of-range position unless
    /// `allow_out_of_bounds` asks for clamping.
    pub fn from_position(
        document: &Arc<ParseResult>,
        root_scope: &Arc<TemplateScope>,
        position: LineColPosition,
        allow_out_of_bounds: bool,
    ) -> Self {
        let offset = document.character_index(position, allow_out_of_bounds);
        Self::from_offset(document, root_scope, offset)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn document(&self) -> &Arc<ParseResult> {
        &self.document
    }

    /// The scope governing expressions at the cursor.
    pub fn scope(&self) -> Arc<TemplateScope> {
        self.root_scope.innermost_scope_at(self.offset)
    }

    /// The token the cursor touches, under extended containment.
    pub fn token_at_cursor(&self, comments: CommentPolicy) -> Option<&Token> {
        self.document.token_at(self.offset, comments)
    }

    /// The deepest value the cursor touches, under extended containment.
    pub fn value_at_cursor(&self) -> Option<Arc<Value>> {
        self.document.value_at(self.offset, ContainsBehavior::Extended)
    }

    // -- reference and definition queries -----------------------------------

    /// The template's reference map, plus the associated parameter file's
    /// contribution when one is supplied. The template side is indexed once
    /// per context; the parameter-file spans are layered on per call.
    fn build_reference_map(&self, associated: Option<&ParameterFile>) -> ReferenceMap {
        let mut map = self
            .template_references
            .get_or_init(|| {
                let mut map = ReferenceMap::new();
                references::index_template(&self.root_scope, &mut map);
                map
            })
            .clone();
        if let Some(parameter_file) = associated {
            references::index_parameter_file(parameter_file, &self.root_scope, &mut map);
        }
        map
    }

    /// What the cursor touches: a reference to some definition, or a
    /// definition's own name. `None` when it touches neither.
    pub fn reference_site_info(
        &self,
        associated: Option<&ParameterFile>,
    ) -> Option<ReferenceSiteInfo> {
        let template_uri = self.root_scope.document().uri().clone();

        // A reference span under the cursor wins over the (enclosing)
        // definition span: the cursor is on the use, not the declaration.
        let map = self.build_reference_map(associated);
        if let Some((definition, span)) =
            map.reference_at(self.document.uri(), self.offset, ContainsBehavior::Extended)
        {
            let definition_document_uri = match definition {
                Definition::Builtin(_) => None,
                Definition::ParameterValue(_) => {
                    associated.map(|f| f.document().uri().clone())
                }
                _ => Some(template_uri),
            };
            return Some(ReferenceSiteInfo {
                site_kind: ReferenceSiteKind::Reference,
                referencing_span: span,
                referencing_document_uri: self.document.uri().clone(),
                definition: definition.clone(),
                definition_document_uri,
            });
        }

        // Cursor inside an associated parameter file: its entries define
        // parameter values, tied back to the template's parameters.
        if let Some(parameter_file) = associated {
            if parameter_file.document().uri() == self.document.uri() {
                let value = parameter_file.parameter_value_at(self.offset)?;
                return Some(ReferenceSiteInfo {
                    site_kind: ReferenceSiteKind::Definition,
                    referencing_span: value.name.unquoted_span(),
                    referencing_document_uri: self.document.uri().clone(),
                    definition: Definition::ParameterValue(value),
                    definition_document_uri: Some(
                        parameter_file.document().uri().clone(),
                    ),
                });
            }
        }

        // Otherwise: is the cursor on a definition's own name?
        for definition in self.root_scope.all_definitions() {
            let Some(name_span) = definition.name_span() else {
                continue;
            };
            if name_span.contains(self.offset, ContainsBehavior::Extended) {
                return Some(ReferenceSiteInfo {
                    site_kind: ReferenceSiteKind::Definition,
                    referencing_span: name_span,
                    referencing_document_uri: self.document.uri().clone(),
                    definition,
                    definition_document_uri: Some(template_uri),
                });
            }
        }
        None
    }

    /// Every span referencing `definition` across the template and, when
    /// present, the associated parameter file.
    pub fn references_to(
        &self,
        definition: &Definition,
        associated: Option<&ParameterFile>,
    ) -> ReferenceList {
        let map = self.build_reference_map(associated);
        map.get(definition.id())
            .map(|entry| entry.list.clone())
            .unwrap_or_else(|| ReferenceList::new(definition.kind()))
    }

    /// Reference list for whatever definition the cursor touches.
    pub fn references_at_cursor(
        &self,
        associated: Option<&ParameterFile>,
    ) -> Option<(Definition, ReferenceList)> {
        let site = self.reference_site_info(associated)?;
        // A parameter value ties back to the template parameter it sets;
        // its references are that parameter's.
        let definition = match &site.definition {
            Definition::ParameterValue(value) => self
                .root_scope
                .parameter_definition(&value.name.unquoted)
                .map(Definition::Parameter)
                .unwrap_or_else(|| site.definition.clone()),
            other => other.clone(),
        };
        let list = self.references_to(&definition, associated);
        Some((definition, list))
    }

    // -- editing support queries --------------------------------------------

    /// The span a completion should replace: the cursor's word, extended
    /// left and right through expression-name characters.
    pub fn completion_replacement_span(&self) -> Span {
        let bytes = self.document.text().as_bytes();
        let mut start = self.offset.min(bytes.len());
        while start > 0 && is_word_byte(bytes[start - 1]) {
            start -= 1;
        }
        let mut after_end = self.offset.min(bytes.len());
        while after_end < bytes.len() && is_word_byte(bytes[after_end]) {
            after_end += 1;
        }
        Span::from_bounds(start, after_end)
    }

    /// The deepest object or array that directly and non-comment-
    /// encloses the offset — the container a newly inserted property or
    /// element would belong to.
    pub fn insertion_parent(&self) -> Option<Arc<Value>> {
        if self.document.comment_at(self.offset).is_some() {
            return None;
        }
        let root = self.document.root_value()?;
        deepest_container(root, self.offset)
    }
}

fn deepest_container(value: &Arc<Value>, offset: usize) -> Option<Arc<Value>> {
    let is_container = matches!(value.as_ref(), Value::Object(_) | Value::Array(_));
    if !is_container || !value.span().contains(offset, ContainsBehavior::Enclosed) {
        return None;
    }
    for child in value.children() {
        if let Some(deeper) = deepest_container(child, offset) {
            return Some(deeper);
        }
    }
    Some(value.clone())
}

impl std::fmt::Debug for PositionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionContext")
            .field("document", &self.document.uri().as_str())
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::DefinitionKind;
    use crate::json::tokenizer::TokenKind;

    fn analyze(text: &str) -> (Arc<ParseResult>, Arc<TemplateScope>) {
        let document = ParseResult::parse(Url::parse("file:///template.json").unwrap(), text);
        let scope = TemplateScope::top_level(&document);
        (document, scope)
    }

    fn context_at(
        document: &Arc<ParseResult>,
        scope: &Arc<TemplateScope>,
        offset: usize,
    ) -> PositionContext {
        PositionContext::from_offset(document, scope, offset)
    }

    const TEMPLATE: &str = r#"{
    "parameters": { "prefix": { "type": "string" } },
    "variables": { "name": "[concat(parameters('prefix'), '-store')]" },
    "outputs": { "o": { "value": "[variables('name')]" } }
}"#;

    #[test]
    fn test_cursor_on_reference() {
        let (document, scope) = analyze(TEMPLATE);
        let offset = TEMPLATE.find("'prefix'").unwrap() + 1;
        let context = context_at(&document, &scope, offset);

        let site = context.reference_site_info(None).unwrap();
        assert_eq!(site.site_kind, ReferenceSiteKind::Reference);
        assert_eq!(site.definition.kind(), DefinitionKind::Parameter);
        assert_eq!(site.referencing_span.text_of(TEMPLATE, 0), "prefix");
        assert_eq!(
            site.definition_document_uri.as_ref().unwrap().as_str(),
            "file:///template.json"
        );
    }

    #[test]
    fn test_cursor_on_definition() {
        let (document, scope) = analyze(TEMPLATE);
        // Inside the parameter's declaring name, not a use of it.
        let offset = TEMPLATE.find("prefix").unwrap() + 2;
        let context = context_at(&document, &scope, offset);

        let site = context.reference_site_info(None).unwrap();
        assert_eq!(site.site_kind, ReferenceSiteKind::Definition);
        assert_eq!(site.definition.kind(), DefinitionKind::Parameter);
    }

    #[test]
    fn test_cursor_on_nothing() {
        let (document, scope) = analyze(TEMPLATE);
        let context = context_at(&document, &scope, 0);
        assert!(context.reference_site_info(None).is_none());
    }

    #[test]
    fn test_reference_map_indexed_once() {
        let (document, scope) = analyze(TEMPLATE);
        let offset = TEMPLATE.find("'name'").unwrap() + 1;
        let context = context_at(&document, &scope, offset);

        assert!(context.template_references.get().is_none());
        // references_at_cursor builds the map twice over (site lookup,
        // then the reference list); both reuse the memoized template map.
        let (_, first) = context.references_at_cursor(None).unwrap();
        let memoized: *const ReferenceMap = context.template_references.get().unwrap();
        let (_, second) = context.references_at_cursor(None).unwrap();
        assert!(std::ptr::eq(
            memoized,
            context.template_references.get().unwrap()
        ));
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_references_at_cursor_symmetry() {
        let (document, scope) = analyze(TEMPLATE);
        let offset = TEMPLATE.find("'name'").unwrap() + 1;
        let context = context_at(&document, &scope, offset);

        let (definition, list) = context.references_at_cursor(None).unwrap();
        assert_eq!(definition.kind(), DefinitionKind::Variable);
        assert_eq!(list.len(), 1);
        assert_eq!(list.kind(), DefinitionKind::Variable);
    }

    #[test]
    fn test_parameter_file_cross_document_references() {
        let (template_document, scope) = analyze(TEMPLATE);
        let parameter_text = r#"{ "parameters": { "prefix": { "value": "sto" } } }"#;
        let parameter_document = ParseResult::parse(
            Url::parse("file:///template.parameters.json").unwrap(),
            parameter_text,
        );
        let file = ParameterFile::new(&parameter_document);

        // From the template side: the parameter has one in-template
        // reference plus the parameter file's naming span.
        let template_context = context_at(
            &template_document,
            &scope,
            TEMPLATE.find("'prefix'").unwrap() + 1,
        );
        let (definition, list) = template_context.references_at_cursor(Some(&file)).unwrap();
        assert_eq!(definition.kind(), DefinitionKind::Parameter);
        assert_eq!(list.len(), 2);
        assert!(list
            .spans()
            .iter()
            .any(|s| s.uri.as_str() == "file:///template.parameters.json"));

        // From the parameter file side: the cursor on "prefix" reaches
        // the same reference list.
        let file_offset = parameter_text.find("prefix").unwrap() + 1;
        let file_context =
            PositionContext::from_offset(&parameter_document, &scope, file_offset);
        let site = file_context.reference_site_info(Some(&file)).unwrap();
        assert_eq!(site.site_kind, ReferenceSiteKind::Reference);
        assert_eq!(site.definition.kind(), DefinitionKind::Parameter);
        assert_eq!(
            site.definition_document_uri.as_ref().unwrap().as_str(),
            "file:///template.json"
        );
    }

    #[test]
    fn test_token_and_value_at_cursor() {
        let (document, scope) = analyze(TEMPLATE);
        let offset = TEMPLATE.find("\"parameters\"").unwrap() + 3;
        let context = context_at(&document, &scope, offset);
        assert_eq!(
            context.token_at_cursor(CommentPolicy::Exclude).unwrap().kind,
            TokenKind::QuotedString
        );
        let value = context.value_at_cursor().unwrap();
        assert_eq!(value.as_string().unwrap().unquoted, "parameters");
    }

    #[test]
    fn test_completion_replacement_span() {
        let text = r#"{ "v": "[resource-Group!x" }"#;
        let (document, scope) = analyze(text);
        let offset = text.find("Group").unwrap();
        let context = context_at(&document, &scope, offset);
        let span = context.completion_replacement_span();
        assert_eq!(span.text_of(text, 0), "resource-Group!x");

        // At a non-word character the span is empty.
        let context = context_at(&document, &scope, 0);
        assert!(context.completion_replacement_span().is_empty());
    }

    #[test]
    fn test_insertion_parent() {
        let text = r#"{ "variables": { "a": 1 }, "resources": [ 1 ] }"#;
        let (document, scope) = analyze(text);

        // Inside the variables object.
        let context = context_at(&document, &scope, text.find("\"a\"").unwrap());
        let parent = context.insertion_parent().unwrap();
        assert!(parent.as_object().is_some());
        assert_eq!(parent.span().text_of(text, 0), r#"{ "a": 1 }"#);

        // Inside the resources array.
        let context = context_at(&document, &scope, text.find("[ 1").unwrap() + 2);
        let parent = context.insertion_parent().unwrap();
        assert!(parent.as_array().is_some());
    }

    #[test]
    fn test_insertion_parent_not_in_comments() {
        let text = "{ /* inside */ }";
        let (document, scope) = analyze(text);
        let context = context_at(&document, &scope, text.find("inside").unwrap());
        assert!(context.insertion_parent().is_none());
    }

    #[test]
    #[should_panic(expected = "past end of document")]
    fn test_offset_past_end_panics() {
        let (document, scope) = analyze("{}");
        let _ = context_at(&document, &scope, 99);
    }

    #[test]
    fn test_from_position_round_trip() {
        let text = "{\n  \"a\": 1\n}";
        let (document, scope) = analyze(text);
        let context = PositionContext::from_position(
            &document,
            &scope,
            LineColPosition::new(1, 2),
            false,
        );
        assert_eq!(context.offset(), 4);
    }
}
