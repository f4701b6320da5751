//
// references.rs
//
// The reference indexer: walks parsed expressions against a scope and
// accumulates a map from definition identity to every span that
// references it, across the template document and, when present, an
// associated parameter-value document.
//

use std::sync::Arc;

use indexmap::IndexMap;
use url::Url;

use crate::builtins;
use crate::definitions::{Definition, DefinitionId, DefinitionKind};
use crate::json::Value;
use crate::parameter_file::ParameterFile;
use crate::scope::TemplateScope;
use crate::span::Span;
use crate::tle::{self, Expression};

/// A span within a named document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSpan {
    pub uri: Url,
    pub span: Span,
}

/// All reference spans recorded for one definition. Every member shares
/// the definition's kind; merging lists of different kinds is a
/// programming error and fails fast.
#[derive(Debug, Clone)]
pub struct ReferenceList {
    kind: DefinitionKind,
    spans: Vec<DocumentSpan>,
}

impl ReferenceList {
    pub fn new(kind: DefinitionKind) -> Self {
        Self {
            kind,
            spans: Vec::new(),
        }
    }

    pub fn kind(&self) -> DefinitionKind {
        self.kind
    }

    pub fn spans(&self) -> &[DocumentSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn push(&mut self, span: DocumentSpan) {
        self.spans.push(span);
    }

    /// Append another list of the same kind.
    pub fn merge(&mut self, other: ReferenceList) {
        assert_eq!(
            self.kind, other.kind,
            "cannot merge reference lists of kinds {:?} and {:?}",
            self.kind, other.kind
        );
        self.spans.extend(other.spans);
    }
}

/// One definition's entry in the accumulator.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub definition: Definition,
    pub list: ReferenceList,
}

/// Accumulator keyed by definition identity (object identity, not name),
/// so same-spelled symbols in different scopes never collide. Iteration
/// order is insertion order, keeping output deterministic.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    entries: IndexMap<DefinitionId, ReferenceEntry>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, definition: Definition, span: DocumentSpan) {
        let entry = self
            .entries
            .entry(definition.id())
            .or_insert_with(|| ReferenceEntry {
                list: ReferenceList::new(definition.kind()),
                definition,
            });
        entry.list.push(span);
    }

    pub fn get(&self, id: DefinitionId) -> Option<&ReferenceEntry> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The reference whose span contains `offset` in `uri`, if any.
    pub fn reference_at(
        &self,
        uri: &Url,
        offset: usize,
        behavior: crate::span::ContainsBehavior,
    ) -> Option<(&Definition, Span)> {
        for entry in self.entries.values() {
            for document_span in entry.list.spans() {
                if document_span.uri == *uri && document_span.span.contains(offset, behavior) {
                    return Some((&entry.definition, document_span.span));
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Indexing
// ---------------------------------------------------------------------------

/// Index one parsed expression against `scope`, translating every
/// recorded span by `base_offset` (the document offset of the unquoted
/// string content the expression was parsed from).
pub fn index_expression(
    scope: &Arc<TemplateScope>,
    expression: &Expression,
    base_offset: usize,
    map: &mut ReferenceMap,
) {
    let uri = scope.document().uri().clone();
    expression.walk(&mut |node| {
        let Expression::FunctionCall(call) = node else {
            return;
        };
        if let Some(namespace_token) = &call.namespace_token {
            // Namespaced call: record the namespace, then the member.
            let Some(namespace) = scope.namespace_definition(&namespace_token.text) else {
                return;
            };
            map.add(
                Definition::Namespace(namespace.clone()),
                DocumentSpan {
                    uri: uri.clone(),
                    span: namespace_token.span.translate(base_offset as isize),
                },
            );
            if let Some(member) = namespace.member(call.name()) {
                map.add(
                    Definition::UserFunction(member.clone()),
                    DocumentSpan {
                        uri: uri.clone(),
                        span: call.name_token.span.translate(base_offset as isize),
                    },
                );
            }
            return;
        }

        let Some(builtin) = builtins::lookup(call.name()) else {
            return;
        };
        let symbol_argument = (call.is_call_to("parameters") || call.is_call_to("variables"))
            .then(|| call.single_string_argument())
            .flatten();
        match symbol_argument {
            Some(argument) => {
                // The reference belongs to the named parameter/variable,
                // recorded at the argument's unquoted span rather than at
                // the call name.
                let span = argument.unquoted_span().translate(base_offset as isize);
                if call.is_call_to("parameters") {
                    if let Some(parameter) = scope.parameter_definition(&argument.unquoted_value())
                    {
                        map.add(
                            Definition::Parameter(parameter),
                            DocumentSpan {
                                uri: uri.clone(),
                                span,
                            },
                        );
                    }
                } else if let Some(variable) =
                    scope.variable_definition(&argument.unquoted_value())
                {
                    map.add(
                        Definition::Variable(variable),
                        DocumentSpan {
                            uri: uri.clone(),
                            span,
                        },
                    );
                }
            }
            None => {
                map.add(
                    Definition::Builtin(builtin),
                    DocumentSpan {
                        uri: uri.clone(),
                        span: call.name_token.span.translate(base_offset as isize),
                    },
                );
            }
        }
    });
}

/// Index every expression string in the scope tree's document. Each
/// string resolves against the innermost scope whose root object
/// lexically contains it (which forwards to the parent's tables when the
/// scope shares symbols).
pub fn index_template(root_scope: &Arc<TemplateScope>, map: &mut ReferenceMap) {
    let Some(root_value) = root_scope.document().root_value() else {
        return;
    };
    let mut strings = Vec::new();
    collect_expression_strings(root_value, &mut strings);

    for string in strings {
        let scope = root_scope.innermost_scope_at(string.span.start_index());
        if let Some(expression) = tle::parse(&string.unquoted) {
            index_expression(
                &scope,
                &expression,
                string.unquoted_span().start_index(),
                map,
            );
        }
    }
}

/// Index a companion parameter-value document: each parameter value
/// naming a template parameter is a cross-document reference to it.
pub fn index_parameter_file(
    parameter_file: &ParameterFile,
    template_scope: &Arc<TemplateScope>,
    map: &mut ReferenceMap,
) {
    for value in parameter_file.parameter_values() {
        if let Some(parameter) = template_scope.parameter_definition(&value.name.unquoted) {
            map.add(
                Definition::Parameter(parameter),
                DocumentSpan {
                    uri: parameter_file.document().uri().clone(),
                    span: value.name.unquoted_span(),
                },
            );
        }
    }
}

fn collect_expression_strings(value: &Arc<Value>, out: &mut Vec<crate::json::StringValue>) {
    match value.as_ref() {
        Value::String(string) => {
            if tle::is_expression_string(&string.unquoted) {
                out.push(string.clone());
            }
        }
        _ => {
            for child in value.children() {
                collect_expression_strings(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ParseResult;
    use crate::span::ContainsBehavior;

    fn template_scope(text: &str) -> Arc<TemplateScope> {
        let document = ParseResult::parse(Url::parse("file:///template.json").unwrap(), text);
        TemplateScope::top_level(&document)
    }

    fn indexed(text: &str) -> (Arc<TemplateScope>, ReferenceMap) {
        let scope = template_scope(text);
        let mut map = ReferenceMap::new();
        index_template(&scope, &mut map);
        (scope, map)
    }

    #[test]
    fn test_reference_symmetry_for_parameter() {
        let text = r#"{
            "parameters": { "p": { "type": "string" } },
            "variables": {
                "a": "[parameters('p')]",
                "b": "[concat(parameters('p'), 'x')]"
            }
        }"#;
        let (scope, map) = indexed(text);
        let p = scope.parameter_definition("p").unwrap();
        let entry = map.get(Definition::Parameter(p).id()).unwrap();
        assert_eq!(entry.list.kind(), DefinitionKind::Parameter);
        assert_eq!(entry.list.len(), 2);

        // Each recorded span covers exactly the unquoted argument text.
        for document_span in entry.list.spans() {
            assert_eq!(document_span.span.text_of(text, 0), "p");
        }
    }

    #[test]
    fn test_variable_reference_spans() {
        let text = r#"{
            "variables": { "store": "x" },
            "outputs": { "o": { "value": "[variables('store')]" } }
        }"#;
        let (scope, map) = indexed(text);
        let v = scope.variable_definition("store").unwrap();
        let entry = map.get(Definition::Variable(v).id()).unwrap();
        assert_eq!(entry.list.len(), 1);
        assert_eq!(entry.list.spans()[0].span.text_of(text, 0), "store");
    }

    #[test]
    fn test_builtin_reference_recorded_at_name() {
        let text = r#"{ "outputs": { "o": { "value": "[concat('a', 'b')]" } } }"#;
        let (_, map) = indexed(text);
        let builtin = builtins::lookup("concat").unwrap();
        let entry = map.get(Definition::Builtin(builtin).id()).unwrap();
        assert_eq!(entry.list.kind(), DefinitionKind::BuiltinFunction);
        assert_eq!(entry.list.spans()[0].span.text_of(text, 0), "concat");
    }

    #[test]
    fn test_namespaced_call_records_namespace_and_member() {
        let text = r#"{
            "functions": [ {
                "namespace": "contoso",
                "members": { "uniqueName": { "parameters": [ { "name": "p", "type": "string" } ] } }
            } ],
            "outputs": { "o": { "value": "[contoso.uniqueName('x')]" } }
        }"#;
        let (scope, map) = indexed(text);
        let namespace = scope.namespace_definition("contoso").unwrap();
        let member = namespace.member("uniqueName").unwrap().clone();

        let ns_entry = map.get(Definition::Namespace(namespace).id()).unwrap();
        assert_eq!(ns_entry.list.len(), 1);
        assert_eq!(ns_entry.list.spans()[0].span.text_of(text, 0), "contoso");

        let fn_entry = map.get(Definition::UserFunction(member).id()).unwrap();
        assert_eq!(fn_entry.list.spans()[0].span.text_of(text, 0), "uniqueName");
    }

    #[test]
    fn test_unresolved_names_record_nothing() {
        let text = r#"{ "variables": { "a": "[parameters('ghost')]" } }"#;
        let (_, map) = indexed(text);
        // No parameter definition to key by; recursion still happened and
        // nothing panicked.
        assert!(map.is_empty());
    }

    #[test]
    fn test_outer_scope_expression_resolves_to_parent_definition() {
        let text = r#"{
            "parameters": { "p": {} },
            "resources": [ {
                "type": "Microsoft.Resources/deployments",
                "name": "n",
                "properties": {
                    "template": {
                        "outputs": { "o": { "value": "[parameters('p')]" } }
                    }
                }
            } ]
        }"#;
        let (scope, map) = indexed(text);
        let p = scope.parameter_definition("p").unwrap();
        let entry = map.get(Definition::Parameter(p).id()).unwrap();
        assert_eq!(entry.list.len(), 1);
    }

    #[test]
    fn test_inner_scope_expression_does_not_touch_parent() {
        let text = r#"{
            "parameters": { "p": {} },
            "resources": [ {
                "type": "Microsoft.Resources/deployments",
                "name": "n",
                "properties": {
                    "expressionEvaluationOptions": { "scope": "inner" },
                    "template": {
                        "parameters": { "p": {} },
                        "outputs": { "o": { "value": "[parameters('p')]" } }
                    }
                }
            } ]
        }"#;
        let (scope, map) = indexed(text);
        let outer_p = scope.parameter_definition("p").unwrap();
        assert!(map.get(Definition::Parameter(outer_p).id()).is_none());

        let inner = &scope.child_scopes()[0];
        let inner_p = inner.parameter_definition("p").unwrap();
        let entry = map.get(Definition::Parameter(inner_p).id()).unwrap();
        assert_eq!(entry.list.len(), 1);
    }

    #[test]
    fn test_reference_at_lookup() {
        let text = r#"{ "parameters": { "p": {} }, "variables": { "a": "[parameters('p')]" } }"#;
        let (_, map) = indexed(text);
        let argument_offset = text.rfind("'p'").unwrap() + 1;
        let (definition, span) = map
            .reference_at(
                &Url::parse("file:///template.json").unwrap(),
                argument_offset,
                ContainsBehavior::Extended,
            )
            .unwrap();
        assert_eq!(definition.kind(), DefinitionKind::Parameter);
        assert_eq!(span.text_of(text, 0), "p");
    }

    #[test]
    #[should_panic(expected = "cannot merge reference lists")]
    fn test_merge_kind_mismatch_panics() {
        let mut a = ReferenceList::new(DefinitionKind::Parameter);
        let b = ReferenceList::new(DefinitionKind::Variable);
        a.merge(b);
    }

    #[test]
    fn test_merge_same_kind() {
        let uri = Url::parse("file:///t.json").unwrap();
        let mut a = ReferenceList::new(DefinitionKind::Parameter);
        a.push(DocumentSpan {
            uri: uri.clone(),
            span: Span::new(0, 1),
        });
        let mut b = ReferenceList::new(DefinitionKind::Parameter);
        b.push(DocumentSpan {
            uri,
            span: Span::new(5, 1),
        });
        a.merge(b);
        assert_eq!(a.len(), 2);
    }
}
