//
// scope.rs
//
// The scope tree over one or more documents. Each scope node exposes
// parameter/variable/namespace/resource tables computed lazily from its
// owning JSON object, or forwarded unchanged from its parent when the
// scope does not own its symbols (nested deployments with outer
// evaluation scope, linked templates). Resources are always private to
// the scope that declares them.
//

use std::sync::{Arc, Weak};

use crate::cache::CachedValue;
use crate::definitions::{
    Definition, NamespaceDefinition, ParameterDefinition, ResourceDefinition,
    UserFunctionDefinition, VariableDefinition,
};
use crate::document::ParseResult;
use crate::json::{ObjectValue, Property, Value};
use crate::span::Span;
use crate::tle::FunctionCallExpression;

/// The resource type whose elements produce child deployment scopes.
const DEPLOYMENTS_RESOURCE_TYPE: &str = "microsoft.resources/deployments";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    TopLevel,
    /// Nested deployment with `expressionEvaluationOptions.scope: "inner"`:
    /// symbols come from the nested template itself.
    NestedInnerScope,
    /// Nested deployment with outer (or unspecified) evaluation scope:
    /// symbols are the parent's; only resources are its own.
    NestedOuterScope,
    /// A `templateLink` deployment. Shares the parent's symbols and has no
    /// statically visible content of its own.
    LinkedTemplate,
    /// A user-defined function body: only the function's own declared
    /// parameters are visible.
    UserFunction,
}

pub struct TemplateScope {
    kind: ScopeKind,
    document: Arc<ParseResult>,
    root_object: Option<Arc<Value>>,
    parent: Weak<TemplateScope>,
    /// Only for `UserFunction` scopes: the function's declared parameters.
    function_parameters: Option<Vec<Arc<ParameterDefinition>>>,
    parameters: CachedValue<Vec<Arc<ParameterDefinition>>>,
    variables: CachedValue<Vec<Arc<VariableDefinition>>>,
    namespaces: CachedValue<Vec<Arc<NamespaceDefinition>>>,
    resources: CachedValue<Vec<Arc<ResourceDefinition>>>,
    children: CachedValue<Vec<Arc<TemplateScope>>>,
}

impl TemplateScope {
    /// The top-level scope of a document. Built eagerly once per
    /// document; child scopes are created lazily from its resources.
    pub fn top_level(document: &Arc<ParseResult>) -> Arc<TemplateScope> {
        let root_object = document
            .root_value()
            .filter(|v| v.as_object().is_some())
            .cloned();
        Arc::new(TemplateScope {
            kind: ScopeKind::TopLevel,
            document: document.clone(),
            root_object,
            parent: Weak::new(),
            function_parameters: None,
            parameters: CachedValue::new(),
            variables: CachedValue::new(),
            namespaces: CachedValue::new(),
            resources: CachedValue::new(),
            children: CachedValue::new(),
        })
    }

    fn child(
        kind: ScopeKind,
        parent: &Arc<TemplateScope>,
        root_object: Option<Arc<Value>>,
        function_parameters: Option<Vec<Arc<ParameterDefinition>>>,
    ) -> Arc<TemplateScope> {
        Arc::new(TemplateScope {
            kind,
            document: parent.document.clone(),
            root_object,
            parent: Arc::downgrade(parent),
            function_parameters,
            parameters: CachedValue::new(),
            variables: CachedValue::new(),
            namespaces: CachedValue::new(),
            resources: CachedValue::new(),
            children: CachedValue::new(),
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn document(&self) -> &Arc<ParseResult> {
        &self.document
    }

    pub fn parent(&self) -> Option<Arc<TemplateScope>> {
        self.parent.upgrade()
    }

    pub fn root_object(&self) -> Option<&Arc<Value>> {
        self.root_object.as_ref()
    }

    /// Whether this scope's parameter/variable/namespace tables are its
    /// own rather than forwarded from the parent.
    pub fn has_unique_symbols(&self) -> bool {
        matches!(
            self.kind,
            ScopeKind::TopLevel | ScopeKind::NestedInnerScope | ScopeKind::UserFunction
        )
    }

    /// Whether the scope's content lives outside this document (linked
    /// templates are opaque to static analysis).
    pub fn is_external(&self) -> bool {
        self.kind == ScopeKind::LinkedTemplate
    }

    fn root_as_object(&self) -> Option<&ObjectValue> {
        self.root_object.as_ref().and_then(|v| v.as_object())
    }

    // -- symbol tables ------------------------------------------------------

    pub fn parameter_definitions(&self) -> Vec<Arc<ParameterDefinition>> {
        if let Some(function_parameters) = &self.function_parameters {
            return function_parameters.clone();
        }
        if !self.has_unique_symbols() {
            return self
                .parent()
                .map(|p| p.parameter_definitions())
                .unwrap_or_default();
        }
        self.parameters
            .get_or_init(|| compute_parameters(self.root_as_object()))
            .clone()
    }

    pub fn variable_definitions(&self) -> Vec<Arc<VariableDefinition>> {
        if self.kind == ScopeKind::UserFunction {
            // A function body sees no variables at all.
            return Vec::new();
        }
        if !self.has_unique_symbols() {
            return self
                .parent()
                .map(|p| p.variable_definitions())
                .unwrap_or_default();
        }
        self.variables
            .get_or_init(|| compute_variables(self.root_as_object()))
            .clone()
    }

    pub fn namespace_definitions(&self) -> Vec<Arc<NamespaceDefinition>> {
        if self.kind == ScopeKind::UserFunction {
            return Vec::new();
        }
        if !self.has_unique_symbols() {
            return self
                .parent()
                .map(|p| p.namespace_definitions())
                .unwrap_or_default();
        }
        self.namespaces
            .get_or_init(|| compute_namespaces(self.root_as_object()))
            .clone()
    }

    /// Resources declared by this scope itself. Never forwarded: a
    /// shared-symbol scope still owns its resources. Linked templates
    /// expose none.
    pub fn resource_definitions(&self) -> Vec<Arc<ResourceDefinition>> {
        if self.is_external() || self.kind == ScopeKind::UserFunction {
            return Vec::new();
        }
        self.resources
            .get_or_init(|| compute_resources(self.root_as_object()))
            .clone()
    }

    // -- definition lookup --------------------------------------------------

    /// Resolve a parameter name: strip one layer of quotes, compare
    /// case-insensitively, and let the last declaration win (a later
    /// re-declaration shadows an earlier one, mirroring the deployment
    /// runtime's own resolution).
    pub fn parameter_definition(&self, name: &str) -> Option<Arc<ParameterDefinition>> {
        let bare = strip_quotes(name);
        self.parameter_definitions()
            .into_iter()
            .rev()
            .find(|d| d.name.unquoted.eq_ignore_ascii_case(bare))
    }

    pub fn variable_definition(&self, name: &str) -> Option<Arc<VariableDefinition>> {
        let bare = strip_quotes(name);
        self.variable_definitions()
            .into_iter()
            .rev()
            .find(|d| d.name.unquoted.eq_ignore_ascii_case(bare))
    }

    /// Case-insensitive namespace lookup; first structural match.
    pub fn namespace_definition(&self, name: &str) -> Option<Arc<NamespaceDefinition>> {
        let bare = strip_quotes(name);
        self.namespace_definitions()
            .into_iter()
            .find(|d| d.name.unquoted.eq_ignore_ascii_case(bare))
    }

    pub fn user_function_definition(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<Arc<UserFunctionDefinition>> {
        self.namespace_definition(namespace)?
            .member(strip_quotes(name))
            .cloned()
    }

    /// The parameter denoted by a `parameters('name')` call, when the
    /// call has exactly that shape. Any other shape yields `None`.
    pub fn parameter_definition_from_call(
        &self,
        call: &FunctionCallExpression,
    ) -> Option<Arc<ParameterDefinition>> {
        if !call.is_call_to("parameters") {
            return None;
        }
        let argument = call.single_string_argument()?;
        self.parameter_definition(&argument.unquoted_value())
    }

    pub fn variable_definition_from_call(
        &self,
        call: &FunctionCallExpression,
    ) -> Option<Arc<VariableDefinition>> {
        if !call.is_call_to("variables") {
            return None;
        }
        let argument = call.single_string_argument()?;
        self.variable_definition(&argument.unquoted_value())
    }

    // -- child scopes -------------------------------------------------------

    /// Child scopes: one per deployment resource of this scope, plus —
    /// only when this scope owns its symbols — one per member of each of
    /// its own function namespaces.
    pub fn child_scopes(self: &Arc<Self>) -> Vec<Arc<TemplateScope>> {
        self.children
            .get_or_init(|| {
                let mut children = self.deployment_child_scopes();
                if self.has_unique_symbols() {
                    for namespace in self.namespace_definitions() {
                        for member in &namespace.members {
                            children.push(member.scope(self));
                        }
                    }
                }
                children
            })
            .clone()
    }

    fn deployment_child_scopes(self: &Arc<Self>) -> Vec<Arc<TemplateScope>> {
        let mut children = Vec::new();
        if self.is_external() || self.kind == ScopeKind::UserFunction {
            return children;
        }
        let Some(resources) = self
            .root_as_object()
            .and_then(|o| o.property_value("resources"))
            .and_then(|v| v.as_array())
        else {
            return children;
        };

        for element in &resources.elements {
            let Some(resource) = element.as_object() else {
                continue;
            };
            let is_deployment = resource
                .string_property("type")
                .map(|t| t.unquoted.eq_ignore_ascii_case(DEPLOYMENTS_RESOURCE_TYPE))
                .unwrap_or(false);
            if !is_deployment {
                continue;
            }
            let Some(properties_value) = resource.property_value("properties") else {
                continue;
            };
            let Some(properties) = properties_value.as_object() else {
                continue;
            };

            if let Some(template) = properties.property_value("template") {
                let inner = properties
                    .property_value("expressionEvaluationOptions")
                    .and_then(|v| v.as_object())
                    .and_then(|o| o.string_property("scope"))
                    .map(|s| s.unquoted.eq_ignore_ascii_case("inner"))
                    .unwrap_or(false);
                let kind = if inner {
                    ScopeKind::NestedInnerScope
                } else {
                    ScopeKind::NestedOuterScope
                };
                children.push(TemplateScope::child(kind, self, Some(template.clone()), None));
            } else if properties.property("templateLink").is_some() {
                children.push(TemplateScope::child(
                    ScopeKind::LinkedTemplate,
                    self,
                    Some(properties_value.clone()),
                    None,
                ));
            }
        }
        children
    }

    /// This scope and every scope below it, preorder.
    pub fn descendants_and_self(self: &Arc<Self>) -> Vec<Arc<TemplateScope>> {
        let mut scopes = vec![self.clone()];
        let mut index = 0;
        while index < scopes.len() {
            let scope = scopes[index].clone();
            scopes.extend(scope.child_scopes());
            index += 1;
        }
        scopes
    }

    /// The innermost scope in this tree whose root object contains
    /// `offset`. Falls back to `self`: an offset outside every child's
    /// root object belongs to the scope it is lexically inside.
    pub fn innermost_scope_at(self: &Arc<Self>, offset: usize) -> Arc<TemplateScope> {
        let mut best = self.clone();
        let mut best_length = usize::MAX;
        for scope in self.descendants_and_self() {
            if let Some(span) = scope.root_object.as_ref().map(|v| v.span()) {
                if span.contains(offset, crate::span::ContainsBehavior::Strict)
                    && span.length() < best_length
                {
                    best_length = span.length();
                    best = scope;
                }
            }
        }
        best
    }

    /// Every definition declared anywhere in this scope tree, for
    /// definition-at-cursor queries. Shared-symbol scopes contribute
    /// nothing of their own (their tables are the parent's); every scope
    /// contributes its private resources.
    pub fn all_definitions(self: &Arc<Self>) -> Vec<Definition> {
        let mut definitions = Vec::new();
        for scope in self.descendants_and_self() {
            match scope.kind {
                ScopeKind::TopLevel | ScopeKind::NestedInnerScope => {
                    definitions.extend(
                        scope
                            .parameter_definitions()
                            .into_iter()
                            .map(Definition::Parameter),
                    );
                    definitions.extend(
                        scope
                            .variable_definitions()
                            .into_iter()
                            .map(Definition::Variable),
                    );
                    for namespace in scope.namespace_definitions() {
                        definitions.extend(
                            namespace
                                .members
                                .iter()
                                .cloned()
                                .map(Definition::UserFunction),
                        );
                        definitions.push(Definition::Namespace(namespace));
                    }
                }
                ScopeKind::UserFunction => {
                    definitions.extend(
                        scope
                            .parameter_definitions()
                            .into_iter()
                            .map(Definition::Parameter),
                    );
                }
                ScopeKind::NestedOuterScope | ScopeKind::LinkedTemplate => {}
            }
            definitions.extend(
                scope
                    .resource_definitions()
                    .into_iter()
                    .map(Definition::Resource),
            );
        }
        definitions
    }
}

impl UserFunctionDefinition {
    /// The function body's scope, created on first request and memoized.
    /// It sees only the function's own declared parameters: no enclosing
    /// parameters, no variables, no namespaces.
    pub fn scope(self: &Arc<Self>, parent: &Arc<TemplateScope>) -> Arc<TemplateScope> {
        self.scope_cell
            .get_or_init(|| {
                TemplateScope::child(
                    ScopeKind::UserFunction,
                    parent,
                    self.object.clone(),
                    Some(self.parameters.clone()),
                )
            })
            .clone()
    }
}

impl std::fmt::Debug for TemplateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateScope")
            .field("kind", &self.kind)
            .field("document", &self.document.uri().as_str())
            .field("has_root_object", &self.root_object.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Symbol table computation
// ---------------------------------------------------------------------------

/// Strip one layer of surrounding single or double quotes.
fn strip_quotes(name: &str) -> &str {
    for quote in ['\'', '"'] {
        if name.len() >= 2 && name.starts_with(quote) && name.ends_with(quote) {
            return &name[1..name.len() - 1];
        }
    }
    name
}

fn property_full_span(property: &Property) -> Span {
    property
        .name
        .span
        .union(property.value.as_ref().map(|v| v.span()))
}

fn compute_parameters(root: Option<&ObjectValue>) -> Vec<Arc<ParameterDefinition>> {
    let Some(parameters) = root
        .and_then(|o| o.property_value("parameters"))
        .and_then(|v| v.as_object())
    else {
        return Vec::new();
    };
    parameters
        .properties
        .iter()
        .map(|property| {
            let body = property.value.as_ref().and_then(|v| v.as_object());
            Arc::new(ParameterDefinition {
                name: property.name.clone(),
                full_span: property_full_span(property),
                declared_type: body
                    .and_then(|o| o.string_property("type"))
                    .map(|s| s.unquoted.clone()),
                default_value: body
                    .and_then(|o| o.property_value("defaultValue"))
                    .cloned(),
            })
        })
        .collect()
}

fn compute_variables(root: Option<&ObjectValue>) -> Vec<Arc<VariableDefinition>> {
    let Some(variables) = root
        .and_then(|o| o.property_value("variables"))
        .and_then(|v| v.as_object())
    else {
        return Vec::new();
    };

    let mut definitions = Vec::new();
    for property in &variables.properties {
        let is_copy_block = property.name.unquoted.eq_ignore_ascii_case("copy")
            && property
                .value
                .as_ref()
                .map(|v| v.as_array().is_some())
                .unwrap_or(false);
        if is_copy_block {
            // Each element of the copy array is its own variable; the
            // literal "copy" key is not one.
            let copy_array = property
                .value
                .as_ref()
                .and_then(|v| v.as_array())
                .expect("checked above");
            for element in &copy_array.elements {
                let Some(element_object) = element.as_object() else {
                    continue;
                };
                let Some(name) = element_object.string_property("name") else {
                    log::warn!(
                        "copy block element at offset {} has no name",
                        element.span().start_index()
                    );
                    continue;
                };
                definitions.push(Arc::new(VariableDefinition {
                    name: name.clone(),
                    full_span: element.span(),
                    value: element_object.property_value("input").cloned(),
                    from_copy_block: true,
                }));
            }
        } else {
            definitions.push(Arc::new(VariableDefinition {
                name: property.name.clone(),
                full_span: property_full_span(property),
                value: property.value.clone(),
                from_copy_block: false,
            }));
        }
    }
    definitions
}

fn compute_namespaces(root: Option<&ObjectValue>) -> Vec<Arc<NamespaceDefinition>> {
    let Some(namespaces) = root
        .and_then(|o| o.property_value("functions"))
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };

    let mut definitions = Vec::new();
    for element in &namespaces.elements {
        let Some(namespace_object) = element.as_object() else {
            continue;
        };
        let Some(name) = namespace_object.string_property("namespace") else {
            log::warn!(
                "functions entry at offset {} has no namespace name",
                element.span().start_index()
            );
            continue;
        };
        let members = namespace_object
            .property_value("members")
            .and_then(|v| v.as_object())
            .map(|members_object| {
                members_object
                    .properties
                    .iter()
                    .map(|member| compute_user_function(&name.unquoted, member))
                    .collect()
            })
            .unwrap_or_default();
        definitions.push(Arc::new(NamespaceDefinition {
            name: name.clone(),
            full_span: element.span(),
            members,
        }));
    }
    definitions
}

/// A user function's parameters are declared as an array of
/// `{ "name": …, "type": … }` objects, unlike top-level parameters where
/// the name is the property key.
fn compute_user_function(
    namespace_name: &str,
    member: &Property,
) -> Arc<UserFunctionDefinition> {
    let body = member.value.as_ref().and_then(|v| v.as_object());
    let parameters = body
        .and_then(|o| o.property_value("parameters"))
        .and_then(|v| v.as_array())
        .map(|array| {
            array
                .elements
                .iter()
                .filter_map(|element| {
                    let parameter = element.as_object()?;
                    let name = parameter.string_property("name")?;
                    Some(Arc::new(ParameterDefinition {
                        name: name.clone(),
                        full_span: element.span(),
                        declared_type: parameter
                            .string_property("type")
                            .map(|s| s.unquoted.clone()),
                        default_value: None,
                    }))
                })
                .collect()
        })
        .unwrap_or_default();
    Arc::new(UserFunctionDefinition {
        namespace_name: namespace_name.to_string(),
        name: member.name.clone(),
        full_span: property_full_span(member),
        parameters,
        object: member.value.clone(),
        scope_cell: CachedValue::new(),
    })
}

fn compute_resources(root: Option<&ObjectValue>) -> Vec<Arc<ResourceDefinition>> {
    let Some(resources) = root
        .and_then(|o| o.property_value("resources"))
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };
    resources
        .elements
        .iter()
        .filter_map(|element| {
            let resource = element.as_object()?;
            Some(Arc::new(ResourceDefinition {
                name: resource.string_property("name").cloned(),
                type_name: resource.string_property("type").cloned(),
                full_span: element.span(),
            }))
        })
        .collect()
}
