//
// definitions.rs
//
// The named entities a template can declare: parameters, variables,
// resources, user-defined functions, function namespaces, parameter-file
// values, plus the built-in function table entries. One closed tagged
// union per the fixed variant set, dispatched by pattern match.
//

use std::sync::Arc;

use serde::Serialize;

use crate::builtins::BuiltinFunction;
use crate::cache::CachedValue;
use crate::json::{StringValue, Value};
use crate::scope::TemplateScope;
use crate::span::Span;

/// The kind tag shared by definitions and reference lists. Merging
/// reference lists of different kinds is a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DefinitionKind {
    Parameter,
    Variable,
    Resource,
    UserFunction,
    Namespace,
    BuiltinFunction,
    ParameterValue,
}

/// Identity of one definition object. Pointer-based, so two definitions
/// with the same spelling in different scopes never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefinitionId(usize);

/// Human-readable summary of a definition, for hover-style consumers.
#[derive(Debug, Clone, Serialize)]
pub struct UsageInfo {
    pub usage: String,
    pub category: &'static str,
    pub description: Option<String>,
}

/// A `"parameters"` entry (or a user-function parameter).
#[derive(Debug)]
pub struct ParameterDefinition {
    /// The JSON string token naming the parameter, quoting preserved.
    pub name: StringValue,
    pub full_span: Span,
    pub declared_type: Option<String>,
    pub default_value: Option<Arc<Value>>,
}

/// A `"variables"` entry, or one synthetic copy-block member.
#[derive(Debug)]
pub struct VariableDefinition {
    pub name: StringValue,
    pub full_span: Span,
    pub value: Option<Arc<Value>>,
    /// True when this definition was expanded from an element of a
    /// `"copy"` array rather than declared directly.
    pub from_copy_block: bool,
}

/// An element of a scope's `"resources"` array.
#[derive(Debug)]
pub struct ResourceDefinition {
    pub name: Option<StringValue>,
    pub type_name: Option<StringValue>,
    pub full_span: Span,
}

/// One member of a function namespace. The member's scope is created
/// lazily the first time it is requested and exposes only the member's
/// own declared parameters.
#[derive(Debug)]
pub struct UserFunctionDefinition {
    pub namespace_name: String,
    pub name: StringValue,
    pub full_span: Span,
    pub parameters: Vec<Arc<ParameterDefinition>>,
    /// The member's defining JSON object, when present.
    pub object: Option<Arc<Value>>,
    pub(crate) scope_cell: CachedValue<Arc<TemplateScope>>,
}

/// An element of the top-level `"functions"` array.
#[derive(Debug)]
pub struct NamespaceDefinition {
    pub name: StringValue,
    pub full_span: Span,
    pub members: Vec<Arc<UserFunctionDefinition>>,
}

impl NamespaceDefinition {
    /// Case-insensitive member lookup; first structural match wins.
    pub fn member(&self, name: &str) -> Option<&Arc<UserFunctionDefinition>> {
        self.members
            .iter()
            .find(|m| m.name.unquoted.eq_ignore_ascii_case(name))
    }
}

/// A `"parameters"` entry of a companion parameter-value document.
#[derive(Debug)]
pub struct ParameterValueDefinition {
    pub name: StringValue,
    pub full_span: Span,
    pub value: Option<Arc<Value>>,
}

/// Any definition, by kind.
#[derive(Debug, Clone)]
pub enum Definition {
    Parameter(Arc<ParameterDefinition>),
    Variable(Arc<VariableDefinition>),
    Resource(Arc<ResourceDefinition>),
    UserFunction(Arc<UserFunctionDefinition>),
    Namespace(Arc<NamespaceDefinition>),
    Builtin(&'static BuiltinFunction),
    ParameterValue(Arc<ParameterValueDefinition>),
}

impl Definition {
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Definition::Parameter(_) => DefinitionKind::Parameter,
            Definition::Variable(_) => DefinitionKind::Variable,
            Definition::Resource(_) => DefinitionKind::Resource,
            Definition::UserFunction(_) => DefinitionKind::UserFunction,
            Definition::Namespace(_) => DefinitionKind::Namespace,
            Definition::Builtin(_) => DefinitionKind::BuiltinFunction,
            Definition::ParameterValue(_) => DefinitionKind::ParameterValue,
        }
    }

    /// Object identity, for keying reference maps.
    pub fn id(&self) -> DefinitionId {
        let address = match self {
            Definition::Parameter(d) => Arc::as_ptr(d) as usize,
            Definition::Variable(d) => Arc::as_ptr(d) as usize,
            Definition::Resource(d) => Arc::as_ptr(d) as usize,
            Definition::UserFunction(d) => Arc::as_ptr(d) as usize,
            Definition::Namespace(d) => Arc::as_ptr(d) as usize,
            Definition::Builtin(d) => *d as *const BuiltinFunction as usize,
            Definition::ParameterValue(d) => Arc::as_ptr(d) as usize,
        };
        DefinitionId(address)
    }

    pub fn name(&self) -> &str {
        match self {
            Definition::Parameter(d) => &d.name.unquoted,
            Definition::Variable(d) => &d.name.unquoted,
            Definition::Resource(d) => d.name.as_ref().map(|n| n.unquoted.as_str()).unwrap_or(""),
            Definition::UserFunction(d) => &d.name.unquoted,
            Definition::Namespace(d) => &d.name.unquoted,
            Definition::Builtin(d) => d.name,
            Definition::ParameterValue(d) => &d.name.unquoted,
        }
    }

    /// The span of the naming token (unquoted), where "go to definition"
    /// lands. Built-in functions live in no document.
    pub fn name_span(&self) -> Option<Span> {
        match self {
            Definition::Parameter(d) => Some(d.name.unquoted_span()),
            Definition::Variable(d) => Some(d.name.unquoted_span()),
            Definition::Resource(d) => d.name.as_ref().map(StringValue::unquoted_span),
            Definition::UserFunction(d) => Some(d.name.unquoted_span()),
            Definition::Namespace(d) => Some(d.name.unquoted_span()),
            Definition::Builtin(_) => None,
            Definition::ParameterValue(d) => Some(d.name.unquoted_span()),
        }
    }

    pub fn full_span(&self) -> Option<Span> {
        match self {
            Definition::Parameter(d) => Some(d.full_span),
            Definition::Variable(d) => Some(d.full_span),
            Definition::Resource(d) => Some(d.full_span),
            Definition::UserFunction(d) => Some(d.full_span),
            Definition::Namespace(d) => Some(d.full_span),
            Definition::Builtin(_) => None,
            Definition::ParameterValue(d) => Some(d.full_span),
        }
    }

    pub fn usage_info(&self) -> UsageInfo {
        match self {
            Definition::Parameter(d) => UsageInfo {
                usage: match &d.declared_type {
                    Some(t) => format!("{} ({t})", d.name.unquoted),
                    None => d.name.unquoted.clone(),
                },
                category: "parameter",
                description: None,
            },
            Definition::Variable(d) => UsageInfo {
                usage: d.name.unquoted.clone(),
                category: "variable",
                description: d
                    .from_copy_block
                    .then(|| "Expanded from a copy block".to_string()),
            },
            Definition::Resource(d) => UsageInfo {
                usage: self.name().to_string(),
                category: "resource",
                description: d.type_name.as_ref().map(|t| t.unquoted.clone()),
            },
            Definition::UserFunction(d) => UsageInfo {
                usage: format!(
                    "{}.{}({})",
                    d.namespace_name,
                    d.name.unquoted,
                    d.parameters
                        .iter()
                        .map(|p| p.name.unquoted.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                category: "function",
                description: None,
            },
            Definition::Namespace(d) => UsageInfo {
                usage: d.name.unquoted.clone(),
                category: "namespace",
                description: None,
            },
            Definition::Builtin(d) => UsageInfo {
                usage: d.name.to_string(),
                category: "built-in function",
                description: Some(d.description.to_string()),
            },
            Definition::ParameterValue(d) => UsageInfo {
                usage: d.name.unquoted.clone(),
                category: "parameter value",
                description: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_value(text: &str, start: usize) -> StringValue {
        let quoted = format!("\"{text}\"");
        StringValue::from_token(Span::new(start, quoted.len()), &format!("{}{quoted}", " ".repeat(start)))
    }

    fn parameter(name: &str) -> Arc<ParameterDefinition> {
        Arc::new(ParameterDefinition {
            name: string_value(name, 0),
            full_span: Span::new(0, name.len() + 2),
            declared_type: Some("string".to_string()),
            default_value: None,
        })
    }

    #[test]
    fn test_identity_distinguishes_equal_spellings() {
        let a = Definition::Parameter(parameter("p"));
        let b = Definition::Parameter(parameter("p"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn test_usage_info_shapes() {
        let p = Definition::Parameter(parameter("storageName"));
        let info = p.usage_info();
        assert_eq!(info.usage, "storageName (string)");
        assert_eq!(info.category, "parameter");

        let b = Definition::Builtin(crate::builtins::lookup("concat").unwrap());
        let info = b.usage_info();
        assert_eq!(info.usage, "concat");
        assert!(info.description.is_some());
        assert!(b.name_span().is_none());
    }

    #[test]
    fn test_namespace_member_lookup() {
        let member = Arc::new(UserFunctionDefinition {
            namespace_name: "contoso".to_string(),
            name: string_value("uniqueName", 0),
            full_span: Span::new(0, 12),
            parameters: vec![parameter("prefix")],
            object: None,
            scope_cell: CachedValue::new(),
        });
        let namespace = NamespaceDefinition {
            name: string_value("contoso", 0),
            full_span: Span::new(0, 9),
            members: vec![member],
        };
        assert!(namespace.member("UNIQUENAME").is_some());
        assert!(namespace.member("missing").is_none());

        let d = Definition::UserFunction(namespace.member("uniqueName").unwrap().clone());
        assert_eq!(d.usage_info().usage, "contoso.uniqueName(prefix)");
    }
}
