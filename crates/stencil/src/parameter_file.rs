//
// parameter_file.rs
//
// Companion parameter-value documents: the file supplying concrete
// values for a template's parameters. Its entries are definitions in
// their own right (ParameterValue kind) and, when a template is
// associated, cross-document references back to the template's
// parameter definitions.
//

use std::sync::Arc;

use crate::cache::CachedValue;
use crate::definitions::ParameterValueDefinition;
use crate::document::ParseResult;
use crate::span::{ContainsBehavior, Span};

pub struct ParameterFile {
    document: Arc<ParseResult>,
    parameter_values: CachedValue<Vec<Arc<ParameterValueDefinition>>>,
}

impl ParameterFile {
    pub fn new(document: &Arc<ParseResult>) -> Self {
        Self {
            document: document.clone(),
            parameter_values: CachedValue::new(),
        }
    }

    pub fn document(&self) -> &Arc<ParseResult> {
        &self.document
    }

    /// The file's parameter-value entries, in declaration order.
    /// Computed once; a malformed file yields an empty list.
    pub fn parameter_values(&self) -> Vec<Arc<ParameterValueDefinition>> {
        self.parameter_values
            .get_or_init(|| {
                let Some(parameters) = self
                    .document
                    .root_value()
                    .and_then(|v| v.as_object())
                    .and_then(|o| o.property_value("parameters"))
                    .and_then(|v| v.as_object())
                else {
                    return Vec::new();
                };
                parameters
                    .properties
                    .iter()
                    .map(|property| {
                        let full_span = property
                            .name
                            .span
                            .union(property.value.as_ref().map(|v| v.span()));
                        Arc::new(ParameterValueDefinition {
                            name: property.name.clone(),
                            full_span,
                            value: property
                                .value
                                .as_ref()
                                .and_then(|v| v.as_object())
                                .and_then(|o| o.property_value("value"))
                                .cloned(),
                        })
                    })
                    .collect()
            })
            .clone()
    }

    /// Case-insensitive lookup of one entry; last declaration wins, for
    /// consistency with template symbol resolution.
    pub fn parameter_value(&self, name: &str) -> Option<Arc<ParameterValueDefinition>> {
        self.parameter_values()
            .into_iter()
            .rev()
            .find(|v| v.name.unquoted.eq_ignore_ascii_case(name))
    }

    /// The entry whose naming span contains `offset`, if any.
    pub fn parameter_value_at(&self, offset: usize) -> Option<Arc<ParameterValueDefinition>> {
        self.parameter_values()
            .into_iter()
            .find(|v| v.name.unquoted_span().contains(offset, ContainsBehavior::Extended))
    }

    /// The span of the whole `"parameters"` object value, when present.
    pub fn parameters_object_span(&self) -> Option<Span> {
        self.document
            .root_value()
            .and_then(|v| v.as_object())
            .and_then(|o| o.property_value("parameters"))
            .map(|v| v.span())
    }
}

impl std::fmt::Debug for ParameterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterFile")
            .field("document", &self.document.uri().as_str())
            .finish()
    }
}
