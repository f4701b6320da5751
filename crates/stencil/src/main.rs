//
// main.rs
//

use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use url::Url;

use stencil::definitions::Definition;
use stencil::document::ParseResult;
use stencil::parameter_file::ParameterFile;
use stencil::position_context::PositionContext;
use stencil::references::{self, ReferenceMap};
use stencil::scope::TemplateScope;
use stencil::span::LineColPosition;

fn print_usage() {
    println!(
        "stencil {}, a static analyzer for nested deployment templates.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: stencil [OPTIONS] <TEMPLATE>

Analyzes a deployment template and prints its symbol table and
cross-references as JSON.

Available options:

--parameters <FILE>          Associate a parameter file with the template
--position <LINE:COL>        Report what the given position touches
--version                    Print the version
--help                       Print this help message

"#
    );
}

fn file_url(path: &str) -> anyhow::Result<Url> {
    let absolute = fs::canonicalize(Path::new(path))
        .with_context(|| format!("cannot resolve path '{path}'"))?;
    Url::from_file_path(&absolute)
        .map_err(|_| anyhow::anyhow!("cannot express '{}' as a file URL", absolute.display()))
}

fn parse_position(text: &str) -> anyhow::Result<LineColPosition> {
    let (line, column) = text
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("position must be LINE:COL, got '{text}'"))?;
    Ok(LineColPosition::new(
        line.parse().with_context(|| format!("bad line in '{text}'"))?,
        column.parse().with_context(|| format!("bad column in '{text}'"))?,
    ))
}

fn load(path: &str) -> anyhow::Result<std::sync::Arc<ParseResult>> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read '{path}'"))?;
    Ok(ParseResult::parse(file_url(path)?, &text))
}

fn position_json(document: &ParseResult, span: stencil::span::Span) -> serde_json::Value {
    let position = document.position_at(span.start_index());
    serde_json::json!({
        "line": position.line,
        "column": position.column,
        "start": span.start_index(),
        "length": span.length(),
    })
}

fn definition_json(
    definition: &Definition,
    document: &ParseResult,
    map: &ReferenceMap,
) -> serde_json::Value {
    let info = definition.usage_info();
    let references: Vec<serde_json::Value> = map
        .get(definition.id())
        .map(|entry| {
            entry
                .list
                .spans()
                .iter()
                .map(|document_span| {
                    serde_json::json!({
                        "uri": document_span.uri.as_str(),
                        "start": document_span.span.start_index(),
                        "length": document_span.span.length(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    serde_json::json!({
        "name": definition.name(),
        "kind": definition.kind(),
        "usage": info.usage,
        "category": info.category,
        "description": info.description,
        "nameSpan": definition.name_span().map(|s| position_json(document, s)),
        "references": references,
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut template_path: Option<String> = None;
    let mut parameters_path: Option<String> = None;
    let mut position: Option<LineColPosition> = None;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--parameters" => {
                parameters_path = Some(
                    argv.next()
                        .ok_or_else(|| anyhow::anyhow!("--parameters requires a file path"))?,
                );
            }
            "--position" => {
                let value = argv
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--position requires LINE:COL"))?;
                position = Some(parse_position(&value)?);
            }
            "--version" => {
                println!("stencil {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            other if other.starts_with('-') => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
            other => {
                if template_path.replace(other.to_string()).is_some() {
                    return Err(anyhow::anyhow!("more than one template given"));
                }
            }
        }
    }

    let Some(template_path) = template_path else {
        print_usage();
        return Ok(());
    };

    let document = load(&template_path)?;
    let scope = TemplateScope::top_level(&document);
    let parameter_file = parameters_path
        .as_deref()
        .map(|path| anyhow::Ok(ParameterFile::new(&load(path)?)))
        .transpose()?;

    let mut map = ReferenceMap::new();
    references::index_template(&scope, &mut map);
    if let Some(file) = &parameter_file {
        references::index_parameter_file(file, &scope, &mut map);
    }

    let definitions: Vec<serde_json::Value> = scope
        .all_definitions()
        .iter()
        .map(|definition| definition_json(definition, &document, &map))
        .collect();

    let mut report = serde_json::json!({
        "uri": document.uri().as_str(),
        "definitions": definitions,
    });

    if let Some(position) = position {
        let context = PositionContext::from_position(&document, &scope, position, false);
        let at_position = match context.reference_site_info(parameter_file.as_ref()) {
            Some(site) => serde_json::json!({
                "siteKind": format!("{:?}", site.site_kind),
                "definition": definition_json(&site.definition, &document, &map),
                "span": position_json(&document, site.referencing_span),
            }),
            None => serde_json::Value::Null,
        };
        report["atPosition"] = at_position;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
