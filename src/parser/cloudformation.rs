//! CloudFormation template parser (YAML and JSON).
//!
//! Short-form intrinsic tags (`!Ref`, `!GetAtt`, `!Sub`, ...) are expanded to
//! their long form (`{"Ref": ..}`, `{"Fn::GetAtt": ..}`) so that reference
//! extraction only has to understand one shape.

use crate::config::Config;
use crate::error::IacMapError;
use crate::graph::{RefTarget, Reference};
use crate::parser::{key_offset, line_column_at, offset_of, parse_error, tags_from_value, Parser};
use crate::types::{node_id, AttrValue, Attributes, Diagnostic, Dialect, EdgeHint, ParsedDocument, ResourceNode};

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;

/// How many lines before a YAML error a truncated document is cut back to.
const MAX_RECOVERY_LINES: usize = 64;

/// `${Name}` or `${Name.Attribute}` inside a `Fn::Sub` template.
static SUB_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9]+)(?:\.[A-Za-z0-9.]+)?\}").expect("Invalid regex"));

/// Parser for CloudFormation templates.
pub struct CloudFormationParser;

impl CloudFormationParser {
    #[must_use]
    pub fn new(_config: &Config) -> Self {
        Self
    }

    /// The template root, plus the error of the full text when only a prefix was readable.
    fn load(content: &str, file_path: &Path) -> crate::Result<(AttrValue, Option<IacMapError>)> {
        let is_json = file_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
            || content.trim_start().starts_with('{');

        if is_json {
            let value: serde_json::Value = serde_json::from_str(content).map_err(|e| {
                let position = (e.line(), e.column());
                parse_error(
                    file_path,
                    Dialect::CloudFormation,
                    e.to_string(),
                    offset_of(content, position.0, position.1),
                    Some(position),
                )
            })?;
            Ok((json_to_value(value), None))
        } else {
            let (value, error) = load_yaml(content, file_path, Dialect::CloudFormation)?;
            Ok((yaml_to_value(value), error))
        }
    }
}

impl Parser for CloudFormationParser {
    fn dialect(&self) -> Dialect {
        Dialect::CloudFormation
    }

    fn parse_content(&self, content: &str, file_path: &Path) -> crate::Result<ParsedDocument> {
        let mut doc = ParsedDocument::new(file_path, Dialect::CloudFormation);
        let (root, error) = Self::load(content, file_path)?;
        if let Some(error) = error {
            tracing::warn!(file = %file_path.display(), error = %error, "Template is truncated, reading the valid prefix");
            doc.diagnostics.push(Diagnostic::from_error(&error, file_path, Dialect::CloudFormation));
        }

        let Some(resources) = root.as_map().and_then(|r| r.get("Resources")).and_then(AttrValue::as_map) else {
            tracing::debug!(file = %file_path.display(), "Template has no Resources section");
            return Ok(doc);
        };

        let mut types: HashMap<&str, &str> = HashMap::new();
        let mut declared = Vec::new();

        for (logical_id, body) in resources {
            let resource_type = body
                .as_map()
                .and_then(|b| b.get("Type"))
                .and_then(AttrValue::as_str);
            let Some(resource_type) = resource_type else {
                tracing::warn!(
                    file = %file_path.display(),
                    resource = %logical_id,
                    "Resource has no Type, skipping"
                );
                doc.diagnostics.push(malformed(
                    content,
                    file_path,
                    logical_id,
                    "resource must be a mapping with a string Type",
                ));
                continue;
            };
            types.insert(logical_id.as_str(), resource_type);
            declared.push((logical_id, resource_type, body));
        }

        for (logical_id, resource_type, body) in declared {
            let properties = body
                .as_map()
                .and_then(|b| b.get("Properties"))
                .and_then(AttrValue::as_map)
                .cloned()
                .unwrap_or_default();
            let tags = tags_from_value(properties.get("Tags"));
            let node = ResourceNode::new(
                Dialect::CloudFormation,
                resource_type,
                logical_id.as_str(),
                properties,
                tags,
                file_path,
            );

            for dependency in depends_on(body) {
                match types.get(dependency) {
                    Some(dep_type) => doc.hints.push(EdgeHint::explicit(
                        node_id(Dialect::CloudFormation, dep_type, dependency),
                        node.id.clone(),
                    )),
                    None => doc.diagnostics.push(Diagnostic::UnresolvedReference {
                        node: node.id.clone(),
                        reference: dependency.to_string(),
                        candidates: Vec::new(),
                    }),
                }
            }

            doc.nodes.push(node);
        }

        Ok(doc)
    }
}

/// `DependsOn` entries of a resource body, as a string or a list of strings.
fn depends_on(body: &AttrValue) -> Vec<&str> {
    match body.as_map().and_then(|b| b.get("DependsOn")) {
        Some(AttrValue::String(s)) => vec![s.as_str()],
        Some(AttrValue::List(items)) => items.iter().filter_map(AttrValue::as_str).collect(),
        _ => Vec::new(),
    }
}

fn malformed(content: &str, file_path: &Path, logical_id: &str, reason: &str) -> Diagnostic {
    let offset = key_offset(content, logical_id);
    let position = offset.and_then(|o| line_column_at(content, o));
    Diagnostic::ParseError {
        file: file_path.to_path_buf(),
        dialect: Dialect::CloudFormation,
        message: format!("{logical_id}: {reason}"),
        offset,
        line: position.map(|(l, _)| l),
        column: position.map(|(_, c)| c),
    }
}

/// Logical-name references made through `Ref`, `Fn::GetAtt` and `Fn::Sub`.
///
/// Pseudo parameters (`AWS::Region`, ...) are not references to resources.
pub(crate) fn references(attributes: &Attributes, out: &mut Vec<Reference>) {
    for value in attributes.values() {
        collect(value, out);
    }
}

fn collect(value: &AttrValue, out: &mut Vec<Reference>) {
    match value {
        AttrValue::Map(map) if map.len() == 1 => {
            let Some((key, inner)) = map.first() else {
                return;
            };
            match (key.as_str(), inner) {
                ("Ref", AttrValue::String(name)) => push_logical(name, out),
                ("Fn::GetAtt", AttrValue::List(items)) => {
                    if let Some(name) = items.first().and_then(AttrValue::as_str) {
                        push_logical(name, out);
                    }
                }
                ("Fn::GetAtt", AttrValue::String(dotted)) => {
                    push_logical(dotted.split('.').next().unwrap_or(dotted), out);
                }
                ("Fn::Sub", AttrValue::String(template)) => sub_references(template, &BTreeSet::new(), out),
                ("Fn::Sub", AttrValue::List(items)) => {
                    let locals: BTreeSet<&str> = items
                        .get(1)
                        .and_then(AttrValue::as_map)
                        .map(|vars| vars.keys().map(String::as_str).collect())
                        .unwrap_or_default();
                    if let Some(template) = items.first().and_then(AttrValue::as_str) {
                        sub_references(template, &locals, out);
                    }
                    for item in items.iter().skip(1) {
                        collect(item, out);
                    }
                }
                _ => collect(inner, out),
            }
        }
        AttrValue::Map(map) => map.values().for_each(|v| collect(v, out)),
        AttrValue::List(items) => items.iter().for_each(|v| collect(v, out)),
        _ => {}
    }
}

fn sub_references(template: &str, locals: &BTreeSet<&str>, out: &mut Vec<Reference>) {
    for caps in SUB_VARIABLE.captures_iter(template) {
        let name = &caps[1];
        if !locals.contains(name) {
            push_logical(name, out);
        }
    }
}

fn push_logical(name: &str, out: &mut Vec<Reference>) {
    if name.starts_with("AWS::") || name.is_empty() {
        return;
    }
    out.push(Reference {
        text: name.to_string(),
        target: RefTarget::Logical(name.to_string()),
    });
}

fn yaml_error(e: &serde_yaml::Error, file_path: &Path, dialect: Dialect) -> IacMapError {
    let location = e.location();
    parse_error(
        file_path,
        dialect,
        e.to_string(),
        location.as_ref().map(serde_yaml::Location::index),
        location.map(|l| (l.line(), l.column())),
    )
}

/// Parse a YAML document, falling back to the longest readable prefix of whole lines.
///
/// A document cut off mid-structure still yields the entries before the
/// cut; the error of the full text is returned next to the value.
///
/// # Errors
///
/// Returns a `Parse` error when no prefix before the failing line parses.
pub(super) fn load_yaml(
    content: &str,
    file_path: &Path,
    dialect: Dialect,
) -> crate::Result<(serde_yaml::Value, Option<IacMapError>)> {
    let error = match serde_yaml::from_str(content) {
        Ok(value) => return Ok((value, None)),
        Err(e) => e,
    };

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let failing_line = error
        .location()
        .map_or(line_starts.len(), |l| l.line())
        .min(line_starts.len());
    for line in (2..=failing_line).rev().take(MAX_RECOVERY_LINES) {
        let prefix = &content[..line_starts[line - 1]];
        if let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(prefix) {
            tracing::debug!(file = %file_path.display(), lines = line - 1, "Recovered YAML prefix");
            return Ok((value, Some(yaml_error(&error, file_path, dialect))));
        }
    }
    Err(yaml_error(&error, file_path, dialect))
}

/// Convert a YAML value, expanding intrinsic function tags.
pub(super) fn yaml_to_value(value: serde_yaml::Value) -> AttrValue {
    use serde_yaml::Value;

    match value {
        Value::Null => AttrValue::Null,
        Value::Bool(b) => AttrValue::Bool(b),
        Value::Number(n) => n
            .as_f64()
            .map_or_else(|| AttrValue::String(n.to_string()), AttrValue::Number),
        Value::String(s) => AttrValue::String(s),
        Value::Sequence(items) => AttrValue::List(items.into_iter().map(yaml_to_value).collect()),
        Value::Mapping(mapping) => AttrValue::Map(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(&k), yaml_to_value(v)))
                .collect(),
        ),
        Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let key = match name {
                "Ref" | "Condition" => name.to_string(),
                other => format!("Fn::{other}"),
            };
            let mut map = Attributes::new();
            map.insert(key, yaml_to_value(tagged.value));
            AttrValue::Map(map)
        }
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn json_to_value(value: serde_json::Value) -> AttrValue {
    use serde_json::Value;

    match value {
        Value::Null => AttrValue::Null,
        Value::Bool(b) => AttrValue::Bool(b),
        Value::Number(n) => n
            .as_f64()
            .map_or_else(|| AttrValue::String(n.to_string()), AttrValue::Number),
        Value::String(s) => AttrValue::String(s),
        Value::Array(items) => AttrValue::List(items.into_iter().map(json_to_value).collect()),
        Value::Object(map) => AttrValue::Map(map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect()),
    }
}
