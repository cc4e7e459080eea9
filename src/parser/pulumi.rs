//! Pulumi YAML program parser.

use crate::config::Config;
use crate::graph::{RefTarget, Reference};
use crate::parser::cloudformation::{load_yaml, yaml_to_value};
use crate::parser::{key_offset, line_column_at, tags_from_value, Parser};
use crate::types::{node_id, AttrValue, Attributes, Diagnostic, Dialect, EdgeHint, ParsedDocument, ResourceNode};

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// `${name.property}` interpolation.
static PROPERTY_ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_-]+)\.[^}]+\}").expect("Invalid regex"));

/// `${name}` used as a whole value, as in `options.dependsOn`.
static WHOLE_RESOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{([A-Za-z0-9_-]+)\}$").expect("Invalid regex"));

/// Built-in variable namespace, never a resource.
const BUILTIN_ROOT: &str = "pulumi";

/// Parser for Pulumi YAML programs.
pub struct PulumiYamlParser {
    skip_type_prefixes: Vec<String>,
}

impl PulumiYamlParser {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            skip_type_prefixes: config.graph.skip_type_prefixes.clone(),
        }
    }
}

impl Parser for PulumiYamlParser {
    fn dialect(&self) -> Dialect {
        Dialect::PulumiYaml
    }

    fn parse_content(&self, content: &str, file_path: &Path) -> crate::Result<ParsedDocument> {
        let mut doc = ParsedDocument::new(file_path, Dialect::PulumiYaml);

        let (root, error) = load_yaml(content, file_path, Dialect::PulumiYaml)?;
        if let Some(error) = error {
            tracing::warn!(file = %file_path.display(), error = %error, "Program is truncated, reading the valid prefix");
            doc.diagnostics.push(Diagnostic::from_error(&error, file_path, Dialect::PulumiYaml));
        }
        let root = mark_expressions(yaml_to_value(root));

        let Some(resources) = root.as_map().and_then(|r| r.get("resources")).and_then(AttrValue::as_map) else {
            tracing::debug!(file = %file_path.display(), "Program has no resources section");
            return Ok(doc);
        };

        let mut types: HashMap<&str, &str> = HashMap::new();
        let mut declared = Vec::new();
        for (name, body) in resources {
            let Some(resource_type) = body.as_map().and_then(|b| b.get("type")).and_then(AttrValue::as_str) else {
                tracing::warn!(file = %file_path.display(), resource = %name, "Resource has no type, skipping");
                let offset = key_offset(content, name);
                let position = offset.and_then(|o| line_column_at(content, o));
                doc.diagnostics.push(Diagnostic::ParseError {
                    file: file_path.to_path_buf(),
                    dialect: Dialect::PulumiYaml,
                    message: format!("{name}: resource must be a mapping with a string type"),
                    offset,
                    line: position.map(|(l, _)| l),
                    column: position.map(|(_, c)| c),
                });
                continue;
            };
            if self.skip_type_prefixes.iter().any(|p| resource_type.starts_with(p.as_str())) {
                continue;
            }
            types.insert(name.as_str(), resource_type);
            declared.push((name, resource_type, body));
        }

        for (name, resource_type, body) in declared {
            let properties = body
                .as_map()
                .and_then(|b| b.get("properties"))
                .and_then(AttrValue::as_map)
                .cloned()
                .unwrap_or_default();
            let tags = tags_from_value(properties.get("tags"));
            let node = ResourceNode::new(Dialect::PulumiYaml, resource_type, name.as_str(), properties, tags, file_path);

            for dependency in option_dependencies(body) {
                match types.get(dependency) {
                    Some(dep_type) => doc.hints.push(EdgeHint::explicit(
                        node_id(Dialect::PulumiYaml, dep_type, dependency),
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

/// Resource names named by `options.dependsOn` and `options.parent`.
fn option_dependencies(body: &AttrValue) -> Vec<&str> {
    let Some(options) = body.as_map().and_then(|b| b.get("options")).and_then(AttrValue::as_map) else {
        return Vec::new();
    };

    let mut values: Vec<&AttrValue> = match options.get("dependsOn") {
        Some(AttrValue::List(items)) => items.iter().collect(),
        Some(single) => vec![single],
        None => Vec::new(),
    };
    values.extend(options.get("parent"));

    let mut names = Vec::new();
    for name in values.into_iter().filter_map(resource_name) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// `gateway` from `${gateway}` or a bare `gateway`.
fn resource_name(value: &AttrValue) -> Option<&str> {
    let text = value.as_text()?.trim();
    let name = WHOLE_RESOURCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());
    (!name.is_empty()).then_some(name)
}

/// Resource names used through `${name.property}` interpolations.
pub(crate) fn references(attributes: &Attributes, out: &mut Vec<Reference>) {
    for (key, value) in attributes {
        value.visit_leaves(key, &mut |_, leaf| {
            let AttrValue::Expression { expression } = leaf else {
                return;
            };
            for caps in PROPERTY_ACCESS.captures_iter(expression) {
                let name = &caps[1];
                if name == BUILTIN_ROOT {
                    continue;
                }
                out.push(Reference {
                    text: name.to_string(),
                    target: RefTarget::Logical(name.to_string()),
                });
            }
        });
    }
}

/// Turn interpolated strings into expression markers.
fn mark_expressions(value: AttrValue) -> AttrValue {
    match value {
        AttrValue::String(s) if s.contains("${") => AttrValue::expression(s),
        AttrValue::List(items) => AttrValue::List(items.into_iter().map(mark_expressions).collect()),
        AttrValue::Map(map) => AttrValue::Map(map.into_iter().map(|(k, v)| (k, mark_expressions(v))).collect()),
        other => other,
    }
}
