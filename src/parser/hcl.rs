//! Terraform HCL parser.
//!
//! Uses the `hcl-rs` crate to read `resource` blocks. When a file does not
//! parse as a whole, it is split into top-level blocks which are parsed one
//! by one, so a single broken block only costs that block.
//!
//! `module` blocks are recorded as [`ModuleCall`]s so that local modules can
//! be expanded once every document is parsed.

use crate::config::Config;
use crate::graph::{RefTarget, Reference};
use crate::parser::{line_column_at, line_column_in, offset_of, parse_error, tags_from_value, Parser};
use crate::types::{
    node_id, AttrValue, Attributes, Diagnostic, Dialect, EdgeHint, ModuleCall, ParsedDocument, ResourceNode,
};

use hcl::{Block, Body, Expression};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// First two segments of a traversal such as `aws_vpc.main.id`.
static TRAVERSAL_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_-]*)\.([A-Za-z_][A-Za-z0-9_-]*)").expect("Invalid regex")
});

/// Traversal roots that never name a managed resource.
const NON_RESOURCE_ROOTS: &[&str] = &[
    "var", "local", "module", "data", "each", "count", "self", "path", "terraform",
];

/// Meta-arguments that never produce attribute references.
const META_ARGUMENTS: &[&str] = &["depends_on", "provider", "lifecycle"];

/// HCL parser for Terraform/OpenTofu files.
pub struct HclParser {
    skip_type_prefixes: Vec<String>,
}

impl HclParser {
    /// Create a new HCL parser with the given configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            skip_type_prefixes: config.graph.skip_type_prefixes.clone(),
        }
    }

    fn is_skipped(&self, resource_type: &str) -> bool {
        self.skip_type_prefixes.iter().any(|p| resource_type.starts_with(p.as_str()))
    }

    /// Extract every `resource` and `module` block of a parsed body.
    fn extract(&self, body: Body, file_path: &Path, doc: &mut ParsedDocument) {
        for structure in body.into_inner() {
            let hcl::Structure::Block(block) = structure else {
                continue;
            };
            match block.identifier.as_str() {
                "resource" => self.extract_resource(&block, file_path, doc),
                "module" => extract_module(&block, doc),
                _ => {}
            }
        }
    }

    fn extract_resource(&self, block: &Block, file_path: &Path, doc: &mut ParsedDocument) {
        let labels: Vec<&str> = block.labels.iter().map(|l| l.as_str()).collect();
        let [resource_type, name] = labels.as_slice() else {
            tracing::warn!(
                file = %file_path.display(),
                labels = labels.len(),
                "Resource block must have exactly two labels"
            );
            doc.diagnostics.push(Diagnostic::ParseError {
                file: file_path.to_path_buf(),
                dialect: Dialect::Terraform,
                message: format!("resource block has {} labels, expected 2", labels.len()),
                offset: None,
                line: None,
                column: None,
            });
            return;
        };

        if self.is_skipped(resource_type) {
            tracing::debug!(resource_type, name, "Skipping resource type");
            return;
        }

        let attributes = body_to_attributes(&block.body);
        let tags = tags_from_value(attributes.get("tags"));

        let node = ResourceNode::new(Dialect::Terraform, *resource_type, *name, attributes, tags, file_path);

        if let Some(depends_on) = node.attributes.get("depends_on").and_then(AttrValue::as_list) {
            for dependency in depends_on.iter().filter_map(AttrValue::as_text) {
                for (dep_type, dep_name) in resource_traversals(dependency) {
                    doc.hints.push(EdgeHint::explicit(
                        node_id(Dialect::Terraform, dep_type, dep_name),
                        node.id.clone(),
                    ));
                }
            }
        }

        doc.nodes.push(node);
    }
}

/// Record a `module "<name>" { source = "..." }` block.
fn extract_module(block: &Block, doc: &mut ParsedDocument) {
    let [name] = block.labels.as_slice() else {
        return;
    };
    let source = block
        .body
        .attributes()
        .find(|attr| attr.key.as_str() == "source")
        .and_then(|attr| match &attr.expr {
            Expression::String(source) => Some(source.trim().to_string()),
            _ => None,
        });
    if let Some(source) = source.filter(|s| !s.is_empty()) {
        doc.modules.push(ModuleCall { name: name.as_str().to_string(), source });
    }
}

impl Parser for HclParser {
    fn dialect(&self) -> Dialect {
        Dialect::Terraform
    }

    fn parse_content(&self, content: &str, file_path: &Path) -> crate::Result<ParsedDocument> {
        let mut doc = ParsedDocument::new(file_path, Dialect::Terraform);

        let error = match hcl::from_str::<Body>(content) {
            Ok(body) => {
                self.extract(body, file_path, &mut doc);
                return Ok(doc);
            }
            Err(e) => e.to_string(),
        };

        tracing::debug!(
            file = %file_path.display(),
            error = %error,
            "Falling back to block-wise parsing"
        );

        let mut parsed_any = false;
        let mut first_failure: Option<(String, Option<usize>, Option<(usize, usize)>)> = None;

        for chunk in split_top_level_blocks(content) {
            match hcl::from_str::<Body>(chunk.text) {
                Ok(body) => {
                    parsed_any = true;
                    self.extract(body, file_path, &mut doc);
                }
                Err(e) if first_failure.is_none() => {
                    let message = e.to_string();
                    let position = line_column_in(&message);
                    let offset = position
                        .and_then(|(l, c)| offset_of(chunk.text, l, c))
                        .map(|o| o + chunk.offset)
                        .or(Some(chunk.offset));
                    let position = offset.and_then(|o| line_column_at(content, o));
                    first_failure = Some((message, offset, position));
                }
                Err(_) => {}
            }
        }

        let (message, offset, position) = first_failure.unwrap_or_else(|| {
            let position = line_column_in(&error);
            let offset = position.and_then(|(l, c)| offset_of(content, l, c));
            (error, offset, position)
        });

        if !parsed_any {
            return Err(parse_error(file_path, Dialect::Terraform, message, offset, position));
        }

        doc.diagnostics.push(Diagnostic::ParseError {
            file: file_path.to_path_buf(),
            dialect: Dialect::Terraform,
            message,
            offset,
            line: position.map(|(l, _)| l),
            column: position.map(|(_, c)| c),
        });
        Ok(doc)
    }
}

/// Resource references found in the expression-valued attributes of a Terraform resource.
pub(crate) fn references(attributes: &Attributes, out: &mut Vec<Reference>) {
    for (key, value) in attributes {
        if META_ARGUMENTS.contains(&key.as_str()) {
            continue;
        }
        value.visit_leaves(key, &mut |_, leaf| {
            let AttrValue::Expression { expression } = leaf else {
                return;
            };
            for (resource_type, name) in resource_traversals(expression) {
                out.push(Reference {
                    text: format!("{resource_type}.{name}"),
                    target: RefTarget::Exact {
                        resource_type: resource_type.to_string(),
                        name: name.to_string(),
                    },
                });
            }
        });
    }
}

/// `(type, name)` pairs of every traversal in `text` that can name a managed resource.
fn resource_traversals(text: &str) -> Vec<(&str, &str)> {
    let mut found = Vec::new();
    for caps in TRAVERSAL_HEAD.captures_iter(text) {
        let (Some(whole), Some(root), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let preceded = text[..whole.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if preceded {
            continue;
        }
        let root = root.as_str();
        if NON_RESOURCE_ROOTS.contains(&root) || !root.contains('_') {
            continue;
        }
        found.push((root, name.as_str()));
    }
    found
}

/// Convert a block body to an ordered attribute map; repeated nested blocks become lists.
fn body_to_attributes(body: &Body) -> Attributes {
    let mut attributes = Attributes::new();
    for attr in body.attributes() {
        attributes.insert(attr.key.as_str().to_string(), expression_to_value(&attr.expr));
    }
    for nested in body.blocks() {
        let value = AttrValue::Map(body_to_attributes(&nested.body));
        let key = nested.identifier.as_str().to_string();
        match attributes.get_mut(&key) {
            Some(AttrValue::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, AttrValue::Null);
                *existing = AttrValue::List(vec![first, value]);
            }
            None => {
                attributes.insert(key, value);
            }
        }
    }
    attributes
}

fn expression_to_value(expr: &Expression) -> AttrValue {
    match expr {
        Expression::Null => AttrValue::Null,
        Expression::Bool(b) => AttrValue::Bool(*b),
        Expression::Number(n) => n
            .as_f64()
            .map_or_else(|| AttrValue::expression(n.to_string()), AttrValue::Number),
        Expression::String(s) => AttrValue::String(s.clone()),
        Expression::Array(items) => AttrValue::List(items.iter().map(expression_to_value).collect()),
        Expression::Object(object) => AttrValue::Map(
            object
                .iter()
                .map(|(k, v)| (object_key_to_string(k), expression_to_value(v)))
                .collect(),
        ),
        other => AttrValue::expression(expression_source(other)),
    }
}

/// Source text of a non-literal expression.
fn expression_source(expr: &Expression) -> String {
    hcl::format::to_string(expr).unwrap_or_else(|_| format!("{expr:?}"))
}

fn object_key_to_string(key: &hcl::ObjectKey) -> String {
    match key {
        hcl::ObjectKey::Identifier(id) => id.as_str().to_string(),
        hcl::ObjectKey::Expression(Expression::String(s)) => s.clone(),
        hcl::ObjectKey::Expression(expr) => expression_source(expr),
        _ => String::new(),
    }
}

/// A top-level slice of an HCL document.
#[derive(Debug)]
struct Chunk<'a> {
    offset: usize,
    text: &'a str,
}

/// Split a document into top-level blocks and attributes without parsing it.
///
/// Strings, comments and heredocs are skipped so braces inside them do not
/// affect nesting. An unbalanced block swallows the rest of the document.
fn split_top_level_blocks(content: &str) -> Vec<Chunk<'_>> {
    let bytes = content.as_bytes();
    let mut chunks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b'#' => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
            }
            b'<' if bytes.get(i + 1) == Some(&b'<') => i = skip_heredoc(content, i),
            b'{' | b'[' | b'(' => {
                depth += 1;
                i += 1;
            }
            b'}' | b']' | b')' => {
                depth = depth.saturating_sub(1);
                i += 1;
                if depth == 0 && bytes[i - 1] == b'}' {
                    push_chunk(content, start, i, &mut chunks);
                    start = i;
                }
            }
            b'\n' if depth == 0 => {
                i += 1;
                push_chunk(content, start, i, &mut chunks);
                start = i;
            }
            _ => i += 1,
        }
    }
    push_chunk(content, start, bytes.len(), &mut chunks);
    chunks
}

fn push_chunk<'a>(content: &'a str, start: usize, end: usize, chunks: &mut Vec<Chunk<'a>>) {
    let text = &content[start..end];
    if !text.trim().is_empty() {
        chunks.push(Chunk { offset: start, text });
    }
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return j + 1,
            b'\n' => return j,
            _ => j += 1,
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    find(bytes, start, b"\n").unwrap_or(bytes.len())
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Skip a `<<EOF` / `<<-EOF` heredoc, returning the index after its closing marker.
fn skip_heredoc(content: &str, start: usize) -> usize {
    let rest = &content[start + 2..];
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let marker: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if marker.is_empty() || marker.starts_with(|c: char| c.is_ascii_digit()) {
        return start + 2;
    }

    let Some(body_start) = content[start..].find('\n').map(|p| start + p + 1) else {
        return content.len();
    };
    let mut line_start = body_start;
    for line in content[body_start..].split_inclusive('\n') {
        line_start += line.len();
        if line.trim() == marker {
            return line_start;
        }
    }
    content.len()
}
