//! Format parsers for the supported IaC dialects.
//!
//! Every dialect implements the same [`Parser`] trait: given the text of one
//! document it returns the declared resources, explicit dependency hints and
//! any non-fatal diagnostics. Parsers are fail-soft; a malformed resource is
//! reported and skipped while the rest of the document is still extracted.
//!
//! # Supported Dialects
//!
//! - Terraform HCL (`.tf`)
//! - CloudFormation YAML / JSON (`*.cfn.yaml`, `template.yaml`, ...)
//! - Bicep (`.bicep`)
//! - Pulumi YAML (`Pulumi.yaml`, `*.pulumi.yaml`)
//!
//! # Example
//!
//! ```rust
//! use iacmap::parser::{parse_document, Parser};
//! use iacmap::types::{Dialect, SourceDocument};
//! use iacmap::Config;
//!
//! let doc = SourceDocument::new(
//!     "main.tf",
//!     Dialect::Terraform,
//!     r#"resource "aws_vpc" "main" { cidr_block = "10.0.0.0/16" }"#,
//! );
//! let parsed = parse_document(&doc, &Config::default());
//! assert_eq!(parsed.nodes.len(), 1);
//! ```

mod bicep;
mod cloudformation;
mod hcl;
mod loader;
mod modules;
mod pulumi;

pub use bicep::BicepParser;
pub use cloudformation::CloudFormationParser;
pub use hcl::HclParser;
pub use loader::{LoadedSources, SourceLoader};
pub use modules::expand_local_modules;
pub use pulumi::PulumiYamlParser;

pub(crate) use bicep::references as bicep_references;
pub(crate) use cloudformation::references as cloudformation_references;
pub(crate) use hcl::references as terraform_references;
pub(crate) use pulumi::references as pulumi_references;

use crate::config::Config;
use crate::types::{AttrValue, Diagnostic, Dialect, ParsedDocument, SourceDocument};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Directories never descended into during discovery.
pub const SKIP_DIRS: &[&str] = &[".terraform", ".terragrunt-cache", "node_modules", ".git", "cdk.out"];

/// Generic markup extensions that may hold a CloudFormation template.
pub const MARKUP_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

static LINE_COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"line (\d+), column (\d+)").expect("Invalid regex"));

/// Trait for parsing one IaC document.
///
/// Implementations are stateless with respect to the documents they parse,
/// so one parser instance may be shared across worker threads.
pub trait Parser: Send + Sync {
    /// The dialect this parser understands.
    fn dialect(&self) -> Dialect;

    /// Parse a single document's contents.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` error when nothing at all could be extracted from
    /// the document.
    fn parse_content(&self, content: &str, file_path: &Path) -> crate::Result<ParsedDocument>;
}

/// Parser instance for a dialect.
#[must_use]
pub fn parser_for(dialect: Dialect, config: &Config) -> Box<dyn Parser> {
    match dialect {
        Dialect::Terraform => Box::new(HclParser::new(config)),
        Dialect::CloudFormation => Box::new(CloudFormationParser::new(config)),
        Dialect::Bicep => Box::new(BicepParser::new(config)),
        Dialect::PulumiYaml => Box::new(PulumiYamlParser::new(config)),
    }
}

/// Parse one document, turning a whole-document failure into a diagnostic.
#[must_use]
pub fn parse_document(document: &SourceDocument, config: &Config) -> ParsedDocument {
    let parser = parser_for(document.dialect, config);
    let raw = document.text();
    let text = normalize_newlines(&raw);

    let mut parsed = match parser.parse_content(&text, &document.path) {
        Ok(parsed) => {
            tracing::debug!(
                file = %document.path.display(),
                dialect = %document.dialect,
                resources = parsed.nodes.len(),
                hints = parsed.hints.len(),
                diagnostics = parsed.diagnostics.len(),
                "Parsed document"
            );
            parsed
        }
        Err(e) => {
            if e.is_recoverable() {
                tracing::warn!(file = %document.path.display(), error = %e, "Failed to parse document");
            } else {
                tracing::error!(file = %document.path.display(), error = %e, "Unexpected error while parsing document");
            }
            let mut parsed = ParsedDocument::new(&document.path, document.dialect);
            parsed.diagnostics.push(Diagnostic::from_error(&e, &document.path, document.dialect));
            parsed
        }
    };

    parsed.set_environment(document.environment.clone());

    // Offsets point into the normalized text; report them against the file as read.
    if matches!(text, std::borrow::Cow::Owned(_)) {
        for diagnostic in &mut parsed.diagnostics {
            if let Diagnostic::ParseError { offset: Some(offset), .. } = diagnostic {
                *offset = raw_offset(&raw, *offset);
            }
        }
    }
    parsed
}

/// Determine the dialect of a file from its name.
///
/// Generic `.yaml`/`.yml`/`.json` files need their content to decide; pass
/// it as `content` when available.
#[must_use]
pub fn detect_dialect(path: &Path, content: Option<&str>) -> Option<Dialect> {
    let name = path.file_name()?.to_str()?;
    let lower = name.to_ascii_lowercase();

    if lower.ends_with(".tf") {
        return Some(Dialect::Terraform);
    }
    if lower.ends_with(".bicep") {
        return Some(Dialect::Bicep);
    }
    if lower == "pulumi.yaml" || lower == "pulumi.yml" || lower.ends_with(".pulumi.yaml") || lower.ends_with(".pulumi.yml") {
        return Some(Dialect::PulumiYaml);
    }
    if lower.ends_with(".cfn.yaml")
        || lower.ends_with(".cfn.yml")
        || lower.ends_with(".cfn.json")
        || lower.ends_with(".template.json")
        || lower == "template.yaml"
        || lower == "template.yml"
    {
        return Some(Dialect::CloudFormation);
    }

    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if MARKUP_EXTENSIONS.contains(&extension.as_str())
        && content.is_some_and(|c| c.contains("AWSTemplateFormatVersion"))
    {
        return Some(Dialect::CloudFormation);
    }
    None
}

/// Whether a file name could hold a document, possibly after looking at its content.
#[must_use]
pub fn is_candidate_file(path: &Path) -> bool {
    detect_dialect(path, None).is_some()
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| MARKUP_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Normalize CRLF and lone CR line endings to LF.
#[must_use]
pub fn normalize_newlines(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('\r') {
        std::borrow::Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        std::borrow::Cow::Borrowed(text)
    }
}

/// Map a byte offset in [`normalize_newlines`] output back to the raw text.
#[must_use]
pub fn raw_offset(raw: &str, normalized: usize) -> usize {
    let bytes = raw.as_bytes();
    let (mut raw_pos, mut norm_pos) = (0, 0);
    while norm_pos < normalized && raw_pos < bytes.len() {
        raw_pos += if bytes[raw_pos..].starts_with(b"\r\n") { 2 } else { 1 };
        norm_pos += 1;
    }
    raw_pos + (normalized - norm_pos)
}

/// Byte offset of a 1-based line/column position.
#[must_use]
pub fn offset_of(content: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let line_start = if line == 1 {
        0
    } else {
        content.match_indices('\n').nth(line - 2).map(|(i, _)| i + 1)?
    };
    let rest = &content[line_start..];
    let within = rest
        .char_indices()
        .nth(column.saturating_sub(1))
        .map_or(rest.len(), |(i, _)| i);
    Some(line_start + within)
}

/// 1-based line and column of a byte offset.
#[must_use]
pub fn line_column_at(content: &str, offset: usize) -> Option<(usize, usize)> {
    let before = content.get(..offset)?;
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    Some((line, column))
}

/// Byte offset of the mapping key `key` in a YAML or JSON document.
///
/// The key must open its line (after indentation); a quoted key anywhere is
/// accepted for single-line JSON.
#[must_use]
pub fn key_offset(content: &str, key: &str) -> Option<usize> {
    let key = regex::escape(key);
    let at_line_start = Regex::new(&format!(r#"(?m)^[ \t]*(?:"{key}"|'{key}'|{key})[ \t]*:"#)).ok()?;
    if let Some(m) = at_line_start.find(content) {
        let indent = m.as_str().len() - m.as_str().trim_start_matches([' ', '\t']).len();
        return Some(m.start() + indent);
    }
    let quoted = Regex::new(&format!(r#""{key}"\s*:"#)).ok()?;
    quoted.find(content).map(|m| m.start())
}

/// Extract a `line N, column M` position from an error message.
#[must_use]
pub fn line_column_in(message: &str) -> Option<(usize, usize)> {
    let caps = LINE_COLUMN.captures(message)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Build a `Parse` error for a document.
pub(crate) fn parse_error(
    file_path: &Path,
    dialect: Dialect,
    message: String,
    offset: Option<usize>,
    position: Option<(usize, usize)>,
) -> crate::error::IacMapError {
    crate::err!(Parse {
        file: file_path.to_path_buf(),
        dialect: dialect.to_string(),
        message,
        offset,
        line: position.map(|(l, _)| l),
        column: position.map(|(_, c)| c),
    })
}

/// Extract user tags from an attribute value.
///
/// Accepts a map of strings (`tags = { Name = "x" }`) or a CloudFormation
/// style list of `{Key, Value}` pairs. Non-literal values are skipped.
#[must_use]
pub fn tags_from_value(value: Option<&AttrValue>) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    match value {
        Some(AttrValue::Map(map)) => {
            for (k, v) in map {
                if let Some(s) = v.as_str() {
                    tags.insert(k.clone(), s.to_string());
                }
            }
        }
        Some(AttrValue::List(items)) => {
            for item in items.iter().filter_map(AttrValue::as_map) {
                if let (Some(k), Some(v)) = (
                    item.get("Key").and_then(AttrValue::as_str),
                    item.get("Value").and_then(AttrValue::as_str),
                ) {
                    tags.insert(k.to_string(), v.to_string());
                }
            }
        }
        _ => {}
    }
    tags
}
