//! Core data types used throughout IacMap.
//!
//! This module defines the fundamental data structures for representing:
//! - IaC dialects and raw source documents
//! - Declared resources and their attribute trees
//! - Explicit dependency hints and pipeline diagnostics
//! - The layout-ready graph handed to rendering backends

use crate::analyzer::{Cluster, DiagramComplexity};
use crate::graph::{Edge, EdgeKind};
use crate::layout::LayoutParams;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Unique identifier for a resource node: `<dialect>:<type>:<logical-name>`.
pub type NodeId = String;

/// Ordered attribute mapping of a resource.
pub type Attributes = IndexMap<String, AttrValue>;

/// Supported IaC dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Terraform / OpenTofu HCL
    Terraform,
    /// AWS CloudFormation YAML or JSON
    CloudFormation,
    /// Azure Bicep
    Bicep,
    /// Pulumi YAML programs
    PulumiYaml,
}

impl Dialect {
    /// All dialects, in a fixed order.
    pub const ALL: [Self; 4] = [Self::Terraform, Self::CloudFormation, Self::Bicep, Self::PulumiYaml];

    /// Prefix used when building node identifiers.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Terraform => "tf",
            Self::CloudFormation => "cfn",
            Self::Bicep => "bicep",
            Self::PulumiYaml => "pulumi",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Terraform => "terraform",
            Self::CloudFormation => "cloudformation",
            Self::Bicep => "bicep",
            Self::PulumiYaml => "pulumi-yaml",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw attribute value, preserved losslessly from the source document.
///
/// Values that could not be evaluated statically (interpolations, function
/// calls, traversals) are kept as [`AttrValue::Expression`] holding the source
/// text of the expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Explicit null
    Null,
    /// Boolean literal
    Bool(bool),
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Unresolved expression or reference marker
    Expression {
        /// Source text of the expression
        expression: String,
    },
    /// Ordered list
    List(Vec<AttrValue>),
    /// Ordered map
    Map(Attributes),
}

impl AttrValue {
    /// Create an expression marker.
    #[must_use]
    pub fn expression(text: impl Into<String>) -> Self {
        Self::Expression { expression: text.into() }
    }

    /// String content of a literal string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a string literal or an expression.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Expression { expression } => Some(expression),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&Attributes> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Visit every scalar leaf together with the nearest enclosing map key.
    pub fn visit_leaves<'a>(&'a self, key: &'a str, f: &mut impl FnMut(&'a str, &'a AttrValue)) {
        match self {
            Self::List(items) => {
                for item in items {
                    item.visit_leaves(key, f);
                }
            }
            Self::Map(map) => {
                for (k, v) in map {
                    v.visit_leaves(k, f);
                }
            }
            leaf => f(key, leaf),
        }
    }
}

/// Build a node identifier.
#[must_use]
pub fn node_id(dialect: Dialect, resource_type: &str, logical_name: &str) -> NodeId {
    format!("{}:{resource_type}:{logical_name}", dialect.id_prefix())
}

/// One declared infrastructure object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    /// Stable identifier, unique within a graph
    pub id: NodeId,
    /// Dialect that declared the resource
    pub dialect: Dialect,
    /// Raw provider-specific type string
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Logical name as declared in the document
    pub logical_name: String,
    /// Inferred top-level provider tag
    pub provider: String,
    /// Human label
    pub display_name: String,
    /// Raw attribute tree
    pub attributes: Attributes,
    /// User-supplied metadata
    pub tags: BTreeMap<String, String>,
    /// File that declared the resource
    pub source_file: PathBuf,
    /// Deployment environment inferred from the declaring path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Dotted path of the Terraform module instance that declared the resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl ResourceNode {
    /// Create a node, deriving its id, provider and display name.
    #[must_use]
    pub fn new(
        dialect: Dialect,
        resource_type: impl Into<String>,
        logical_name: impl Into<String>,
        attributes: Attributes,
        tags: BTreeMap<String, String>,
        source_file: impl Into<PathBuf>,
    ) -> Self {
        let resource_type = resource_type.into();
        let logical_name = logical_name.into();
        let display_name = tags
            .get("Name")
            .or_else(|| tags.get("name"))
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| logical_name.clone());

        Self {
            id: node_id(dialect, &resource_type, &logical_name),
            dialect,
            provider: crate::taxonomy::provider_for(&resource_type).to_string(),
            resource_type,
            logical_name,
            display_name,
            attributes,
            tags,
            source_file: source_file.into(),
            environment: None,
            module: None,
        }
    }

    /// Move the node into a Terraform module instance.
    ///
    /// The logical name becomes the module address (`module.<path>.<name>`),
    /// which keeps the ids of separate instances apart.
    pub fn scope_to_module(&mut self, module: &str) {
        self.logical_name = format!("module.{module}.{}", self.logical_name);
        self.id = node_id(self.dialect, &self.resource_type, &self.logical_name);
        self.module = Some(module.to_string());
    }
}

/// A `module` block of a Terraform document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleCall {
    /// Module block label
    pub name: String,
    /// `source` argument as written
    pub source: String,
}

impl ModuleCall {
    /// Whether `source` names a directory next to the calling file.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.source.starts_with("./") || self.source.starts_with("../")
    }
}

/// An explicit dependency declared in a document, already naming concrete node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeHint {
    /// The dependency (used)
    pub from: NodeId,
    /// The dependent (user)
    pub to: NodeId,
    /// Always [`EdgeKind::ExplicitDependency`] for parser-produced hints
    pub kind: EdgeKind,
}

impl EdgeHint {
    #[must_use]
    pub fn explicit(from: NodeId, to: NodeId) -> Self {
        Self { from, to, kind: EdgeKind::ExplicitDependency }
    }
}

/// A non-fatal problem found while running the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Malformed syntax in one document.
    ParseError {
        file: PathBuf,
        dialect: Dialect,
        message: String,
        offset: Option<usize>,
        line: Option<usize>,
        column: Option<usize>,
    },
    /// A reference expression did not match exactly one node.
    UnresolvedReference {
        node: NodeId,
        reference: String,
        /// Empty for dangling references, two or more for ambiguous ones
        candidates: Vec<NodeId>,
    },
    /// A node could not be placed in a network container.
    ClusteringAmbiguity { node: NodeId, reason: String },
}

impl Diagnostic {
    /// Convert a recoverable error raised for `file` into a parse diagnostic.
    #[must_use]
    pub fn from_error(error: &crate::error::IacMapError, file: &std::path::Path, dialect: Dialect) -> Self {
        match error {
            crate::error::IacMapError::Parse { file, message, offset, line, column, .. } => Self::ParseError {
                file: file.clone(),
                dialect,
                message: message.clone(),
                offset: *offset,
                line: *line,
                column: *column,
            },
            other => Self::ParseError {
                file: file.to_path_buf(),
                dialect,
                message: other.to_string(),
                offset: None,
                line: None,
                column: None,
            },
        }
    }

    /// Short machine-friendly kind name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "parse_error",
            Self::UnresolvedReference { .. } => "unresolved_reference",
            Self::ClusteringAmbiguity { .. } => "clustering_ambiguity",
        }
    }

    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::ParseError { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError { file, message, offset, .. } => match offset {
                Some(o) => write!(f, "{} (byte {o}): {message}", file.display()),
                None => write!(f, "{}: {message}", file.display()),
            },
            Self::UnresolvedReference { node, reference, candidates } if candidates.is_empty() => {
                write!(f, "{node}: reference '{reference}' does not match any resource")
            }
            Self::UnresolvedReference { node, reference, candidates } => write!(
                f,
                "{node}: reference '{reference}' is ambiguous ({})",
                candidates.join(", ")
            ),
            Self::ClusteringAmbiguity { node, reason } => write!(f, "{node}: {reason}"),
        }
    }
}

/// Raw document contents with a declared dialect.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path used for diagnostics and deterministic ordering
    pub path: PathBuf,
    /// Declared dialect
    pub dialect: Dialect,
    /// Possibly pre-truncated contents
    pub bytes: Vec<u8>,
    /// Deployment environment, detected from the path by default
    pub environment: Option<String>,
}

impl SourceDocument {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, dialect: Dialect, bytes: impl Into<Vec<u8>>) -> Self {
        let path = path.into();
        let environment = crate::taxonomy::environment_for_path(&path);
        Self { path, dialect, bytes: bytes.into(), environment }
    }

    /// Replace the detected environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    /// Contents as text; invalid UTF-8 (e.g. a truncated code point) is replaced.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// What a parser extracted from one document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub file: PathBuf,
    pub dialect: Dialect,
    pub nodes: Vec<ResourceNode>,
    pub hints: Vec<EdgeHint>,
    pub diagnostics: Vec<Diagnostic>,
    /// Terraform `module` blocks
    pub modules: Vec<ModuleCall>,
    pub environment: Option<String>,
}

impl ParsedDocument {
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            file: file.into(),
            dialect,
            nodes: Vec::new(),
            hints: Vec::new(),
            diagnostics: Vec::new(),
            modules: Vec::new(),
            environment: None,
        }
    }

    /// Tag the document and every node it declares with an environment.
    pub fn set_environment(&mut self, environment: Option<String>) {
        for node in &mut self.nodes {
            node.environment.clone_from(&environment);
        }
        self.environment = environment;
    }
}

/// The structure handed to rendering backends.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutReadyGraph {
    pub nodes: Vec<ResourceNode>,
    /// Edges with their style hint set
    pub edges: Vec<Edge>,
    /// Cluster forest of all kinds
    pub clusters: Vec<Cluster>,
    pub layout: LayoutParams,
    /// Icon key per node, for nodes that have one
    pub icon_hints: BTreeMap<NodeId, String>,
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub graph: LayoutReadyGraph,
    pub complexity: DiagramComplexity,
    pub diagnostics: Vec<Diagnostic>,
    /// Documents that were fed to the pipeline, in merge order
    pub files: Vec<PathBuf>,
}

impl PipelineOutput {
    #[must_use]
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Number of diagnostics per kind.
    #[must_use]
    pub fn diagnostic_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.diagnostics {
            *counts.entry(d.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Generate a report in the given format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn generate_report(&self, format: ReportFormat, config: &crate::Config) -> crate::Result<String> {
        crate::reporter::Reporter::new(config).generate(self, format)
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ReportFormat {
    /// Plain text format
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Graph output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum GraphFormat {
    /// DOT format (Graphviz)
    #[default]
    Dot,
    /// JSON format
    Json,
    /// Mermaid flowchart syntax
    Mermaid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_identity() {
        let node = ResourceNode::new(
            Dialect::Terraform,
            "aws_s3_bucket",
            "logs",
            Attributes::new(),
            BTreeMap::new(),
            "main.tf",
        );
        assert_eq!(node.id, "tf:aws_s3_bucket:logs");
        assert_eq!(node.provider, "aws");
        assert_eq!(node.display_name, "logs");
    }

    #[test]
    fn test_display_name_from_tags() {
        let mut tags = BTreeMap::new();
        tags.insert("Name".to_string(), "primary-vpc".to_string());
        let node = ResourceNode::new(
            Dialect::CloudFormation,
            "AWS::EC2::VPC",
            "Vpc",
            Attributes::new(),
            tags,
            "template.yaml",
        );
        assert_eq!(node.id, "cfn:AWS::EC2::VPC:Vpc");
        assert_eq!(node.display_name, "primary-vpc");
    }

    #[test]
    fn test_visit_leaves_reports_nearest_key() {
        let mut inner = Attributes::new();
        inner.insert("subnet_id".to_string(), AttrValue::expression("aws_subnet.a.id"));
        let mut attrs = Attributes::new();
        attrs.insert("network".to_string(), AttrValue::List(vec![AttrValue::Map(inner)]));
        let root = AttrValue::Map(attrs);

        let mut seen = Vec::new();
        root.visit_leaves("", &mut |k, v| seen.push((k.to_string(), v.as_text().map(String::from))));
        assert_eq!(seen, vec![("subnet_id".to_string(), Some("aws_subnet.a.id".to_string()))]);
    }

    #[test]
    fn test_attr_value_serializes_untagged() {
        let mut attrs = Attributes::new();
        attrs.insert("cidr".to_string(), AttrValue::String("10.0.0.0/16".to_string()));
        attrs.insert("vpc".to_string(), AttrValue::expression("aws_vpc.main.id"));
        let json = serde_json::to_value(AttrValue::Map(attrs)).unwrap();
        assert_eq!(json["cidr"], "10.0.0.0/16");
        assert_eq!(json["vpc"]["expression"], "aws_vpc.main.id");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::UnresolvedReference {
            node: "cfn:AWS::Lambda::Function:Fn".to_string(),
            reference: "Role".to_string(),
            candidates: vec![],
        };
        assert!(d.to_string().contains("does not match"));
        assert_eq!(d.kind(), "unresolved_reference");
    }
}
