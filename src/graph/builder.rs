//! Graph builder implementation.
//!
//! This module provides the `GraphBuilder` which merges the output of every
//! parsed document into one `ResourceGraph`.

use crate::config::Config;
use crate::error::Result;
use crate::graph::resolver::ReferenceResolver;
use crate::graph::types::{EdgeInsert, EdgeKind, ResourceGraph};
use crate::types::{Diagnostic, NodeId, ParsedDocument};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Builder for constructing resource graphs.
///
/// # Algorithm
///
/// 1. **Node Phase**: documents are merged in path order; a repeated id
///    replaces the earlier declaration (last writer wins).
/// 2. **Reference Phase**: every declaration, including replaced ones, is
///    resolved against the final node set, so edges are the union over all
///    declarations. Non-Terraform logical names resolve only within the
///    declaring document.
/// 3. **Hint Phase**: explicit dependency hints become edges, upgrading any
///    reference edge on the same pair.
/// 4. **Fallback Phase**: if the whole graph still has no edge, resources of
///    each file are chained with implicit-ordering edges.
///
/// # Example
///
/// ```rust
/// use iacmap::graph::GraphBuilder;
/// use iacmap::parser::parse_document;
/// use iacmap::types::{Dialect, SourceDocument};
/// use iacmap::Config;
///
/// let config = Config::default();
/// let doc = SourceDocument::new(
///     "main.tf",
///     Dialect::Terraform,
///     "resource \"aws_vpc\" \"main\" {}\nresource \"aws_subnet\" \"a\" { vpc_id = aws_vpc.main.id }\n",
/// );
/// let parsed = parse_document(&doc, &config);
/// let output = GraphBuilder::new(&config).build(&[parsed]).unwrap();
/// assert_eq!(output.graph.edge_count(), 1);
/// ```
pub struct GraphBuilder<'c> {
    config: &'c Config,
}

/// A built graph and the diagnostics raised while building it.
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: ResourceGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'c> GraphBuilder<'c> {
    /// Create a new graph builder.
    #[must_use]
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// Build a resource graph from parsed documents.
    ///
    /// Parser diagnostics are not copied; only diagnostics raised here are returned.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if the finished graph is structurally invalid.
    pub fn build(&self, documents: &[ParsedDocument]) -> Result<BuildOutput> {
        let mut ordered: Vec<&ParsedDocument> = documents.iter().collect();
        ordered.sort_by(|a, b| a.file.cmp(&b.file));

        tracing::debug!(documents = ordered.len(), "Starting graph construction");
        let mut graph = ResourceGraph::new();
        let mut diagnostics = Vec::new();

        // Phase 1: nodes
        let mut replaced = 0;
        for node in ordered.iter().flat_map(|d| &d.nodes) {
            if graph.upsert_node(node.clone()) {
                tracing::debug!(node = %node.id, file = %node.source_file.display(), "Duplicate declaration replaces earlier one");
                replaced += 1;
            }
        }
        tracing::debug!(nodes = graph.node_count(), replaced, "Node phase complete");

        // Phase 2: attribute references
        let mut reference_edges = Vec::new();
        {
            let mut resolver = ReferenceResolver::new(&graph, self.config);
            for node in ordered.iter().flat_map(|d| &d.nodes) {
                resolver.declare(node);
            }
            for node in ordered.iter().flat_map(|d| &d.nodes) {
                let mut found = Vec::new();
                reference_edges.extend(resolver.resolve(node, &mut found));
                for diagnostic in found {
                    push_unique(&mut diagnostics, diagnostic);
                }
            }
        }
        let mut added = 0;
        for (from, to) in &reference_edges {
            if graph.add_edge(from, to, EdgeKind::AttributeReference) == EdgeInsert::Added {
                added += 1;
            }
        }
        tracing::debug!(edges = added, "Reference phase complete");

        // Phase 3: explicit hints
        for hint in ordered.iter().flat_map(|d| &d.hints) {
            match graph.add_edge(&hint.from, &hint.to, hint.kind) {
                EdgeInsert::MissingEndpoint => {
                    let node = if graph.contains(&hint.to) { &hint.to } else { &hint.from };
                    tracing::debug!(from = %hint.from, to = %hint.to, "Dependency hint names an unknown resource");
                    push_unique(
                        &mut diagnostics,
                        Diagnostic::UnresolvedReference {
                            node: node.clone(),
                            reference: hint.from.clone(),
                            candidates: Vec::new(),
                        },
                    );
                }
                EdgeInsert::Upgraded => {
                    tracing::debug!(from = %hint.from, to = %hint.to, kind = %hint.kind, "Edge upgraded");
                }
                _ => {}
            }
        }

        // Phase 4: implicit ordering fallback
        if self.config.graph.implicit_ordering && graph.edge_count() == 0 && graph.node_count() > 1 {
            let chained = chain_by_file(&mut graph);
            if chained > 0 {
                tracing::warn!(
                    edges = chained,
                    "No dependencies found, falling back to implicit ordering within each file"
                );
            }
        }

        if graph.has_cycle() {
            tracing::warn!("Resource graph contains a dependency cycle");
        }
        graph.validate()?;

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            diagnostics = diagnostics.len(),
            "Graph construction complete"
        );
        Ok(BuildOutput { graph, diagnostics })
    }
}

/// Chain the resources of each file in id order. Returns the number of edges added.
///
/// Each module instance is its own group, so two instances of one module file
/// are never chained into each other.
fn chain_by_file(graph: &mut ResourceGraph) -> usize {
    let mut by_file: BTreeMap<(Option<String>, PathBuf), Vec<NodeId>> = BTreeMap::new();
    for node in graph.nodes() {
        by_file
            .entry((node.module.clone(), node.source_file.clone()))
            .or_default()
            .push(node.id.clone());
    }

    let mut added = 0;
    for ids in by_file.values_mut() {
        ids.sort();
        for pair in ids.windows(2) {
            if graph.add_edge(&pair[0], &pair[1], EdgeKind::ImplicitOrdering) == EdgeInsert::Added {
                added += 1;
            }
        }
    }
    added
}

fn push_unique(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    if !diagnostics.contains(&diagnostic) {
        diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use crate::types::{Dialect, EdgeHint, SourceDocument};
    use pretty_assertions::assert_eq;

    fn parse(path: &str, dialect: Dialect, content: &str) -> ParsedDocument {
        parse_document(&SourceDocument::new(path, dialect, content), &Config::default())
    }

    fn edge_pairs(graph: &ResourceGraph) -> Vec<(String, String, EdgeKind)> {
        graph.edge_list().into_iter().map(|e| (e.from, e.to, e.kind)).collect()
    }

    #[test]
    fn test_reference_edge_direction() {
        let doc = parse(
            "main.tf",
            Dialect::Terraform,
            r#"
resource "aws_s3_bucket" "logs" {}
resource "aws_s3_bucket_policy" "logs" {
  bucket = aws_s3_bucket.logs.id
}
"#,
        );
        let config = Config::default();
        let output = GraphBuilder::new(&config).build(&[doc]).unwrap();
        assert_eq!(
            edge_pairs(&output.graph),
            vec![(
                "tf:aws_s3_bucket:logs".to_string(),
                "tf:aws_s3_bucket_policy:logs".to_string(),
                EdgeKind::AttributeReference
            )]
        );
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn test_explicit_hint_upgrades_reference() {
        let doc = parse(
            "main.tf",
            Dialect::Terraform,
            r#"
resource "aws_vpc" "main" {}
resource "aws_subnet" "a" {
  vpc_id     = aws_vpc.main.id
  depends_on = [aws_vpc.main]
}
"#,
        );
        let config = Config::default();
        let output = GraphBuilder::new(&config).build(&[doc]).unwrap();
        assert_eq!(output.graph.edge_count(), 1);
        assert_eq!(output.graph.edge_list()[0].kind, EdgeKind::ExplicitDependency);
    }

    #[test]
    fn test_duplicate_declarations_union_edges() {
        let first = parse(
            "a.tf",
            Dialect::Terraform,
            r#"
resource "aws_vpc" "main" {}
resource "aws_internet_gateway" "gw" {}
resource "aws_subnet" "a" { vpc_id = aws_vpc.main.id }
"#,
        );
        let second = parse(
            "b.tf",
            Dialect::Terraform,
            r#"
resource "aws_subnet" "a" {
  vpc_id = "fixed"
  tags   = { Name = "gw-${aws_internet_gateway.gw.id}" }
}
"#,
        );
        let config = Config::default();
        let output = GraphBuilder::new(&config).build(&[second, first]).unwrap();
        let graph = &output.graph;

        assert_eq!(graph.node_count(), 3);
        let subnet = graph.get_node("tf:aws_subnet:a").unwrap();
        assert_eq!(subnet.source_file, PathBuf::from("b.tf"));
        assert_eq!(graph.incoming("tf:aws_subnet:a").len(), 2);
    }

    #[test]
    fn test_missing_hint_endpoint_reports_diagnostic() {
        let mut doc = parse("main.tf", Dialect::Terraform, "resource \"aws_vpc\" \"main\" {}\n");
        doc.hints.push(EdgeHint::explicit("tf:aws_vpc:ghost".to_string(), "tf:aws_vpc:main".to_string()));
        let config = Config::default();
        let output = GraphBuilder::new(&config).build(&[doc]).unwrap();

        assert_eq!(output.graph.edge_count(), 0);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].kind(), "unresolved_reference");
    }

    #[test]
    fn test_implicit_ordering_fallback() {
        let doc = parse(
            "main.tf",
            Dialect::Terraform,
            r#"
resource "aws_sqs_queue" "b" {}
resource "aws_sqs_queue" "a" {}
resource "aws_sqs_queue" "c" {}
"#,
        );
        let other = parse("other.tf", Dialect::Terraform, "resource \"aws_sns_topic\" \"t\" {}\n");

        let config = Config::default();
        let output = GraphBuilder::new(&config).build(&[doc.clone(), other.clone()]).unwrap();
        assert_eq!(
            edge_pairs(&output.graph),
            vec![
                ("tf:aws_sqs_queue:a".to_string(), "tf:aws_sqs_queue:b".to_string(), EdgeKind::ImplicitOrdering),
                ("tf:aws_sqs_queue:b".to_string(), "tf:aws_sqs_queue:c".to_string(), EdgeKind::ImplicitOrdering),
            ]
        );

        let mut disabled = Config::default();
        disabled.graph.implicit_ordering = false;
        let output = GraphBuilder::new(&disabled).build(&[doc, other]).unwrap();
        assert_eq!(output.graph.edge_count(), 0);
    }

    #[test]
    fn test_implicit_ordering_keeps_module_instances_apart() {
        let mut first = parse(
            "modules/queue/main.tf",
            Dialect::Terraform,
            "resource \"aws_sqs_queue\" \"a\" {}\nresource \"aws_sqs_queue\" \"b\" {}\n",
        );
        let mut second = first.clone();
        for node in &mut first.nodes {
            node.scope_to_module("orders");
        }
        for node in &mut second.nodes {
            node.scope_to_module("payments");
        }

        let config = Config::default();
        let output = GraphBuilder::new(&config).build(&[first, second]).unwrap();
        assert_eq!(
            edge_pairs(&output.graph),
            vec![
                (
                    "tf:aws_sqs_queue:module.orders.a".to_string(),
                    "tf:aws_sqs_queue:module.orders.b".to_string(),
                    EdgeKind::ImplicitOrdering
                ),
                (
                    "tf:aws_sqs_queue:module.payments.a".to_string(),
                    "tf:aws_sqs_queue:module.payments.b".to_string(),
                    EdgeKind::ImplicitOrdering
                ),
            ]
        );
    }
}
