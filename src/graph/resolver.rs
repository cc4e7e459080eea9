//! Reference resolution.
//!
//! Finds cross-resource references in attribute trees and matches them
//! against the node namespace. A reference that matches exactly one node
//! yields an edge from the referenced node to the referencing one; dangling
//! and ambiguous references are reported and dropped.
//!
//! Terraform addresses are global to the run. Logical names of the other
//! dialects (CloudFormation logical ids, Bicep symbols, Pulumi resource
//! names) are only visible inside the document that declares them. Inside an
//! expanded module, Terraform addresses resolve against that module instance.

use crate::config::Config;
use crate::graph::types::ResourceGraph;
use crate::parser;
use crate::types::{node_id, Diagnostic, Dialect, NodeId, ResourceNode};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A reference found in an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Reference as written, used in diagnostics
    pub text: String,
    pub target: RefTarget,
}

/// What a reference names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefTarget {
    /// Type and name are both known (Terraform `aws_vpc.main`)
    Exact { resource_type: String, name: String },
    /// Only the logical name is known (CloudFormation, Bicep, Pulumi)
    Logical(String),
}

/// Key of the logical-name index: dialect, declaring document (`None` when global) and name.
type NameKey = (Dialect, Option<PathBuf>, String);

/// Document a logical name of `node` is visible in; `None` means every document.
fn name_scope(node: &ResourceNode) -> Option<&Path> {
    (node.dialect != Dialect::Terraform).then_some(node.source_file.as_path())
}

/// Resolves references against the nodes of a graph.
pub struct ReferenceResolver<'g> {
    graph: &'g ResourceGraph,
    /// Logical name -> ids, in declaration order
    by_name: HashMap<NameKey, Vec<NodeId>>,
    skip_type_prefixes: &'g [String],
}

impl<'g> ReferenceResolver<'g> {
    #[must_use]
    pub fn new(graph: &'g ResourceGraph, config: &'g Config) -> Self {
        let mut resolver = Self {
            graph,
            by_name: HashMap::new(),
            skip_type_prefixes: &config.graph.skip_type_prefixes,
        };
        for node in graph.nodes() {
            resolver.declare(node);
        }
        resolver
    }

    /// Make a declaration's logical name visible in its own document.
    ///
    /// Needed for declarations that a later duplicate replaced in the graph:
    /// the surviving node carries the later document's path.
    pub fn declare(&mut self, node: &ResourceNode) {
        let key = (node.dialect, name_scope(node).map(Path::to_path_buf), node.logical_name.clone());
        let ids = self.by_name.entry(key).or_default();
        if !ids.contains(&node.id) {
            ids.push(node.id.clone());
        }
    }

    /// Edges `(referenced, referencing)` for every reference in `node`.
    ///
    /// Unresolvable references are appended to `diagnostics`.
    pub fn resolve(&self, node: &ResourceNode, diagnostics: &mut Vec<Diagnostic>) -> Vec<(NodeId, NodeId)> {
        let mut references = Vec::new();
        match node.dialect {
            Dialect::Terraform => parser::terraform_references(&node.attributes, &mut references),
            Dialect::CloudFormation => parser::cloudformation_references(&node.attributes, &mut references),
            Dialect::Bicep => parser::bicep_references(&node.attributes, &mut references),
            Dialect::PulumiYaml => parser::pulumi_references(&node.attributes, &mut references),
        }

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for reference in references {
            if !seen.insert(reference.target.clone()) {
                continue;
            }
            match self.candidates(node, &reference.target) {
                Candidates::Skipped => {}
                Candidates::Found(ids) if ids.len() == 1 => {
                    if ids[0] != node.id {
                        edges.push((ids[0].clone(), node.id.clone()));
                    }
                }
                Candidates::Found(ids) => {
                    tracing::debug!(
                        node = %node.id,
                        reference = %reference.text,
                        candidates = ids.len(),
                        "Dropping unresolved reference"
                    );
                    diagnostics.push(Diagnostic::UnresolvedReference {
                        node: node.id.clone(),
                        reference: reference.text,
                        candidates: ids,
                    });
                }
            }
        }
        edges
    }

    fn candidates(&self, node: &ResourceNode, target: &RefTarget) -> Candidates {
        let dialect = node.dialect;
        match target {
            RefTarget::Exact { resource_type, name } => {
                if self.skip_type_prefixes.iter().any(|p| resource_type.starts_with(p.as_str())) {
                    return Candidates::Skipped;
                }
                let id = match &node.module {
                    Some(module) => node_id(dialect, resource_type, &format!("module.{module}.{name}")),
                    None => node_id(dialect, resource_type, name),
                };
                if self.graph.contains(&id) {
                    Candidates::Found(vec![id])
                } else {
                    Candidates::Found(Vec::new())
                }
            }
            RefTarget::Logical(name) => {
                let key = (dialect, name_scope(node).map(Path::to_path_buf), name.clone());
                Candidates::Found(self.by_name.get(&key).cloned().unwrap_or_default())
            }
        }
    }
}

enum Candidates {
    /// Target deliberately not extracted
    Skipped,
    Found(Vec<NodeId>),
}
