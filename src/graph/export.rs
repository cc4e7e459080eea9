//! Graph export functionality.
//!
//! This module serializes a [`LayoutReadyGraph`] for rendering backends and
//! documentation.

use crate::analyzer::{Cluster, ClusterKind, SubnetVisibility};
use crate::error::Result;
use crate::graph::types::StyleHint;
use crate::layout::EdgeVisual;
use crate::types::{GraphFormat, LayoutReadyGraph, ResourceNode};
use std::collections::HashMap;
use std::fmt::Write;

const CLUSTER_COLOR: &str = "#888888";
const PUBLIC_SUBNET_COLOR: &str = "#28A745";
const PRIVATE_SUBNET_COLOR: &str = "#FFC107";

/// Export a layout-ready graph to the specified format.
///
/// # Supported Formats
///
/// - **DOT**: Graphviz with layout parameters as graph attributes
/// - **JSON**: the full structure for programmatic access
/// - **Mermaid**: flowchart syntax for documentation
///
/// `cluster_view` selects which cluster kind DOT and Mermaid draw; JSON
/// always carries every cluster.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn export_graph(graph: &LayoutReadyGraph, format: GraphFormat, cluster_view: ClusterKind) -> Result<String> {
    match format {
        GraphFormat::Dot => Ok(export_dot(graph, cluster_view)),
        GraphFormat::Json => export_json(graph),
        GraphFormat::Mermaid => Ok(export_mermaid(graph, cluster_view)),
    }
}

/// Clusters of one kind, as roots plus a parent -> children index.
struct ClusterTree<'g> {
    roots: Vec<&'g Cluster>,
    children: HashMap<&'g str, Vec<&'g Cluster>>,
}

impl<'g> ClusterTree<'g> {
    fn new(clusters: &'g [Cluster], kind: ClusterKind) -> Self {
        let mut roots = Vec::new();
        let mut children: HashMap<&str, Vec<&Cluster>> = HashMap::new();
        for cluster in clusters.iter().filter(|c| c.kind == kind && !c.member_ids.is_empty()) {
            match cluster.parent.as_deref() {
                Some(parent) => children.entry(parent).or_default().push(cluster),
                None => roots.push(cluster),
            }
        }
        Self { roots, children }
    }

    fn children_of(&self, cluster: &Cluster) -> &[&'g Cluster] {
        self.children.get(cluster.id.as_str()).map_or(&[], Vec::as_slice)
    }
}

/// Export to Graphviz DOT format.
fn export_dot(graph: &LayoutReadyGraph, cluster_view: ClusterKind) -> String {
    let nodes: HashMap<&str, &ResourceNode> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let layout = &graph.layout;

    let mut dot = String::new();
    dot.push_str("digraph IacMap {\n");
    let _ = writeln!(dot, "    rankdir={};", layout.direction.rankdir());
    let _ = writeln!(dot, "    pad={};", layout.pad);
    let _ = writeln!(dot, "    nodesep={};", layout.node_separation);
    let _ = writeln!(dot, "    ranksep={};", layout.rank_separation);
    dot.push_str("    compound=true;\n");
    dot.push_str("    node [shape=box, style=\"rounded,filled\", fillcolor=white, fontname=\"Helvetica\"];\n");
    dot.push_str("    edge [arrowsize=0.8];\n\n");

    let tree = ClusterTree::new(&graph.clusters, cluster_view);
    for root in &tree.roots {
        write_dot_cluster(&mut dot, &tree, root, &nodes, graph, 1);
    }

    if !graph.edges.is_empty() {
        dot.push('\n');
    }
    for edge in &graph.edges {
        let visual = layout
            .edge_styles
            .get(&edge.style_hint)
            .cloned()
            .unwrap_or_else(|| EdgeVisual::for_hint(edge.style_hint));
        let _ = writeln!(
            dot,
            "    \"{}\" -> \"{}\" [style={}, color=\"{}\", penwidth={}, tooltip=\"{}\"];",
            escape_dot_string(&edge.from),
            escape_dot_string(&edge.to),
            visual.style,
            visual.color,
            visual.penwidth,
            edge.kind
        );
    }

    dot.push_str("}\n");
    dot
}

fn write_dot_cluster(
    dot: &mut String,
    tree: &ClusterTree<'_>,
    cluster: &Cluster,
    nodes: &HashMap<&str, &ResourceNode>,
    graph: &LayoutReadyGraph,
    depth: usize,
) {
    let indent = "    ".repeat(depth);
    let _ = writeln!(dot, "{indent}subgraph \"cluster_{}\" {{", escape_dot_string(&cluster.id));
    let _ = writeln!(dot, "{indent}    label=\"{}\";", escape_dot_string(&cluster.label));
    let _ = writeln!(dot, "{indent}    style=\"rounded,dashed\";");
    let color = match cluster.visibility {
        Some(SubnetVisibility::Public) => PUBLIC_SUBNET_COLOR,
        Some(SubnetVisibility::Private) => PRIVATE_SUBNET_COLOR,
        None => CLUSTER_COLOR,
    };
    let _ = writeln!(dot, "{indent}    color=\"{color}\";");

    for member in &cluster.member_ids {
        let Some(node) = nodes.get(member.as_str()) else {
            continue;
        };
        let label = escape_dot_string(&format!("{}\n{}", node.display_name, node.resource_type));
        let class = graph
            .icon_hints
            .get(&node.id)
            .map(|icon| format!(", class=\"{}\"", escape_dot_string(icon)))
            .unwrap_or_default();
        let _ = writeln!(
            dot,
            "{indent}    \"{}\" [label=\"{label}\"{class}];",
            escape_dot_string(&node.id)
        );
    }
    for child in tree.children_of(cluster) {
        write_dot_cluster(dot, tree, child, nodes, graph, depth + 1);
    }
    let _ = writeln!(dot, "{indent}}}");
}

/// Export to JSON format.
fn export_json(graph: &LayoutReadyGraph) -> Result<String> {
    serde_json::to_string_pretty(graph).map_err(|e| {
        crate::err!(ReportGeneration {
            message: format!("Failed to serialize graph to JSON: {e}"),
        })
    })
}

/// Export to Mermaid flowchart format.
fn export_mermaid(graph: &LayoutReadyGraph, cluster_view: ClusterKind) -> String {
    let short_ids: HashMap<&str, String> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), format!("n{i}")))
        .collect();
    let nodes: HashMap<&str, &ResourceNode> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut mermaid = String::new();
    let _ = writeln!(mermaid, "flowchart {}", graph.layout.direction.rankdir());
    mermaid.push_str("    %% IacMap resource graph\n");

    let tree = ClusterTree::new(&graph.clusters, cluster_view);
    let mut counter = 0;
    for root in &tree.roots {
        write_mermaid_cluster(&mut mermaid, &tree, root, &nodes, &short_ids, &mut counter, 1);
    }

    if !graph.edges.is_empty() {
        mermaid.push('\n');
    }
    for edge in &graph.edges {
        let (Some(from), Some(to)) = (short_ids.get(edge.from.as_str()), short_ids.get(edge.to.as_str())) else {
            continue;
        };
        let arrow = match edge.style_hint {
            StyleHint::Default => "-->",
            StyleHint::Security => "==>",
            StyleHint::Data | StyleHint::CrossBoundary => "-.->",
        };
        let _ = writeln!(mermaid, "    {from} {arrow} {to}");
    }

    mermaid
}

fn write_mermaid_cluster(
    mermaid: &mut String,
    tree: &ClusterTree<'_>,
    cluster: &Cluster,
    nodes: &HashMap<&str, &ResourceNode>,
    short_ids: &HashMap<&str, String>,
    counter: &mut usize,
    depth: usize,
) {
    let indent = "    ".repeat(depth);
    let _ = writeln!(
        mermaid,
        "{indent}subgraph c{counter}[\"{}\"]",
        escape_mermaid_string(&cluster.label)
    );
    *counter += 1;

    for member in &cluster.member_ids {
        let (Some(node), Some(short)) = (nodes.get(member.as_str()), short_ids.get(member.as_str())) else {
            continue;
        };
        let _ = writeln!(
            mermaid,
            "{indent}    {short}[\"{}<br/>{}\"]",
            escape_mermaid_string(&node.display_name),
            escape_mermaid_string(&node.resource_type)
        );
    }
    for child in tree.children_of(cluster) {
        write_mermaid_cluster(mermaid, tree, child, nodes, short_ids, counter, depth + 1);
    }
    let _ = writeln!(mermaid, "{indent}end");
}

/// Escape a string for use in DOT labels.
fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Escape a string for use in Mermaid labels.
fn escape_mermaid_string(s: &str) -> String {
    s.replace('"', "#quot;").replace('\n', " ")
}
