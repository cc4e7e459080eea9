//! Cluster inference.
//!
//! Groups the nodes of a [`ResourceGraph`] along independent dimensions:
//!
//! - **provider**: one flat cluster per provider tag
//! - **category**: one flat cluster per taxonomy category
//! - **network-container**: networks contain subnets, and other resources
//!   sit in the subnet or network they reference
//! - **environment**: one flat cluster per deployment environment, only
//!   produced when the sources span more than one environment
//!
//! Each dimension that is present covers every node exactly once. Network
//! containment never nests deeper than network -> subnet; a subnet found
//! through another subnet is attached to that subnet's network. Subnets are
//! labelled public or private.

use crate::error::Result;
use crate::graph::{EdgeKind, ResourceGraph};
use crate::taxonomy::{category_for, environment_label, network_role, Category, NetworkRole, SHARED_ENVIRONMENT};
use crate::types::{AttrValue, Diagnostic, NodeId, ResourceNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Id of the bucket holding resources without a network container.
pub const UNGROUPED_CLUSTER_ID: &str = "network:ungrouped";

/// Tag that overrides the keyword-derived category.
const CATEGORY_TAG: &str = "category";

/// Name fragments that mark a subnet as internet-facing.
const PUBLIC_SUBNET_MARKERS: &[&str] = &["public", "dmz", "external"];

/// Attributes that assign public addresses to a subnet's instances.
const PUBLIC_IP_ATTRIBUTES: &[&str] = &["map_public_ip_on_launch", "MapPublicIpOnLaunch", "mapPublicIpOnLaunch"];

/// Clustering dimension.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterKind {
    Provider,
    Category,
    #[serde(alias = "network", alias = "network_container")]
    #[value(name = "network", alias = "network-container")]
    NetworkContainer,
    #[serde(alias = "env")]
    #[value(alias = "env")]
    Environment,
}

impl ClusterKind {
    pub const ALL: [Self; 4] = [Self::Provider, Self::Category, Self::NetworkContainer, Self::Environment];
}

impl fmt::Display for ClusterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider => write!(f, "provider"),
            Self::Category => write!(f, "category"),
            Self::NetworkContainer => write!(f, "network-container"),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// Whether a subnet is reachable from the internet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetVisibility {
    Public,
    Private,
}

impl fmt::Display for SubnetVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "Public"),
            Self::Private => write!(f, "Private"),
        }
    }
}

/// A named group of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub kind: ClusterKind,
    pub label: String,
    /// Enclosing cluster of the same kind
    pub parent: Option<String>,
    pub member_ids: BTreeSet<NodeId>,
    /// Set on subnet clusters only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<SubnetVisibility>,
}

impl Cluster {
    fn new(id: String, kind: ClusterKind, label: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            parent: None,
            member_ids: BTreeSet::new(),
            visibility: None,
        }
    }

    /// True for the network bucket of unplaced resources.
    #[must_use]
    pub fn is_ungrouped(&self) -> bool {
        self.id == UNGROUPED_CLUSTER_ID
    }
}

/// All clusters of a graph. Parents always precede their children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClusterForest {
    clusters: Vec<Cluster>,
}

impl ClusterForest {
    #[must_use]
    pub fn new(clusters: Vec<Cluster>) -> Self {
        Self { clusters }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    pub fn by_kind(&self, kind: ClusterKind) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(move |c| c.kind == kind)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Length of the parent chain of `id`, roots counting as 1.
    ///
    /// The walk is bounded by the number of clusters, so a corrupt forest
    /// cannot loop.
    #[must_use]
    pub fn depth(&self, id: &str) -> usize {
        let mut depth = 0;
        let mut current = self.get(id);
        while let Some(cluster) = current {
            if depth == self.clusters.len() {
                break;
            }
            depth += 1;
            current = cluster.parent.as_deref().and_then(|p| self.get(p));
        }
        depth
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.clusters.iter().map(|c| self.depth(&c.id)).max().unwrap_or(0)
    }

    /// Check the forest invariants against the nodes of `graph`.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` on a duplicate cluster id, a dangling or
    /// cross-kind parent, a parent cycle, or a node that is not in exactly
    /// one cluster of each kind. Environment clusters are optional; when
    /// there are none the kind is not checked.
    pub fn validate(&self, graph: &ResourceGraph) -> Result<()> {
        let by_id: HashMap<&str, &Cluster> = self.clusters.iter().map(|c| (c.id.as_str(), c)).collect();
        if by_id.len() != self.clusters.len() {
            return Err(violation("duplicate cluster id".to_string()));
        }

        for cluster in &self.clusters {
            let mut seen = HashSet::from([cluster.id.as_str()]);
            let mut current = cluster;
            while let Some(parent_id) = current.parent.as_deref() {
                let Some(&parent) = by_id.get(parent_id) else {
                    return Err(violation(format!("cluster '{}' has unknown parent '{parent_id}'", current.id)));
                };
                if parent.kind != current.kind {
                    return Err(violation(format!("cluster '{}' has a parent of another kind", current.id)));
                }
                if !seen.insert(parent_id) {
                    return Err(violation(format!("cluster parent cycle through '{parent_id}'")));
                }
                current = parent;
            }
        }

        for kind in ClusterKind::ALL {
            if kind == ClusterKind::Environment && self.by_kind(kind).next().is_none() {
                continue;
            }
            let mut membership: HashMap<&str, usize> = HashMap::new();
            for cluster in self.by_kind(kind) {
                for member in &cluster.member_ids {
                    *membership.entry(member.as_str()).or_default() += 1;
                }
            }
            for node in graph.nodes() {
                let count = membership.remove(node.id.as_str()).unwrap_or(0);
                if count != 1 {
                    return Err(violation(format!("node '{}' is in {count} {kind} clusters", node.id)));
                }
            }
            if let Some(stray) = membership.keys().next() {
                return Err(violation(format!("{kind} cluster lists unknown node '{stray}'")));
            }
        }
        Ok(())
    }
}

fn violation(message: String) -> crate::error::IacMapError {
    crate::err!(InvariantViolation { message })
}

/// Clusters and the diagnostics raised while inferring them.
#[derive(Debug)]
pub struct ClusterOutput {
    pub forest: ClusterForest,
    pub diagnostics: Vec<Diagnostic>,
}

/// Infers the cluster forest of a graph.
#[derive(Debug, Default)]
pub struct ClusterInferencer;

impl ClusterInferencer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Cluster every node by provider, category, network containment and
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if the resulting forest is inconsistent.
    pub fn infer(&self, graph: &ResourceGraph) -> Result<ClusterOutput> {
        let mut clusters = provider_clusters(graph);
        clusters.extend(category_clusters(graph));
        let (network, diagnostics) = network_clusters(graph);
        clusters.extend(network);
        clusters.extend(environment_clusters(graph));

        let forest = ClusterForest::new(clusters);
        forest.validate(graph)?;

        tracing::debug!(
            clusters = forest.len(),
            max_depth = forest.max_depth(),
            ambiguities = diagnostics.len(),
            "Cluster inference complete"
        );
        Ok(ClusterOutput { forest, diagnostics })
    }
}

fn provider_clusters(graph: &ResourceGraph) -> Vec<Cluster> {
    let mut by_provider: BTreeMap<&str, Cluster> = BTreeMap::new();
    for node in graph.nodes() {
        by_provider
            .entry(node.provider.as_str())
            .or_insert_with(|| {
                Cluster::new(format!("provider:{}", node.provider), ClusterKind::Provider, provider_label(&node.provider))
            })
            .member_ids
            .insert(node.id.clone());
    }
    by_provider.into_values().collect()
}

fn provider_label(provider: &str) -> String {
    match provider {
        "aws" | "gcp" | "oci" | "ibm" => provider.to_ascii_uppercase(),
        "azure" => "Azure".to_string(),
        other => {
            let mut chars = other.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        }
    }
}

/// Category of a node; a `category` tag naming a known category wins.
#[must_use]
pub fn node_category(node: &ResourceNode) -> Category {
    node.tags
        .get(CATEGORY_TAG)
        .and_then(|value| Category::parse(value))
        .unwrap_or_else(|| category_for(&node.resource_type))
}

fn category_clusters(graph: &ResourceGraph) -> Vec<Cluster> {
    let mut by_category: BTreeMap<Category, Cluster> = BTreeMap::new();
    for node in graph.nodes() {
        let category = node_category(node);
        by_category
            .entry(category)
            .or_insert_with(|| Cluster::new(format!("category:{category}"), ClusterKind::Category, category.label()))
            .member_ids
            .insert(node.id.clone());
    }
    by_category.into_values().collect()
}

/// One cluster per environment, or none when everything shares one.
///
/// Nodes without an environment go to the `shared` cluster.
fn environment_clusters(graph: &ResourceGraph) -> Vec<Cluster> {
    let mut by_environment: BTreeMap<&str, Cluster> = BTreeMap::new();
    for node in graph.nodes() {
        let environment = node.environment.as_deref().unwrap_or(SHARED_ENVIRONMENT);
        by_environment
            .entry(environment)
            .or_insert_with(|| {
                Cluster::new(format!("env:{environment}"), ClusterKind::Environment, environment_label(environment))
            })
            .member_ids
            .insert(node.id.clone());
    }
    if by_environment.len() < 2 {
        return Vec::new();
    }
    by_environment.into_values().collect()
}

/// Whether a subnet faces the internet, judged by its name or a public-IP flag.
#[must_use]
pub fn is_public_subnet(node: &ResourceNode) -> bool {
    let named_public = [&node.logical_name, &node.display_name].iter().any(|name| {
        let name = name.to_lowercase();
        PUBLIC_SUBNET_MARKERS.iter().any(|marker| name.contains(marker))
    });
    named_public
        || PUBLIC_IP_ATTRIBUTES.iter().any(|key| match node.attributes.get(*key) {
            Some(AttrValue::Bool(flag)) => *flag,
            Some(AttrValue::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        })
}

/// Lowest-id node with `role` that `id` references.
fn referenced_with_role<'g>(graph: &'g ResourceGraph, id: &str, role: NetworkRole) -> Option<&'g NodeId> {
    graph
        .incoming(id)
        .into_iter()
        .filter(|(source, kind)| *kind != EdgeKind::ImplicitOrdering && network_role(&source.resource_type) == role)
        .map(|(source, _)| &source.id)
        .min()
}

fn network_clusters(graph: &ResourceGraph) -> (Vec<Cluster>, Vec<Diagnostic>) {
    let mut containers: BTreeMap<&NodeId, &ResourceNode> = BTreeMap::new();
    let mut subnets: BTreeMap<&NodeId, &ResourceNode> = BTreeMap::new();
    let mut members: BTreeMap<&NodeId, &ResourceNode> = BTreeMap::new();
    for node in graph.nodes() {
        match network_role(&node.resource_type) {
            NetworkRole::Container => containers.insert(&node.id, node),
            NetworkRole::SubContainer => subnets.insert(&node.id, node),
            NetworkRole::Member => members.insert(&node.id, node),
        };
    }

    // Pass 1: subnet -> network, directly or through another subnet.
    let mut subnet_parent: BTreeMap<&NodeId, &NodeId> = BTreeMap::new();
    for &id in subnets.keys() {
        if let Some(container) = referenced_with_role(graph, id, NetworkRole::Container) {
            subnet_parent.insert(id, container);
        }
    }
    // Chains of nested subnets resolve one hop per round.
    loop {
        let mut changed = false;
        for &id in subnets.keys() {
            if subnet_parent.contains_key(id) {
                continue;
            }
            let inherited = graph
                .incoming(id)
                .into_iter()
                .filter(|(source, kind)| *kind != EdgeKind::ImplicitOrdering && source.id != *id)
                .filter_map(|(source, _)| subnet_parent.get(&source.id).copied())
                .min();
            if let Some(container) = inherited {
                tracing::debug!(subnet = %id, container = %container, "Collapsing nested subnet onto its network");
                subnet_parent.insert(id, container);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let cluster_id = |node_id: &str| format!("network:{node_id}");
    let mut clusters = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (&id, node) in &containers {
        let mut cluster = Cluster::new(cluster_id(id), ClusterKind::NetworkContainer, node.display_name.clone());
        cluster.member_ids.insert(id.clone());
        index.insert(id.clone(), clusters.len());
        clusters.push(cluster);
    }
    for (&id, node) in &subnets {
        let visibility = if is_public_subnet(node) {
            SubnetVisibility::Public
        } else {
            SubnetVisibility::Private
        };
        let label = format!("{} ({visibility})", node.display_name);
        let mut cluster = Cluster::new(cluster_id(id), ClusterKind::NetworkContainer, label);
        cluster.visibility = Some(visibility);
        cluster.parent = subnet_parent.get(id).map(|container| cluster_id(container));
        cluster.member_ids.insert(id.clone());
        index.insert(id.clone(), clusters.len());
        clusters.push(cluster);
    }

    // Pass 2: everything else goes to the subnet or network it references.
    let mut ungrouped = Cluster::new(UNGROUPED_CLUSTER_ID.to_string(), ClusterKind::NetworkContainer, "Ungrouped");
    let mut diagnostics = Vec::new();
    let has_containers = !containers.is_empty() || !subnets.is_empty();
    for &id in members.keys() {
        let owner = referenced_with_role(graph, id, NetworkRole::SubContainer)
            .or_else(|| referenced_with_role(graph, id, NetworkRole::Container));
        match owner.and_then(|owner| index.get(owner.as_str())) {
            Some(&position) => {
                clusters[position].member_ids.insert(id.clone());
            }
            None => {
                ungrouped.member_ids.insert(id.clone());
                if has_containers {
                    diagnostics.push(Diagnostic::ClusteringAmbiguity {
                        node: id.clone(),
                        reason: "no network or subnet reference found, placed in ungrouped".to_string(),
                    });
                }
            }
        }
    }
    if !ungrouped.member_ids.is_empty() {
        clusters.push(ungrouped);
    }

    (clusters, diagnostics)
}
