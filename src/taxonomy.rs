//! Resource-type lookup tables.
//!
//! Provider tags, categories, network roles and edge-style classes are all
//! derived from the raw resource type string through the immutable tables in
//! this module. Matching is done on the lower-cased type, so the same tables
//! serve Terraform (`aws_vpc`), CloudFormation (`AWS::EC2::VPC`), Bicep
//! (`Microsoft.Network/virtualNetworks`) and Pulumi (`aws:ec2/vpc:Vpc`) types.
//!
//! Deployment environments are the one thing read from paths instead of
//! types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Provider tag for types no prefix matches.
pub const OTHER_PROVIDER: &str = "other";

/// Type prefix to provider tag, first match wins.
static PROVIDER_PREFIXES: &[(&str, &str)] = &[
    ("aws::", "aws"),
    ("aws_", "aws"),
    ("aws:", "aws"),
    ("azurerm_", "azure"),
    ("azuread_", "azure"),
    ("azapi_", "azure"),
    ("azure-native:", "azure"),
    ("azure:", "azure"),
    ("microsoft.", "azure"),
    ("google_", "gcp"),
    ("gcp:", "gcp"),
    ("oci_", "oci"),
    ("oci:", "oci"),
    ("ibm_", "ibm"),
    ("kubernetes_", "kubernetes"),
    ("kubernetes:", "kubernetes"),
    ("helm_", "kubernetes"),
    ("digitalocean_", "digitalocean"),
    ("cloudflare_", "cloudflare"),
    ("random_", "utility"),
    ("random:", "utility"),
    ("tls_", "utility"),
    ("time_", "utility"),
    ("local_", "utility"),
];

/// Fixed resource category taxonomy, declared in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Network,
    Security,
    Compute,
    Data,
    Storage,
    Integration,
    Management,
    Other,
}

impl Category {
    pub const ALL: [Self; 8] = [
        Self::Network,
        Self::Security,
        Self::Compute,
        Self::Data,
        Self::Storage,
        Self::Integration,
        Self::Management,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Security => "security",
            Self::Compute => "compute",
            Self::Data => "data",
            Self::Storage => "storage",
            Self::Integration => "integration",
            Self::Management => "management",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::Security => "Security",
            Self::Compute => "Compute",
            Self::Data => "Data",
            Self::Storage => "Storage",
            Self::Integration => "Integration",
            Self::Management => "Management",
            Self::Other => "Other",
        }
    }

    /// Parse a category name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword table for categories, in precedence order. `Other` has no keywords.
static CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Network,
        &[
            "vpc", "vnet", "vcn", "subnet", "route", "gateway", "internet", "nat", "network",
            "firewall", "lb", "load_balancer", "loadbalancer", "dns", "cdn", "cloudfront",
        ],
    ),
    (
        Category::Security,
        &[
            "security", "nsg", "iam", "policy", "role", "key", "kms", "secret", "certificate",
            "waf", "identity",
        ],
    ),
    (
        Category::Compute,
        &[
            "instance", "vm", "virtual_machine", "virtualmachine", "compute", "ec2",
            "app_service", "function", "lambda", "eks", "aks", "gke", "kubernetes", "container",
            "ecs", "ecr", "autoscaling", "web_app", "sites",
        ],
    ),
    (
        Category::Data,
        &["db", "database", "sql", "rds", "dynamodb", "cosmos", "redis", "elasticache", "aurora"],
    ),
    (
        Category::Storage,
        &["bucket", "storage", "objectstorage", "blob", "s3", "efs", "disk", "volume"],
    ),
    (
        Category::Integration,
        &[
            "queue", "sqs", "sns", "topic", "event", "kinesis", "stream", "pubsub", "servicebus",
            "api", "step_function", "statemachine", "logic",
        ],
    ),
    (
        Category::Management,
        &[
            "cloudwatch", "monitor", "log", "alarm", "dashboard", "cloudtrail", "config", "ssm",
            "parameter", "insights", "budget", "backup",
        ],
    ),
];

/// Role of a resource in the network containment heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkRole {
    /// Network / virtual-network-like resource
    Container,
    /// Subnet-like resource
    SubContainer,
    /// Anything else
    Member,
}

static CONTAINER_KEYWORDS: &[&str] = &[
    "vpc",
    "vnet",
    "vcn",
    "virtual_network",
    "virtualnetwork",
    "compute_network",
];

/// Network-ish types that are attachments or options rather than containers.
static CONTAINER_EXCLUSIONS: &[&str] = &[
    "subnet", "interface", "endpoint", "peering", "attachment", "association", "gateway", "link",
    "connection", "rule", "dhcp", "flow", "ipam", "cidr", "option",
];

static SUB_CONTAINER_KEYWORDS: &[&str] = &["subnet"];

static SUB_CONTAINER_EXCLUSIONS: &[&str] = &["association", "group"];

/// Keywords marking an endpoint as security-typed for edge styling.
static SECURITY_STYLE_KEYWORDS: &[&str] = &[
    "security", "firewall", "iam", "kms", "key", "policy", "role", "nsg", "nacl", "waf", "secret",
];

/// Keywords marking an endpoint as data- or storage-typed for edge styling.
static DATA_STYLE_KEYWORDS: &[&str] = &[
    "db", "database", "rds", "dynamodb", "sql", "storage", "bucket", "s3", "blob", "queue",
    "stream", "kinesis", "eventgrid", "pubsub", "cosmos", "redis", "elasticache", "bigtable", "bigquery",
    "glue_catalog_table", "storage_table",
];

/// Routing and network plumbing whose names overlap the data keywords.
static DATA_STYLE_EXCLUSIONS: &[&str] = &["route_table", "routetable", "route-table"];

/// Directory names recognised as deployment environments wherever they appear.
static KNOWN_ENVIRONMENTS: &[&str] = &[
    "dev", "development", "preprod", "pre-prod", "prod", "production", "stage", "staging", "qa",
    "test", "uat", "sandbox", "shared",
];

/// Directories whose children are environments (`terraform/<env>/main.tf`).
static ENVIRONMENT_PARENTS: &[&str] = &["terraform", "environments", "envs"];

/// Children of an environment parent that are never environments.
static NON_ENVIRONMENT_DIRS: &[&str] = &[
    "modules", "module", "account_config", "accounts", "artifacts", "templates", "template", "img",
    "images", "cloud_formation", "config", "configs",
];

/// Environment key of resources without a detected environment.
pub const SHARED_ENVIRONMENT: &str = "shared";

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Provider tag of a resource type; unknown prefixes map to [`OTHER_PROVIDER`].
#[must_use]
pub fn provider_for(resource_type: &str) -> &'static str {
    let lowered = resource_type.to_ascii_lowercase();
    PROVIDER_PREFIXES
        .iter()
        .find(|(prefix, _)| lowered.starts_with(prefix))
        .map_or(OTHER_PROVIDER, |(_, provider)| provider)
}

/// Category of a resource type, first keyword match in precedence order.
#[must_use]
pub fn category_for(resource_type: &str) -> Category {
    let lowered = resource_type.to_ascii_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| contains_any(&lowered, keywords))
        .map_or(Category::Other, |(category, _)| *category)
}

#[must_use]
pub fn network_role(resource_type: &str) -> NetworkRole {
    let lowered = resource_type.to_ascii_lowercase();
    if contains_any(&lowered, SUB_CONTAINER_KEYWORDS) && !contains_any(&lowered, SUB_CONTAINER_EXCLUSIONS) {
        NetworkRole::SubContainer
    } else if contains_any(&lowered, CONTAINER_KEYWORDS) && !contains_any(&lowered, CONTAINER_EXCLUSIONS) {
        NetworkRole::Container
    } else {
        NetworkRole::Member
    }
}

/// Deployment environment of a file, from the directories of its path.
///
/// The directory right below an environment parent (`terraform/`,
/// `environments/`, `envs/`) wins; otherwise the first directory with a
/// well-known environment name. Names are lower-cased.
#[must_use]
pub fn environment_for_path(path: &Path) -> Option<String> {
    let dirs: Vec<String> = path
        .parent()?
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str().map(str::to_ascii_lowercase),
            _ => None,
        })
        .collect();

    let below_parent = dirs.windows(2).find_map(|pair| {
        (ENVIRONMENT_PARENTS.contains(&pair[0].as_str()) && !NON_ENVIRONMENT_DIRS.contains(&pair[1].as_str()))
            .then(|| pair[1].clone())
    });
    below_parent.or_else(|| dirs.into_iter().find(|d| KNOWN_ENVIRONMENTS.contains(&d.as_str())))
}

/// Display label of an environment key: `pre-prod` -> `Pre Prod`.
#[must_use]
pub fn environment_label(environment: &str) -> String {
    environment
        .split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub fn is_security_type(resource_type: &str) -> bool {
    contains_any(&resource_type.to_ascii_lowercase(), SECURITY_STYLE_KEYWORDS)
}

#[must_use]
pub fn is_data_type(resource_type: &str) -> bool {
    let lowered = resource_type.to_ascii_lowercase();
    contains_any(&lowered, DATA_STYLE_KEYWORDS) && !contains_any(&lowered, DATA_STYLE_EXCLUSIONS)
}
