//! Layout parameter derivation.
//!
//! Turns a [`DiagramComplexity`] snapshot into rendering decisions:
//!
//! - **Direction**: horizontal or vertical, chosen from the complexity
//!   factors when the caller asks for `auto`
//! - **Spacing**: pad, node separation and rank separation scaled from the
//!   configured minimums
//! - **Edge styles**: a visual class per edge, from the types and providers
//!   of its endpoints
//!
//! Everything here is a pure function of its arguments and the
//! [`LayoutOptions`] passed in.
//!
//! # Example
//!
//! ```rust
//! use iacmap::analyzer::DiagramComplexity;
//! use iacmap::config::LayoutOptions;
//! use iacmap::layout::{Direction, LayoutDeriver};
//!
//! let options = LayoutOptions::default();
//! let complexity = DiagramComplexity::from_metrics(60, 90, 8, 1, 10, 1);
//! let params = LayoutDeriver::new(&options).derive(&complexity, Direction::Auto);
//! assert_eq!(params.direction, Direction::Horizontal);
//! ```

use crate::analyzer::{ramp, DiagramComplexity};
use crate::config::LayoutOptions;
use crate::graph::{ResourceGraph, StyleHint};
use crate::taxonomy::{is_data_type, is_security_type};
use crate::types::{NodeId, ResourceNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Damping exponent applied to the overall score before scaling spacing.
const SPACING_DAMPING: f64 = 0.7;

/// Tag naming an icon key for one node.
const ICON_TAG: &str = "icon";

/// Diagram orientation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum Direction {
    /// Let the deriver choose
    #[default]
    Auto,
    /// Left to right
    #[value(alias = "lr")]
    Horizontal,
    /// Top to bottom
    #[value(alias = "tb")]
    Vertical,
}

impl Direction {
    /// Graphviz `rankdir`; `auto` renders like horizontal.
    #[must_use]
    pub const fn rankdir(self) -> &'static str {
        match self {
            Self::Auto | Self::Horizontal => "LR",
            Self::Vertical => "TB",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "horizontal" | "lr" => Ok(Self::Horizontal),
            "vertical" | "tb" => Ok(Self::Vertical),
            other => Err(format!("unknown direction '{other}', expected auto, horizontal (lr) or vertical (tb)")),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
        }
    }
}

/// Visual attributes of an edge class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeVisual {
    pub style: &'static str,
    pub color: &'static str,
    pub penwidth: f64,
}

impl EdgeVisual {
    /// Built-in visual for a style hint.
    #[must_use]
    pub fn for_hint(hint: StyleHint) -> Self {
        let (style, color, penwidth) = match hint {
            StyleHint::Default => ("solid", "#555555", 1.0),
            StyleHint::Security => ("bold", "#d62728", 1.5),
            StyleHint::Data => ("dashed", "#1f77b4", 1.2),
            StyleHint::CrossBoundary => ("dotted", "#7f7f7f", 1.0),
        };
        Self { style, color, penwidth }
    }
}

/// Composite orientation scores. Higher wins; ties go horizontal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionScores {
    pub horizontal: f64,
    pub vertical: f64,
}

impl DirectionScores {
    #[must_use]
    pub fn winner(&self) -> Direction {
        if self.vertical > self.horizontal {
            Direction::Vertical
        } else {
            Direction::Horizontal
        }
    }
}

/// Numeric rendering parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutParams {
    /// Resolved orientation, never `auto`
    pub direction: Direction,
    pub pad: f64,
    pub node_separation: f64,
    pub rank_separation: f64,
    pub edge_styles: BTreeMap<StyleHint, EdgeVisual>,
    /// Present when the direction was chosen automatically
    pub direction_scores: Option<DirectionScores>,
}

/// Derives layout parameters from complexity metrics.
pub struct LayoutDeriver<'a> {
    options: &'a LayoutOptions,
}

impl<'a> LayoutDeriver<'a> {
    #[must_use]
    pub fn new(options: &'a LayoutOptions) -> Self {
        Self { options }
    }

    /// Choose a direction and compute spacing for `complexity`.
    #[must_use]
    pub fn derive(&self, complexity: &DiagramComplexity, requested: Direction) -> LayoutParams {
        let (direction, direction_scores) = match requested {
            Direction::Auto => {
                let scores = score_directions(complexity);
                (scores.winner(), Some(scores))
            }
            fixed => (fixed, None),
        };

        let growth = 1.0 + complexity.overall_score.max(0.0).powf(SPACING_DAMPING) * self.options.complexity_scale_factor;
        let density = if complexity.avg_edges_per_node > self.options.edge_density_threshold {
            self.options.edge_density_scale_factor
        } else {
            1.0
        };
        let widen = self.options.direction_spacing_factor;
        let (node_widen, rank_widen) = match direction {
            Direction::Vertical => (1.0, widen),
            Direction::Auto | Direction::Horizontal => (widen, 1.0),
        };

        let params = LayoutParams {
            direction,
            pad: round2(self.options.min_pad * growth * density),
            node_separation: round2(self.options.min_node_separation * growth * node_widen * density),
            rank_separation: round2(self.options.min_rank_separation * growth * rank_widen * density),
            edge_styles: StyleHint::ALL.into_iter().map(|h| (h, EdgeVisual::for_hint(h))).collect(),
            direction_scores,
        };
        tracing::debug!(
            direction = %params.direction,
            pad = params.pad,
            nodesep = params.node_separation,
            ranksep = params.rank_separation,
            "Layout derived"
        );
        params
    }

    /// Set the style hint of every edge in `graph`. Returns how many edges are not `default`.
    pub fn apply_edge_styles(&self, graph: &mut ResourceGraph) -> usize {
        let styled: Vec<(NodeId, NodeId, StyleHint)> = graph
            .edges()
            .map(|(from, to, _)| (from.id.clone(), to.id.clone(), classify_edge(from, to)))
            .collect();

        let mut special = 0;
        for (from, to, hint) in styled {
            if hint != StyleHint::Default {
                special += 1;
            }
            graph.set_style_hint(&from, &to, hint);
        }
        special
    }

    /// Icon key per node: an `icon` tag wins over `icon_overrides[type]`.
    #[must_use]
    pub fn icon_hints(&self, graph: &ResourceGraph) -> BTreeMap<NodeId, String> {
        graph
            .nodes()
            .filter_map(|node| {
                node.tags
                    .get(ICON_TAG)
                    .or_else(|| self.options.icon_overrides.get(&node.resource_type))
                    .map(|icon| (node.id.clone(), icon.clone()))
            })
            .collect()
    }
}

/// Score both orientations from the six complexity factors.
///
/// Horizontal favours many shallow clusters, large node counts and sparse
/// edges; vertical favours dense edges, deep nesting and few large clusters.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_directions(complexity: &DiagramComplexity) -> DirectionScores {
    let s = complexity.sub_scores();
    let cluster_size = ramp(
        complexity.node_count as f64 / complexity.cluster_count.max(1) as f64,
        10.0,
    );

    let horizontal = 0.25 * s.nodes
        + 0.20 * (1.0 - s.edge_density)
        + 0.20 * s.clusters
        + 0.15 * (1.0 - s.depth)
        + 0.10 * s.providers
        + 0.10 * (1.0 - s.labels);
    let vertical = 0.25 * s.edge_density
        + 0.25 * s.depth
        + 0.15 * ((1.0 - s.clusters) + cluster_size) / 2.0
        + 0.15 * (1.0 - s.nodes)
        + 0.10 * s.labels
        + 0.10 * (1.0 - s.providers);

    DirectionScores { horizontal, vertical }
}

/// Visual class of the edge `from -> to`.
#[must_use]
pub fn classify_edge(from: &ResourceNode, to: &ResourceNode) -> StyleHint {
    if is_security_type(&from.resource_type) && is_security_type(&to.resource_type) {
        StyleHint::Security
    } else if is_data_type(&from.resource_type) || is_data_type(&to.resource_type) {
        StyleHint::Data
    } else if from.provider != to.provider {
        StyleHint::CrossBoundary
    } else {
        StyleHint::Default
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
