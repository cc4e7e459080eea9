//! Plain text report generator.

use crate::config::Config;
use crate::error::Result;
use crate::reporter::ReportGenerator;
use crate::types::{Diagnostic, PipelineOutput};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};

/// Longest message shown in the diagnostics table.
const MAX_MESSAGE_LEN: usize = 90;

/// Text report generator for CLI output.
pub struct TextReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show verbose output
    verbose: bool,
}

impl TextReporter {
    /// Create a new text reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            use_colors: config.output.colored,
            verbose: config.output.verbose,
        }
    }
}

impl ReportGenerator for TextReporter {
    fn generate(&self, output: &PipelineOutput) -> Result<String> {
        let mut report = String::new();

        report.push_str(&self.format_header());
        report.push('\n');

        report.push_str(&self.format_summary(output));
        report.push('\n');

        report.push_str(&self.format_complexity(output));
        report.push('\n');

        report.push_str(&self.format_layout(output));
        report.push('\n');

        if self.verbose && !output.graph.clusters.is_empty() {
            report.push_str(&self.format_clusters(output));
            report.push('\n');
        }

        if output.has_diagnostics() {
            report.push_str(&self.format_diagnostics(output));
            report.push('\n');
        }

        report.push_str(&self.format_footer(output));

        Ok(report)
    }
}

impl TextReporter {
    fn format_header(&self) -> String {
        let title = "IacMap Resource Graph";
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        if self.use_colors {
            format!(
                "\n{} {} {}\n{}\n",
                title.bright_white().bold(),
                version.dimmed(),
                format!("({timestamp})").dimmed(),
                "=".repeat(80).bright_blue(),
            )
        } else {
            format!("\n{title} {version} ({timestamp})\n{}\n", "=".repeat(80))
        }
    }

    fn section(&self, title: &str) -> String {
        let title = if self.use_colors {
            title.bright_cyan().bold().to_string()
        } else {
            title.to_string()
        };
        format!("\n{title}\n{}\n", "-".repeat(80))
    }

    fn format_summary(&self, output: &PipelineOutput) -> String {
        let mut report = self.section("Summary");
        let graph = &output.graph;

        report.push_str(&format!(
            "  {} files | {} resources | {} edges | {} clusters\n",
            output.files.len(),
            graph.nodes.len(),
            graph.edges.len(),
            graph.clusters.len()
        ));

        let counts = output.diagnostic_counts();
        if counts.is_empty() {
            report.push_str("  no diagnostics\n");
        } else {
            let parts: Vec<String> = counts.iter().map(|(kind, n)| format!("{n} {kind}")).collect();
            let line = parts.join(" | ");
            if self.use_colors {
                report.push_str(&format!("  {}\n", line.yellow()));
            } else {
                report.push_str(&format!("  {line}\n"));
            }
        }

        report
    }

    fn format_complexity(&self, output: &PipelineOutput) -> String {
        let mut report = self.section("Complexity");
        let c = &output.complexity;

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Metric", "Value"]);
        table.add_row(vec![Cell::new("Nodes"), Cell::new(c.node_count)]);
        table.add_row(vec![Cell::new("Edges"), Cell::new(c.edge_count)]);
        table.add_row(vec![Cell::new("Avg edges per node"), Cell::new(format!("{:.2}", c.avg_edges_per_node))]);
        table.add_row(vec![Cell::new("Clusters"), Cell::new(c.cluster_count)]);
        table.add_row(vec![Cell::new("Max cluster depth"), Cell::new(c.max_cluster_depth)]);
        table.add_row(vec![Cell::new("Max label length"), Cell::new(c.max_label_length)]);
        table.add_row(vec![Cell::new("Providers"), Cell::new(c.provider_count)]);

        let score = format!("{:.3}", c.overall_score);
        let score_cell = if !self.use_colors {
            Cell::new(score)
        } else if c.overall_score >= 0.7 {
            Cell::new(score).fg(Color::Red)
        } else if c.overall_score >= 0.4 {
            Cell::new(score).fg(Color::Yellow)
        } else {
            Cell::new(score).fg(Color::Green)
        };
        table.add_row(vec![Cell::new("Overall score"), score_cell]);

        report.push_str(&table.to_string());
        report.push('\n');
        report
    }

    fn format_layout(&self, output: &PipelineOutput) -> String {
        let mut report = self.section("Layout");
        let layout = &output.graph.layout;

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Parameter", "Value"]);

        let direction = match &layout.direction_scores {
            Some(scores) => format!(
                "{} (auto: horizontal {:.3}, vertical {:.3})",
                layout.direction, scores.horizontal, scores.vertical
            ),
            None => layout.direction.to_string(),
        };
        table.add_row(vec![Cell::new("Direction"), Cell::new(direction)]);
        table.add_row(vec![Cell::new("Pad"), Cell::new(layout.pad)]);
        table.add_row(vec![Cell::new("Node separation"), Cell::new(layout.node_separation)]);
        table.add_row(vec![Cell::new("Rank separation"), Cell::new(layout.rank_separation)]);

        let mut styled = std::collections::BTreeMap::new();
        for edge in &output.graph.edges {
            *styled.entry(edge.style_hint).or_insert(0usize) += 1;
        }
        for (hint, count) in styled {
            table.add_row(vec![Cell::new(format!("Edges: {hint}")), Cell::new(count)]);
        }

        report.push_str(&table.to_string());
        report.push('\n');
        report
    }

    fn format_clusters(&self, output: &PipelineOutput) -> String {
        let mut report = self.section("Clusters");

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Kind", "Cluster", "Parent", "Members"]);
        for cluster in &output.graph.clusters {
            table.add_row(vec![
                Cell::new(cluster.kind),
                Cell::new(&cluster.label),
                Cell::new(cluster.parent.as_deref().unwrap_or("-")),
                Cell::new(cluster.member_ids.len()),
            ]);
        }

        report.push_str(&table.to_string());
        report.push('\n');
        report
    }

    fn format_diagnostics(&self, output: &PipelineOutput) -> String {
        let mut report = self.section("Diagnostics");

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Kind", "Message"]);
        for diagnostic in &output.diagnostics {
            let kind = Cell::new(diagnostic.kind());
            let kind = match (self.use_colors, diagnostic) {
                (false, _) => kind,
                (true, Diagnostic::ParseError { .. }) => kind.fg(Color::Red),
                (true, _) => kind.fg(Color::Yellow),
            };
            table.add_row(vec![kind, Cell::new(truncate(&diagnostic.to_string(), MAX_MESSAGE_LEN))]);
        }

        report.push_str(&table.to_string());
        report.push('\n');
        report
    }

    fn format_footer(&self, output: &PipelineOutput) -> String {
        let status = if output.has_diagnostics() {
            if self.use_colors {
                "COMPLETED with diagnostics".yellow().to_string()
            } else {
                "COMPLETED with diagnostics".to_string()
            }
        } else if self.use_colors {
            "COMPLETED".green().bold().to_string()
        } else {
            "COMPLETED".to_string()
        };

        format!("\n{status}\n\n")
    }
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
