//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! plan summaries and run reports in text or JSON.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{CommandKind, LoadedPlan, OutputType};
use crate::engine::RunReport;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Deployment row for plan summaries.
#[derive(Tabled)]
struct PlanDeploymentRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Template")]
    input_template: String,
    #[tabled(rename = "Output")]
    output_name: String,
    #[tabled(rename = "Type")]
    output_type: String,
    #[tabled(rename = "Execute")]
    executes: usize,
    #[tabled(rename = "Download")]
    downloads: usize,
}

/// Deployment row for run reports.
#[derive(Tabled)]
struct RunDeploymentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "VM")]
    vm_name: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "Type")]
    output_type: String,
    #[tabled(rename = "Commands")]
    commands_run: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a loaded plan for display.
    #[must_use]
    pub fn format_plan_summary(&self, loaded: &LoadedPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(loaded)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_summary_text(loaded),
        }
    }

    fn format_plan_summary_text(loaded: &LoadedPlan) -> String {
        let plan = &loaded.plan;
        let mut output = String::new();

        let _ = writeln!(output, "\nPlan: {} (version {})", plan.label.bold(), plan.version);
        let _ = writeln!(output, "   File: {}", loaded.path.display());
        let _ = write!(output, "   Digest: {}\n\n", loaded.digest.short());

        if plan.deployments.is_empty() {
            let _ = writeln!(output, "{} Plan has no deployments", "!".yellow());
            return output;
        }

        let rows: Vec<PlanDeploymentRow> = plan
            .deployments
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let count = |kind: CommandKind| d.task.commands.iter().filter(|c| c.kind == kind).count();
                PlanDeploymentRow {
                    index: i + 1,
                    name: Self::truncate(&d.name, 32),
                    input_template: d.task.input_template.clone(),
                    output_name: d.task.output_name.clone(),
                    output_type: Self::format_output_type(d.task.output_type),
                    executes: count(CommandKind::Execute),
                    downloads: count(CommandKind::Download),
                }
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = writeln!(
            output,
            "\n{} deployments, {} commands, {} templates",
            plan.deployments.len().to_string().green(),
            plan.total_commands().to_string().green(),
            plan.template_count().to_string().cyan()
        );

        output
    }

    /// Formats a run report for display.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "\n{} Plan '{}' completed in {}s",
            "✓".green(),
            report.label,
            report.duration_secs()
        );
        let _ = writeln!(output, "   Run: {}", report.run_id);
        if let Some(digest) = &report.plan_digest {
            let _ = writeln!(output, "   Digest: {digest}");
        }
        output.push('\n');

        let rows: Vec<RunDeploymentRow> = report
            .deployments
            .iter()
            .map(|d| RunDeploymentRow {
                name: Self::truncate(&d.name, 32),
                vm_name: d.vm_name.clone(),
                ip: d.ip.clone(),
                output_type: Self::format_output_type(d.output_type),
                commands_run: d.commands_run,
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        output
    }

    fn format_output_type(output_type: OutputType) -> String {
        match output_type {
            OutputType::Vm => "vm".normal().to_string(),
            OutputType::Template => "template".cyan().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    label: String,
    version: String,
    path: String,
    digest: String,
    deployments: usize,
    commands: usize,
    templates: usize,
}

impl From<&LoadedPlan> for PlanJson {
    fn from(loaded: &LoadedPlan) -> Self {
        Self {
            label: loaded.plan.label.clone(),
            version: loaded.plan.version.clone(),
            path: loaded.path.display().to_string(),
            digest: loaded.digest.to_string(),
            deployments: loaded.plan.deployments.len(),
            commands: loaded.plan.total_commands(),
            templates: loaded.plan.template_count(),
        }
    }
}
