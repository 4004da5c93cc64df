//! Markdown and JSON rendering.
//!
//! This module renders report summaries, full reports, report diffs and
//! component details for the command line.

use crate::analysis::{group_by_application, ItemFailure};
use crate::models::{ComponentDetail, PolicyReportComponent, Report, ReportDiff, ReportInfo};
use serde::Serialize;

/// Render any model as pretty-printed JSON.
pub fn generate_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Render a list of report summaries, grouped by application.
pub fn generate_infos_markdown(infos: &[ReportInfo], failures: &[ItemFailure]) -> String {
    let mut output = String::new();

    output.push_str("# Report Summaries\n\n");

    if infos.is_empty() {
        output.push_str("No reports are retained for this selection.\n\n");
    }

    for (application_id, app_infos) in group_by_application(infos) {
        output.push_str(&format!("## Application `{}`\n\n", application_id));
        output.push_str("| Stage | Report | Evaluated | HTML |\n");
        output.push_str("|:---|:---|:---|:---|\n");
        for info in app_infos {
            output.push_str(&format!(
                "| {} | `{}` | {} | {} |\n",
                info.stage,
                info.report_id(),
                info.evaluation_date,
                info.report_html_url
            ));
        }
        output.push('\n');
    }

    output.push_str(&generate_failures_section(failures));
    output.push_str(&generate_footer());
    output
}

/// Render one full report.
pub fn generate_report_markdown(report: &Report) -> String {
    let mut output = String::new();

    let title = if report.policy.report_title.is_empty() {
        report.policy.application.name.as_str()
    } else {
        report.policy.report_title.as_str()
    };
    output.push_str(&format!("# Report: {}\n\n", title));
    output.push_str(&generate_metadata_section(report.info()));

    output.push_str("## Summary\n\n");
    output.push_str("| Components | Known | Policy Components | Open Violations |\n");
    output.push_str("|:---:|:---:|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        report.raw.match_summary.total_component_count,
        report.raw.match_summary.known_component_count,
        report.policy.components.len(),
        report.open_violation_count()
    ));

    output.push_str("## Policy Violations\n\n");
    let violating: Vec<_> = report
        .policy
        .components
        .iter()
        .filter(|c| !c.violations.is_empty())
        .collect();
    if violating.is_empty() {
        output.push_str("No policy violations.\n\n");
    }
    for component in violating {
        output.push_str(&generate_component_block(component));
    }

    output.push_str(&generate_footer());
    output
}

/// Render several reports one after another.
pub fn generate_reports_markdown(reports: &[Report], failures: &[ItemFailure]) -> String {
    let mut output = String::new();

    output.push_str("# Reports\n\n");
    output.push_str("| Application | Stage | Report | Components | Open Violations |\n");
    output.push_str("|:---|:---|:---|:---:|:---:|\n");
    for report in reports {
        let info = report.info();
        output.push_str(&format!(
            "| {} | {} | `{}` | {} | {} |\n",
            report.policy.application.public_id,
            info.stage,
            info.report_id(),
            report.raw.components.len(),
            report.open_violation_count()
        ));
    }
    output.push('\n');

    output.push_str(&generate_failures_section(failures));
    output.push_str(&generate_footer());
    output
}

/// Render the differences between two reports.
pub fn generate_diff_markdown(diff: &ReportDiff) -> String {
    let mut output = String::new();

    output.push_str("# Report Diff\n\n");

    output.push_str("| | Report | Stage | Evaluated | Policy Components |\n");
    output.push_str("|:---|:---|:---|:---|:---:|\n");
    for (label, report) in [("Earlier", diff.earlier()), ("Later", diff.later())] {
        let info = report.info();
        output.push_str(&format!(
            "| {} | `{}` | {} | {} | {} |\n",
            label,
            info.report_id(),
            info.stage,
            info.evaluation_date,
            report.policy.components.len()
        ));
    }
    output.push('\n');

    output.push_str(&format!("## Fixed ({})\n\n", diff.fixed.len()));
    if diff.fixed.is_empty() {
        output.push_str("Nothing was fixed between these reports.\n\n");
    }
    for component in &diff.fixed {
        output.push_str(&generate_component_block(component));
    }

    output.push_str(&format!("## Waived ({})\n\n", diff.waived.len()));
    if diff.waived.is_empty() {
        output.push_str("No violations were waived between these reports.\n\n");
    }
    for component in &diff.waived {
        output.push_str(&generate_component_block(component));
    }

    output.push_str(&generate_footer());
    output
}

/// Render component details.
pub fn generate_components_markdown(details: &[ComponentDetail], failures: &[ItemFailure]) -> String {
    let mut output = String::new();

    output.push_str("# Components\n\n");
    output.push_str("| Component | Match | Licenses | Security Issues |\n");
    output.push_str("|:---|:---|:---|:---:|\n");
    for detail in details {
        let licenses: Vec<_> = detail
            .license_data
            .declared_licenses
            .iter()
            .map(|l| l.license_id.as_str())
            .collect();
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            detail.component.label(),
            detail.match_state,
            licenses.join(", "),
            detail.security_data.security_issues.len()
        ));
    }
    output.push('\n');

    output.push_str(&generate_failures_section(failures));
    output.push_str(&generate_footer());
    output
}

fn generate_metadata_section(info: &ReportInfo) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Report:** `{}`\n", info.report_id()));
    section.push_str(&format!("- **Stage:** {}\n", info.stage));
    if !info.evaluation_date.is_empty() {
        section.push_str(&format!("- **Evaluated:** {}\n", info.evaluation_date));
    }
    if !info.report_html_url.is_empty() {
        section.push_str(&format!("- **HTML:** {}\n", info.report_html_url));
    }
    section.push('\n');

    section
}

fn generate_component_block(component: &PolicyReportComponent) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} (`{}`)\n\n",
        component.component.label(),
        component.hash()
    ));

    // Highest threat first
    let mut violations = component.violations.clone();
    violations.sort_by(|a, b| b.policy_threat_level.cmp(&a.policy_threat_level));

    for v in &violations {
        let mut flags = Vec::new();
        if v.waived {
            flags.push("waived");
        }
        if v.grandfathered {
            flags.push("grandfathered");
        }
        block.push_str(&format!(
            "- **{}** [{} {}]{}\n",
            if v.policy_name.is_empty() {
                &v.policy_id
            } else {
                &v.policy_name
            },
            v.policy_threat_category,
            v.policy_threat_level,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" _{}_", flags.join(", "))
            }
        ));
        for condition in v.constraints.iter().flat_map(|c| &c.conditions) {
            block.push_str(&format!("  - {}\n", condition.condition_summary));
        }
    }
    block.push('\n');

    block
}

fn generate_failures_section(failures: &[ItemFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str(&format!("## Incomplete ({} sources failed)\n\n", failures.len()));
    for failure in failures {
        section.push_str(&format!("- {}\n", failure));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Generated by iqreport*\n".to_string()
}
