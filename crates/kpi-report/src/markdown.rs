use kpi_core::format::{signed_thousands, thousands};
use kpi_core::narrative::NarrativePoint;
use kpi_core::{NarrativeSummary, ReportData, ServiceRecord};

use crate::text::MAX_LISTED_RELEASES;

/// Format a full KPI report as Markdown.
pub fn format_report(data: &ReportData) -> String {
    let mut out = String::new();

    out.push_str(&format!("# KPI Report - {}\n\n", data.period_display));
    out.push_str(&format!(
        "_Generated {}_\n\n",
        data.generated_at.format("%Y-%m-%d %H:%M")
    ));

    // Totals
    let totals = &data.totals;
    out.push_str("## Totals\n\n");
    out.push_str("| Metric | Value |\n");
    out.push_str("|--------|-------|\n");
    out.push_str(&format!("| Projects | {} |\n", data.projects.len()));
    out.push_str(&format!("| Releases | {} |\n", thousands(totals.total_releases)));
    out.push_str(&format!("| Commits | {} |\n", thousands(totals.total_commits)));
    out.push_str(&format!(
        "| Lines Added | {} |\n",
        thousands(totals.total_lines_added)
    ));
    out.push_str(&format!(
        "| Lines Removed | {} |\n",
        thousands(totals.total_lines_removed)
    ));
    out.push_str(&format!(
        "| **Net Change** | **{}** |\n",
        signed_thousands(totals.net_change())
    ));

    out.push_str(&format_summary(&data.executive_summary));

    if !data.projects.is_empty() {
        out.push_str("\n## Projects\n\n");
        out.push_str("| Project | Releases | Commits | Added | Removed | Net |\n");
        out.push_str("|---------|----------|---------|-------|---------|-----|\n");
        for p in &data.projects {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                p.name,
                p.release_count,
                thousands(p.total_commits),
                thousands(p.total_lines_added),
                thousands(p.total_lines_removed),
                signed_thousands(p.net_change),
            ));
        }

        for p in &data.projects {
            out.push_str(&format_releases(p));
        }
    }

    if !data.excluded_projects.is_empty() {
        out.push_str(&format!(
            "\n> Excluded (no activity): {}\n",
            data.excluded_projects.join(", ")
        ));
    }

    out
}

fn format_releases(project: &ServiceRecord) -> String {
    if project.releases.is_empty() {
        return String::new();
    }

    let mut out = format!("\n### {}\n\n", project.name);
    out.push_str("| Version | Date | Commits | Added | Removed |\n");
    out.push_str("|---------|------|---------|-------|---------|\n");
    for release in project.releases.iter().take(MAX_LISTED_RELEASES) {
        match &release.metrics {
            None => out.push_str(&format!(
                "| **{}** | {} | _latest_ | | |\n",
                release.version, release.date
            )),
            Some(m) => out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                release.version,
                release.date,
                m.commits,
                thousands(m.lines_added),
                thousands(m.lines_removed),
            )),
        }
    }
    if project.releases.len() > MAX_LISTED_RELEASES {
        out.push_str(&format!(
            "\n_... and {} more releases_\n",
            project.releases.len() - MAX_LISTED_RELEASES
        ));
    }
    out
}

fn format_point(point: &NarrativePoint) -> String {
    format!("- {}\n  - _{}_\n", point.observation, point.balance_point)
}

fn format_summary(summary: &NarrativeSummary) -> String {
    let mut out = format!(
        "\n## Executive Summary: {}\n\n",
        summary.period_summary.label()
    );
    out.push_str(&format!(
        "{}\n\n_{}_\n",
        summary.activity_breakdown.observation, summary.activity_breakdown.balance_point
    ));

    if !summary.development_focus.is_empty() {
        out.push_str("\n### Development Focus\n\n");
        for point in &summary.development_focus {
            out.push_str(&format_point(point));
        }
    }

    if !summary.technical_highlights.is_empty() {
        out.push_str("\n### Technical Highlights\n\n");
        for h in &summary.technical_highlights {
            out.push_str(&format!("- **{}**\n  - {}\n", h.positive, h.cautionary));
        }
    }

    if !summary.development_velocity.is_empty() {
        out.push_str("\n### Development Velocity\n\n");
        for point in &summary.development_velocity {
            out.push_str(&format_point(point));
        }
    }

    if !summary.recommendations.is_empty() {
        out.push_str("\n### Recommendations\n\n");
        for (i, rec) in summary.recommendations.iter().enumerate() {
            out.push_str(&format!("{}. {rec}\n", i + 1));
        }
    }

    if !summary.period_notes.is_empty() {
        out.push_str("\n### Notes\n\n");
        for note in &summary.period_notes {
            out.push_str(&format!("- {note}\n"));
        }
    }

    out
}
