use colored::Colorize;

use kpi_core::format::{signed_thousands, thousands};
use kpi_core::narrative::NarrativePoint;
use kpi_core::{NarrativeSummary, Release, ReportData, ServiceRecord};

/// Releases listed per project before the rest are summarized.
pub const MAX_LISTED_RELEASES: usize = 10;

/// Format a full KPI report for terminal output.
pub fn format_report(data: &ReportData) -> String {
    let mut out = String::new();

    // Header
    out.push_str(&format!(
        "\n{}\n",
        format!("KPI Report - {}", data.period_display).bold()
    ));
    out.push_str(&format!("{}\n", "=".repeat(40)));
    out.push_str(&format!(
        "Generated {}\n\n",
        data.generated_at.format("%Y-%m-%d %H:%M")
    ));

    // Totals
    let totals = &data.totals;
    out.push_str(&format!("{}\n{}\n", "Totals".bold(), "-".repeat(40)));
    out.push_str(&format!("  Projects:    {}\n", data.projects.len()));
    out.push_str(&format!("  Releases:    {}\n", thousands(totals.total_releases)));
    out.push_str(&format!("  Commits:     {}\n", thousands(totals.total_commits)));
    out.push_str(&format!(
        "  Lines:       {} / {}\n",
        format!("+{}", thousands(totals.total_lines_added)).green(),
        format!("-{}", thousands(totals.total_lines_removed)).red(),
    ));
    out.push_str(&format!(
        "  Net change:  {}\n",
        signed_thousands(totals.net_change())
    ));

    // Projects
    if !data.projects.is_empty() {
        out.push_str(&format!("\n{}\n{}\n", "Projects".bold(), "-".repeat(40)));
        for project in &data.projects {
            out.push_str(&format_project(project));
        }
    }

    if !data.excluded_projects.is_empty() {
        out.push_str(&format!(
            "\n{} {}\n",
            "Excluded (no activity):".dimmed(),
            data.excluded_projects.join(", ")
        ));
    }

    out.push_str(&format_summary(&data.executive_summary));
    out
}

fn format_project(project: &ServiceRecord) -> String {
    let mut out = format!(
        "\n{}  {} commits, {} releases, +{} / -{} lines\n",
        project.name.cyan().bold(),
        thousands(project.total_commits),
        project.release_count,
        thousands(project.total_lines_added),
        thousands(project.total_lines_removed),
    );

    for release in project.releases.iter().take(MAX_LISTED_RELEASES) {
        out.push_str(&format_release(release));
    }
    if project.releases.len() > MAX_LISTED_RELEASES {
        out.push_str(&format!(
            "  ... and {} more releases\n",
            project.releases.len() - MAX_LISTED_RELEASES
        ));
    }
    out
}

fn format_release(release: &Release) -> String {
    let date = release.date.format("%Y-%m-%d");
    match &release.metrics {
        None => format!(
            "  {:<12} {date} {}\n",
            release.version,
            "(latest)".green()
        ),
        Some(m) => format!(
            "  {:<12} {date} → {} commits (+{} / -{} lines)\n",
            release.version,
            m.commits,
            thousands(m.lines_added),
            thousands(m.lines_removed),
        ),
    }
}

fn format_point(point: &NarrativePoint) -> String {
    format!(
        "  {}\n    {}\n",
        point.observation,
        point.balance_point.dimmed()
    )
}

fn format_summary(summary: &NarrativeSummary) -> String {
    let mut out = format!(
        "\n{} - {}\n{}\n",
        "Executive Summary".bold(),
        summary.period_summary.label().yellow().bold(),
        "-".repeat(40)
    );
    out.push_str(&format_point(&summary.activity_breakdown));

    if !summary.development_focus.is_empty() {
        out.push_str(&format!("\n{}\n", "Development Focus".bold()));
        for point in &summary.development_focus {
            out.push_str(&format_point(point));
        }
    }

    if !summary.technical_highlights.is_empty() {
        out.push_str(&format!("\n{}\n", "Technical Highlights".bold()));
        for h in &summary.technical_highlights {
            out.push_str(&format!(
                "  {} {}\n  {} {}\n",
                "+".green().bold(),
                h.positive,
                "!".yellow().bold(),
                h.cautionary
            ));
        }
    }

    if !summary.development_velocity.is_empty() {
        out.push_str(&format!("\n{}\n", "Development Velocity".bold()));
        for point in &summary.development_velocity {
            out.push_str(&format_point(point));
        }
    }

    if !summary.recommendations.is_empty() {
        out.push_str(&format!("\n{}\n", "Recommendations".bold()));
        for (i, rec) in summary.recommendations.iter().enumerate() {
            out.push_str(&format!("  {}. {rec}\n", i + 1));
        }
    }

    if !summary.period_notes.is_empty() {
        out.push_str(&format!("\n{}\n", "Notes".bold()));
        for note in &summary.period_notes {
            out.push_str(&format!("  - {note}\n"));
        }
    }

    out
}
