//! HTML reporter with embedded styles and charts
//!
//! Generates a standalone HTML report that can be viewed in any browser.
//! Includes:
//! - Period totals as metric cards
//! - Executive summary callouts
//! - Inline SVG charts for activity, code volume and per-service output
//! - Release tables per project

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use kpi_core::format::{signed_thousands, thousands};
use kpi_core::narrative::NarrativePoint;
use kpi_core::{NarrativeSummary, ReportData, ServiceRecord};

use crate::chart::{self, ProjectMetric};
use crate::text::MAX_LISTED_RELEASES;

/// Render report as standalone HTML
pub fn render(data: &ReportData) -> Result<String> {
    let mut html = String::new();

    html.push_str(&render_head(data));
    html.push_str("<body>\n<div class=\"container\">\n");
    html.push_str(&render_header(data));

    html.push_str("<div class=\"content\">\n");
    html.push_str(&render_metrics(data));
    html.push_str(&render_summary(&data.executive_summary));
    html.push_str(&render_charts(data));
    html.push_str(&render_projects(data));
    html.push_str("</div>\n"); // content

    html.push_str(&render_footer());
    html.push_str("</div>\n</body>\n</html>\n");

    Ok(html)
}

/// File name for a report covering `data.period`.
pub fn report_file_name(data: &ReportData) -> String {
    format!("kpi-report-{}.html", data.period_slug())
}

/// Render and write the report into `dir`, creating it if needed.
pub fn write_report(data: &ReportData, dir: &Path) -> Result<PathBuf> {
    let html = render(data)?;
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let path = dir.join(report_file_name(data));
    fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote HTML report");
    Ok(path)
}

fn render_head(data: &ReportData) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>KPI Report - {}</title>
    <style>
{CSS}
    </style>
</head>
"#,
        html_escape(&data.period_display)
    )
}

fn render_header(data: &ReportData) -> String {
    format!(
        r#"<div class="header">
    <h1>Release KPI Report</h1>
    <p class="period">{}</p>
    <p class="timestamp">Generated {}</p>
</div>
"#,
        html_escape(&data.period_display),
        data.generated_at.format("%Y-%m-%d %H:%M")
    )
}

fn render_metrics(data: &ReportData) -> String {
    let totals = &data.totals;
    let net = totals.net_change();
    let net_class = if net < 0 { "negative" } else { "positive" };

    format!(
        r#"<div class="section">
    <div class="metrics-grid">
        <div class="metric-card"><h3>Projects</h3><div class="metric-value">{}</div></div>
        <div class="metric-card"><h3>Releases</h3><div class="metric-value">{}</div></div>
        <div class="metric-card"><h3>Commits</h3><div class="metric-value">{}</div></div>
        <div class="metric-card"><h3>Lines Added</h3><div class="metric-value positive">+{}</div></div>
        <div class="metric-card"><h3>Lines Removed</h3><div class="metric-value negative">-{}</div></div>
        <div class="metric-card"><h3>Net Change</h3><div class="metric-value {net_class}">{}</div></div>
    </div>
</div>
"#,
        data.projects.len(),
        thousands(totals.total_releases),
        thousands(totals.total_commits),
        thousands(totals.total_lines_added),
        thousands(totals.total_lines_removed),
        signed_thousands(net),
    )
}

fn render_point(point: &NarrativePoint) -> String {
    format!(
        r#"<div class="callout">
    <p class="observation">{}</p>
    <p class="balance">{}</p>
</div>
"#,
        html_escape(&point.observation),
        html_escape(&point.balance_point)
    )
}

fn render_points(title: &str, points: &[NarrativePoint]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut html = format!("<h3>{title}</h3>\n");
    for point in points {
        html.push_str(&render_point(point));
    }
    html
}

fn render_list(title: &str, items: &[String], tag: &str) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut html = format!("<h3>{title}</h3>\n<{tag}>\n");
    for item in items {
        html.push_str(&format!("    <li>{}</li>\n", html_escape(item)));
    }
    html.push_str(&format!("</{tag}>\n"));
    html
}

fn render_summary(summary: &NarrativeSummary) -> String {
    let mut html = format!(
        r#"<div class="section summary">
<h2 class="section-title">Executive Summary</h2>
<span class="period-badge">{}</span>
"#,
        summary.period_summary.label()
    );
    html.push_str(&render_point(&summary.activity_breakdown));
    html.push_str(&render_points("Development Focus", &summary.development_focus));

    if !summary.technical_highlights.is_empty() {
        html.push_str("<h3>Technical Highlights</h3>\n");
        for h in &summary.technical_highlights {
            html.push_str(&format!(
                r#"<div class="highlight">
    <p class="positive">{}</p>
    <p class="cautionary">{}</p>
</div>
"#,
                html_escape(&h.positive),
                html_escape(&h.cautionary)
            ));
        }
    }

    html.push_str(&render_points("Development Velocity", &summary.development_velocity));
    html.push_str(&render_list("Recommendations", &summary.recommendations, "ol"));
    html.push_str(&render_list("Notes", &summary.period_notes, "ul"));
    html.push_str("</div>\n");
    html
}

fn render_charts(data: &ReportData) -> String {
    if data.projects.is_empty() {
        return String::new();
    }

    let mut charts = vec![
        chart::release_activity(&data.totals),
        chart::code_volume(&data.totals),
    ];
    for metric in [
        ProjectMetric::Commits,
        ProjectMetric::LinesAdded,
        ProjectMetric::NetChange,
    ] {
        charts.push(chart::project_breakdown(&data.projects, metric));
    }
    charts.extend(chart::release_timeline(&data.projects));
    charts.extend(chart::commit_timeline(&data.projects));

    let mut html = String::from(
        "<div class=\"section\">\n<h2 class=\"section-title\">Charts</h2>\n<div class=\"charts-grid\">\n",
    );
    for svg in charts {
        html.push_str("<div class=\"chart-card\">\n");
        html.push_str(&svg);
        html.push_str("</div>\n");
    }
    html.push_str("</div>\n</div>\n");
    html
}

fn render_projects(data: &ReportData) -> String {
    let mut html = String::from("<div class=\"section\">\n<h2 class=\"section-title\">Projects</h2>\n");
    if data.projects.is_empty() {
        html.push_str("<p class=\"empty\">No project activity in this period.</p>\n");
    }
    for project in &data.projects {
        html.push_str(&render_project(project));
    }
    if !data.excluded_projects.is_empty() {
        html.push_str(&format!(
            "<p class=\"excluded\">Excluded (no activity): {}</p>\n",
            html_escape(&data.excluded_projects.join(", "))
        ));
    }
    html.push_str("</div>\n");
    html
}

fn render_project(project: &ServiceRecord) -> String {
    let mut html = format!(
        r#"<div class="project">
<h3>{}</h3>
<p class="project-stats">{} releases, {} commits, <span class="positive">+{}</span> / <span class="negative">-{}</span> lines</p>
"#,
        html_escape(&project.name),
        project.release_count,
        thousands(project.total_commits),
        thousands(project.total_lines_added),
        thousands(project.total_lines_removed),
    );

    if !project.releases.is_empty() {
        html.push_str(
            "<table>\n<thead><tr><th>Version</th><th>Date</th><th>Commits</th><th>Added</th><th>Removed</th></tr></thead>\n<tbody>\n",
        );
        for release in project.releases.iter().take(MAX_LISTED_RELEASES) {
            let row = match &release.metrics {
                None => format!(
                    "<tr class=\"latest\"><td>{}</td><td>{}</td><td colspan=\"3\">latest</td></tr>\n",
                    html_escape(&release.version),
                    release.date
                ),
                Some(m) => format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>+{}</td><td>-{}</td></tr>\n",
                    html_escape(&release.version),
                    release.date,
                    m.commits,
                    thousands(m.lines_added),
                    thousands(m.lines_removed),
                ),
            };
            html.push_str(&row);
        }
        html.push_str("</tbody>\n</table>\n");
        if project.releases.len() > MAX_LISTED_RELEASES {
            html.push_str(&format!(
                "<p class=\"more\">... and {} more releases</p>\n",
                project.releases.len() - MAX_LISTED_RELEASES
            ));
        }
    }

    html.push_str("</div>\n");
    html
}

fn render_footer() -> String {
    r#"<div class="footer">
    <p>Generated by kpi from git release tags</p>
</div>
"#
    .to_string()
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// Embedded CSS
const CSS: &str = r#"
:root {
    --primary-color: #2C3E50;
    --secondary-color: #3498DB;
    --success-color: #27AE60;
    --danger-color: #E74C3C;
    --warning-color: #F39C12;
    --background-color: #f4f6f8;
    --card-background: white;
    --border-color: #e2e8f0;
}

* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    line-height: 1.6;
    color: var(--primary-color);
    background: var(--background-color);
    padding: 2rem;
}

.container {
    max-width: 1200px;
    margin: 0 auto;
    background: var(--card-background);
    border-radius: 12px;
    box-shadow: 0 4px 6px -1px rgba(0,0,0,0.1);
    overflow: hidden;
}

.header {
    background: linear-gradient(135deg, #2C3E50 0%, #3498DB 100%);
    color: white;
    padding: 3rem 2rem;
    text-align: center;
}

.header h1 { font-size: 2.5rem; margin-bottom: 0.5rem; }
.header .period { font-size: 1.4rem; }
.header .timestamp { opacity: 0.9; font-size: 0.95rem; }

.content { padding: 2rem; }

.section { margin-bottom: 2.5rem; }
.section-title {
    font-size: 1.5rem;
    border-bottom: 2px solid var(--border-color);
    padding-bottom: 0.5rem;
    margin-bottom: 1rem;
}
.section h3 { margin: 1.25rem 0 0.5rem; }

.metrics-grid {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
    gap: 1rem;
}

.metric-card {
    background: #f8fafc;
    border: 1px solid var(--border-color);
    border-radius: 8px;
    padding: 1rem;
    text-align: center;
}
.metric-card h3 { font-size: 0.85rem; text-transform: uppercase; opacity: 0.7; margin: 0; }
.metric-value { font-size: 1.8rem; font-weight: 700; }

.positive { color: var(--success-color); }
.negative { color: var(--danger-color); }

.period-badge {
    display: inline-block;
    background: var(--secondary-color);
    color: white;
    border-radius: 999px;
    padding: 0.2rem 0.9rem;
    font-weight: 600;
    margin-bottom: 1rem;
}

.callout {
    border-left: 4px solid var(--secondary-color);
    background: #f8fafc;
    padding: 0.75rem 1rem;
    margin-bottom: 0.75rem;
}
.callout .balance { font-style: italic; opacity: 0.8; margin-top: 0.25rem; }

.highlight {
    border-left: 4px solid var(--success-color);
    padding: 0.75rem 1rem;
    margin-bottom: 0.75rem;
    background: #f6fbf7;
}
.highlight .positive { color: var(--primary-color); font-weight: 600; }
.highlight .cautionary { color: #8a5a00; margin-top: 0.25rem; }

.summary ol, .summary ul { padding-left: 1.5rem; }

.charts-grid {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(480px, 1fr));
    gap: 1.5rem;
}
.chart-card {
    border: 1px solid var(--border-color);
    border-radius: 8px;
    padding: 0.5rem;
}
.chart { width: 100%; height: auto; }
.chart-title { font-size: 16px; font-weight: 600; fill: var(--primary-color); }
.chart-label { font-size: 11px; fill: #555; }
.chart-value { font-size: 11px; font-weight: 600; fill: var(--primary-color); }

.project { margin-bottom: 1.5rem; }
.project-stats { opacity: 0.85; margin-bottom: 0.5rem; }

table { width: 100%; border-collapse: collapse; font-size: 0.9rem; }
th, td { text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid var(--border-color); }
th { background: #f1f5f9; }
tr.latest td { font-weight: 600; color: var(--secondary-color); }

.more, .excluded, .empty { opacity: 0.7; font-style: italic; margin-top: 0.5rem; }

.footer {
    text-align: center;
    padding: 1.5rem;
    background: #f1f5f9;
    font-size: 0.85rem;
    opacity: 0.8;
}

@media (max-width: 640px) {
    body { padding: 0.5rem; }
    .charts-grid { grid-template-columns: 1fr; }
}
"#;
