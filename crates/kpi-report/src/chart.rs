//! Inline SVG bar charts for the HTML report.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{NaiveDate, NaiveDateTime};

use kpi_core::format::thousands;
use kpi_core::period::month_start;
use kpi_core::{ReportTotals, ServiceRecord};

use crate::html::html_escape;

pub const PRIMARY: &str = "#2C3E50";
pub const SECONDARY: &str = "#3498DB";
pub const SUCCESS: &str = "#27AE60";
pub const DANGER: &str = "#E74C3C";
pub const PURPLE: &str = "#9B59B6";
const AXIS: &str = "#95a5a6";

const WIDTH: f64 = 640.0;
const TITLE_HEIGHT: f64 = 36.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: i64,
    pub color: &'static str,
}

impl Bar {
    pub fn new(label: impl Into<String>, value: i64, color: &'static str) -> Self {
        Self {
            label: label.into(),
            value,
            color,
        }
    }
}

fn format_value(value: i64) -> String {
    if value < 0 {
        format!("-{}", thousands(value.unsigned_abs()))
    } else {
        thousands(value as u64)
    }
}

/// Value range including zero, never empty.
fn value_span(bars: &[Bar]) -> (f64, f64) {
    let max = bars.iter().map(|b| b.value).max().unwrap_or(0).max(0) as f64;
    let min = bars.iter().map(|b| b.value).min().unwrap_or(0).min(0) as f64;
    if max - min == 0.0 {
        (min, min + 1.0)
    } else {
        (min, max)
    }
}

/// Column chart; negative values hang below the zero line.
pub fn vertical_bars(title: &str, bars: &[Bar]) -> String {
    let height = 280.0;
    let (left, right, bottom) = (40.0, 20.0, 40.0);
    let plot_top = TITLE_HEIGHT + 20.0;
    let plot_height = height - plot_top - bottom;
    let plot_width = WIDTH - left - right;

    let (min, max) = value_span(bars);
    let scale = plot_height / (max - min);
    let zero_y = plot_top + max * scale;
    let slot = plot_width / bars.len().max(1) as f64;
    let bar_width = (slot * 0.6).min(90.0);

    let mut svg = svg_open(height, title);
    for (i, bar) in bars.iter().enumerate() {
        let x = left + slot * i as f64 + (slot - bar_width) / 2.0;
        let h = (bar.value.unsigned_abs() as f64 * scale).max(if bar.value == 0 { 0.0 } else { 1.0 });
        let y = if bar.value >= 0 { zero_y - h } else { zero_y };
        let label_y = if bar.value >= 0 { y - 6.0 } else { y + h + 14.0 };
        let center = x + bar_width / 2.0;
        let _ = write!(
            svg,
            r#"<rect x="{x:.1}" y="{y:.1}" width="{bar_width:.1}" height="{h:.1}" fill="{}" opacity="0.85"/>
<text x="{center:.1}" y="{label_y:.1}" text-anchor="middle" class="chart-value">{}</text>
<text x="{center:.1}" y="{:.1}" text-anchor="middle" class="chart-label">{}</text>
"#,
            bar.color,
            format_value(bar.value),
            height - bottom / 2.0 + 4.0,
            html_escape(&bar.label)
        );
    }
    let _ = write!(
        svg,
        r#"<line x1="{left}" y1="{zero_y:.1}" x2="{:.1}" y2="{zero_y:.1}" stroke="{AXIS}" stroke-width="1"/>
"#,
        WIDTH - right
    );
    svg.push_str("</svg>\n");
    svg
}

/// Row chart sorted highest first; the top row is drawn in [`SUCCESS`].
pub fn horizontal_bars(title: &str, rows: &[(String, i64)]) -> String {
    let mut sorted: Vec<&(String, i64)> = rows.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    let row_height = 28.0;
    let (label_width, right) = (200.0, 80.0);
    let plot_top = TITLE_HEIGHT + 10.0;
    let height = plot_top + row_height * sorted.len().max(1) as f64 + 16.0;
    let plot_width = WIDTH - label_width - right;

    let bars: Vec<Bar> = sorted
        .iter()
        .map(|(label, value)| Bar::new(label.clone(), *value, SECONDARY))
        .collect();
    let (min, max) = value_span(&bars);
    let scale = plot_width / (max - min);
    let zero_x = label_width + (-min) * scale;

    let mut svg = svg_open(height, title);
    for (i, bar) in bars.iter().enumerate() {
        let color = if i == 0 { SUCCESS } else { bar.color };
        let y = plot_top + row_height * i as f64 + 4.0;
        let w = (bar.value.unsigned_abs() as f64 * scale).max(if bar.value == 0 { 0.0 } else { 1.0 });
        let x = if bar.value >= 0 { zero_x } else { zero_x - w };
        let value_x = if bar.value >= 0 { x + w + 6.0 } else { x - 6.0 };
        let anchor = if bar.value >= 0 { "start" } else { "end" };
        let text_y = y + row_height / 2.0 + 1.0;
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{text_y:.1}" text-anchor="end" class="chart-label">{}</text>
<rect x="{x:.1}" y="{y:.1}" width="{w:.1}" height="{:.1}" fill="{color}"/>
<text x="{value_x:.1}" y="{text_y:.1}" text-anchor="{anchor}" class="chart-value">{}</text>
"#,
            label_width - 8.0,
            html_escape(&bar.label),
            row_height - 8.0,
            format_value(bar.value)
        );
    }
    svg.push_str("</svg>\n");
    svg
}

fn svg_open(height: f64, title: &str) -> String {
    format!(
        r#"<svg class="chart" viewBox="0 0 {WIDTH} {height:.0}" xmlns="http://www.w3.org/2000/svg" role="img" aria-label="{title}">
<text x="{:.0}" y="24" text-anchor="middle" class="chart-title">{title}</text>
"#,
        WIDTH / 2.0,
        title = html_escape(title)
    )
}

pub fn release_activity(totals: &ReportTotals) -> String {
    vertical_bars(
        "Release Activity",
        &[
            Bar::new("Releases", totals.total_releases as i64, SECONDARY),
            Bar::new("Commits", totals.total_commits as i64, PRIMARY),
        ],
    )
}

pub fn code_volume(totals: &ReportTotals) -> String {
    vertical_bars(
        "Code Volume",
        &[
            Bar::new("Lines Added", totals.total_lines_added as i64, SUCCESS),
            Bar::new("Lines Removed", totals.total_lines_removed as i64, DANGER),
            Bar::new("Net Change", totals.net_change(), SECONDARY),
        ],
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectMetric {
    Commits,
    LinesAdded,
    NetChange,
}

impl ProjectMetric {
    pub fn label(&self) -> &'static str {
        match self {
            ProjectMetric::Commits => "Commits",
            ProjectMetric::LinesAdded => "Lines Added",
            ProjectMetric::NetChange => "Net Change",
        }
    }

    fn value(&self, record: &ServiceRecord) -> i64 {
        match self {
            ProjectMetric::Commits => record.total_commits as i64,
            ProjectMetric::LinesAdded => record.total_lines_added as i64,
            ProjectMetric::NetChange => record.net_change,
        }
    }
}

pub fn project_breakdown(projects: &[ServiceRecord], metric: ProjectMetric) -> String {
    let rows: Vec<(String, i64)> = projects
        .iter()
        .map(|p| (p.name.clone(), metric.value(p)))
        .collect();
    horizontal_bars(&format!("{} by Service", metric.label()), &rows)
}

/// Count dates per calendar month, oldest month first.
pub fn monthly_counts(dates: impl IntoIterator<Item = NaiveDate>) -> Vec<(NaiveDate, u64)> {
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for date in dates {
        *buckets.entry(month_start(date)).or_default() += 1;
    }
    buckets.into_iter().collect()
}

fn timeline(title: &str, buckets: &[(NaiveDate, u64)], color: &'static str) -> String {
    let bars: Vec<Bar> = buckets
        .iter()
        .map(|(month, count)| Bar::new(month.format("%b %Y").to_string(), *count as i64, color))
        .collect();
    vertical_bars(title, &bars)
}

/// Releases per month, or `None` when there are no releases.
pub fn release_timeline(projects: &[ServiceRecord]) -> Option<String> {
    let buckets = monthly_counts(projects.iter().flat_map(|p| p.releases.iter().map(|r| r.date)));
    (!buckets.is_empty()).then(|| timeline("Releases per Month", &buckets, SECONDARY))
}

/// Commit dates that fall between the earliest and latest release date.
pub fn commit_dates_in_release_window(projects: &[ServiceRecord]) -> Vec<NaiveDateTime> {
    let release_dates = projects.iter().flat_map(|p| p.releases.iter().map(|r| r.date));
    let (Some(earliest), Some(latest)) = (release_dates.clone().min(), release_dates.max()) else {
        return Vec::new();
    };
    let start = earliest.and_hms_opt(0, 0, 0);
    let end = latest.and_hms_opt(23, 59, 59);
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };

    projects
        .iter()
        .flat_map(|p| p.releases.iter())
        .flat_map(|r| r.commit_dates.iter())
        .map(|d| d.naive_utc())
        .filter(|d| start <= *d && *d <= end)
        .collect()
}

/// Commits per month, or `None` when no commit falls in the release window.
pub fn commit_timeline(projects: &[ServiceRecord]) -> Option<String> {
    let buckets = monthly_counts(
        commit_dates_in_release_window(projects)
            .into_iter()
            .map(|d| d.date()),
    );
    (!buckets.is_empty()).then(|| timeline("Commits per Month", &buckets, PURPLE))
}
