use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::narrative::{generate_executive_summary, NarrativeCatalog, NarrativeSummary};
use crate::period::Period;
use crate::types::{ReportTotals, ServiceRecord};

/// Everything a renderer needs for one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub period: Period,
    pub period_display: String,
    pub generated_at: NaiveDateTime,
    pub totals: ReportTotals,
    /// Projects with activity in the period, in configured order.
    pub projects: Vec<ServiceRecord>,
    /// Projects dropped because they had no commits or line changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_projects: Vec<String>,
    pub executive_summary: NarrativeSummary,
}

impl ReportData {
    /// Drop inactive projects, sum totals and generate the executive summary.
    pub fn prepare<C: NarrativeCatalog + ?Sized>(
        records: Vec<ServiceRecord>,
        period: Period,
        catalog: &C,
        generated_at: NaiveDateTime,
    ) -> Self {
        let (projects, inactive): (Vec<ServiceRecord>, Vec<ServiceRecord>) =
            records.into_iter().partition(ServiceRecord::has_activity);
        let excluded_projects: Vec<String> = inactive.into_iter().map(|r| r.name).collect();

        if !excluded_projects.is_empty() {
            tracing::info!(
                excluded = %excluded_projects.join(", "),
                active = projects.len(),
                "excluded projects with no activity"
            );
        }

        let period_display = period.display_name();
        let totals = ReportTotals::from_records(&projects, period_display.clone());
        let executive_summary = generate_executive_summary(&projects, &totals, catalog);

        Self {
            period,
            period_display,
            generated_at,
            totals,
            projects,
            excluded_projects,
            executive_summary,
        }
    }

    /// File-name-safe period slug, e.g. `2025-Q4`.
    pub fn period_slug(&self) -> String {
        self.period.to_string()
    }
}
