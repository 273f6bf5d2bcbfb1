//! Velocity, churn, growth and concentration classification.

use serde::{Deserialize, Serialize};

use crate::format::{percentage, round1};
use crate::types::{ReportTotals, ServiceRecord};

/// Share of commits above which one service counts as a concentration risk.
pub const CONCENTRATION_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    NewFeatures,
    Mixed,
    Refactoring,
}

impl WorkType {
    /// `< 15` new features, `> 40` refactoring, anything between is mixed.
    pub fn classify(churn_rate: f64) -> Self {
        if churn_rate < 15.0 {
            WorkType::NewFeatures
        } else if churn_rate > 40.0 {
            WorkType::Refactoring
        } else {
            WorkType::Mixed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkType::NewFeatures => "new features",
            WorkType::Mixed => "mixed",
            WorkType::Refactoring => "refactoring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthType {
    Expansion,
    Growth,
    Consolidation,
    Maintenance,
}

impl GrowthType {
    pub fn classify(net_change: i64) -> Self {
        if net_change > 1000 {
            GrowthType::Expansion
        } else if net_change > 0 {
            GrowthType::Growth
        } else if net_change < -1000 {
            GrowthType::Consolidation
        } else {
            GrowthType::Maintenance
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePattern {
    Major,
    Moderate,
    Incremental,
}

impl ReleasePattern {
    pub fn classify(avg_commits_per_release: f64) -> Self {
        if avg_commits_per_release < 1.5 {
            ReleasePattern::Major
        } else if avg_commits_per_release < 3.0 {
            ReleasePattern::Moderate
        } else {
            ReleasePattern::Incremental
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReleasePattern::Major => "Major",
            ReleasePattern::Moderate => "Moderate",
            ReleasePattern::Incremental => "Incremental",
        }
    }
}

/// Period-wide productivity figures. Ratios are stored rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityMetrics {
    pub avg_commits_per_release: f64,
    pub avg_lines_per_commit: f64,
    pub churn_rate: f64,
    pub net_change: i64,
    pub work_type: WorkType,
    pub growth_type: GrowthType,
    /// `None` when the period contains no releases.
    pub release_pattern: Option<ReleasePattern>,
}

impl VelocityMetrics {
    pub fn from_totals(totals: &ReportTotals) -> Self {
        let net_change = totals.net_change();

        let avg_commits_per_release = if totals.total_releases > 0 {
            totals.total_commits as f64 / totals.total_releases as f64
        } else {
            0.0
        };
        let avg_lines_per_commit = if totals.total_commits > 0 {
            (totals.total_lines_added + totals.total_lines_removed) as f64
                / totals.total_commits as f64
        } else {
            0.0
        };
        let churn_rate = percentage(totals.total_lines_removed, totals.total_lines_added);

        Self {
            avg_commits_per_release: round1(avg_commits_per_release),
            avg_lines_per_commit: round1(avg_lines_per_commit),
            churn_rate: round1(churn_rate),
            net_change,
            work_type: WorkType::classify(churn_rate),
            growth_type: GrowthType::classify(net_change),
            release_pattern: (totals.total_releases > 0)
                .then(|| ReleasePattern::classify(avg_commits_per_release)),
        }
    }
}

/// How much of the period's work rests on a single service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationRisk {
    pub top_service: Option<String>,
    pub concentration_percentage: f64,
    pub has_concentration: bool,
    pub dormant_count: usize,
    pub dormant_percentage: f64,
    pub total_services: usize,
}

impl ConcentrationRisk {
    pub fn detect(records: &[ServiceRecord]) -> Self {
        let total_commits: u64 = records.iter().map(|r| r.total_commits).sum();

        let mut top: Option<&ServiceRecord> = None;
        for record in records {
            if record.total_commits > top.map_or(0, |t| t.total_commits) {
                top = Some(record);
            }
        }
        let top_commits = top.map_or(0, |t| t.total_commits);
        let concentration_percentage = percentage(top_commits, total_commits);

        let dormant_count = records.iter().filter(|r| r.total_commits == 0).count();
        let total_services = records.len();

        Self {
            top_service: top.map(|t| t.name.clone()),
            concentration_percentage,
            has_concentration: concentration_percentage > CONCENTRATION_THRESHOLD,
            dormant_count,
            dormant_percentage: percentage(dormant_count as u64, total_services as u64),
            total_services,
        }
    }
}
