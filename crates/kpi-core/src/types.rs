use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Commit and line counts between a release and its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleaseMetrics {
    pub commits: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// A semantic-version tag found in a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    pub date: NaiveDate,
    /// `None` for the newest release: nothing newer exists to diff against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ReleaseMetrics>,
    /// Commit timestamps attributed to this release. For the newest release
    /// these are the unreleased commits made after the tag.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commit_dates: Vec<DateTime<Utc>>,
}

impl Release {
    pub fn is_latest(&self) -> bool {
        self.metrics.is_none()
    }
}

/// Per-service snapshot produced by the collector for one reporting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub total_commits: u64,
    pub total_lines_added: u64,
    pub total_lines_removed: u64,
    pub net_change: i64,
    pub release_count: u64,
    #[serde(default)]
    pub releases: Vec<Release>,
}

impl ServiceRecord {
    pub fn new(
        name: impl Into<String>,
        total_commits: u64,
        total_lines_added: u64,
        total_lines_removed: u64,
        release_count: u64,
    ) -> Self {
        Self {
            name: name.into(),
            total_commits,
            total_lines_added,
            total_lines_removed,
            net_change: total_lines_added as i64 - total_lines_removed as i64,
            release_count,
            releases: Vec::new(),
        }
    }

    pub fn with_releases(mut self, releases: Vec<Release>) -> Self {
        self.releases = releases;
        self
    }

    /// True if the service saw any commits or line changes.
    pub fn has_activity(&self) -> bool {
        self.total_commits > 0 || self.total_lines_added > 0 || self.total_lines_removed > 0
    }
}

/// Aggregate totals across every reported service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportTotals {
    pub total_releases: u64,
    pub total_commits: u64,
    pub total_lines_added: u64,
    pub total_lines_removed: u64,
    pub period_display: String,
}

impl ReportTotals {
    pub fn from_records(records: &[ServiceRecord], period_display: impl Into<String>) -> Self {
        Self {
            total_releases: records.iter().map(|r| r.release_count).sum(),
            total_commits: records.iter().map(|r| r.total_commits).sum(),
            total_lines_added: records.iter().map(|r| r.total_lines_added).sum(),
            total_lines_removed: records.iter().map(|r| r.total_lines_removed).sum(),
            period_display: period_display.into(),
        }
    }

    pub fn net_change(&self) -> i64 {
        self.total_lines_added as i64 - self.total_lines_removed as i64
    }
}
