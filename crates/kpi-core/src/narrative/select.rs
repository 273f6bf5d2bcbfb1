//! Focus and highlight selection.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::classify::VelocityMetrics;
use super::distribution::{self, CategoryDistribution, LayerDistribution};
use super::NarrativeCatalog;
use crate::format::{percentage, signed_thousands, thousands};
use crate::types::ServiceRecord;

pub const MAX_HIGHLIGHTS: usize = 5;
pub const MAX_FOCUS_TAGS: usize = 3;
/// Minimum share, exclusive, for the second category to become a focus.
pub const SECONDARY_FOCUS_THRESHOLD: f64 = 10.0;
/// Minimum share, exclusive, for the third category to become a focus.
pub const TERTIARY_FOCUS_THRESHOLD: f64 = 5.0;

const GROWTH_RATE_THRESHOLD: f64 = 30.0;
const HIGH_OUTPUT_LINES_PER_COMMIT: f64 = 200.0;
const RELEASE_VELOCITY_RATIO: f64 = 3.0;
const LOW_CHURN_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusLevel {
    Primary,
    Secondary,
    Tertiary,
}

impl fmt::Display for FocusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FocusLevel::Primary => "Primary",
            FocusLevel::Secondary => "Secondary",
            FocusLevel::Tertiary => "Tertiary",
        };
        f.write_str(name)
    }
}

/// A category where development effort concentrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Focus {
    pub level: FocusLevel,
    pub category: String,
    pub percentage: f64,
    /// Display form, e.g. "Business Layer".
    pub layer: String,
    pub tags: Vec<String>,
}

/// A positive statement paired with its cautionary counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub positive: String,
    pub cautionary: String,
    /// The service this highlight is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Pick the primary focus and, when their shares clear the thresholds,
/// secondary and tertiary focuses.
pub fn identify_focuses<C: NarrativeCatalog + ?Sized>(
    categories: &CategoryDistribution,
    layers: &LayerDistribution,
    records: &[ServiceRecord],
    catalog: &C,
) -> Vec<Focus> {
    let mut focuses = Vec::with_capacity(3);

    let Some(top) = categories.top() else {
        return focuses;
    };
    focuses.push(Focus {
        level: FocusLevel::Primary,
        category: top.name.clone(),
        percentage: top.percentage,
        layer: layers.dominant_display(),
        tags: distribution::weighted_tags(
            records,
            &categories.top_names(3),
            catalog,
            MAX_FOCUS_TAGS,
        ),
    });

    let ranked = [
        (1, FocusLevel::Secondary, SECONDARY_FOCUS_THRESHOLD),
        (2, FocusLevel::Tertiary, TERTIARY_FOCUS_THRESHOLD),
    ];
    for (rank, level, threshold) in ranked {
        let Some(stats) = categories.get(rank) else {
            break;
        };
        if stats.percentage > threshold {
            focuses.push(Focus {
                level,
                category: stats.name.clone(),
                percentage: stats.percentage,
                layer: distribution::dominant_layer_for_category(records, &stats.name, catalog),
                tags: distribution::frequent_tags(records, &stats.name, catalog, MAX_FOCUS_TAGS),
            });
        }
    }

    focuses
}

/// Bounded highlight list that refuses to mention a service twice.
struct HighlightSet {
    items: Vec<Highlight>,
    used: HashSet<String>,
}

impl HighlightSet {
    fn new() -> Self {
        Self {
            items: Vec::with_capacity(MAX_HIGHLIGHTS),
            used: HashSet::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= MAX_HIGHLIGHTS
    }

    fn is_used(&self, service: &str) -> bool {
        self.used.contains(service)
    }

    fn push(&mut self, highlight: Highlight) {
        if self.is_full() {
            return;
        }
        if let Some(service) = &highlight.service {
            if !self.used.insert(service.clone()) {
                return;
            }
        }
        self.items.push(highlight);
    }
}

/// Generate up to [`MAX_HIGHLIGHTS`] highlights in fixed rule order.
pub fn select_highlights<C: NarrativeCatalog + ?Sized>(
    records: &[ServiceRecord],
    velocity: &VelocityMetrics,
    catalog: &C,
) -> Vec<Highlight> {
    let mut set = HighlightSet::new();
    let total_commits: u64 = records.iter().map(|r| r.total_commits).sum();

    if let Some(top) = top_performer(records) {
        let capability = catalog
            .service_metadata(&top.name)
            .and_then(|m| m.primary_tag())
            .unwrap_or("development");
        set.push(Highlight {
            positive: format!(
                "{} led with {} commits (+{} lines), demonstrating significant {} expansion",
                top.name,
                top.total_commits,
                thousands(top.total_lines_added),
                capability
            ),
            cautionary: format!(
                "This concentration ({:.1}% of activity) creates efficiency but presents an \
                 opportunity to distribute knowledge across the team to build redundancy",
                percentage(top.total_commits, total_commits)
            ),
            service: Some(top.name.clone()),
        });
    }

    if !set.is_full() {
        let fastest = records
            .iter()
            .filter(|r| !set.is_used(&r.name))
            .find_map(|r| {
                growth_rate(r)
                    .filter(|rate| *rate > GROWTH_RATE_THRESHOLD)
                    .map(|rate| (r, rate))
            });
        if let Some((record, rate)) = fastest {
            set.push(Highlight {
                positive: format!(
                    "{} saw fastest growth rate ({:.1}% increase in codebase size)",
                    record.name, rate
                ),
                cautionary: "Rapid expansion may benefit from refactoring allocation to maintain \
                             long-term code quality"
                    .to_string(),
                service: Some(record.name.clone()),
            });
        }
    }

    if velocity.avg_lines_per_commit > HIGH_OUTPUT_LINES_PER_COMMIT {
        set.push(Highlight {
            positive: format!(
                "High development output with {:.0} lines per commit indicates substantial \
                 feature development",
                velocity.avg_lines_per_commit
            ),
            cautionary: "Large commit sizes may benefit from breaking down changes for easier \
                         code review and reduced integration risk"
                .to_string(),
            service: None,
        });
    }

    if !set.is_full() {
        let mut leader: Option<(&ServiceRecord, f64)> = None;
        for record in records
            .iter()
            .filter(|r| r.release_count > 0 && !set.is_used(&r.name))
        {
            let ratio = record.total_commits as f64 / record.release_count as f64;
            if leader.map_or(true, |(_, best)| ratio > best) {
                leader = Some((record, ratio));
            }
        }
        if let Some((record, ratio)) = leader.filter(|(_, ratio)| *ratio > RELEASE_VELOCITY_RATIO) {
            set.push(Highlight {
                positive: format!(
                    "{} maintained high release velocity ({:.1} commits per release) \
                     demonstrating agile delivery",
                    record.name, ratio
                ),
                cautionary: "Frequent releases demonstrate agility; consider batch testing \
                             strategies for integration validation"
                    .to_string(),
                service: Some(record.name.clone()),
            });
        }
    }

    if velocity.churn_rate < LOW_CHURN_THRESHOLD {
        set.push(Highlight {
            positive: format!(
                "Low churn rate ({:.1}%) with substantial growth ({} lines) indicates stable \
                 feature addition",
                velocity.churn_rate,
                signed_thousands(velocity.net_change)
            ),
            cautionary: "Minimal refactoring presents an opportunity to allocate 15-20% capacity \
                         for technical debt reduction in future sprints"
                .to_string(),
            service: None,
        });
    }

    set.items
}

/// First service with the most commits, if any has commits at all.
fn top_performer(records: &[ServiceRecord]) -> Option<&ServiceRecord> {
    let mut top: Option<&ServiceRecord> = None;
    for record in records {
        if record.total_commits > top.map_or(0, |t| t.total_commits) {
            top = Some(record);
        }
    }
    top
}

/// Approximate growth: net change relative to an estimated prior size of
/// `lines_added - net_change`.
fn growth_rate(record: &ServiceRecord) -> Option<f64> {
    if record.total_lines_added == 0 || record.total_lines_removed == 0 {
        return None;
    }
    let previous_size = record.total_lines_added as i64 - record.net_change;
    if previous_size <= 0 {
        return None;
    }
    Some(record.net_change as f64 / previous_size as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{catalog, records, totals};
    use super::*;
    use crate::narrative::distribution::{analyze_categories, analyze_layers};
    use crate::types::ReportTotals;

    fn focuses_for(records: &[ServiceRecord]) -> Vec<Focus> {
        let catalog = catalog();
        let categories = analyze_categories(records, &catalog);
        let layers = analyze_layers(records, &catalog);
        identify_focuses(&categories, &layers, records, &catalog)
    }

    fn highlights_for(records: &[ServiceRecord]) -> Vec<Highlight> {
        let totals = ReportTotals::from_records(records, "All Time");
        let velocity = VelocityMetrics::from_totals(&totals);
        select_highlights(records, &velocity, &catalog())
    }

    #[test]
    fn test_primary_focus_only_when_second_share_small() {
        let focuses = focuses_for(&records());
        assert_eq!(focuses.len(), 1);

        let primary = &focuses[0];
        assert_eq!(primary.level, FocusLevel::Primary);
        assert_eq!(primary.category, "Core Infrastructure");
        assert_eq!(primary.percentage, 92.5);
        assert_eq!(primary.layer, "Presentation Layer");
        assert_eq!(primary.tags, vec!["API", "routing", "orchestration"]);
    }

    #[test]
    fn test_secondary_threshold_is_strict() {
        // Core 90, Domain 10: exactly 10.0% is not enough.
        let records = vec![
            ServiceRecord::new("api-gateway-service", 90, 100, 10, 1),
            ServiceRecord::new("payment-service", 10, 100, 10, 1),
        ];
        let focuses = focuses_for(&records);
        assert_eq!(focuses.len(), 1);

        let records = vec![
            ServiceRecord::new("api-gateway-service", 89, 100, 10, 1),
            ServiceRecord::new("payment-service", 11, 100, 10, 1),
        ];
        let focuses = focuses_for(&records);
        assert_eq!(focuses.len(), 2);
        assert_eq!(focuses[1].level, FocusLevel::Secondary);
        assert_eq!(focuses[1].category, "Domain Services");
        assert_eq!(focuses[1].layer, "Presentation Layer");
        assert_eq!(
            focuses[1].tags,
            vec!["transaction_processing", "domain_logic", "API"]
        );
    }

    #[test]
    fn test_tertiary_threshold_is_strict() {
        // 80 / 15 / 5: third share is exactly 5.0%.
        let records = vec![
            ServiceRecord::new("api-gateway-service", 80, 100, 10, 1),
            ServiceRecord::new("payment-service", 15, 100, 10, 1),
            ServiceRecord::new("non-api-service", 5, 100, 10, 1),
        ];
        let focuses = focuses_for(&records);
        assert_eq!(focuses.len(), 2);

        let records = vec![
            ServiceRecord::new("api-gateway-service", 79, 100, 10, 1),
            ServiceRecord::new("payment-service", 15, 100, 10, 1),
            ServiceRecord::new("non-api-service", 6, 100, 10, 1),
        ];
        let focuses = focuses_for(&records);
        assert_eq!(focuses.len(), 3);
        assert_eq!(focuses[2].level, FocusLevel::Tertiary);
        assert_eq!(focuses[2].category, "Supporting Services");
        assert_eq!(focuses[2].layer, "Infrastructure Layer");
        assert_eq!(focuses[2].tags, vec!["logging", "monitoring"]);
    }

    #[test]
    fn test_tertiary_without_secondary() {
        // Second is 8% (no secondary) but third is 6% (tertiary).
        let records = vec![
            ServiceRecord::new("api-gateway-service", 86, 100, 10, 1),
            ServiceRecord::new("payment-service", 8, 100, 10, 1),
            ServiceRecord::new("non-api-service", 6, 100, 10, 1),
        ];
        let levels: Vec<FocusLevel> = focuses_for(&records).iter().map(|f| f.level).collect();
        assert_eq!(levels, vec![FocusLevel::Primary, FocusLevel::Tertiary]);
    }

    #[test]
    fn test_no_focus_without_categories() {
        let records = vec![ServiceRecord::new("unknown-service", 5, 10, 0, 1)];
        assert!(focuses_for(&records).is_empty());
    }

    #[test]
    fn test_sample_highlights() {
        let catalog = catalog();
        let velocity = VelocityMetrics::from_totals(&totals());
        let highlights = select_highlights(&records(), &velocity, &catalog);

        assert_eq!(highlights.len(), 3);
        assert_eq!(
            highlights[0].positive,
            "api-gateway-service led with 28 commits (+3,540 lines), demonstrating \
             significant API expansion"
        );
        assert!(highlights[0].cautionary.starts_with("This concentration (70.0% of activity)"));
        assert_eq!(highlights[0].service.as_deref(), Some("api-gateway-service"));

        assert_eq!(
            highlights[1].positive,
            "user-service saw fastest growth rate (726.7% increase in codebase size)"
        );
        assert!(highlights[2].positive.starts_with("Low churn rate (6.5%) with substantial growth (+4,789 lines)"));
        assert_eq!(highlights[2].service, None);
    }

    #[test]
    fn test_highlights_never_repeat_a_service() {
        // "solo" tops commits, grows fast and has the best release ratio.
        let records = vec![
            ServiceRecord::new("solo", 50, 5000, 500, 2),
            ServiceRecord::new("other", 10, 100, 90, 1),
        ];
        let highlights = highlights_for(&records);
        let services: Vec<&str> = highlights.iter().filter_map(|h| h.service.as_deref()).collect();
        let unique: HashSet<&str> = services.iter().copied().collect();
        assert_eq!(services.len(), unique.len());
        assert_eq!(services[0], "solo");
        // "other" grows 10/90 = 11%, below the growth threshold, but leads
        // the remaining release ratios at 10 commits per release.
        assert!(highlights
            .iter()
            .any(|h| h.positive.starts_with("other maintained high release velocity (10.0")));
    }

    #[test]
    fn test_highlights_capped_at_five() {
        let records = vec![
            ServiceRecord::new("big", 100, 40_000, 1000, 5),
            ServiceRecord::new("grower", 20, 2000, 100, 1),
            ServiceRecord::new("shipper", 40, 1000, 50, 2),
        ];
        let highlights = highlights_for(&records);
        assert!(highlights.len() <= MAX_HIGHLIGHTS);
        assert_eq!(highlights.len(), 5);
        assert!(highlights[2].positive.starts_with("High development output"));
        assert!(highlights[3].positive.starts_with("shipper maintained high release velocity"));
        assert!(highlights[4].positive.starts_with("Low churn rate"));
    }

    #[test]
    fn test_top_performer_tie_keeps_first() {
        let records = vec![
            ServiceRecord::new("first", 10, 100, 10, 1),
            ServiceRecord::new("second", 10, 100, 10, 1),
        ];
        let highlights = highlights_for(&records);
        assert_eq!(highlights[0].service.as_deref(), Some("first"));
        assert!(highlights[0].positive.starts_with("first led with 10 commits"));
    }

    fn velocity_highlights(highlights: &[Highlight]) -> Vec<&Highlight> {
        highlights
            .iter()
            .filter(|h| h.positive.contains("maintained high release velocity"))
            .collect()
    }

    #[test]
    fn test_release_velocity_tie_keeps_first() {
        // "lead" takes the top performer slot; no removals, so no growth rule.
        let records = vec![
            ServiceRecord::new("lead", 30, 300, 0, 30),
            ServiceRecord::new("alpha", 12, 120, 0, 3),
            ServiceRecord::new("beta", 8, 80, 0, 2),
        ];
        let highlights = highlights_for(&records);
        let velocity = velocity_highlights(&highlights);
        assert_eq!(velocity.len(), 1);
        assert_eq!(velocity[0].service.as_deref(), Some("alpha"));
        assert!(velocity[0]
            .positive
            .starts_with("alpha maintained high release velocity (4.0 commits per release)"));
    }

    #[test]
    fn test_release_velocity_ratio_is_strict() {
        let records = vec![
            ServiceRecord::new("lead", 30, 300, 0, 30),
            ServiceRecord::new("steady", 9, 90, 0, 3),
        ];
        let highlights = highlights_for(&records);
        assert!(velocity_highlights(&highlights).is_empty());
    }

    #[test]
    fn test_growth_rate_requires_removals_and_positive_base() {
        assert_eq!(growth_rate(&ServiceRecord::new("a", 1, 100, 0, 1)), None);
        assert_eq!(growth_rate(&ServiceRecord::new("a", 1, 0, 10, 1)), None);
        let rate = growth_rate(&ServiceRecord::new("a", 1, 1240, 150, 1)).unwrap();
        assert!((rate - 726.666).abs() < 0.01);
    }

    #[test]
    fn test_no_top_performer_without_commits() {
        let records = vec![ServiceRecord::new("idle", 0, 0, 0, 1)];
        assert!(top_performer(&records).is_none());
    }

    #[test]
    fn test_capability_defaults_to_development() {
        let records = vec![ServiceRecord::new("unknown-service", 5, 10, 0, 1)];
        let highlights = highlights_for(&records);
        assert!(highlights[0].positive.ends_with("significant development expansion"));
    }
}
