//! Turns classified data into paired observation/balance-point text.

use super::classify::{ConcentrationRisk, GrowthType, VelocityMetrics, WorkType};
use super::distribution::CategoryDistribution;
use super::select::{Focus, FocusLevel, Highlight};
use super::{NarrativeCatalog, NarrativePoint, NarrativeSummary, PeriodCharacter};
use crate::format::{signed_thousands, thousands};
use crate::types::ReportTotals;

pub const MAX_RECOMMENDATIONS: usize = 3;

const DORMANT_RECOMMENDATION_THRESHOLD: f64 = 60.0;
const LOW_CHURN_RECOMMENDATION_THRESHOLD: f64 = 10.0;

/// Everything the composer needs from the earlier stages.
pub struct NarrativeInputs<'a> {
    pub totals: &'a ReportTotals,
    pub categories: &'a CategoryDistribution,
    pub velocity: &'a VelocityMetrics,
    pub concentration: &'a ConcentrationRisk,
    pub focuses: &'a [Focus],
    pub highlights: Vec<Highlight>,
}

pub fn compose<C: NarrativeCatalog + ?Sized>(
    inputs: NarrativeInputs<'_>,
    catalog: &C,
) -> NarrativeSummary {
    NarrativeSummary {
        has_summary: true,
        period_summary: period_character(inputs.velocity, inputs.categories),
        activity_breakdown: activity_breakdown(
            &inputs.totals.period_display,
            inputs.categories,
            inputs.concentration,
        ),
        development_focus: inputs
            .focuses
            .iter()
            .map(|focus| focus_point(focus, catalog))
            .collect(),
        technical_highlights: inputs.highlights,
        development_velocity: velocity_breakdown(inputs.velocity, inputs.totals),
        recommendations: recommendations(inputs.concentration, inputs.velocity),
        period_notes: Vec::new(),
    }
}

pub fn period_character(
    velocity: &VelocityMetrics,
    categories: &CategoryDistribution,
) -> PeriodCharacter {
    match velocity.growth_type {
        GrowthType::Expansion if categories.active_category_count() == 1 => {
            PeriodCharacter::FocusedGrowth
        }
        GrowthType::Expansion => PeriodCharacter::BroadExpansion,
        GrowthType::Consolidation => PeriodCharacter::Optimization,
        GrowthType::Growth | GrowthType::Maintenance => PeriodCharacter::SteadyDevelopment,
    }
}

pub fn activity_breakdown(
    period_display: &str,
    categories: &CategoryDistribution,
    concentration: &ConcentrationRisk,
) -> NarrativePoint {
    let Some(top) = categories.top() else {
        // Every active service lacks category metadata.
        return NarrativePoint::new(
            format!(
                "During {period_display}, development activity was recorded in services \
                 without category metadata."
            ),
            "Adding category and tag metadata for these services would enable focus and \
             distribution analysis.",
        );
    };

    let observation = format!(
        "During {period_display}, development concentrated on {} ({:.1}% of commits), with {} \
         active service(s) delivering {} commits and {} lines added.",
        top.name,
        top.percentage,
        top.services.len(),
        categories.total_commits,
        thousands(categories.total_lines_added)
    );

    let balance_point = if concentration.dormant_count > 0 {
        format!(
            "While this focus strengthens {} capabilities, {} service(s) ({:.0}% of portfolio) \
             remained inactive, presenting an opportunity to address maintenance needs in \
             future sprints.",
            top.name, concentration.dormant_count, concentration.dormant_percentage
        )
    } else {
        "This concentrated effort enables deep expertise development, though distributing work \
         across more services could build broader team knowledge."
            .to_string()
    };

    NarrativePoint::new(observation, balance_point)
}

pub fn focus_point<C: NarrativeCatalog + ?Sized>(focus: &Focus, catalog: &C) -> NarrativePoint {
    let described: Vec<&str> = focus
        .tags
        .iter()
        .take(2)
        .map(|tag| catalog.tag_description(tag).unwrap_or(tag))
        .collect();
    let subject = if described.is_empty() {
        "core development".to_string()
    } else {
        described.join(", ")
    };

    let observation = format!(
        "{} investment in {} ({:.1}% of activity) focusing on {} with {}",
        focus.level, focus.category, focus.percentage, focus.layer, subject
    );

    let balance_point = match focus.level {
        FocusLevel::Primary => format!(
            "This concentration enables rapid {} improvements. However, limited activity in \
             other areas may benefit from increased allocation for balanced portfolio \
             development",
            focus.layer.to_lowercase()
        ),
        FocusLevel::Secondary => "Secondary focus provides diversification. Consider \
                                  opportunities to strengthen this area with dedicated sprint \
                                  allocation"
            .to_string(),
        FocusLevel::Tertiary => "Tertiary focus indicates emerging priority. Monitor for \
                                 potential escalation needs in upcoming planning cycles"
            .to_string(),
    };

    NarrativePoint::new(observation, balance_point)
}

/// Commit rate, code growth and churn, plus release cadence when the
/// period has releases.
pub fn velocity_breakdown(velocity: &VelocityMetrics, totals: &ReportTotals) -> Vec<NarrativePoint> {
    let mut points = Vec::with_capacity(4);

    let continuous = velocity.avg_commits_per_release < 2.0;
    points.push(NarrativePoint::new(
        format!(
            "Commit Rate: {} commits across {} releases ({:.1}:1 ratio) shows {}",
            totals.total_commits,
            totals.total_releases,
            velocity.avg_commits_per_release,
            if continuous { "continuous delivery" } else { "batched development" }
        ),
        if continuous {
            "Frequent releases demonstrate agility; consider batch strategies for integration \
             testing"
        } else {
            "Batched releases enable thorough testing; monitor for delivery delays"
        },
    ));

    let substantial = velocity.avg_lines_per_commit > 100.0;
    points.push(NarrativePoint::new(
        format!(
            "Code Growth: {} net lines ({:.0} lines/commit) indicates {} feature development",
            signed_thousands(velocity.net_change),
            velocity.avg_lines_per_commit,
            if substantial { "substantial" } else { "incremental" }
        ),
        if substantial {
            "High growth rate shows productivity; 15-20% refactoring allocation recommended"
        } else {
            "Incremental changes enable stable evolution; monitor velocity for capacity signals"
        },
    ));

    points.push(NarrativePoint::new(
        format!(
            "Code Churn: {:.1}% modification rate indicates {} development focus",
            velocity.churn_rate,
            velocity.work_type.label()
        ),
        match velocity.work_type {
            WorkType::NewFeatures => {
                "New feature focus is positive; technical debt reduction opportunities exist"
            }
            WorkType::Refactoring => {
                "Refactoring investment strengthens foundation; monitor for feature delivery \
                 balance"
            }
            WorkType::Mixed => {
                "Balanced approach between features and refactoring maintains sustainable \
                 velocity"
            }
        },
    ));

    if let Some(pattern) = velocity.release_pattern {
        points.push(NarrativePoint::new(
            format!(
                "Release Cadence: {} release pattern maintained throughout period",
                pattern.label()
            ),
            "Consistent pace is sustainable; monitor for velocity degradation signals",
        ));
    }

    points
}

pub fn recommendations(concentration: &ConcentrationRisk, velocity: &VelocityMetrics) -> Vec<String> {
    let mut out = Vec::new();

    if concentration.has_concentration {
        out.push(
            "Consider distributing development efforts across additional services to build \
             team-wide knowledge and reduce dependency on single components"
                .to_string(),
        );
    }
    if concentration.dormant_percentage > DORMANT_RECOMMENDATION_THRESHOLD {
        out.push(
            "Opportunity to schedule maintenance sprints for inactive services to address \
             technical debt and dependency updates"
                .to_string(),
        );
    }
    if velocity.churn_rate < LOW_CHURN_RECOMMENDATION_THRESHOLD {
        out.push(
            "Consider allocating 15-20% of capacity to refactoring efforts for long-term \
             maintainability and architectural improvements"
                .to_string(),
        );
    }

    out.truncate(MAX_RECOMMENDATIONS);
    out
}
