//! Executive summary generation.
//!
//! A rule-based pipeline over one run's service records:
//!
//! 1. [`distribution`] aggregates commits into category and layer buckets.
//! 2. [`classify`] derives velocity, churn, growth and concentration signals.
//! 3. [`select`] picks 1-3 focuses and up to 5 highlights.
//! 4. [`compose`] turns everything into paired observation/balance text.
//!
//! The pipeline is a pure function of its inputs; the same records and
//! catalog always produce the same [`NarrativeSummary`].

pub mod classify;
pub mod compose;
pub mod distribution;
pub mod select;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{LayerDefinition, ServiceMetadata};
use crate::types::{ReportTotals, ServiceRecord};

pub use classify::{ConcentrationRisk, GrowthType, ReleasePattern, VelocityMetrics, WorkType};
pub use distribution::{CategoryDistribution, CategoryStats, LayerDistribution, LayerStats};
pub use select::{Focus, FocusLevel, Highlight};

/// The configuration lookups the narrative engine depends on.
pub trait NarrativeCatalog {
    fn service_metadata(&self, service: &str) -> Option<&ServiceMetadata>;

    fn tag_description(&self, tag: &str) -> Option<&str>;

    /// Valid categories in declaration order. Breaks ties between
    /// categories with equal activity.
    fn category_priority(&self) -> &[String];

    /// Layers in matching order.
    fn service_layers(&self) -> &[LayerDefinition];
}

/// An observation paired with a constructive counterweight.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NarrativePoint {
    pub observation: String,
    pub balance_point: String,
}

impl NarrativePoint {
    pub fn new(observation: impl Into<String>, balance_point: impl Into<String>) -> Self {
        Self {
            observation: observation.into(),
            balance_point: balance_point.into(),
        }
    }
}

/// Overall characterization of the reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodCharacter {
    Maintenance,
    FocusedGrowth,
    BroadExpansion,
    Optimization,
    SteadyDevelopment,
}

impl PeriodCharacter {
    pub fn label(&self) -> &'static str {
        match self {
            PeriodCharacter::Maintenance => "Maintenance Period",
            PeriodCharacter::FocusedGrowth => "Focused Growth Period",
            PeriodCharacter::BroadExpansion => "Broad Expansion Period",
            PeriodCharacter::Optimization => "Optimization Period",
            PeriodCharacter::SteadyDevelopment => "Steady Development Period",
        }
    }
}

impl fmt::Display for PeriodCharacter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Final narrative handed to the report renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSummary {
    pub has_summary: bool,
    pub period_summary: PeriodCharacter,
    pub activity_breakdown: NarrativePoint,
    pub development_focus: Vec<NarrativePoint>,
    pub technical_highlights: Vec<Highlight>,
    pub development_velocity: Vec<NarrativePoint>,
    pub recommendations: Vec<String>,
    /// Static notes; only the maintenance summary carries any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub period_notes: Vec<String>,
}

impl NarrativeSummary {
    /// Fixed summary for a period without commits.
    pub fn minimal(period_display: &str) -> Self {
        Self {
            has_summary: true,
            period_summary: PeriodCharacter::Maintenance,
            activity_breakdown: NarrativePoint::new(
                format!(
                    "No significant development activity was recorded during {period_display}, \
                     suggesting reduced development intensity or team focus elsewhere."
                ),
                "This period showed minimal code changes, which may indicate planning phases, \
                 resource allocation to other initiatives, or preparation for upcoming \
                 development cycles.",
            ),
            development_focus: Vec::new(),
            technical_highlights: Vec::new(),
            development_velocity: Vec::new(),
            recommendations: Vec::new(),
            period_notes: vec![
                "Limited development activity across all services".to_string(),
                "Period may represent planning or stabilization phase".to_string(),
                "No measurable velocity metrics available for this period.".to_string(),
            ],
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.period_summary == PeriodCharacter::Maintenance
    }
}

/// Build the executive summary for one reporting run.
///
/// An empty record list or zero total commits short-circuits to
/// [`NarrativeSummary::minimal`] without running the analysis.
pub fn generate_executive_summary<C: NarrativeCatalog + ?Sized>(
    records: &[ServiceRecord],
    totals: &ReportTotals,
    catalog: &C,
) -> NarrativeSummary {
    if records.is_empty() || totals.total_commits == 0 {
        return NarrativeSummary::minimal(&totals.period_display);
    }

    let categories = distribution::analyze_categories(records, catalog);
    let layers = distribution::analyze_layers(records, catalog);
    let velocity = VelocityMetrics::from_totals(totals);
    let concentration = ConcentrationRisk::detect(records);

    let focuses = select::identify_focuses(&categories, &layers, records, catalog);
    let highlights = select::select_highlights(records, &velocity, catalog);

    compose::compose(
        compose::NarrativeInputs {
            totals,
            categories: &categories,
            velocity: &velocity,
            concentration: &concentration,
            focuses: &focuses,
            highlights,
        },
        catalog,
    )
}
