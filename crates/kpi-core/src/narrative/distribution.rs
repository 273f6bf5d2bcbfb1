//! Category and layer aggregation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::NarrativeCatalog;
use crate::config::LayerDefinition;
use crate::format::{percentage, round1, title_case};
use crate::types::ServiceRecord;

/// Display name used when no layer received any commits.
pub const UNKNOWN_LAYER: &str = "Unknown Layer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub name: String,
    pub commits: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    /// Member services in input order.
    pub services: Vec<String>,
    /// Share of total commits, rounded to one decimal.
    pub percentage: f64,
}

/// Categories ordered by commits, highest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryDistribution {
    pub categories: Vec<CategoryStats>,
    /// Commits across services with metadata.
    pub total_commits: u64,
    pub total_lines_added: u64,
    pub total_lines_removed: u64,
}

impl CategoryDistribution {
    pub fn top(&self) -> Option<&CategoryStats> {
        self.categories.first()
    }

    pub fn get(&self, rank: usize) -> Option<&CategoryStats> {
        self.categories.get(rank)
    }

    pub fn active_category_count(&self) -> usize {
        self.categories.iter().filter(|c| c.commits > 0).count()
    }

    /// Names of the `n` highest ranked categories.
    pub fn top_names(&self, n: usize) -> Vec<&str> {
        self.categories.iter().take(n).map(|c| c.name.as_str()).collect()
    }
}

/// Aggregate commits and lines per category.
///
/// Services without metadata are skipped. Equal commit counts keep the
/// configured priority order; categories missing from the priority list
/// follow in first-encounter order.
pub fn analyze_categories<C: NarrativeCatalog + ?Sized>(
    records: &[ServiceRecord],
    catalog: &C,
) -> CategoryDistribution {
    let mut categories: Vec<CategoryStats> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut dist = CategoryDistribution::default();

    for record in records {
        let Some(meta) = catalog.service_metadata(&record.name) else {
            tracing::debug!(service = %record.name, "no metadata, skipped from category analysis");
            continue;
        };

        let slot = *index.entry(meta.category.clone()).or_insert_with(|| {
            categories.push(CategoryStats {
                name: meta.category.clone(),
                commits: 0,
                lines_added: 0,
                lines_removed: 0,
                services: Vec::new(),
                percentage: 0.0,
            });
            categories.len() - 1
        });

        let stats = &mut categories[slot];
        stats.commits += record.total_commits;
        stats.lines_added += record.total_lines_added;
        stats.lines_removed += record.total_lines_removed;
        stats.services.push(record.name.clone());

        dist.total_commits += record.total_commits;
        dist.total_lines_added += record.total_lines_added;
        dist.total_lines_removed += record.total_lines_removed;
    }

    for stats in &mut categories {
        stats.percentage = round1(percentage(stats.commits, dist.total_commits));
    }

    let priority = catalog.category_priority();
    let rank = |name: &str| priority.iter().position(|p| p == name).unwrap_or(usize::MAX);

    // Encounter order is the last key, so the sort is fully deterministic.
    let mut ordered: Vec<(usize, CategoryStats)> = categories.into_iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        b.commits
            .cmp(&a.commits)
            .then_with(|| rank(&a.name).cmp(&rank(&b.name)))
            .then_with(|| ia.cmp(ib))
    });
    dist.categories = ordered.into_iter().map(|(_, stats)| stats).collect();
    dist
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub commits: u64,
    pub percentage: f64,
}

/// Commits per layer in declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerDistribution {
    pub layers: Vec<LayerStats>,
    pub total_commits: u64,
}

impl LayerDistribution {
    /// Layer with the most commits; the first declared wins ties.
    /// `None` when no layer has commits.
    pub fn dominant(&self) -> Option<&LayerStats> {
        first_max(self.layers.iter().map(|l| (l, l.commits)))
    }

    /// Display form of [`dominant`](Self::dominant), e.g. "Data Layer".
    pub fn dominant_display(&self) -> String {
        self.dominant()
            .map(|l| title_case(&l.name))
            .unwrap_or_else(|| UNKNOWN_LAYER.to_string())
    }
}

/// The first layer, in declaration order, sharing a tag with `tags`.
pub fn assign_layer<'a>(tags: &[String], layers: &'a [LayerDefinition]) -> Option<&'a LayerDefinition> {
    layers.iter().find(|layer| layer.matches(tags))
}

/// Aggregate commits per layer across every service with metadata.
pub fn analyze_layers<C: NarrativeCatalog + ?Sized>(
    records: &[ServiceRecord],
    catalog: &C,
) -> LayerDistribution {
    let definitions = catalog.service_layers();
    let total_commits: u64 = records.iter().map(|r| r.total_commits).sum();
    let mut commits = vec![0u64; definitions.len()];

    for record in records {
        let Some(meta) = catalog.service_metadata(&record.name) else {
            continue;
        };
        if let Some(pos) = definitions.iter().position(|layer| layer.matches(&meta.tags)) {
            commits[pos] += record.total_commits;
        }
    }

    LayerDistribution {
        layers: definitions
            .iter()
            .zip(commits)
            .map(|(layer, commits)| LayerStats {
                name: layer.name.clone(),
                commits,
                percentage: round1(percentage(commits, total_commits)),
            })
            .collect(),
        total_commits,
    }
}

/// Dominant layer among the active services of one category, in display form.
pub fn dominant_layer_for_category<C: NarrativeCatalog + ?Sized>(
    records: &[ServiceRecord],
    category: &str,
    catalog: &C,
) -> String {
    let definitions = catalog.service_layers();
    let mut commits = vec![0u64; definitions.len()];

    for record in records.iter().filter(|r| r.total_commits > 0) {
        let Some(meta) = catalog.service_metadata(&record.name) else {
            continue;
        };
        if meta.category != category {
            continue;
        }
        if let Some(pos) = definitions.iter().position(|layer| layer.matches(&meta.tags)) {
            commits[pos] += record.total_commits;
        }
    }

    first_max(definitions.iter().zip(commits))
        .map(|layer| title_case(&layer.name))
        .unwrap_or_else(|| UNKNOWN_LAYER.to_string())
}

/// Top `n` tags weighted by commits over services in `categories`.
pub fn weighted_tags<C: NarrativeCatalog + ?Sized>(
    records: &[ServiceRecord],
    categories: &[&str],
    catalog: &C,
    n: usize,
) -> Vec<String> {
    let mut tally = TagTally::default();
    for record in records {
        let Some(meta) = catalog.service_metadata(&record.name) else {
            continue;
        };
        if categories.contains(&meta.category.as_str()) {
            for tag in &meta.tags {
                tally.add(tag, record.total_commits);
            }
        }
    }
    tally.top(n)
}

/// Top `n` tags by how many active services in `category` carry them.
pub fn frequent_tags<C: NarrativeCatalog + ?Sized>(
    records: &[ServiceRecord],
    category: &str,
    catalog: &C,
    n: usize,
) -> Vec<String> {
    let mut tally = TagTally::default();
    for record in records.iter().filter(|r| r.total_commits > 0) {
        let Some(meta) = catalog.service_metadata(&record.name) else {
            continue;
        };
        if meta.category == category {
            for tag in &meta.tags {
                tally.add(tag, 1);
            }
        }
    }
    tally.top(n)
}

/// Counts that remember first-seen order for tie-breaking.
#[derive(Default)]
struct TagTally {
    counts: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl TagTally {
    fn add(&mut self, tag: &str, weight: u64) {
        match self.index.get(tag) {
            Some(&i) => self.counts[i].1 += weight,
            None => {
                self.index.insert(tag.to_string(), self.counts.len());
                self.counts.push((tag.to_string(), weight));
            }
        }
    }

    fn top(mut self, n: usize) -> Vec<String> {
        // Stable sort keeps first-seen order among equal counts.
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts.into_iter().take(n).map(|(tag, _)| tag).collect()
    }
}

/// First item with the strictly highest positive weight.
fn first_max<T>(items: impl Iterator<Item = (T, u64)>) -> Option<T> {
    let mut best: Option<(T, u64)> = None;
    for (item, weight) in items {
        if weight == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |(_, top)| weight > *top) {
            best = Some((item, weight));
        }
    }
    best.map(|(item, _)| item)
}
