//! Recommendation Engine: "consolidate before expanding"
//!
//! The item pool is partitioned into an ordered list of groups (strings of a
//! fretboard, interval families, chord qualities...). Given the learner's
//! progress, this module decides which groups to highlight:
//!
//!   1. Groups with any seen item are *started*; the rest are *unstarted*.
//!   2. Each started group's *work remaining* is the median `1 − automaticity`
//!      over its seen items. Groups above the median of those values are
//!      recommended for consolidation.
//!   3. The *consolidation ratio* is the share of all seen items at or above
//!      the automaticity threshold. Once it reaches `expansion_threshold`, the
//!      next unstarted group (in sequence order) is recommended as well.
//!   4. If no group is strictly above the median (a single started group, or
//!      every group tied) and the ratio is still below `expansion_threshold`,
//!      the started groups with the most work remaining are consolidated, so
//!      a struggling learner always gets something highlighted.
//!
//! New material is therefore only introduced once the active material is
//! mostly fluent, and always in a predictable order.
//!
//! Pure and read-only: everything goes through [`ProgressSource::automaticity`].

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::memory::ProgressSource;
use crate::types::{median, ItemId};

/// Which groups to practice next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Groups to highlight: consolidation groups plus the expansion group.
    /// Sorted, no duplicates.
    pub recommended: Vec<usize>,
    /// Ready-to-adopt enabled set (all started groups plus the expansion
    /// group, in sequence order). `None` when nothing is started yet, in which
    /// case the caller falls back to its own default (usually group 0).
    pub enabled: Option<Vec<usize>>,
    /// Started groups with more work remaining than the typical started group.
    pub consolidate_indices: Vec<usize>,
    /// Seen items in `consolidate_indices` still below the automaticity threshold.
    pub consolidate_due_count: usize,
    /// Next group to introduce, if the learner is ready to expand.
    pub expand_index: Option<usize>,
    /// Items in the expansion group (0 if none).
    pub expand_new_count: usize,
    /// Share of seen items that are fluent, in `[0, 1]` (0 if nothing started).
    pub consolidation_ratio: f64,
}

impl Recommendation {
    /// Whether there is anything to suggest.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        !self.recommended.is_empty()
    }
}

/// Comparator used to order unstarted groups when choosing the expansion
/// group. Sorting is stable, so groups that compare equal keep their
/// sequence order.
pub type ExpansionOrder<'a> = &'a dyn Fn(usize, usize) -> Ordering;

/// Progress of one group, gathered in a single pass.
#[derive(Debug)]
struct GroupProgress {
    index: usize,
    item_count: usize,
    /// Automaticity of each seen member item.
    seen: Vec<f64>,
}

impl GroupProgress {
    fn is_started(&self) -> bool {
        !self.seen.is_empty()
    }

    fn work_remaining(&self) -> Option<f64> {
        let remaining: Vec<f64> = self.seen.iter().map(|a| 1.0 - a).collect();
        median(&remaining)
    }
}

/// Compute recommendations with groups expanded in sequence order.
///
/// # Errors
/// Storage read failures from `source`.
pub fn compute_recommendations<P, F>(
    source: &P,
    groups: &[usize],
    items_for_group: F,
    config: &SchedulerConfig,
) -> Result<Recommendation>
where
    P: ProgressSource + ?Sized,
    F: Fn(usize) -> Vec<ItemId>,
{
    compute_recommendations_with(source, groups, items_for_group, config, None)
}

/// Compute recommendations, optionally ordering expansion candidates with a
/// caller-supplied comparator.
///
/// # Errors
/// Storage read failures from `source`.
pub fn compute_recommendations_with<P, F>(
    source: &P,
    groups: &[usize],
    items_for_group: F,
    config: &SchedulerConfig,
    expansion_order: Option<ExpansionOrder<'_>>,
) -> Result<Recommendation>
where
    P: ProgressSource + ?Sized,
    F: Fn(usize) -> Vec<ItemId>,
{
    let progress = gather_progress(source, groups, &items_for_group)?;
    let (started, unstarted): (Vec<&GroupProgress>, Vec<&GroupProgress>) =
        progress.iter().partition(|g| g.is_started());

    if started.is_empty() {
        debug!(groups = groups.len(), "No started groups; nothing to recommend");
        return Ok(Recommendation::default());
    }

    let threshold = config.automaticity_threshold;

    // Expansion gate: the pool-wide fluent share.
    let seen_total: usize = started.iter().map(|g| g.seen.len()).sum();
    let fluent_total = started
        .iter()
        .flat_map(|g| g.seen.iter())
        .filter(|a| **a >= threshold)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let consolidation_ratio = fluent_total as f64 / seen_total as f64;
    let can_expand = consolidation_ratio >= config.expansion_threshold;

    // Consolidation: started groups with above-median work remaining.
    let work: Vec<(usize, f64)> = started
        .iter()
        .filter_map(|g| g.work_remaining().map(|w| (g.index, w)))
        .collect();
    let pool_median = median(&work.iter().map(|(_, w)| *w).collect::<Vec<_>>()).unwrap_or(0.0);
    let mut consolidate_indices: Vec<usize> = work
        .iter()
        .filter(|(_, w)| *w > pool_median)
        .map(|(i, _)| *i)
        .collect();
    if consolidate_indices.is_empty() && !can_expand {
        // Nobody is above the median (one started group, or all tied) and the
        // pool is not ready to grow: the groups with the most work left.
        let most = work.iter().map(|(_, w)| *w).fold(0.0, f64::max);
        if most > 0.0 {
            consolidate_indices = work
                .iter()
                .filter(|(_, w)| *w >= most)
                .map(|(i, _)| *i)
                .collect();
        }
    }
    let consolidate_due_count = started
        .iter()
        .filter(|g| consolidate_indices.contains(&g.index))
        .flat_map(|g| g.seen.iter())
        .filter(|a| **a < threshold)
        .count();

    let expansion = if can_expand {
        next_unstarted(&unstarted, expansion_order)
    } else {
        None
    };
    let expand_index = expansion.map(|g| g.index);
    let expand_new_count = expansion.map_or(0, |g| g.item_count);

    let mut recommended = consolidate_indices.clone();
    recommended.extend(expand_index);
    recommended.sort_unstable();
    recommended.dedup();

    let enabled: Vec<usize> = progress
        .iter()
        .filter(|g| g.is_started() || Some(g.index) == expand_index)
        .map(|g| g.index)
        .collect();

    debug!(
        started = started.len(),
        consolidate = ?consolidate_indices,
        consolidate_due_count,
        consolidation_ratio,
        expand = ?expand_index,
        "Computed group recommendations"
    );

    Ok(Recommendation {
        recommended,
        enabled: Some(enabled),
        consolidate_indices,
        consolidate_due_count,
        expand_index,
        expand_new_count,
        consolidation_ratio,
    })
}

/// One pass over every group's items, skipping duplicate group indices.
fn gather_progress<P, F>(
    source: &P,
    groups: &[usize],
    items_for_group: &F,
) -> Result<Vec<GroupProgress>>
where
    P: ProgressSource + ?Sized,
    F: Fn(usize) -> Vec<ItemId>,
{
    let mut visited = HashSet::with_capacity(groups.len());
    let mut progress = Vec::with_capacity(groups.len());
    for &index in groups {
        if !visited.insert(index) {
            continue;
        }
        let items = items_for_group(index);
        let mut seen = Vec::new();
        for id in &items {
            if let Some(a) = source.automaticity(id)? {
                seen.push(a);
            }
        }
        progress.push(GroupProgress {
            index,
            item_count: items.len(),
            seen,
        });
    }
    Ok(progress)
}

fn next_unstarted<'g>(
    unstarted: &[&'g GroupProgress],
    order: Option<ExpansionOrder<'_>>,
) -> Option<&'g GroupProgress> {
    match order {
        None => unstarted.first().copied(),
        Some(cmp) => {
            let mut candidates = unstarted.to_vec();
            candidates.sort_by(|a, b| cmp(a.index, b.index));
            candidates.first().copied()
        }
    }
}
