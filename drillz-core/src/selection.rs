//! Selection Engine: which item to ask next.
//!
//! Weighted random draw over the enabled items:
//!
//! ```text
//! weight(unseen) = unseen_boost
//! weight(seen)   = (1 − recall) + max(ewma, min_time) / min_time
//! weight(prev)   = 0            (unless it is the only enabled item)
//! ```
//!
//! Staleness and slowness both raise an item's weight; the speed term is at
//! least 1, so every eligible item keeps a non-zero chance.
//!
//! One [`Selector`] per practice session. It remembers the previous pick on
//! the instance itself, so independent sessions never interfere.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::decay;
use crate::error::{DrillzError, Result};
use crate::memory::ProgressSource;
use crate::types::{ItemId, ItemRecord};

/// Selection weight of a seen item from its recall and latency average.
#[must_use]
pub fn seen_weight(recall: f64, ewma: f64, config: &SchedulerConfig) -> f64 {
    let min_time = config.min_time_ms;
    (1.0 - recall.clamp(0.0, 1.0)) + ewma.max(min_time) / min_time
}

/// Selection weight of an item at `now`; `record` is `None` for unseen items.
#[must_use]
pub fn item_weight(
    record: Option<&ItemRecord>,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> f64 {
    match record {
        Some(r) if r.is_seen() => seen_weight(decay::recall_score(r, now), r.ewma, config),
        _ => config.unseen_boost,
    }
}

/// Per-session next-item picker.
#[derive(Debug)]
pub struct Selector<R> {
    rng: R,
    last_selected: Option<ItemId>,
}

impl<R: Rng> Selector<R> {
    /// Start a session with the given random source.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            last_selected: None,
        }
    }

    /// Start a session that treats `previous` as the item just asked, e.g.
    /// when resuming a session across a page reload.
    pub fn with_previous(rng: R, previous: Option<ItemId>) -> Self {
        Self {
            rng,
            last_selected: previous,
        }
    }

    /// The item returned by the last successful [`Self::select_next`].
    #[must_use]
    pub fn last_selected(&self) -> Option<&ItemId> {
        self.last_selected.as_ref()
    }

    /// Forget the previous pick.
    pub fn reset(&mut self) {
        self.last_selected = None;
    }

    /// Distinct enabled items (first occurrence wins) with their weights,
    /// the previous pick already zeroed out.
    ///
    /// # Errors
    /// Storage read failures from `source`.
    pub fn weights<P: ProgressSource + ?Sized>(
        &self,
        source: &P,
        enabled: &[ItemId],
    ) -> Result<Vec<(ItemId, f64)>> {
        let config = source.scheduler_config();
        let mut seen_ids = HashSet::with_capacity(enabled.len());
        let mut weighted = Vec::with_capacity(enabled.len());

        for id in enabled {
            if !seen_ids.insert(id) {
                continue;
            }
            let weight = match source.stats(id)? {
                Some(record) => {
                    let recall = source.recall(id)?.unwrap_or(0.0);
                    seen_weight(recall, record.ewma, &config)
                }
                None => config.unseen_boost,
            };
            weighted.push((id.clone(), weight));
        }

        if weighted.len() > 1 {
            if let Some(prev) = &self.last_selected {
                for (id, w) in &mut weighted {
                    if id == prev {
                        *w = 0.0;
                    }
                }
            }
        }
        Ok(weighted)
    }

    /// Pick the next item to present.
    ///
    /// # Errors
    /// `DrillzError::EmptyPool` if `enabled` is empty; storage read failures
    /// from `source`.
    pub fn select_next<P: ProgressSource + ?Sized>(
        &mut self,
        source: &P,
        enabled: &[ItemId],
    ) -> Result<ItemId> {
        if enabled.is_empty() {
            return Err(DrillzError::EmptyPool);
        }

        let mut weighted = self.weights(source, enabled)?;
        let index = if weighted.len() == 1 {
            0
        } else {
            let dist = WeightedIndex::new(weighted.iter().map(|(_, w)| *w)).map_err(|e| {
                DrillzError::invalid_input(format!("selection weights unusable: {e}"))
            })?;
            dist.sample(&mut self.rng)
        };

        let (picked, weight) = weighted.swap_remove(index);
        debug!(
            item = %picked,
            weight,
            pool = enabled.len(),
            "Selected next item"
        );
        self.last_selected = Some(picked.clone());
        Ok(picked)
    }
}
