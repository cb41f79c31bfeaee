//! Progress summaries for heatmaps and scope badges.
//!
//! Buckets raw automaticity into a small number of display levels and
//! aggregates a set of items into counts the UI can print directly
//! ("12 of 20 mastered, 3 due for review").

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::memory::ProgressSource;
use crate::types::ItemId;

/// Display bucket of one item's automaticity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MasteryLevel {
    /// Never answered.
    Unseen,
    /// Seen, far from fluent.
    Learning,
    /// Approaching the fluency threshold.
    Developing,
    /// At or above the threshold.
    Fluent,
    /// Well above the threshold: fast and fresh.
    Automatic,
}

impl MasteryLevel {
    /// Bucket an automaticity value against `threshold`.
    ///
    /// Bands: below `0.4·t` Learning, below `t` Developing, below the
    /// midpoint of `t` and 1 Fluent, otherwise Automatic.
    #[must_use]
    pub fn classify(automaticity: Option<f64>, threshold: f64) -> Self {
        match automaticity {
            None => Self::Unseen,
            Some(a) if a < threshold * 0.4 => Self::Learning,
            Some(a) if a < threshold => Self::Developing,
            Some(a) if a < (1.0 + threshold) / 2.0 => Self::Fluent,
            Some(_) => Self::Automatic,
        }
    }

    /// Heatmap intensity in `[0, 1]`.
    #[must_use]
    pub fn heat(self) -> f64 {
        match self {
            Self::Unseen => 0.0,
            Self::Learning => 0.25,
            Self::Developing => 0.5,
            Self::Fluent => 0.75,
            Self::Automatic => 1.0,
        }
    }

    /// Whether the level counts as mastered.
    #[must_use]
    pub fn is_mastered(self) -> bool {
        self >= Self::Fluent
    }
}

/// Levels for a list of items, in input order.
///
/// # Errors
/// Storage read failures from `source`.
pub fn item_levels<P: ProgressSource + ?Sized>(
    source: &P,
    ids: &[ItemId],
) -> Result<Vec<(ItemId, MasteryLevel)>> {
    let threshold = source.scheduler_config().automaticity_threshold;
    ids.iter()
        .map(|id| {
            let level = MasteryLevel::classify(source.automaticity(id)?, threshold);
            Ok((id.clone(), level))
        })
        .collect()
}

/// Aggregate progress over a set of items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Items considered.
    pub total: usize,
    /// Items never answered.
    pub unseen: usize,
    /// Items answered at least once.
    pub seen: usize,
    /// Seen items at or above the automaticity threshold.
    pub mastered: usize,
    /// Items once answered correctly at speed whose recall has since
    /// dropped below the threshold.
    pub due_for_review: usize,
    /// Mean automaticity of seen items, `None` if nothing is seen.
    pub mean_automaticity: Option<f64>,
}

impl ProgressSummary {
    /// Summarise `ids` from `source`.
    ///
    /// # Errors
    /// Storage read failures from `source`.
    pub fn compute<P: ProgressSource + ?Sized>(source: &P, ids: &[ItemId]) -> Result<Self> {
        let config = source.scheduler_config();
        let mut summary = Self {
            total: ids.len(),
            ..Self::default()
        };
        let mut automaticity_sum = 0.0;

        for id in ids {
            let Some(record) = source.stats(id)? else {
                summary.unseen += 1;
                continue;
            };
            summary.seen += 1;

            let automaticity = source.automaticity(id)?.unwrap_or(0.0);
            automaticity_sum += automaticity;
            if automaticity >= config.automaticity_threshold {
                summary.mastered += 1;
            }

            let recall = source.recall(id)?.unwrap_or(0.0);
            if is_due(record.correct_count, record.ewma, recall, &config) {
                summary.due_for_review += 1;
            }
        }

        if summary.seen > 0 {
            #[allow(clippy::cast_precision_loss)]
            let mean = automaticity_sum / summary.seen as f64;
            summary.mean_automaticity = Some(mean);
        }
        Ok(summary)
    }

    /// Share of items mastered, in `[0, 1]` (0 for an empty set).
    #[must_use]
    pub fn mastered_fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.mastered as f64 / self.total as f64;
        fraction
    }
}

fn is_due(correct_count: u32, ewma: f64, recall: f64, config: &SchedulerConfig) -> bool {
    correct_count > 0
        && crate::decay::speed_score(ewma, config) >= 0.5
        && recall < config.automaticity_threshold
}
