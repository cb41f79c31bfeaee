//! Core type definitions for the DRILLZ scheduler.
//!
//! All types are serializable so storage adapters can persist them verbatim.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque identifier of one drillable item (e.g. `"C#-string3"`, `"m7:G"`).
///
/// The engine never interprets the contents; domain meaning belongs to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create an item ID from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Build a `Vec<ItemId>` from string slices.
#[must_use]
pub fn item_ids<S: AsRef<str>>(ids: &[S]) -> Vec<ItemId> {
    ids.iter().map(|s| ItemId::new(s.as_ref())).collect()
}

// ---------------------------------------------------------------------------
// Per-item memory record
// ---------------------------------------------------------------------------

/// Everything the scheduler knows about one item.
///
/// Created lazily on the first recorded response and never deleted, so a
/// stored record always has `seen_count >= 1`. Items without a record are
/// *unseen*.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Exponentially-weighted moving average of response latency (ms).
    /// Always within `[min_time_ms, max_response_time_ms]` of the config that
    /// was active when the response was recorded.
    pub ewma: f64,
    /// Forgetting-curve half-life in hours: the time for recall probability
    /// to fall to 50%. Always positive and finite.
    pub stability: f64,
    /// When the item was last answered (correctly or not).
    pub last_seen_at: DateTime<Utc>,
    /// When the item was last answered correctly, `None` if never.
    pub last_correct_at: Option<DateTime<Utc>>,
    /// Number of recorded responses.
    pub seen_count: u32,
    /// Number of correct responses.
    pub correct_count: u32,
}

impl ItemRecord {
    /// Whether this item has at least one recorded response.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.seen_count > 0
    }

    /// Fraction of responses that were correct, in `[0, 1]`.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.seen_count == 0 {
            return 0.0;
        }
        f64::from(self.correct_count) / f64::from(self.seen_count)
    }

    /// Hours elapsed since the last correct answer, `None` if never correct.
    ///
    /// Clock skew (a `now` earlier than the stored timestamp) counts as zero.
    #[must_use]
    pub fn hours_since_correct(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_correct_at.map(|at| hours_between(at, now))
    }
}

/// Non-negative hours from `earlier` to `later`, at millisecond resolution.
#[must_use]
pub fn hours_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    const MS_PER_HOUR: f64 = 3_600_000.0;
    let ms = (later - earlier).num_milliseconds().max(0);
    #[allow(clippy::cast_precision_loss)]
    let ms = ms as f64;
    ms / MS_PER_HOUR
}

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

/// Median of `values`, averaging the two middle elements for even lengths.
///
/// Returns `None` for an empty slice. NaNs sort last (`OrderedFloat` order).
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1].0 + sorted[mid].0) / 2.0)
    } else {
        Some(sorted[mid].0)
    }
}
