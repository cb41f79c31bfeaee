//! Memory Model: per-item records and the scores derived from them.
//!
//! [`MemoryModel`] is the only writer of [`ItemRecord`]s. Each observed answer
//! goes through [`MemoryModel::record_response`] exactly once; every other
//! method is a read. Derived scores (recall, speed, automaticity) are computed
//! on demand from the stored record and the injected clock, never cached.
//!
//! The active [`SchedulerConfig`] is held behind an `Arc` and only ever
//! replaced wholesale, so any caller holding the old `Arc` keeps a consistent
//! view of the thresholds it was using.

use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::decay;
use crate::error::{DrillzError, Result};
use crate::storage::Storage;
use crate::types::{ItemId, ItemRecord};

/// Read-only view of item progress.
///
/// Implemented by [`MemoryModel`]; the selection, recommendation and progress
/// modules depend only on this trait so they can be driven by fakes in tests.
pub trait ProgressSource {
    /// Snapshot of the stored record, `None` if unseen.
    ///
    /// # Errors
    /// Storage read failures.
    fn stats(&self, id: &ItemId) -> Result<Option<ItemRecord>>;

    /// Recall probability now, `None` if unseen.
    ///
    /// # Errors
    /// Storage read failures.
    fn recall(&self, id: &ItemId) -> Result<Option<f64>>;

    /// Recall × speed in `[0, 1]`, `None` if unseen.
    ///
    /// # Errors
    /// Storage read failures.
    fn automaticity(&self, id: &ItemId) -> Result<Option<f64>>;

    /// Thresholds the scores above were computed with.
    fn scheduler_config(&self) -> Arc<SchedulerConfig>;
}

/// Owner of the per-item memory records.
pub struct MemoryModel<S, C = SystemClock> {
    storage: S,
    clock: C,
    config: Arc<SchedulerConfig>,
}

impl<S, C> std::fmt::Debug for MemoryModel<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryModel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: Storage> MemoryModel<S, SystemClock> {
    /// Create a model over `storage` using wall-clock time.
    ///
    /// # Errors
    /// Returns `DrillzError::InvalidConfig` if `config` fails validation.
    pub fn new(storage: S, config: SchedulerConfig) -> Result<Self> {
        Self::with_clock(storage, SystemClock, config)
    }
}

impl<S: Storage, C: Clock> MemoryModel<S, C> {
    /// Create a model with an explicit clock.
    ///
    /// # Errors
    /// Returns `DrillzError::InvalidConfig` if `config` fails validation.
    pub fn with_clock(storage: S, clock: C, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            clock,
            config: Arc::new(config),
        })
    }

    /// The configuration currently in force.
    #[must_use]
    pub fn config(&self) -> Arc<SchedulerConfig> {
        Arc::clone(&self.config)
    }

    /// Swap in a new configuration wholesale (e.g. after calibration).
    ///
    /// Existing records are not rewritten; their EWMA is re-clamped into the
    /// new bounds on their next update.
    ///
    /// # Errors
    /// Returns `DrillzError::InvalidConfig` and keeps the old config if
    /// `config` fails validation.
    pub fn replace_config(&mut self, config: SchedulerConfig) -> Result<()> {
        config.validate()?;
        info!(
            min_time_ms = config.min_time_ms,
            automaticity_target_ms = config.automaticity_target_ms,
            max_response_time_ms = config.max_response_time_ms,
            "Scheduler config replaced"
        );
        self.config = Arc::new(config);
        Ok(())
    }

    /// The injected storage adapter.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The injected clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Record one observed answer.
    ///
    /// Creates the record on first sight, updates the latency EWMA and the
    /// stability, bumps the counters and persists the result. Not idempotent:
    /// call exactly once per answer.
    ///
    /// # Errors
    /// `DrillzError::InvalidInput` for a negative or non-finite latency;
    /// storage failures propagate unchanged.
    pub fn record_response(
        &self,
        id: &ItemId,
        latency_ms: f64,
        correct: bool,
    ) -> Result<ItemRecord> {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(DrillzError::invalid_input(format!(
                "latency must be a finite, non-negative number of milliseconds, got {latency_ms}"
            )));
        }

        let previous = self.storage.get(id)?;
        let now = self.clock.now();
        let record =
            decay::apply_response(previous.as_ref(), latency_ms, correct, now, &self.config);
        self.storage.set(id, &record)?;

        debug!(
            item = %id,
            latency_ms,
            correct,
            ewma = record.ewma,
            stability = record.stability,
            seen = record.seen_count,
            "Recorded response"
        );
        Ok(record)
    }

    /// Forward a batch warm-up hint to storage.
    ///
    /// # Errors
    /// Storage read failures.
    pub fn preload(&self, ids: &[ItemId]) -> Result<()> {
        self.storage.preload(ids)
    }

    /// Speed score of the latency EWMA, `None` if unseen.
    ///
    /// # Errors
    /// Storage read failures.
    pub fn speed_score(&self, id: &ItemId) -> Result<Option<f64>> {
        Ok(self
            .stats(id)?
            .map(|r| decay::speed_score(r.ewma, &self.config)))
    }

    /// Whether every item is seen and at or above the automaticity threshold.
    ///
    /// An empty list is never "all mastered".
    ///
    /// # Errors
    /// Storage read failures.
    pub fn check_all_mastered(&self, ids: &[ItemId]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(false);
        }
        let threshold = self.config.automaticity_threshold;
        for id in ids {
            match self.automaticity(id)? {
                Some(a) if a >= threshold => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Whether the items were once solidly known but need a refresh.
    ///
    /// True iff every item has at least one correct answer and a speed score
    /// of at least 0.5, yet at least one item's recall has decayed below the
    /// automaticity threshold.
    ///
    /// # Errors
    /// Storage read failures.
    pub fn check_needs_review(&self, ids: &[ItemId]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(false);
        }
        let now = self.clock.now();
        let threshold = self.config.automaticity_threshold;
        let mut any_decayed = false;
        for id in ids {
            let Some(record) = self.stats(id)? else {
                return Ok(false);
            };
            if record.correct_count == 0 || decay::speed_score(record.ewma, &self.config) < 0.5 {
                return Ok(false);
            }
            if decay::recall_score(&record, now) < threshold {
                any_decayed = true;
            }
        }
        Ok(any_decayed)
    }
}

impl<S: Storage, C: Clock> ProgressSource for MemoryModel<S, C> {
    /// Stored records are re-clamped to the active latency bounds, so a
    /// record written before [`MemoryModel::replace_config`] reads back
    /// inside the new `[min_time_ms, max_response_time_ms]`.
    fn stats(&self, id: &ItemId) -> Result<Option<ItemRecord>> {
        Ok(self
            .storage
            .get(id)?
            .filter(ItemRecord::is_seen)
            .map(|mut r| {
                r.ewma = decay::clamp_latency(r.ewma, &self.config);
                r
            }))
    }

    fn recall(&self, id: &ItemId) -> Result<Option<f64>> {
        let now = self.clock.now();
        Ok(self.stats(id)?.map(|r| decay::recall_score(&r, now)))
    }

    fn automaticity(&self, id: &ItemId) -> Result<Option<f64>> {
        let now = self.clock.now();
        Ok(self
            .stats(id)?
            .map(|r| decay::automaticity(&r, now, &self.config)))
    }

    fn scheduler_config(&self) -> Arc<SchedulerConfig> {
        self.config()
    }
}
