//! Half-Life Forgetting Curve: Recall, Speed and Automaticity
//!
//! Recall of an item is modelled as:
//!   R = 2^(-Δt/S)
//!
//! Where:
//!   R  = recall probability (1.0 right after a correct answer)
//!   Δt = hours since the last correct answer
//!   S  = stability, the half-life in hours (higher S = slower decay)
//!
//! Speed is scored from the latency EWMA against the automaticity target:
//!   speed = clamp(target / max(ewma, min_time), 0, 1)
//!
//! Automaticity is their product, so an item must be both remembered *and*
//! fast to count as mastered.
//!
//! Stability evolves per response:
//!   - correct:   S' = min(S × (1 + (g − 1) × (1 − S/S_max) × bonus), S_max)
//!   - incorrect: S' = clamp(S × lapse, S_min, S_initial)
//!
//! The `(1 − S/S_max)` headroom gives diminishing growth across a run of
//! successes; `bonus ∈ [1, speed_bonus_max]` rewards fast answers.
//!
//! Every function here is pure: the [`crate::MemoryModel`] owns the records and
//! the clock, and calls into this module.

use chrono::{DateTime, Utc};

use crate::config::SchedulerConfig;
use crate::types::ItemRecord;

/// Core half-life curve: `2^(-hours / stability)`.
///
/// Returns `0.0` for a non-positive or non-finite stability.
#[must_use]
pub fn half_life_recall(hours: f64, stability: f64) -> f64 {
    if !stability.is_finite() || stability <= 0.0 {
        return 0.0;
    }
    (-hours.max(0.0) / stability).exp2()
}

/// Recall probability of a record at `now`; `0.0` if never answered correctly.
#[must_use]
pub fn recall_score(record: &ItemRecord, now: DateTime<Utc>) -> f64 {
    match record.hours_since_correct(now) {
        Some(hours) => half_life_recall(hours, record.stability),
        None => 0.0,
    }
}

/// Speed score of a latency EWMA, in `[0, 1]`.
#[must_use]
pub fn speed_score(ewma: f64, config: &SchedulerConfig) -> f64 {
    (config.automaticity_target_ms / ewma.max(config.min_time_ms)).clamp(0.0, 1.0)
}

/// Automaticity of a record at `now`: recall × speed.
#[must_use]
pub fn automaticity(record: &ItemRecord, now: DateTime<Utc>, config: &SchedulerConfig) -> f64 {
    recall_score(record, now) * speed_score(record.ewma, config)
}

/// Clamp a latency into `[min_time_ms, max_response_time_ms]`.
#[must_use]
pub fn clamp_latency(latency_ms: f64, config: &SchedulerConfig) -> f64 {
    latency_ms.clamp(config.min_time_ms, config.max_response_time_ms)
}

/// Fold one (already clamped) latency into the moving average.
///
/// The previous average is re-clamped first so a record written under an
/// older, differently scaled config still lands inside the current bounds.
#[must_use]
pub fn update_ewma(previous: Option<f64>, latency_ms: f64, config: &SchedulerConfig) -> f64 {
    match previous {
        None => latency_ms,
        Some(prev) => {
            let prev = clamp_latency(prev, config);
            let alpha = config.ewma_alpha;
            clamp_latency(alpha * latency_ms + (1.0 - alpha) * prev, config)
        }
    }
}

/// Stability after a correct answer given at `speed` (speed score of the
/// response latency).
///
/// Strictly greater than `stability` while below the cap.
#[must_use]
pub fn grow_stability(stability: f64, speed: f64, config: &SchedulerConfig) -> f64 {
    let max = config.max_stability_hours;
    let current = stability.clamp(config.min_stability_hours, max);
    let headroom = (1.0 - current / max).clamp(0.0, 1.0);
    let bonus = 1.0 + (config.speed_bonus_max - 1.0) * speed.clamp(0.0, 1.0);
    let growth = 1.0 + (config.stability_growth_base - 1.0) * headroom * bonus;
    (current * growth).min(max)
}

/// Stability after an incorrect answer.
///
/// Never above the initial stability: a lapse leaves the item no stronger
/// than a brand-new one.
#[must_use]
pub fn shrink_stability(stability: f64, config: &SchedulerConfig) -> f64 {
    (stability * config.lapse_factor)
        .clamp(config.min_stability_hours, config.initial_stability_hours)
}

/// Apply one response to a record, creating it if this is the first.
///
/// `latency_ms` must already be validated (finite, non-negative); it is
/// clamped here.
#[must_use]
pub fn apply_response(
    previous: Option<&ItemRecord>,
    latency_ms: f64,
    correct: bool,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> ItemRecord {
    let latency = clamp_latency(latency_ms, config);
    let ewma = update_ewma(previous.map(|r| r.ewma), latency, config);
    let stability_prev = previous.map_or(config.initial_stability_hours, |r| r.stability);

    let stability = if correct {
        grow_stability(stability_prev, speed_score(latency, config), config)
    } else {
        shrink_stability(stability_prev, config)
    };

    let (seen_count, correct_count, last_correct_at) = match previous {
        Some(r) => (r.seen_count, r.correct_count, r.last_correct_at),
        None => (0, 0, None),
    };

    ItemRecord {
        ewma,
        stability,
        last_seen_at: now,
        last_correct_at: if correct { Some(now) } else { last_correct_at },
        seen_count: seen_count.saturating_add(1),
        correct_count: if correct {
            correct_count.saturating_add(1)
        } else {
            correct_count
        },
    }
}
