//! Property-Based Tests for the DRILLZ scheduler
//!
//! Uses `proptest` to check the memory model, selection and calibration
//! invariants under arbitrary response histories.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use drillz_core::calibration;
use drillz_core::config::CalibrationConfig;
use drillz_core::decay;
use drillz_core::progress::ProgressSummary;
use drillz_core::recommendation::compute_recommendations;
use drillz_core::selection::seen_weight;
use drillz_core::{
    item_ids, InMemoryStore, ItemId, ManualClock, MemoryModel, ProgressSource, SchedulerConfig,
    Selector,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// One answer: (item index, latency ms, correct, minutes waited before it).
fn arb_response(items: usize) -> impl Strategy<Value = (usize, f64, bool, i64)> {
    (0..items, 0.0..30_000.0f64, any::<bool>(), 0..2_000i64)
}

fn arb_history(items: usize) -> impl Strategy<Value = Vec<(usize, f64, bool, i64)>> {
    prop::collection::vec(arb_response(items), 1..60)
}

fn fresh_model() -> MemoryModel<InMemoryStore, ManualClock> {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid date");
    let clock = ManualClock::new(start);
    MemoryModel::with_clock(InMemoryStore::new(), clock, SchedulerConfig::default())
        .expect("valid config")
}

fn replay(
    model: &MemoryModel<InMemoryStore, ManualClock>,
    ids: &[ItemId],
    history: &[(usize, f64, bool, i64)],
) {
    for &(idx, latency, correct, wait) in history {
        model.clock().advance(Duration::minutes(wait));
        model
            .record_response(&ids[idx], latency, correct)
            .expect("valid latency");
    }
}

// ---------------------------------------------------------------------------
// Property: stored records stay inside their bounds
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn records_stay_bounded(history in arb_history(5)) {
        let model = fresh_model();
        let ids = item_ids(&["a", "b", "c", "d", "e"]);
        replay(&model, &ids, &history);
        let config = model.config();

        for id in &ids {
            let Some(record) = model.stats(id).expect("read") else { continue };
            prop_assert!(record.ewma >= config.min_time_ms);
            prop_assert!(record.ewma <= config.max_response_time_ms);
            prop_assert!(record.stability.is_finite());
            prop_assert!(record.stability >= config.min_stability_hours);
            prop_assert!(record.stability <= config.max_stability_hours);
            prop_assert!(record.correct_count <= record.seen_count);
            prop_assert!(record.last_correct_at.map_or(true, |at| at <= record.last_seen_at));
        }
    }

    #[test]
    fn records_stay_bounded_across_recalibration(
        before in arb_history(3),
        after in arb_history(3),
        baseline in 200.0..4_000.0f64,
    ) {
        let mut model = fresh_model();
        let ids = item_ids(&["a", "b", "c"]);
        replay(&model, &ids, &before);

        let scaled = calibration::derive_scaled_config(
            baseline,
            &SchedulerConfig::default(),
            &CalibrationConfig::default(),
        )
        .expect("scaled");
        model.replace_config(scaled).expect("swap");
        let config = model.config();

        // Old records read back inside the new bounds, before and after new answers.
        for round in 0..2 {
            if round == 1 {
                replay(&model, &ids, &after);
            }
            for id in &ids {
                let Some(record) = model.stats(id).expect("read") else { continue };
                prop_assert!(record.ewma >= config.min_time_ms);
                prop_assert!(record.ewma <= config.max_response_time_ms);
            }
        }
    }

    #[test]
    fn scores_are_unit_interval(history in arb_history(3), later in 0..100_000i64) {
        let model = fresh_model();
        let ids = item_ids(&["x", "y", "z"]);
        replay(&model, &ids, &history);
        model.clock().advance(Duration::minutes(later));

        for id in &ids {
            for score in [
                model.recall(id).expect("read"),
                model.automaticity(id).expect("read"),
                model.speed_score(id).expect("read"),
            ]
            .into_iter()
            .flatten()
            {
                prop_assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
            }
        }
    }

    #[test]
    fn recall_never_increases_without_answers(
        history in arb_history(1),
        a in 0..10_000i64,
        b in 0..10_000i64,
    ) {
        let model = fresh_model();
        let ids = item_ids(&["only"]);
        replay(&model, &ids, &history);

        model.clock().advance(Duration::minutes(a));
        let earlier = model.recall(&ids[0]).expect("read").unwrap_or(0.0);
        model.clock().advance(Duration::minutes(b));
        let later = model.recall(&ids[0]).expect("read").unwrap_or(0.0);
        prop_assert!(later <= earlier + 1e-12);
    }

    #[test]
    fn correct_answer_never_shrinks_stability(
        stability in 0.5..336.0f64,
        speed in 0.0..1.0f64,
    ) {
        let config = SchedulerConfig::default();
        let grown = decay::grow_stability(stability, speed, &config);
        prop_assert!(grown >= stability);
        prop_assert!(grown <= config.max_stability_hours);
    }

    #[test]
    fn lapse_never_exceeds_initial_stability(stability in 0.01..1_000.0f64) {
        let config = SchedulerConfig::default();
        let shrunk = decay::shrink_stability(stability, &config);
        prop_assert!(shrunk <= config.initial_stability_hours);
        prop_assert!(shrunk >= config.min_stability_hours);
    }

    #[test]
    fn ewma_moves_toward_latest_latency(
        prev in 1_000.0..9_000.0f64,
        latency in 1_000.0..9_000.0f64,
    ) {
        let config = SchedulerConfig::default();
        let next = decay::update_ewma(Some(prev), latency, &config);
        let (lo, hi) = if prev < latency { (prev, latency) } else { (latency, prev) };
        prop_assert!(next >= lo - 1e-9 && next <= hi + 1e-9);
    }
}

// ---------------------------------------------------------------------------
// Property: selection weights and the no-repeat rule
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn seen_weights_are_at_least_one(recall in 0.0..=1.0f64, ewma in 0.0..20_000.0f64) {
        let w = seen_weight(recall, ewma, &SchedulerConfig::default());
        prop_assert!(w.is_finite());
        prop_assert!(w >= 1.0);
    }

    #[test]
    fn selection_never_repeats(
        history in arb_history(4),
        seed in any::<u64>(),
        draws in 2..50usize,
    ) {
        let model = fresh_model();
        let ids = item_ids(&["a", "b", "c", "d"]);
        replay(&model, &ids, &history);

        let mut selector = Selector::new(StdRng::seed_from_u64(seed));
        let mut previous = selector.select_next(&model, &ids).expect("select");
        for _ in 1..draws {
            let next = selector.select_next(&model, &ids).expect("select");
            prop_assert_ne!(&next, &previous);
            previous = next;
        }
    }

    #[test]
    fn weights_cover_distinct_ids(picks in prop::collection::vec(0..6usize, 1..20)) {
        let model = fresh_model();
        let names = ["a", "b", "c", "d", "e", "f"];
        let pool: Vec<ItemId> = picks.iter().map(|&i| ItemId::from(names[i])).collect();
        let weights = Selector::new(StdRng::seed_from_u64(0))
            .weights(&model, &pool)
            .expect("weights");

        let mut distinct = pool.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(weights.len(), distinct.len());
        prop_assert!(weights.iter().all(|(_, w)| *w > 0.0));
    }
}

// ---------------------------------------------------------------------------
// Property: calibration and recommendations
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn scaled_config_is_always_valid(baseline in 50.0..5_000.0f64) {
        let scaled = calibration::derive_scaled_config(
            baseline,
            &SchedulerConfig::default(),
            &CalibrationConfig::default(),
        )
        .expect("scaled");
        prop_assert!(scaled.validate().is_ok());
        let ratio = scaled.automaticity_target_ms / baseline;
        prop_assert!((ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn baseline_lies_within_kept_samples(
        samples in prop::collection::vec(100.0..3_000.0f64, 5..40),
    ) {
        let cal = CalibrationConfig::default();
        let baseline = calibration::measure_baseline(&samples, &cal).expect("baseline");
        let kept = &samples[cal.warmup_samples..];
        let lo = kept.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = kept.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(baseline >= lo && baseline <= hi);
    }

    #[test]
    fn recommendations_are_well_formed(history in arb_history(12)) {
        let model = fresh_model();
        let ids: Vec<ItemId> = (0..12)
            .map(|i| ItemId::new(format!("g{}-{}", i / 3, i % 3)))
            .collect();
        replay(&model, &ids, &history);
        let groups = [0, 1, 2, 3];
        let items = |g: usize| (0..3).map(|i| ItemId::new(format!("g{g}-{i}"))).collect::<Vec<_>>();

        let rec = compute_recommendations(&model, &groups, items, &model.config())
            .expect("recommend");
        prop_assert!((0.0..=1.0).contains(&rec.consolidation_ratio));
        if let Some(expand) = rec.expand_index {
            prop_assert!(!rec.consolidate_indices.contains(&expand));
            prop_assert_eq!(rec.expand_new_count, 3);
        }
        let enabled = rec.enabled.clone().unwrap_or_default();
        for g in &rec.recommended {
            prop_assert!(enabled.contains(g));
        }

        let summary = ProgressSummary::compute(&model, &ids).expect("summary");
        prop_assert_eq!(summary.seen + summary.unseen, summary.total);
        prop_assert!(summary.mastered <= summary.seen);
    }
}
