//! DRILLZ Benchmark Suite
//!
//! Performance targets:
//!   select_next_from_500 ............. < 200μs
//!   record_response_single ........... < 10μs
//!   recommendations_12x12 ............ < 200μs
//!   progress_summary_144 ............. < 100μs

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use drillz_core::progress::ProgressSummary;
use drillz_core::recommendation::compute_recommendations;
use drillz_core::{InMemoryStore, ItemId, ManualClock, MemoryModel, SchedulerConfig, Selector};

fn make_model() -> MemoryModel<InMemoryStore, ManualClock> {
    let start = Utc
        .with_ymd_and_hms(2026, 1, 1, 8, 0, 0)
        .single()
        .expect("valid date");
    MemoryModel::with_clock(
        InMemoryStore::new(),
        ManualClock::new(start),
        SchedulerConfig::default(),
    )
    .expect("valid config")
}

fn group_item(group: usize, i: usize) -> ItemId {
    ItemId::new(format!("g{group}-{i}"))
}

/// Answer roughly two thirds of `ids` with a spread of latencies and
/// outcomes, advancing the clock between answers.
fn populate(model: &MemoryModel<InMemoryStore, ManualClock>, ids: &[ItemId]) {
    for (i, id) in ids.iter().enumerate() {
        if i % 3 == 2 {
            continue;
        }
        let latency = 800.0 + (i % 17) as f64 * 450.0;
        model
            .record_response(id, latency, i % 5 != 0)
            .expect("record");
        model.clock().advance(Duration::minutes(7));
    }
}

/// Benchmark: next-item draw over 500 items (target: < 200μs).
fn bench_select_next(c: &mut Criterion) {
    let model = make_model();
    let pool: Vec<ItemId> = (0..500).map(|i| ItemId::new(format!("item-{i}"))).collect();
    populate(&model, &pool);
    let mut selector = Selector::new(StdRng::seed_from_u64(42));

    c.bench_function("select_next_from_500", |b| {
        b.iter(|| {
            let picked = selector
                .select_next(black_box(&model), black_box(&pool))
                .expect("select");
            black_box(picked);
        });
    });
}

/// Benchmark: one recorded answer (target: < 10μs).
fn bench_record_response(c: &mut Criterion) {
    let model = make_model();
    let id = ItemId::from("C#-string3");
    let mut correct = true;

    c.bench_function("record_response_single", |b| {
        b.iter(|| {
            correct = !correct;
            let record = model
                .record_response(black_box(&id), black_box(1450.0), correct)
                .expect("record");
            black_box(record);
        });
    });
}

/// Benchmark: recommendations over 12 groups of 12 items (target: < 200μs).
fn bench_recommendations(c: &mut Criterion) {
    let model = make_model();
    // Groups 0..8 practised, the rest untouched.
    let practised: Vec<ItemId> = (0..8)
        .flat_map(|g| (0..12).map(move |i| group_item(g, i)))
        .collect();
    populate(&model, &practised);
    let groups: Vec<usize> = (0..12).collect();
    let config = model.config();

    c.bench_function("recommendations_12x12", |b| {
        b.iter(|| {
            let rec = compute_recommendations(
                black_box(&model),
                black_box(&groups),
                |g| (0..12).map(|i| group_item(g, i)).collect(),
                &config,
            )
            .expect("recommend");
            black_box(rec);
        });
    });
}

/// Benchmark: progress summary over 144 items (target: < 100μs).
fn bench_progress_summary(c: &mut Criterion) {
    let model = make_model();
    let ids: Vec<ItemId> = (0..12)
        .flat_map(|g| (0..12).map(move |i| group_item(g, i)))
        .collect();
    populate(&model, &ids);

    c.bench_function("progress_summary_144", |b| {
        b.iter(|| {
            let summary = ProgressSummary::compute(black_box(&model), black_box(&ids))
                .expect("summary");
            black_box(summary);
        });
    });
}

criterion_group!(
    benches,
    bench_select_next,
    bench_record_response,
    bench_recommendations,
    bench_progress_summary,
);
criterion_main!(benches);
