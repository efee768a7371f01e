use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use price_watch::analyzer::{AnalysisPolicy, PriceSample, analyze, build_render_segments};

fn series(len: usize) -> Vec<PriceSample> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..len)
        .map(|i| {
            // a gap every 17 points, a deep drop every 101
            let price = match i {
                i if i % 17 == 0 => None,
                i if i % 101 == 0 => Some(Decimal::new(1999, 2)),
                i => Some(Decimal::new(19_900 + (i % 50) as i64, 2)),
            };
            PriceSample::new(start + Duration::hours(i as i64), price)
        })
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let samples = series(10_000);
    let policy = AnalysisPolicy::default();
    c.bench_function("analyze_10k", |b| b.iter(|| analyze(black_box(&samples), &policy)));
}

fn bench_segments(c: &mut Criterion) {
    let samples = series(10_000);
    c.bench_function("build_render_segments_10k", |b| {
        b.iter(|| build_render_segments(black_box(&samples)))
    });
}

criterion_group!(benches, bench_analyze, bench_segments);
criterion_main!(benches);
