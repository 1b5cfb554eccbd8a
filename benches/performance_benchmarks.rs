use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::BTreeSet;

use hrvrs::baseline::{BaselineCalculator, DynamicBaselineCalculator};
use hrvrs::models::{SessionRecord, SLEEP_TAG};
use hrvrs::night::NightAggregator;
use hrvrs::stages::StageClassifier;

/// Performance benchmarks for the HRV analysis pipeline
///
/// These benchmarks test the performance of core calculations
/// with varying history lengths to ensure scalability.

fn create_benchmark_history(days: u32) -> Vec<SessionRecord> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut records = Vec::new();

    for offset in 0..days {
        let date = start + Duration::days(offset as i64);
        let midnight = date.and_hms_opt(0, 0, 0).unwrap().and_utc();

        for hour in 1..=6 {
            let ts = midnight + Duration::hours(hour);
            let mut tags = BTreeSet::new();
            tags.insert(SLEEP_TAG.to_string());

            records.push(SessionRecord {
                timestamp: ts,
                recording_session_id: format!("bench-{offset}-{hour}"),
                heart_rate: 54.0 + (offset % 5) as f64 + hour as f64 * 0.3,
                mean_rr: Some(1050.0),
                sdnn: Some(50.0 + (offset % 7) as f64),
                rmssd: Some(42.0 + (offset % 9) as f64),
                pnn50: Some(21.0),
                cv_rr: Some(4.2),
                rr_count: Some(310),
                lf_power: Some(780.0),
                hf_power: Some(1020.0),
                lf_hf_ratio: Some(0.7 + (hour % 3) as f64),
                breathing_rate: Some(12.5 + (offset % 3) as f64 * 0.4),
                valid_rr_percentage: Some(97.0),
                quality_score: Some(86.0),
                outlier_count: Some(3),
                filter_method: Some("kamath".to_string()),
                valid: true,
                tags,
            });
        }

        records.push(SessionRecord {
            timestamp: midnight + Duration::hours(13),
            recording_session_id: format!("bench-{offset}-day"),
            heart_rate: 70.0 + (offset % 8) as f64,
            mean_rr: Some(850.0),
            sdnn: Some(38.0),
            rmssd: Some(26.0),
            pnn50: Some(9.0),
            cv_rr: Some(3.1),
            rr_count: Some(290),
            lf_power: Some(1200.0),
            hf_power: Some(600.0),
            lf_hf_ratio: Some(2.0),
            breathing_rate: Some(15.0),
            valid_rr_percentage: Some(95.0),
            quality_score: Some(82.0),
            outlier_count: Some(5),
            filter_method: Some("kamath".to_string()),
            valid: true,
            tags: BTreeSet::new(),
        });
    }

    records
}

fn bench_dynamic_baselines(c: &mut Criterion) {
    let mut group = c.benchmark_group("Dynamic Baselines");

    let calculator = DynamicBaselineCalculator::new();

    for &days in &[7, 30, 90, 365] {
        let records = create_benchmark_history(days);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(
            BenchmarkId::new("compute", days),
            &records,
            |b, records| {
                b.iter(|| {
                    let rows = calculator.compute(black_box(records));
                    black_box(rows);
                });
            },
        );
    }

    group.finish();
}

fn bench_night_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Night Aggregation");

    let aggregator = NightAggregator::new();

    for &days in &[30, 90, 365] {
        let records = create_benchmark_history(days);

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("aggregate", days),
            &records,
            |b, records| {
                b.iter(|| {
                    let nights = aggregator.aggregate(black_box(records));
                    black_box(nights);
                });
            },
        );
    }

    group.finish();
}

fn bench_trailing_baselines(c: &mut Criterion) {
    let mut group = c.benchmark_group("Trailing Baselines");

    let calculator = BaselineCalculator::new();

    for &days in &[30, 90, 365] {
        let records = create_benchmark_history(days);

        group.bench_with_input(
            BenchmarkId::new("trailing", days),
            &records,
            |b, records| {
                b.iter(|| {
                    let baselines = calculator.trailing(black_box(records));
                    black_box(baselines);
                });
            },
        );
    }

    group.finish();
}

fn bench_stage_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stage Classification");

    let classifier = StageClassifier::new();

    for &days in &[30, 90] {
        let records = create_benchmark_history(days);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(
            BenchmarkId::new("nightly_breakdowns", days),
            &records,
            |b, records| {
                b.iter(|| {
                    let breakdowns = classifier.nightly_breakdowns(black_box(records));
                    black_box(breakdowns);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dynamic_baselines,
    bench_night_aggregation,
    bench_trailing_baselines,
    bench_stage_classification
);
criterion_main!(benches);
