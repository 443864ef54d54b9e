//! Coverage ledger benchmarks
//!
//! Critical paths:
//! - Demand placement across many shared batches
//! - FIFO settlement of incoming capital
//! - Bounded reconciliation of a long-lived insured

use cohort_common::{InsuredId, ManualClock};
use cohort_ledger::{CoverageLedger, RoundLimits};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn ledger_with_insureds(count: usize) -> (CoverageLedger, Vec<InsuredId>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let limits = RoundLimits::new(1, 8, 12).unwrap();
    let mut ledger = CoverageLedger::new(Decimal::ONE, limits, clock.clone()).unwrap();
    let ids: Vec<InsuredId> = (0..count)
        .map(|i| InsuredId::new(format!("insured-{i}")))
        .collect();
    for id in &ids {
        ledger.add_insured(id.clone()).unwrap();
    }
    (ledger, ids, clock)
}

// ============ DEMAND BENCHMARKS ============

fn bench_demand_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("demand");
    group.measurement_time(Duration::from_secs(5));

    for insureds in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*insureds as u64));
        group.bench_with_input(
            BenchmarkId::new("add_coverage_demand", insureds),
            insureds,
            |b, &n| {
                b.iter(|| {
                    let (mut ledger, ids, _clock) = ledger_with_insureds(n);
                    for (i, id) in ids.iter().enumerate() {
                        let rounds = 50 + (i as u64 * 37) % 400;
                        ledger
                            .add_coverage_demand(id, black_box(rounds), Decimal::ONE, false)
                            .unwrap();
                    }
                    black_box(ledger.get_totals())
                });
            },
        );
    }

    group.finish();
}

// ============ SETTLEMENT BENCHMARKS ============

fn bench_settlement(c: &mut Criterion) {
    let mut group = c.benchmark_group("settlement");

    for batches in [10usize, 100, 500].iter() {
        group.bench_with_input(
            BenchmarkId::new("add_coverage", batches),
            batches,
            |b, &n| {
                let (mut ledger, ids, _clock) = ledger_with_insureds(n);
                for (i, id) in ids.iter().enumerate() {
                    ledger
                        .add_coverage_demand(id, 10 + i as u64, Decimal::ONE, false)
                        .unwrap();
                }
                b.iter(|| {
                    let applied = ledger.add_coverage(black_box(Decimal::from(7))).unwrap();
                    black_box(applied)
                });
            },
        );
    }

    group.finish();
}

// ============ RECONCILIATION BENCHMARKS ============

fn bench_reconciliation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconciliation");

    for fuse in [1usize, 16, 256].iter() {
        group.bench_with_input(BenchmarkId::new("receivable_fuse", fuse), fuse, |b, &fuse| {
            let (mut ledger, ids, clock) = ledger_with_insureds(2);
            for _ in 0..1000 {
                ledger
                    .add_coverage_demand(&ids[0], 3, Decimal::ONE, false)
                    .unwrap();
                ledger
                    .add_coverage_demand(&ids[1], 3, Decimal::ONE, false)
                    .unwrap();
            }
            ledger.add_coverage(Decimal::from(4000)).unwrap();
            clock.advance(3600);

            b.iter(|| {
                let view = ledger
                    .receivable_coverage_demand(&ids[0], Some(black_box(fuse)))
                    .unwrap();
                black_box(view)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_demand_placement,
    bench_settlement,
    bench_reconciliation,
);

criterion_main!(benches);
