/*
Pacing jitter of the 1 ms clock ticker: OS thread::sleep against the SpinSleeper
the ticker thread uses, measured with the same tick helpers.
*/

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use std::{
    hint::black_box,
    time::{Duration, Instant},
};
use spin_sleep::{SpinSleeper, SpinStrategy};

use ctlsys_simulation::component_a::clock::{spin_sleep_tick, thread_sleep_tick};

const TARGET_PERIOD_US: u64 = 1_000;

const SAMPLES: usize = 250;

fn bench_tick_pacing(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_tick_pacing");

    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(BenchmarkId::new("thread_sleep", "1ms"), |b| {
        b.iter(|| {
            let mut last = Instant::now();
            let mut overshoot = Vec::with_capacity(SAMPLES);
            for _ in 0..SAMPLES {
                overshoot.push(thread_sleep_tick(TARGET_PERIOD_US, &mut last));
            }
            black_box(overshoot);
        });
    });

    group.bench_function(BenchmarkId::new("spin_sleeper", "1ms"), |b| {
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        b.iter(|| {
            let mut last = Instant::now();
            let mut overshoot = Vec::with_capacity(SAMPLES);
            for _ in 0..SAMPLES {
                overshoot.push(spin_sleep_tick(TARGET_PERIOD_US, &sleeper, &mut last));
            }
            black_box(overshoot);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_tick_pacing);
criterion_main!(benches);
