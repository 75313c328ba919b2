//! Criterion micro-benchmarks for the per-tick flight loop and target
//! acquisition.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use homing_bench::{crowd, salvo, OpenField, QuietUplink, LAUNCH_ALTITUDE};
use homing_core::Vec3;
use homing_flight::profile::SeekerHead;
use homing_flight::seeker::{acquire, select_min_angle};
use homing_flight::{DriverConfig, FlightDriver, HardwareProfile};
use homing_test_utils::fixtures::{armed_hardware, RICH_BUDGET};

fn seeker_head() -> SeekerHead {
    HardwareProfile::from_config(&armed_hardware())
        .seeker
        .expect("armed hardware carries a seeker")
}

/// 64 missiles in flight over a crowd of 200 targets.
fn launched_salvo() -> (FlightDriver<QuietUplink>, OpenField) {
    let mut field = OpenField::new(crowd(200, 42));
    let mut driver = FlightDriver::new(
        Arc::new(QuietUplink::default()),
        DriverConfig {
            seed: 42,
            negotiate_hardware: false,
        },
    );
    for request in salvo(64, 4, RICH_BUDGET) {
        driver.launch(request, &mut field);
    }
    (driver, field)
}

/// Benchmark: one `tick_all` over 64 unguided missiles.
fn bench_tick_all_64(c: &mut Criterion) {
    c.bench_function("tick_all_64", |b| {
        b.iter_batched(
            launched_salvo,
            |(mut driver, mut field)| {
                let summary = driver.tick_all(&mut field);
                black_box(summary);
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: launch tick of one armed missile, negotiation included.
fn bench_launch_armed(c: &mut Criterion) {
    let uplink = Arc::new(QuietUplink::negotiating(armed_hardware()));
    let mut field = OpenField::new(crowd(200, 42));
    let request = salvo(1, 1, RICH_BUDGET).remove(0);

    c.bench_function("launch_armed", |b| {
        b.iter_batched(
            || {
                FlightDriver::new(
                    Arc::clone(&uplink),
                    DriverConfig {
                        seed: 1,
                        negotiate_hardware: true,
                    },
                )
            },
            |mut driver| {
                let id = driver.launch(request.clone(), &mut field);
                black_box(id);
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: seeker scan over 200 targets.
fn bench_acquire_200(c: &mut Criterion) {
    let field = OpenField::new(crowd(200, 42));
    let seeker = seeker_head();
    let origin = Vec3::new(0.0, LAUNCH_ALTITUDE, 0.0);
    let heading = Vec3::new(0.0, 0.0, 1.0);

    c.bench_function("acquire_200", |b| {
        b.iter(|| {
            let target = acquire(&field, origin, heading, &seeker, None);
            black_box(target);
        });
    });
}

/// Benchmark: minimum-angle selection alone over 200 candidates.
fn bench_select_min_angle_200(c: &mut Criterion) {
    let candidates = crowd(200, 42);
    let origin = Vec3::new(0.0, LAUNCH_ALTITUDE, 0.0);
    let heading = Vec3::new(0.0, 0.0, 1.0);
    let min_dot = seeker_head().min_dot();

    c.bench_function("select_min_angle_200", |b| {
        b.iter(|| {
            let best = select_min_angle(origin, heading, min_dot, &candidates);
            black_box(best);
        });
    });
}

criterion_group!(
    benches,
    bench_tick_all_64,
    bench_launch_armed,
    bench_acquire_200,
    bench_select_min_angle_200
);
criterion_main!(benches);
