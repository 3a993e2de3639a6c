use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pitwall::events::{DrsActivationDetector, EventDetector, UpshiftDetector};
use pitwall::telemetry::{DistanceResampler, RawSample, integrate_distance};
use pitwall::track::{ReferenceTrack, TrackLocator, TrackSectionTable};
use std::time::Duration;

/// Roughly a 5 km lap sampled at 4 Hz around a circle
fn create_raw_lap(samples: usize) -> Vec<RawSample> {
    let mut raw: Vec<RawSample> = (0..samples)
        .map(|i| {
            let t = i as f64 * 0.25;
            RawSample {
                time_s: t,
                speed_kph: 200. + 60. * (t / 5.).sin(),
                throttle_pct: 100.,
                gear: 6 + (i / 80 % 3) as i32,
                rpm: 10500.,
                drs: if i % 100 < 20 { 14 } else { 0 },
                ..Default::default()
            }
        })
        .collect();
    integrate_distance(&mut raw);

    let circumference = raw[raw.len() - 1].distance_m;
    for sample in raw.iter_mut() {
        let angle = sample.distance_m / circumference * std::f64::consts::TAU;
        sample.x = angle.cos() * circumference / std::f64::consts::TAU;
        sample.y = angle.sin() * circumference / std::f64::consts::TAU;
    }
    raw
}

fn bench_resampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampling");
    let resampler = DistanceResampler::default();

    for samples in [100, 400] {
        let raw = create_raw_lap(samples);
        group.bench_function(format!("resample_{samples}_samples"), |b| {
            b.iter(|| black_box(resampler.resample(black_box(&raw))))
        });
    }

    group.finish();
}

fn bench_track_location(c: &mut Criterion) {
    let mut group = c.benchmark_group("track_location");
    group.measurement_time(Duration::from_secs(10));

    let lap = DistanceResampler::default()
        .resample(&create_raw_lap(400))
        .expect("benchmark lap resamples");
    let track = ReferenceTrack::from_lap(2021, "Bench Grand Prix", &lap)
        .expect("benchmark lap builds a track");
    let sections = TrackSectionTable::new(vec![
        (0., "Sector 1".to_string()),
        (33., "Sector 2".to_string()),
        (66., "Sector 3".to_string()),
    ])
    .expect("ascending sections");
    let locator = TrackLocator::new(&track, Some(&sections));

    group.bench_function("nearest_point", |b| {
        b.iter(|| black_box(track.nearest(black_box(120.), black_box(-40.))))
    });

    group.bench_function("locate_lap", |b| {
        b.iter(|| black_box(locator.locate(black_box(lap.clone()))))
    });

    group.finish();
}

fn bench_detectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_detectors");

    let lap = DistanceResampler::default()
        .resample(&create_raw_lap(400))
        .expect("benchmark lap resamples");

    group.bench_function("upshifts", |b| {
        b.iter(|| black_box(UpshiftDetector.detect(black_box(&lap))))
    });

    group.bench_function("drs_activations", |b| {
        b.iter(|| black_box(DrsActivationDetector.detect(black_box(&lap))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resampling,
    bench_track_location,
    bench_detectors
);
criterion_main!(benches);
