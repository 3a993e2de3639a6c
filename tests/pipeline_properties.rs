use pitwall::{
    DistanceResampler, RawSample,
    telemetry::integrate_distance,
    track::TrackSectionTable,
};
use proptest::prelude::*;

fn raw_lap(speeds: &[f64], dt: f64, heading: f64) -> Vec<RawSample> {
    let mut samples: Vec<RawSample> = speeds
        .iter()
        .enumerate()
        .map(|(i, &speed_kph)| RawSample {
            time_s: i as f64 * dt,
            speed_kph,
            throttle_pct: 100.,
            gear: 5,
            rpm: 10000.,
            ..Default::default()
        })
        .collect();
    integrate_distance(&mut samples);
    for sample in samples.iter_mut() {
        sample.x = sample.distance_m * heading.cos();
        sample.y = sample.distance_m * heading.sin();
    }
    samples
}

/// Speeds of a lap that changes rate once, e.g. accelerating out of a corner and braking
/// into the next, clamped to racing speeds
fn two_phase_speeds(
    start_kph: f64,
    first_kph_per_s: f64,
    second_kph_per_s: f64,
    switch_fraction: f64,
    samples: usize,
    dt: f64,
) -> Vec<f64> {
    let switch_s = switch_fraction * samples as f64 * dt;
    let switch_kph = start_kph + first_kph_per_s * switch_s;
    (0..samples)
        .map(|i| {
            let t = i as f64 * dt;
            let speed = if t < switch_s {
                start_kph + first_kph_per_s * t
            } else {
                switch_kph + second_kph_per_s * (t - switch_s)
            };
            speed.clamp(100., 340.)
        })
        .collect()
}

fn section_table(gaps: &[f64]) -> TrackSectionTable {
    let mut percentage = 0.;
    let breakpoints = gaps
        .iter()
        .enumerate()
        .map(|(i, gap)| {
            percentage += gap;
            (percentage, format!("S{i}"))
        })
        .collect();
    TrackSectionTable::new(breakpoints).unwrap()
}

proptest! {
    #[test]
    fn distances_are_contiguous(
        speeds in prop::collection::vec(50f64..330., 10..200),
        dt in 0.05f64..0.3,
    ) {
        let raw = raw_lap(&speeds, dt, 0.);
        let final_distance = raw[raw.len() - 1].distance_m;
        let lap = DistanceResampler::default().resample(&raw).unwrap();

        prop_assert_eq!(lap.len(), final_distance.floor() as usize);
        for (i, sample) in lap.samples().iter().enumerate() {
            prop_assert_eq!(sample.distance as usize, i);
        }
        prop_assert_eq!(lap.samples()[0].time_s, 0.);
    }

    #[test]
    fn classification_is_a_step_function(
        gaps in prop::collection::vec(0.5f64..20., 1..8),
        percentage in -10f64..110.,
    ) {
        let table = section_table(&gaps);
        let expected = table
            .breakpoints()
            .iter()
            .rev()
            .find(|(start, _)| *start <= percentage)
            .map(|(_, name)| name.as_str())
            .unwrap_or("");

        prop_assert_eq!(table.classify(percentage), expected);
        prop_assert_eq!(table.classify(percentage), table.classify(percentage));
        for (start, name) in table.breakpoints() {
            prop_assert_eq!(table.classify(*start), name.as_str());
        }
    }

    #[test]
    fn resampling_a_normalized_lap_is_stable(
        start_kph in 100f64..340.,
        first_kph_per_s in -18f64..18.,
        second_kph_per_s in -18f64..18.,
        switch_fraction in 0f64..1.,
        dt in 0.05f64..0.2,
        samples in 20usize..150,
        heading in 0f64..std::f64::consts::TAU,
    ) {
        let speeds = two_phase_speeds(
            start_kph,
            first_kph_per_s,
            second_kph_per_s,
            switch_fraction,
            samples,
            dt,
        );
        let raw = raw_lap(&speeds, dt, heading);
        let resampler = DistanceResampler::default();
        let once = resampler.resample(&raw).unwrap();
        let twice = resampler.resample(&once.to_raw_samples()).unwrap();

        // the grid of the first pass ends at D - 1 meters, which floors to D - 1 samples
        prop_assert_eq!(twice.len(), once.len() - 1);
        prop_assert_eq!(twice.samples()[0].time_s, 0.);
        for (a, b) in once.samples().iter().zip(twice.samples()) {
            prop_assert_eq!(a.distance, b.distance);
            // positions are linear in distance and pass through the smoothing untouched
            prop_assert!((a.x - b.x).abs() < 1e-6);
            prop_assert!((a.y - b.y).abs() < 1e-6);
            prop_assert_eq!(a.gear, b.gear);
            // time and speed are smoothed again over seven meters, which at most
            // shaves the change of acceleration
            prop_assert!(
                (a.time_s - b.time_s).abs() < 0.01,
                "time {} vs {} at {}m", a.time_s, b.time_s, a.distance
            );
            prop_assert!(
                (a.speed_kph - b.speed_kph).abs() < 2.,
                "speed {} vs {} at {}m", a.speed_kph, b.speed_kph, a.distance
            );
        }
    }
}
