use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use itertools::Itertools;
use log::{debug, info, warn};

use super::{Dataset, SkipDiagnostics, SkipReason};
use super::diagnostics::RecordCollector;
use super::records::{
    BrakingPointRecord, DownshiftRateRecord, DrsActivationRecord, EngineSampleRecord,
    GearshiftRecord, LaunchRecord, PreSeasonImprovementRecord, SectionTimeRecord,
    UpshiftRecord,
};
use crate::PitwallError;
use crate::cache::DatasetRecord;
use crate::events::{
    BrakingPointDetector, DownshiftDetector, DrivingEvent, DrsActivationDetector, EventDetector,
    GearshiftDetector, LaunchDetector, UpshiftDetector,
};
use crate::reference::SeasonContext;
use crate::telemetry::{
    DistanceResampler, LapInfo, NormalizedLap, SessionKey, SessionKind, TelemetryProvider,
};
use crate::track::{ReferenceTrack, ReferenceTrackStorage, TrackLocator, section_times};

pub type SeasonRows<R> = (Vec<R>, SkipDiagnostics);

/// Days of a testing meeting that are looked for
const TESTING_DAYS: RangeInclusive<u8> = 1..=3;

/// Laps of one session grouped per driver, drivers sorted, laps in running order
pub type DriverLaps = Vec<(String, Vec<LapInfo>)>;

/// Runs the resampler, locator and detectors over every session of a season
pub struct SeasonBuilder<'a, P, S> {
    provider: &'a P,
    ctx: SeasonContext<'a>,
    tracks: &'a mut S,
    resampler: DistanceResampler,
}

impl<'a, P, S> SeasonBuilder<'a, P, S>
where
    P: TelemetryProvider,
    S: ReferenceTrackStorage,
{
    pub fn new(provider: &'a P, ctx: SeasonContext<'a>, tracks: &'a mut S) -> Self {
        Self {
            provider,
            ctx,
            tracks,
            resampler: DistanceResampler::new(ctx.analysis.resample_smoothing),
        }
    }

    pub fn context(&self) -> SeasonContext<'a> {
        self.ctx
    }

    pub fn normalized_lap(
        &self,
        session: &SessionKey,
        lap: &LapInfo,
    ) -> Result<NormalizedLap, PitwallError> {
        let raw = self.provider.lap_telemetry(session, lap)?;
        self.resampler.resample(&raw)
    }

    /// Reference track of a meeting, built from the fastest qualifying lap when it is not
    /// stored yet
    pub fn reference_track(&mut self, meeting: &str) -> Result<ReferenceTrack, PitwallError> {
        let track_id = ReferenceTrack::track_id(self.ctx.season, meeting);
        let (provider, resampler, season) = (self.provider, &self.resampler, self.ctx.season);

        self.tracks.load_or_build(&track_id, || {
            let session = SessionKey::new(season, meeting, SessionKind::Qualifying);
            let laps = provider.laps(&session)?;
            let fastest =
                fastest_lap(&laps).ok_or_else(|| PitwallError::ProviderUnavailable {
                    unit: session.to_string(),
                    reason: "no timed lap to build the track from".to_string(),
                })?;
            info!(
                "Building reference track from {} lap {} of {}",
                fastest.driver, fastest.lap_number, session
            );
            let lap = resampler.resample(&provider.lap_telemetry(&session, fastest)?)?;
            ReferenceTrack::from_lap(season, meeting, &lap)
        })
    }

    /// Like `reference_track`, but a track that cannot be built is counted as a skip
    fn reference_track_or_skip<R>(
        &mut self,
        meeting: &str,
        collector: &mut RecordCollector<R>,
    ) -> Result<Option<ReferenceTrack>, PitwallError> {
        match self.reference_track(meeting) {
            Ok(track) => Ok(Some(track)),
            Err(e) if SkipReason::from_error(&e).is_some() => {
                warn!("No reference track for {}: {}", meeting, e);
                collector.skip(
                    PitwallError::TrackUnavailable {
                        track_id: ReferenceTrack::track_id(self.ctx.season, meeting),
                    },
                    meeting,
                )?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Meetings of the season, `None` once a season the provider cannot list is counted
    fn meetings_or_skip<R>(
        &self,
        collector: &mut RecordCollector<R>,
    ) -> Result<Option<Vec<String>>, PitwallError> {
        let season = self.ctx.season;
        match self.provider.meetings(season) {
            Ok(meetings) => Ok(Some(meetings)),
            Err(e) => {
                warn!("No meetings for season {}: {}", season, e);
                collector.skip(e, &format!("season {season}"))?;
                Ok(None)
            }
        }
    }

    /// Visit every session of `kind` in the season. Sessions the provider cannot deliver
    /// are counted and skipped.
    fn for_each_session<R, F>(
        &mut self,
        kind: SessionKind,
        collector: &mut RecordCollector<R>,
        mut visit: F,
    ) -> Result<(), PitwallError>
    where
        F: FnMut(
            &mut Self,
            &SessionKey,
            DriverLaps,
            &mut RecordCollector<R>,
        ) -> Result<(), PitwallError>,
    {
        let Some(meetings) = self.meetings_or_skip(collector)? else {
            return Ok(());
        };

        for meeting in meetings {
            let session = SessionKey::new(self.ctx.season, &meeting, kind);
            let laps = match self.provider.laps(&session) {
                Ok(laps) => laps,
                Err(e) => {
                    warn!("Skipping {}: {}", session, e);
                    collector.skip(e, &session.to_string())?;
                    continue;
                }
            };
            info!("{}: {} laps", session, laps.len());
            visit(self, &session, laps_per_driver(laps), collector)?;
        }
        Ok(())
    }

    /// Visit every testing day of the season. Most meetings have no testing, so days the
    /// provider does not deliver are not counted as skips.
    fn for_each_testing_session<R, F>(
        &mut self,
        collector: &mut RecordCollector<R>,
        mut visit: F,
    ) -> Result<(), PitwallError>
    where
        F: FnMut(
            &mut Self,
            &SessionKey,
            DriverLaps,
            &mut RecordCollector<R>,
        ) -> Result<(), PitwallError>,
    {
        let Some(meetings) = self.meetings_or_skip(collector)? else {
            return Ok(());
        };

        for meeting in meetings {
            for day in TESTING_DAYS {
                let session =
                    SessionKey::new(self.ctx.season, &meeting, SessionKind::Testing { day });
                match self.provider.laps(&session) {
                    Ok(laps) => {
                        info!("{}: {} laps", session, laps.len());
                        visit(self, &session, laps_per_driver(laps), collector)?;
                    }
                    Err(e) => debug!("No {}: {}", session, e),
                }
            }
        }
        Ok(())
    }

    /// Normalize one lap and turn it into rows, counting failures instead of aborting
    fn analyze_lap<R, F>(
        &self,
        session: &SessionKey,
        lap: &LapInfo,
        collector: &mut RecordCollector<R>,
        analyze: F,
    ) -> Result<(), PitwallError>
    where
        F: FnOnce(NormalizedLap) -> Result<Vec<R>, PitwallError>,
    {
        let unit = format!("{} {} lap {}", session, lap.driver, lap.lap_number);
        let normalized = match self.normalized_lap(session, lap) {
            Ok(normalized) => normalized,
            Err(e) => return collector.skip(e, &unit),
        };
        collector.lap_used();

        match analyze(normalized) {
            Ok(rows) => {
                debug!("{}: {} rows", unit, rows.len());
                collector.extend(rows);
                Ok(())
            }
            Err(e) => collector.skip(e, &unit),
        }
    }

    /// Standing starts of every driver's first race lap on a dry compound
    pub fn launches(&mut self) -> Result<SeasonRows<LaunchRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::Launches);
        let ctx = self.ctx;

        self.for_each_session(
            SessionKind::Race,
            &mut collector,
            |builder, session, drivers, collector| {
                for (driver, laps) in drivers {
                    let Some(first_lap) = laps.first() else {
                        continue;
                    };
                    if !ctx.analysis.dry_compounds.contains(&first_lap.compound) {
                        debug!("{} started {} on {}", driver, session, first_lap.compound);
                        continue;
                    }

                    builder.analyze_lap(session, first_lap, collector, |lap| {
                        let events = LaunchDetector.detect(&lap)?;
                        Ok(events
                            .into_iter()
                            .filter_map(|event| match event {
                                DrivingEvent::Launch {
                                    time_s,
                                    gear,
                                    is_interpolated,
                                } => Some(LaunchRecord {
                                    driver: driver.clone(),
                                    team: ctx.team(&driver),
                                    compound: first_lap.compound,
                                    time: time_s,
                                    gear,
                                    meeting: session.meeting.clone(),
                                    is_interpolated,
                                }),
                                _ => None,
                            })
                            .collect())
                    })?;
                }
                Ok(())
            },
        )?;

        let (rows, diagnostics) = collector.finish(ctx.season)?;
        Ok((filter_standin_drivers(rows), diagnostics))
    }

    /// Full-throttle upshifts of timed, accurate race laps on dry compounds
    pub fn upshifts(&mut self) -> Result<SeasonRows<UpshiftRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::Upshifts);
        let ctx = self.ctx;

        self.for_each_session(
            SessionKind::Race,
            &mut collector,
            |builder, session, drivers, collector| {
                for (driver, laps) in drivers {
                    let dry_laps = laps.iter().filter(|lap| {
                        lap.is_timed()
                            && lap.is_accurate
                            && ctx.analysis.dry_compounds.contains(&lap.compound)
                    });
                    for race_lap in dry_laps {
                        builder.analyze_lap(session, race_lap, collector, |lap| {
                            let events = UpshiftDetector.detect(&lap)?;
                            Ok(events
                                .into_iter()
                                .filter_map(|event| match event {
                                    DrivingEvent::Upshift { to_gear, rpm } => Some(UpshiftRecord {
                                        driver: driver.clone(),
                                        team: ctx.team(&driver),
                                        to_gear,
                                        rpm,
                                        meeting: session.meeting.clone(),
                                        lap_number: race_lap.lap_number,
                                    }),
                                    _ => None,
                                })
                                .collect())
                        })?;
                    }
                }
                Ok(())
            },
        )?;

        let (rows, diagnostics) = collector.finish(ctx.season)?;
        Ok((filter_standin_drivers(rows), diagnostics))
    }

    /// Every gear change on timed, accurate race laps
    pub fn gearshifts(&mut self) -> Result<SeasonRows<GearshiftRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::Gearshifts);
        let ctx = self.ctx;

        self.for_each_session(
            SessionKind::Race,
            &mut collector,
            |builder, session, drivers, collector| {
                for (driver, laps) in drivers {
                    let race_laps = laps.iter().filter(|lap| lap.is_timed() && lap.is_accurate);
                    for race_lap in race_laps {
                        builder.analyze_lap(session, race_lap, collector, |lap| {
                            let events = GearshiftDetector.detect(&lap)?;
                            Ok(events
                                .into_iter()
                                .filter_map(|event| match event {
                                    DrivingEvent::Gearshift {
                                        direction,
                                        to_gear,
                                        at_speed_kph,
                                        time_s,
                                        distance,
                                    } => Some(GearshiftRecord {
                                        driver: driver.clone(),
                                        team: ctx.team(&driver),
                                        direction,
                                        to_gear,
                                        at_speed: at_speed_kph,
                                        meeting: session.meeting.clone(),
                                        lap_number: race_lap.lap_number,
                                        time: time_s,
                                        distance,
                                    }),
                                    _ => None,
                                })
                                .collect())
                        })?;
                    }
                }
                Ok(())
            },
        )?;

        let (rows, diagnostics) = collector.finish(ctx.season)?;
        Ok((filter_standin_drivers(rows), diagnostics))
    }

    /// Downshift rates of the quick, accurate qualifying laps of every driver
    pub fn downshift_rates(&mut self) -> Result<SeasonRows<DownshiftRateRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::DownshiftRates);
        let ctx = self.ctx;

        self.for_each_session(
            SessionKind::Qualifying,
            &mut collector,
            |builder, session, drivers, collector| {
                for (driver, laps) in drivers {
                    let accurate: Vec<LapInfo> =
                        laps.into_iter().filter(|lap| lap.is_accurate).collect();
                    for quali_lap in quick_laps(&accurate, ctx.analysis.quick_lap_threshold) {
                        builder.analyze_lap(session, quali_lap, collector, |lap| {
                            let events = DownshiftDetector.detect(&lap)?;
                            Ok(events
                                .into_iter()
                                .filter_map(|event| match event {
                                    DrivingEvent::DownshiftRate {
                                        from_gear,
                                        to_gear,
                                        time_taken_s,
                                    } => Some(DownshiftRateRecord {
                                        driver: driver.clone(),
                                        team: ctx.team(&driver),
                                        from_gear,
                                        to_gear,
                                        time_taken: time_taken_s,
                                        meeting: session.meeting.clone(),
                                        lap_number: quali_lap.lap_number,
                                    }),
                                    _ => None,
                                })
                                .collect())
                        })?;
                    }
                }
                Ok(())
            },
        )?;

        let (rows, diagnostics) = collector.finish(ctx.season)?;
        Ok((filter_standin_drivers(rows), diagnostics))
    }

    /// DRS activations of every timed race lap that used DRS at least once
    pub fn drs_activations(&mut self) -> Result<SeasonRows<DrsActivationRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::DrsActivations);
        let ctx = self.ctx;

        self.for_each_session(
            SessionKind::Race,
            &mut collector,
            |builder, session, drivers, collector| {
                for (driver, laps) in drivers {
                    for race_lap in laps.iter().filter(|lap| lap.is_timed()) {
                        builder.analyze_lap(session, race_lap, collector, |lap| {
                            let events = DrsActivationDetector.detect(&lap)?;
                            Ok(events
                                .into_iter()
                                .filter_map(|event| match event {
                                    DrivingEvent::DrsActivations { count } => {
                                        Some(DrsActivationRecord {
                                            driver: driver.clone(),
                                            team: ctx.team(&driver),
                                            meeting: session.meeting.clone(),
                                            lap_number: race_lap.lap_number,
                                            amount_drs_activations: count,
                                        })
                                    }
                                    _ => None,
                                })
                                .collect())
                        })?;
                    }
                }
                Ok(())
            },
        )?;

        let (rows, diagnostics) = collector.finish(ctx.season)?;
        Ok((filter_standin_drivers(rows), diagnostics))
    }

    /// First braking point of every driver's fastest race lap
    pub fn braking_points(&mut self) -> Result<SeasonRows<BrakingPointRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::BrakingPoints);
        let ctx = self.ctx;

        self.for_each_session(
            SessionKind::Race,
            &mut collector,
            |builder, session, drivers, collector| {
                let track = builder.reference_track_or_skip(&session.meeting, collector)?;
                let Some(track) = track else {
                    return Ok(());
                };
                let sections = ctx.tables.sections(ctx.season, &session.meeting);

                for (driver, laps) in drivers {
                    let Some(fastest) = fastest_lap(&laps) else {
                        continue;
                    };
                    builder.analyze_lap(session, fastest, collector, |lap| {
                        let locator = TrackLocator::new(&track, sections);
                        let events = BrakingPointDetector::new(locator, ctx.analysis).detect(&lap)?;
                        Ok(events
                            .into_iter()
                            .filter_map(|event| match event {
                                DrivingEvent::BrakingPoint {
                                    location,
                                    percentage_completed,
                                    from_speed_kph,
                                    distance,
                                    x,
                                    y,
                                } => Some(BrakingPointRecord {
                                    driver: driver.clone(),
                                    team: ctx.team(&driver),
                                    meeting: session.meeting.clone(),
                                    lap_number: fastest.lap_number,
                                    location,
                                    percentage_completed,
                                    from_speed: from_speed_kph,
                                    distance,
                                    x,
                                    y,
                                }),
                                _ => None,
                            })
                            .collect())
                    })?;
                }
                Ok(())
            },
        )?;

        collector.finish(ctx.season)
    }

    /// Time spent in each named section on every accurate qualifying lap
    pub fn section_times(&mut self) -> Result<SeasonRows<SectionTimeRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::SectionTimes);
        let ctx = self.ctx;

        self.for_each_session(
            SessionKind::Qualifying,
            &mut collector,
            |builder, session, drivers, collector| {
                let Some(sections) = ctx.tables.sections(ctx.season, &session.meeting) else {
                    return collector.skip(
                        PitwallError::MissingReference {
                            field: format!("sections of {}", session.meeting),
                            season: ctx.season,
                        },
                        &session.to_string(),
                    );
                };
                let track = builder.reference_track_or_skip(&session.meeting, collector)?;
                let Some(track) = track else {
                    return Ok(());
                };
                let locator = TrackLocator::new(&track, Some(sections));

                for (driver, laps) in drivers {
                    for quali_lap in laps.iter().filter(|lap| lap.is_accurate) {
                        builder.analyze_lap(session, quali_lap, collector, |lap| {
                            let located = locator.locate(lap)?;
                            Ok(section_times(&located)
                                .into_iter()
                                .enumerate()
                                .map(|(section_number, (section_name, time))| SectionTimeRecord {
                                    driver: driver.clone(),
                                    team: ctx.team(&driver),
                                    meeting: session.meeting.clone(),
                                    session: session.kind.to_string(),
                                    lap_number: quali_lap.lap_number,
                                    section_number,
                                    section_name,
                                    time,
                                })
                                .collect())
                        })?;
                    }
                }
                Ok(())
            },
        )?;

        collector.finish(ctx.season)
    }
    /// Fastest accurate pre-season testing lap of every driver against their fastest
    /// accurate lap of the first qualifying session. Pre-season testing is every testing
    /// day before the first meeting with a qualifying session.
    pub fn pre_season_improvements(
        &mut self,
    ) -> Result<SeasonRows<PreSeasonImprovementRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::PreSeasonImprovements);
        let ctx = self.ctx;
        let Some(meetings) = self.meetings_or_skip(&mut collector)? else {
            return collector.finish(ctx.season);
        };

        let mut testing_best: BTreeMap<String, f64> = BTreeMap::new();
        let mut first_qualifying = None;
        for meeting in meetings {
            let qualifying = SessionKey::new(ctx.season, &meeting, SessionKind::Qualifying);
            if let Ok(laps) = self.provider.laps(&qualifying) {
                first_qualifying = Some((qualifying, laps));
                break;
            }

            for day in TESTING_DAYS {
                let session = SessionKey::new(ctx.season, &meeting, SessionKind::Testing { day });
                let laps = match self.provider.laps(&session) {
                    Ok(laps) => laps,
                    Err(e) => {
                        debug!("No {}: {}", session, e);
                        continue;
                    }
                };
                for (driver, laps) in laps_per_driver(laps) {
                    let Some(time) = fastest_accurate_time(&laps) else {
                        continue;
                    };
                    collector.lap_used();
                    testing_best
                        .entry(driver)
                        .and_modify(|best| *best = best.min(time))
                        .or_insert(time);
                }
            }
        }

        let Some((qualifying, laps)) = first_qualifying else {
            collector.skip(
                PitwallError::ProviderUnavailable {
                    unit: format!("season {}", ctx.season),
                    reason: "no qualifying session".to_string(),
                },
                "first qualifying",
            )?;
            return collector.finish(ctx.season);
        };

        info!("Comparing pre-season testing with {}", qualifying);
        for (driver, laps) in laps_per_driver(laps) {
            let Some(qualifying_time) = fastest_accurate_time(&laps) else {
                continue;
            };
            collector.lap_used();
            let Some(&testing_time) = testing_best.get(&driver) else {
                debug!("{} did not take part in pre-season testing", driver);
                continue;
            };
            collector.extend([PreSeasonImprovementRecord {
                team: ctx.team(&driver),
                driver,
                meeting: qualifying.meeting.clone(),
                pre_season_lap_time: testing_time,
                round1_qualifying_lap_time: qualifying_time,
                lap_time_improvement: ((qualifying_time - testing_time) * 100.).round() / 100.,
            }]);
        }

        collector.finish(ctx.season)
    }

    /// Every normalized sample of the timed, accurate testing laps
    pub fn engine_samples(&mut self) -> Result<SeasonRows<EngineSampleRecord>, PitwallError> {
        let mut collector = RecordCollector::new(Dataset::EngineRpm);
        let ctx = self.ctx;

        self.for_each_testing_session(&mut collector, |builder, session, drivers, collector| {
            for (driver, laps) in drivers {
                let team = ctx.team(&driver);
                for test_lap in laps.iter().filter(|lap| lap.is_timed() && lap.is_accurate) {
                    builder.analyze_lap(session, test_lap, collector, |lap| {
                        Ok(lap
                            .samples()
                            .iter()
                            .map(|sample| EngineSampleRecord {
                                driver: driver.clone(),
                                team: team.clone(),
                                speed: sample.speed_kph,
                                gear: sample.gear,
                                throttle: sample.throttle_pct,
                                rpm: sample.rpm,
                                lap_number: test_lap.lap_number,
                                meeting: session.meeting.clone(),
                            })
                            .collect())
                    })?;
                }
            }
            Ok(())
        })?;

        collector.finish(ctx.season)
    }
}

/// Group the laps of a session per driver
pub fn laps_per_driver(laps: Vec<LapInfo>) -> DriverLaps {
    let mut per_driver: BTreeMap<String, Vec<LapInfo>> = BTreeMap::new();
    for lap in laps {
        per_driver.entry(lap.driver.clone()).or_default().push(lap);
    }
    per_driver
        .into_iter()
        .map(|(driver, mut laps)| {
            laps.sort_by_key(|lap| lap.lap_number);
            (driver, laps)
        })
        .collect()
}

/// Fastest timed lap
pub fn fastest_lap(laps: &[LapInfo]) -> Option<&LapInfo> {
    laps.iter()
        .filter_map(|lap| lap.lap_time_s.map(|time| (lap, time)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(lap, _)| lap)
}

/// Lap time of the fastest accurate, timed lap
pub fn fastest_accurate_time(laps: &[LapInfo]) -> Option<f64> {
    laps.iter()
        .filter(|lap| lap.is_accurate)
        .filter_map(|lap| lap.lap_time_s)
        .min_by(f64::total_cmp)
}

/// Timed laps quicker than `threshold` times the fastest one
pub fn quick_laps(laps: &[LapInfo], threshold: f64) -> Vec<&LapInfo> {
    let Some(fastest) = fastest_lap(laps).and_then(|lap| lap.lap_time_s) else {
        return Vec::new();
    };
    laps.iter()
        .filter(|lap| lap.lap_time_s.is_some_and(|time| time < fastest * threshold))
        .collect()
}

/// Drop drivers who took part in fewer than half as many meetings as the most regular
/// driver of the dataset, i.e. one-off stand-ins
pub fn filter_standin_drivers<R: DatasetRecord>(rows: Vec<R>) -> Vec<R> {
    let meetings_per_driver: HashMap<String, usize> = rows
        .iter()
        .map(|row| (row.driver(), row.meeting()))
        .unique()
        .counts_by(|(driver, _)| driver.to_string());
    let Some(&most_meetings) = meetings_per_driver.values().max() else {
        return rows;
    };

    let is_regular =
        |driver: &str| meetings_per_driver.get(driver).copied().unwrap_or_default() as f64
            >= most_meetings as f64 / 2.;
    for driver in meetings_per_driver.keys().filter(|driver| !is_regular(driver)) {
        info!("Dropping stand-in driver {}", driver);
    }
    rows.into_iter()
        .filter(|row| is_regular(row.driver()))
        .collect()
}
