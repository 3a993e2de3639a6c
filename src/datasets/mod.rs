// Season-wide datasets: which laps feed which detector, and how the rows are cached.

pub mod builder;
pub mod diagnostics;
pub mod ranking;
pub mod records;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::PitwallError;
use crate::cache::DatasetCache;
use crate::reference::{GroupBy, SeasonContext};
use crate::telemetry::TelemetryProvider;
use crate::track::ReferenceTrackStorage;

pub use builder::{SeasonBuilder, SeasonRows, filter_standin_drivers};
pub use diagnostics::{RecordCollector, SkipDiagnostics, SkipReason};
pub use ranking::{GroupRanking, RankedRecord, rank_rows};
pub use records::{
    BrakingPointRecord, DownshiftRateRecord, DrsActivationRecord, EngineSampleRecord,
    GearshiftRecord, LaunchRecord, PreSeasonImprovementRecord, SectionTimeRecord,
    UpshiftRecord,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Dataset {
    Launches,
    Upshifts,
    Gearshifts,
    DownshiftRates,
    DrsActivations,
    BrakingPoints,
    SectionTimes,
    PreSeasonImprovements,
    EngineRpm,
}

impl Dataset {
    pub const ALL: [Dataset; 9] = [
        Dataset::Launches,
        Dataset::Upshifts,
        Dataset::Gearshifts,
        Dataset::DownshiftRates,
        Dataset::DrsActivations,
        Dataset::BrakingPoints,
        Dataset::SectionTimes,
        Dataset::PreSeasonImprovements,
        Dataset::EngineRpm,
    ];

    /// Name of the dataset in cache file names, `<season>_<name>.jsonl`
    pub fn cache_name(&self) -> &'static str {
        match self {
            Dataset::Launches => "Launches",
            Dataset::Upshifts => "Race_Laps_Upshifts_RPM",
            Dataset::Gearshifts => "All_Gearshifts",
            Dataset::DownshiftRates => "Downshift_Rates",
            Dataset::DrsActivations => "DRS_Activations",
            Dataset::BrakingPoints => "Braking_Points",
            Dataset::SectionTimes => "Session_Section_Times",
            Dataset::PreSeasonImprovements => "Pre_Season_Improvements",
            Dataset::EngineRpm => "Engine_RPM",
        }
    }

    /// Serve the dataset from the cache, building the season when needed
    pub fn load<P, S>(
        self,
        cache: &DatasetCache,
        builder: &mut SeasonBuilder<'_, P, S>,
        refresh: bool,
    ) -> Result<DatasetSummary, PitwallError>
    where
        P: TelemetryProvider,
        S: ReferenceTrackStorage,
    {
        self.visit_rows(cache, builder, refresh, Summarize(self))
    }

    /// Drivers or teams ordered by the median metric of their rows
    pub fn rank<P, S>(
        self,
        cache: &DatasetCache,
        builder: &mut SeasonBuilder<'_, P, S>,
        refresh: bool,
        group_by: GroupBy,
    ) -> Result<Vec<GroupRanking>, PitwallError>
    where
        P: TelemetryProvider,
        S: ReferenceTrackStorage,
    {
        let ctx = builder.context();
        self.visit_rows(cache, builder, refresh, Rank { group_by, ctx })
    }

    fn visit_rows<P, S, V>(
        self,
        cache: &DatasetCache,
        builder: &mut SeasonBuilder<'_, P, S>,
        refresh: bool,
        visitor: V,
    ) -> Result<V::Output, PitwallError>
    where
        P: TelemetryProvider,
        S: ReferenceTrackStorage,
        V: RowsVisitor,
    {
        let ctx = builder.context();
        let rows = CachedRows {
            cache,
            ctx,
            dataset: self,
            refresh,
        };
        match self {
            Dataset::Launches => rows.visit(|| builder.launches(), visitor),
            Dataset::Upshifts => rows.visit(|| builder.upshifts(), visitor),
            Dataset::Gearshifts => rows.visit(|| builder.gearshifts(), visitor),
            Dataset::DownshiftRates => rows.visit(|| builder.downshift_rates(), visitor),
            Dataset::DrsActivations => rows.visit(|| builder.drs_activations(), visitor),
            Dataset::BrakingPoints => rows.visit(|| builder.braking_points(), visitor),
            Dataset::SectionTimes => rows.visit(|| builder.section_times(), visitor),
            Dataset::PreSeasonImprovements => {
                rows.visit(|| builder.pre_season_improvements(), visitor)
            }
            Dataset::EngineRpm => rows.visit(|| builder.engine_samples(), visitor),
        }
    }
}

/// Outcome of [`Dataset::load`]
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetSummary {
    pub dataset: Dataset,
    pub rows: usize,
    /// Present when the season was built rather than read from the cache
    pub diagnostics: Option<SkipDiagnostics>,
}

/// What to make of a dataset's rows once they are loaded
trait RowsVisitor {
    type Output;

    fn visit<R: RankedRecord>(
        self,
        rows: Vec<R>,
        built: Option<SkipDiagnostics>,
    ) -> Self::Output;
}

struct Summarize(Dataset);

impl RowsVisitor for Summarize {
    type Output = DatasetSummary;

    fn visit<R: RankedRecord>(
        self,
        rows: Vec<R>,
        built: Option<SkipDiagnostics>,
    ) -> DatasetSummary {
        DatasetSummary {
            dataset: self.0,
            rows: rows.len(),
            diagnostics: built,
        }
    }
}

struct Rank<'a> {
    group_by: GroupBy,
    ctx: SeasonContext<'a>,
}

impl RowsVisitor for Rank<'_> {
    type Output = Vec<GroupRanking>;

    fn visit<R: RankedRecord>(self, rows: Vec<R>, _: Option<SkipDiagnostics>) -> Self::Output {
        rank_rows(&rows, self.group_by, self.ctx)
    }
}

struct CachedRows<'c, 'a> {
    cache: &'c DatasetCache,
    ctx: SeasonContext<'a>,
    dataset: Dataset,
    refresh: bool,
}

impl CachedRows<'_, '_> {
    fn visit<R, F, V>(self, build: F, visitor: V) -> Result<V::Output, PitwallError>
    where
        R: RankedRecord,
        F: FnOnce() -> Result<SeasonRows<R>, PitwallError>,
        V: RowsVisitor,
    {
        let mut diagnostics = None;
        let rows = self
            .cache
            .get(self.ctx, self.dataset.cache_name(), self.refresh, || {
                let (rows, built) = build()?;
                diagnostics = Some(built);
                Ok(rows)
            })?;
        Ok(visitor.visit(rows, diagnostics))
    }
}
