// Season-scoped get-or-build memoization of the tabular datasets.
//
// There is no locking: one writer per cache directory is assumed.

pub mod writer;

use std::path::PathBuf;

use log::{info, warn};
use serde::{Serialize, de::DeserializeOwned};

use crate::PitwallError;
use crate::reference::SeasonContext;

pub use writer::{read_rows, write_rows};

/// A row of a season dataset
pub trait DatasetRecord: Serialize + DeserializeOwned {
    fn driver(&self) -> &str;

    fn meeting(&self) -> &str;

    fn set_team(&mut self, team: Option<String>);
}

pub struct DatasetCache {
    cache_dir: PathBuf,
}

impl DatasetCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self, PitwallError> {
        if !cache_dir.exists() {
            std::fs::create_dir_all(&cache_dir)
                .map_err(|e| PitwallError::CacheIOError { source: e })?;
        }
        Ok(Self { cache_dir })
    }

    pub fn path_for(&self, season: u16, dataset: &str) -> PathBuf {
        self.cache_dir.join(format!("{season}_{dataset}.jsonl"))
    }

    /// Return the cached rows of a dataset, building and persisting them when they are
    /// missing, unreadable or a refresh is requested.
    ///
    /// Cached rows get their team re-derived from the current reference tables, so
    /// correcting a driver's team does not require rebuilding the season. A failing
    /// `build` persists nothing.
    pub fn get<R, F>(
        &self,
        ctx: SeasonContext<'_>,
        dataset: &str,
        refresh: bool,
        build: F,
    ) -> Result<Vec<R>, PitwallError>
    where
        R: DatasetRecord,
        F: FnOnce() -> Result<Vec<R>, PitwallError>,
    {
        let path = self.path_for(ctx.season, dataset);

        if !refresh && path.exists() {
            match read_rows::<R>(&path) {
                Ok(mut rows) => {
                    for row in rows.iter_mut() {
                        let team = ctx.team(row.driver());
                        row.set_team(team);
                    }
                    write_rows(&path, &rows)?;
                    info!("Loaded {} rows of {} from {:?}", rows.len(), dataset, path);
                    return Ok(rows);
                }
                Err(PitwallError::CacheCorruption { path, reason }) => {
                    warn!("Rebuilding {}, {} is unreadable: {}", dataset, path, reason);
                }
                Err(e) => return Err(e),
            }
        }

        info!("Building {} for season {}", dataset, ctx.season);
        let rows = build()?;
        write_rows(&path, &rows)?;
        info!("Cached {} rows of {} in {:?}", rows.len(), dataset, path);
        Ok(rows)
    }

    /// Drop the cached rows of a dataset, if any
    pub fn invalidate(&self, season: u16, dataset: &str) -> Result<(), PitwallError> {
        let path = self.path_for(season, dataset);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| PitwallError::CacheIOError { source: e })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::reference::ReferenceTables;
    use serde::Deserialize;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Row {
        driver: String,
        team: Option<String>,
        meeting: String,
        time: f64,
    }

    impl DatasetRecord for Row {
        fn driver(&self) -> &str {
            &self.driver
        }

        fn meeting(&self) -> &str {
            &self.meeting
        }

        fn set_team(&mut self, team: Option<String>) {
            self.team = team;
        }
    }

    fn tables(team: &str) -> ReferenceTables {
        serde_json::from_value(serde_json::json!({
            "seasons": {"2021": {"driver_teams": {"VER": team}}}
        }))
        .unwrap()
    }

    fn rows() -> Vec<Row> {
        vec![Row {
            driver: "VER".to_string(),
            team: Some("Red Bull".to_string()),
            meeting: "Bahrain Grand Prix".to_string(),
            time: 4.123,
        }]
    }

    #[test]
    fn test_second_get_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().to_path_buf()).unwrap();
        let (tables, analysis) = (tables("Red Bull"), AnalysisConfig::default());
        let ctx = SeasonContext::new(2021, &tables, &analysis);
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            Ok(rows())
        };

        let first: Vec<Row> = cache.get(ctx, "Launches", false, build).unwrap();
        let second: Vec<Row> = cache.get(ctx, "Launches", false, build).unwrap();
        assert_eq!(first, second);
        assert_eq!(builds.get(), 1);
        assert!(dir.path().join("2021_Launches.jsonl").exists());

        cache.get::<Row, _>(ctx, "Launches", true, build).unwrap();
        assert_eq!(builds.get(), 2);
    }

    #[test]
    fn test_team_is_rederived_on_read() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().to_path_buf()).unwrap();
        let analysis = AnalysisConfig::default();
        let old_tables = tables("Red Bull");
        cache
            .get(
                SeasonContext::new(2021, &old_tables, &analysis),
                "Launches",
                false,
                || Ok(rows()),
            )
            .unwrap();

        let new_tables = tables("Red Bull Racing");
        let reread: Vec<Row> = cache
            .get(
                SeasonContext::new(2021, &new_tables, &analysis),
                "Launches",
                false,
                || panic!("cache should not be rebuilt"),
            )
            .unwrap();
        assert_eq!(reread[0].team.as_deref(), Some("Red Bull Racing"));
        assert_eq!(reread[0].time, 4.123);
    }

    #[test]
    fn test_corrupt_cache_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(cache.path_for(2021, "Launches"), "not json\n").unwrap();
        let (tables, analysis) = (tables("Red Bull"), AnalysisConfig::default());

        let rebuilt: Vec<Row> = cache
            .get(
                SeasonContext::new(2021, &tables, &analysis),
                "Launches",
                false,
                || Ok(rows()),
            )
            .unwrap();
        assert_eq!(rebuilt, rows());
    }

    #[test]
    fn test_invalidate_forces_a_rebuild() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().to_path_buf()).unwrap();
        let (tables, analysis) = (tables("Red Bull"), AnalysisConfig::default());
        let ctx = SeasonContext::new(2021, &tables, &analysis);
        let builds = Cell::new(0);
        let build = || {
            builds.set(builds.get() + 1);
            Ok(rows())
        };

        cache.get::<Row, _>(ctx, "Launches", false, build).unwrap();
        cache.invalidate(2021, "Launches").unwrap();
        assert!(!cache.path_for(2021, "Launches").exists());
        // nothing cached is not an error
        cache.invalidate(2021, "Launches").unwrap();

        cache.get::<Row, _>(ctx, "Launches", false, build).unwrap();
        assert_eq!(builds.get(), 2);
    }

    #[test]
    fn test_failed_build_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = DatasetCache::new(dir.path().to_path_buf()).unwrap();
        let (tables, analysis) = (tables("Red Bull"), AnalysisConfig::default());

        let result: Result<Vec<Row>, _> = cache.get(
            SeasonContext::new(2021, &tables, &analysis),
            "Launches",
            false,
            || {
                Err(PitwallError::NoUsableLaps {
                    season: 2021,
                    dataset: "Launches".to_string(),
                })
            },
        );
        assert!(matches!(result, Err(PitwallError::NoUsableLaps { .. })));
        assert!(!cache.path_for(2021, "Launches").exists());
    }
}
