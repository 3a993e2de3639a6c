// Read-only reference tables: which driver drove for which team, team colours and engine
// suppliers, and the named sections of each circuit.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::PitwallError;
use crate::config::AnalysisConfig;
use crate::track::TrackSectionTable;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamReference {
    /// Hex colour used when plotting the team, e.g. "#0600EF"
    pub color: String,
    pub engine: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct SeasonReference {
    pub driver_teams: HashMap<String, String>,
    pub teams: HashMap<String, TeamReference>,
    /// Section tables keyed by meeting name
    pub circuit_sections: HashMap<String, TrackSectionTable>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ReferenceTables {
    pub seasons: HashMap<u16, SeasonReference>,
}

impl ReferenceTables {
    pub fn from_file(path: &Path) -> Result<Self, PitwallError> {
        let file =
            std::fs::File::open(path).map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }

    pub fn season(&self, season: u16) -> Option<&SeasonReference> {
        self.seasons.get(&season)
    }

    pub fn team(&self, season: u16, driver: &str) -> Option<&str> {
        self.season(season)?
            .driver_teams
            .get(driver)
            .map(String::as_str)
    }

    pub fn team_color(&self, season: u16, team: &str) -> Option<&str> {
        self.season(season)?
            .teams
            .get(team)
            .map(|t| t.color.as_str())
    }

    pub fn driver_color(&self, season: u16, driver: &str) -> Option<&str> {
        self.team_color(season, self.team(season, driver)?)
    }

    pub fn team_engine(&self, season: u16, team: &str) -> Option<&str> {
        self.season(season)?
            .teams
            .get(team)
            .map(|t| t.engine.as_str())
    }

    pub fn driver_engine(&self, season: u16, driver: &str) -> Option<&str> {
        self.team_engine(season, self.team(season, driver)?)
    }

    pub fn sections(&self, season: u16, meeting: &str) -> Option<&TrackSectionTable> {
        self.season(season)?.circuit_sections.get(meeting)
    }
}

/// Everything a season build needs, passed down explicitly
#[derive(Debug, Clone, Copy)]
pub struct SeasonContext<'a> {
    pub season: u16,
    pub tables: &'a ReferenceTables,
    pub analysis: &'a AnalysisConfig,
}

impl<'a> SeasonContext<'a> {
    pub fn new(season: u16, tables: &'a ReferenceTables, analysis: &'a AnalysisConfig) -> Self {
        Self {
            season,
            tables,
            analysis,
        }
    }

    pub fn team(&self, driver: &str) -> Option<String> {
        self.tables.team(self.season, driver).map(str::to_string)
    }
}

/// How rows of a dataset are grouped for comparison
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, ValueEnum)]
pub enum GroupBy {
    Driver,
    Team,
}

impl GroupBy {
    /// Group a driver's rows belong to, `None` for a driver without a team
    pub fn group_of(&self, ctx: &SeasonContext<'_>, driver: &str) -> Option<String> {
        match self {
            GroupBy::Driver => Some(driver.to_string()),
            GroupBy::Team => ctx.team(driver),
        }
    }

    pub fn color<'t>(
        &self,
        tables: &'t ReferenceTables,
        season: u16,
        name: &str,
    ) -> Option<&'t str> {
        match self {
            GroupBy::Driver => tables.driver_color(season, name),
            GroupBy::Team => tables.team_color(season, name),
        }
    }

    pub fn engine<'t>(
        &self,
        tables: &'t ReferenceTables,
        season: u16,
        name: &str,
    ) -> Option<&'t str> {
        match self {
            GroupBy::Driver => tables.driver_engine(season, name),
            GroupBy::Team => tables.team_engine(season, name),
        }
    }
}
