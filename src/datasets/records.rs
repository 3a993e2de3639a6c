// Rows of the season datasets, one struct per table. Columns are PascalCase on disk.

use serde::{Deserialize, Serialize};

use super::ranking::RankedRecord;
use crate::cache::DatasetRecord;
use crate::events::ShiftDirection;
use crate::telemetry::Compound;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchRecord {
    pub driver: String,
    pub team: Option<String>,
    pub compound: Compound,
    /// Seconds from standstill to 200 km/h, reaction time removed
    pub time: f64,
    pub gear: i32,
    pub meeting: String,
    pub is_interpolated: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UpshiftRecord {
    pub driver: String,
    pub team: Option<String>,
    pub to_gear: i32,
    pub rpm: f64,
    pub meeting: String,
    pub lap_number: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GearshiftRecord {
    pub driver: String,
    pub team: Option<String>,
    pub direction: ShiftDirection,
    pub to_gear: i32,
    /// Speed in km/h once the new gear registered
    pub at_speed: f64,
    pub meeting: String,
    pub lap_number: u32,
    /// Seconds into the lap
    pub time: f64,
    pub distance: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DownshiftRateRecord {
    pub driver: String,
    pub team: Option<String>,
    pub from_gear: i32,
    pub to_gear: i32,
    /// Average seconds per downshift
    pub time_taken: f64,
    pub meeting: String,
    pub lap_number: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DrsActivationRecord {
    pub driver: String,
    pub team: Option<String>,
    pub meeting: String,
    pub lap_number: u32,
    pub amount_drs_activations: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BrakingPointRecord {
    pub driver: String,
    pub team: Option<String>,
    pub meeting: String,
    pub lap_number: u32,
    /// Index of the reference track point
    pub location: usize,
    pub percentage_completed: f64,
    pub from_speed: f64,
    pub distance: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SectionTimeRecord {
    pub driver: String,
    pub team: Option<String>,
    pub meeting: String,
    pub session: String,
    pub lap_number: u32,
    /// Order in which the section was first entered on the lap
    pub section_number: usize,
    pub section_name: String,
    pub time: f64,
}

/// Fastest pre-season testing lap against the fastest lap of the first qualifying session
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PreSeasonImprovementRecord {
    pub driver: String,
    pub team: Option<String>,
    /// Meeting of the first qualifying session
    pub meeting: String,
    pub pre_season_lap_time: f64,
    pub round1_qualifying_lap_time: f64,
    /// Qualifying minus testing lap time, rounded to hundredths. Negative is quicker.
    pub lap_time_improvement: f64,
}

/// One normalized sample of a testing lap
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct EngineSampleRecord {
    pub driver: String,
    pub team: Option<String>,
    pub speed: f64,
    pub gear: i32,
    pub throttle: f64,
    pub rpm: f64,
    pub lap_number: u32,
    pub meeting: String,
}

macro_rules! dataset_record {
    ($($record:ty => $metric:ident),+ $(,)?) => {
        $(
            impl DatasetRecord for $record {
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

            impl RankedRecord for $record {
                fn metric(&self) -> f64 {
                    f64::from(self.$metric)
                }
            }
        )+
    };
}

dataset_record!(
    LaunchRecord => time,
    UpshiftRecord => rpm,
    GearshiftRecord => at_speed,
    DownshiftRateRecord => time_taken,
    DrsActivationRecord => amount_drs_activations,
    BrakingPointRecord => percentage_completed,
    SectionTimeRecord => time,
    PreSeasonImprovementRecord => lap_time_improvement,
    EngineSampleRecord => rpm,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_are_pascal_case() {
        let row = DrsActivationRecord {
            driver: "HAM".to_string(),
            team: None,
            meeting: "Bahrain Grand Prix".to_string(),
            lap_number: 12,
            amount_drs_activations: 2,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["AmountDrsActivations"], 2);
        assert_eq!(json["LapNumber"], 12);
        assert!(json["Team"].is_null());

        let braking = BrakingPointRecord {
            driver: "HAM".to_string(),
            team: Some("Mercedes".to_string()),
            meeting: "Bahrain Grand Prix".to_string(),
            lap_number: 30,
            location: 420,
            percentage_completed: 7.8,
            from_speed: 318.,
            distance: 421,
            x: 1.5,
            y: -2.,
        };
        let json = serde_json::to_value(&braking).unwrap();
        assert_eq!(json["X"], 1.5);
        assert_eq!(json["FromSpeed"], 318.);
        assert_eq!(braking.metric(), 7.8);
    }

    #[test]
    fn test_gearshift_and_improvement_columns() {
        let shift = GearshiftRecord {
            driver: "VER".to_string(),
            team: None,
            direction: ShiftDirection::Down,
            to_gear: 3,
            at_speed: 121.5,
            meeting: "Monaco Grand Prix".to_string(),
            lap_number: 44,
            time: 31.2,
            distance: 1680,
        };
        let json = serde_json::to_value(&shift).unwrap();
        assert_eq!(json["Direction"], "Down");
        assert_eq!(json["ToGear"], 3);
        assert_eq!(json["AtSpeed"], 121.5);

        let improvement = PreSeasonImprovementRecord {
            driver: "HAM".to_string(),
            team: None,
            meeting: "Bahrain Grand Prix".to_string(),
            pre_season_lap_time: 90.2,
            round1_qualifying_lap_time: 88.6,
            lap_time_improvement: -1.6,
        };
        let json = serde_json::to_value(&improvement).unwrap();
        assert_eq!(json["Round1QualifyingLapTime"], 88.6);
        assert_eq!(json["LapTimeImprovement"], -1.6);
        assert_eq!(improvement.metric(), -1.6);
    }
}
