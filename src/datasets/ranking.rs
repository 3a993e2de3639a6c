// Compares drivers or teams through the median of a dataset's metric.

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::DatasetRecord;
use crate::reference::{GroupBy, SeasonContext};

/// Value of a row when drivers or teams are compared, e.g. launch time or shift RPM
pub trait RankedRecord: DatasetRecord {
    fn metric(&self) -> f64;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRanking {
    pub name: String,
    pub median: f64,
    pub rows: usize,
    pub color: Option<String>,
    pub engine: Option<String>,
}

/// Median metric per driver or team, lowest median first. Grouping by team leaves out
/// drivers the reference tables do not place in a team.
pub fn rank_rows<R: RankedRecord>(
    rows: &[R],
    group_by: GroupBy,
    ctx: SeasonContext<'_>,
) -> Vec<GroupRanking> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in rows {
        match group_by.group_of(&ctx, row.driver()) {
            Some(name) => groups.entry(name).or_default().push(row.metric()),
            None => debug!("{} has no team in season {}", row.driver(), ctx.season),
        }
    }

    groups
        .into_iter()
        .filter_map(|(name, mut values)| {
            let median = median(&mut values)?;
            let color = group_by.color(ctx.tables, ctx.season, &name);
            let engine = group_by.engine(ctx.tables, ctx.season, &name);
            Some(GroupRanking {
                color: color.map(str::to_string),
                engine: engine.map(str::to_string),
                rows: values.len(),
                name,
                median,
            })
        })
        .sorted_by(|a, b| a.median.total_cmp(&b.median))
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::datasets::LaunchRecord;
    use crate::reference::ReferenceTables;
    use crate::telemetry::Compound;

    const TABLES_JSON: &str = r##"{
        "seasons": {
            "2021": {
                "driver_teams": {"VER": "Red Bull", "PER": "Red Bull", "HAM": "Mercedes"},
                "teams": {
                    "Red Bull": {"color": "#0600EF", "engine": "Honda"},
                    "Mercedes": {"color": "#00D2BE", "engine": "Mercedes"}
                },
                "circuit_sections": {}
            }
        }
    }"##;

    fn launch(driver: &str, time: f64) -> LaunchRecord {
        LaunchRecord {
            driver: driver.to_string(),
            team: None,
            compound: Compound::Soft,
            time,
            gear: 2,
            meeting: "01 Bahrain Grand Prix".to_string(),
            is_interpolated: false,
        }
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3., 1., 2.]), Some(2.));
        assert_eq!(median(&mut [4., 1., 3., 2.]), Some(2.5));
    }

    #[test]
    fn test_rank_drivers_by_median() {
        let tables: ReferenceTables = serde_json::from_str(TABLES_JSON).unwrap();
        let analysis = AnalysisConfig::default();
        let ctx = SeasonContext::new(2021, &tables, &analysis);
        let rows = vec![
            launch("HAM", 3.9),
            launch("VER", 3.6),
            launch("HAM", 4.1),
            launch("VER", 4.4),
            launch("VER", 3.8),
            launch("ALO", 4.1),
        ];

        let ranking = rank_rows(&rows, GroupBy::Driver, ctx);
        let order: Vec<(&str, usize)> = ranking
            .iter()
            .map(|group| (group.name.as_str(), group.rows))
            .collect();
        assert_eq!(order, vec![("VER", 3), ("HAM", 2), ("ALO", 1)]);
        assert_eq!(ranking[0].median, 3.8);
        assert!((ranking[1].median - 4.).abs() < 1e-9);
        assert_eq!(ranking[0].color.as_deref(), Some("#0600EF"));
        assert_eq!(ranking[0].engine.as_deref(), Some("Honda"));
        assert_eq!(ranking[2].color, None);
    }

    #[test]
    fn test_rank_teams_skips_unknown_drivers() {
        let tables: ReferenceTables = serde_json::from_str(TABLES_JSON).unwrap();
        let analysis = AnalysisConfig::default();
        let ctx = SeasonContext::new(2021, &tables, &analysis);
        let rows = vec![
            launch("VER", 4.0),
            launch("PER", 4.5),
            launch("HAM", 3.9),
            launch("ALO", 3.0),
        ];

        let ranking = rank_rows(&rows, GroupBy::Team, ctx);
        assert_eq!(
            ranking,
            vec![
                GroupRanking {
                    name: "Mercedes".to_string(),
                    median: 3.9,
                    rows: 1,
                    color: Some("#00D2BE".to_string()),
                    engine: Some("Mercedes".to_string()),
                },
                GroupRanking {
                    name: "Red Bull".to_string(),
                    median: 4.25,
                    rows: 2,
                    color: Some("#0600EF".to_string()),
                    engine: Some("Honda".to_string()),
                },
            ]
        );
    }
}
