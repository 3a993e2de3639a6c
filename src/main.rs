use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use pitwall::{
    Dataset, PitwallError, ReferenceTables, SeasonBuilder, SeasonContext,
    cache::DatasetCache,
    config::AppConfig,
    reference::GroupBy,
    telemetry::JsonlTelemetryProvider,
    track::{FileBasedTrackStorage, ReferenceTrack, ReferenceTrackStorage},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Configuration file, defaults to config.json in the user config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build season datasets, or serve them from the cache
    Build {
        #[arg(short, long)]
        season: u16,

        /// Datasets to build, all of them when omitted
        #[arg(short, long, value_enum)]
        dataset: Vec<Dataset>,

        /// Ignore cached rows and rebuild
        #[arg(short, long)]
        refresh: bool,
    },
    /// Build and store the reference track of a meeting
    Track {
        #[arg(short, long)]
        season: u16,

        #[arg(short, long)]
        meeting: String,

        /// Discard the stored track and rebuild it
        #[arg(short, long)]
        refresh: bool,
    },
    /// Order drivers or teams by the median metric of a dataset
    Rank {
        #[arg(short, long)]
        season: u16,

        #[arg(short, long, value_enum)]
        dataset: Dataset,

        #[arg(short, long, value_enum, default_value = "driver")]
        group_by: GroupBy,

        /// Ignore cached rows and rebuild
        #[arg(short, long)]
        refresh: bool,
    },
    /// Remove cached datasets of a season
    Clear {
        #[arg(short, long)]
        season: u16,

        /// Datasets to remove, all of them when omitted
        #[arg(short, long, value_enum)]
        dataset: Vec<Dataset>,

        /// Also remove the season's reference tracks
        #[arg(short, long)]
        tracks: bool,
    },
    /// Write the configuration file, keeping settings that are not given
    Configure {
        /// Directory of the recorded sessions
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory of cached datasets and reference tracks
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// JSON file with teams, colours, engines and circuit sections
        #[arg(long)]
        reference_tables: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, PitwallError> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None => Ok(AppConfig::from_local_file()?.unwrap_or_default()),
    }
}

fn reference_tables(config: &AppConfig) -> Result<ReferenceTables, PitwallError> {
    match &config.reference_tables {
        Some(path) => ReferenceTables::from_file(path),
        None => {
            warn!("No reference tables configured, teams and sections are unknown");
            Ok(ReferenceTables::default())
        }
    }
}

fn build(
    config: &AppConfig,
    season: u16,
    datasets: &[Dataset],
    refresh: bool,
) -> Result<(), PitwallError> {
    let tables = reference_tables(config)?;
    let ctx = SeasonContext::new(season, &tables, &config.analysis);
    let cache_dir = config.cache_dir()?;
    let cache = DatasetCache::new(cache_dir.clone())?;
    let mut tracks = FileBasedTrackStorage::in_cache_dir(&cache_dir)?;
    let provider = JsonlTelemetryProvider::new(config.data_dir()?);
    let mut builder = SeasonBuilder::new(&provider, ctx, &mut tracks);

    let all = Dataset::ALL;
    let datasets = if datasets.is_empty() { &all[..] } else { datasets };
    for dataset in datasets {
        let summary = match dataset.load(&cache, &mut builder, refresh) {
            Ok(summary) => summary,
            Err(e @ PitwallError::NoUsableLaps { .. }) => {
                warn!("{}", e);
                continue;
            }
            Err(e) => return Err(e),
        };
        match summary.diagnostics {
            Some(diagnostics) => println!(
                "{} {}: {} rows, {}",
                season,
                dataset.cache_name(),
                summary.rows,
                diagnostics
            ),
            None => println!(
                "{} {}: {} rows from cache",
                season,
                dataset.cache_name(),
                summary.rows
            ),
        }
    }
    Ok(())
}

fn track(
    config: &AppConfig,
    season: u16,
    meeting: &str,
    refresh: bool,
) -> Result<(), PitwallError> {
    let tables = reference_tables(config)?;
    let ctx = SeasonContext::new(season, &tables, &config.analysis);
    let mut tracks = FileBasedTrackStorage::in_cache_dir(&config.cache_dir()?)?;
    let track_id = ReferenceTrack::track_id(season, meeting);
    if refresh {
        tracks.delete_track(&track_id)?;
    }
    let origin = if tracks.track_exists(&track_id)? {
        "stored"
    } else {
        "built"
    };
    let storage_path = tracks.storage_path().to_path_buf();

    let provider = JsonlTelemetryProvider::new(config.data_dir()?);
    let track = SeasonBuilder::new(&provider, ctx, &mut tracks).reference_track(meeting)?;
    println!(
        "{}: {} points, {} in {:?}",
        track.track_id,
        track.len(),
        origin,
        storage_path
    );
    Ok(())
}

fn rank(
    config: &AppConfig,
    season: u16,
    dataset: Dataset,
    group_by: GroupBy,
    refresh: bool,
) -> Result<(), PitwallError> {
    let tables = reference_tables(config)?;
    let ctx = SeasonContext::new(season, &tables, &config.analysis);
    let cache_dir = config.cache_dir()?;
    let cache = DatasetCache::new(cache_dir.clone())?;
    let mut tracks = FileBasedTrackStorage::in_cache_dir(&cache_dir)?;
    let provider = JsonlTelemetryProvider::new(config.data_dir()?);
    let mut builder = SeasonBuilder::new(&provider, ctx, &mut tracks);

    let ranking = dataset.rank(&cache, &mut builder, refresh, group_by)?;
    for (position, group) in ranking.iter().enumerate() {
        println!(
            "{:>2}. {:<16} {:>12.3} ({} rows) {} {}",
            position + 1,
            group.name,
            group.median,
            group.rows,
            group.engine.as_deref().unwrap_or("-"),
            group.color.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn clear(
    config: &AppConfig,
    season: u16,
    datasets: &[Dataset],
    clear_tracks: bool,
) -> Result<(), PitwallError> {
    let cache_dir = config.cache_dir()?;
    let cache = DatasetCache::new(cache_dir.clone())?;
    let all = Dataset::ALL;
    let datasets = if datasets.is_empty() { &all[..] } else { datasets };
    for dataset in datasets {
        cache.invalidate(season, dataset.cache_name())?;
        info!("Removed {} {}", season, dataset.cache_name());
    }

    if clear_tracks {
        let mut tracks = FileBasedTrackStorage::in_cache_dir(&cache_dir)?;
        let removed = tracks.delete_season_tracks(season)?;
        println!("{season}: removed {removed} reference tracks");
    }
    Ok(())
}

fn configure(
    config_path: Option<&Path>,
    data_dir: Option<&Path>,
    cache_dir: Option<&Path>,
    reference_tables: Option<&Path>,
) -> Result<(), PitwallError> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => AppConfig::config_path()?,
    };
    let mut config = if config_path.exists() {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    if let Some(dir) = data_dir {
        config.data_dir = Some(dir.to_path_buf());
    }
    if let Some(dir) = cache_dir {
        config.cache_dir = Some(dir.to_path_buf());
    }
    if let Some(path) = reference_tables {
        config.reference_tables = Some(path.to_path_buf());
    }
    config.save(&config_path)?;
    println!("Configuration written to {config_path:?}");
    Ok(())
}

fn main() {
    colog::init();

    let cli = Args::parse();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    }) {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    let result = match &cli.command {
        Commands::Configure {
            data_dir,
            cache_dir,
            reference_tables,
        } => configure(
            cli.config.as_deref(),
            data_dir.as_deref(),
            cache_dir.as_deref(),
            reference_tables.as_deref(),
        ),
        command => load_config(cli.config.as_deref()).and_then(|config| match command {
            Commands::Build {
                season,
                dataset,
                refresh,
            } => build(&config, *season, dataset, *refresh),
            Commands::Track {
                season,
                meeting,
                refresh,
            } => track(&config, *season, meeting, *refresh),
            Commands::Rank {
                season,
                dataset,
                group_by,
                refresh,
            } => rank(&config, *season, *dataset, *group_by, *refresh),
            Commands::Clear {
                season,
                dataset,
                tracks,
            } => clear(&config, *season, dataset, *tracks),
            Commands::Configure { .. } => Ok(()),
        }),
    };
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
