use clap::{Parser, Subcommand};
use coach_core::config::LogFormat;
use coach_core::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "coach")]
#[command(about = "Training plan builder and device workout exporter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a week of plans from load targets and store them
    Build {
        /// JSON file mapping user id to day1..day7 load targets
        #[arg(long)]
        targets: PathBuf,

        /// Users to store an all-rest week for, comma separated
        #[arg(long, value_delimiter = ',')]
        inactive: Vec<String>,

        /// Anchor timestamp (YYYY-MM-DD-HH-mm-ss); day1 is its date. Defaults to now
        #[arg(long)]
        timestamp: Option<String>,

        /// Also push the new week to the partner outbox
        #[arg(long)]
        push: bool,

        /// Heart-rate zones file used when pushing (default: <data-dir>/zones.json)
        #[arg(long)]
        zones: Option<PathBuf>,
    },

    /// Print stored schedules as JSON
    Show {
        /// Users to look up
        #[arg(required = true)]
        user_ids: Vec<String>,
    },

    /// Print a user's stored running sessions as device workouts
    Device {
        user_id: String,

        /// Heart-rate zones file (default: <data-dir>/zones.json)
        #[arg(long)]
        zones: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    if cli.log_json || config.logging.format == LogFormat::Json {
        coach_core::logging::init_json("info");
    } else {
        coach_core::logging::init();
    }

    match cli.command {
        Commands::Build {
            targets,
            inactive,
            timestamp,
            push,
            zones,
        } => cmd_build(&config, &targets, inactive, timestamp, push, zones).await,
        Commands::Show { user_ids } => cmd_show(&config, &user_ids).await,
        Commands::Device { user_id, zones } => cmd_device(&config, &user_id, zones).await,
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn zones_path(config: &Config, zones: Option<PathBuf>) -> PathBuf {
    zones.unwrap_or_else(|| JsonZoneProvider::default_path(&config.data.data_dir))
}

fn load_targets(path: &Path) -> Result<LoadTargets> {
    let contents = std::fs::read_to_string(path)?;
    let targets: LoadTargets = serde_json::from_str(&contents)?;
    tracing::info!("Loaded load targets for {} users from {:?}", targets.len(), path);
    Ok(targets)
}

async fn cmd_build(
    config: &Config,
    targets_path: &Path,
    inactive: Vec<String>,
    timestamp: Option<String>,
    push: bool,
    zones: Option<PathBuf>,
) -> Result<()> {
    let data_dir = &config.data.data_dir;
    std::fs::create_dir_all(data_dir)?;

    let catalog = config.builder.catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::Config("Invalid interval catalog".into()));
    }

    let timestamp = timestamp
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string());
    let targets = load_targets(targets_path)?;
    let plans = build_plans(&catalog, &targets, &inactive);

    let store = JsonFilePlanStore::in_data_dir(data_dir);
    let persisted =
        persist_plans(&store, &plans, &timestamp, config.store.max_concurrent_writes).await?;

    let pushed = if push {
        let zones = JsonZoneProvider::load(&zones_path(config, zones))?;
        let partner = OutboxPartner::new(config.outbox_dir(), &config.partner.workout_provider);
        let ledger_path = TrackingLedger::default_path(data_dir);
        let mut ledger = TrackingLedger::load(&ledger_path)?;

        let report = push_plans(&partner, &zones, &mut ledger, &plans, &inactive, &timestamp).await?;
        ledger.save(&ledger_path)?;
        Some(report)
    } else {
        None
    };

    print_json(&json!({
        "timestamp": timestamp,
        "persisted": persisted,
        "pushed": pushed,
    }))?;

    let failures = persisted.failed.len() + pushed.as_ref().map_or(0, |r| r.failed.len());
    if failures > 0 {
        return Err(Error::Other(format!("{} user operations failed", failures)));
    }
    Ok(())
}

async fn cmd_show(config: &Config, user_ids: &[String]) -> Result<()> {
    let store = JsonFilePlanStore::in_data_dir(&config.data.data_dir);
    let report = fetch_schedules(&store, user_ids).await?;

    print_json(&report.schedules)?;

    for failure in &report.failed {
        eprintln!("Unreadable plan for {}: {}", failure.user_id, failure.message);
    }
    if !report.failed.is_empty() {
        return Err(Error::Other(format!(
            "{} stored plans could not be decoded",
            report.failed.len()
        )));
    }
    Ok(())
}

async fn cmd_device(config: &Config, user_id: &str, zones: Option<PathBuf>) -> Result<()> {
    let store = JsonFilePlanStore::in_data_dir(&config.data.data_dir);
    let output = store.get(&[user_id.to_string()]).await?;
    if let Some(failure) = output.unprocessed.first() {
        return Err(Error::Other(failure.message.clone()));
    }
    let record = output
        .records
        .first()
        .ok_or_else(|| Error::Other(format!("No stored plan for user {}", user_id)))?;
    let schedule = decode_plan(record)?;

    let provider = JsonZoneProvider::load(&zones_path(config, zones))?;
    let table = provider.zones_for(user_id).await?;

    let workouts: BTreeMap<&str, DeviceWorkout> = schedule
        .iter()
        .filter_map(|(key, entry)| match entry {
            ScheduledWorkout::Running(session) => Some((
                key.as_str(),
                to_device_format(session, &table).with_provider(&config.partner.workout_provider),
            )),
            _ => None,
        })
        .collect();

    print_json(&workouts)
}
