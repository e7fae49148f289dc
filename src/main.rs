// src/main.rs
//! Exercise Tracker - record GPS exercise sessions from the terminal

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use exercise_tracker::{
    config::TrackerConfig,
    display::{spawn_key_reader, KeyAction, TerminalDisplay},
    export::{self, RouteFormat},
    history::{self, format_duration, format_pace, HistorySummary},
    route::RouteProgress,
    LocationSource, RecorderHandle, SessionRecord, SessionStore, JsonFileStore, Thresholds,
    TrackRecorder, TrackerError,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "exercise-tracker",
    version,
    about = "Record walking and running sessions from a GPS source"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file override
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Records file override
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Record a new session
    Record {
        /// Location source: serial, gpsd, replay or windows
        #[arg(long)]
        source: Option<String>,

        /// Serial port for the serial source
        #[arg(long)]
        port: Option<String>,

        #[arg(long)]
        baudrate: Option<u32>,

        /// Replay file (JSON lines) for the replay source
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Replay speed multiplier, 0 for no pacing
        #[arg(long)]
        speed: Option<f64>,

        /// Preset route checkpoints (JSON array of {latitude, longitude})
        #[arg(long)]
        route: Option<PathBuf>,
    },

    /// List saved sessions, newest first
    History {
        /// Group sessions by month
        #[arg(long)]
        month: bool,
    },

    /// Show one saved session
    Show { id: String },

    /// Export a session's route
    Export {
        id: String,

        /// gpx, geojson, kml or csv
        #[arg(long, short, default_value = "gpx")]
        format: String,

        /// Output file (defaults to <id>.<ext>)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete all saved sessions
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show or change the configuration
    Config {
        /// Print the configuration
        #[arg(long)]
        show: bool,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        serial_port: Option<String>,

        #[arg(long)]
        baudrate: Option<u32>,

        #[arg(long)]
        gpsd_host: Option<String>,

        #[arg(long)]
        gpsd_port: Option<u16>,

        /// Desired Windows location accuracy, meters
        #[arg(long)]
        windows_accuracy: Option<u32>,

        /// Windows location polling interval, seconds
        #[arg(long)]
        windows_interval: Option<u64>,

        #[arg(long)]
        replay_path: Option<PathBuf>,

        #[arg(long)]
        replay_speed: Option<f64>,

        /// Minimum movement between accepted samples, meters
        #[arg(long)]
        min_displacement: Option<f64>,

        /// Minimum plausible speed, m/s
        #[arg(long)]
        min_speed: Option<f64>,

        /// Maximum plausible speed, m/s
        #[arg(long)]
        max_speed: Option<f64>,

        #[arg(long)]
        store_path: Option<PathBuf>,

        #[arg(long)]
        checkpoint_radius: Option<f64>,
    },
}

enum Outcome {
    Saved(SessionRecord),
    Discarded,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => TrackerConfig::config_path()?,
    };
    let mut config = TrackerConfig::load_from(&config_path).unwrap_or_else(|e| {
        warn!("{}; using defaults", e);
        TrackerConfig::platform_default()
    });
    let store_path = match cli.store.clone() {
        Some(path) => path,
        None => config.resolved_store_path()?,
    };
    let store = JsonFileStore::new(store_path);

    match cli.command {
        Command::Record {
            source,
            port,
            baudrate,
            replay,
            speed,
            route,
        } => {
            if let Some(source) = source {
                config.update_source(&source);
            }
            if let Some(port) = port {
                let baudrate = baudrate.or(config.serial_baudrate).unwrap_or(9600);
                config.update_serial(port, baudrate);
            }
            if let Some(path) = replay {
                let speed = speed.or(config.replay_speed).unwrap_or(1.0);
                config.update_replay(path, speed);
            }
            config.validate()?;
            record(&config, store, route.as_deref()).await
        }
        Command::History { month } => print_history(&store, month),
        Command::Show { id } => {
            let record = find(&store, &id)?;
            print_record(&record);
            Ok(())
        }
        Command::Export { id, format, output } => {
            let record = find(&store, &id)?;
            let format: RouteFormat = format.parse()?;
            let output =
                output.unwrap_or_else(|| PathBuf::from(format!("{}.{}", id, format.extension())));
            export::export_to_file(&record, &output, format)?;
            println!("Exported {} to {}", format.display_name(), output.display());
            Ok(())
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to delete all sessions without --yes");
            }
            let mut store = store;
            store.clear()?;
            println!("All sessions deleted");
            Ok(())
        }
        Command::Config {
            show,
            source,
            serial_port,
            baudrate,
            gpsd_host,
            gpsd_port,
            windows_accuracy,
            windows_interval,
            replay_path,
            replay_speed,
            min_displacement,
            min_speed,
            max_speed,
            store_path,
            checkpoint_radius,
        } => {
            let mut changed = false;
            if let Some(source) = source {
                config.update_source(&source);
                changed = true;
            }
            if let Some(port) = serial_port {
                let baudrate = baudrate.or(config.serial_baudrate).unwrap_or(9600);
                config.update_serial(port, baudrate);
                changed = true;
            }
            if gpsd_host.is_some() || gpsd_port.is_some() {
                let host = gpsd_host
                    .or_else(|| config.gpsd_host.clone())
                    .unwrap_or_else(|| "localhost".to_string());
                let port = gpsd_port.or(config.gpsd_port).unwrap_or(2947);
                config.update_gpsd(host, port);
                changed = true;
            }
            if windows_accuracy.is_some() || windows_interval.is_some() {
                let accuracy = windows_accuracy.or(config.windows_accuracy).unwrap_or(10);
                let interval = windows_interval.or(config.windows_interval).unwrap_or(1);
                config.update_windows(accuracy, interval);
                changed = true;
            }
            if let Some(path) = replay_path {
                let speed = replay_speed.or(config.replay_speed).unwrap_or(1.0);
                config.update_replay(path, speed);
                changed = true;
            }
            if min_displacement.is_some() || min_speed.is_some() || max_speed.is_some() {
                let current = config.thresholds;
                config.update_thresholds(Thresholds {
                    min_displacement_m: min_displacement.unwrap_or(current.min_displacement_m),
                    min_speed_mps: min_speed.unwrap_or(current.min_speed_mps),
                    max_speed_mps: max_speed.unwrap_or(current.max_speed_mps),
                })?;
                changed = true;
            }
            if let Some(path) = store_path {
                config.store_path = Some(path);
                changed = true;
            }
            if let Some(radius) = checkpoint_radius {
                config.checkpoint_radius_m = radius;
                changed = true;
            }

            if changed {
                config.save_to(&config_path)?;
                println!("Configuration saved to {}", config_path.display());
            }
            if show || !changed {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

/// Log to stderr. The live display owns the terminal while recording, so
/// only warnings are shown there unless `RUST_LOG` or `-v` says otherwise.
fn init_logging(cli: &Cli) {
    let default = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Command::Record { .. }, false) => "warn",
        _ => "info",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn record(
    config: &TrackerConfig,
    store: JsonFileStore,
    route_file: Option<&Path>,
) -> anyhow::Result<()> {
    let source = LocationSource::from_config(config)?;
    let mut route = route_file
        .map(|path| RouteProgress::load(path, config.checkpoint_radius_m))
        .transpose()?;

    let handle = TrackRecorder::spawn(config.thresholds, store);
    if let Err(e) = handle.start(&source).await {
        handle.shutdown().await;
        if e.is_permission_denied() {
            bail!("{}. Grant location access and try again.", e);
        }
        return Err(e).with_context(|| format!("could not open {}", source.describe()));
    }

    let display = TerminalDisplay::new(source.describe());
    display.enter()?;
    let outcome = drive(&handle, &display, route.as_mut()).await;
    if let Err(e) = display.leave() {
        warn!("failed to restore terminal: {}", e);
    }
    handle.shutdown().await;

    match outcome {
        Ok(Outcome::Saved(record)) => {
            println!("Session saved");
            print_record(&record);
            Ok(())
        }
        Ok(Outcome::Discarded) => {
            println!("Session discarded");
            Ok(())
        }
        Err(TrackerError::Persistence { record, source }) => {
            eprintln!("Could not save the session: {}", source);
            eprintln!("Unsaved record:");
            println!("{}", serde_json::to_string_pretty(&record)?);
            Err(source.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Run the live view until the session is ended or abandoned
async fn drive(
    handle: &RecorderHandle,
    display: &TerminalDisplay,
    route: Option<&mut RouteProgress>,
) -> exercise_tracker::Result<Outcome> {
    let (key_tx, mut key_rx) = mpsc::channel(8);
    let stop = Arc::new(AtomicBool::new(false));
    let reader = spawn_key_reader(key_tx, Arc::clone(&stop));

    let outcome = live_loop(handle, display, route, &mut key_rx).await;

    stop.store(true, Ordering::Relaxed);
    if let Err(e) = reader.await {
        warn!("key reader failed: {}", e);
    }
    outcome
}

async fn live_loop(
    handle: &RecorderHandle,
    display: &TerminalDisplay,
    mut route: Option<&mut RouteProgress>,
    keys: &mut mpsc::Receiver<KeyAction>,
) -> exercise_tracker::Result<Outcome> {
    let mut status_rx = handle.subscribe_status();

    loop {
        let status = status_rx.borrow_and_update().clone();
        if let (Some(route), Some(position)) = (route.as_deref_mut(), status.snapshot.last_point()) {
            route.update(position);
        }
        display.draw(&status, route.as_deref())?;

        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    return Err(TrackerError::RecorderClosed);
                }
            }
            key = keys.recv() => match key {
                Some(KeyAction::TogglePause) => handle.toggle_pause().await?,
                Some(KeyAction::End) => {
                    info!("ending session");
                    return handle.end().await.map(Outcome::Saved);
                }
                Some(KeyAction::Abandon) | None => {
                    handle.abandon().await?;
                    return Ok(Outcome::Discarded);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                handle.abandon().await?;
                return Ok(Outcome::Discarded);
            }
        }
    }
}

fn find(store: &JsonFileStore, id: &str) -> anyhow::Result<SessionRecord> {
    store
        .get(id)?
        .with_context(|| format!("no session with id {}", id))
}

fn print_history(store: &JsonFileStore, by_month: bool) -> anyhow::Result<()> {
    let records = store.list()?;
    if records.is_empty() {
        println!("No sessions recorded yet");
        return Ok(());
    }

    if by_month {
        for ((year, month), records) in history::group_by_month(&records).iter().rev() {
            let km: f64 = records.iter().map(|r| r.distance_km).sum();
            println!("{}-{:02}: {} sessions, {:.2} km", year, month, records.len(), km);
            for record in records {
                print_row(record);
            }
            println!();
        }
    } else {
        for record in &records {
            print_row(record);
        }
        println!();
    }

    let summary = HistorySummary::from_records(&records);
    println!(
        "{} sessions, {:.2} km, {} total, {:.1} sessions per active month",
        summary.sessions,
        summary.total_distance_km,
        format_duration(summary.total_duration_seconds),
        summary.average_sessions_per_month()
    );
    Ok(())
}

fn print_row(record: &SessionRecord) {
    let badge = if record.meets_target(history::FREE_EXERCISE_TARGET_KM) {
        "*"
    } else {
        " "
    };
    println!(
        "  {} {}  {:>7.2} km  {:>10}  {:>7}/km  [{}]",
        badge,
        record.started_at.format("%Y-%m-%d %H:%M"),
        record.distance_km,
        format_duration(record.duration_seconds),
        format_pace(record.pace_min_per_km()),
        record.id
    );
}

fn print_record(record: &SessionRecord) {
    println!("Id:        {}", record.id);
    println!("Started:   {}", record.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Distance:  {:.2} km", record.distance_km);
    println!("Duration:  {}", format_duration(record.duration_seconds));
    println!("Pace:      {}/km", format_pace(record.pace_min_per_km()));
    println!("Points:    {}", record.route.len());
    if let (Some(start), Some(end)) = (record.start_point(), record.end_point()) {
        println!("From:      {:.6}, {:.6}", start.latitude, start.longitude);
        println!("To:        {:.6}, {:.6}", end.latitude, end.longitude);
    }
}
