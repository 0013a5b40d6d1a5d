use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use pitwall_sync::config::Config;
use pitwall_sync::db::Database;
use pitwall_sync::models::SessionType;
use pitwall_sync::openf1::ClientSettings;
use pitwall_sync::sync::{run_initial_sync, run_scheduled_sync, InitialSync, SessionSyncService};

#[derive(Parser, Debug)]
#[command(name = "pitwall")]
#[command(about = "Sync F1 session and driver data from the OpenF1 API")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./pitwall.yaml, then $XDG_CONFIG_HOME/pitwall/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sync sessions and drivers once
  Sync {
    /// Only sessions from this season
    #[arg(long)]
    year: Option<i32>,
  },
  /// Periodic sync; steps that find OpenF1 unavailable are skipped
  Scheduled {
    #[arg(long)]
    year: Option<i32>,
  },
  /// Populate an empty database with the configured seasons
  Initial,
  /// List locally stored sessions
  Sessions {
    #[arg(long)]
    year: i32,
    /// practice, qualifying, sprint or race
    #[arg(long = "type")]
    session_type: Option<SessionType>,
  },
  /// Show the session currently live, if any
  Live,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = pitwall_sync::logging::init(&config.logging)?;

  let db = Database::open(&config.database.resolved_path()?)?;
  let settings = ClientSettings {
    api: config.api.clone(),
    cache: config.cache.clone(),
  };
  let service = SessionSyncService::new(db, settings);

  match args.command {
    Command::Sync { year } => {
      match year {
        Some(year) => println!("Syncing sessions for {}...", year),
        None => println!("Syncing sessions..."),
      }
      let sessions = service.sync_sessions(year).await?;
      println!("  Sessions: {}", sessions);

      println!("Syncing drivers...");
      let drivers = service.sync_drivers(None).await?;
      println!("  Drivers: {}", drivers);
      println!("Sync complete.");
    }
    Command::Scheduled { year } => {
      let summary = run_scheduled_sync(&service, year).await?;
      println!("{}", summary);
    }
    Command::Initial => match run_initial_sync(&service, &config.sync.initial_years).await? {
      InitialSync::AlreadyPopulated => {
        println!("Sessions table already has data, skipping initial sync.");
      }
      InitialSync::Synced(years) => {
        for y in years {
          println!("  {}", y.year);
          println!("    Sessions: {}", y.sessions);
          println!("    Drivers: {}", y.drivers);
        }
        println!("Initial sync complete.");
      }
    },
    Command::Sessions { year, session_type } => {
      let sessions = service.get_available_sessions(year, session_type)?;
      if sessions.is_empty() {
        println!("No sessions stored for {}.", year);
      }
      for s in sessions {
        println!(
          "{:>6}  {:<10}  {}  {}",
          s.session_key,
          s.session_type.as_str(),
          s.date_start.format("%Y-%m-%d %H:%M"),
          s
        );
      }
    }
    Command::Live => match service.detect_live_session()? {
      Some(s) => println!("Live: {} (session {})", s, s.session_key),
      None => println!("No live session."),
    },
  }

  Ok(())
}
