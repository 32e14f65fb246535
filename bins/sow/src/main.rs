//! sow - field CLI for SOW volunteers
//!
//! Check in at observation sites, report species sightings, answer the daily
//! prompt and browse the shared records from a terminal.

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use sow_cli::Status;
use sow_core::config::Config;
use sow_core::error::exit_codes;
use sow_telemetry::{metrics, TelemetryConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod context;

use commands::{account, admin, checkin, compress, distance, feed, history, report, stats};
use context::{parse_coordinate, App};

/// Field CLI for SOW volunteers
#[derive(Parser)]
#[command(name = "sow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Current position as "lat, lng" (stands in for a GPS fix)
    #[arg(long, global = true, env = "SOW_POSITION", value_name = "LAT,LNG")]
    at: Option<String>,

    /// Configuration file (defaults to SOW_CONFIG or ./sow-field.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print collected metrics as JSON on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check in at an observation site
    Checkin(checkin::CheckinArgs),

    /// Report a species sighting with a photo
    Report(report::ReportArgs),

    /// Show today's prompt, or answer it
    Feedback(feed::FeedbackArgs),

    /// Like a feedback entry or species report
    Like(feed::LikeArgs),

    /// Show recent feedback entries
    Feed(feed::FeedArgs),

    /// Show the species wall
    Species(feed::SpeciesArgs),

    /// Show the contribution leaderboard
    Leaderboard(stats::LeaderboardArgs),

    /// Show your contribution stats
    Stats(stats::StatsArgs),

    /// List or export your check-ins
    History(history::HistoryArgs),

    /// Compress a photo the way reports do (offline)
    Compress(compress::CompressArgs),

    /// Distance between two coordinates (offline)
    Distance(distance::DistanceArgs),

    /// Administrator sign-in and password reset
    Admin {
        #[command(subcommand)]
        action: admin::AdminAction,
    },

    /// Show or edit your profile
    Profile(account::ProfileArgs),

    /// Sign in and print the session token to export
    Login(account::LoginArgs),

    /// Complete your profile after the first sign-in
    Register(account::RegisterArgs),

    /// Sign out
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            Status::report(&e);
            return ExitCode::from(exit_codes::CONFIG_ERROR as u8);
        }
    };

    let telemetry = TelemetryConfig {
        log_level: config.schema.telemetry.log_level.clone(),
        json: config.schema.telemetry.json,
        ..TelemetryConfig::default()
    }
    .with_verbosity(cli.verbose);
    if let Err(e) = sow_telemetry::init_with_config(telemetry) {
        eprintln!("{} {}", "Warning:".yellow(), e);
    }

    let position = match cli.at.as_deref().map(parse_coordinate).transpose() {
        Ok(position) => position,
        Err(e) => return fail(&e),
    };

    tracing::debug!(config = ?config.path, json = cli.json, "Configuration loaded");

    let app = App {
        config,
        json: cli.json,
        position,
    };

    let result = match cli.command {
        Commands::Checkin(args) => checkin::run(&app, args).await,
        Commands::Report(args) => report::run(&app, args).await,
        Commands::Feedback(args) => feed::feedback(&app, args).await,
        Commands::Like(args) => feed::like(&app, args).await,
        Commands::Feed(args) => feed::feed(&app, args).await,
        Commands::Species(args) => feed::species(&app, args).await,
        Commands::Leaderboard(args) => stats::leaderboard(&app, args).await,
        Commands::Stats(args) => stats::stats(&app, args).await,
        Commands::History(args) => history::run(&app, args).await,
        Commands::Compress(args) => compress::run(&app, args),
        Commands::Distance(args) => distance::run(&app, args),
        Commands::Admin { action } => admin::run(&app, action).await,
        Commands::Profile(args) => account::profile(&app, args).await,
        Commands::Login(args) => account::login(&app, args).await,
        Commands::Register(args) => account::register(&app, args).await,
        Commands::Logout => account::logout(&app).await,
    };

    if cli.metrics {
        match serde_json::to_string_pretty(&metrics().export_json()) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => eprintln!("{} {}", "Warning:".yellow(), e),
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<sow_core::Error>() {
        Some(e) => {
            Status::report(e);
            ExitCode::from(e.code.exit_code() as u8)
        }
        None => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
