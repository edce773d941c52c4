use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use strava_cli::cli::commands;
use strava_cli::config::{Config, DEFAULT_TOKEN_FILE};
use strava_cli::models::ActivityUpdate;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "strava")]
#[command(author, version, about = "Manage your Strava activities from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to token file
    #[arg(short, long, global = true, env = "STRAVA_TOKEN_FILE", default_value = DEFAULT_TOKEN_FILE)]
    token_file: PathBuf,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List your activities
    List {
        /// Number of activities to retrieve
        #[arg(short, long, default_value = "10")]
        limit: u32,
        /// Only activities after this date (YYYY-MM-DD)
        #[arg(short, long)]
        after: Option<String>,
        /// Only activities before this date (YYYY-MM-DD)
        #[arg(short, long)]
        before: Option<String>,
    },
    /// Get details of a specific activity
    Get {
        /// Activity ID
        id: u64,
    },
    /// Update a specific activity
    Update {
        /// Activity ID
        id: u64,
        /// New activity name
        #[arg(short, long)]
        name: Option<String>,
        /// New description (an empty string clears it)
        #[arg(short, long)]
        description: Option<String>,
        /// New activity type (e.g. Run, Ride, Swim)
        #[arg(long = "type")]
        activity_type: Option<String>,
        /// Mark as commute
        #[arg(long, overrides_with = "no_commute")]
        commute: bool,
        /// Mark as not a commute
        #[arg(long, overrides_with = "commute")]
        no_commute: bool,
        /// Mark as trainer activity
        #[arg(long, overrides_with = "no_trainer")]
        trainer: bool,
        /// Mark as not a trainer activity
        #[arg(long, overrides_with = "trainer")]
        no_trainer: bool,
        /// Gear ID to assign
        #[arg(long)]
        gear_id: Option<String>,
    },
    /// Token commands
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Show token file status
    Status,
}

/// Collapse a `--flag` / `--no-flag` pair into an optional value
fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "strava_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> strava_cli::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_env().with_token_file(cli.token_file);

    let result = match cli.command {
        Commands::List {
            limit,
            after,
            before,
        } => commands::list_activities(&config, limit, after, before, cli.json).await,
        Commands::Get { id } => commands::get_activity(&config, id, cli.json).await,
        Commands::Update {
            id,
            name,
            description,
            activity_type,
            commute,
            no_commute,
            trainer,
            no_trainer,
            gear_id,
        } => {
            let changes = ActivityUpdate {
                name: name.filter(|n| !n.is_empty()),
                description,
                activity_type: activity_type.filter(|t| !t.is_empty()),
                commute: toggle(commute, no_commute),
                trainer: toggle(trainer, no_trainer),
                gear_id: gear_id.filter(|g| !g.is_empty()),
            };
            commands::update_activity(&config, id, changes, cli.json).await
        }
        Commands::Auth { command } => match command {
            AuthCommands::Status => commands::status(&config).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", strava_cli::error::format_user_error(&e));
        std::process::exit(1);
    }

    Ok(())
}
