use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use overflights::config::AppConfig;
use overflights::log_format::TargetFirstFormat;

mod commands;

use commands::{
    ImportArgs, handle_batch_import, handle_export_segments, handle_import, handle_import_edited,
    handle_import_landings, handle_migrate,
};

#[derive(Parser)]
#[command(name = "overflights")]
#[command(about = "Import aircraft GPS tracks as flight segments")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $OVERFLIGHTS_CONFIG, then ./overflights.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a single track file
    Import {
        /// GPX, GDB, KML, CSV or spreadsheet track file
        track: PathBuf,

        #[command(flatten)]
        args: ImportArgs,

        /// Format and check the track without writing or archiving anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Import every track matching a glob pattern or under a directory
    BatchImport {
        /// Glob pattern, or a directory with --walk-dir-tree
        search: String,

        /// Treat the search string as a directory and import everything below it
        #[arg(long)]
        walk_dir_tree: bool,

        #[command(flatten)]
        args: ImportArgs,

        /// Email the batch report when finished
        #[arg(long)]
        email: bool,

        #[arg(long)]
        dry_run: bool,
    },
    /// Write the segment editor document for a track
    ExportSegments {
        track: PathBuf,

        #[command(flatten)]
        args: ImportArgs,

        /// Output file (stdout when omitted)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
    },
    /// Import a track edited in the segment editor
    ImportEdited {
        /// Editor document, or a single feature collection with --track-info
        edited: PathBuf,

        #[arg(long)]
        track_info: Option<PathBuf>,

        #[command(flatten)]
        args: ImportArgs,

        #[arg(long)]
        dry_run: bool,
    },
    /// Record reported landings for a flight
    ImportLandings {
        /// JSON landing submission
        submission: PathBuf,

        /// Replace landings already reported for the flight
        #[arg(long)]
        force: bool,

        #[arg(long)]
        dry_run: bool,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("overflights=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(TargetFirstFormat::for_stderr())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { track, args, dry_run } => handle_import(&config, &track, &args, dry_run).await,
        Commands::BatchImport {
            search,
            walk_dir_tree,
            args,
            email,
            dry_run,
        } => handle_batch_import(&config, &search, walk_dir_tree, &args, email, dry_run).await,
        Commands::ExportSegments { track, args, output } => {
            handle_export_segments(&config, &track, &args, output.as_ref()).await
        }
        Commands::ImportEdited {
            edited,
            track_info,
            args,
            dry_run,
        } => handle_import_edited(&config, &edited, track_info.as_deref(), &args, dry_run).await,
        Commands::ImportLandings {
            submission,
            force,
            dry_run,
        } => handle_import_landings(&submission, force, dry_run).await,
        Commands::Migrate => handle_migrate().await,
    }
}
