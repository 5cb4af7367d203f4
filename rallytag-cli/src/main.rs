mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use rallytag_core::Storage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rallytag")]
#[command(about = "Out-of-band match verification: host a match, scan to confirm")]
#[command(version)]
struct Cli {
    /// Data directory for match storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Acting user (defaults to $RALLYTAG_USER)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a new match and wait for participants to verify
    Host {
        /// Match type: singles or doubles (prompted if omitted)
        #[arg(short, long)]
        match_type: Option<String>,
        /// Base URL the scannable code is built against
        #[arg(short, long)]
        base_url: Option<String>,
    },
    /// Submit a scanned or pasted payload (URL or legacy JSON)
    Join {
        /// Raw payload
        payload: String,
    },
    /// Submit a manually typed match id and code
    Verify {
        /// Match ID
        match_id: String,
        /// Verification code
        code: String,
    },
    /// Run the capture loop over a frame script file and verify the
    /// first decoded code (one line per frame, blank line = no code)
    Scan {
        /// Frame script path, or - for stdin
        frames: PathBuf,
    },
    /// Open a verification link, preserving it if nobody is signed in
    Open {
        /// Verification URL
        link: String,
    },
    /// Resume a verification preserved by a previous `open`
    Resume,
    /// Show a match and its participants
    Status {
        /// Match ID
        match_id: String,
    },
    /// List stored matches
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "rallytag={},rallytag_scan={},rallytag_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CliConfig::default();
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir.clone());

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    let storage = Arc::new(Storage::new(&data_dir.join("rallytag.db")).await?);

    let result = match cli.command {
        Commands::Host {
            match_type,
            base_url,
        } => {
            commands::host_match(
                storage,
                &cli.user,
                match_type.as_deref(),
                &base_url.unwrap_or_else(|| config.base_url.clone()),
                config.poll_interval_secs,
            )
            .await
        }
        Commands::Join { payload } => commands::join_match(storage, &cli.user, &payload).await,
        Commands::Verify { match_id, code } => {
            commands::verify_typed(storage, &cli.user, &match_id, &code).await
        }
        Commands::Scan { frames } => commands::scan_frames(storage, &cli.user, &frames).await,
        Commands::Open { link } => commands::open_link(storage, &cli.user, &data_dir, &link).await,
        Commands::Resume => commands::resume_pending(storage, &cli.user, &data_dir).await,
        Commands::Status { match_id } => commands::show_status(storage, &match_id).await,
        Commands::List => commands::list_matches(storage).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
