//! osutrack - osu! library tracker
//!
//! One-shot commands run a single pipeline or query and exit; `serve`
//! starts the HTTP surface.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use osutrack_common::config::{
    default_config_path, load_toml_config, resolve_database_path, resolve_default_player,
    resolve_osu_folder, OsuPaths,
};
use osutrack_common::db::init_database;
use osutrack_common::difficulty::calculator_from_config;
use osutrack_common::mods::{acronyms, parse_mods};
use osutrack_common::ProgressHandle;
use osutrack_ingest::{ScanCoordinator, SyncCoordinator, SyncOptions};
use osutrack_recommend::{
    focus_report, player_stats, suggest_stars, Focus, FocusThresholds, RecommendQuery, Recommender,
    RecommenderOptions,
};
use osutrack_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "osutrack")]
#[command(about = "Track osu! beatmaps and replays, and recommend what to play next")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// osu! installation folder (overrides OSU_FOLDER and the config file)
    #[arg(long)]
    osu_folder: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// Listen address (defaults to [server] bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Analyze beatmaps from osu!.db
    Sync,
    /// Import new replays from Data/r
    Scan,
    /// Pick one beatmap near a target difficulty
    Recommend {
        #[arg(long)]
        stars: f64,
        #[arg(long)]
        max_bpm: f64,
        /// Integer mask or acronyms ("HDDT")
        #[arg(long, default_value = "0")]
        mods: String,
        /// aim, speed or technical
        #[arg(long)]
        focus: Option<String>,
        /// Beatmap hashes to skip
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    /// Player statistics and a difficulty suggestion
    Stats {
        /// Defaults to DEFAULT_PLAYER or the configured player
        #[arg(long)]
        player: Option<String>,
        #[arg(long, default_value = "0")]
        mods: String,
    },
    /// Count analyzed beatmaps per skill focus
    FocusReport,
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    init_tracing(&config.logging.level);

    info!("osutrack {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    let db_path = resolve_database_path(cli.database.as_deref(), &config);
    let db = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let calculator = calculator_from_config(&config.difficulty);
    let osu_paths = resolve_osu_folder(cli.osu_folder.as_deref(), &config).map(OsuPaths::new);

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let state = AppState::new(db, calculator, config, config_path).with_osu_folder(cli.osu_folder);
            serve(state, &bind).await
        }
        Command::Sync => {
            let paths = require_osu_folder(osu_paths)?;
            let coordinator = SyncCoordinator::new(
                db,
                calculator,
                ProgressHandle::new(),
                SyncOptions::from_config(&config.pipeline),
            );
            let summary = coordinator.run(&paths).await?;
            println!(
                "Synced {} beatmaps: {} analyzed, {} failed, {} missing files",
                summary.snapshot_beatmaps, summary.analyzed, summary.failed, summary.missing_files
            );
            Ok(())
        }
        Command::Scan => {
            let paths = require_osu_folder(osu_paths)?;
            let coordinator =
                ScanCoordinator::from_config(db, calculator, ProgressHandle::new(), &config.pipeline);
            let summary = coordinator.run(&paths).await?;
            println!(
                "Scanned {} replays: {} new, {} ingested, {} enriched, {} failed",
                summary.discovered, summary.pending, summary.ingested, summary.enriched, summary.failed
            );
            Ok(())
        }
        Command::Recommend {
            stars,
            max_bpm,
            mods,
            focus,
            exclude,
        } => {
            let paths = require_osu_folder(osu_paths)?;
            let query = RecommendQuery::new(stars, max_bpm)
                .with_mods(parse_mods(&mods)?)
                .with_focus(Focus::parse_optional(focus.as_deref())?)
                .excluding(exclude);
            let recommender = Recommender::new(
                db,
                calculator,
                paths.songs_dir(),
                RecommenderOptions::from_config(&config.pipeline),
            );
            match recommender.recommend(&query).await? {
                Some(pick) => println!("{}", serde_json::to_string_pretty(&pick)?),
                None => println!("No beatmap matches {stars} stars at {max_bpm} BPM"),
            }
            Ok(())
        }
        Command::Stats { player, mods } => {
            let Some(player) = player.or_else(|| resolve_default_player(&config)) else {
                bail!("No player given and no default player configured");
            };
            let mods = parse_mods(&mods)?;
            let stats = player_stats(&db, &player).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            match suggest_stars(&db, &player, mods).await? {
                Some(suggestion) => println!("{}", serde_json::to_string_pretty(&suggestion)?),
                None => println!("No analyzed plays with {}", mod_label(mods)),
            }
            Ok(())
        }
        Command::FocusReport => {
            let report = focus_report(&db, &FocusThresholds::default()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn require_osu_folder(paths: Option<OsuPaths>) -> Result<OsuPaths> {
    paths.context("osu! folder not configured: pass --osu-folder, set OSU_FOLDER or osu_folder in the config file")
}

fn mod_label(mods: u32) -> String {
    let names = acronyms(mods);
    if names.is_empty() {
        "no mods".to_string()
    } else {
        names.concat()
    }
}

async fn serve(state: AppState, bind: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {bind}"))?;
    info!("Listening on http://{bind}");
    info!("Health check: http://{bind}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
