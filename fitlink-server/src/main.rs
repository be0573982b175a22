use clap::Parser;
use fitlink_core::store::InMemoryStore;
use fitlink_core::FitlinkConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use fitlink_server::server;
use fitlink_server::state::{seed_exercises, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "fitlink.toml")]
    config: String,

    #[arg(long)]
    health: bool,

    /// Keep links in memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,

    /// JSON array of exercises to load in `--in-memory` mode
    #[arg(long, requires = "in_memory")]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match FitlinkConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let socket_path = shellexpand::tilde(&config.service.socket_path).into_owned();

    let state = if args.in_memory {
        let store = Arc::new(InMemoryStore::new());
        if let Some(seed) = &args.seed {
            let path = PathBuf::from(shellexpand::tilde(&seed.to_string_lossy()).as_ref());
            seed_exercises(&store, &path).await?;
        }
        tracing::warn!("Running with in-memory storage; links are lost on exit");
        AppState::in_memory(store, config.links.clone(), socket_path.clone())
    } else {
        // Connect to DB
        let pool = match fitlink_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };

        if args.health {
            match fitlink_core::db::health_check(&pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            }
            println!("✅ Fitlink DB health check passed");
            return Ok(());
        }

        if config.database.apply_schema {
            fitlink_core::db::apply_schema(&pool).await?;
        }

        AppState::postgres(pool, config.links.clone(), socket_path.clone())
    };
    let state = Arc::new(state);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // HTTP REST API alongside the socket, if enabled
    if config.http.enabled {
        let http_state = state.clone();
        let http_config = config.http.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = fitlink_server::http::start_http_server(
                http_state,
                &http_config.host,
                http_config.port,
                http_shutdown,
            )
            .await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    tracing::info!(
        storage = state.storage_name(),
        max_links_per_type = config.links.max_links_per_type,
        "Fitlink server starting"
    );
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}
