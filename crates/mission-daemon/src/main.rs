#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use mission_daemon::{build_router, AppState};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mission-daemon", version, about = "Mission Orchestrator REST control plane")]
struct Args {
    /// Bind host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8089)]
    port: u16,

    /// Path to a `mission.toml` configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// sqlite database URL, e.g. `sqlite://mission.db` or `sqlite::memory:`.
    #[arg(long, default_value = "sqlite://mission.db?mode=rwc")]
    database_url: String,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug { EnvFilter::new("mission=debug") } else { EnvFilter::new("mission=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = mission_config::load_config(args.config.as_deref())
        .with_context(|| "load mission.toml")?;
    mission_config::apply_env_overrides(&mut config);
    for warning in mission_config::validate_config(&config).with_context(|| "validate config")? {
        tracing::warn!(target: "mission.daemon", %warning, "configuration warning");
    }

    let pool = mission_store::connect(&args.database_url)
        .await
        .with_context(|| format!("connect to store at {}", args.database_url))?;

    let state = AppState::new(pool, config);
    let app = build_router(state);

    let bind = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("bind {bind}"))?;
    info!(bind = %bind, "mission-daemon listening");

    axum::serve(listener, app).await.context("serve")
}
