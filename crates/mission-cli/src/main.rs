// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! `mission` — the Mission Orchestrator CLI (spec §4.9/§6): `serve` starts
//! the REST control plane, `call` issues a generic REST request against it,
//! `run` fans a set of roles out to agent CLIs, and `attach` pipes stdin
//! into a live `run --chat-mode` session.

mod commands;
mod config;
mod format;

use clap::{Parser, Subcommand};
use commands::{exit, AttachParams, CallMethod, CallParams, RunParams, ServeParams};
use format::OutputFormat;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "mission", version, about = "Mission Orchestrator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the REST control plane and probe its health once.
    Serve {
        /// Bind host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Bind port.
        #[arg(long, default_value_t = 8089)]
        port: u16,
        /// Path to a `mission.toml` configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// sqlite database URL.
        #[arg(long, default_value = "sqlite://mission.db?mode=rwc")]
        database_url: String,
    },
    /// Perform a generic REST call against a running daemon.
    Call {
        /// Path appended to `--base-url`, e.g. `/api/missions`.
        #[arg(long)]
        endpoint: String,
        /// HTTP method.
        #[arg(long, value_enum, default_value_t = CallMethod::Get)]
        method: CallMethod,
        /// Raw JSON request body, sent only with `--method post`.
        #[arg(long)]
        data: Option<String>,
        /// Daemon base URL.
        #[arg(long, default_value = "http://127.0.0.1:8089")]
        base_url: String,
        /// Request timeout in seconds.
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        /// Free-text tag identifying the calling engine, for evidence.
        #[arg(long)]
        engine: Option<String>,
        /// Directory per-call logs and evidence are written under.
        #[arg(long, default_value = "trace")]
        trace_dir: PathBuf,
    },
    /// Spawn one agent CLI per role and record plan/test/audit artifacts.
    Run {
        /// Comma-separated list of roles to spawn.
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
        /// Command template, e.g. `"claude --role {ROLE}"`.
        #[arg(long, default_value = "echo {ROLE}")]
        engine: String,
        /// Mission id this run is scoped to; a fresh id is minted if absent.
        #[arg(long)]
        mission: Option<Uuid>,
        /// Per-role spawn timeout, in seconds.
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Directory batch/stream trace logs and run artifacts are written
        /// under.
        #[arg(long, default_value = "trace")]
        trace_dir: PathBuf,
        /// Spawn roles concurrently rather than sequentially.
        #[arg(long)]
        parallel: bool,
        /// Worker pool size for `--parallel`. Defaults to the role count.
        #[arg(long)]
        max_workers: Option<usize>,
        /// Workflow Engine HTTP endpoint notified on success.
        #[arg(long)]
        workflow_endpoint: Option<String>,
        /// Stream mode with exactly one role and attachable stdin.
        #[arg(long)]
        chat_mode: bool,
        /// Base directory for role mailboxes.
        #[arg(long)]
        message_bus_path: Option<PathBuf>,
        /// Path to a `--role-config` TOML override file.
        #[arg(long)]
        role_config: Option<PathBuf>,
        /// Project id signals are recorded against.
        #[arg(long)]
        signals_project_id: Option<Uuid>,
        /// Base URL of a remote signals API.
        #[arg(long)]
        signals_base_url: Option<String>,
        /// Output format for the printed summary.
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Pipe stdin into a live `run --chat-mode` session.
    Attach {
        /// Run id of the live chat-mode session.
        #[arg(long)]
        run_id: Uuid,
        /// A single line to send; if absent, stdin is read until EOF.
        #[arg(long)]
        line: Option<String>,
        /// Directory `run --chat-mode` wrote its port file under.
        #[arg(long, default_value = "trace")]
        trace_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { EnvFilter::new("mission=debug") } else { EnvFilter::new("mission=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let code = match cli.command {
        Commands::Serve { host, port, config, database_url } => {
            commands::cmd_serve(ServeParams { host, port, config, database_url }).await?
        }
        Commands::Call { endpoint, method, data, base_url, timeout, engine, trace_dir } => {
            commands::cmd_call(CallParams { endpoint, method, data, base_url, timeout, engine, trace_dir }).await?
        }
        Commands::Run {
            roles,
            engine,
            mission,
            timeout,
            trace_dir,
            parallel,
            max_workers,
            workflow_endpoint,
            chat_mode,
            message_bus_path,
            role_config,
            signals_project_id,
            signals_base_url,
            format,
        } => {
            let Ok(format) = format.parse::<OutputFormat>() else {
                eprintln!("error: unknown --format '{format}'");
                std::process::exit(exit::MISUSE);
            };
            commands::cmd_run(RunParams {
                roles,
                engine,
                mission,
                timeout: Duration::from_secs(timeout),
                trace_dir,
                parallel,
                max_workers,
                workflow_endpoint,
                chat_mode,
                message_bus_path,
                role_config,
                signals_project_id,
                signals_base_url,
                format,
            })
            .await?
        }
        Commands::Attach { run_id, line, trace_dir } => {
            commands::cmd_attach(AttachParams { run_id, line, trace_dir }).await?
        }
    };

    std::process::exit(code);
}
