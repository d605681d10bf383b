// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations for the `mission` CLI (spec §4.9/§6).
//!
//! Every function returns the process exit code rather than calling
//! [`std::process::exit`] directly, so `main` stays the single place that
//! terminates the process.

use crate::config::{load_role_config, resolve_command};
use crate::format::{OutputFormat, RoleOutcome, RunSummary};
use anyhow::Context;
use chrono::Utc;
use mission_audit::AuditChain;
use mission_config::{EngineConfig, RoleConfig};
use mission_core::AuditRecord;
use mission_evidence::{EvidenceEmitter, EvidenceRecordBuilder, FileRef};
use mission_safeops::{should_auto_approve, AutomationLevel};
use mission_supervisor::process::{spawn_batch, SpawnContext, StreamSession};
use mission_supervisor::registry::{SessionMeta, StreamRegistry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Process exit codes, per spec §6 "Exit codes (CLI)".
pub mod exit {
    /// Operation succeeded.
    pub const OK: i32 = 0;
    /// Operation ran but failed (includes HTTP responses >= 400).
    pub const FAILURE: i32 = 1;
    /// Misuse of the CLI (bad arguments, invalid combination of flags).
    pub const MISUSE: i32 = 2;
    /// A subprocess or HTTP call exceeded its configured timeout.
    pub const TIMEOUT: i32 = 124;
    /// A guardrail blocked the operation outright. Unreachable today since
    /// [`mission_safeops::should_auto_approve`] never hard-blocks — it
    /// routes unapproved commands to a pending signal instead (spec §4.8).
    /// Reserved for when SafeOps policy gains a deny path.
    pub const GUARDRAIL_BLOCKED: i32 = 126;
    /// The operation was interrupted (Ctrl-C/SIGINT).
    pub const INTERRUPTED: i32 = 130;
}

fn audit_record(actor: &str, event: &str, metadata: serde_json::Value) -> AuditRecord {
    AuditRecord {
        ts: Utc::now(),
        actor: actor.to_string(),
        event: event.to_string(),
        rule_ids: Vec::new(),
        policy_refs: Vec::new(),
        reasoning_digest: None,
        inputs_hash: None,
        outputs_hash: None,
        approval_state: None,
        approvals_row_id: None,
        metadata,
    }
}

fn write_json(path: &Path, value: &serde_json::Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("write {}", path.display()))
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

/// Parameters for `serve`.
pub struct ServeParams {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path to a `mission.toml` configuration file.
    pub config: Option<PathBuf>,
    /// sqlite database URL.
    pub database_url: String,
}

/// Start the daemon's HTTP server in-process, probe `/health` once it is
/// listening, and log the result (spec §4.9 `serve`).
pub async fn cmd_serve(params: ServeParams) -> anyhow::Result<i32> {
    let mut config = mission_config::load_config(params.config.as_deref())
        .with_context(|| "load mission.toml")?;
    mission_config::apply_env_overrides(&mut config);

    let pool = mission_store::connect(&params.database_url)
        .await
        .with_context(|| format!("connect to store at {}", params.database_url))?;
    let state = mission_daemon::AppState::new(pool, config);
    let app = mission_daemon::build_router(state);

    let bind = format!("{}:{}", params.host, params.port);
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("bind {bind}"))?;
    tracing::info!(target: "mission.cli", bind = %bind, "mission-daemon listening");

    let health_url = format!("http://{bind}/health");
    let probe_bind = bind.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        match reqwest::get(&health_url).await {
            Ok(resp) => tracing::info!(target: "mission.cli", bind = %probe_bind, status = %resp.status(), "health probe"),
            Err(err) => tracing::warn!(target: "mission.cli", bind = %probe_bind, %err, "health probe failed"),
        }
    });

    axum::serve(listener, app).await.context("serve")?;
    Ok(exit::OK)
}

// ---------------------------------------------------------------------------
// call
// ---------------------------------------------------------------------------

/// HTTP method accepted by `call`.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CallMethod {
    /// GET.
    Get,
    /// POST.
    Post,
}

impl std::fmt::Display for CallMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Parameters for `call`.
pub struct CallParams {
    /// Path appended to `base_url`, e.g. `/api/missions`.
    pub endpoint: String,
    /// HTTP method.
    pub method: CallMethod,
    /// Raw JSON body, sent only with `POST`.
    pub data: Option<String>,
    /// Daemon base URL.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Free-text tag identifying the calling engine, recorded in evidence.
    pub engine: Option<String>,
    /// Directory per-call logs and evidence are written under.
    pub trace_dir: PathBuf,
}

/// Perform a generic REST call against the daemon, logging the
/// request/response and emitting an evidence record (spec §4.9 `call`).
pub async fn cmd_call(params: CallParams) -> anyhow::Result<i32> {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(params.timeout)).build()?;
    let url = format!("{}{}", params.base_url.trim_end_matches('/'), params.endpoint);

    let mut builder = match params.method {
        CallMethod::Get => client.get(&url),
        CallMethod::Post => client.post(&url),
    };
    if let (CallMethod::Post, Some(data)) = (params.method, &params.data) {
        let body: serde_json::Value = serde_json::from_str(data).context("parse --data as JSON")?;
        builder = builder.json(&body);
    }

    let log_path = params.trace_dir.join(format!("call-{}.log", Uuid::new_v4()));

    let (exit_code, log_body, status_tag) = match builder.send().await {
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let log = format!(
                "# Method: {:?}\n# URL: {url}\n# Status: {status}\n\n=== RESPONSE BODY ===\n{body}\n",
                params.method
            );
            let code = if status.is_success() { exit::OK } else { exit::FAILURE };
            let tag = if status.is_success() { "ok" } else { "failed" };
            (code, log, tag)
        }
        Err(err) if err.is_timeout() => (
            exit::TIMEOUT,
            format!("# Method: {:?}\n# URL: {url}\n\n=== ERROR ===\ntimed out: {err}\n", params.method),
            "timeout",
        ),
        Err(err) => {
            (exit::FAILURE, format!("# Method: {:?}\n# URL: {url}\n\n=== ERROR ===\n{err}\n", params.method), "failed")
        }
    };

    std::fs::create_dir_all(&params.trace_dir).ok();
    std::fs::write(&log_path, &log_body).with_context(|| format!("write {}", log_path.display()))?;

    EvidenceEmitter::default().emit(
        &EvidenceRecordBuilder::new("orchestrator_call")
            .file(FileRef::from_disk(log_path.to_string_lossy().to_string())?)
            .status(status_tag)
            .metrics(serde_json::json!({"engine": params.engine, "endpoint": params.endpoint}))
            .build(),
    );

    Ok(exit_code)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Parameters for `run`.
pub struct RunParams {
    /// Roles to spawn, in order.
    pub roles: Vec<String>,
    /// Command template, e.g. `"claude --role {ROLE}"`.
    pub engine: String,
    /// Optional mission id this run is scoped to; a fresh id is minted if
    /// absent.
    pub mission: Option<Uuid>,
    /// Per-role spawn timeout.
    pub timeout: Duration,
    /// Directory batch/stream trace logs and run artifacts are written
    /// under.
    pub trace_dir: PathBuf,
    /// Spawn roles concurrently rather than sequentially.
    pub parallel: bool,
    /// Worker pool size for `--parallel`. Defaults to `roles.len()`.
    pub max_workers: Option<usize>,
    /// Optional Workflow Engine HTTP endpoint notified on success.
    pub workflow_endpoint: Option<String>,
    /// Stream mode with exactly one role and attachable stdin.
    pub chat_mode: bool,
    /// Base directory for role mailboxes.
    pub message_bus_path: Option<PathBuf>,
    /// Path to a `--role-config` TOML override file.
    pub role_config: Option<PathBuf>,
    /// Project id signals are recorded against.
    pub signals_project_id: Option<Uuid>,
    /// Base URL of a remote signals API.
    pub signals_base_url: Option<String>,
    /// Output format for the printed summary.
    pub format: OutputFormat,
}

/// Drive `run`: resolve engine config, consult SafeOps, spawn every role,
/// and record plan/test/audit artifacts (spec §4.9 `run`).
pub async fn cmd_run(params: RunParams) -> anyhow::Result<i32> {
    if params.roles.is_empty() {
        eprintln!("error: --roles must name at least one role");
        return Ok(exit::MISUSE);
    }
    if params.chat_mode && params.parallel {
        eprintln!("error: --chat-mode cannot be combined with --parallel");
        return Ok(exit::MISUSE);
    }
    if params.chat_mode && params.roles.len() != 1 {
        eprintln!("error: --chat-mode requires exactly one role");
        return Ok(exit::MISUSE);
    }

    let engine =
        EngineConfig { command_template: params.engine.clone(), workdir: None, timeout_secs: params.timeout.as_secs() };
    let role_overrides: BTreeMap<String, RoleConfig> = match &params.role_config {
        Some(path) => load_role_config(path)?,
        None => BTreeMap::new(),
    };

    let run_id = Uuid::new_v4();
    let mission_id = params.mission.unwrap_or_else(Uuid::new_v4);
    let run_dir = params.trace_dir.join(run_id.to_string());
    std::fs::create_dir_all(&run_dir)?;

    consult_safeops(&params, mission_id).await;

    let plan = serde_json::json!({
        "mission_id": mission_id,
        "run_id": run_id,
        "roles": params.roles,
        "engine": params.engine,
        "chat_mode": params.chat_mode,
        "parallel": params.parallel,
    });
    let plan_path = run_dir.join("plan.json");
    write_json(&plan_path, &plan)?;

    let chain = AuditChain::new(run_dir.clone());
    chain.append(&audit_record("cli", "PLAN", plan.clone()))?;

    let started = std::time::Instant::now();
    let outcomes = if params.chat_mode {
        vec![run_chat_role(&params, &engine, &role_overrides, mission_id, run_id, &run_dir).await?]
    } else if params.parallel {
        run_roles_parallel(&params, &engine, &role_overrides, mission_id, run_id, &run_dir).await?
    } else {
        run_roles_sequential(&params, &engine, &role_overrides, mission_id, run_id, &run_dir).await?
    };
    let duration_ms = started.elapsed().as_millis();

    let summary = RunSummary {
        run_id,
        mission_id,
        status: if outcomes.iter().all(RoleOutcome::ok) { "ok".to_string() } else { "failed".to_string() },
        roles: outcomes,
    };

    let test_report_path = run_dir.join("test_report.json");
    write_json(&test_report_path, &serde_json::to_value(&summary)?)?;

    let audit_summary = serde_json::json!({"run_id": run_id, "status": summary.status, "duration_ms": duration_ms});
    for event in ["TEST", "PATCH", "APPLY"] {
        chain.append(&audit_record("cli", event, audit_summary.clone()))?;
    }
    let audit_json_path = run_dir.join("audit.json");
    write_json(&audit_json_path, &audit_summary)?;

    if summary.status == "ok"
        && let Some(endpoint) = &params.workflow_endpoint
    {
        notify_workflow_endpoint(endpoint, mission_id, run_id, &params.roles).await;
    }

    EvidenceEmitter::default().emit(
        &EvidenceRecordBuilder::new("orchestrator_run")
            .file(FileRef::from_disk(plan_path.to_string_lossy().to_string())?)
            .file(FileRef::from_disk(test_report_path.to_string_lossy().to_string())?)
            .file(FileRef::from_disk(audit_json_path.to_string_lossy().to_string())?)
            .status(&summary.status)
            .metrics(serde_json::json!({"duration_ms": duration_ms, "role_count": summary.roles.len()}))
            .build(),
    );

    println!("{}", summary.render(&params.format));
    Ok(if summary.status == "ok" { exit::OK } else { exit::FAILURE })
}

async fn consult_safeops(params: &RunParams, mission_id: Uuid) {
    let approved = should_auto_approve("orchestrator_run", Some(mission_id), AutomationLevel::Manual);
    if approved {
        return;
    }
    let project_id = params.signals_project_id.unwrap_or_else(Uuid::nil);
    let payload = serde_json::json!({
        "project_id": project_id,
        "mission_id": mission_id,
        "type": "dangerous_command",
        "severity": "warning",
        "message": format!("orchestrator_run for roles {:?} awaiting review", params.roles),
    });
    match &params.signals_base_url {
        Some(base_url) => {
            let url = format!("{}/api/signals", base_url.trim_end_matches('/'));
            if let Err(err) = reqwest::Client::new().post(&url).json(&payload).send().await {
                tracing::warn!(target: "mission.cli", %err, "failed to post dangerous-command signal");
            }
        }
        None => {
            tracing::warn!(target: "mission.cli", mission_id = %mission_id, "orchestrator_run signal pending; no --signals-base-url configured to route it");
        }
    }
}

async fn notify_workflow_endpoint(endpoint: &str, mission_id: Uuid, run_id: Uuid, roles: &[String]) {
    let body = serde_json::json!({"mission_id": mission_id, "run_id": run_id, "roles": roles});
    if let Err(err) = reqwest::Client::new().post(endpoint).json(&body).send().await {
        tracing::warn!(target: "mission.cli", %err, endpoint, "workflow endpoint notification failed");
    }
}

async fn run_roles_sequential(
    params: &RunParams,
    engine: &EngineConfig,
    role_overrides: &BTreeMap<String, RoleConfig>,
    mission_id: Uuid,
    run_id: Uuid,
    run_dir: &Path,
) -> anyhow::Result<Vec<RoleOutcome>> {
    let mut outcomes = Vec::with_capacity(params.roles.len());
    for (index, role) in params.roles.iter().enumerate() {
        outcomes.push(
            spawn_role_batch_inner(
                engine,
                role_overrides,
                mission_id,
                run_id,
                run_dir,
                role,
                index as u32,
                params.timeout,
                params.message_bus_path.as_deref(),
            )
            .await?,
        );
    }
    Ok(outcomes)
}

async fn run_roles_parallel(
    params: &RunParams,
    engine: &EngineConfig,
    role_overrides: &BTreeMap<String, RoleConfig>,
    mission_id: Uuid,
    run_id: Uuid,
    run_dir: &Path,
) -> anyhow::Result<Vec<RoleOutcome>> {
    let max_workers = params.max_workers.unwrap_or(params.roles.len()).max(1);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(max_workers));
    let mut tasks = Vec::with_capacity(params.roles.len());

    for (index, role) in params.roles.iter().enumerate() {
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
        let engine = engine.clone();
        let role_overrides = role_overrides.clone();
        let role = role.clone();
        let run_dir = run_dir.to_path_buf();
        let message_bus_path = params.message_bus_path.clone();
        let timeout = params.timeout;
        tasks.push(tokio::spawn(async move {
            let _permit = permit;
            spawn_role_batch_inner(&engine, &role_overrides, mission_id, run_id, &run_dir, &role, index as u32, timeout, message_bus_path.as_deref()).await
        }));
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        outcomes.push(task.await.context("role spawn task panicked")??);
    }
    Ok(outcomes)
}

async fn spawn_role_batch_inner(
    engine: &EngineConfig,
    role_overrides: &BTreeMap<String, RoleConfig>,
    mission_id: Uuid,
    run_id: Uuid,
    run_dir: &Path,
    role: &str,
    index: u32,
    timeout: Duration,
    message_bus_path: Option<&Path>,
) -> anyhow::Result<RoleOutcome> {
    let command = resolve_command(role, engine, role_overrides);
    let ctx = SpawnContext { mission_id, run_id, trace_dir: run_dir.to_path_buf(), index: Some(index), role: Some(role.to_string()) };
    let result = spawn_batch(&command, &ctx, timeout).await?;

    let status = if !result.timed_out && result.return_code == Some(0) { "completed" } else { "failed" };
    mission_bus::send(
        role,
        serde_json::json!({"run_id": run_id, "status": status, "return_code": result.return_code, "timed_out": result.timed_out}),
        message_bus_path,
    )?;

    Ok(RoleOutcome {
        role: role.to_string(),
        return_code: result.return_code,
        timed_out: result.timed_out,
        trace_path: result.trace_path.to_string_lossy().to_string(),
    })
}

/// Name of the port file `run --chat-mode` writes under `<run_dir>/`, read
/// by `attach` to find the loopback server for a live session.
pub const ATTACH_PORT_FILE: &str = "attach.port";

#[derive(Clone)]
struct AttachState {
    registry: Arc<StreamRegistry>,
}

async fn send_to_session(
    axum::extract::State(state): axum::extract::State<AttachState>,
    axum::extract::Path(run_id): axum::extract::Path<Uuid>,
    axum::extract::Json(body): axum::extract::Json<serde_json::Value>,
) -> axum::http::StatusCode {
    let Some(text) = body.get("line").and_then(|v| v.as_str()) else {
        return axum::http::StatusCode::BAD_REQUEST;
    };
    match state.registry.send_line(run_id, text).await {
        Ok(Ok(())) => axum::http::StatusCode::OK,
        Ok(Err(_)) => axum::http::StatusCode::BAD_GATEWAY,
        Err(_) => axum::http::StatusCode::NOT_FOUND,
    }
}

async fn run_chat_role(
    params: &RunParams,
    engine: &EngineConfig,
    role_overrides: &BTreeMap<String, RoleConfig>,
    mission_id: Uuid,
    run_id: Uuid,
    run_dir: &Path,
) -> anyhow::Result<RoleOutcome> {
    let role = &params.roles[0];
    let command = resolve_command(role, engine, role_overrides);
    let ctx = SpawnContext { mission_id, run_id, trace_dir: run_dir.to_path_buf(), index: None, role: Some(role.clone()) };

    let session = StreamSession::spawn(&command, &ctx).await?;
    let trace_path = session.trace_path().to_path_buf();

    let registry = Arc::new(StreamRegistry::new());
    registry.register(run_id, session, SessionMeta { role: Some(role.clone()), mission_id }).await;

    let app = axum::Router::new()
        .route("/sessions/{run_id}/send", axum::routing::post(send_to_session))
        .with_state(AttachState { registry: registry.clone() });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    std::fs::write(run_dir.join(ATTACH_PORT_FILE), port.to_string())?;
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    // Keep the session registered (and so attachable over the loopback
    // server) while polling for exit, rather than taking it out of the
    // registry and blocking on `wait` directly.
    let started = std::time::Instant::now();
    let code = loop {
        match registry.try_wait(run_id).await {
            Ok(Some(code)) => break Some(code),
            Ok(None) if started.elapsed() < params.timeout => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            _ => break None,
        }
    };
    if let Some((mut session, _meta)) = registry.deregister(run_id).await
        && code.is_none()
    {
        session.terminate(Duration::from_secs(2)).await;
    }
    server.abort();
    let _ = std::fs::remove_file(run_dir.join(ATTACH_PORT_FILE));

    let status = if code == Some(0) { "completed" } else { "failed" };
    mission_bus::send(role, serde_json::json!({"run_id": run_id, "status": status, "return_code": code}), params.message_bus_path.as_deref())?;

    EvidenceEmitter::default().emit(
        &EvidenceRecordBuilder::new("orchestrator_chat_attach")
            .file(FileRef::from_disk(trace_path.to_string_lossy().to_string())?)
            .status(status)
            .build(),
    );

    Ok(RoleOutcome { role: role.clone(), return_code: code, timed_out: code.is_none(), trace_path: trace_path.to_string_lossy().to_string() })
}

// ---------------------------------------------------------------------------
// attach
// ---------------------------------------------------------------------------

/// Parameters for `attach`.
pub struct AttachParams {
    /// Run id of the live chat-mode session to attach to.
    pub run_id: Uuid,
    /// A single line to send; if absent, stdin is read until EOF.
    pub line: Option<String>,
    /// Directory `run --chat-mode` wrote its port file under.
    pub trace_dir: PathBuf,
}

/// Pipe stdin into a live `run --chat-mode` session by run id, over the
/// loopback HTTP server that session started (spec §4.9 `attach`).
///
/// The Stream Registry is process-local (spec §4.3), so a second CLI
/// invocation cannot reach the original process's session directly; instead
/// it relays lines to the small HTTP server `run --chat-mode` starts for
/// exactly this purpose.
pub async fn cmd_attach(params: AttachParams) -> anyhow::Result<i32> {
    let port_path = params.trace_dir.join(params.run_id.to_string()).join(ATTACH_PORT_FILE);
    let port: u16 = match std::fs::read_to_string(&port_path) {
        Ok(s) => s.trim().parse().context("parse attach port file")?,
        Err(_) => {
            eprintln!("error: no live chat session registered for run {}", params.run_id);
            return Ok(exit::FAILURE);
        }
    };
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{port}/sessions/{}/send", params.run_id);

    let lines: Vec<String> = match &params.line {
        Some(line) => vec![line.clone()],
        None => std::io::stdin().lines().collect::<std::io::Result<_>>()?,
    };
    if lines.is_empty() {
        return Ok(exit::OK);
    }

    for line in lines {
        let resp = client.post(&url).json(&serde_json::json!({"line": line})).send().await;
        match resp {
            Ok(r) if r.status().is_success() => {}
            _ => return Ok(exit::FAILURE),
        }
    }
    Ok(exit::OK)
}
