// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP handlers (spec §6 "REST API (minimum)"). Every handler delegates
//! straight into `mission-store`/`mission-engine`/`mission-signals`; the
//! only logic that lives here is request validation and error-to-status
//! mapping.

use crate::api::{
    ApiError, CreateArtifactRequest, CreateMissionRequest, CreateSignalRequest, HealthResponse,
    ImportDangerousRequest, ImportDangerousResponse, ListSignalsQuery, MissionSummary,
    RunAcceptedResponse,
};
use crate::validation;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use mission_core::error::ErrorCode;
use mission_core::{Artifact, Knowledge, Mission, RunMode, RunStatus, Scope};
use mission_engine::{HealStrategy, WorkflowEngine, WorkflowEngineConfig};
use mission_signals::SignalPipeline;
use mission_store::{ArtifactRepo, KnowledgeRepo, MissionRepo, ProjectRepo, SignalRepo, StoreError, TaskGroupRepo};
use uuid::Uuid;

type HandlerResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

fn store_error(err: StoreError) -> (StatusCode, Json<ApiError>) {
    match err {
        StoreError::NotFound { kind: "mission", id } => {
            (StatusCode::NOT_FOUND, Json(ApiError::new(ErrorCode::MissionNotFound, format!("mission {id} not found"))))
        }
        StoreError::NotFound { kind: "project", id } => {
            (StatusCode::NOT_FOUND, Json(ApiError::new(ErrorCode::ProjectNotFound, format!("project {id} not found"))))
        }
        StoreError::NotFound { kind: "agent", id } => {
            (StatusCode::NOT_FOUND, Json(ApiError::new(ErrorCode::AgentNotFound, format!("agent {id} not found"))))
        }
        StoreError::NotFound { kind: "signal", id } => {
            (StatusCode::NOT_FOUND, Json(ApiError::new(ErrorCode::SignalNotFound, format!("signal {id} not found"))))
        }
        StoreError::NotFound { kind, id } => {
            (StatusCode::NOT_FOUND, Json(ApiError::new(ErrorCode::MissionNotFound, format!("{kind} {id} not found"))))
        }
        other => (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError::new(ErrorCode::StoreCorrupted, other.to_string()))),
    }
}

fn validation_error(err: validation::RequestValidationError) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError::new(ErrorCode::MalformedPayload, err.to_string())))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string() })
}

pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse { status: "alive".to_string() })
}

// ---------------------------------------------------------------------------
// Missions
// ---------------------------------------------------------------------------

pub async fn list_missions(State(state): State<AppState>) -> HandlerResult<Json<Vec<MissionSummary>>> {
    let mission_repo = MissionRepo::new(&state.pool);
    let group_repo = TaskGroupRepo::new(&state.pool);
    let artifact_repo = ArtifactRepo::new(&state.pool);

    let missions = mission_repo.list().await.map_err(store_error)?;
    let mut summaries = Vec::with_capacity(missions.len());
    for mission in missions {
        let groups = group_repo.list_for_mission(mission.id).await.map_err(store_error)?;
        let artifacts = artifact_repo.list_for_mission(mission.id).await.map_err(store_error)?;
        summaries.push(MissionSummary {
            id: mission.id,
            title: mission.title,
            status: mission.status,
            run_mode: mission.run_mode,
            task_group_count: groups.len(),
            artifact_count: artifacts.len(),
            updated_at: mission.updated_at,
        });
    }
    Ok(Json(summaries))
}

pub async fn create_mission(
    State(state): State<AppState>,
    Json(req): Json<CreateMissionRequest>,
) -> HandlerResult<(StatusCode, Json<Mission>)> {
    validation::validate_create_mission(&req).map_err(validation_error)?;

    let project_repo = ProjectRepo::new(&state.pool);
    let project = project_repo.ensure_project(&req.project_slug).await.map_err(store_error)?;

    let now = Utc::now();
    let mut context = serde_json::json!({});
    if let Some(summary) = req.summary {
        context["summary"] = serde_json::Value::String(summary);
    }
    let mission = Mission {
        id: Uuid::new_v4(),
        project_id: project.id,
        title: req.title,
        status: req.status.unwrap_or(RunStatus::Pending),
        run_mode: RunMode::Sequential,
        context,
        created_at: now,
        updated_at: now,
    };

    let mission_repo = MissionRepo::new(&state.pool);
    mission_repo.create(&mission).await.map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(mission)))
}

pub async fn run_mission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> HandlerResult<(StatusCode, Json<RunAcceptedResponse>)> {
    let allow_self_heal = params.get("allow_self_heal").map(|v| v == "true").unwrap_or(false);
    let heal_strategy = if allow_self_heal { HealStrategy::SelfHeal } else { HealStrategy::Plain };

    let mut config = WorkflowEngineConfig::new(state.config.trace_dir.clone());
    config.heal_strategy = heal_strategy;

    let engine = WorkflowEngine::new(&state.pool, config);
    let outcome = engine.run(id).await.map_err(|err| match err {
        mission_engine::EngineError::MissionNotFound(mission_id) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(ErrorCode::MissionNotFound, format!("mission {mission_id} not found"))),
        ),
        mission_engine::EngineError::NoTaskGroups(mission_id) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::NoTaskGroups, format!("mission {mission_id} has no task groups"))),
        ),
        mission_engine::EngineError::UnsupportedRunMode(mode) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::UnsupportedRunMode, format!("run_mode {mode:?} is not supported"))),
        ),
        mission_engine::EngineError::Store(e) => store_error(e),
        other => (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError::new(ErrorCode::StoreCorrupted, other.to_string()))),
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RunAcceptedResponse { mission_id: id, status: outcome.status, run_id: outcome.run_id }),
    ))
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

pub async fn list_artifacts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> HandlerResult<Json<Vec<Artifact>>> {
    MissionRepo::new(&state.pool).get(id).await.map_err(store_error)?;
    let artifacts = ArtifactRepo::new(&state.pool).list_for_mission(id).await.map_err(store_error)?;
    Ok(Json(artifacts))
}

pub async fn create_artifact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateArtifactRequest>,
) -> HandlerResult<(StatusCode, Json<Artifact>)> {
    validation::validate_create_artifact(&req).map_err(validation_error)?;
    MissionRepo::new(&state.pool).get(id).await.map_err(store_error)?;

    let artifact = Artifact {
        id: Uuid::new_v4(),
        mission_id: id,
        task_id: None,
        kind: req.kind,
        scope: req.scope.unwrap_or(Scope::Mission),
        path: req.path,
        version: req.version,
        sha256: req.sha256,
        content_meta: req.content_meta,
        tags: req.tags.into_iter().collect(),
        created_at: Utc::now(),
    };
    ArtifactRepo::new(&state.pool).create(&artifact).await.map_err(store_error)?;

    if let Some(summary) = req.knowledge_summary {
        let knowledge = Knowledge {
            id: Uuid::new_v4(),
            source_artifact_id: artifact.id,
            version: artifact.version.clone(),
            scope: artifact.scope,
            sha256: artifact.sha256.clone(),
            summary: Some(mission_core::truncate_summary(&summary)),
            tags: req.knowledge_tags.into_iter().collect(),
            reusable: true,
            created_at: artifact.created_at,
        };
        KnowledgeRepo::new(&state.pool).create(&knowledge).await.map_err(store_error)?;
    }

    Ok((StatusCode::CREATED, Json(artifact)))
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

pub async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<ListSignalsQuery>,
) -> HandlerResult<Json<Vec<mission_core::Signal>>> {
    let pipeline = SignalPipeline::new(&state.pool);
    let signals = pipeline
        .list(query.project, query.status, query.kind.as_deref(), query.limit.unwrap_or(100))
        .await
        .map_err(signal_error)?;
    Ok(Json(signals))
}

pub async fn create_signal(
    State(state): State<AppState>,
    Json(req): Json<CreateSignalRequest>,
) -> HandlerResult<(StatusCode, Json<mission_core::Signal>)> {
    validation::validate_create_signal(&req).map_err(validation_error)?;
    let pipeline = SignalPipeline::new(&state.pool);
    let signal = pipeline
        .create(req.project_id, req.mission_id, req.kind, req.severity, req.message)
        .await
        .map_err(signal_error)?;
    Ok((StatusCode::CREATED, Json(signal)))
}

pub async fn import_dangerous_signals(
    State(state): State<AppState>,
    Json(req): Json<ImportDangerousRequest>,
) -> HandlerResult<Json<ImportDangerousResponse>> {
    let project_id = match req.project_id {
        Some(id) => id,
        None => {
            let key = req.project.ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiError::new(ErrorCode::MissingRequiredField, "one of project_id or project is required")),
                )
            })?;
            ProjectRepo::new(&state.pool).ensure_project(&key).await.map_err(store_error)?.id
        }
    };

    let pipeline = SignalPipeline::new(&state.pool);
    let imported = pipeline
        .import_dangerous(&req.path, project_id, req.mission_id, req.max_rows)
        .await
        .map_err(signal_error)?;
    Ok(Json(ImportDangerousResponse { imported }))
}

fn signal_error(err: mission_signals::SignalError) -> (StatusCode, Json<ApiError>) {
    match err {
        mission_signals::SignalError::Store(e) => store_error(e),
        mission_signals::SignalError::NotPending { id } => (
            StatusCode::CONFLICT,
            Json(ApiError::new(ErrorCode::SignalNotPending, format!("signal {id} is not pending"))),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(ErrorCode::EvidenceWriteFailed, other.to_string())),
        ),
    }
}

// ---------------------------------------------------------------------------
// Schema (additive debug route, spec §6 note)
// ---------------------------------------------------------------------------

pub async fn schema(Path(kind): Path<String>) -> Response {
    let schema = match kind.as_str() {
        "mission" => serde_json::to_value(schemars::schema_for!(Mission)),
        "artifact" => serde_json::to_value(schemars::schema_for!(Artifact)),
        "signal" => serde_json::to_value(schemars::schema_for!(mission_core::Signal)),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiError::new(ErrorCode::MalformedPayload, format!("unknown schema kind {kind}"))),
            )
                .into_response();
        }
    };
    match schema {
        Ok(value) => Json(value).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(ErrorCode::StoreCorrupted, err.to_string())),
        )
            .into_response(),
    }
}
