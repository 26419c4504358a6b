use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use crate::{LessonRecord, ScheduleSnapshot, SqliteScheduleStore, SyncOutcome, SyncPipeline};

#[derive(Clone)]
pub struct AppState {
    store: Arc<SqliteScheduleStore>,
    pipeline: Arc<SyncPipeline>,
}

impl AppState {
    pub fn new(store: Arc<SqliteScheduleStore>, pipeline: Arc<SyncPipeline>) -> Self {
        Self { store, pipeline }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<crate::PersistenceError> for ApiError {
    fn from(value: crate::PersistenceError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/structure", get(get_structure))
        .route("/groups/:group/:date", get(group_lessons))
        .route("/teachers/:teacher/:date", get(teacher_lessons))
        .route("/sync", post(trigger_sync))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    store: Arc<SqliteScheduleStore>,
    pipeline: Arc<SyncPipeline>,
) -> std::io::Result<()> {
    let app = router(AppState::new(store, pipeline));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_structure(State(state): State<AppState>) -> Json<ScheduleSnapshot> {
    let snapshot = state.pipeline.snapshot().current();
    Json(ScheduleSnapshot::clone(&snapshot))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(format!("'{raw}' is not a YYYY-MM-DD date")))
}

async fn group_lessons(
    State(state): State<AppState>,
    Path((group, date)): Path<(String, String)>,
) -> Result<Json<Vec<LessonRecord>>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.store.lessons_for_group(&group, date)?))
}

async fn teacher_lessons(
    State(state): State<AppState>,
    Path((teacher, date)): Path<(String, String)>,
) -> Result<Json<Vec<LessonRecord>>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.store.lessons_for_teacher(&teacher, date)?))
}

async fn trigger_sync(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let pipeline = Arc::clone(&state.pipeline);
    let outcome = tokio::task::spawn_blocking(move || pipeline.run_full_sync())
        .await
        .map_err(|err| ApiError::internal(format!("sync task panicked: {err}")))?;

    match outcome {
        SyncOutcome::Committed { lessons, files } => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "committed", "lessons": lessons, "files": files })),
        )),
        SyncOutcome::AlreadyRunning => Err(ApiError::Conflict(outcome.to_string())),
        other => Err(ApiError::internal(other.to_string())),
    }
}
