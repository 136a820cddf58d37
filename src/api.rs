use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shuttle_axum::axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::curation::{self, ManualAddError, ManualPost};
use crate::entity;
use crate::ingest::http::HttpClient;
use crate::ingest::pipeline::{DiscoveryRunner, SourceCatalog};
use crate::ingest::scheduler::run_platforms;
use crate::model::{ContentItem, ContentStatus, DiscoveryRun, Entity, NewEntity, Platform, RunSummary};
use crate::store::{ContentQuery, StoreError};
use crate::window::{parse_day, DiscoveryWindow};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub runner: DiscoveryRunner,
    pub catalog: Arc<dyn SourceCatalog>,
    pub run_timeout: Duration,
    /// Fetches Instagram post pages for manual adds.
    pub http: HttpClient,
    pub instagram_web_base: String,
    /// Trailing window for entity runs that name no days.
    pub entity_lookback_days: i64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/discovery", post(discover_all))
        .route("/discovery/runs", get(list_runs))
        .route("/discovery/{platform}", post(discover_one))
        .route("/content", get(list_content))
        .route("/content/{id}/status", post(change_status))
        .route("/content/instagram", post(add_instagram))
        .route("/entities", get(list_entities).post(upsert_entity))
        .route("/entities/{id}/discover", post(discover_entity))
        .route("/entities/{id}/content", get(entity_content))
        .route("/admin/clear", post(admin_clear))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<ManualAddError> for ApiError {
    fn from(e: ManualAddError) -> Self {
        match e {
            ManualAddError::InvalidUrl(_) => ApiError::BadRequest(e.to_string()),
            ManualAddError::AlreadyStored(_) => ApiError::Store(StoreError::Conflict(e.to_string())),
            ManualAddError::Store(e) => ApiError::Store(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Store(e) => {
                let status = match &e {
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::InvalidTransition { .. } | StoreError::Conflict(_) => StatusCode::CONFLICT,
                    StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(e.to_string())
}

fn parse_platform(s: &str) -> Result<Platform, ApiError> {
    s.parse::<Platform>().map_err(bad_request)
}

#[derive(Debug, Default, serde::Deserialize)]
struct WindowReq {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

fn window_req(body: &Bytes) -> Result<WindowReq, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Ok(WindowReq::default())
    } else {
        serde_json::from_slice(body).map_err(bad_request)
    }
}

fn explicit_window(req: &WindowReq) -> Result<DiscoveryWindow, ApiError> {
    let start = req.start.as_deref().map(parse_day).transpose().map_err(bad_request)?;
    let end = req.end.as_deref().map(parse_day).transpose().map_err(bad_request)?;
    DiscoveryWindow::resolve(start, end, Utc::now()).map_err(bad_request)
}

/// Empty body: window from `DISCOVERY_WEEK_*`, else the trailing default.
fn window_from_body(body: &Bytes) -> Result<DiscoveryWindow, ApiError> {
    let req = window_req(body)?;
    if req.start.is_none() && req.end.is_none() {
        return DiscoveryWindow::from_env(Utc::now()).map_err(bad_request);
    }
    explicit_window(&req)
}

async fn discover_one(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    body: Bytes,
) -> Result<Json<RunSummary>, ApiError> {
    let platform = parse_platform(&platform)?;
    let window = window_from_body(&body)?;
    let mut out = run_platforms(&state.runner, state.catalog.as_ref(), &[platform], &window, state.run_timeout).await;
    let summary = out
        .pop()
        .unwrap_or_else(|| RunSummary::failed(platform, &window, "no run executed"));
    Ok(Json(summary))
}

async fn discover_all(State(state): State<AppState>, body: Bytes) -> Result<Json<Vec<RunSummary>>, ApiError> {
    let window = window_from_body(&body)?;
    let out = run_platforms(
        &state.runner,
        state.catalog.as_ref(),
        &Platform::ALL,
        &window,
        state.run_timeout,
    )
    .await;
    Ok(Json(out))
}

#[derive(Debug, serde::Deserialize)]
struct RunsQuery {
    platform: Option<String>,
    limit: Option<usize>,
}

async fn list_runs(State(state): State<AppState>, Query(q): Query<RunsQuery>) -> Result<Json<Vec<DiscoveryRun>>, ApiError> {
    let platform = q.platform.as_deref().map(parse_platform).transpose()?;
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    Ok(Json(state.runner.store().list_runs(platform, limit).await?))
}

#[derive(Debug, serde::Deserialize)]
struct ContentParams {
    platform: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
}

async fn list_content(
    State(state): State<AppState>,
    Query(q): Query<ContentParams>,
) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let query = ContentQuery {
        platform: q.platform.as_deref().map(parse_platform).transpose()?,
        status: q
            .status
            .as_deref()
            .map(str::parse::<ContentStatus>)
            .transpose()
            .map_err(bad_request)?,
        limit: Some(q.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)),
    };
    Ok(Json(state.runner.store().list_content(&query).await?))
}

#[derive(Debug, serde::Deserialize)]
struct StatusReq {
    status: String,
}

async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<StatusReq>,
) -> Result<Json<ContentItem>, ApiError> {
    let to: ContentStatus = req.status.parse().map_err(bad_request)?;
    let item = curation::change_status(state.runner.store().as_ref(), id, to).await?;
    Ok(Json(item))
}

#[derive(Debug, serde::Deserialize)]
struct ClearReq {
    platforms: Vec<String>,
    start: String,
    end: String,
}

#[derive(Debug, serde::Serialize)]
struct ClearResp {
    deleted: BTreeMap<Platform, u64>,
}

async fn admin_clear(State(state): State<AppState>, Json(req): Json<ClearReq>) -> Result<Json<ClearResp>, ApiError> {
    if req.platforms.is_empty() {
        return Err(ApiError::BadRequest("platforms must not be empty".into()));
    }
    let platforms = req
        .platforms
        .iter()
        .map(|p| parse_platform(p))
        .collect::<Result<Vec<_>, _>>()?;
    let start = parse_day(&req.start).map_err(bad_request)?;
    let end = parse_day(&req.end).map_err(bad_request)?;
    let window = DiscoveryWindow::from_days(start, end).map_err(bad_request)?;
    let deleted = curation::clear_content(state.runner.store().as_ref(), &platforms, &window).await?;
    Ok(Json(ClearResp { deleted }))
}

async fn add_instagram(State(state): State<AppState>, Json(req): Json<ManualPost>) -> Result<Json<ContentItem>, ApiError> {
    let item = curation::add_instagram_post(
        &state.runner.gate(),
        &state.http,
        &state.instagram_web_base,
        &req,
        Utc::now(),
    )
    .await?;
    Ok(Json(item))
}

async fn list_entities(State(state): State<AppState>) -> Result<Json<Vec<Entity>>, ApiError> {
    Ok(Json(state.runner.store().list_entities().await?))
}

async fn upsert_entity(State(state): State<AppState>, Json(mut req): Json<NewEntity>) -> Result<Json<Entity>, ApiError> {
    req.name = req.name.trim().to_string();
    if req.name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    Ok(Json(state.runner.store().upsert_entity(&req).await?))
}

async fn find_entity(state: &AppState, id: i64) -> Result<Entity, ApiError> {
    state
        .runner
        .store()
        .get_entity(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))
}

/// Empty body: the configured entity lookback, ending now.
async fn discover_entity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<Vec<RunSummary>>, ApiError> {
    let entity = find_entity(&state, id).await?;
    let req = window_req(&body)?;
    let now = Utc::now();
    let window = if req.start.is_none() && req.end.is_none() {
        DiscoveryWindow::trailing(now, state.entity_lookback_days)
    } else {
        explicit_window(&req)?
    };
    let out = entity::discover(
        &state.runner,
        state.catalog.as_ref(),
        &entity,
        &window,
        now,
        Some(state.run_timeout),
    )
    .await;
    Ok(Json(out))
}

async fn entity_content(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Vec<ContentItem>>, ApiError> {
    let entity = find_entity(&state, id).await?;
    Ok(Json(state.runner.store().entity_content(entity.id).await?))
}
