// HTTP request handlers for the settlement engine API

use axum::{
    extract::{Query as QueryParams, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::app_state::{AppState, SharedState};
use crate::engine::Receipt;
use crate::error::{EngineError, ErrorClass};
use crate::events::EventRecord;
use crate::models::{Address, CallContext};
use crate::rpc::{Command, Query, QueryResponse};

type ApiError = (StatusCode, Json<Value>);

const DEFAULT_EVENT_PAGE: usize = 100;
const MAX_EVENT_PAGE: usize = 1_000;

// ===== REQUEST / RESPONSE TYPES =====

/// Signed call as delivered by the host: who sent it and what it does
#[derive(Debug, Clone, Deserialize)]
pub struct CallRequest {
    pub caller: Address,
    pub command: Command,
    /// Block time override, honoured only when `allow_time_override` is set
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// `?at=<unix seconds>` evaluates time-dependent queries at that block time
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtParams {
    pub at: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub success: bool,
    pub result: QueryResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsParams {
    #[serde(default)]
    pub from: u64,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsPage {
    pub total: usize,
    pub events: Vec<EventRecord>,
}

// ===== HELPERS =====

fn block_time(explicit: Option<u64>) -> u64 {
    explicit.unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64)
}

/// HTTP status for a rejected call
pub fn status_for(err: &EngineError) -> StatusCode {
    if let EngineError::MarketNotFound(_) = err {
        return StatusCode::NOT_FOUND;
    }
    match err.class() {
        ErrorClass::Configuration => StatusCode::BAD_REQUEST,
        ErrorClass::Authorization => StatusCode::FORBIDDEN,
        ErrorClass::StateMachine => StatusCode::CONFLICT,
        ErrorClass::ExternalCall => StatusCode::FAILED_DEPENDENCY,
        ErrorClass::Arithmetic => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn engine_error(err: EngineError) -> ApiError {
    (
        status_for(&err),
        Json(json!({
            "success": false,
            "error": err.to_string(),
            "reason": err.reason(),
            "class": err.class(),
        })),
    )
}

fn lock_state(state: &SharedState) -> Result<std::sync::MutexGuard<'_, AppState>, ApiError> {
    state.lock().map_err(|_| {
        error!("🔥 state mutex poisoned");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "state lock poisoned",
            })),
        )
    })
}

// ===== CALLS =====

/// Apply one mutating command atomically
pub async fn submit_call(
    State(state): State<SharedState>,
    Json(request): Json<CallRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let mut app_state = lock_state(&state)?;
    if request.timestamp.is_some() && !app_state.config.allow_time_override {
        warn!(caller = %request.caller, "timestamp override rejected");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "timestamp override is disabled",
                "reason": "TimestampOverrideDisabled",
            })),
        ));
    }
    let ctx = CallContext::new(request.caller, block_time(request.timestamp));
    app_state
        .engine
        .execute(&ctx, request.command)
        .map(Json)
        .map_err(engine_error)
}

// ===== QUERIES =====

pub async fn run_query(
    State(state): State<SharedState>,
    QueryParams(params): QueryParams<AtParams>,
    Json(query): Json<Query>,
) -> Result<Json<QueryResult>, ApiError> {
    let now = block_time(params.at);
    let app_state = lock_state(&state)?;
    let result = app_state.engine.query(now, query).map_err(engine_error)?;
    Ok(Json(QueryResult { success: true, result }))
}

pub async fn get_events(
    State(state): State<SharedState>,
    QueryParams(params): QueryParams<EventsParams>,
) -> Result<Json<EventsPage>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_EVENT_PAGE).min(MAX_EVENT_PAGE);
    let app_state = lock_state(&state)?;
    let log = &app_state.engine.events;
    Ok(Json(EventsPage {
        total: log.len(),
        events: log.since(params.from, limit).to_vec(),
    }))
}

// ===== HEALTH CHECK =====

pub async fn health_check(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let app_state = lock_state(&state)?;
    let engine = &app_state.engine;
    Ok(Json(json!({
        "status": "ok",
        "settlement_token": app_state.config.settlement_token,
        "markets": engine.markets.len(),
        "events": engine.events.len(),
        "router_paused": engine.fee_router.paused,
    })))
}
