//! API handlers for the HTTP REST API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::alerting::{EngineStatus, SharedEngine};
use crate::error::Error;
use crate::models::{AlertNotification, AlertRule, AlertRuleInput, SensorSample};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: SharedEngine,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

/// Map an engine error onto an HTTP status and message
pub fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Conflict { .. } => StatusCode::CONFLICT,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Http(_) | Error::EmptyPayload => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Engine status: connectivity flag, unread count, cycle phase
pub async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.engine.read().status())
}

/// Latest successfully polled sample
pub async fn latest_sample(State(state): State<AppState>) -> ApiResult<Json<SensorSample>> {
    state
        .engine
        .read()
        .latest_sample()
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "No sample available".to_string()))
}

// --- Rules ---

/// List rules response
#[derive(Serialize)]
pub struct ListRulesResponse {
    pub rules: Vec<AlertRule>,
    pub total: usize,
}

/// List rules in evaluation order
pub async fn list_rules(State(state): State<AppState>) -> Json<ListRulesResponse> {
    let rules = state.engine.read().rules().to_vec();
    let total = rules.len();
    Json(ListRulesResponse { rules, total })
}

/// Get one rule
pub async fn get_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> ApiResult<Json<AlertRule>> {
    state
        .engine
        .read()
        .rule(&rule_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| error_response(Error::not_found("Rule", rule_id)))
}

/// Create a rule
pub async fn create_rule(
    State(state): State<AppState>,
    Json(input): Json<AlertRuleInput>,
) -> ApiResult<(StatusCode, Json<AlertRule>)> {
    let rule = state.engine.write().add_rule(input).map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Replace a rule's definition
pub async fn update_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Json(input): Json<AlertRuleInput>,
) -> ApiResult<Json<AlertRule>> {
    state
        .engine
        .write()
        .update_rule(&rule_id, input)
        .map(Json)
        .map_err(error_response)
}

/// Delete a rule
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .write()
        .delete_rule(&rule_id)
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flip a rule's active flag
pub async fn toggle_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> ApiResult<Json<AlertRule>> {
    state
        .engine
        .write()
        .toggle_rule(&rule_id)
        .map(Json)
        .map_err(error_response)
}

// --- Notifications ---

/// Query parameters for listing notifications
#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    /// Only unread notifications
    pub unread: Option<bool>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

/// List notifications response
#[derive(Serialize)]
pub struct ListNotificationsResponse {
    pub notifications: Vec<AlertNotification>,
    pub total: usize,
    pub unread_count: usize,
}

/// List notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Json<ListNotificationsResponse> {
    let engine = state.engine.read();
    let unread_only = query.unread.unwrap_or(false);

    let notifications: Vec<AlertNotification> = engine
        .notifications()
        .iter()
        .filter(|n| !unread_only || !n.is_read)
        .take(query.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();

    Json(ListNotificationsResponse {
        total: notifications.len(),
        unread_count: engine.unread_count(),
        notifications,
    })
}

/// Bulk change response
#[derive(Serialize)]
pub struct AffectedResponse {
    pub affected: usize,
}

/// Mark one notification read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .write()
        .mark_read(&notification_id)
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark every notification read
pub async fn mark_all_read(State(state): State<AppState>) -> Json<AffectedResponse> {
    let affected = state.engine.write().mark_all_read();
    Json(AffectedResponse { affected })
}

/// Delete one notification
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .write()
        .delete_notification(&notification_id)
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every notification
pub async fn clear_notifications(State(state): State<AppState>) -> Json<AffectedResponse> {
    let affected = state.engine.write().clear_notifications();
    Json(AffectedResponse { affected })
}
