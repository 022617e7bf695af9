//! Subscription updates for an open session.
//!
//! All three endpoints take `{"topics": [...]}`. Unknown topics fail the whole
//! request before any membership change.
use crate::api::error::ApiError;
use crate::api::parse_session_id;
use crate::api::types::{ResultResponse, TopicsRequest};
use crate::app::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};

/// Adds topics; the result lists every topic the session now holds.
pub(crate) async fn add_subscriptions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TopicsRequest>, JsonRejection>,
) -> Result<Json<ResultResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let Json(request) = payload?;
    state.hub.subscribe(&session_id, &request.topics)?;
    let held = state.hub.topics_for(&session_id);
    tracing::debug!(session = %session_id, topics = ?held, "subscriptions added");
    Ok(Json(ResultResponse::new(format!(
        "debug: subscriptions: '{}'",
        held.join(", ")
    ))))
}

/// Replaces the session's topics; the result lists the topics it held before.
pub(crate) async fn replace_subscriptions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TopicsRequest>, JsonRejection>,
) -> Result<Json<ResultResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let Json(request) = payload?;
    let previous = state
        .hub
        .replace_subscriptions(&session_id, &request.topics)?;
    tracing::debug!(session = %session_id, previous = ?previous, "subscriptions replaced");
    Ok(Json(ResultResponse::new(format!(
        "debug: replaced subscriptions: '{}'",
        previous.join(", ")
    ))))
}

/// Removes the named topics; the result lists the topics actually dropped.
pub(crate) async fn remove_subscriptions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TopicsRequest>, JsonRejection>,
) -> Result<Json<ResultResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let Json(request) = payload?;
    let removed = state.hub.unsubscribe(&session_id, &request.topics)?;
    tracing::debug!(session = %session_id, removed = ?removed, "subscriptions removed");
    Ok(Json(ResultResponse::new(format!(
        "debug: removed subscriptions: '{}'",
        removed.join(", ")
    ))))
}
