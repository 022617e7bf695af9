//! Topic listing.
use crate::api::types::ResultResponse;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

/// Lists the configured topics, comment and blank entries already removed.
pub(crate) async fn list_topics(State(state): State<AppState>) -> Json<ResultResponse> {
    Json(ResultResponse::new(state.hub.topics().joined()))
}
