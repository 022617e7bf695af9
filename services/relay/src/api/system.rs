//! Service metadata.
use crate::api::types::VersionResponse;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

pub(crate) async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.version.clone(),
    })
}
