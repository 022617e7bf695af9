//! Relay HTTP application wiring.
//!
//! Builds the axum router, its middleware, and the shared state injected into
//! handlers. Kept apart from `main` so tests can drive the router in-process.
use crate::api;
use axum::Router;
use axum::http::{Method, header};
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use zrelay_hub::Hub;

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub version: String,
    pub keep_alive: Duration,
    pub web_root: Option<PathBuf>,
}

impl AppState {
    pub fn new(hub: Hub) -> Self {
        Self {
            hub,
            version: env!("CARGO_PKG_VERSION").to_string(),
            keep_alive: DEFAULT_KEEP_ALIVE,
            web_root: None,
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_web_root(mut self, web_root: Option<PathBuf>) -> Self {
        self.web_root = web_root;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let mut router = Router::new()
        .route("/api/version", axum::routing::get(api::system::version))
        .route("/api/zmq/topics", axum::routing::get(api::topics::list_topics))
        .route(
            "/api/zmq/eventsource",
            axum::routing::get(api::eventsource::open_stream),
        )
        .route(
            "/api/zmq/eventsource/:id",
            axum::routing::get(api::eventsource::open_stream_with_id)
                .post(api::subscriptions::add_subscriptions)
                .put(api::subscriptions::replace_subscriptions)
                .delete(api::subscriptions::remove_subscriptions),
        );
    if let Some(root) = state.web_root.clone() {
        router = router.fallback_service(ServeDir::new(root));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
