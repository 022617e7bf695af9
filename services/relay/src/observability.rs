//! Observability wiring for the relay service.
//!
//! Installs the tracing subscriber and the Prometheus recorder, and serves
//! `/metrics`, `/live` and `/ready` on a dedicated listener. Readiness follows
//! the upstream link: the relay is ready only while it holds a subscription.
use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zrelay_upstream::LinkState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging and metrics. Safe to call more than once.
pub fn init_observability(service_name: &str) -> Result<PrometheusHandle> {
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
    let handle = install_metrics_recorder()?;
    tracing::debug!(service = service_name, "observability initialized");
    Ok(handle)
}

fn install_metrics_recorder() -> Result<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Ok(METRICS_HANDLE.get_or_init(|| handle).clone()),
        // The global recorder can only be set once; a caller that lost the install keeps
        // the handle stored by the winner.
        Err(err) => match METRICS_HANDLE.get() {
            Some(handle) => Ok(handle.clone()),
            None => Err(err).with_context(|| "install metrics recorder"),
        },
    }
}

#[derive(Clone)]
struct MetricsState {
    handle: PrometheusHandle,
    link: watch::Receiver<LinkState>,
}

/// Router for the metrics listener.
pub fn metrics_router(handle: PrometheusHandle, link: watch::Receiver<LinkState>) -> Router {
    Router::new()
        .route("/metrics", axum::routing::get(render_metrics))
        .route("/live", axum::routing::get(|| async { "ok" }))
        .route("/ready", axum::routing::get(ready))
        .with_state(MetricsState { handle, link })
}

async fn render_metrics(State(state): State<MetricsState>) -> String {
    state.handle.render()
}

async fn ready(State(state): State<MetricsState>) -> (StatusCode, &'static str) {
    if *state.link.borrow() == LinkState::Subscribed {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "upstream not subscribed")
    }
}

/// Serves the metrics router on `addr` until `shutdown` resolves.
pub async fn serve_metrics<F>(
    handle: PrometheusHandle,
    addr: SocketAddr,
    link: watch::Receiver<LinkState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "metrics listener bound");
    axum::serve(listener, metrics_router(handle, link).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serial_test::serial;
    use tower::ServiceExt;

    async fn status_of(router: Router, uri: &str) -> StatusCode {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        response.status()
    }

    #[tokio::test]
    #[serial]
    async fn readiness_follows_link_state() {
        let handle = init_observability("relay-test").expect("observability");
        let (tx, rx) = watch::channel(LinkState::Connecting);
        let router = metrics_router(handle, rx);

        assert_eq!(status_of(router.clone(), "/live").await, StatusCode::OK);
        assert_eq!(
            status_of(router.clone(), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        tx.send_replace(LinkState::Subscribed);
        assert_eq!(status_of(router.clone(), "/ready").await, StatusCode::OK);

        tx.send_replace(LinkState::Backoff);
        assert_eq!(
            status_of(router.clone(), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(router, "/metrics").await, StatusCode::OK);
    }

    #[test]
    #[serial]
    fn repeated_init_reuses_the_recorder() {
        assert!(init_observability("relay-a").is_ok());
        assert!(init_observability("relay-b").is_ok());
    }
}
