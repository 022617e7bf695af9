// Relay service main entry point.
use anyhow::{Context, Result};
use relay::app::{AppState, build_router};
use relay::config::RelayConfig;
use relay::{observability, ticker};
use std::future::Future;
use std::sync::Arc;
use zrelay_chain::DashDecoder;
use zrelay_hub::{Hub, TopicSet};
use zrelay_upstream::{ReconnectPolicy, UpstreamLink, ZmqConnector};

// Topics under this prefix are produced in-process and never requested upstream.
const LOCAL_TOPIC_PREFIX: &str = "debug:";

#[tokio::main]
async fn main() -> Result<()> {
    run_with_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("zrelay")?;
    let config = RelayConfig::from_env_or_yaml()?;

    let hub = Hub::builder(config.topics.clone())
        .mailbox_capacity(config.mailbox_capacity)
        .decoder(Arc::new(DashDecoder))
        .build()
        .context("build hub")?;
    tracing::info!(
        topics = %hub.topics().joined(),
        mailbox_capacity = hub.mailbox_capacity(),
        "hub started"
    );

    let upstream_topics = TopicSet::from_entries(
        config
            .topics
            .iter()
            .filter(|topic| !topic.starts_with(LOCAL_TOPIC_PREFIX)),
    );
    let link = UpstreamLink::new(ZmqConnector::new(), config.zmq_endpoint.clone(), upstream_topics)
        .with_policy(ReconnectPolicy::fixed(config.reconnect_delay()));
    let link_status = link.status();
    let link_task = {
        let hub = hub.clone();
        let cancel = hub.shutdown_token();
        tokio::spawn(async move {
            link.run(&hub, cancel).await;
        })
    };

    let ticker_task = if config.topics.contains(ticker::TICKER_TOPIC) {
        tracing::info!("debug ticker enabled");
        Some(tokio::spawn(ticker::run_ticker(
            hub.clone(),
            ticker::TICKER_INTERVAL,
            hub.shutdown_token(),
        )))
    } else {
        None
    };

    // Expose Prometheus metrics plus liveness and readiness on the configured bind address.
    let metrics_task = {
        let cancel = hub.shutdown_token();
        let addr = config.metrics_bind;
        tokio::spawn(async move {
            let stopped = async move { cancel.cancelled().await };
            if let Err(err) =
                observability::serve_metrics(metrics_handle, addr, link_status, stopped).await
            {
                tracing::warn!(error = %err, "metrics listener exited");
            }
        })
    };

    let state = AppState::new(hub.clone())
        .with_keep_alive(config.keepalive())
        .with_web_root(config.web_root.clone());
    let listener = tokio::net::TcpListener::bind(config.http_bind)
        .await
        .with_context(|| format!("bind HTTP listener {}", config.http_bind))?;
    tracing::info!(addr = %listener.local_addr()?, "http listener started");

    // Open event streams only finish once their sessions are cancelled, so the hub
    // is shut down as soon as the signal arrives rather than after serve returns.
    let stopping = hub.clone();
    let served = axum::serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutdown requested");
            stopping.shutdown();
        })
        .await;
    hub.shutdown();

    let _ = link_task.await;
    if let Some(task) = ticker_task {
        let _ = task.await;
    }
    let _ = metrics_task.await;
    served.context("serve http")?;
    tracing::info!("relay stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    fn local_env() -> Vec<EnvGuard> {
        vec![
            EnvGuard::set("RELAY_HTTP_BIND", "127.0.0.1:0"),
            EnvGuard::set("RELAY_METRICS_BIND", "127.0.0.1:0"),
            EnvGuard::set("RELAY_ZMQ_ENDPOINT", "tcp://127.0.0.1:1"),
            EnvGuard::set("RELAY_TOPICS", "rawtx,rawblock,debug:ticker"),
            EnvGuard::set("RELAY_RECONNECT_DELAY_MS", "50"),
            EnvGuard::unset("RELAY_CONFIG"),
            EnvGuard::unset("RELAY_WEB_ROOT"),
        ]
    }

    #[tokio::test]
    #[serial]
    async fn run_stops_cleanly_on_shutdown() -> Result<()> {
        let _guards = local_env();
        let run = run_with_shutdown(async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        });
        tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .context("relay did not stop")??;
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn run_fails_on_invalid_config() {
        let _guards = local_env();
        let _bad = EnvGuard::set("RELAY_HTTP_BIND", "not-an-addr");
        let err = run_with_shutdown(async {})
            .await
            .expect_err("invalid bind should fail");
        assert!(err.to_string().contains("RELAY_HTTP_BIND"));
    }
}
