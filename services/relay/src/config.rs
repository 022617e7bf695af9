use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use zrelay_hub::{DEFAULT_MAILBOX_CAPACITY, TopicSet};

// Relay service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    // HTTP listener for the API and event streams.
    pub http_bind: SocketAddr,
    // Metrics and health listener.
    pub metrics_bind: SocketAddr,
    // Upstream ZeroMQ publisher endpoint, always with a transport prefix.
    pub zmq_endpoint: String,
    // Allow-list of relayed topics.
    pub topics: TopicSet,
    // Per-session mailbox slots.
    pub mailbox_capacity: usize,
    // Fixed delay between upstream reconnect attempts.
    pub reconnect_delay_ms: u64,
    // Event-stream keep-alive comment interval.
    pub keepalive_secs: u64,
    // Optional directory served for unmatched GET requests.
    pub web_root: Option<PathBuf>,
}

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_ZMQ_ENDPOINT: &str = "tcp://127.0.0.1:28332";
pub const DEFAULT_TOPICS: &str = "rawblock,rawtx";
const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;
const DEFAULT_KEEPALIVE_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct RelayConfigOverride {
    http_bind: Option<String>,
    metrics_bind: Option<String>,
    zmq_endpoint: Option<String>,
    topics: Option<Vec<String>>,
    mailbox_capacity: Option<usize>,
    reconnect_delay_ms: Option<u64>,
    keepalive_secs: Option<u64>,
    web_root: Option<PathBuf>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        // PORT is honoured for platforms that only hand out a port number.
        let http_bind = match std::env::var("RELAY_HTTP_BIND") {
            Ok(value) => value.parse().with_context(|| "parse RELAY_HTTP_BIND")?,
            Err(_) => {
                let port = std::env::var("PORT")
                    .ok()
                    .and_then(|value| value.parse::<u16>().ok())
                    .filter(|value| *value > 0)
                    .unwrap_or(DEFAULT_HTTP_PORT);
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };
        let metrics_bind = std::env::var("RELAY_METRICS_BIND")
            .unwrap_or_else(|_| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse RELAY_METRICS_BIND")?;
        let zmq_endpoint = std::env::var("RELAY_ZMQ_ENDPOINT")
            .or_else(|_| std::env::var("DASHD_ZMQ_HOST"))
            .map(|value| normalize_endpoint(&value))
            .unwrap_or_else(|_| DEFAULT_ZMQ_ENDPOINT.to_string());
        let topics = std::env::var("RELAY_TOPICS")
            .map(|value| TopicSet::from_entries(TopicSet::parse_delimited(&value)))
            .unwrap_or_else(|_| {
                TopicSet::from_entries(TopicSet::parse_delimited(DEFAULT_TOPICS))
            });
        let mailbox_capacity = std::env::var("RELAY_MAILBOX_CAPACITY")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAILBOX_CAPACITY);
        let reconnect_delay_ms = std::env::var("RELAY_RECONNECT_DELAY_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_RECONNECT_DELAY_MS);
        let keepalive_secs = std::env::var("RELAY_KEEPALIVE_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_KEEPALIVE_SECS);
        let web_root = std::env::var("RELAY_WEB_ROOT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let config = Self {
            http_bind,
            metrics_bind,
            zmq_endpoint,
            topics,
            mailbox_capacity,
            reconnect_delay_ms,
            keepalive_secs,
            web_root,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("RELAY_CONFIG") {
            // YAML overrides allow ops-friendly config files.
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read RELAY_CONFIG: {path}"))?;
            let override_cfg: RelayConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse relay config yaml")?;
            if let Some(value) = override_cfg.http_bind {
                config.http_bind = value.parse().with_context(|| "parse http_bind")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.zmq_endpoint {
                config.zmq_endpoint = normalize_endpoint(&value);
            }
            if let Some(value) = override_cfg.topics {
                config.topics = TopicSet::from_entries(value);
            }
            if let Some(value) = override_cfg.mailbox_capacity.filter(|value| *value > 0) {
                config.mailbox_capacity = value;
            }
            if let Some(value) = override_cfg.reconnect_delay_ms.filter(|value| *value > 0) {
                config.reconnect_delay_ms = value;
            }
            if let Some(value) = override_cfg.keepalive_secs.filter(|value| *value > 0) {
                config.keepalive_secs = value;
            }
            if let Some(value) = override_cfg.web_root {
                config.web_root = Some(value);
            }
            config.validate()?;
        }
        Ok(config)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            bail!("at least one topic must be configured");
        }
        Ok(())
    }
}

/// Adds the `tcp://` transport prefix when an endpoint is given as bare `host:port`.
pub fn normalize_endpoint(raw: &str) -> String {
    let endpoint = raw.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("tcp://{endpoint}")
    }
}
