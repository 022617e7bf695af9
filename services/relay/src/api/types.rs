//! Request and response bodies for the relay API.
use serde::{Deserialize, Serialize};

/// Error body shared by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Plain result body used by the topic and subscription endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultResponse {
    pub result: String,
}

impl ResultResponse {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionResponse {
    pub version: String,
}

/// Body accepted by the subscription update endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicsRequest {
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Query accepted when opening an event stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenStreamQuery {
    /// Comma or space separated topics to subscribe on open.
    pub dbg_topics: Option<String>,
}
