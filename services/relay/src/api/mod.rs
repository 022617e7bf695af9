//! Relay HTTP API.
//!
//! Handlers translate requests into hub operations; membership state lives
//! entirely in the hub.
pub mod error;
pub mod eventsource;
pub mod subscriptions;
pub mod system;
pub mod topics;
pub mod types;

use crate::api::error::ApiError;
use zrelay_hub::SessionId;

pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    Ok(SessionId::parse(raw)?)
}
