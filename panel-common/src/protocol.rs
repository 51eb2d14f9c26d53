//! HTTP payloads exchanged with the API gateway.
//!
//! # Endpoints
//!
//! - `POST /auth/login` takes a [`LoginRequest`] and answers with a [`LoginResponse`].
//!   The returned token is opaque; clients pick their own refresh schedule.
//! - `POST /software/{name}/heartbeat` takes a [`SoftwareHeartbeat`].
//! - `POST /hardware/{name}/heartbeat` takes a [`HardwareHeartbeat`].
//!
//! The entry named in a heartbeat path must already exist on the gateway.
//! A `404` means it was never registered, a `503` means an operator disabled it.

use serde::{Deserialize, Serialize};

use crate::Health;

/// Free-form key/value payload attached to a heartbeat.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Credentials posted to the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Heartbeat body for a software entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareHeartbeat {
    pub health: Health,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

/// Heartbeat body for a hardware entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareHeartbeat {
    pub health: Health,
    /// Static device configuration reported alongside the health.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Details>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}
