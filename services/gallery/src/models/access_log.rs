//! Access log entries written by the access-control gate
//!
//! Entries are append-only and never mutated. They reference a session by
//! id only; no cascade is assumed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of client that attempted access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Photographer,
    Viewer,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Photographer => "photographer",
            ClientType::Viewer => "viewer",
        }
    }
}

/// Payload for appending an access attempt
#[derive(Debug, Clone)]
pub struct NewAccessLogEntry {
    pub session_id: Uuid,
    pub actor_ip: String,
    pub actor_agent: String,
    pub access_code_used: Option<String>,
    pub granted: bool,
    pub client_type: ClientType,
}
