//! Access-control gate for session capabilities
//!
//! Authorization is an ordered list of pure predicates evaluated with
//! short-circuit semantics; the first rule with an opinion wins. Only the
//! access-code rules write audit entries, because those are the cases where
//! the presented code is the deciding factor. Identity and role based
//! grants (admin, owner, public read) are not logged here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::models::{Actor, ClientType, NewAccessLogEntry, Role, Session};

/// Discrete permissions the gate evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    View,
    Upload,
    Download,
    Moderate,
    Administer,
}

impl Capability {
    fn is_read(&self) -> bool {
        matches!(self, Capability::View | Capability::Download)
    }
}

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    AdminOverride,
    Owner,
    PublicRead,
    AccessCodeAccepted,
    SessionEnded,
    InvalidAccessCode,
    NotAuthenticated,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ReasonCode::AdminOverride => "ADMIN_OVERRIDE",
            ReasonCode::Owner => "OWNER",
            ReasonCode::PublicRead => "PUBLIC_READ",
            ReasonCode::AccessCodeAccepted => "ACCESS_CODE_ACCEPTED",
            ReasonCode::SessionEnded => "SESSION_ENDED",
            ReasonCode::InvalidAccessCode => "INVALID_ACCESS_CODE",
            ReasonCode::NotAuthenticated => "NOT_AUTHENTICATED",
        };
        f.write_str(code)
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: ReasonCode,
}

impl Decision {
    fn allow(reason: ReasonCode) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: ReasonCode) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Request metadata recorded in audit entries
#[derive(Debug, Clone)]
pub struct RequestOrigin {
    pub ip: String,
    pub agent: String,
}

/// One evaluated authorization attempt
pub struct AccessRequest<'a> {
    pub actor: &'a Actor,
    pub session: &'a Session,
    pub capability: Capability,
    pub presented_code: Option<&'a str>,
}

/// Append-only sink for access attempts; entries are never mutated.
#[async_trait]
pub trait AccessAudit: Send + Sync {
    async fn record(&self, entry: NewAccessLogEntry) -> anyhow::Result<()>;
}

type Rule = fn(&AccessRequest<'_>) -> Option<Decision>;

fn admin_rule(req: &AccessRequest<'_>) -> Option<Decision> {
    req.actor
        .is_admin()
        .then(|| Decision::allow(ReasonCode::AdminOverride))
}

fn owner_rule(req: &AccessRequest<'_>) -> Option<Decision> {
    req.actor
        .owns(req.session)
        .then(|| Decision::allow(ReasonCode::Owner))
}

fn ended_rule(req: &AccessRequest<'_>) -> Option<Decision> {
    // Admin and owner already matched above, so whoever reaches this rule
    // is neither.
    (req.session.has_ended() && !req.session.is_public())
        .then(|| Decision::deny(ReasonCode::SessionEnded))
}

fn public_read_rule(req: &AccessRequest<'_>) -> Option<Decision> {
    (req.capability.is_read() && req.session.is_public())
        .then(|| Decision::allow(ReasonCode::PublicRead))
}

fn code_match_rule(req: &AccessRequest<'_>) -> Option<Decision> {
    if !req.session.is_public()
        && req.session.access_code.is_some()
        && req.session.access_code.as_deref() == req.presented_code
    {
        return Some(Decision::allow(ReasonCode::AccessCodeAccepted));
    }
    None
}

/// Ordered precedence rules; first match wins.
const RULES: &[Rule] = &[
    admin_rule,
    owner_rule,
    ended_rule,
    public_read_rule,
    code_match_rule,
];

/// Evaluates capability requests against session and actor state and writes
/// audit entries for code-decided outcomes.
#[derive(Clone)]
pub struct AccessControlGate {
    audit: Arc<dyn AccessAudit>,
}

impl AccessControlGate {
    pub fn new(audit: Arc<dyn AccessAudit>) -> Self {
        Self { audit }
    }

    pub async fn authorize(
        &self,
        req: AccessRequest<'_>,
        origin: &RequestOrigin,
    ) -> Decision {
        let decision = RULES
            .iter()
            .find_map(|rule| rule(&req))
            .unwrap_or_else(|| {
                // Residual deny: either a mismatched code or no credential
                // at all.
                if req.presented_code.is_some() {
                    Decision::deny(ReasonCode::InvalidAccessCode)
                } else {
                    Decision::deny(ReasonCode::NotAuthenticated)
                }
            });

        if matches!(
            decision.reason,
            ReasonCode::AccessCodeAccepted
                | ReasonCode::InvalidAccessCode
                | ReasonCode::NotAuthenticated
        ) {
            let entry = NewAccessLogEntry {
                session_id: req.session.id,
                actor_ip: origin.ip.clone(),
                actor_agent: origin.agent.clone(),
                access_code_used: req.presented_code.map(str::to_string),
                granted: decision.allowed,
                client_type: match req.actor.role {
                    Role::Photographer => ClientType::Photographer,
                    _ => ClientType::Viewer,
                },
            };
            if let Err(e) = self.audit.record(entry).await {
                error!("Failed to write access log entry: {e:#}");
            }
        }

        decision
    }
}
