//! Authentication middleware and request metadata extraction

use axum::{
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::access::{ReasonCode, RequestOrigin};
use crate::error::ApiError;
use crate::models::{Actor, Role};
use crate::state::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Actor role
    pub role: Role,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Attach an `Actor` to every request. A valid bearer token carries the
/// identity; requests without a token become anonymous viewers so public
/// sessions stay reachable. A present-but-invalid token is rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    let actor = match auth_header {
        None => Actor::anonymous(),
        Some(header) => {
            let token = header
                .strip_prefix("Bearer ")
                .ok_or(ApiError::Authorization(ReasonCode::NotAuthenticated))?;

            let decoding_key = DecodingKey::from_rsa_pem(state.config.jwt_public_key.as_bytes())
                .map_err(|e| {
                    error!("Failed to create decoding key: {}", e);
                    ApiError::Internal(anyhow::anyhow!(e))
                })?;

            let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
            validation.validate_exp = true;

            let token_data = jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation)
                .map_err(|e| {
                    error!("Failed to validate token: {}", e);
                    ApiError::Authorization(ReasonCode::NotAuthenticated)
                })?;

            Actor {
                id: Some(token_data.claims.sub),
                role: token_data.claims.role,
            }
        }
    };

    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

/// Access code for private sessions: `X-Access-Code` header, with the
/// `accessCode` query parameter as fallback.
pub fn presented_code(headers: &HeaderMap, query_code: Option<&str>) -> Option<String> {
    headers
        .get("x-access-code")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| query_code.map(str::to_string))
}

/// Request origin recorded in access log entries
pub fn request_origin(headers: &HeaderMap) -> RequestOrigin {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    RequestOrigin { ip, agent }
}
