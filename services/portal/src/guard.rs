//! Authorization guard
//!
//! Every guarded operation resolves the caller's `Authorization: Bearer`
//! credential to an identity before doing anything else. Two credential
//! forms are accepted, tried in order with the first success winning:
//!
//! 1. a server-side session id looked up in Redis
//! 2. an HS256 bearer token validated by the JWT service
//!
//! No endpoint special-cases one form over the other. Admin-only
//! operations additionally require the resolved role to be exactly ADMIN;
//! this is a hard precondition, never a soft hint.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::AppState;
use crate::error::{PortalError, PortalResult};
use crate::jwt::Claims;
use crate::models::Role;

/// The identity a credential resolves to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthIdentity {
    /// Require the ADMIN role exactly; any other role is a Forbidden outcome
    pub fn require_admin(&self) -> PortalResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(PortalError::Forbidden)
        }
    }
}

impl From<Claims> for AuthIdentity {
    fn from(claims: Claims) -> Self {
        AuthIdentity {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Extract the raw credential from the Authorization header
///
/// Rejects a missing header, a non-Bearer scheme, and an empty credential.
pub fn bearer_credential(headers: &HeaderMap) -> PortalResult<&str> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(PortalError::Unauthorized)?;

    let credential = header_value
        .strip_prefix("Bearer ")
        .ok_or(PortalError::Unauthorized)?;

    if credential.is_empty() {
        return Err(PortalError::Unauthorized);
    }

    Ok(credential)
}

/// Resolve a request's credential to an identity
///
/// The session strategy is consulted first; a session-store outage only
/// disables that strategy, it does not take down token auth with it.
pub async fn resolve(state: &AppState, headers: &HeaderMap) -> PortalResult<AuthIdentity> {
    let credential = bearer_credential(headers)?;

    match state.session_store.get(credential).await {
        Ok(Some(identity)) => return Ok(identity),
        Ok(None) => {}
        Err(e) => {
            warn!("session lookup failed, falling back to token auth: {}", e);
        }
    }

    let claims = state.jwt_service.validate(credential)?;
    Ok(AuthIdentity::from(claims))
}

/// Middleware guarding the signed-in section of the router
///
/// Inserts the resolved identity into request extensions for handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, PortalError> {
    let identity = resolve(&state, req.headers()).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
