//! Volunteer portal routes
//!
//! Thin handlers: parse and validate the wire payload, run the guard
//! where required, delegate to the lifecycle engine or registration gate,
//! shape the response. Method mismatches get a 405 from axum's per-path
//! method routers.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    error::{PortalError, PortalResult},
    guard::{self, AuthIdentity},
    models::{NewApplication, PublicUser, Role},
    rbac::{self, Section},
    registration::RegisterParams,
};

/// Create the router for the volunteer portal
pub fn create_router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/applications/list", get(list_applications))
        .route("/applications/approve", post(approve_application))
        .route("/applications/reject", post(reject_application))
        .route("/auth/logout", post(logout))
        .route("/me/navigation", get(navigation))
        .route("/sections/:section", get(section_content))
        .route("/dashboard/stats", get(dashboard_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/applications/apply", post(submit_application))
        .route("/auth/verify-code", post(verify_code))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .merge(guarded)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "volunteer-portal"
    }))
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

/// Request to submit an application
#[derive(Deserialize)]
pub struct ApplyRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub motivation: Option<String>,
    pub experience: Option<String>,
}

/// Public application submission
pub async fn submit_application(
    State(state): State<AppState>,
    Json(payload): Json<ApplyRequest>,
) -> PortalResult<impl IntoResponse> {
    let (Some(name), Some(email), Some(motivation)) =
        (payload.name, payload.email, payload.motivation)
    else {
        return Err(PortalError::Validation("Missing required fields".to_string()));
    };

    let application = state
        .lifecycle
        .submit(NewApplication {
            name,
            email,
            phone: payload.phone,
            motivation,
            experience: payload.experience,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Application submitted successfully",
            "applicationId": application.id,
        })),
    ))
}

/// Admin: list all applications, newest first
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
) -> PortalResult<impl IntoResponse> {
    identity.require_admin()?;

    let applications = state.lifecycle.list().await?;

    Ok(Json(serde_json::json!({
        "applications": applications,
    })))
}

/// Request carrying an application id
#[derive(Deserialize)]
pub struct ApplicationIdRequest {
    #[serde(rename = "applicationId")]
    pub application_id: Option<Uuid>,
}

/// Admin: approve an application and mint its verification code
pub async fn approve_application(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(payload): Json<ApplicationIdRequest>,
) -> PortalResult<impl IntoResponse> {
    identity.require_admin()?;

    let application_id = payload
        .application_id
        .ok_or_else(|| PortalError::Validation("Application ID is required".to_string()))?;

    let outcome = state.lifecycle.approve(application_id).await?;

    // The code in this response is what the admin UI shows; email delivery
    // is not guaranteed.
    Ok(Json(serde_json::json!({
        "message": "Application approved successfully",
        "verificationCode": outcome.verification_code,
        "email": outcome.email,
    })))
}

/// Admin: reject an application
pub async fn reject_application(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthIdentity>,
    Json(payload): Json<ApplicationIdRequest>,
) -> PortalResult<impl IntoResponse> {
    identity.require_admin()?;

    let application_id = payload
        .application_id
        .ok_or_else(|| PortalError::Validation("Application ID is required".to_string()))?;

    state.lifecycle.reject(application_id).await?;

    Ok(Json(serde_json::json!({
        "message": "Application rejected",
    })))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Request to verify a code before committing to registration
#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub code: Option<String>,
    pub email: Option<String>,
}

/// Non-destructive verification code check
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeRequest>,
) -> PortalResult<impl IntoResponse> {
    let (Some(code), Some(email)) = (payload.code, payload.email) else {
        return Err(PortalError::Validation(
            "Verification code and email are required".to_string(),
        ));
    };

    let application_id = state.registration.verify_code(&code, &email).await?;

    Ok(Json(serde_json::json!({
        "message": "Verification code is valid",
        "applicationId": application_id,
    })))
}

/// Registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "verificationCode")]
    pub verification_code: Option<String>,
    #[serde(rename = "setupToken")]
    pub setup_token: Option<String>,
}

/// Create an account; volunteer signups are gated by a verification code
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> PortalResult<impl IntoResponse> {
    let (Some(name), Some(email), Some(password)) =
        (payload.name, payload.email, payload.password)
    else {
        return Err(PortalError::Validation("Missing required fields".to_string()));
    };

    let role = payload
        .role
        .as_deref()
        .map(Role::from_str)
        .transpose()
        .map_err(PortalError::Validation)?;

    let user = state
        .registration
        .register(RegisterParams {
            name,
            email,
            password,
            role,
            verification_code: payload.verification_code,
            setup_token: payload.setup_token,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response for user login
///
/// `sessionId` is itself a bearer credential: the guard accepts it
/// interchangeably with the token. It is absent when the session store
/// was unavailable at login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub token: String,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Credential login; issues a bearer token and a server-side session
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> PortalResult<impl IntoResponse> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(PortalError::Validation("Missing email or password".to_string()));
    };

    let user = state
        .user_repository
        .find_by_email(&email)
        .await?
        .ok_or(PortalError::InvalidCredentials)?;

    if !state.user_repository.verify_password(&user, &password)? {
        return Err(PortalError::InvalidCredentials);
    }

    let token = state.jwt_service.sign(&user)?;

    let identity = AuthIdentity {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
    };

    // A session-store outage downgrades the login to token-only; the
    // token in hand still works.
    let session_id = match state.session_store.create(&identity).await {
        Ok(session_id) => Some(session_id),
        Err(e) => {
            warn!("could not create session for {}: {}", user.id, e);
            None
        }
    };

    info!("user {} logged in", user.id);

    Ok(Json(LoginResponse {
        user: user.to_public(),
        token,
        session_id,
    }))
}

/// End the caller's server-side session, if the presented credential is one
///
/// A pure bearer-token credential has no server-side state to drop; the
/// delete is a no-op for it and the client just discards the token.
pub async fn logout(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Extension(identity): Extension<AuthIdentity>,
) -> PortalResult<impl IntoResponse> {
    let credential = guard::bearer_credential(&headers)?;
    state.session_store.delete(credential).await?;

    info!("user {} logged out", identity.id);

    Ok(Json(serde_json::json!({
        "message": "Logged out successfully",
    })))
}

/// Request for password recovery
#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// Generate a random 64-hex-character reset token
fn generate_reset_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Out-of-band password recovery
///
/// Always answers with the same generic message so the endpoint cannot be
/// used to probe which emails have accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> PortalResult<impl IntoResponse> {
    let generic = Json(serde_json::json!({
        "message": "If an account with that email exists, a password reset link has been sent",
    }));

    let Some(email) = payload.email else {
        return Err(PortalError::Validation("Email is required".to_string()));
    };

    let Some(user) = state.user_repository.find_by_email(&email).await? else {
        return Ok(generic);
    };

    let reset_token = generate_reset_token();
    let expires_at = Utc::now() + Duration::hours(1);

    state
        .user_repository
        .set_reset_token(user.id, &reset_token, expires_at)
        .await?;

    let reset_url = format!("{}/reset-password?token={}", state.base_url, reset_token);
    let message = state.notifier.password_reset_email(&email, &reset_url);
    state.notifier.send_detached(message);

    Ok(generic)
}

// ---------------------------------------------------------------------------
// Navigation / sections / dashboard
// ---------------------------------------------------------------------------

/// The sections the signed-in identity may navigate to
pub async fn navigation(
    Extension(identity): Extension<AuthIdentity>,
) -> PortalResult<impl IntoResponse> {
    let sections = rbac::visible_sections(Some(identity.role));

    Ok(Json(serde_json::json!({
        "role": identity.role,
        "sections": sections,
    })))
}

/// Route-level content gate for a single section
///
/// Consults the same access table as the navigation listing.
pub async fn section_content(
    Extension(identity): Extension<AuthIdentity>,
    Path(section): Path<String>,
) -> PortalResult<impl IntoResponse> {
    let section = Section::from_str(&section)
        .map_err(|_| PortalError::NotFound("Unknown section".to_string()))?;

    if !rbac::has_access(Some(identity.role), section) {
        return Err(PortalError::Forbidden);
    }

    Ok(Json(serde_json::json!({
        "section": section,
    })))
}

/// Dashboard aggregate statistics, computed live
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(_identity): Extension<AuthIdentity>,
) -> PortalResult<impl IntoResponse> {
    let stats = crate::dashboard::collect(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "source": "live",
        "stats": stats,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_token_format() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_reset_token());
    }

    #[test]
    fn test_apply_request_tolerates_missing_fields() {
        let payload: ApplyRequest = serde_json::from_str(r#"{"name": "John"}"#).unwrap();
        assert_eq!(payload.name.as_deref(), Some("John"));
        assert!(payload.email.is_none());
        assert!(payload.motivation.is_none());
    }

    #[test]
    fn test_login_response_carries_session_credential() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
        };

        // The session id must reach the client, or the guard's session
        // strategy has nothing to resolve.
        let session_id = Uuid::new_v4().to_string();
        let json = serde_json::to_value(LoginResponse {
            user: user.clone(),
            token: "abc.def.ghi".to_string(),
            session_id: Some(session_id.clone()),
        })
        .unwrap();
        assert_eq!(json["sessionId"], serde_json::json!(session_id));
        assert_eq!(json["token"], serde_json::json!("abc.def.ghi"));

        // Token-only login when the session store was unavailable.
        let json = serde_json::to_value(LoginResponse {
            user,
            token: "abc.def.ghi".to_string(),
            session_id: None,
        })
        .unwrap();
        assert!(json.get("sessionId").is_none());
    }

    #[test]
    fn test_register_request_accepts_camel_case_code() {
        let payload: RegisterRequest = serde_json::from_str(
            r#"{"name":"J","email":"j@example.com","password":"x","role":"VOLUNTEER","verificationCode":"K3F9XQ2P"}"#,
        )
        .unwrap();
        assert_eq!(payload.verification_code.as_deref(), Some("K3F9XQ2P"));
    }
}
