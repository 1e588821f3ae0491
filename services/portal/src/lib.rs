//! Volunteer portal service
//!
//! An administrative web application for managing volunteers: public
//! application submission, role-gated review of applications, and a
//! registration flow gated on the single-use verification code minted
//! when an application is approved.

pub mod dashboard;
pub mod error;
pub mod guard;
pub mod jwt;
pub mod lifecycle;
pub mod models;
pub mod notifier;
pub mod rbac;
pub mod registration;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod validation;

use sqlx::PgPool;

use crate::{
    jwt::JwtService, lifecycle::LifecycleEngine, notifier::Notifier,
    registration::RegistrationGate, session::SessionStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub session_store: SessionStore,
    pub user_repository: repositories::UserRepository,
    pub lifecycle: LifecycleEngine,
    pub registration: RegistrationGate,
    pub notifier: Notifier,
    pub base_url: String,
}
