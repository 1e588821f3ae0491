//! Registration gate
//!
//! Consumes a verification code to authorize creation of a volunteer
//! account. Verification is non-destructive so an applicant can check a
//! code before filling in the whole form; consumption happens only inside
//! the registration transaction, where the user insert, the
//! application-to-user link and the code's used flag commit as one unit.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::{ApplicationStatus, PublicUser, Role};
use crate::repositories::{
    CodeWithApplication, UserRepository, VerificationCodeRepository,
    user::{hash_password, map_user},
    verification_code::map_code,
};
use crate::validation;

/// Registration request, already parsed off the wire
#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Absent role defaults to VOLUNTEER
    pub role: Option<Role>,
    pub verification_code: Option<String>,
    /// Out-of-band authorization for ADMIN self-registration
    pub setup_token: Option<String>,
}

/// Check a code against an email at a point in time
///
/// The checks run in a fixed order so a caller always learns the most
/// fundamental problem first: unknown codes are reported by the caller
/// before this runs, then expiry, consumption, email mismatch, and
/// finally the application's approval state.
fn check_code(
    found: &CodeWithApplication,
    email: &str,
    now: DateTime<Utc>,
) -> PortalResult<Uuid> {
    if found.code.is_expired(now) {
        return Err(PortalError::Validation(
            "Verification code has expired".to_string(),
        ));
    }

    if found.code.used {
        return Err(PortalError::Validation(
            "Verification code has already been used".to_string(),
        ));
    }

    if !found.code.email.eq_ignore_ascii_case(email) {
        return Err(PortalError::Validation(
            "Email does not match the verification code".to_string(),
        ));
    }

    if found.application_status != ApplicationStatus::Approved {
        return Err(PortalError::Validation(
            "Your application has not been approved yet".to_string(),
        ));
    }

    Ok(found.code.application_id)
}

/// Registration gate
#[derive(Clone)]
pub struct RegistrationGate {
    pool: PgPool,
    users: UserRepository,
    codes: VerificationCodeRepository,
    /// Shared secret authorizing ADMIN self-registration; None disables it
    admin_setup_token: Option<String>,
}

impl RegistrationGate {
    /// Create a new registration gate
    pub fn new(
        pool: PgPool,
        users: UserRepository,
        codes: VerificationCodeRepository,
        admin_setup_token: Option<String>,
    ) -> Self {
        Self {
            pool,
            users,
            codes,
            admin_setup_token,
        }
    }

    /// Non-destructive validity check of a code against an email
    ///
    /// Returns the linked application id on success. Never marks the code
    /// used.
    pub async fn verify_code(&self, code: &str, email: &str) -> PortalResult<Uuid> {
        if code.is_empty() || email.is_empty() {
            return Err(PortalError::Validation(
                "Verification code and email are required".to_string(),
            ));
        }

        let found = self
            .codes
            .find_by_code(code)
            .await?
            .ok_or_else(|| PortalError::Validation("Invalid verification code".to_string()))?;

        check_code(&found, email, Utc::now())
    }

    /// Create a user account
    ///
    /// VOLUNTEER registration is gated by a verification code; the code
    /// checks re-run inside the transaction against a row lock, so a code
    /// consumed between a verify-code call and this one is still caught.
    pub async fn register(&self, params: RegisterParams) -> PortalResult<PublicUser> {
        validation::require_field(&params.name, "Name").map_err(PortalError::Validation)?;
        validation::validate_email(&params.email).map_err(PortalError::Validation)?;
        validation::validate_password(&params.password).map_err(PortalError::Validation)?;

        let role = params.role.unwrap_or(Role::Volunteer);

        if role == Role::Admin {
            let authorized = match (&self.admin_setup_token, &params.setup_token) {
                (Some(expected), Some(provided)) => expected == provided,
                _ => false,
            };
            if !authorized {
                return Err(PortalError::Forbidden);
            }
        }

        let verification_code = match (role, &params.verification_code) {
            (Role::Volunteer, None) => {
                return Err(PortalError::Validation(
                    "Verification code is required for volunteer registration".to_string(),
                ));
            }
            (Role::Volunteer, Some(code)) => Some(code.clone()),
            _ => None,
        };

        if self.users.find_by_email(&params.email).await?.is_some() {
            return Err(PortalError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(&params.password)?;

        let mut tx = self.pool.begin().await?;

        // Re-check the code under a row lock; verification before this
        // point was advisory only.
        let application_id = match &verification_code {
            Some(code) => {
                let row = sqlx::query(
                    r#"
                    SELECT v.id, v.code, v.email, v.expires_at, v.used, v.application_id,
                           v.created_at, a.status AS application_status
                    FROM verification_codes v
                    JOIN applications a ON a.id = v.application_id
                    WHERE v.code = $1
                    FOR UPDATE OF v
                    "#,
                )
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    PortalError::Validation("Invalid verification code".to_string())
                })?;

                let status: String = row.get("application_status");
                let found = CodeWithApplication {
                    code: map_code(&row)?,
                    application_status: ApplicationStatus::from_str(&status)
                        .map_err(|e| anyhow::anyhow!(e))?,
                };

                Some(check_code(&found, &params.email, Utc::now())?)
            }
            None => None,
        };

        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, role,
                      reset_token, reset_token_expires_at, created_at, updated_at
            "#,
        )
        .bind(&params.name)
        .bind(&params.email)
        .bind(&password_hash)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortalError::Conflict("User already exists".to_string())
            }
            _ => PortalError::Database(e),
        })?;

        let user = map_user(&row)?;

        if let Some(application_id) = application_id {
            sqlx::query("UPDATE applications SET user_id = $2 WHERE id = $1")
                .bind(application_id)
                .bind(user.id)
                .execute(&mut *tx)
                .await?;

            let consumed = sqlx::query(
                r#"
                UPDATE verification_codes
                SET used = TRUE
                WHERE application_id = $1 AND used = FALSE
                "#,
            )
            .bind(application_id)
            .execute(&mut *tx)
            .await?;

            // Zero rows means the code raced to used after our lock check
            // should have prevented it; abort rather than strand a user.
            if consumed.rows_affected() == 0 {
                return Err(PortalError::Validation(
                    "Verification code has already been used".to_string(),
                ));
            }
        }

        tx.commit().await?;

        info!("user {} registered with role {}", user.id, user.role);
        Ok(user.to_public())
    }
}
