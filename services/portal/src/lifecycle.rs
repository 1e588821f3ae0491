//! Application lifecycle engine
//!
//! Owns the state machine of a volunteer application: submission creates a
//! PENDING record, an admin decision moves it exactly once to APPROVED or
//! REJECTED, and approval mints the verification code that later gates
//! registration. Both terminal states are final; the only legal source
//! state for any transition is PENDING, enforced by a conditional update
//! so concurrent decisions settle with exactly one winner.

use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::{Application, NewApplication};
use crate::notifier::Notifier;
use crate::repositories::{ApplicationRepository, UserRepository};
use crate::validation;

/// Verification code alphabet: the uppercase base-36 digits
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of a verification code
const CODE_LENGTH: usize = 8;

/// Validity window of a freshly minted code
const CODE_VALIDITY_DAYS: i64 = 7;

/// How many fresh codes to try when the unique index reports a collision
const MAX_CODE_ATTEMPTS: u32 = 5;

/// Generate an 8-character uppercase alphanumeric verification code
pub fn generate_verification_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Outcome of a successful approval
///
/// The synchronous response is the system of record for showing the code
/// to the admin; email delivery is best-effort only.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub verification_code: String,
    pub email: String,
}

/// Application lifecycle engine
#[derive(Clone)]
pub struct LifecycleEngine {
    pool: PgPool,
    applications: ApplicationRepository,
    users: UserRepository,
    notifier: Notifier,
}

impl LifecycleEngine {
    /// Create a new lifecycle engine
    pub fn new(
        pool: PgPool,
        applications: ApplicationRepository,
        users: UserRepository,
        notifier: Notifier,
    ) -> Self {
        Self {
            pool,
            applications,
            users,
            notifier,
        }
    }

    /// Submit a new application, creating it in the PENDING state
    pub async fn submit(&self, new: NewApplication) -> PortalResult<Application> {
        validation::require_field(&new.name, "Name").map_err(PortalError::Validation)?;
        validation::require_field(&new.motivation, "Motivation").map_err(PortalError::Validation)?;
        validation::validate_email(&new.email).map_err(PortalError::Validation)?;

        // Email must be unique across applications AND users.
        if self.applications.find_by_email(&new.email).await?.is_some() {
            return Err(PortalError::Conflict(
                "An application with this email already exists".to_string(),
            ));
        }
        if self.users.find_by_email(&new.email).await?.is_some() {
            return Err(PortalError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        let application = self.applications.insert(&new).await?;
        info!("application {} submitted by {}", application.id, application.email);
        Ok(application)
    }

    /// All applications, newest first
    pub async fn list(&self) -> PortalResult<Vec<Application>> {
        self.applications.list_newest_first().await
    }

    /// Approve a PENDING application and mint its verification code
    ///
    /// The status transition and the code insert commit as one transaction.
    /// Once committed, the applicant is notified in the background; a
    /// notifier failure never rolls anything back.
    pub async fn approve(&self, application_id: Uuid) -> PortalResult<ApprovalOutcome> {
        let application = self
            .applications
            .find_by_id(application_id)
            .await?
            .ok_or_else(|| PortalError::NotFound("Application not found".to_string()))?;

        if application.status.is_terminal() {
            return Err(PortalError::InvalidState(
                "This application has already been processed".to_string(),
            ));
        }

        let expires_at = Utc::now() + Duration::days(CODE_VALIDITY_DAYS);

        let mut tx = self.pool.begin().await?;

        // Conditional update: of two concurrent approvals exactly one sees
        // a row transition here, the other observes zero rows and fails.
        let updated = sqlx::query(
            r#"
            UPDATE applications
            SET status = 'APPROVED'
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(application_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(PortalError::InvalidState(
                "This application has already been processed".to_string(),
            ));
        }

        let mut code = None;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = generate_verification_code(&mut rand::thread_rng());

            // ON CONFLICT keeps the transaction healthy on a code collision
            // so we can retry with a fresh token instead of surfacing a
            // rare random clash as a hard failure.
            let inserted = sqlx::query(
                r#"
                INSERT INTO verification_codes (code, email, expires_at, used, application_id)
                VALUES ($1, $2, $3, FALSE, $4)
                ON CONFLICT (code) DO NOTHING
                "#,
            )
            .bind(&candidate)
            .bind(&application.email)
            .bind(expires_at)
            .bind(application_id)
            .execute(&mut *tx)
            .await?;

            if inserted.rows_affected() == 1 {
                code = Some(candidate);
                break;
            }
        }

        let Some(code) = code else {
            return Err(PortalError::Internal(anyhow::anyhow!(
                "could not mint a unique verification code after {} attempts",
                MAX_CODE_ATTEMPTS
            )));
        };

        tx.commit().await?;

        info!("application {} approved", application_id);

        let message = self
            .notifier
            .verification_email(&application.name, &application.email, &code);
        self.notifier.send_detached(message);

        Ok(ApprovalOutcome {
            verification_code: code,
            email: application.email,
        })
    }

    /// Reject a PENDING application
    pub async fn reject(&self, application_id: Uuid) -> PortalResult<()> {
        let application = self
            .applications
            .find_by_id(application_id)
            .await?
            .ok_or_else(|| PortalError::NotFound("Application not found".to_string()))?;

        if application.status.is_terminal() {
            return Err(PortalError::InvalidState(
                "This application has already been processed".to_string(),
            ));
        }

        let updated = sqlx::query(
            r#"
            UPDATE applications
            SET status = 'REJECTED'
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(application_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(PortalError::InvalidState(
                "This application has already been processed".to_string(),
            ));
        }

        info!("application {} rejected", application_id);
        Ok(())
    }
}
