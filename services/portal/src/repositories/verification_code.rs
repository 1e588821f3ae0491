//! Verification code repository for database operations

use anyhow::anyhow;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use crate::error::PortalResult;
use crate::models::{ApplicationStatus, VerificationCode};

/// A verification code joined with the status of its owning application
#[derive(Debug, Clone)]
pub struct CodeWithApplication {
    pub code: VerificationCode,
    pub application_status: ApplicationStatus,
}

pub(crate) fn map_code(row: &PgRow) -> PortalResult<VerificationCode> {
    Ok(VerificationCode {
        id: row.get("id"),
        code: row.get("code"),
        email: row.get("email"),
        expires_at: row.get("expires_at"),
        used: row.get("used"),
        application_id: row.get("application_id"),
        created_at: row.get("created_at"),
    })
}

/// Verification code repository
#[derive(Clone)]
pub struct VerificationCodeRepository {
    pool: PgPool,
}

impl VerificationCodeRepository {
    /// Create a new verification code repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a code together with its application's status
    pub async fn find_by_code(&self, code: &str) -> PortalResult<Option<CodeWithApplication>> {
        let row = sqlx::query(
            r#"
            SELECT v.id, v.code, v.email, v.expires_at, v.used, v.application_id, v.created_at,
                   a.status AS application_status
            FROM verification_codes v
            JOIN applications a ON a.id = v.application_id
            WHERE v.code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.get("application_status");
        let application_status = ApplicationStatus::from_str(&status).map_err(|e| anyhow!(e))?;

        Ok(Some(CodeWithApplication {
            code: map_code(&row)?,
            application_status,
        }))
    }
}
