//! Application repository for database operations

use anyhow::anyhow;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::models::{Application, ApplicationStatus, NewApplication};

/// Map a database row to an Application
pub(crate) fn map_application(row: &PgRow) -> PortalResult<Application> {
    let status: String = row.get("status");
    let status = ApplicationStatus::from_str(&status).map_err(|e| anyhow!(e))?;

    Ok(Application {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        motivation: row.get("motivation"),
        experience: row.get("experience"),
        status,
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    })
}

const APPLICATION_COLUMNS: &str =
    "id, name, email, phone, motivation, experience, status, user_id, created_at";

/// Application repository
#[derive(Clone)]
pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    /// Create a new application repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an application by email, exact match as persisted
    pub async fn find_by_email(&self, email: &str) -> PortalResult<Option<Application>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM applications
            WHERE email = $1
            "#
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_application).transpose()
    }

    /// Insert a new PENDING application
    ///
    /// Two concurrent submissions can both pass the caller's email checks;
    /// the unique index settles the race here, as a conflict rather than a
    /// bare database error.
    pub async fn insert(&self, new: &NewApplication) -> PortalResult<Application> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO applications (name, email, phone, motivation, experience, status)
            VALUES ($1, $2, $3, $4, $5, 'PENDING')
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.motivation)
        .bind(&new.experience)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => PortalError::Conflict(
                "An application with this email already exists".to_string(),
            ),
            _ => PortalError::Database(e),
        })?;

        map_application(&row)
    }

    /// All applications, newest first
    pub async fn list_newest_first(&self) -> PortalResult<Vec<Application>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM applications
            ORDER BY created_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_application).collect()
    }

    /// Find an application by id
    pub async fn find_by_id(&self, id: Uuid) -> PortalResult<Option<Application>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM applications
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_application).transpose()
    }
}
