//! Verification code model
//!
//! A verification code is a single-use, time-limited secret minted when an
//! application is approved. It ties the approved application to the user
//! account that will later be created through registration. Codes are never
//! deleted; a consumed code stays in the table as an audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Verification code entity, one per approved application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub id: Uuid,
    pub code: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub application_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Whether the validity window has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
