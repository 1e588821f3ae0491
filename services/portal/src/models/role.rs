//! Role model and related functionality

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles a user can hold
///
/// The role governs both server-side authorization (only ADMIN may review
/// applications) and which dashboard sections the client renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Volunteer,
    Coordinator,
    External,
}

impl Role {
    /// Database/wire representation of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Volunteer => "VOLUNTEER",
            Role::Coordinator => "COORDINATOR",
            Role::External => "EXTERNAL",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "VOLUNTEER" => Ok(Role::Volunteer),
            "COORDINATOR" => Ok(Role::Coordinator),
            "EXTERNAL" => Ok(Role::External),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
