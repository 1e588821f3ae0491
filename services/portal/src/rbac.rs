//! Role-based access table for dashboard sections
//!
//! One shared table decides which navigable sections an identity may see.
//! Both consumers — the navigation listing and the per-section content
//! gate — go through [`has_access`]; keeping a single table is what stops
//! the two call sites from drifting apart. This layer is UI convenience
//! only: the authoritative access-control boundary stays the
//! authorization guard.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::Role;

/// The navigable content sections of the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Dashboard,
    Volunteers,
    Applications,
    Documents,
    Scanner,
    Reminders,
    Recognition,
    Requests,
    Database,
    Reports,
    Settings,
    Documentation,
    Support,
}

impl Section {
    /// Every section, in navigation order
    pub const ALL: [Section; 13] = [
        Section::Dashboard,
        Section::Volunteers,
        Section::Applications,
        Section::Documents,
        Section::Scanner,
        Section::Reminders,
        Section::Recognition,
        Section::Requests,
        Section::Database,
        Section::Reports,
        Section::Settings,
        Section::Documentation,
        Section::Support,
    ];

    /// URL/path representation of the section
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Dashboard => "dashboard",
            Section::Volunteers => "volunteers",
            Section::Applications => "applications",
            Section::Documents => "documents",
            Section::Scanner => "scanner",
            Section::Reminders => "reminders",
            Section::Recognition => "recognition",
            Section::Requests => "requests",
            Section::Database => "database",
            Section::Reports => "reports",
            Section::Settings => "settings",
            Section::Documentation => "documentation",
            Section::Support => "support",
        }
    }

    /// The roles permitted to view this section
    ///
    /// Administrative review surfaces are ADMIN-only; coordination views
    /// extend to COORDINATOR; the rest is general signed-in content.
    pub fn allowed_roles(&self) -> &'static [Role] {
        const EVERYONE: &[Role] = &[
            Role::Admin,
            Role::Volunteer,
            Role::Coordinator,
            Role::External,
        ];
        const STAFF: &[Role] = &[Role::Admin, Role::Coordinator];
        const ADMIN_ONLY: &[Role] = &[Role::Admin];
        const INTERNAL: &[Role] = &[Role::Admin, Role::Volunteer, Role::Coordinator];

        match self {
            Section::Dashboard => EVERYONE,
            Section::Volunteers => STAFF,
            Section::Applications => ADMIN_ONLY,
            Section::Documents => INTERNAL,
            Section::Scanner => STAFF,
            Section::Reminders => INTERNAL,
            Section::Recognition => INTERNAL,
            Section::Requests => STAFF,
            Section::Database => ADMIN_ONLY,
            Section::Reports => STAFF,
            Section::Settings => EVERYONE,
            Section::Documentation => EVERYONE,
            Section::Support => EVERYONE,
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .iter()
            .find(|section| section.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown section: {s}"))
    }
}

/// Whether an identity may view a section
///
/// No identity means no access, regardless of section.
pub fn has_access(role: Option<Role>, section: Section) -> bool {
    match role {
        Some(role) => section.allowed_roles().contains(&role),
        None => false,
    }
}

/// The sections an identity may navigate to, in navigation order
pub fn visible_sections(role: Option<Role>) -> Vec<Section> {
    Section::ALL
        .into_iter()
        .filter(|section| has_access(role, *section))
        .collect()
}
