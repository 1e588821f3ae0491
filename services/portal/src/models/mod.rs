//! Volunteer portal models

pub mod application;
pub mod role;
pub mod user;
pub mod verification_code;

// Re-export for convenience
pub use application::{Application, ApplicationStatus, NewApplication};
pub use role::Role;
pub use user::{PublicUser, User};
pub use verification_code::VerificationCode;
