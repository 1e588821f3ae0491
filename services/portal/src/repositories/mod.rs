//! Database repositories for the volunteer portal

pub mod application;
pub mod user;
pub mod verification_code;

pub use application::ApplicationRepository;
pub use user::UserRepository;
pub use verification_code::{CodeWithApplication, VerificationCodeRepository};
