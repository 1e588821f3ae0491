//! Shared infrastructure for the volunteer portal services
//!
//! This crate provides the pieces every service needs: the PostgreSQL
//! connection pool backing the credential store, the Redis pool backing
//! server-side sessions, and the infrastructure error type both report
//! through.

pub mod cache;
pub mod database;
pub mod error;
