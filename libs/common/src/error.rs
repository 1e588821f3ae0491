//! Infrastructure error types shared across services

use thiserror::Error;

/// Errors raised while setting up or talking to infrastructure services
#[derive(Error, Debug)]
pub enum InfraError {
    /// A required environment variable is missing
    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),

    /// PostgreSQL connection or query failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Redis connection or command failure
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// A cached value could not be (de)serialized
    #[error("cache serialization error: {0}")]
    CacheSerialization(#[from] serde_json::Error),
}

/// Type alias for Result with InfraError
pub type InfraResult<T> = Result<T, InfraError>;
