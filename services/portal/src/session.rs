//! Server-side session store
//!
//! A session is one of the two credential forms the authorization guard
//! accepts. Sessions live in Redis as JSON identity blobs under opaque
//! ids, bounded by the same one-day TTL as the bearer tokens.

use common::cache::RedisPool;
use uuid::Uuid;

use crate::error::PortalResult;
use crate::guard::AuthIdentity;

/// Redis key prefix for session entries
const SESSION_KEY_PREFIX: &str = "session:";

/// Session store over the shared Redis pool
#[derive(Clone)]
pub struct SessionStore {
    redis: RedisPool,
    ttl_seconds: u64,
}

impl SessionStore {
    /// Create a new session store with the given session lifetime
    pub fn new(redis: RedisPool, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    /// Create a session for a signed-in identity, returning the opaque id
    /// the client presents as its bearer credential
    pub async fn create(&self, identity: &AuthIdentity) -> PortalResult<String> {
        let session_id = Uuid::new_v4().to_string();
        let key = format!("{SESSION_KEY_PREFIX}{session_id}");
        self.redis
            .set_json(&key, identity, Some(self.ttl_seconds))
            .await?;
        Ok(session_id)
    }

    /// Look up a session by id, None when it is unknown or expired
    pub async fn get(&self, session_id: &str) -> PortalResult<Option<AuthIdentity>> {
        let key = format!("{SESSION_KEY_PREFIX}{session_id}");
        let identity = self.redis.get_json(&key).await?;
        Ok(identity)
    }

    /// Drop a session
    pub async fn delete(&self, session_id: &str) -> PortalResult<()> {
        let key = format!("{SESSION_KEY_PREFIX}{session_id}");
        self.redis.delete(&key).await?;
        Ok(())
    }
}
