use std::sync::Arc;

use chrono::Duration;
use plan_core::Clock;
use plan_core::model::UserId;
use storage::repository::{SessionRecord, SessionRepository};

use crate::error::AuthError;

/// Resolves bearer tokens to owner identities.
///
/// Sessions are opaque tokens with an expiry. The store keeps expired rows
/// as-is; this layer decides whether a token is still usable.
#[derive(Clone)]
pub struct Authenticator {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
}

impl Authenticator {
    #[must_use]
    pub fn new(clock: Clock, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { clock, sessions }
    }

    /// Register a session token for a user, valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` when the token already exists or the
    /// store is unavailable.
    pub async fn start_session(
        &self,
        user: UserId,
        token: String,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let record = SessionRecord {
            token,
            user,
            expires_at: self.clock.now() + ttl,
        };
        self.sessions.insert_session(&record).await?;
        tracing::debug!(user = user.value(), "session started");
        Ok(())
    }

    /// Resolve a bearer token to its owner.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for unknown tokens,
    /// `AuthError::Expired` for tokens past their expiry, and
    /// `AuthError::Storage` if the store is unavailable.
    pub async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let record = self
            .sessions
            .get_session(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if record.expires_at <= self.clock.now() {
            return Err(AuthError::Expired);
        }
        Ok(record.user)
    }

    /// Drop a session token. Unknown tokens are not an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store is unavailable.
    pub async fn end_session(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete_session(token).await?;
        Ok(())
    }
}
