//! Sign-in collaborator: pre-issued token first, anonymous as fallback, and a
//! reactive "current user" feed.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::UserId;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::HubError;

const ANONYMOUS_PREFIX: &str = "anon-";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token sign-in is not configured")]
    TokenSignInUnavailable,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token has an empty subject")]
    EmptySubject,
    #[error("anonymous sign-in failed: {0}")]
    Anonymous(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_token(&self, token: &str) -> Result<UserId, AuthError>;
    async fn sign_in_anonymously(&self) -> Result<UserId, AuthError>;
    async fn sign_out(&self);
    fn current_user(&self) -> watch::Receiver<Option<UserId>>;
}

/// Signs in with `token` when one is configured; any token failure falls back
/// to anonymous sign-in without surfacing the token error.
pub async fn sign_in(auth: &dyn AuthProvider, token: Option<&str>) -> Result<UserId, HubError> {
    if let Some(token) = token {
        match auth.sign_in_with_token(token).await {
            Ok(user_id) => return Ok(user_id),
            Err(err) => debug!(%err, "token sign-in failed; falling back to anonymous sign-in"),
        }
    }
    auth.sign_in_anonymously()
        .await
        .map_err(|err| HubError::SignIn(err.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues an HS256 sign-in token for `user_id`.
pub fn mint_token(
    secret: &str,
    user_id: &UserId,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Auth provider for a locally operated store: tokens are verified against the
/// store's shared secret.
pub struct LocalAuth {
    token_secret: Option<String>,
    current: watch::Sender<Option<UserId>>,
}

impl LocalAuth {
    pub fn new(token_secret: Option<String>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            token_secret,
            current,
        }
    }

    fn publish(&self, user_id: &UserId) {
        self.current.send_replace(Some(user_id.clone()));
        info!(user_id = %user_id, "signed in");
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in_with_token(&self, token: &str) -> Result<UserId, AuthError> {
        let secret = self
            .token_secret
            .as_deref()
            .ok_or(AuthError::TokenSignInUnavailable)?;
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::EmptySubject);
        }
        let user_id = UserId::new(data.claims.sub);
        self.publish(&user_id);
        Ok(user_id)
    }

    async fn sign_in_anonymously(&self) -> Result<UserId, AuthError> {
        let user_id = UserId::new(format!(
            "{ANONYMOUS_PREFIX}{}",
            uuid::Uuid::new_v4().simple()
        ));
        self.publish(&user_id);
        Ok(user_id)
    }

    async fn sign_out(&self) {
        self.current.send_replace(None);
    }

    fn current_user(&self) -> watch::Receiver<Option<UserId>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
