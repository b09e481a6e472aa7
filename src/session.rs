//! Resolving the calling user from a bearer token.

use crate::errors::AppError;
use crate::services::{AuthService, AuthUser};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: Uuid,
    pub email: Option<String>,
    /// Forwarded to the platform so row-level policies apply to writes.
    pub access_token: String,
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolves bearer tokens through the auth service, memoizing the result
/// for a short TTL keyed by the token's SHA-256 digest.
#[derive(Clone)]
pub struct SessionResolver {
    auth: AuthService,
    sessions: Cache<String, AuthUser>,
}

impl SessionResolver {
    pub fn new(auth: AuthService, ttl: Duration) -> Self {
        let sessions = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(10_000)
            .build();
        Self { auth, sessions }
    }

    /// The caller, if the request carries a valid token; `None` when the
    /// request is anonymous. An invalid token is an error.
    pub async fn optional(&self, headers: &HeaderMap) -> Result<Option<Actor>, AppError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };

        let key = token_digest(token);
        let user = match self.sessions.get(&key).await {
            Some(user) => user,
            None => {
                let user = self.auth.get_user(token).await?;
                self.sessions.insert(key, user.clone()).await;
                user
            }
        };

        Ok(Some(Actor {
            id: user.id,
            email: user.email,
            access_token: token.to_string(),
        }))
    }

    /// The caller, or `Unauthorized` for anonymous requests.
    pub async fn require(&self, headers: &HeaderMap) -> Result<Actor, AppError> {
        self.optional(headers).await?.ok_or_else(|| {
            AppError::Unauthorized("Você precisa estar logado para continuar".to_string())
        })
    }
}
