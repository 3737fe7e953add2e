//! Session-based caller identity.
//!
//! Login happens elsewhere (OAuth). This module only resolves the session
//! token presented on each request to the [`SessionUser`] the login flow
//! stored in Redis under `session:{token}`.

pub mod handlers;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use redis::AsyncCommands;

use crate::errors::AppError;
use crate::models::user::SessionUser;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sid";

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, token: &str) -> Result<Option<SessionUser>, AppError>;
    async fn revoke(&self, token: &str) -> Result<(), AppError>;
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, token: &str) -> Result<Option<SessionUser>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(session_key(token)).await?;
        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(user) => Ok(Some(user)),
                Err(e) => {
                    tracing::warn!("Discarding unreadable session: {e}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(session_key(token)).await?;
        Ok(())
    }
}

/// The authenticated caller. Rejects with 401 when no valid session is presented.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let user = state
            .sessions
            .load(&token)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(AuthUser { user, token })
    }
}

/// Bearer token first, then the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
