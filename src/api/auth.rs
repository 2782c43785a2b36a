//! Token-based session handling
//!
//! Access and refresh tokens live in the key-value store under
//! `access_token` / `refresh_token`. Until the server's "me" endpoint answers,
//! the signed-in user is decoded from the access token's JWT payload.

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ApiError, HttpClient};
use crate::storage::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Token pair issued by the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// The signed-in user, as far as the client knows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Option<i64>,
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Decode the user claims carried in a JWT's payload segment.
///
/// The signature is not verified; this only fills the UI until the server
/// confirms the user.
pub fn provisional_user(token: &str) -> Option<SessionUser> {
    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;

    let id = ["user_id", "id", "sub"].iter().find_map(|k| match claims.get(*k)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });
    let username = ["username", "email", "name"]
        .iter()
        .find_map(|k| claims.get(*k).and_then(Value::as_str))
        .map(str::to_string);
    let email = claims.get("email").and_then(Value::as_str).map(str::to_string);

    if id.is_none() && username.is_none() {
        return None;
    }
    Some(SessionUser {
        id,
        username,
        email,
    })
}

/// Stored session backed by the key-value store
#[derive(Clone)]
pub struct AuthSession {
    store: Arc<dyn KeyValueStore>,
}

impl AuthSession {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current access token; storage failures read as "signed out"
    pub fn access_token(&self) -> Option<String> {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(err) => {
                warn!(error = %err, "could not read access token");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn store_tokens(&self, tokens: &Tokens) -> Result<(), crate::storage::StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, &tokens.access)?;
        match &tokens.refresh {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh),
            None => self.store.remove(REFRESH_TOKEN_KEY),
        }
    }

    /// Exchange credentials for tokens and persist them
    pub async fn login(
        &self,
        client: &HttpClient,
        username: &str,
        password: &str,
    ) -> Result<SessionUser, ApiError> {
        let tokens = client.login(username, password).await?;
        self.store_tokens(&tokens)
            .map_err(|e| ApiError::parse("token storage", e.to_string()))?;
        info!(username, "signed in");

        let provisional = provisional_user(&tokens.access).unwrap_or(SessionUser {
            id: None,
            username: Some(username.to_string()),
            email: None,
        });

        match client.me().await {
            Ok(user) => Ok(user),
            Err(err) => {
                debug!(error = %err, "user endpoint unavailable, keeping token claims");
                Ok(provisional)
            }
        }
    }

    /// Forget both tokens
    pub fn logout(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(err) = self.store.remove(key) {
                warn!(key, error = %err, "could not remove token");
            }
        }
        info!("signed out");
    }

    /// User decoded from the stored access token
    pub fn current_user(&self) -> Option<SessionUser> {
        self.access_token().as_deref().and_then(provisional_user)
    }
}
