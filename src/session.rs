//! On-disk session storage.
//!
//! A session holds the raw token-endpoint response together with the CSRF
//! state nonce that was issued when the consent URL was generated. It is
//! created once the authorization code has been exchanged, loaded on every
//! subsequent run, and destroyed when the API rejects a call (treated as
//! session expiry). There is no token refresh; a destroyed session means a
//! fresh trip through the consent flow.

use eyre::Context;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The token-endpoint response, stored as received. Immutable.
    token: BasicTokenResponse,
    /// The CSRF nonce that was validated during the callback.
    state: String,
}

impl Session {
    pub fn new(token: BasicTokenResponse, state: String) -> Self {
        Self { token, state }
    }

    /// Loads a stored session, or `None` if none has been persisted yet.
    pub async fn load(path: &Path) -> eyre::Result<Option<Self>> {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read session file {}", path.display()));
            }
        };
        let session = serde_json::from_str(&json)
            .with_context(|| format!("parse session file {}", path.display()))?;
        Ok(Some(session))
    }

    pub async fn save(&self, path: &Path) -> eyre::Result<()> {
        let json = serde_json::to_string(self).context("serialize session")?;
        tokio::fs::write(path, &json)
            .await
            .with_context(|| format!("write session file {}", path.display()))?;
        Ok(())
    }

    /// Removes the session file. Idempotent: succeeds if none exists.
    pub async fn destroy(path: &Path) -> eyre::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove session file {}", path.display())),
        }
    }

    /// The access token to present in `Authorization: Bearer` headers.
    pub fn access_token(&self) -> &str {
        self.token.access_token().secret()
    }

    pub fn token(&self) -> &BasicTokenResponse {
        &self.token
    }

    pub fn state(&self) -> &str {
        &self.state
    }
}
