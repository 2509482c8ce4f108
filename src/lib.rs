//! A thin wrapper around Google's OAuth2 authorization-code flow and the
//! YouTube Data API v3.
//!
//! The crate does three things:
//!
//! 1. runs the browser-based consent flow and exchanges the authorization
//!    code for an access token ([`oauth`]),
//! 2. keeps the resulting token in an on-disk [`Session`] until the API
//!    rejects it ([`session`]),
//! 3. issues bearer-authenticated, paginated API calls against YouTube Data
//!    API endpoints ([`youtube_api`]).
//!
//! [`establish_session`] ties the three together: load a stored session if
//! one exists and still works, otherwise walk the user through consent and
//! persist the result.

use crate::oauth::OAuthManager;
use eyre::Context;
use std::path::Path;

pub mod oauth;
pub mod request;
pub mod session;
pub mod youtube_api;

pub use request::FlowRequest;
pub use session::Session;
pub use youtube_api::client::{SessionExpired, YouTubeClient};

/// User-Agent presented on every API request.
const USER_AGENT: &str = concat!("youtube-api-access/", env!("CARGO_PKG_VERSION"));

/// Establishes an authenticated session and returns it together with an API
/// client bound to it.
///
/// The progression mirrors the browser flow:
///
/// * no stored session → run the full consent flow
///   ([`OAuthManager::authenticate`]), persist the token and CSRF state to
///   `session_path`;
/// * stored session → probe it with a minimal API call; if the API rejects
///   it, the stale file is destroyed and the consent flow runs again.
///
/// There is no token refresh: a session is used as stored until the API
/// turns it away.
pub async fn establish_session(
    oauth: &OAuthManager,
    session_path: &Path,
) -> eyre::Result<(Session, YouTubeClient)> {
    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("build HTTP client")?;

    if let Some(session) = Session::load(session_path)
        .await
        .context("load stored session")?
    {
        let client = YouTubeClient::new(&session, session_path, http.clone());
        if client
            .validate_token()
            .await
            .context("validate stored token")?
        {
            tracing::debug!("stored session is valid");
            return Ok((session, client));
        }
        // The rejected probe has already torn the session file down.
        tracing::warn!("stored session rejected by the API, starting over");
    } else {
        tracing::info!("no stored session, starting consent flow");
    }

    let (token, state) = oauth
        .authenticate()
        .await
        .context("authorize user to YouTube")?;
    let session = Session::new(token, state.into_secret());
    session
        .save(session_path)
        .await
        .context("persist session")?;

    let client = YouTubeClient::new(&session, session_path, http);
    Ok((session, client))
}
