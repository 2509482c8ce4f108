//! OAuth 2.0 authorization-code flow for YouTube API access.
//!
//! This module owns the entire consent flow: building the provider consent
//! URL, redirecting the user's browser, receiving the authorization code on a
//! local redirect endpoint, validating the CSRF state, and exchanging the
//! code for an access token. Tokens are never refreshed; once the API rejects
//! one, the only way back is a fresh trip through [`OAuthManager::authenticate`].

use crate::request::{CallbackError, FlowRequest};
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    Scope, TokenUrl, reqwest,
};
use std::future::Future;
use std::time::Duration;

/// Google OAuth2 consent endpoint.
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google OAuth2 token endpoint used for the authorization-code exchange.
const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v3/token";

/// Default scope granting read/write access to the user's YouTube account.
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

/// We only ever ask for online access; there is no refresh token to hold on to.
const ACCESS_TYPE: &str = "online";

/// Connect timeout for the token-exchange call.
const EXCHANGE_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Consent prompt shown to users who hit the redirect endpoint before
/// starting the flow. `{auth_url}` is substituted with the consent URL.
const CONSENT_PROMPT: &str = include_str!("../consent_prompt.html");

/// Page shown in the browser once authorization has completed.
const OAUTH_DONE: &str = include_str!("../oauth_success.html");

/// Manages the OAuth 2.0 authorization-code flow.
///
/// The manager holds the client credentials and the parts of the flow the
/// caller may tune: the requested scope and whether the provider should force
/// the approval prompt even for previously-authorized users. The response
/// type is always `code` and the access type always `online`.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: String,
    client_secret: String,
    scope: String,
    force_approval: bool,
}

impl OAuthManager {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: DEFAULT_SCOPE.to_string(),
            force_approval: false,
        }
    }

    /// Overrides the requested scope URL.
    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    /// Makes the provider re-show the approval prompt even if the user has
    /// authorized this application before.
    pub fn set_force_approval(&mut self, force: bool) {
        self.force_approval = force;
    }

    /// Performs the complete authorization-code flow and returns the token
    /// response together with the CSRF nonce that the callback was validated
    /// against.
    ///
    /// The flow:
    /// 1. binds a one-shot redirect endpoint on a random localhost port,
    /// 2. opens the user's browser on the provider consent URL,
    /// 3. awaits the authorization code (rejecting callbacks whose `state`
    ///    does not match the issued nonce),
    /// 4. exchanges the code for an access token with a single POST to the
    ///    token endpoint (`grant_type=authorization_code`).
    ///
    /// # Panics
    ///
    /// Panics if hardcoded OAuth endpoint URLs are malformed (this should
    /// never happen in practice as the URLs are static and validated).
    pub async fn authenticate(&self) -> eyre::Result<(BasicTokenResponse, CsrfToken)> {
        let csrf = CsrfToken::new_random();

        let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind to localhost")?;
        let addr = socket.local_addr().context("get local address")?;
        let redirect_url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
            .context("construct redirect url")?;

        let auth_url =
            AuthUrl::new(AUTH_URL.to_string()).expect("Invalid authorization endpoint URL");
        let token_url = TokenUrl::new(TOKEN_URL.to_string()).expect("Invalid token endpoint URL");
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // The nonce is generated up front so the redirect endpoint can
            // validate callbacks against it; the flow runs exactly once.
            .authorize_url({
                let csrf = csrf.clone();
                move || csrf.clone()
            })
            .add_scope(Scope::new(self.scope.clone()))
            .add_extra_param("access_type", ACCESS_TYPE)
            .add_extra_param(
                "approval_prompt",
                if self.force_approval { "force" } else { "auto" },
            )
            .set_pkce_challenge(pkce_challenge)
            .url();

        let prompt = self.consent_prompt_html(auth_url.as_ref());
        let eventually_authorization_code = serve_redirect(socket, csrf.clone(), prompt);

        tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
        webbrowser::open(auth_url.as_ref()).context("open user's browser")?;
        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        let http_client = reqwest::ClientBuilder::new()
            // Following redirects opens the client up to SSRF.
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(EXCHANGE_CONNECT_TIMEOUT)
            .build()
            .expect("building reqwest client should not fail");
        let token_result = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .context("exchange authorization code with access token")?;

        Ok((token_result, csrf))
    }

    /// Renders the consent prompt: a small HTML fragment telling the user
    /// they need to grant access, with the consent URL embedded as a link.
    pub fn consent_prompt_html(&self, auth_url: &str) -> String {
        CONSENT_PROMPT.replace("{auth_url}", auth_url)
    }
}

/// Serves the redirect endpoint until a valid authorization code arrives.
///
/// Connections are handled one at a time without keep-alive: a browser poking
/// the endpoint without flow markers (or before consenting) gets the consent
/// prompt and its connection is closed, while the provider redirect carrying
/// `code` and `state` completes the returned future. A callback with a
/// mismatched `state` aborts the whole flow.
fn serve_redirect(
    socket: tokio::net::TcpListener,
    csrf: CsrfToken,
    prompt: String,
) -> impl Future<Output = eyre::Result<AuthorizationCode>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let r = async move {
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            loop {
                // The code may have been delivered on a connection that
                // already finished serving; pick it up before blocking on
                // another accept.
                let conn = tokio::select! {
                    code = gotten.recv() => {
                        let code = code.expect("channel won't be closed until the accept loop exits");
                        return Ok(code);
                    }
                    conn = socket.accept() => conn.context("accept")?.0,
                };
                let conn = hyper_util::rt::TokioIo::new(conn);
                let service = service_fn({
                    let csrf = csrf.clone();
                    let got = got.clone();
                    let prompt = prompt.clone();
                    move |req: Request<body::Incoming>| {
                        let csrf = csrf.clone();
                        let got = got.clone();
                        let prompt = prompt.clone();
                        async move {
                            let flow = FlowRequest::from_query(req.uri().query().unwrap_or(""));
                            if !flow.user_initiated() {
                                // The user hasn't proceeded yet; re-present
                                // the consent link.
                                return Ok::<_, CallbackError>(Response::new(Full::new(Bytes::from(prompt))));
                            }
                            // TODO: check that the user granted the scope(s) we requested
                            let code = flow.authorization_code(&csrf)?;
                            got.send(code)
                                .await
                                .expect("channel won't be closed until server exit");
                            Ok(Response::new(Full::new(Bytes::from(OAUTH_DONE))))
                        }
                    }
                });
                let mut serve = std::pin::pin!(
                    hyper::server::conn::http1::Builder::new()
                        .keep_alive(false)
                        .serve_connection(conn, service)
                );

                tokio::select! {
                    exit = &mut serve => {
                        if let Err(e) = exit {
                            return Err(e).context("redirect server got bad request");
                        }
                        // Connection closed without delivering a code (the
                        // consent prompt was served); keep listening.
                    }
                    code = gotten.recv() => {
                        let code = code.expect("channel won't be closed until the accept loop exits");
                        // Let the in-flight success page finish writing.
                        serve.as_mut().graceful_shutdown();
                        let _ = serve.await;
                        return Ok(code);
                    }
                }
            }
        };
        let _ = tx.send(r.await);
    });
    async move { rx.await.context("redirect future dropped prematurely")? }
}
