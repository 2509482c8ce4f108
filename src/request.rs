//! Parsed query parameters of an inbound request on the OAuth redirect
//! endpoint.
//!
//! Everything the flow needs from an incoming request is captured here up
//! front, so the rest of the crate never touches raw query strings.

use oauth2::{AuthorizationCode, CsrfToken};
use std::fmt;

/// The recognized query parameters of a request hitting the redirect
/// endpoint.
///
/// A request is considered *user-initiated* once it carries any of the
/// markers that only appear after the user has clicked through the consent
/// prompt (`token_requested`, `code`, or `token`). Requests without them are
/// served the consent prompt instead of being treated as callbacks.
#[derive(Debug, Default)]
pub struct FlowRequest {
    code: Option<String>,
    state: Option<String>,
    token: Option<String>,
    token_requested: bool,
    // space-separated
    granted_scope: Option<String>,
}

impl FlowRequest {
    /// Parses a `application/x-www-form-urlencoded` query string.
    ///
    /// Unrecognized parameters are ignored; repeated parameters keep the last
    /// value.
    pub fn from_query(query: &str) -> Self {
        let mut request = Self::default();
        for (k, v) in form_urlencoded::parse(query.as_bytes()) {
            match &*k {
                "code" => request.code = Some(v.into_owned()),
                "state" => request.state = Some(v.into_owned()),
                "token" => request.token = Some(v.into_owned()),
                "token_requested" => request.token_requested = true,
                "scope" => request.granted_scope = Some(v.into_owned()),
                _ => {}
            }
        }
        request
    }

    /// Whether the user has decided to proceed with the login process.
    pub fn user_initiated(&self) -> bool {
        self.token_requested || self.code.is_some() || self.token.is_some()
    }

    /// The scope(s) the user actually granted, space-separated, if the
    /// provider reported them.
    pub fn granted_scope(&self) -> Option<&str> {
        self.granted_scope.as_deref()
    }

    /// Extracts the authorization code, but only if the presented `state`
    /// matches the CSRF nonce issued when the consent URL was generated.
    ///
    /// A mismatch aborts the flow; an attacker-injected code must never be
    /// exchanged for a token.
    pub fn authorization_code(
        &self,
        expected_state: &CsrfToken,
    ) -> Result<AuthorizationCode, CallbackError> {
        if self.state.as_deref() != Some(expected_state.secret().as_str()) {
            return Err(CallbackError::StateMismatch);
        }
        let Some(code) = &self.code else {
            return Err(CallbackError::MissingCode);
        };
        Ok(AuthorizationCode::new(code.clone()))
    }
}

/// Why a redirect-endpoint callback was rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum CallbackError {
    /// The presented `state` did not match the issued CSRF nonce.
    StateMismatch,
    /// The request was user-initiated but carried no authorization code.
    MissingCode,
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackError::StateMismatch => {
                write!(f, "session state did not match the state presented by the provider")
            }
            CallbackError::MissingCode => write!(f, "no authorization code found"),
        }
    }
}

impl std::error::Error for CallbackError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_request_is_not_user_initiated() {
        assert!(!FlowRequest::from_query("").user_initiated());
        assert!(!FlowRequest::from_query("foo=bar&baz=1").user_initiated());
    }

    #[test]
    fn markers_make_request_user_initiated() {
        assert!(FlowRequest::from_query("code=4/abcdef").user_initiated());
        assert!(FlowRequest::from_query("token_requested=1").user_initiated());
        assert!(FlowRequest::from_query("token=ya29.xyz").user_initiated());
    }

    #[test]
    fn matching_state_yields_code() {
        let csrf = CsrfToken::new("nonce123".to_string());
        let request = FlowRequest::from_query("state=nonce123&code=4/abcdef");
        let code = request
            .authorization_code(&csrf)
            .expect("state matches, code present");
        assert_eq!(code.secret(), "4/abcdef");
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let csrf = CsrfToken::new("nonce123".to_string());
        let request = FlowRequest::from_query("state=evil&code=4/abcdef");
        assert_eq!(
            request.authorization_code(&csrf),
            Err(CallbackError::StateMismatch)
        );
    }

    #[test]
    fn absent_state_is_rejected() {
        let csrf = CsrfToken::new("nonce123".to_string());
        let request = FlowRequest::from_query("code=4/abcdef");
        assert_eq!(
            request.authorization_code(&csrf),
            Err(CallbackError::StateMismatch)
        );
    }

    #[test]
    fn missing_code_is_rejected() {
        let csrf = CsrfToken::new("nonce123".to_string());
        let request = FlowRequest::from_query("state=nonce123&token_requested=1");
        assert_eq!(
            request.authorization_code(&csrf),
            Err(CallbackError::MissingCode)
        );
    }

    #[test]
    fn url_encoded_values_are_decoded() {
        let request = FlowRequest::from_query(
            "state=abc&code=4%2Fxyz&scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fyoutube",
        );
        let csrf = CsrfToken::new("abc".to_string());
        assert_eq!(
            request.authorization_code(&csrf).unwrap().secret(),
            "4/xyz"
        );
        assert_eq!(
            request.granted_scope(),
            Some("https://www.googleapis.com/auth/youtube")
        );
    }
}
