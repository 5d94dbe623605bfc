//! Core session types
//!
//! Defines the credential pair held on behalf of the application, the wire
//! format of the provider's token endpoint, the OAuth configuration, and
//! the session state handed to consumers.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::AuthError;
use crate::profile::Profile;

/// Default provider base URL (the 42 intra API).
pub const DEFAULT_BASE_URL: &str = "https://api.intra.42.fr";

/// Access/refresh token pair with its expiry instant.
///
/// The credential is owned by the [`crate::traits::CredentialStore`]; the
/// lifecycle manager only ever holds a working copy for the duration of one
/// operation. It is replaced wholesale on every successful refresh and
/// destroyed on logout or unrecoverable refresh failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Opaque bearer token used to authorize API calls.
    pub access_token: String,

    /// Longer-lived credential used to renew the access token.
    /// Some providers never issue one.
    pub refresh_token: Option<String>,

    /// Absolute expiration instant (UTC). Computed exactly once, when the
    /// token response was received; absent means "unknown, assume expired".
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build a credential from a token response.
    ///
    /// This is the only place `expires_at` is ever computed: receipt time
    /// plus the advertised `expires_in`. When the provider rotates refresh
    /// tokens the response value wins; otherwise `previous_refresh` is
    /// carried over so renewal stays possible.
    #[must_use]
    pub fn from_response(response: TokenResponse, previous_refresh: Option<String>) -> Self {
        let expires_at = response
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + Duration::seconds(secs));

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at,
        }
    }

    /// Whether the access token is expired or expires within `skew_seconds`.
    ///
    /// An absent expiry instant counts as expired: the stored expiry entry
    /// may be missing independently of the tokens, and a token of unknown
    /// age must not be trusted.
    #[must_use]
    pub fn is_expired(&self, skew_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + Duration::seconds(skew_seconds) >= expires_at,
            None => true,
        }
    }

    /// Seconds until expiry, or `None` if no expiry instant is known.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}

/// Token endpoint response (RFC 6749 §5.1), for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds. Optional; some providers omit it.
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Token endpoint error body (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub struct ProviderError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

/// OAuth provider configuration.
///
/// The 42 intra is a confidential-client provider: both token grants carry
/// `client_id` and `client_secret` as form fields.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Provider base URL, e.g. `https://api.intra.42.fr`.
    pub base_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Redirect URI registered with the provider.
    pub redirect_uri: String,

    /// Scopes to request.
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(
        base_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        scopes: Vec<String>,
    ) -> Self {
        Self { base_url, client_id, client_secret, redirect_uri, scopes }
    }

    /// Load configuration from the environment.
    ///
    /// Reads `INTRA_CLIENT_ID`, `INTRA_CLIENT_SECRET` and
    /// `INTRA_REDIRECT_URI` (required), plus `INTRA_BASE_URL` and
    /// `INTRA_SCOPES` (optional, space-separated). A `.env` file is loaded
    /// best-effort first.
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if a required variable is
    /// missing.
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();

        let require = |key: &str| {
            std::env::var(key)
                .map_err(|_| AuthError::Configuration(format!("missing environment variable {key}")))
        };

        let base_url =
            std::env::var("INTRA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let scopes = std::env::var("INTRA_SCOPES")
            .unwrap_or_else(|_| "public".to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Self {
            base_url,
            client_id: require("INTRA_CLIENT_ID")?,
            client_secret: require("INTRA_CLIENT_SECRET")?,
            redirect_uri: require("INTRA_REDIRECT_URI")?,
            scopes,
        })
    }

    /// Interactive authorization endpoint.
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth/authorize", self.base_url)
    }

    /// Token endpoint, shared by both grant types.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.base_url)
    }

    /// Authenticated profile endpoint.
    #[must_use]
    pub fn profile_endpoint(&self) -> String {
        format!("{}/v2/me", self.base_url)
    }

    /// Scopes as a space-separated string.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Authentication state of the session.
///
/// Transitions are driven exclusively by the lifecycle manager and
/// notifier; no other component writes it. `Degraded` is an internal
/// transient value (for example mid-refresh) and is never handed to
/// subscribers; they observe only the other three variants.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No valid credential; the login entry point applies.
    Unauthenticated,

    /// An interactive login or startup validation is in progress.
    Authenticating,

    /// Valid credential and a fetched user profile.
    Authenticated(Profile),

    /// Internal-only: the session is usable but a renewal is in flight.
    Degraded(String),
}

impl SessionState {
    /// Whether this value may be published to subscribers.
    #[must_use]
    pub fn is_public(&self) -> bool {
        !matches!(self, Self::Degraded(_))
    }
}
