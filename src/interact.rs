//! Interactive authorization step
//!
//! The browser-based consent step is an external collaborator: the session
//! core hands it a prepared authorization request and receives back an
//! authorization code, a cancellation, or a failure. Everything between,
//! from opening the browser to the provider's redirect, is opaque to this
//! crate.

use async_trait::async_trait;

use crate::types::OAuthConfig;

/// A prepared `authorization_code` grant request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Full authorization URL to open in the user's browser.
    pub authorize_url: String,

    /// Redirect URI the provider will send the user back to.
    pub redirect_uri: String,
}

impl AuthorizationRequest {
    /// Build the authorization URL for the configured provider.
    #[must_use]
    pub fn from_config(config: &OAuthConfig) -> Self {
        let params = [
            ("response_type", "code".to_string()),
            ("client_id", config.client_id.clone()),
            ("redirect_uri", config.redirect_uri.clone()),
            ("scope", config.scope_string()),
        ];

        let query = params
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        Self {
            authorize_url: format!("{}?{query}", config.authorize_endpoint()),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

/// Result of the interactive consent step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// The user authorized the application; the provider issued a code.
    Authorized { code: String },

    /// The user dismissed the consent page.
    Cancelled,

    /// The interaction failed (browser error, malformed redirect, ...).
    Failed(String),
}

/// Drives the interactive consent step and yields its outcome.
#[async_trait]
pub trait AuthorizationInteractor: Send + Sync {
    /// Run the consent interaction to completion.
    async fn authorize(&self, request: AuthorizationRequest) -> InteractionOutcome;
}
