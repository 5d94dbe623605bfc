//! Token endpoint client
//!
//! Performs the two network calls the provider defines: authorization-code
//! exchange and refresh-token renewal. Both are form-encoded `POST`s to the
//! same endpoint, differing only in `grant_type`.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::traits::TokenExchanger;
use crate::types::{OAuthConfig, ProviderError, TokenResponse};

/// Which terminal error a rejected grant maps to.
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

/// HTTP client for the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct HttpTokenExchanger {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl HttpTokenExchanger {
    /// Create an exchanger for the configured provider.
    ///
    /// # Errors
    /// [`AuthError::Configuration`] if the underlying HTTP client cannot
    /// be built.
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Configuration(format!("http client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Get a reference to the OAuth configuration.
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Execute one token grant and map the response.
    ///
    /// A 400 or 401 answer is a provider-rejected grant (RFC 6749 §5.2),
    /// terminal for the value that was presented. Every other non-success
    /// status is transport-level and left to the caller's general retry
    /// policy; a rate limit or server error must never invalidate the
    /// stored credential.
    async fn execute_grant(
        &self,
        grant: Grant,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(self.config.token_endpoint())
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::NetworkOrProtocol(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ProviderError>(&body)
                .map_or_else(|_| format!("status {status}"), |err| err.to_string());

            warn!(%status, %detail, "Token grant rejected by provider");
            return Err(match grant {
                Grant::AuthorizationCode => AuthError::ExchangeFailed(detail),
                Grant::RefreshToken => AuthError::RefreshRejected(detail),
            });
        }
        if !status.is_success() {
            return Err(AuthError::NetworkOrProtocol(format!(
                "token endpoint returned status {status}"
            )));
        }

        response.json().await.map_err(|e| AuthError::NetworkOrProtocol(e.to_string()))
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        debug!("Exchanging authorization code for tokens");

        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        self.execute_grant(Grant::AuthorizationCode, &form).await
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        debug!("Renewing token pair with refresh token");

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        self.execute_grant(Grant::RefreshToken, &form).await
    }
}
