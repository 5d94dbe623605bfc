//! Authenticated user profile
//!
//! The profile endpoint is an external collaborator of the session core: a
//! black-box "fetch profile with this bearer token" call whose
//! 401-equivalent response is the signal that drives the reactive
//! refresh-and-retry path in the lifecycle manager.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::AuthError;
use crate::types::OAuthConfig;

/// Cursus whose level is surfaced on the profile (the main 42 cursus).
const MAIN_CURSUS_ID: i64 = 21;

/// Authenticated user's profile as consumed by the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Login handle.
    pub login: String,

    /// Display name.
    pub display_name: String,

    /// Wallet balance.
    pub wallet: i64,

    /// Level in the main cursus, absent if the user is not enrolled in it.
    pub level: Option<f64>,

    /// Avatar URL.
    pub image_url: Option<String>,
}

/// Fetches the authenticated user's profile given a bearer token.
#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Fetch the profile.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] if the provider answered with a
    /// 401-equivalent status, [`AuthError::NetworkOrProtocol`] otherwise.
    async fn fetch(&self, access_token: &str) -> Result<Profile, AuthError>;
}

/// Wire format of the profile endpoint, reduced to the fields consumed.
#[derive(Debug, Deserialize)]
struct MeResponse {
    login: String,
    displayname: String,
    #[serde(default)]
    wallet: i64,
    image: Option<ImageBlock>,
    #[serde(default)]
    cursus_users: Vec<CursusUser>,
}

#[derive(Debug, Deserialize)]
struct ImageBlock {
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CursusUser {
    cursus_id: i64,
    level: f64,
}

impl From<MeResponse> for Profile {
    fn from(me: MeResponse) -> Self {
        let level = me
            .cursus_users
            .iter()
            .find(|cursus| cursus.cursus_id == MAIN_CURSUS_ID)
            .map(|cursus| cursus.level);

        Self {
            login: me.login,
            display_name: me.displayname,
            wallet: me.wallet,
            level,
            image_url: me.image.and_then(|image| image.link),
        }
    }
}

/// HTTP profile client for the provider's `GET /v2/me` endpoint.
#[derive(Debug, Clone)]
pub struct HttpProfileClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProfileClient {
    /// Create a profile client for the configured provider.
    ///
    /// # Errors
    /// [`AuthError::Configuration`] if the underlying HTTP client cannot
    /// be built.
    pub fn new(config: &OAuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Configuration(format!("http client: {e}")))?;

        Ok(Self { endpoint: config.profile_endpoint(), client })
    }
}

#[async_trait]
impl ProfileClient for HttpProfileClient {
    async fn fetch(&self, access_token: &str) -> Result<Profile, AuthError> {
        debug!(endpoint = %self.endpoint, "Fetching user profile");

        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::NetworkOrProtocol(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Unauthorized);
        }
        if !status.is_success() {
            return Err(AuthError::NetworkOrProtocol(format!(
                "profile endpoint returned status {status}"
            )));
        }

        let me: MeResponse =
            response.json().await.map_err(|e| AuthError::NetworkOrProtocol(e.to_string()))?;

        Ok(me.into())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for profile mapping.
    use super::*;

    #[test]
    fn maps_main_cursus_level() {
        let me = MeResponse {
            login: "jdoe".to_string(),
            displayname: "Jane Doe".to_string(),
            wallet: 120,
            image: Some(ImageBlock { link: Some("https://cdn.example/jdoe.jpg".to_string()) }),
            cursus_users: vec![
                CursusUser { cursus_id: 9, level: 2.5 },
                CursusUser { cursus_id: 21, level: 7.42 },
            ],
        };

        let profile: Profile = me.into();
        assert_eq!(profile.login, "jdoe");
        assert_eq!(profile.display_name, "Jane Doe");
        assert_eq!(profile.wallet, 120);
        assert_eq!(profile.level, Some(7.42));
        assert_eq!(profile.image_url.as_deref(), Some("https://cdn.example/jdoe.jpg"));
    }

    #[test]
    fn level_absent_when_not_enrolled() {
        let me = MeResponse {
            login: "pisciner".to_string(),
            displayname: "Piscine Only".to_string(),
            wallet: 0,
            image: None,
            cursus_users: vec![CursusUser { cursus_id: 9, level: 4.0 }],
        };

        let profile: Profile = me.into();
        assert_eq!(profile.level, None);
        assert_eq!(profile.image_url, None);
    }
}
