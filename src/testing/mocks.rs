//! Mock implementations of the session traits
//!
//! Deterministic stand-ins for the keychain, the token endpoint, the
//! profile endpoint, and the browser consent step. Responses are
//! configurable per call site; call counters make de-duplication and
//! bounded-retry behavior assertable.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Duration;

use crate::error::AuthError;
use crate::interact::{AuthorizationInteractor, AuthorizationRequest, InteractionOutcome};
use crate::profile::{Profile, ProfileClient};
use crate::traits::{CredentialStore, TokenExchanger};
use crate::types::{Credential, TokenResponse};

/// In-memory credential store.
///
/// Replace-wholesale semantics matching the keychain-backed store, without
/// touching any platform secret service.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a credential directly, bypassing the trait.
    pub async fn seed(&self, credential: Credential) {
        *self.credential.lock() = Some(credential);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<Credential>, AuthError> {
        Ok(self.credential.lock().clone())
    }

    async fn put(&self, credential: &Credential) -> Result<(), AuthError> {
        *self.credential.lock() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        *self.credential.lock() = None;
        Ok(())
    }
}

/// Mock token endpoint.
///
/// Each grant type has one configurable response, returned on every call.
/// An optional per-call delay on the refresh grant lets tests hold a
/// refresh flight open while concurrent callers pile up behind it.
pub struct MockTokenExchanger {
    exchange_response: Mutex<Option<Result<TokenResponse, AuthError>>>,
    refresh_response: Mutex<Option<Result<TokenResponse, AuthError>>>,
    refresh_delay: Mutex<Option<Duration>>,
    exchange_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
}

impl Default for MockTokenExchanger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTokenExchanger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            exchange_response: Mutex::new(None),
            refresh_response: Mutex::new(None),
            refresh_delay: Mutex::new(None),
            exchange_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            last_refresh_token: Mutex::new(None),
        }
    }

    pub fn set_exchange_response(&self, response: Result<TokenResponse, AuthError>) {
        *self.exchange_response.lock() = Some(response);
    }

    pub fn set_refresh_response(&self, response: Result<TokenResponse, AuthError>) {
        *self.refresh_response.lock() = Some(response);
    }

    /// Delay every refresh call, keeping the flight observable mid-air.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = Some(delay);
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// The refresh token presented on the most recent refresh call.
    #[must_use]
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().clone()
    }
}

#[async_trait]
impl TokenExchanger for MockTokenExchanger {
    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, AuthError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_response
            .lock()
            .clone()
            .unwrap_or_else(|| Err(AuthError::NetworkOrProtocol("no mock response".to_string())))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock() = Some(refresh_token.to_string());

        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.refresh_response
            .lock()
            .clone()
            .unwrap_or_else(|| Err(AuthError::NetworkOrProtocol("no mock response".to_string())))
    }
}

/// Mock profile endpoint.
///
/// Queued responses are consumed in order; once the queue is empty, the
/// default profile is returned. The token presented on each call is
/// recorded so tests can assert that a retry used the refreshed token.
pub struct MockProfileClient {
    responses: Mutex<VecDeque<Result<Profile, AuthError>>>,
    fetch_calls: AtomicUsize,
    last_token: Mutex<Option<String>>,
}

impl Default for MockProfileClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProfileClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fetch_calls: AtomicUsize::new(0),
            last_token: Mutex::new(None),
        }
    }

    /// The profile returned when no queued response remains.
    #[must_use]
    pub fn default_profile() -> Profile {
        Profile {
            login: "jdoe".to_string(),
            display_name: "Jane Doe".to_string(),
            wallet: 100,
            level: Some(7.42),
            image_url: Some("https://cdn.example/jdoe.jpg".to_string()),
        }
    }

    /// Queue one response; consumed before the default profile.
    pub fn push_response(&self, response: Result<Profile, AuthError>) {
        self.responses.lock().push_back(response);
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// The bearer token presented on the most recent fetch.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().clone()
    }
}

#[async_trait]
impl ProfileClient for MockProfileClient {
    async fn fetch(&self, access_token: &str) -> Result<Profile, AuthError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_token.lock() = Some(access_token.to_string());

        self.responses.lock().pop_front().unwrap_or_else(|| Ok(Self::default_profile()))
    }
}

/// Mock consent interaction.
///
/// Returns a configured outcome, optionally after a delay so tests can
/// interleave a logout with an in-flight login.
pub struct MockInteractor {
    outcome: Mutex<InteractionOutcome>,
    delay: Mutex<Option<Duration>>,
    authorize_calls: AtomicUsize,
    last_request: Mutex<Option<AuthorizationRequest>>,
}

impl MockInteractor {
    #[must_use]
    pub fn new(outcome: InteractionOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            delay: Mutex::new(None),
            authorize_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn set_outcome(&self, outcome: InteractionOutcome) {
        *self.outcome.lock() = outcome;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    #[must_use]
    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    /// The authorization request presented on the most recent call.
    #[must_use]
    pub fn last_request(&self) -> Option<AuthorizationRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl AuthorizationInteractor for MockInteractor {
    async fn authorize(&self, request: AuthorizationRequest) -> InteractionOutcome {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.outcome.lock().clone()
    }
}
