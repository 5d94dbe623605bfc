//! Token lifecycle manager
//!
//! Owns the credential's validity logic:
//! - startup validation of a persisted credential
//! - proactive refresh ahead of expiry (fixed skew, default 60 s)
//! - single-flight de-duplication of concurrent refresh attempts
//! - reactive 401-triggered refresh-and-retry, bounded to one retry
//!
//! The manager holds no private credential copy beyond an in-flight
//! operation's working value; the store owns the durable state.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::AuthError;
use crate::profile::{Profile, ProfileClient};
use crate::traits::{CredentialStore, TokenExchanger};
use crate::types::{Credential, SessionState};

/// Safety margin subtracted from the expiry instant, preventing use of a
/// token that would expire mid-request.
pub const DEFAULT_SKEW_SECONDS: i64 = 60;

/// Poll interval for the background task while unauthenticated or without
/// a known expiry.
const IDLE_POLL: Duration = Duration::from_secs(60);

/// Outcome of the most recent refresh flight, shared with callers that
/// collapsed onto it. `epoch` counts completed flights; its mirror below
/// is readable without taking the lock.
struct RefreshFlight {
    epoch: u64,
    last_outcome: Option<Result<String, AuthError>>,
}

/// Core of the session subsystem.
///
/// Safe to call from multiple concurrent request paths: all credential
/// mutation happens under one exclusive critical section (the refresh
/// gate plus the store's own atomic replace), which is what makes the
/// single-flight guarantee hold.
pub struct TokenLifecycleManager {
    store: Arc<dyn CredentialStore>,
    exchanger: Arc<dyn TokenExchanger>,
    profile: Arc<dyn ProfileClient>,
    skew_seconds: i64,
    refresh_gate: tokio::sync::Mutex<RefreshFlight>,
    refresh_epoch: AtomicU64,
}

impl TokenLifecycleManager {
    /// Create a new lifecycle manager.
    ///
    /// # Arguments
    /// * `store` - durable credential storage
    /// * `exchanger` - token endpoint client
    /// * `profile` - profile endpoint client
    /// * `skew_seconds` - refresh this many seconds before expiry
    ///   (default: [`DEFAULT_SKEW_SECONDS`])
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        exchanger: Arc<dyn TokenExchanger>,
        profile: Arc<dyn ProfileClient>,
        skew_seconds: i64,
    ) -> Self {
        Self {
            store,
            exchanger,
            profile,
            skew_seconds,
            refresh_gate: tokio::sync::Mutex::new(RefreshFlight { epoch: 0, last_outcome: None }),
            refresh_epoch: AtomicU64::new(0),
        }
    }

    /// Validate any persisted credential on startup.
    ///
    /// With no stored credential the session is simply unauthenticated.
    /// With one, the credential is validated (refreshing if needed) and the
    /// profile fetched; any failure clears the stored credential so the
    /// session never starts in a stale, ambiguous state.
    pub async fn initialize(&self) -> SessionState {
        match self.store.get().await {
            Ok(None) => {
                debug!("No persisted credential found");
                SessionState::Unauthenticated
            }
            Ok(Some(_)) => match self.ensure_valid().await {
                Ok(_) => match self.fetch_profile().await {
                    Ok(user) => {
                        info!(login = %user.login, "Session restored from persisted credential");
                        SessionState::Authenticated(user)
                    }
                    Err(e) => {
                        warn!(error = %e, "Profile fetch failed during startup validation");
                        self.invalidate().await;
                        SessionState::Unauthenticated
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Persisted credential failed validation");
                    self.invalidate().await;
                    SessionState::Unauthenticated
                }
            },
            Err(e) => {
                error!(error = %e, "Credential store unreadable during startup");
                SessionState::Unauthenticated
            }
        }
    }

    /// Get an access token that is valid beyond the skew margin.
    ///
    /// Returns the stored token unchanged when it has life left; otherwise
    /// triggers a refresh through the single-flight path. An absent expiry
    /// instant counts as expired.
    ///
    /// # Errors
    /// [`AuthError::NotAuthenticated`] with no stored credential, or
    /// whatever the refresh path reports.
    pub async fn ensure_valid(&self) -> Result<String, AuthError> {
        match self.store.get().await? {
            None => Err(AuthError::NotAuthenticated),
            Some(credential) if credential.is_expired(self.skew_seconds) => self.refresh().await,
            Some(credential) => Ok(credential.access_token),
        }
    }

    /// Renew the token pair, collapsing concurrent callers onto one flight.
    ///
    /// Callers that arrive while a refresh is in flight await that same
    /// flight and share its outcome rather than starting a second network
    /// round trip. An expired token observed by every in-flight request
    /// simultaneously must not burn the one-time-use refresh token N times.
    ///
    /// # Errors
    /// [`AuthError::NoRefreshToken`] if none is stored (terminal, clears
    /// the credential), [`AuthError::RefreshRejected`] if the provider
    /// revoked the grant (terminal, clears the credential), or
    /// [`AuthError::NetworkOrProtocol`] for transport failures (credential
    /// left in place for a later attempt).
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let observed = self.refresh_epoch.load(Ordering::Acquire);
        let mut flight = self.refresh_gate.lock().await;

        if flight.epoch != observed {
            // A flight completed while this caller waited for the gate;
            // consume its outcome instead of issuing another round trip.
            if let Some(outcome) = flight.last_outcome.clone() {
                debug!("Collapsed onto completed refresh flight");
                return outcome;
            }
        }

        let outcome = self.refresh_locked().await;
        flight.epoch += 1;
        flight.last_outcome = Some(outcome.clone());
        self.refresh_epoch.store(flight.epoch, Ordering::Release);
        outcome
    }

    /// The refresh critical section. Caller holds the gate.
    async fn refresh_locked(&self) -> Result<String, AuthError> {
        let Some(credential) = self.store.get().await? else {
            return Err(AuthError::NotAuthenticated);
        };
        let Some(refresh_token) = credential.refresh_token else {
            // Strict policy: without a refresh token the session cannot be
            // renewed, so the remaining credential state is cleared rather
            // than left inconsistent with the session state.
            warn!("No refresh token stored; clearing credential");
            self.invalidate().await;
            return Err(AuthError::NoRefreshToken);
        };

        match self.exchanger.exchange_refresh_token(&refresh_token).await {
            Ok(response) => {
                let renewed = Credential::from_response(response, Some(refresh_token));
                let access_token = renewed.access_token.clone();
                self.store.put(&renewed).await?;
                info!("Access token refreshed");
                Ok(access_token)
            }
            Err(err @ AuthError::RefreshRejected(_)) => {
                warn!(error = %err, "Refresh token rejected; clearing credential");
                self.invalidate().await;
                Err(err)
            }
            // Transport failures leave the credential in place; the next
            // ensure_valid call retries.
            Err(other) => Err(other),
        }
    }

    /// Exchange an authorization code and persist the resulting credential.
    ///
    /// # Errors
    /// [`AuthError::ExchangeFailed`] if the provider rejected the code,
    /// [`AuthError::NetworkOrProtocol`] for transport failures,
    /// [`AuthError::Storage`] if persisting the credential fails.
    pub async fn complete_authorization(&self, code: &str) -> Result<String, AuthError> {
        let response = self.exchanger.exchange_code(code).await?;
        let credential = Credential::from_response(response, None);
        let access_token = credential.access_token.clone();
        self.store.put(&credential).await?;
        info!("Authorization code exchanged; credential stored");
        Ok(access_token)
    }

    /// Clear the stored credential unconditionally. Idempotent.
    ///
    /// Never blocks on an in-flight refresh: a refresh result that lands
    /// afterwards is applied to the store but its publication is
    /// suppressed by the notifier's generation check.
    pub async fn invalidate(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear credential store");
        }
    }

    /// Whether a credential is currently stored.
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.store.get().await, Ok(Some(_)))
    }

    /// Seconds until the stored credential expires, if known.
    pub async fn seconds_until_expiry(&self) -> Option<i64> {
        match self.store.get().await {
            Ok(Some(credential)) => credential.seconds_until_expiry(),
            _ => None,
        }
    }

    /// Get the configured skew in seconds.
    #[must_use]
    pub fn skew_seconds(&self) -> i64 {
        self.skew_seconds
    }

    /// Run an operation with a valid token, retrying once after a 401.
    ///
    /// Calls [`Self::ensure_valid`] and invokes the operation. If the
    /// operation reports [`AuthError::Unauthorized`], performs exactly one
    /// refresh and retries once with the new token. A second authorization
    /// failure is terminal and surfaces as [`AuthError::Unauthorized`];
    /// this path never loops.
    ///
    /// # Errors
    /// Whatever `ensure_valid`/`refresh` report, or the operation's own
    /// error.
    pub async fn call_with_token<T, F, Fut>(&self, operation: F) -> Result<T, AuthError>
    where
        F: Fn(String) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, AuthError>> + Send,
    {
        let token = self.ensure_valid().await?;
        match operation(token).await {
            Err(AuthError::Unauthorized) => {
                debug!("Wrapped call reported 401; refreshing once and retrying");
                let token = self.refresh().await?;
                operation(token).await
            }
            other => other,
        }
    }

    /// Fetch the authenticated user's profile through the reactive-refresh
    /// wrapper.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] once the bounded retry is exhausted, or
    /// any error from the token paths.
    pub async fn fetch_profile(&self) -> Result<Profile, AuthError> {
        let profile = Arc::clone(&self.profile);
        self.call_with_token(move |token| {
            let profile = Arc::clone(&profile);
            async move { profile.fetch(&token).await }
        })
        .await
    }

    /// Background proactive refresh loop.
    ///
    /// Sleeps until the skew margin is reached, refreshes, and keeps
    /// going. Transient failures are swallowed and retried on the next
    /// wakeup rather than interrupting the user; terminal failures leave
    /// the store cleared and the loop idle-polling until a new login
    /// re-arms it.
    ///
    /// # Example
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use intra_session::TokenLifecycleManager;
    /// # fn example(manager: Arc<TokenLifecycleManager>) {
    /// tokio::spawn(async move {
    ///     manager.run_auto_refresh().await;
    /// });
    /// # }
    /// ```
    pub async fn run_auto_refresh(self: Arc<Self>) {
        info!("Starting proactive refresh task");

        loop {
            let wake = match self.store.get().await {
                Ok(Some(credential)) => match credential.seconds_until_expiry() {
                    Some(_) if credential.is_expired(self.skew_seconds) => Duration::ZERO,
                    Some(secs) => {
                        // Whole-second truncation can report the skew margin
                        // as reached while the token is not yet inside it;
                        // clamp so the loop always yields before re-reading
                        // the store.
                        Duration::from_secs((secs - self.skew_seconds).max(1).unsigned_abs())
                    }
                    // Unknown expiry: pace the loop instead of spinning.
                    None => IDLE_POLL,
                },
                _ => IDLE_POLL,
            };

            if !wake.is_zero() {
                debug!(seconds = wake.as_secs(), "Proactive refresh sleeping");
                tokio::time::sleep(wake).await;
            }

            // Re-check after sleeping; the user may have logged out.
            let needs_refresh = match self.store.get().await {
                Ok(Some(credential)) => credential.is_expired(self.skew_seconds),
                _ => false,
            };

            if needs_refresh {
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "Proactive refresh failed");
                    tokio::time::sleep(IDLE_POLL).await;
                }
            }
        }
    }
}
