//! Session state notifier
//!
//! Owns the single authoritative [`SessionState`] and pushes it to
//! subscribers over a watch channel. All state transitions are driven from
//! here; no other component publishes.
//!
//! Publication is last-value-wins: every attempt (login, logout, startup
//! validation, profile reload) takes a fresh generation number, and a
//! publish is admitted only while its generation is still the newest. A
//! slow login whose exchange resolves after a logout therefore cannot
//! overwrite the logged-out state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::interact::{AuthorizationInteractor, AuthorizationRequest, InteractionOutcome};
use crate::manager::TokenLifecycleManager;
use crate::profile::Profile;
use crate::types::{OAuthConfig, SessionState};

/// Publishes session state transitions to the UI layer.
///
/// Constructed once at process start and handed to consumers by reference;
/// consumers read state through [`Self::subscribe`] and drive transitions
/// through [`Self::login`] and [`Self::logout`].
pub struct SessionStateNotifier {
    manager: Arc<TokenLifecycleManager>,
    interactor: Arc<dyn AuthorizationInteractor>,
    config: OAuthConfig,
    generation: AtomicU64,
    /// Serializes the generation check with the channel send so a publish
    /// admitted under generation G cannot interleave with G's supersession.
    publish_lock: Mutex<()>,
    tx: watch::Sender<SessionState>,
    rx: watch::Receiver<SessionState>,
}

impl SessionStateNotifier {
    /// Create a notifier in the `Unauthenticated` state.
    #[must_use]
    pub fn new(
        manager: Arc<TokenLifecycleManager>,
        interactor: Arc<dyn AuthorizationInteractor>,
        config: OAuthConfig,
    ) -> Self {
        let (tx, rx) = watch::channel(SessionState::Unauthenticated);
        Self {
            manager,
            interactor,
            config,
            generation: AtomicU64::new(0),
            publish_lock: Mutex::new(()),
            tx,
            rx,
        }
    }

    /// Subscribe to session state changes.
    ///
    /// The receiver immediately holds the current state and observes every
    /// subsequently published value (subscribers only ever see
    /// `Unauthenticated | Authenticating | Authenticated`).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.rx.clone()
    }

    /// Get the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Access the underlying lifecycle manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<TokenLifecycleManager> {
        &self.manager
    }

    /// Start a new attempt without publishing anything.
    fn next_attempt(&self) -> u64 {
        let _guard = self.publish_lock.lock();
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Start a new attempt and publish `Authenticating` under it.
    fn begin_attempt(&self) -> u64 {
        let _guard = self.publish_lock.lock();
        let attempt = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let _ = self.tx.send(SessionState::Authenticating);
        attempt
    }

    /// Publish `state` if `attempt` is still the newest generation.
    ///
    /// Internal-only values (`Degraded`) are never handed to subscribers.
    fn publish(&self, attempt: u64, state: SessionState) -> bool {
        let _guard = self.publish_lock.lock();
        if self.generation.load(Ordering::Acquire) != attempt {
            debug!(attempt, "Discarding superseded state publication");
            return false;
        }
        if !state.is_public() {
            debug!(?state, "Suppressing internal state value");
            return false;
        }
        let _ = self.tx.send(state);
        true
    }

    /// Validate any persisted credential and publish the resulting state.
    ///
    /// Publishes `Authenticating` while validation runs, then either
    /// `Authenticated(user)` or `Unauthenticated`.
    pub async fn initialize(&self) -> SessionState {
        let attempt = self.begin_attempt();
        let state = self.manager.initialize().await;
        self.publish(attempt, state.clone());
        state
    }

    /// Run the interactive login flow.
    ///
    /// Publishes `Authenticating`, drives the consent interaction, exchanges
    /// the authorization code, fetches the profile, and publishes
    /// `Authenticated(user)`. Cancellation and failure both land the session
    /// back in `Unauthenticated`.
    ///
    /// # Errors
    /// [`AuthError::ExchangeFailed`] if the provider rejected the code,
    /// [`AuthError::NetworkOrProtocol`] for transport or interaction
    /// failures. Cancellation is not an error.
    pub async fn login(&self) -> Result<SessionState, AuthError> {
        let attempt = self.begin_attempt();
        let request = AuthorizationRequest::from_config(&self.config);

        match self.interactor.authorize(request).await {
            InteractionOutcome::Authorized { code } => {
                match self.authenticate_with_code(&code).await {
                    Ok(user) => {
                        info!(login = %user.login, "Login complete");
                        let state = SessionState::Authenticated(user);
                        self.publish(attempt, state.clone());
                        Ok(state)
                    }
                    Err(e) => {
                        warn!(error = %e, "Login failed after authorization");
                        self.publish(attempt, SessionState::Unauthenticated);
                        Err(e)
                    }
                }
            }
            InteractionOutcome::Cancelled => {
                info!("Authorization cancelled by user");
                self.publish(attempt, SessionState::Unauthenticated);
                Ok(SessionState::Unauthenticated)
            }
            InteractionOutcome::Failed(reason) => {
                warn!(%reason, "Authorization interaction failed");
                self.publish(attempt, SessionState::Unauthenticated);
                Err(AuthError::NetworkOrProtocol(format!(
                    "authorization interaction failed: {reason}"
                )))
            }
        }
    }

    async fn authenticate_with_code(&self, code: &str) -> Result<Profile, AuthError> {
        self.manager.complete_authorization(code).await?;
        self.manager.fetch_profile().await
    }

    /// Log out.
    ///
    /// Publishes `Unauthenticated` immediately, superseding any in-flight
    /// login or refresh attempt, then clears the stored credential. A late
    /// result from a superseded attempt may still land in the store but its
    /// publication is discarded by the generation check.
    pub async fn logout(&self) {
        {
            let _guard = self.publish_lock.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            let _ = self.tx.send(SessionState::Unauthenticated);
        }
        info!("Logged out");
        self.manager.invalidate().await;
    }

    /// Re-fetch the profile and publish the updated `Authenticated` state.
    ///
    /// Transient failures leave the current state untouched; terminal
    /// failures (including an exhausted 401 retry) clear the credential and
    /// publish `Unauthenticated`.
    ///
    /// # Errors
    /// Whatever the profile fetch path reports.
    pub async fn reload_profile(&self) -> Result<Profile, AuthError> {
        let attempt = self.next_attempt();
        // Internal transient value; the publish filter keeps it away from
        // subscribers, who hold the previous Authenticated state meanwhile.
        self.publish(attempt, SessionState::Degraded("reloading profile".to_string()));

        match self.manager.fetch_profile().await {
            Ok(user) => {
                self.publish(attempt, SessionState::Authenticated(user.clone()));
                Ok(user)
            }
            Err(e) if e.is_terminal() => {
                warn!(error = %e, "Profile reload failed terminally");
                self.manager.invalidate().await;
                self.publish(attempt, SessionState::Unauthenticated);
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Profile reload failed transiently");
                Err(e)
            }
        }
    }

    /// Spawn the manager's proactive refresh loop on the current runtime.
    pub fn spawn_auto_refresh(&self) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(&self.manager);
        tokio::spawn(manager.run_auto_refresh())
    }
}
