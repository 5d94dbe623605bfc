//! OAuth 2.0 session management for the 42 intra API
//!
//! This crate owns the token lifecycle for a confidential-client
//! authorization-code integration: interactive login, secure credential
//! persistence, proactive and 401-triggered refresh, and session state
//! publication to the UI layer.
//!
//! # Features
//!
//! - **Authorization-code flow**: browser consent handed to an injected
//!   [`AuthorizationInteractor`], code exchange over the token endpoint
//! - **Token lifecycle**: expiry tracking with a safety skew, single-flight
//!   refresh de-duplication, bounded 401 retry
//! - **Keychain storage**: credential persisted via the platform secret
//!   store, replaced wholesale on every refresh
//! - **Session state**: one authoritative `{status, user}` value pushed to
//!   subscribers over a watch channel, last-value-wins
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ SessionStateNotifier │  State publication + login/logout orchestration
//! └──────────┬───────────┘
//!            │
//!            ├──► AuthorizationInteractor  (browser consent, injected)
//!            ├──► TokenLifecycleManager    (validity, refresh, retry)
//!            │         │
//!            │         ├──► TokenExchanger    (token endpoint HTTP)
//!            │         ├──► ProfileClient     (profile endpoint HTTP)
//!            │         └──► CredentialStore   (platform keychain)
//!            │
//!            └──► watch::Receiver<SessionState>  (UI subscribers)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use intra_session::{
//!     HttpProfileClient, HttpTokenExchanger, KeyringStore, OAuthConfig,
//!     SessionStateNotifier, TokenLifecycleManager, DEFAULT_SKEW_SECONDS,
//! };
//! # use intra_session::AuthorizationInteractor;
//! # async fn run(interactor: Arc<dyn AuthorizationInteractor>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OAuthConfig::from_env()?;
//!
//! let store = Arc::new(KeyringStore::new("intra-session".into(), "default".into()));
//! let exchanger = Arc::new(HttpTokenExchanger::new(config.clone())?);
//! let profile = Arc::new(HttpProfileClient::new(&config)?);
//!
//! let manager = Arc::new(TokenLifecycleManager::new(
//!     store, exchanger, profile, DEFAULT_SKEW_SECONDS,
//! ));
//! let session = SessionStateNotifier::new(manager, interactor, config);
//!
//! session.initialize().await;
//! session.spawn_auto_refresh();
//!
//! let _states = session.subscribe();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod error;
pub mod interact;
pub mod keychain;
pub mod manager;
pub mod profile;
pub mod session;
pub mod testing;
pub mod traits;
pub mod types;

pub use client::HttpTokenExchanger;
pub use error::AuthError;
pub use interact::{AuthorizationInteractor, AuthorizationRequest, InteractionOutcome};
pub use keychain::KeyringStore;
pub use manager::{TokenLifecycleManager, DEFAULT_SKEW_SECONDS};
pub use profile::{HttpProfileClient, Profile, ProfileClient};
pub use session::SessionStateNotifier;
pub use traits::{CredentialStore, TokenExchanger};
pub use types::{Credential, OAuthConfig, ProviderError, SessionState, TokenResponse};
