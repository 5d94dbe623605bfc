//! Traits for credential storage and token exchange
//!
//! These traits enable dependency injection and testing by abstracting the
//! two external dependencies of the token lifecycle: the durable secret
//! store and the provider's token endpoint.

use async_trait::async_trait;

use crate::error::AuthError;
use crate::types::{Credential, TokenResponse};

/// Durable storage for the credential pair.
///
/// Pure storage, no policy: validity and renewal decisions live in the
/// lifecycle manager. Implementations must guarantee that a concurrent
/// `get` never observes a partially written credential; `put` replaces
/// the stored value wholesale or not at all.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve the stored credential, or `None` if nothing is stored.
    ///
    /// # Errors
    /// Returns [`AuthError::Storage`] if the backing store is unreadable.
    async fn get(&self) -> Result<Option<Credential>, AuthError>;

    /// Atomically replace the stored credential.
    ///
    /// # Errors
    /// Returns [`AuthError::Storage`] if the write fails.
    async fn put(&self, credential: &Credential) -> Result<(), AuthError>;

    /// Remove any stored credential. Idempotent.
    ///
    /// # Errors
    /// Returns [`AuthError::Storage`] if the deletion fails.
    async fn clear(&self) -> Result<(), AuthError>;
}

/// The two network calls the provider's token endpoint defines.
///
/// Both operations are pure request/response with no local state, and both
/// must distinguish a transport-level failure
/// ([`AuthError::NetworkOrProtocol`], retryable by the caller's general
/// policy) from a provider-rejected grant ([`AuthError::ExchangeFailed`] /
/// [`AuthError::RefreshRejected`], which is terminal and never retried
/// with the same value).
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange an authorization code for a token pair.
    ///
    /// # Errors
    /// [`AuthError::ExchangeFailed`] if the provider rejected the code,
    /// [`AuthError::NetworkOrProtocol`] for transport failures.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError>;

    /// Renew the token pair using a refresh token.
    ///
    /// # Errors
    /// [`AuthError::RefreshRejected`] if the provider rejected the grant,
    /// [`AuthError::NetworkOrProtocol`] for transport failures.
    async fn exchange_refresh_token(&self, refresh_token: &str)
        -> Result<TokenResponse, AuthError>;
}
