//! Error taxonomy for the session manager
//!
//! Every fallible operation in this crate reports an [`AuthError`]. The
//! variants split along one line that matters to callers: transient
//! transport trouble (retry later, credential untouched) versus a terminal
//! rejection by the provider (credential cleared, interactive login
//! required).

use thiserror::Error;

/// Error type shared by the token lifecycle, exchange client, and stores.
///
/// `Clone` is required so a single in-flight refresh can hand its outcome
/// to every caller that collapsed onto it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Transport-level failure or malformed response. The credential is left
    /// untouched; the caller's general retry policy applies.
    #[error("network or protocol error: {0}")]
    NetworkOrProtocol(String),

    /// The provider rejected the authorization code. Terminal for the code;
    /// the session returns to unauthenticated.
    #[error("authorization code exchange rejected: {0}")]
    ExchangeFailed(String),

    /// The provider rejected or revoked the refresh token. Terminal; all
    /// stored credential state is cleared.
    #[error("refresh token rejected: {0}")]
    RefreshRejected(String),

    /// No refresh token was ever issued, or it was previously cleared.
    /// Treated as terminal, same as a rejection.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The bounded retry after a 401 was exhausted. Surfaced to the calling
    /// feature as "not authenticated"; never retried further.
    #[error("unauthorized after refresh retry")]
    Unauthorized,

    /// No credential is stored at all.
    #[error("not authenticated (no credential)")]
    NotAuthenticated,

    /// Credential store access failed.
    #[error("credential store error: {0}")]
    Storage(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Whether this error clears stored credential state when it surfaces
    /// from the refresh path.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ExchangeFailed(_)
                | Self::RefreshRejected(_)
                | Self::NoRefreshToken
                | Self::Unauthorized
                | Self::NotAuthenticated
        )
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the error taxonomy.
    use super::*;

    #[test]
    fn terminal_classification() {
        assert!(AuthError::RefreshRejected("revoked".into()).is_terminal());
        assert!(AuthError::NoRefreshToken.is_terminal());
        assert!(AuthError::Unauthorized.is_terminal());
        assert!(!AuthError::NetworkOrProtocol("timeout".into()).is_terminal());
        assert!(!AuthError::Storage("locked".into()).is_terminal());
    }

    #[test]
    fn display_includes_detail() {
        let err = AuthError::RefreshRejected("invalid_grant".into());
        assert!(err.to_string().contains("invalid_grant"));
    }
}
