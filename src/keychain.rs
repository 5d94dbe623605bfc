//! Credential persistence in the platform keychain
//!
//! Stores the credential as three independent secret-store entries
//! (access token, refresh token, expiry instant as integer epoch
//! milliseconds), each individually absent-or-present. Absence of the
//! expiry entry reads back as "unknown", which the credential type treats
//! as expired.
//!
//! Backed by the `keyring` crate (macOS Keychain, Windows Credential
//! Manager, Linux Secret Service). Multi-entry writes are serialized under
//! a process-local mutex so a concurrent `get` never observes a torn
//! credential.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use keyring::Entry;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::AuthError;
use crate::traits::CredentialStore;
use crate::types::Credential;

const ACCESS_PREFIX: &str = "access.";
const REFRESH_PREFIX: &str = "refresh.";
const EXPIRY_PREFIX: &str = "expiry.";

/// Keychain-backed credential store.
pub struct KeyringStore {
    service: String,
    account: String,
    write_lock: Mutex<()>,
}

impl KeyringStore {
    /// Create a store under the given keychain service and account names.
    #[must_use]
    pub fn new(service: String, account: String) -> Self {
        Self { service, account, write_lock: Mutex::new(()) }
    }

    fn entry(&self, prefix: &str) -> Result<Entry, AuthError> {
        Entry::new(&self.service, &format!("{prefix}{}", self.account))
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Read one entry, mapping "no such entry" to `None`.
    fn read(&self, prefix: &str) -> Result<Option<String>, AuthError> {
        match self.entry(prefix)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(other) => Err(AuthError::Storage(other.to_string())),
        }
    }

    fn write(&self, prefix: &str, value: &str) -> Result<(), AuthError> {
        self.entry(prefix)?.set_password(value).map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Delete one entry, treating "no such entry" as success.
    fn delete(&self, prefix: &str) -> Result<(), AuthError> {
        match self.entry(prefix)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(other) => Err(AuthError::Storage(other.to_string())),
        }
    }
}

#[async_trait]
impl CredentialStore for KeyringStore {
    async fn get(&self) -> Result<Option<Credential>, AuthError> {
        let _guard = self.write_lock.lock();

        let Some(access_token) = self.read(ACCESS_PREFIX)? else {
            return Ok(None);
        };

        let refresh_token = self.read(REFRESH_PREFIX)?;
        let expires_at = self
            .read(EXPIRY_PREFIX)?
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single());

        Ok(Some(Credential { access_token, refresh_token, expires_at }))
    }

    async fn put(&self, credential: &Credential) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock();
        debug!(account = %self.account, "Storing credential");

        self.write(ACCESS_PREFIX, &credential.access_token)?;

        match &credential.refresh_token {
            Some(refresh) => self.write(REFRESH_PREFIX, refresh)?,
            None => self.delete(REFRESH_PREFIX)?,
        }

        match credential.expires_at {
            Some(expires_at) => {
                self.write(EXPIRY_PREFIX, &expires_at.timestamp_millis().to_string())?;
            }
            None => self.delete(EXPIRY_PREFIX)?,
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock();
        debug!(account = %self.account, "Clearing credential");

        self.delete(ACCESS_PREFIX)?;
        self.delete(REFRESH_PREFIX)?;
        self.delete(EXPIRY_PREFIX)?;
        Ok(())
    }
}
