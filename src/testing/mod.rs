//! Testing utilities
//!
//! In-memory and mock implementations of the session traits, used by this
//! crate's own tests and available to downstream consumers that want to
//! exercise session-dependent code without a provider or a keychain.

pub mod mocks;

pub use mocks::{MemoryCredentialStore, MockInteractor, MockProfileClient, MockTokenExchanger};
