//! API token storage backed by the OS keyring.
//!
//! Tokens are keyed `context/<name>/token` under the `jk` service so a
//! context can be removed without disturbing its neighbours. Backends are
//! whatever the platform provides: Keychain on macOS, Credential Manager
//! on Windows, Secret Service on Linux.

use keyring::Entry;
use thiserror::Error;

const SERVICE_NAME: &str = "jk";

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("no stored token for {0:?}")]
    NotFound(String),

    #[error(
        "no usable keyring backend: {0} \
         (on Linux, install a Secret Service provider such as gnome-keyring or KWallet)"
    )]
    NoBackend(#[source] keyring::Error),

    #[error("keyring: {0}")]
    Backend(#[source] keyring::Error),
}

pub type SecretResult<T> = Result<T, SecretError>;

/// Keyring identifier for a context's API token.
pub fn token_key(context_name: &str) -> String {
    format!("context/{context_name}/token")
}

/// OS keyring wrapper scoped to the jk service name.
pub struct SecretStore;

impl SecretStore {
    pub fn open() -> SecretResult<Self> {
        Ok(Self)
    }

    fn entry(&self, key: &str) -> SecretResult<Entry> {
        Entry::new(SERVICE_NAME, key).map_err(classify)
    }

    pub fn set(&self, key: &str, value: &str) -> SecretResult<()> {
        self.entry(key)?.set_password(value).map_err(classify)
    }

    pub fn get(&self, key: &str) -> SecretResult<String> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(value),
            Err(keyring::Error::NoEntry) => Err(SecretError::NotFound(key.to_string())),
            Err(e) => Err(classify(e)),
        }
    }

    /// Removes a secret. Deleting an absent entry is not an error.
    pub fn delete(&self, key: &str) -> SecretResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }
}

fn classify(err: keyring::Error) -> SecretError {
    match err {
        keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_) => {
            SecretError::NoBackend(err)
        }
        other => SecretError::Backend(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_key_shape() {
        assert_eq!(token_key("prod"), "context/prod/token");
        assert_eq!(token_key("staging-eu"), "context/staging-eu/token");
    }
}
