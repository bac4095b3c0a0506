//! Credential stores.
//!
//! Two directions need keys: [`CredentialProvider`] resolves the secrets of *clients*
//! so their signatures can be verified, and [`BackendCredentialProvider`] supplies the
//! gateway's own credentials for requests it forwards to the backend.

use std::collections::HashMap;
use std::fmt;

use crate::error::AuthError;

/// Looks up client secret access keys by access key ID.
pub trait CredentialProvider: Send + Sync {
    /// The secret access key for `access_key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccessKeyNotFound`] if the key is not recognized.
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError>;
}

/// An in-memory client credential store.
///
/// # Examples
///
/// ```
/// use s3gate_auth::credentials::{CredentialProvider, StaticCredentialProvider};
///
/// let provider = StaticCredentialProvider::new(vec![("AKID".to_owned(), "secret".to_owned())]);
/// assert_eq!(provider.get_secret_key("AKID").unwrap(), "secret");
/// assert!(provider.get_secret_key("OTHER").is_err());
/// ```
#[derive(Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, String>,
}

impl StaticCredentialProvider {
    /// Create a store from `(access_key_id, secret_access_key)` pairs.
    pub fn new(credentials: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            credentials: credentials.into_iter().collect(),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.credentials.keys().collect();
        keys.sort_unstable();
        f.debug_struct("StaticCredentialProvider")
            .field("access_key_ids", &keys)
            .finish()
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        self.credentials
            .get(access_key_id)
            .cloned()
            .ok_or_else(|| AuthError::AccessKeyNotFound(access_key_id.to_owned()))
    }
}

/// Credentials the gateway signs backend requests with.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendCredentials {
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supplies backend credentials.
///
/// Called once per forwarded request; implementations that fetch temporary
/// credentials should cache and refresh them internally.
pub trait BackendCredentialProvider: Send + Sync {
    /// The credentials to sign the next request with.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialsUnavailable`] if none can be produced.
    fn credentials(&self) -> Result<BackendCredentials, AuthError>;
}

/// Fixed backend credentials, typically from the environment.
#[derive(Debug, Clone)]
pub struct StaticBackendCredentials(BackendCredentials);

impl StaticBackendCredentials {
    /// Wrap a fixed key pair and optional session token.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self(BackendCredentials {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        })
    }
}

impl BackendCredentialProvider for StaticBackendCredentials {
    fn credentials(&self) -> Result<BackendCredentials, AuthError> {
        if self.0.access_key_id.is_empty() || self.0.secret_access_key.is_empty() {
            return Err(AuthError::CredentialsUnavailable(
                "backend access key pair is empty".to_owned(),
            ));
        }
        Ok(self.0.clone())
    }
}
