//! Credential resolution.
//!
//! The gateway is single-tenant: one access-key/secret pair configured at
//! startup. The [`CredentialProvider`] trait keeps the signer testable and
//! leaves the door open for richer stores without touching verification.

use crate::error::AuthError;

/// Resolves an access key id to its secret key.
pub trait CredentialProvider: Send + Sync {
    /// Look up the secret key for an access key id.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownAccessKey`] when the id is not known.
    fn secret_key(&self, access_key_id: &str) -> Result<String, AuthError>;
}

/// The process-wide credential pair, immutable after startup.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    access_key_id: String,
    secret_access_key: String,
}

impl StaticCredentials {
    /// Create the credential pair the gateway accepts.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// The configured access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

impl CredentialProvider for StaticCredentials {
    fn secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        if access_key_id == self.access_key_id {
            Ok(self.secret_access_key.clone())
        } else {
            Err(AuthError::UnknownAccessKey(access_key_id.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_known_access_key() {
        let creds = StaticCredentials::new("AKID", "secret");
        assert_eq!(creds.secret_key("AKID").unwrap(), "secret");
    }

    #[test]
    fn test_should_reject_unknown_access_key() {
        let creds = StaticCredentials::new("AKID", "secret");
        assert!(matches!(
            creds.secret_key("OTHER"),
            Err(AuthError::UnknownAccessKey(_))
        ));
    }
}
