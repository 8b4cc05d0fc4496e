//! Credential providers for the resilient client.
//!
//! The client attaches a bearer credential to every physical attempt, so
//! providers may rotate tokens between retries of one logical call.
//! Credential material is wrapped in [`SecretString`] and never appears
//! in logs or observability events.

use crate::errors::{ClientResult, CredentialError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

/// A bearer credential for one physical attempt
#[derive(Clone)]
pub struct BearerCredential {
    token: SecretString,
}

impl BearerCredential {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    /// Render the Authorization header value
    pub(crate) fn header_value(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BearerCredential([REDACTED])")
    }
}

/// Supplies the credential attached to each physical attempt
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get the current credential
    async fn credential(&self) -> ClientResult<BearerCredential>;
}

/// Provider returning one fixed credential
pub struct StaticCredentialProvider {
    credential: BearerCredential,
}

impl StaticCredentialProvider {
    /// Create a provider around a fixed token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: BearerCredential::new(token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn credential(&self) -> ClientResult<BearerCredential> {
        Ok(self.credential.clone())
    }
}

/// Provider reading the token from an environment variable on every attempt
pub struct EnvCredentialProvider {
    var_name: String,
}

impl EnvCredentialProvider {
    /// Create a provider reading from `var_name`
    pub fn from_env_var(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credential(&self) -> ClientResult<BearerCredential> {
        std::env::var(&self.var_name)
            .map(BearerCredential::new)
            .map_err(|_| {
                CredentialError::ProviderFailed {
                    message: format!("environment variable {} not set", self.var_name),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticCredentialProvider::new("token-123");
        let credential = provider.credential().await.unwrap();
        assert_eq!(credential.header_value(), "Bearer token-123");
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = BearerCredential::new("super-secret");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_env_provider_missing_var() {
        let provider = EnvCredentialProvider::from_env_var("INTEGRATIONS_CORE_TEST_UNSET");
        assert!(provider.credential().await.is_err());
    }
}
