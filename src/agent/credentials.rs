use crate::provider::CloudProvider;
use crate::query::Credentials;
use async_trait::async_trait;

/// Supplies the credential map passed to the query engine.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self, provider: CloudProvider) -> Credentials;
}

/// Reads the provider's well-known variables from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    pub fn collect(provider: CloudProvider, lookup: impl Fn(&str) -> Option<String>) -> Credentials {
        provider
            .credential_env_keys()
            .iter()
            .filter_map(|key| {
                lookup(key)
                    .filter(|v| !v.is_empty())
                    .map(|v| (key.to_string(), v))
            })
            .collect()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials(&self, provider: CloudProvider) -> Credentials {
        Self::collect(provider, |key| std::env::var(key).ok())
    }
}
