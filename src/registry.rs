//! Provider registry and factory.
//!
//! New relative to the teacher, which only ever constructed one
//! `GitHubClient`. Mirrors the role `mgit/providers/base.py`'s
//! `PROVIDER_REGISTRY`-style dispatch plays in the original: given a
//! provider name or URL, build the right concrete adapter behind the
//! [`Provider`] trait object.

use crate::error::{MgitError, Result};
use crate::provider::azure_devops::{parse_azure_url, AzureDevOpsProvider};
use crate::provider::bitbucket::BitbucketProvider;
use crate::provider::github::GitHubProvider;
use crate::provider::{Provider, ProviderConfig, ProviderType};
use crate::provider_store::ProviderConfigStore;
use std::sync::Arc;

/// Builds and caches [`Provider`] instances from a [`ProviderConfigStore`].
pub struct ProviderRegistry {
    store: Arc<dyn ProviderConfigStore>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<dyn ProviderConfigStore>) -> Self {
        Self { store }
    }

    pub fn list_provider_names(&self) -> Vec<String> {
        self.store.list_names()
    }

    /// Construct the named provider from its stored configuration.
    pub fn create_provider(&self, name: &str) -> Result<Box<dyn Provider>> {
        let config = self.store.get(name).ok_or_else(|| {
            MgitError::Configuration(format!("no provider named '{name}' in config"))
        })?;
        create_from_config(&config)
    }

    /// Construct every configured provider, in config-file order.
    pub fn create_all(&self) -> Result<Vec<Box<dyn Provider>>> {
        self.list_provider_names()
            .iter()
            .map(|name| self.create_provider(name))
            .collect()
    }

    /// Infer the provider type for a clone URL by pattern-matching known
    /// hosting hostnames, for use when a caller passes a raw URL instead of
    /// a configured provider name.
    pub fn detect_provider_type(url: &str) -> Option<ProviderType> {
        if url.contains("github.com") {
            Some(ProviderType::GitHub)
        } else if url.contains("dev.azure.com") || url.contains("visualstudio.com") {
            Some(ProviderType::AzureDevOps)
        } else if url.contains("bitbucket.org") {
            Some(ProviderType::Bitbucket)
        } else {
            None
        }
    }

    /// For an explicit Azure DevOps URL, also recover the
    /// organization/project/repository triple so the resolver doesn't need
    /// a separate listing call.
    pub fn parse_explicit_azure_url(url: &str) -> Option<crate::provider::azure_devops::ParsedAzureUrl> {
        parse_azure_url(url)
    }
}

fn create_from_config(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    let provider: Box<dyn Provider> = match config.provider_type {
        ProviderType::GitHub => Box::new(GitHubProvider::new(config)?),
        ProviderType::AzureDevOps => Box::new(AzureDevOpsProvider::new(config)?),
        ProviderType::Bitbucket => Box::new(BitbucketProvider::new(config)?),
    };
    provider.validate_config()?;
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_provider_type_from_url() {
        assert_eq!(
            ProviderRegistry::detect_provider_type("https://github.com/org/repo.git"),
            Some(ProviderType::GitHub)
        );
        assert_eq!(
            ProviderRegistry::detect_provider_type("https://dev.azure.com/org/proj/_git/repo"),
            Some(ProviderType::AzureDevOps)
        );
        assert_eq!(
            ProviderRegistry::detect_provider_type("https://bitbucket.org/org/repo.git"),
            Some(ProviderType::Bitbucket)
        );
        assert_eq!(
            ProviderRegistry::detect_provider_type("https://gitlab.com/org/repo.git"),
            None
        );
    }
}
