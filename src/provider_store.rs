//! External provider credential store.
//!
//! The core (query, path, resolver, engine) never reads credentials
//! directly — it depends on this trait, matching the separation the
//! component design draws between "core settings" and "where provider
//! secrets live". The YAML-backed default implementation follows the
//! teacher's `Config::load`/`save` idiom (`serde_yaml` + `dirs` +
//! `shellexpand`) applied to a dedicated providers file instead of the
//! single monolithic config the teacher used.

use crate::provider::{ProviderConfig, ProviderType};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where a [`Provider`](crate::provider::Provider)'s credentials come from.
/// Implementations may back this with a YAML file (the default), a secrets
/// manager, or anything else — the rest of the crate only depends on this
/// trait.
pub trait ProviderConfigStore: Send + Sync {
    fn list_names(&self) -> Vec<String>;
    fn get(&self, name: &str) -> Option<ProviderConfig>;
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct StoredProvider {
    #[serde(rename = "type")]
    provider_type: String,
    #[serde(default)]
    url: String,
    token: String,
    #[serde(default)]
    organization: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
struct ProvidersFile {
    #[serde(default)]
    providers: HashMap<String, StoredProvider>,
}

/// Default [`ProviderConfigStore`] backed by a YAML file, typically
/// `~/.config/mgit/providers.yml`.
pub struct YamlProviderConfigStore {
    providers: HashMap<String, ProviderConfig>,
}

impl YamlProviderConfigStore {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read provider config: {path:?}"))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: ProvidersFile = serde_yaml::from_str(content)
            .context("failed to parse provider configuration YAML")?;

        let mut providers = HashMap::new();
        for (name, stored) in file.providers {
            let provider_type = match stored.provider_type.as_str() {
                "github" => ProviderType::GitHub,
                "azure-devops" | "azuredevops" => ProviderType::AzureDevOps,
                "bitbucket" => ProviderType::Bitbucket,
                other => {
                    anyhow::bail!("unknown provider type '{other}' for provider '{name}'")
                }
            };

            let token = shellexpand::env(&stored.token)
                .with_context(|| format!("failed to expand token for provider '{name}'"))?
                .into_owned();

            providers.insert(
                name.clone(),
                ProviderConfig {
                    name,
                    provider_type,
                    url: stored.url,
                    token,
                    organization: stored.organization,
                },
            );
        }

        Ok(Self { providers })
    }

    /// `~/.config/mgit/providers.yml`, matching the teacher's XDG-compliant
    /// `Config::default_config_path`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("failed to get user config directory")?;
        Ok(dir.join("mgit").join("providers.yml"))
    }

    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self {
                providers: HashMap::new(),
            })
        }
    }
}

impl ProviderConfigStore for YamlProviderConfigStore {
    fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    fn get(&self, name: &str) -> Option<ProviderConfig> {
        self.providers.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
providers:
  work-github:
    type: github
    url: https://github.com
    token: ghp_example
  ado-main:
    type: azure-devops
    url: https://dev.azure.com
    token: pat-example
    organization: myorg
"#;

    #[test]
    fn loads_providers_from_yaml() {
        let store = YamlProviderConfigStore::from_yaml(SAMPLE).unwrap();
        let mut names = store.list_names();
        names.sort();
        assert_eq!(names, vec!["ado-main", "work-github"]);

        let ado = store.get("ado-main").unwrap();
        assert_eq!(ado.provider_type, ProviderType::AzureDevOps);
        assert_eq!(ado.organization.as_deref(), Some("myorg"));
    }

    #[test]
    fn rejects_unknown_provider_type() {
        let bad = "providers:\n  x:\n    type: gitlab\n    token: t\n";
        assert!(YamlProviderConfigStore::from_yaml(bad).is_err());
    }

    #[test]
    fn missing_provider_returns_none() {
        let store = YamlProviderConfigStore::from_yaml(SAMPLE).unwrap();
        assert!(store.get("nonexistent").is_none());
    }
}
