//! Provider-agnostic discovery interface.
//!
//! Generalizes the teacher's single-source `Discovery` trait (`discovery.rs`)
//! into a multi-provider interface modeled on `mgit/providers/base.py`'s
//! `GitProvider` abstract base class: every adapter implements the same
//! surface (authenticate, list organizations/projects/repositories, resolve
//! an authenticated clone URL) regardless of which REST API sits behind it.

pub mod azure_devops;
pub mod bitbucket;
pub mod github;

use crate::error::{MgitError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// Which REST API family a provider instance talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    AzureDevOps,
    GitHub,
    Bitbucket,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderType::AzureDevOps => "azure-devops",
            ProviderType::GitHub => "github",
            ProviderType::Bitbucket => "bitbucket",
        };
        write!(f, "{s}")
    }
}

impl ProviderType {
    /// Mirrors `QueryPattern`'s provider-tier distinction (C1): Azure DevOps
    /// has an org/project/repo namespace, GitHub and Bitbucket collapse to
    /// org/repo.
    pub fn has_project_tier(self) -> bool {
        matches!(self, ProviderType::AzureDevOps)
    }

    pub fn as_query_kind(self) -> crate::query::ProviderKind {
        match self {
            ProviderType::AzureDevOps => crate::query::ProviderKind::AzureDevOps,
            ProviderType::GitHub => crate::query::ProviderKind::GitHub,
            ProviderType::Bitbucket => crate::query::ProviderKind::Bitbucket,
        }
    }
}

/// A discovered repository, normalized across all providers.
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub clone_url: String,
    pub ssh_url: Option<String>,
    pub is_disabled: bool,
    pub is_private: bool,
    pub default_branch: String,
    pub description: Option<String>,
    pub provider: ProviderType,
    /// Provider-specific extras (e.g. Azure DevOps project name, GitHub
    /// fork/archived flags) that don't warrant a first-class field.
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Organization {
    pub name: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub organization: String,
}

/// A paginated repository listing that failed partway through. Carries
/// whatever pages were already collected so the caller isn't forced to
/// discard them alongside the error.
#[derive(Debug)]
pub struct PartialListError {
    pub partial: Vec<Repository>,
    pub error: MgitError,
}

pub type ListResult = std::result::Result<Vec<Repository>, PartialListError>;

/// Configuration needed to construct and authenticate a provider instance.
/// Populated from the external [`crate::provider_store::ProviderConfigStore`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub provider_type: ProviderType,
    pub url: String,
    pub token: String,
    /// Azure DevOps organization segment, when `url` doesn't already embed it.
    pub organization: Option<String>,
}

/// A single git hosting provider adapter.
///
/// Grounded in `mgit/providers/base.py`'s `GitProvider` abstract base class:
/// every concrete adapter owns its own authenticated HTTP client and exposes
/// the same discovery surface so the resolver (C6) can treat them uniformly.
#[async_trait]
pub trait Provider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    fn name(&self) -> &str;

    /// Verify credentials are well-formed before any network call is made.
    fn validate_config(&self) -> Result<()>;

    /// Perform a cheap authenticated call (e.g. "who am I") to confirm the
    /// configured credentials actually work.
    async fn test_connection(&self) -> Result<()>;

    /// `true` if this provider has an organization/project/repo hierarchy
    /// (Azure DevOps); `false` for two-tier providers.
    fn supports_projects(&self) -> bool {
        self.provider_type().has_project_tier()
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>>;

    /// Empty for providers without a project tier.
    async fn list_projects(&self, organization: &str) -> Result<Vec<Project>>;

    /// List repositories under `organization` (and `project`, when this
    /// provider has a project tier). A later page may fail after earlier
    /// pages already yielded results; implementations return what they
    /// collected so far alongside the error rather than discarding it.
    async fn list_repositories(
        &self,
        organization: &str,
        project: Option<&str>,
    ) -> ListResult;

    /// Fetch a single repository by name. `Ok(None)` means not found — a
    /// missing repository is a normal outcome, not an error (see
    /// `MgitError`'s deliberate omission of a not-found variant).
    async fn get_repository(
        &self,
        organization: &str,
        project: Option<&str>,
        name: &str,
    ) -> Result<Option<Repository>>;

    /// Embed this provider's credential into `repo`'s clone URL so the git
    /// executor can clone/pull without an interactive credential prompt.
    fn get_authenticated_clone_url(&self, repo: &Repository) -> String;

    /// Release any held resources (connection pools, etc). Most adapters
    /// are stateless beyond their HTTP client and can use the default no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_type_display() {
        assert_eq!(ProviderType::AzureDevOps.to_string(), "azure-devops");
        assert_eq!(ProviderType::GitHub.to_string(), "github");
        assert_eq!(ProviderType::Bitbucket.to_string(), "bitbucket");
    }

    #[test]
    fn only_azure_devops_has_project_tier() {
        assert!(ProviderType::AzureDevOps.has_project_tier());
        assert!(!ProviderType::GitHub.has_project_tier());
        assert!(!ProviderType::Bitbucket.has_project_tier());
    }
}
