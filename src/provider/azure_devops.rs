//! Azure DevOps provider adapter.
//!
//! Grounded in the REST-call shape and URL parsing from
//! `other_examples/.../src-platform-azure.rs.rs`'s `AzureDevOpsAdapter`:
//! Basic auth with a base64-encoded `:<PAT>`, `{base}/{org}/{project}/_apis{endpoint}?api-version=7.0`
//! URLs, and the three clone-URL formats (`ssh.dev.azure.com`, `dev.azure.com`,
//! legacy `visualstudio.com`). The organization/project/repository hierarchy
//! itself follows `mgit/providers/base.py`'s three-tier model.

use super::{ListResult, Organization, PartialListError, Project, Provider, ProviderConfig, ProviderType, Repository};
use crate::error::{MgitError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct AzureDevOpsProvider {
    base_url: String,
    organization: String,
    token: String,
    name: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ProjectListResponse {
    value: Vec<ProjectItem>,
}

#[derive(Debug, Deserialize)]
struct ProjectItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepoListResponse {
    value: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    name: String,
    #[serde(rename = "remoteUrl")]
    remote_url: Option<String>,
    #[serde(rename = "sshUrl")]
    ssh_url: Option<String>,
    #[serde(rename = "isDisabled")]
    is_disabled: Option<bool>,
    #[serde(rename = "defaultBranch")]
    default_branch: Option<String>,
    project: Option<ProjectItem>,
}

impl AzureDevOpsProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let organization = config.organization.clone().ok_or_else(|| {
            MgitError::Configuration(format!(
                "provider '{}': Azure DevOps requires an organization",
                config.name
            ))
        })?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MgitError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: if config.url.is_empty() {
                "https://dev.azure.com".to_string()
            } else {
                config.url.trim_end_matches('/').to_string()
            },
            organization,
            token: config.token.clone(),
            name: config.name.clone(),
            http,
        })
    }

    fn auth_header(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!(":{}", self.token)))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| MgitError::Connection {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MgitError::ProviderApi {
                provider: self.name.clone(),
                message: format!("Azure DevOps API error ({status}): {body}"),
            });
        }

        response.json().await.map_err(|e| MgitError::ProviderApi {
            provider: self.name.clone(),
            message: format!("failed to parse Azure DevOps response: {e}"),
        })
    }

    async fn api_get<T: for<'de> Deserialize<'de>>(&self, project: &str, endpoint: &str) -> Result<T> {
        let url = format!(
            "{}/{}/{}/_apis{}?api-version=7.0",
            self.base_url, self.organization, project, endpoint
        );
        self.get_json(&url).await
    }

    /// The "List Projects" endpoint is org-scoped, unlike every other Azure
    /// DevOps endpoint this adapter calls: no project segment in the URL.
    fn projects_url(&self) -> String {
        format!(
            "{}/{}/_apis/projects?api-version=7.0",
            self.base_url, self.organization
        )
    }

    fn to_repository(&self, item: RepoItem, project: &str) -> Repository {
        let clone_url = item.remote_url.clone().unwrap_or_default();
        let mut metadata = HashMap::new();
        metadata.insert("project".to_string(), project.to_string());

        Repository {
            name: item.name,
            clone_url,
            ssh_url: item.ssh_url,
            is_disabled: item.is_disabled.unwrap_or(false),
            is_private: true,
            default_branch: item
                .default_branch
                .map(|b| b.trim_start_matches("refs/heads/").to_string())
                .unwrap_or_else(|| "main".to_string()),
            description: None,
            provider: ProviderType::AzureDevOps,
            metadata,
        }
    }
}

#[async_trait]
impl Provider for AzureDevOpsProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::AzureDevOps
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate_config(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(MgitError::Configuration(format!(
                "provider '{}': Azure DevOps PAT is empty",
                self.name
            )));
        }
        if self.organization.is_empty() {
            return Err(MgitError::Configuration(format!(
                "provider '{}': Azure DevOps organization is empty",
                self.name
            )));
        }
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        let _: ProjectListResponse = self
            .get_json(&self.projects_url())
            .await
            .map_err(|e| MgitError::Authentication {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>> {
        Ok(vec![Organization {
            name: self.organization.clone(),
            display_name: None,
        }])
    }

    async fn list_projects(&self, _organization: &str) -> Result<Vec<Project>> {
        let resp: ProjectListResponse = self.get_json(&self.projects_url()).await?;
        Ok(resp
            .value
            .into_iter()
            .map(|p| Project {
                name: p.name,
                organization: self.organization.clone(),
            })
            .collect())
    }

    async fn list_repositories(&self, _organization: &str, project: Option<&str>) -> ListResult {
        let project = match project {
            Some(p) => p,
            None => {
                return Err(PartialListError {
                    partial: Vec::new(),
                    error: MgitError::Configuration(format!(
                        "provider '{}': Azure DevOps repository listing requires a project",
                        self.name
                    )),
                })
            }
        };

        debug!(org = %self.organization, project, "listing Azure DevOps repositories");
        let resp: RepoListResponse = self
            .api_get(project, "/git/repositories")
            .await
            .map_err(|e| PartialListError { partial: Vec::new(), error: e })?;
        Ok(resp
            .value
            .into_iter()
            .map(|r| self.to_repository(r, project))
            .collect())
    }

    async fn get_repository(
        &self,
        _organization: &str,
        project: Option<&str>,
        name: &str,
    ) -> Result<Option<Repository>> {
        let project = project.ok_or_else(|| {
            MgitError::Configuration(format!(
                "provider '{}': Azure DevOps repository lookup requires a project",
                self.name
            ))
        })?;

        let endpoint = format!("/git/repositories/{name}");
        let url = format!(
            "{}/{}/{}/_apis{}?api-version=7.0",
            self.base_url, self.organization, project, endpoint
        );
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| MgitError::Connection {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MgitError::ProviderApi {
                provider: self.name.clone(),
                message: format!("Azure DevOps API error ({status}): {body}"),
            });
        }

        let item: RepoItem = response.json().await.map_err(|e| MgitError::ProviderApi {
            provider: self.name.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(self.to_repository(item, project)))
    }

    fn get_authenticated_clone_url(&self, repo: &Repository) -> String {
        if let Some(rest) = repo.clone_url.strip_prefix("https://") {
            format!("https://PersonalAccessToken:{}@{}", self.token, rest)
        } else {
            repo.clone_url.clone()
        }
    }
}

/// Parsed organization/project/repository extracted from one of the three
/// Azure DevOps clone-URL formats. Used by the resolver (C6) when a caller
/// supplies an explicit URL rather than a query pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAzureUrl {
    pub organization: String,
    pub project: String,
    pub repository: String,
}

/// Parse `git@ssh.dev.azure.com:v3/org/project/repo`,
/// `https://dev.azure.com/org/project/_git/repo`, or the legacy
/// `https://org.visualstudio.com/project/_git/repo` format.
pub fn parse_azure_url(url: &str) -> Option<ParsedAzureUrl> {
    if let Some(rest) = url.strip_prefix("git@ssh.dev.azure.com:v3/") {
        let parts: Vec<&str> = rest.trim_end_matches(".git").split('/').collect();
        if parts.len() == 3 {
            return Some(ParsedAzureUrl {
                organization: parts[0].to_string(),
                project: parts[1].to_string(),
                repository: parts[2].to_string(),
            });
        }
        return None;
    }

    if let Some(rest) = url.strip_prefix("https://dev.azure.com/") {
        let rest = rest.trim_end_matches(".git");
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() == 4 && parts[2] == "_git" {
            return Some(ParsedAzureUrl {
                organization: parts[0].to_string(),
                project: parts[1].to_string(),
                repository: parts[3].to_string(),
            });
        }
        return None;
    }

    if let Some(rest) = url.strip_prefix("https://") {
        let rest = rest.trim_end_matches(".git");
        if let Some(idx) = rest.find(".visualstudio.com/") {
            let organization = rest[..idx].to_string();
            let after = &rest[idx + ".visualstudio.com/".len()..];
            let parts: Vec<&str> = after.split('/').collect();
            if parts.len() == 3 && parts[1] == "_git" {
                return Some(ParsedAzureUrl {
                    organization,
                    project: parts[0].to_string(),
                    repository: parts[2].to_string(),
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssh_url() {
        let parsed = parse_azure_url("git@ssh.dev.azure.com:v3/myorg/myproject/myrepo").unwrap();
        assert_eq!(parsed.organization, "myorg");
        assert_eq!(parsed.project, "myproject");
        assert_eq!(parsed.repository, "myrepo");
    }

    #[test]
    fn parses_https_url() {
        let parsed =
            parse_azure_url("https://dev.azure.com/myorg/myproject/_git/myrepo").unwrap();
        assert_eq!(parsed.organization, "myorg");
        assert_eq!(parsed.project, "myproject");
        assert_eq!(parsed.repository, "myrepo");
    }

    #[test]
    fn parses_legacy_visualstudio_url() {
        let parsed =
            parse_azure_url("https://myorg.visualstudio.com/myproject/_git/myrepo.git").unwrap();
        assert_eq!(parsed.organization, "myorg");
        assert_eq!(parsed.project, "myproject");
        assert_eq!(parsed.repository, "myrepo");
    }

    #[test]
    fn rejects_unrecognized_url() {
        assert!(parse_azure_url("https://github.com/org/repo.git").is_none());
    }

    #[test]
    fn validate_config_requires_organization() {
        let config = ProviderConfig {
            name: "ado".to_string(),
            provider_type: ProviderType::AzureDevOps,
            url: String::new(),
            token: "pat".to_string(),
            organization: None,
        };
        assert!(AzureDevOpsProvider::new(&config).is_err());
    }
}
