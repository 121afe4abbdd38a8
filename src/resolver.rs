//! Multi-provider repository resolution.
//!
//! Generalizes the teacher's `discovery.rs` `MultiDiscovery` (which simply
//! concatenated every configured source) with the strategy dispatch and
//! two-stage deduplication from
//! `original_source/mgit/utils/multi_provider_resolver.py`'s
//! `MultiProviderResolver`: explicit URL, explicit provider name, or —
//! whenever neither is given — fan out to every configured provider and
//! merge, bounded by a concurrency limit via `FuturesUnordered`.

use crate::path::repo_identity;
use crate::provider::{Provider, Repository};
use crate::query::QueryPattern;
use crate::registry::ProviderRegistry;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a resolution run: the deduplicated repository set plus which
/// providers succeeded/failed, for the sync summary.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub repositories: Vec<Repository>,
    pub successful_providers: Vec<String>,
    pub failed_providers: Vec<(String, String)>,
    pub duplicates_removed: usize,
}

pub struct MultiProviderResolver {
    registry: Arc<ProviderRegistry>,
    concurrency_limit: usize,
}

impl MultiProviderResolver {
    pub fn new(registry: Arc<ProviderRegistry>, concurrency_limit: usize) -> Self {
        Self {
            registry,
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    /// Resolve repositories for `query`, dispatching to one of four
    /// strategies:
    ///
    /// 1. `explicit_url` given — resolve a single repository directly from
    ///    its clone URL, inferring the provider from the URL's hostname.
    /// 2. `explicit_provider` given — query only that provider.
    /// 3. Neither given — fan out to every configured provider
    ///    (subsumes the wildcard-pattern case; see design notes).
    /// A [`crate::error::MgitError`] whose `is_fatal()` is `true` (bad
    /// configuration, an unresolvable directory-name collision) always
    /// propagates out of every strategy below rather than being folded into
    /// `failed_providers` — those are problems no retry or fallback provider
    /// fixes, so the caller should fail fast instead of reporting a
    /// misleadingly partial result.
    pub async fn resolve(
        &self,
        query: &str,
        explicit_provider: Option<&str>,
        explicit_url: Option<&str>,
    ) -> crate::error::Result<ResolutionResult> {
        if let Some(url) = explicit_url {
            return self.resolve_explicit_url(url).await;
        }

        if let Some(name) = explicit_provider {
            return self.resolve_single_provider(name, query).await;
        }

        self.resolve_multi_provider(query).await
    }

    async fn resolve_explicit_url(&self, url: &str) -> crate::error::Result<ResolutionResult> {
        let provider_type = match ProviderRegistry::detect_provider_type(url) {
            Some(t) => t,
            None => {
                return Ok(ResolutionResult {
                    failed_providers: vec![(
                        url.to_string(),
                        "could not infer provider from URL".to_string(),
                    )],
                    ..Default::default()
                })
            }
        };

        let matching_name = self
            .registry
            .list_provider_names()
            .into_iter()
            .find(|name| {
                self.registry
                    .create_provider(name)
                    .map(|p| p.provider_type() == provider_type)
                    .unwrap_or(false)
            });

        let Some(name) = matching_name else {
            return Ok(ResolutionResult {
                failed_providers: vec![(
                    url.to_string(),
                    format!("no configured provider matches {provider_type}"),
                )],
                ..Default::default()
            });
        };

        let provider = match self.registry.create_provider(&name) {
            Ok(p) => p,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                return Ok(ResolutionResult {
                    failed_providers: vec![(name, e.to_string())],
                    ..Default::default()
                })
            }
        };

        match self
            .list_all_for_provider(provider.as_ref(), &QueryPattern::parse("*", None).unwrap())
            .await
        {
            Ok(repos) => {
                let matching: Vec<Repository> = repos
                    .into_iter()
                    .filter(|r| r.clone_url == url)
                    .collect();
                let matching = stamp_provider_config(matching, &name);
                let (deduped, removed) = dedup(matching);
                Ok(ResolutionResult {
                    repositories: deduped,
                    successful_providers: vec![name],
                    duplicates_removed: removed,
                    ..Default::default()
                })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(ResolutionResult {
                failed_providers: vec![(name, e.to_string())],
                ..Default::default()
            }),
        }
    }

    async fn resolve_single_provider(
        &self,
        name: &str,
        query: &str,
    ) -> crate::error::Result<ResolutionResult> {
        let provider = match self.registry.create_provider(name) {
            Ok(p) => p,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                return Ok(ResolutionResult {
                    failed_providers: vec![(name.to_string(), e.to_string())],
                    ..Default::default()
                })
            }
        };

        let pattern = match QueryPattern::parse(query, Some(provider.provider_type().as_query_kind())) {
            Ok(p) => p,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                return Ok(ResolutionResult {
                    failed_providers: vec![(name.to_string(), e.to_string())],
                    ..Default::default()
                })
            }
        };

        match self.list_all_for_provider(provider.as_ref(), &pattern).await {
            Ok(repos) => {
                let stamped = stamp_provider_config(repos, name);
                let (deduped, removed) = dedup(stamped);
                Ok(ResolutionResult {
                    repositories: deduped,
                    successful_providers: vec![name.to_string()],
                    duplicates_removed: removed,
                    ..Default::default()
                })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(ResolutionResult {
                failed_providers: vec![(name.to_string(), e.to_string())],
                ..Default::default()
            }),
        }
    }

    async fn resolve_multi_provider(&self, query: &str) -> crate::error::Result<ResolutionResult> {
        let names = self.registry.list_provider_names();
        debug!(count = names.len(), query, "fanning out to all configured providers");

        let mut tasks = FuturesUnordered::new();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.concurrency_limit));

        for name in names {
            let registry = Arc::clone(&self.registry);
            let semaphore = Arc::clone(&semaphore);
            let query = query.to_string();

            tasks.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                // `name` is borrowed (not moved) by the inner block so it's
                // still available afterward to tag either outcome.
                let outcome: std::result::Result<Vec<Repository>, crate::error::MgitError> = async {
                    let provider = registry.create_provider(&name)?;
                    let pattern =
                        QueryPattern::parse(&query, Some(provider.provider_type().as_query_kind()))?;
                    let repos = list_all_for(provider.as_ref(), &pattern).await?;
                    Ok(stamp_provider_config(repos, &name))
                }
                .await;

                match outcome {
                    Ok(repos) => Ok((name, repos)),
                    Err(e) => Err((name, e)),
                }
            });
        }

        let mut successful_providers = Vec::new();
        let mut failed_providers = Vec::new();
        let mut all_repos = Vec::new();

        while let Some(result) = tasks.next().await {
            match result {
                Ok((name, repos)) => {
                    all_repos.extend(repos);
                    successful_providers.push(name);
                }
                Err((_, e)) if e.is_fatal() => return Err(e),
                Err((name, e)) => {
                    warn!(provider = %name, error = %e, "provider listing failed during multi-provider resolution");
                    failed_providers.push((name, e.to_string()));
                }
            }
        }

        let (deduped, duplicates_removed) = dedup(all_repos);

        Ok(ResolutionResult {
            repositories: deduped,
            successful_providers,
            failed_providers,
            duplicates_removed,
        })
    }

    async fn list_all_for_provider(
        &self,
        provider: &dyn Provider,
        pattern: &QueryPattern,
    ) -> crate::error::Result<Vec<Repository>> {
        list_all_for(provider, pattern).await
    }
}

/// List and filter repositories for one provider against `pattern`,
/// expanding over every matching organization (and project, for
/// three-tier providers).
async fn list_all_for(
    provider: &dyn Provider,
    pattern: &QueryPattern,
) -> crate::error::Result<Vec<Repository>> {
    let orgs = provider.list_organizations().await?;
    let matching_orgs: Vec<_> = orgs
        .into_iter()
        .filter(|o| crate::query::matches(&o.name, &pattern.org_pattern, false))
        .collect();

    let mut repos = Vec::new();

    for org in matching_orgs {
        if provider.supports_projects() {
            let projects = provider.list_projects(&org.name).await?;
            for project in projects {
                if !crate::query::matches(&project.name, &pattern.project_pattern, false) {
                    continue;
                }
                match provider.list_repositories(&org.name, Some(&project.name)).await {
                    Ok(project_repos) => repos.extend(
                        project_repos
                            .into_iter()
                            .filter(|r| crate::query::matches(&r.name, &pattern.repo_pattern, false)),
                    ),
                    Err(partial) => {
                        warn!(
                            org = %org.name,
                            project = %project.name,
                            error = %partial.error,
                            "repository listing failed partway through, keeping repositories already collected"
                        );
                        repos.extend(
                            partial
                                .partial
                                .into_iter()
                                .filter(|r| crate::query::matches(&r.name, &pattern.repo_pattern, false)),
                        );
                    }
                }
            }
        } else {
            match provider.list_repositories(&org.name, None).await {
                Ok(org_repos) => repos.extend(
                    org_repos
                        .into_iter()
                        .filter(|r| crate::query::matches(&r.name, &pattern.repo_pattern, false)),
                ),
                Err(partial) => {
                    warn!(
                        org = %org.name,
                        error = %partial.error,
                        "repository listing failed partway through, keeping repositories already collected"
                    );
                    repos.extend(
                        partial
                            .partial
                            .into_iter()
                            .filter(|r| crate::query::matches(&r.name, &pattern.repo_pattern, false)),
                    );
                }
            }
        }
    }

    Ok(repos)
}

/// Stamp each repository with the provider config name it was discovered
/// through, so the bulk engine (C9) can always clone with the same
/// credential it was listed under, even in multi-provider mode.
fn stamp_provider_config(mut repos: Vec<Repository>, provider_name: &str) -> Vec<Repository> {
    for repo in &mut repos {
        repo.metadata
            .insert("provider_config_name".to_string(), provider_name.to_string());
    }
    repos
}

/// Two-stage dedup: primary key is the exact clone URL, secondary key is
/// `(host, org, name)` so the same repository mirrored under a slightly
/// different URL (e.g. `.git` suffix differences) is still caught.
fn dedup(repos: Vec<Repository>) -> (Vec<Repository>, usize) {
    let mut seen_urls = HashSet::new();
    let mut seen_identities = HashSet::new();
    let mut deduped = Vec::new();
    let mut removed = 0;

    for repo in repos {
        if !seen_urls.insert(repo.clone_url.clone()) {
            removed += 1;
            continue;
        }

        if let Some(identity) = repo_identity(&repo.clone_url) {
            if !seen_identities.insert(identity) {
                removed += 1;
                continue;
            }
        }

        deduped.push(repo);
    }

    (deduped, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderType;
    use std::collections::HashMap;

    fn repo(clone_url: &str) -> Repository {
        Repository {
            name: "repo".to_string(),
            clone_url: clone_url.to_string(),
            ssh_url: None,
            is_disabled: false,
            is_private: false,
            default_branch: "main".to_string(),
            description: None,
            provider: ProviderType::GitHub,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn dedup_removes_exact_url_duplicates() {
        let (deduped, removed) = dedup(vec![
            repo("https://github.com/org/repo.git"),
            repo("https://github.com/org/repo.git"),
        ]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(removed, 1);
    }

    #[test]
    fn dedup_removes_identity_duplicates_across_url_variants() {
        let (deduped, removed) = dedup(vec![
            repo("https://github.com/org/repo.git"),
            repo("https://github.com/org/repo"),
        ]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(removed, 1);
    }

    #[test]
    fn dedup_keeps_same_name_across_different_hosts() {
        let (deduped, removed) = dedup(vec![
            repo("https://github.com/org/repo.git"),
            repo("https://bitbucket.org/org/repo.git"),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(removed, 0);
    }
}
