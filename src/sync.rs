//! Sync orchestrator: the top-level flow behind the `sync` subcommand.
//!
//! Grounded in the teacher's `sync.rs` `SyncEngine::sync_repos` (load
//! config, resolve repos, run them through the engine, compile a summary)
//! and `main.rs`'s `cmd_sync`, generalized from a single-provider GitHub
//! pull to the full resolve → plan → execute → summarize flow against
//! [`crate::resolver::MultiProviderResolver`] and
//! [`crate::engine::BulkOperationEngine`].

use crate::engine::{BulkOperationEngine, OperationOutcome, OperationResult, PlannedAction, RepoTask};
use crate::git::GitExecutor;
use crate::path::{build_repo_path, resolve_collision_names};
use crate::provider::Repository;
use crate::registry::ProviderRegistry;
use crate::resolver::MultiProviderResolver;
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Skip,
    Pull,
    Force,
}

pub struct SyncOptions {
    pub query: String,
    pub explicit_provider: Option<String>,
    pub explicit_url: Option<String>,
    pub target_root: PathBuf,
    pub concurrency: usize,
    pub update_mode: UpdateMode,
    pub layout_flat: bool,
    pub dry_run: bool,
    pub confirmed_force: bool,
    pub op_timeout: Duration,
    pub max_retries: u32,
    pub fast_forward_only: bool,
}

#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
    pub outcomes: Vec<OperationOutcome>,
    pub failed_providers: Vec<(String, String)>,
}

impl SyncSummary {
    /// Exit code is 0 iff every outcome is `Success` or a benign skip.
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

pub struct SyncOrchestrator {
    registry: Arc<ProviderRegistry>,
}

impl SyncOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Run the full sync flow. `confirm_force` is invoked only when
    /// `update_mode == Force` and at least one target directory already
    /// exists; it is the orchestrator's single out-of-band interaction
    /// point (confirmation UX is external per the component design).
    pub async fn run(
        &self,
        options: SyncOptions,
        confirm_force: impl FnOnce() -> bool,
    ) -> Result<Option<SyncSummary>> {
        let start = Instant::now();

        tokio::fs::create_dir_all(&options.target_root).await?;

        let resolver = MultiProviderResolver::new(Arc::clone(&self.registry), 4);
        let resolution = resolver
            .resolve(
                &options.query,
                options.explicit_provider.as_deref(),
                options.explicit_url.as_deref(),
            )
            .await?;

        if resolution.repositories.is_empty() {
            info!("no repositories found");
            return Ok(None);
        }

        let git = GitExecutor::new(options.op_timeout);
        let tasks = self
            .build_plan(&resolution.repositories, &options, &git)
            .await?;

        let needs_confirmation = options.update_mode == UpdateMode::Force
            && tasks
                .iter()
                .any(|t| t.planned_action == PlannedAction::ForceReclone && t.local_path.exists());

        if options.dry_run {
            for task in &tasks {
                info!(repo = task.repo.name, action = ?task.planned_action, path = %task.local_path.display(), "planned (dry run)");
            }
            return Ok(Some(SyncSummary {
                total_repositories: tasks.len(),
                successful: 0,
                skipped: tasks.len(),
                failed: 0,
                duration: start.elapsed(),
                outcomes: Vec::new(),
                failed_providers: resolution.failed_providers,
            }));
        }

        let confirmed_force = if needs_confirmation {
            confirm_force()
        } else {
            true
        };

        if needs_confirmation && !confirmed_force {
            anyhow::bail!("force re-clone aborted: confirmation declined");
        }

        let engine = BulkOperationEngine::new(
            Arc::clone(&self.registry),
            options.explicit_provider.clone(),
            options.op_timeout,
            options.max_retries,
            crate::config::RateLimitConfig::default(),
        );

        let cancelled = Arc::new(AtomicBool::new(false));
        let outcomes = engine
            .process(
                tasks,
                options.concurrency,
                options.fast_forward_only,
                options.op_timeout,
                confirmed_force,
                cancelled,
            )
            .await;

        let summary = self.compile_summary(outcomes, start.elapsed(), resolution.failed_providers);
        info!(
            total = summary.total_repositories,
            successful = summary.successful,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_secs = summary.duration.as_secs_f64(),
            "sync completed"
        );

        Ok(Some(summary))
    }

    async fn build_plan(
        &self,
        repos: &[Repository],
        options: &SyncOptions,
        git: &GitExecutor,
    ) -> Result<Vec<RepoTask>> {
        let collision_names = if options.layout_flat {
            resolve_collision_names(repos).map_err(anyhow::Error::from)?
        } else {
            HashMap::new()
        };

        let mut tasks = Vec::with_capacity(repos.len());

        for repo in repos {
            let local_path = if options.layout_flat {
                let name = collision_names
                    .get(&repo.clone_url)
                    .cloned()
                    .unwrap_or_else(|| crate::path::sanitize_segment(&repo.name));
                options.target_root.join(name)
            } else {
                options
                    .target_root
                    .join(build_repo_path(&repo.clone_url, false, &repo.name))
            };

            let action = self
                .plan_action(repo, &local_path, options.update_mode, git)
                .await;

            tasks.push(RepoTask {
                repo: repo.clone(),
                local_path,
                planned_action: action,
            });
        }

        Ok(tasks)
    }

    async fn plan_action(
        &self,
        repo: &Repository,
        local_path: &Path,
        update_mode: UpdateMode,
        git: &GitExecutor,
    ) -> PlannedAction {
        if repo.is_disabled {
            return PlannedAction::SkipDisabled;
        }

        if repo.clone_url.is_empty() {
            return PlannedAction::SkipNoRemote;
        }

        if update_mode == UpdateMode::Force {
            return PlannedAction::ForceReclone;
        }

        if !local_path.exists() {
            return PlannedAction::Clone;
        }

        if !git.is_git_repository(local_path) {
            return PlannedAction::SkipNonGit;
        }

        if git.is_empty(local_path).await {
            warn!(repo = repo.name, path = %local_path.display(), "existing clone has no commits yet, skipping");
            return PlannedAction::SkipExists;
        }

        match update_mode {
            UpdateMode::Skip => PlannedAction::SkipExists,
            UpdateMode::Pull => {
                let remote = git.remote_url(local_path).await.ok().flatten();
                if let Some(remote) = remote {
                    if !git.remote_urls_match(&remote, &repo.clone_url) {
                        return PlannedAction::SkipNoRemote;
                    }
                }

                let dirty = git.has_uncommitted_changes(local_path).await.unwrap_or(false)
                    || git.has_untracked_files(local_path).await.unwrap_or(false);
                if dirty {
                    PlannedAction::SkipDirty
                } else {
                    PlannedAction::Pull
                }
            }
            UpdateMode::Force => unreachable!("handled above"),
        }
    }

    fn compile_summary(
        &self,
        outcomes: Vec<OperationOutcome>,
        duration: Duration,
        failed_providers: Vec<(String, String)>,
    ) -> SyncSummary {
        let mut successful = 0;
        let mut skipped = 0;
        let mut failed = 0;

        for outcome in &outcomes {
            match outcome.result {
                OperationResult::Success => successful += 1,
                OperationResult::Skipped => skipped += 1,
                OperationResult::Failed => failed += 1,
            }
        }

        for (provider, reason) in &failed_providers {
            warn!(provider, reason, "provider failed during resolution");
        }

        SyncSummary {
            total_repositories: outcomes.len(),
            successful,
            skipped,
            failed,
            duration,
            outcomes,
            failed_providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderType;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn repo(name: &str, clone_url: &str) -> Repository {
        Repository {
            name: name.to_string(),
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

    fn orchestrator() -> SyncOrchestrator {
        let store = crate::provider_store::YamlProviderConfigStore::from_yaml("providers: {}").unwrap();
        SyncOrchestrator::new(Arc::new(ProviderRegistry::new(Arc::new(store))))
    }

    /// `git init --bare` a source repo and clone it once, so plan_action
    /// tests have a real, clean local working tree to decide on.
    async fn bare_and_clone(git: &GitExecutor, tmp: &TempDir) -> (PathBuf, PathBuf) {
        let bare = tmp.path().join("origin.git");
        tokio::process::Command::new("git")
            .args(["init", "--bare", "-q"])
            .arg(&bare)
            .status()
            .await
            .unwrap();

        let seed = tmp.path().join("seed");
        tokio::process::Command::new("git")
            .args(["clone", "-q"])
            .arg(&bare)
            .arg(&seed)
            .status()
            .await
            .unwrap();
        tokio::fs::write(seed.join("README.md"), "hello\n").await.unwrap();
        let run = |args: &'static [&'static str]| {
            let seed = seed.clone();
            async move {
                tokio::process::Command::new("git")
                    .args(args)
                    .current_dir(&seed)
                    .status()
                    .await
                    .unwrap();
            }
        };
        run(&["add", "."]).await;
        run(&["-c", "user.email=t@t.com", "-c", "user.name=t", "commit", "-q", "-m", "seed"]).await;
        run(&["push", "-q", "origin", "HEAD:main"]).await;

        let clone_path = tmp.path().join("clone");
        git.clone(bare.to_str().unwrap(), &clone_path, None)
            .await
            .unwrap();
        (bare, clone_path)
    }

    #[tokio::test]
    async fn plan_action_clones_missing_path() {
        let tmp = TempDir::new().unwrap();
        let git = GitExecutor::new(Duration::from_secs(30));
        let r = repo("demo", "https://example.com/org/demo.git");
        let action = orchestrator()
            .plan_action(&r, &tmp.path().join("missing"), UpdateMode::Pull, &git)
            .await;
        assert_eq!(action, PlannedAction::Clone);
    }

    #[tokio::test]
    async fn plan_action_skips_disabled_repo_before_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let git = GitExecutor::new(Duration::from_secs(30));
        let mut r = repo("demo", "https://example.com/org/demo.git");
        r.is_disabled = true;
        let action = orchestrator()
            .plan_action(&r, &tmp.path().join("missing"), UpdateMode::Pull, &git)
            .await;
        assert_eq!(action, PlannedAction::SkipDisabled);
    }

    #[tokio::test]
    async fn plan_action_skips_repo_with_no_remote() {
        let tmp = TempDir::new().unwrap();
        let git = GitExecutor::new(Duration::from_secs(30));
        let r = repo("demo", "");
        let action = orchestrator()
            .plan_action(&r, &tmp.path().join("missing"), UpdateMode::Pull, &git)
            .await;
        assert_eq!(action, PlannedAction::SkipNoRemote);
    }

    #[tokio::test]
    async fn plan_action_flags_force_mode_as_reclone_even_when_missing() {
        let tmp = TempDir::new().unwrap();
        let git = GitExecutor::new(Duration::from_secs(30));
        let r = repo("demo", "https://example.com/org/demo.git");
        let action = orchestrator()
            .plan_action(&r, &tmp.path().join("missing"), UpdateMode::Force, &git)
            .await;
        assert_eq!(action, PlannedAction::ForceReclone);
    }

    #[tokio::test]
    async fn plan_action_flags_non_git_directory() {
        let tmp = TempDir::new().unwrap();
        let not_git = tmp.path().join("plain-dir");
        tokio::fs::create_dir_all(&not_git).await.unwrap();
        let git = GitExecutor::new(Duration::from_secs(30));
        let r = repo("demo", "https://example.com/org/demo.git");
        let action = orchestrator()
            .plan_action(&r, &not_git, UpdateMode::Pull, &git)
            .await;
        assert_eq!(action, PlannedAction::SkipNonGit);
    }

    #[tokio::test]
    async fn plan_action_skips_exists_under_skip_mode() {
        let tmp = TempDir::new().unwrap();
        let git = GitExecutor::new(Duration::from_secs(30));
        let (_bare, clone_path) = bare_and_clone(&git, &tmp).await;
        let r = repo("demo", "https://example.com/org/demo.git");
        let action = orchestrator()
            .plan_action(&r, &clone_path, UpdateMode::Skip, &git)
            .await;
        assert_eq!(action, PlannedAction::SkipExists);
    }

    /// S4 — a clean clone under `Pull` mode pulls; dirtying the working
    /// tree afterward flips the decision to `SkipDirty` without touching
    /// the file.
    #[tokio::test]
    async fn plan_action_pulls_clean_repo_and_skips_dirty_one() {
        let tmp = TempDir::new().unwrap();
        let git = GitExecutor::new(Duration::from_secs(30));
        let (bare, clone_path) = bare_and_clone(&git, &tmp).await;
        let r = repo("demo", bare.to_str().unwrap());

        let clean_action = orchestrator()
            .plan_action(&r, &clone_path, UpdateMode::Pull, &git)
            .await;
        assert_eq!(clean_action, PlannedAction::Pull);

        tokio::fs::write(clone_path.join("README.md"), "dirtied\n")
            .await
            .unwrap();
        let dirty_action = orchestrator()
            .plan_action(&r, &clone_path, UpdateMode::Pull, &git)
            .await;
        assert_eq!(dirty_action, PlannedAction::SkipDirty);
        assert_eq!(
            tokio::fs::read_to_string(clone_path.join("README.md")).await.unwrap(),
            "dirtied\n"
        );
    }

    #[test]
    fn exit_code_zero_with_no_failures() {
        let summary = SyncSummary {
            total_repositories: 3,
            successful: 2,
            skipped: 1,
            failed: 0,
            duration: Duration::from_secs(1),
            outcomes: Vec::new(),
            failed_providers: Vec::new(),
        };
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn exit_code_one_with_any_failure() {
        let summary = SyncSummary {
            total_repositories: 3,
            successful: 2,
            skipped: 0,
            failed: 1,
            duration: Duration::from_secs(1),
            outcomes: Vec::new(),
            failed_providers: Vec::new(),
        };
        assert_eq!(summary.exit_code(), 1);
    }
}
