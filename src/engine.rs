//! Bulk operation engine: the bounded-concurrency per-repository state
//! machine that actually clones/pulls.
//!
//! Generalized from the teacher's `sync.rs` `SyncEngine::sync_specs_parallel`
//! (semaphore-bounded `FuturesUnordered`, per-task timeout, failure
//! isolation) into the `{Clone, Pull, Skip*, ForceReclone}` state machine:
//! provider-agnostic, keyed off `Repository`/`PlannedAction` rather than the
//! teacher's GitHub-specific `RepoSpec`/`SyncResult`.
//!
//! The plan (target path + which action applies) is computed once, up front,
//! by [`crate::sync::SyncOrchestrator`] rather than re-derived here per task;
//! this engine's job is purely to execute an already-decided
//! [`PlannedAction`] under bounded concurrency. [`RepoTask`] is the unit that
//! crosses that boundary.

use crate::git::GitExecutor;
use crate::provider::Repository;
use crate::ratelimit::RateLimitGate;
use crate::registry::ProviderRegistry;
use crate::retry::with_retry;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// The per-repository decision made during pre-flight, before any task
/// starts running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Clone,
    Pull,
    SkipExists,
    SkipDirty,
    SkipDisabled,
    SkipNonGit,
    ForceReclone,
    SkipNoRemote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Success,
    Skipped,
    Failed,
}

/// Outcome of one repository's planned action, after execution.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub name: String,
    pub action_attempted: PlannedAction,
    pub result: OperationResult,
    pub reason: Option<String>,
}

/// One resolved repository plus everything the engine needs to act on it.
pub struct RepoTask {
    pub repo: Repository,
    pub local_path: PathBuf,
    pub planned_action: PlannedAction,
}

/// Bounded-concurrency engine. Holds one [`RateLimitGate`] per provider
/// config name so repeated clones against the same provider share backoff
/// state, matching the "rate-limit cache is per-provider-instance" rule.
pub struct BulkOperationEngine {
    registry: Arc<ProviderRegistry>,
    default_provider_name: Option<String>,
    git: GitExecutor,
    max_retries: u32,
    gates: std::sync::Mutex<HashMap<String, Arc<RateLimitGate>>>,
    rate_limit_config: crate::config::RateLimitConfig,
}

impl BulkOperationEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        default_provider_name: Option<String>,
        timeout: Duration,
        max_retries: u32,
        rate_limit_config: crate::config::RateLimitConfig,
    ) -> Self {
        Self {
            registry,
            default_provider_name,
            git: GitExecutor::new(timeout),
            max_retries,
            gates: std::sync::Mutex::new(HashMap::new()),
            rate_limit_config,
        }
    }

    fn gate_for(&self, provider_name: &str) -> Arc<RateLimitGate> {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(provider_name.to_string())
            .or_insert_with(|| {
                Arc::new(RateLimitGate::new(
                    provider_name.to_string(),
                    self.rate_limit_config.clone(),
                ))
            })
            .clone()
    }

    /// Resolve the authenticated clone URL for `repo`. Follows the stamped
    /// `metadata["provider_config_name"]` when present (so a repo
    /// discovered via provider config A always clones with A's token, even
    /// in multi-provider mode) and falls back to the engine's default
    /// provider otherwise.
    fn authenticated_clone_url(&self, repo: &Repository) -> (String, String) {
        let stamped = repo.metadata.get("provider_config_name").cloned();

        let provider_name = stamped
            .clone()
            .or_else(|| self.default_provider_name.clone());

        if let Some(name) = &provider_name {
            if let Ok(provider) = self.registry.create_provider(name) {
                return (provider.get_authenticated_clone_url(repo), name.clone());
            }
            warn!(
                provider = name,
                repo = repo.name,
                "stamped provider config missing or failed to load, falling back to clone_url as-is"
            );
        }

        (repo.clone_url.clone(), "default".to_string())
    }

    /// Run the per-repo state machine for every task, bounded by
    /// `concurrency` concurrent tasks.
    pub async fn process(
        &self,
        tasks: Vec<RepoTask>,
        concurrency: usize,
        fast_forward_only: bool,
        op_timeout: Duration,
        confirmed_force: bool,
        cancelled: Arc<AtomicBool>,
    ) -> Vec<OperationOutcome> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
        let mut futures = FuturesUnordered::new();

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let cancelled = Arc::clone(&cancelled);
            let git = self.git.clone();

            let action = if task.planned_action == PlannedAction::ForceReclone && !confirmed_force
            {
                PlannedAction::SkipExists
            } else {
                task.planned_action.clone()
            };

            let (clone_url, provider_name) = self.authenticated_clone_url(&task.repo);
            let gate = self.gate_for(&provider_name);
            let max_retries = self.max_retries;
            let name = task.repo.name.clone();
            let local_path = task.local_path.clone();

            futures.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");

                if cancelled.load(Ordering::Relaxed) {
                    return OperationOutcome {
                        name,
                        action_attempted: action,
                        result: OperationResult::Skipped,
                        reason: Some("cancelled".to_string()),
                    };
                }

                let outcome = match timeout(
                    op_timeout,
                    run_action(&git, &gate, max_retries, &action, &clone_url, &local_path, fast_forward_only),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(format!("operation timed out after {op_timeout:?}")),
                };

                match outcome {
                    Ok(result) => OperationOutcome {
                        name,
                        action_attempted: action,
                        result,
                        reason: None,
                    },
                    Err(reason) => OperationOutcome {
                        name,
                        action_attempted: action,
                        result: OperationResult::Failed,
                        reason: Some(reason),
                    },
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(outcome) = futures.next().await {
            info!(
                repo = outcome.name,
                action = ?outcome.action_attempted,
                result = ?outcome.result,
                "repository operation finished"
            );
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn run_action(
    git: &GitExecutor,
    gate: &RateLimitGate,
    max_retries: u32,
    action: &PlannedAction,
    clone_url: &str,
    local_path: &PathBuf,
    fast_forward_only: bool,
) -> Result<OperationResult, String> {
    match action {
        PlannedAction::SkipDisabled
        | PlannedAction::SkipExists
        | PlannedAction::SkipDirty
        | PlannedAction::SkipNonGit
        | PlannedAction::SkipNoRemote => Ok(OperationResult::Skipped),

        PlannedAction::Clone => {
            with_retry(gate, max_retries, || async {
                git.clone(clone_url, local_path, None).await
            })
            .await
            .map(|_| OperationResult::Success)
            .map_err(|e| e.to_string())
        }

        PlannedAction::ForceReclone => {
            if local_path.exists() {
                tokio::fs::remove_dir_all(local_path)
                    .await
                    .map_err(|e| format!("failed to remove existing directory: {e}"))?;
            }
            with_retry(gate, max_retries, || async {
                git.clone(clone_url, local_path, None).await
            })
            .await
            .map(|_| OperationResult::Success)
            .map_err(|e| e.to_string())
        }

        PlannedAction::Pull => with_retry(gate, max_retries, || async {
            git.pull(local_path, fast_forward_only).await
        })
        .await
        .map(|_| OperationResult::Success)
        .map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_action_variants_are_distinct() {
        assert_ne!(PlannedAction::Clone, PlannedAction::Pull);
        assert_ne!(PlannedAction::SkipDirty, PlannedAction::SkipExists);
    }
}
