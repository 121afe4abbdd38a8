use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod config;
mod engine;
mod error;
mod git;
mod path;
mod provider;
mod provider_store;
mod query;
mod ratelimit;
mod registry;
mod resolver;
mod retry;
mod sync;

use cli::{Cli, Commands, ListFormat};
use config::Config;
use provider_store::YamlProviderConfigStore;
use registry::ProviderRegistry;
use resolver::MultiProviderResolver;
use sync::{SyncOptions, SyncOrchestrator, UpdateMode};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Config::load_or_default()?;
    let store = match &cli.config {
        Some(path) => Arc::new(YamlProviderConfigStore::load(path)?),
        None => Arc::new(YamlProviderConfigStore::load_or_default()?),
    };
    let registry = Arc::new(ProviderRegistry::new(store));

    match cli.command {
        Commands::Sync {
            pattern,
            path,
            provider,
            force,
            yes,
            concurrency,
            dry_run,
            hierarchy,
        } => {
            cmd_sync(
                registry,
                &config,
                pattern,
                path,
                provider,
                if force { UpdateMode::Force } else { UpdateMode::Pull },
                yes,
                concurrency,
                dry_run,
                !hierarchy,
            )
            .await
        }
        Commands::List {
            query,
            provider,
            format,
            limit,
        } => cmd_list(registry, query, provider, format, limit).await,
        Commands::CloneAll {
            pattern,
            path,
            provider,
            concurrency,
        } => {
            warn!("clone-all is deprecated; use `mgit sync --update-mode skip` instead");
            cmd_sync(
                registry,
                &config,
                pattern,
                path,
                provider,
                UpdateMode::Skip,
                true,
                concurrency,
                false,
                false,
            )
            .await
        }
        Commands::PullAll {
            pattern,
            path,
            provider,
            concurrency,
        } => {
            warn!("pull-all is deprecated; use `mgit sync --update-mode pull` instead");
            cmd_sync(
                registry,
                &config,
                pattern,
                path,
                provider,
                UpdateMode::Pull,
                true,
                concurrency,
                false,
                false,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_sync(
    registry: Arc<ProviderRegistry>,
    config: &Config,
    pattern: String,
    path: Option<PathBuf>,
    provider: Option<String>,
    update_mode: UpdateMode,
    skip_confirmation: bool,
    concurrency: Option<usize>,
    dry_run: bool,
    layout_flat: bool,
) -> Result<i32> {
    let target_root = match path {
        Some(p) => p,
        None => PathBuf::from(
            shellexpand::full(&config.base_directory)?.into_owned(),
        ),
    };

    let options = SyncOptions {
        query: pattern,
        explicit_provider: provider,
        explicit_url: None,
        target_root,
        concurrency: concurrency.unwrap_or(config.sync.max_parallel),
        update_mode,
        layout_flat,
        dry_run,
        confirmed_force: skip_confirmation,
        op_timeout: Duration::from_secs(config.sync.timeout_secs),
        max_retries: config.sync.max_retries,
        fast_forward_only: config.sync.fast_forward_only,
    };

    let orchestrator = SyncOrchestrator::new(registry);
    let summary = orchestrator
        .run(options, || skip_confirmation || confirm_force_reclone())
        .await?;

    let Some(summary) = summary else {
        println!("no repositories found");
        return Ok(0);
    };

    println!(
        "{} total, {} succeeded, {} skipped, {} failed ({:.1}s)",
        summary.total_repositories,
        summary.successful,
        summary.skipped,
        summary.failed,
        summary.duration.as_secs_f64()
    );

    for outcome in &summary.outcomes {
        if outcome.result == engine::OperationResult::Failed {
            println!(
                "  FAILED {} ({:?}): {}",
                outcome.name,
                outcome.action_attempted,
                outcome.reason.as_deref().unwrap_or("unknown error")
            );
        }
    }

    for (provider, reason) in &summary.failed_providers {
        println!("  provider '{provider}' failed: {reason}");
    }

    Ok(summary.exit_code())
}

fn confirm_force_reclone() -> bool {
    print!("This will delete and re-clone existing directories. Continue? [y/N] ");
    std::io::stdout().flush().ok();
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn cmd_list(
    registry: Arc<ProviderRegistry>,
    query: String,
    provider: Option<String>,
    format: ListFormat,
    limit: Option<usize>,
) -> Result<i32> {
    let resolver = MultiProviderResolver::new(registry, 4);
    let result = resolver.resolve(&query, provider.as_deref(), None).await?;

    let repos = match limit {
        Some(n) => result.repositories.into_iter().take(n).collect::<Vec<_>>(),
        None => result.repositories,
    };

    match format {
        ListFormat::Table => {
            println!("Repositories ({}):", repos.len());
            for repo in &repos {
                let marker = if repo.is_disabled { " (disabled)" } else { "" };
                println!("  {} [{}]{}", repo.name, repo.provider, marker);
            }
        }
        ListFormat::Json => {
            let names: Vec<_> = repos
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "name": r.name,
                        "clone_url": r.clone_url,
                        "provider": r.provider.to_string(),
                        "is_disabled": r.is_disabled,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&names)?);
        }
    }

    for (provider, reason) in &result.failed_providers {
        warn!(provider, reason, "provider failed during list resolution");
    }

    if repos.is_empty() {
        info!("no repositories found");
    }

    Ok(if result.failed_providers.is_empty() { 0 } else { 1 })
}
