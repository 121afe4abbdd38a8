//! Error taxonomy shared across the resolver, providers, and the bulk engine.
//!
//! Most application code still returns `anyhow::Result` the way the rest of this
//! crate does, but callers that need to branch on *kind* (fail-fast on bad
//! configuration vs. recording a per-provider failure and continuing) match on
//! [`MgitError`] instead of string-sniffing an opaque error chain.

use std::path::PathBuf;
use thiserror::Error;

/// The kinds of failure this crate distinguishes. See the propagation policy
/// in the component design: `Configuration` and `CollisionResolution` are the
/// only two variants that bubble out of a `sync` run; everything else is
/// caught at a provider or per-repo boundary and folded into a summary.
#[derive(Debug, Error)]
pub enum MgitError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication failed for provider '{provider}': {message}")]
    Authentication { provider: String, message: String },

    #[error("connection error to provider '{provider}': {message}")]
    Connection { provider: String, message: String },

    #[error("rate limit exceeded for provider '{provider}': would need to wait {wait_secs}s, over the {max_wait_secs}s budget")]
    RateLimit {
        provider: String,
        wait_secs: u64,
        max_wait_secs: u64,
    },

    #[error("provider '{provider}' API error: {message}")]
    ProviderApi { provider: String, message: String },

    #[error("git clone failed for {path}: {message}")]
    GitClone { path: PathBuf, message: String },

    #[error("git pull failed for {path}: {message}")]
    GitPull { path: PathBuf, message: String },

    #[error("cannot resolve directory name collision: {0}")]
    CollisionResolution(String),

    #[error("operation cancelled")]
    UserCancelled,
}

impl MgitError {
    /// `true` for the two variants the spec requires to propagate out of
    /// `sync` rather than being caught at a provider/repo boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MgitError::Configuration(_) | MgitError::CollisionResolution(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MgitError>;
