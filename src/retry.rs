//! Transient-vs-permanent git failure classification and the retry loop
//! built on top of it.
//!
//! New relative to the teacher (which did not retry failed git operations);
//! grounded in the general shape of the retry/backoff handling in
//! `mgit/providers/base.py` (`_retry_count`/`_increment_retry_count`),
//! applied here to git subprocess failures rather than provider API calls.

use crate::error::{MgitError, Result};
use crate::ratelimit::RateLimitGate;
use std::future::Future;

/// Whether a git failure is worth retrying.
///
/// An authentication failure, a missing repository, or a non-fast-forward
/// rejection is permanent — retrying changes nothing. Everything else,
/// including failures this list doesn't yet name (an unusual proxy error,
/// a TLS handshake hiccup), is assumed transient and retried.
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    const PERMANENT_MARKERS: &[&str] = &[
        "not found",
        "authentication failed",
        "could not read username",
        "permission denied",
        "rejected",
        "non-fast-forward",
    ];
    !PERMANENT_MARKERS.iter().any(|m| lower.contains(m))
}

fn error_message(err: &MgitError) -> String {
    match err {
        MgitError::GitClone { message, .. } | MgitError::GitPull { message, .. } => {
            message.clone()
        }
        other => other.to_string(),
    }
}

/// Run `operation`, retrying up to `max_retries` times with the gate's
/// exponential backoff when the failure is classified transient. Permanent
/// failures and exhausted retries both return the last error.
pub async fn with_retry<F, Fut, T>(
    gate: &RateLimitGate,
    max_retries: u32,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                gate.reset_retry_count();
                return Ok(value);
            }
            Err(err) if attempt < max_retries && is_transient(&error_message(&err)) => {
                attempt += 1;
                gate.backoff().await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn classifies_network_errors_as_transient() {
        assert!(is_transient("fatal: unable to access: Could not resolve host: github.com"));
        assert!(is_transient("error: RPC failed; curl 56"));
    }

    #[test]
    fn classifies_auth_and_notfound_as_permanent() {
        assert!(!is_transient("fatal: Authentication failed"));
        assert!(!is_transient("fatal: repository not found"));
        assert!(!is_transient(
            "! [rejected] main -> main (non-fast-forward)"
        ));
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_the_limit() {
        let gate = RateLimitGate::new("test", crate::config::RateLimitConfig::default());
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&gate, 2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(MgitError::GitPull {
                        path: Default::default(),
                        message: "Could not resolve host: github.com".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        let gate = RateLimitGate::new("test", crate::config::RateLimitConfig::default());
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(&gate, 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(MgitError::GitPull {
                    path: Default::default(),
                    message: "Authentication failed".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
