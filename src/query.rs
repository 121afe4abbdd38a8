//! Query pattern parsing and glob matching over the three-segment
//! `org/project/repo` namespace.
//!
//! Grounded in `mgit/utils/query_parser.py` and `mgit/utils/pattern_matching.py`
//! from the original implementation: provider-aware segment padding (GitHub and
//! Bitbucket collapse the middle segment since they have no project tier) and
//! glob matching with a prefix-match fallback for bare organization names.

use crate::error::{MgitError, Result};

const VALID_QUERY_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789*?/-_.";

/// A parsed three-segment query pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPattern {
    pub org_pattern: String,
    pub project_pattern: String,
    pub repo_pattern: String,
    pub provider_type: Option<ProviderKind>,
}

/// Provider family, used only to decide how many namespace tiers a query has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    AzureDevOps,
    GitHub,
    Bitbucket,
}

impl ProviderKind {
    fn has_project_tier(self) -> bool {
        matches!(self, ProviderKind::AzureDevOps)
    }
}

impl QueryPattern {
    /// Parse `query` into org/project/repo segments.
    ///
    /// Splits on `/`, rejects more than three segments, pads missing segments
    /// with `*`. For two-tier providers (GitHub, Bitbucket) the remainder of
    /// the query after the first segment becomes the repo pattern verbatim
    /// (so repo names containing `/` still work), and the project segment is
    /// forced to `*`.
    pub fn parse(query: &str, provider_type: Option<ProviderKind>) -> Result<Self> {
        validate(query)?;

        let segments: Vec<&str> = query.split('/').collect();
        let org_pattern = segments.first().copied().unwrap_or("*");

        let (project_pattern, repo_pattern) = match provider_type {
            Some(p) if !p.has_project_tier() => {
                let repo = if segments.len() > 1 {
                    segments[1..].join("/")
                } else {
                    "*".to_string()
                };
                ("*".to_string(), repo)
            }
            _ => {
                let project = segments.get(1).copied().unwrap_or("*");
                let repo = segments.get(2).copied().unwrap_or("*");
                (project.to_string(), repo.to_string())
            }
        };

        let non_empty = |s: String| if s.is_empty() { "*".to_string() } else { s };

        Ok(QueryPattern {
            org_pattern: non_empty(org_pattern.to_string()),
            project_pattern: non_empty(project_pattern),
            repo_pattern: non_empty(repo_pattern),
            provider_type,
        })
    }

    pub fn has_org_filter(&self) -> bool {
        self.org_pattern != "*"
    }

    /// Suppressed for providers without a project tier.
    pub fn has_project_filter(&self) -> bool {
        match self.provider_type {
            Some(p) if !p.has_project_tier() => false,
            _ => self.project_pattern != "*",
        }
    }

    pub fn has_repo_filter(&self) -> bool {
        self.repo_pattern != "*"
    }

    /// `true` when any segment contains a wildcard character.
    pub fn has_wildcards(&self) -> bool {
        [&self.org_pattern, &self.project_pattern, &self.repo_pattern]
            .into_iter()
            .any(|s| s.contains('*') || s.contains('?'))
    }
}

/// Validate query syntax without parsing it into segments.
pub fn validate(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(MgitError::Configuration("query cannot be empty".into()));
    }

    if let Some(bad) = query.chars().find(|c| !VALID_QUERY_CHARS.contains(*c)) {
        return Err(MgitError::Configuration(format!(
            "invalid character '{bad}' in query '{query}'"
        )));
    }

    let segment_count = query.split('/').count();
    if segment_count > 3 {
        return Err(MgitError::Configuration(format!(
            "query must have at most 3 segments separated by '/', got {segment_count}"
        )));
    }

    Ok(())
}

/// Glob-match `text` against `glob` (`*` = any run, `?` = one char).
///
/// When `glob` contains no wildcard characters and the direct match fails,
/// retries as a prefix match (`glob` followed by `*`). This lets a bare
/// organization name like `"myorg"` match a discovered host name like
/// `"myorg.visualstudio.com"`. The fallback never fires when the glob already
/// contains a wildcard, so `"foo*"` does not spuriously match `"foo*x"`.
pub fn matches(text: &str, glob: &str, case_sensitive: bool) -> bool {
    let (text, glob) = if case_sensitive {
        (text.to_string(), glob.to_string())
    } else {
        (text.to_lowercase(), glob.to_lowercase())
    };

    if glob_match(&text, &glob) {
        return true;
    }

    let has_wildcard = glob.contains('*') || glob.contains('?');
    if !has_wildcard {
        let prefixed = format!("{glob}*");
        return glob_match(&text, &prefixed);
    }

    false
}

/// Minimal `*`/`?` glob matcher (no character classes, no escaping — the
/// query grammar restricts input to `[A-Za-z0-9_.\-*?]` so none are needed).
fn glob_match(text: &str, glob: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let g: Vec<char> = glob.chars().collect();
    glob_match_rec(&t, &g)
}

fn glob_match_rec(text: &[char], glob: &[char]) -> bool {
    match glob.first() {
        None => text.is_empty(),
        Some('*') => {
            // Try consuming zero or more chars of text for this '*'.
            glob_match_rec(text, &glob[1..])
                || (!text.is_empty() && glob_match_rec(&text[1..], glob))
        }
        Some('?') => !text.is_empty() && glob_match_rec(&text[1..], &glob[1..]),
        Some(c) => !text.is_empty() && text[0] == *c && glob_match_rec(&text[1..], &glob[1..]),
    }
}
