//! On-disk path derivation and collision resolution for the flat/hierarchical
//! repository layout.
//!
//! Grounded in `mgit/git/utils.py` (`build_repo_path`, `sanitize_path_segment`,
//! `sanitize_repo_name`) and `mgit/utils/collision_resolver.py`
//! (`resolve_collision_names`, `_resolve_collision_group`, `_resolve_with_provider`,
//! `_simplify_host`) from the original implementation.

use crate::error::{MgitError, Result};
use crate::provider::Repository;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const WINDOWS_RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Sanitize a single path segment for safe, portable filesystem usage.
pub fn sanitize_segment(segment: &str) -> String {
    let mut s: String = segment
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !"<>:\"|?*".contains(*c))
        .collect();

    s = s.replace(['/', '\\'], "-");

    while s.ends_with('.') {
        s.pop();
    }

    if s.is_empty() {
        return "unnamed".to_string();
    }

    if WINDOWS_RESERVED.iter().any(|r| r.eq_ignore_ascii_case(&s)) {
        s.push('_');
    }

    s
}

struct ParsedCloneUrl {
    host: String,
    segments: Vec<String>,
}

/// Parse a clone URL into a host and a list of raw (un-sanitized) path
/// segments, applying the Azure DevOps `DefaultCollection`/`_git` stripping
/// rules and trailing-`.git` removal.
fn parse_clone_url(clone_url: &str) -> Option<ParsedCloneUrl> {
    let (host, raw_path) = split_host_and_path(clone_url)?;
    let decoded = urlencoding::decode(&raw_path).ok()?.into_owned();

    let mut segments: Vec<String> = decoded
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('_'))
        .map(|s| s.to_string())
        .collect();

    let is_azure_host =
        host.ends_with("visualstudio.com") || host.ends_with("dev.azure.com");
    if is_azure_host {
        if let Some(first) = segments.first() {
            if first.eq_ignore_ascii_case("DefaultCollection") {
                segments.remove(0);
            }
        }
    }

    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = last.strip_suffix(".git") {
            *last = stripped.to_string();
        }
    }

    Some(ParsedCloneUrl { host, segments })
}

/// Split `scheme://[user[:pass]@]host[:port]/path` into `(host, path)`
/// without pulling in a full URL crate — the core only ever needs the
/// authority and path components of git clone URLs.
fn split_host_and_path(url: &str) -> Option<(String, String)> {
    let rest = url.splitn(2, "://").nth(1)?;
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);
    Some((host.to_string(), path.trim_start_matches('/').to_string()))
}

/// Derive the on-disk path for a repository from its clone URL.
///
/// - Hierarchical (`flat=false`): `host/orgSegments…/repoName`.
/// - Flat (`flat=true`): just the sanitized final path segment (repo name).
/// - On parse failure: falls back to a single sanitized segment derived from
///   `fallback_name`.
pub fn build_repo_path(clone_url: &str, flat: bool, fallback_name: &str) -> PathBuf {
    match parse_clone_url(clone_url) {
        Some(parsed) if !parsed.segments.is_empty() => {
            if flat {
                let name = parsed.segments.last().unwrap();
                PathBuf::from(sanitize_segment(name))
            } else {
                let mut path = PathBuf::from(sanitize_segment(&parsed.host));
                for seg in &parsed.segments {
                    path.push(sanitize_segment(seg));
                }
                path
            }
        }
        _ => PathBuf::from(sanitize_segment(fallback_name)),
    }
}

/// Simplify a hostname to a short provider identifier for collision suffixes.
fn simplify_host(host: &str) -> String {
    let lower = host.to_lowercase();
    if lower.contains("github") {
        "github".to_string()
    } else if lower.contains("azure") || lower.contains("visualstudio") {
        "azure".to_string()
    } else if lower.contains("bitbucket") {
        "bitbucket".to_string()
    } else if lower.contains("gitlab") {
        "gitlab".to_string()
    } else {
        host.split('.').next().unwrap_or(host).to_string()
    }
}

/// Extract `(host, org, repo_name)` for collision disambiguation. `org` is
/// the first meaningful path segment (organization, or Azure DevOps project
/// owner) of the clone URL.
fn repo_components(clone_url: &str) -> Option<(String, String, String)> {
    let parsed = parse_clone_url(clone_url)?;
    if parsed.segments.len() < 2 {
        return None;
    }
    let org = parsed.segments[0].clone();
    let name = parsed.segments.last().unwrap().clone();
    Some((parsed.host, org, name))
}

/// Resolve unique on-disk directory names for a set of discovered
/// repositories, for use with the flat layout.
///
/// Groups repositories by base name (the sanitized final clone-URL segment).
/// Singleton groups keep the base name. Colliding groups first try
/// `base_org`; if that still collides, `base_simpleHost_org`; if that is
/// still not unique, a numeric suffix `_2`, `_3`, … is appended in discovery
/// order. Fails with [`MgitError::CollisionResolution`] if any colliding
/// repo's clone URL cannot be parsed for org/host.
pub fn resolve_collision_names(repos: &[Repository]) -> Result<HashMap<String, String>> {
    let mut groups: HashMap<String, Vec<&Repository>> = HashMap::new();
    for repo in repos {
        let base = base_name(repo);
        groups.entry(base).or_default().push(repo);
    }

    let mut resolved = HashMap::new();

    for (base_name, group) in groups {
        if group.len() == 1 {
            resolved.insert(group[0].clone_url.clone(), base_name);
            continue;
        }
        resolve_collision_group(&base_name, &group, &mut resolved)?;
    }

    Ok(resolved)
}

fn base_name(repo: &Repository) -> String {
    match parse_clone_url(&repo.clone_url) {
        Some(p) if !p.segments.is_empty() => sanitize_segment(p.segments.last().unwrap()),
        _ => sanitize_segment(&repo.name),
    }
}

fn resolve_collision_group(
    base_name: &str,
    group: &[&Repository],
    resolved: &mut HashMap<String, String>,
) -> Result<()> {
    let mut org_groups: HashMap<String, Vec<&Repository>> = HashMap::new();

    for repo in group {
        let (_, org, _) = repo_components(&repo.clone_url).ok_or_else(|| {
            MgitError::CollisionResolution(format!(
                "cannot parse clone URL for collision resolution: {}",
                repo.clone_url
            ))
        })?;
        let candidate = format!("{base_name}_{}", sanitize_segment(&org));
        org_groups.entry(candidate).or_default().push(repo);
    }

    for (candidate, org_group) in org_groups {
        if org_group.len() == 1 {
            resolved.insert(org_group[0].clone_url.clone(), candidate);
        } else {
            resolve_with_provider(base_name, &org_group, resolved)?;
        }
    }

    Ok(())
}

fn resolve_with_provider(
    base_name: &str,
    group: &[&Repository],
    resolved: &mut HashMap<String, String>,
) -> Result<()> {
    let mut used: HashSet<String> = HashSet::new();

    for repo in group {
        let (host, org, _) = repo_components(&repo.clone_url).ok_or_else(|| {
            MgitError::CollisionResolution(format!(
                "cannot parse clone URL for collision resolution: {}",
                repo.clone_url
            ))
        })?;
        let candidate = format!(
            "{base_name}_{}_{}",
            simplify_host(&host),
            sanitize_segment(&org)
        );

        let mut final_name = candidate.clone();
        let mut counter = 2;
        while used.contains(&final_name) {
            final_name = format!("{candidate}_{counter}");
            counter += 1;
        }

        used.insert(final_name.clone());
        resolved.insert(repo.clone_url.clone(), final_name);
    }

    Ok(())
}

/// A repository identity used for dedup keying: `(host, org, name)`,
/// collapsing trailing `.git` variants. See [`crate::resolver`].
pub fn repo_identity(clone_url: &str) -> Option<(String, String, String)> {
    repo_components(clone_url)
}

/// Check whether `path` is an existing, non-empty git repository
/// (has a `.git` directory). Cheap filesystem check used by the path
/// layer and the bulk engine alike.
pub fn is_git_repository(path: &Path) -> bool {
    path.join(".git").is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderType;

    fn repo(clone_url: &str, name: &str) -> Repository {
        Repository {
            name: name.to_string(),
            clone_url: clone_url.to_string(),
            ssh_url: None,
            is_disabled: false,
            is_private: true,
            default_branch: "main".to_string(),
            description: None,
            provider: ProviderType::GitHub,
            metadata: Default::default(),
        }
    }

    #[test]
    fn hierarchical_path_strips_git_suffix_and_collection() {
        let path = build_repo_path(
            "https://dev.azure.com/DefaultCollection/myorg/_git/myrepo.git",
            false,
            "myrepo",
        );
        assert_eq!(path, PathBuf::from("dev.azure.com/myorg/myrepo"));
    }

    #[test]
    fn flat_path_is_just_repo_name() {
        let path = build_repo_path("https://github.com/org/repo.git", true, "repo");
        assert_eq!(path, PathBuf::from("repo"));
    }

    #[test]
    fn sanitize_removes_forbidden_chars_and_reserved_names() {
        assert_eq!(sanitize_segment("CON"), "CON_");
        assert_eq!(sanitize_segment("a<b>c"), "abc");
        assert_eq!(sanitize_segment("trailing.."), "trailing");
        assert_eq!(sanitize_segment(""), "unnamed");
    }

    #[test]
    fn no_collision_keeps_base_name() {
        let repos = vec![repo("https://github.com/org/auth.git", "auth")];
        let resolved = resolve_collision_names(&repos).unwrap();
        assert_eq!(resolved[&repos[0].clone_url], "auth");
    }

    #[test]
    fn collision_disambiguates_by_org() {
        let repos = vec![
            repo("https://github.com/org-a/auth.git", "auth"),
            repo("https://github.com/org-b/auth.git", "auth"),
        ];
        let resolved = resolve_collision_names(&repos).unwrap();
        let mut names: Vec<&String> = resolved.values().collect();
        names.sort();
        assert_eq!(names, vec!["auth_org-a", "auth_org-b"]);
    }

    #[test]
    fn resolved_names_are_unique() {
        let repos = vec![
            repo("https://github.com/org/auth.git", "auth"),
            repo("https://gitlab.com/org/auth.git", "auth"),
            repo("https://bitbucket.org/org/auth.git", "auth"),
        ];
        let resolved = resolve_collision_names(&repos).unwrap();
        let mut names: Vec<&String> = resolved.values().collect();
        let unique: HashSet<&&String> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        names.sort();
        assert_eq!(names, vec!["auth_bitbucket_org", "auth_github_org", "auth_gitlab_org"]);
    }
}
