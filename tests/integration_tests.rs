//! End-to-end CLI tests: spawn the actual `mgit` binary and check its
//! behavior without any configured providers (no network access required).

mod common;

use common::{assert_contains_all, TestEnvironment};
use std::process::Command;

fn mgit(env: &TestEnvironment, args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .env("HOME", env.temp_dir.path())
        .env("XDG_CONFIG_HOME", env.temp_dir.path())
        .output()
        .expect("failed to execute mgit")
}

#[test]
fn test_cli_help() {
    let env = TestEnvironment::new();
    let output = mgit(&env, &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains_all(&stdout, &["sync", "list", "clone-all", "pull-all"]);
}

#[test]
fn test_cli_version() {
    let env = TestEnvironment::new();
    let output = mgit(&env, &["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mgit"));
}

#[test]
fn test_list_with_no_providers_configured_reports_zero_repositories() {
    let env = TestEnvironment::new();
    let providers_path = env.write_providers_yaml("providers: {}\n");

    let output = mgit(
        &env,
        &[
            "--config",
            providers_path.to_str().unwrap(),
            "list",
            "*/*/*",
        ],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Repositories (0)"));
}

#[test]
fn test_list_json_format_with_no_providers_is_empty_array() {
    let env = TestEnvironment::new();
    let providers_path = env.write_providers_yaml("providers: {}\n");

    let output = mgit(
        &env,
        &[
            "--config",
            providers_path.to_str().unwrap(),
            "list",
            "*/*/*",
            "--format",
            "json",
        ],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "[]");
}

#[test]
fn test_list_unknown_provider_name_fails_with_nonzero_exit() {
    let env = TestEnvironment::new();
    let providers_path = env.write_providers_yaml("providers: {}\n");

    let output = mgit(
        &env,
        &[
            "--config",
            providers_path.to_str().unwrap(),
            "list",
            "*/*/*",
            "--provider",
            "does-not-exist",
        ],
    );

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_sync_with_no_repositories_found_is_a_clean_noop() {
    let env = TestEnvironment::new();
    let providers_path = env.write_providers_yaml("providers: {}\n");
    let target = env.temp_dir.path().join("checkouts");

    let output = mgit(
        &env,
        &[
            "--config",
            providers_path.to_str().unwrap(),
            "sync",
            "*/*/*",
            target.to_str().unwrap(),
        ],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no repositories found"));
    assert!(!target.join("anything").exists());
}

#[test]
fn test_clone_all_and_pull_all_are_accepted_as_deprecated_aliases() {
    let env = TestEnvironment::new();
    let providers_path = env.write_providers_yaml("providers: {}\n");
    let target = env.temp_dir.path().join("checkouts");

    for subcommand in ["clone-all", "pull-all"] {
        let output = mgit(
            &env,
            &[
                "--config",
                providers_path.to_str().unwrap(),
                subcommand,
                "*/*/*",
                target.to_str().unwrap(),
            ],
        );
        assert!(output.status.success(), "{subcommand} should still succeed as a no-op");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("deprecated"), "{subcommand} should warn about deprecation");
    }
}
