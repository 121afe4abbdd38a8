/// Common test utilities shared by the CLI integration tests.
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

/// An isolated `XDG_CONFIG_HOME`, restored on drop so tests don't leak
/// environment mutations into each other.
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub original_env: Vec<(String, Option<String>)>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config_dir = temp_dir.path().join("mgit");
        std::fs::create_dir_all(&config_dir).expect("failed to create config dir");

        let env_vars = ["XDG_CONFIG_HOME", "HOME"];
        let original_env = env_vars
            .iter()
            .map(|var| (var.to_string(), env::var(var).ok()))
            .collect();

        Self {
            temp_dir,
            config_dir,
            original_env,
        }
    }

    pub fn set_config_dir(&self) {
        env::set_var("XDG_CONFIG_HOME", self.temp_dir.path());
    }

    pub fn write_providers_yaml(&self, content: &str) -> PathBuf {
        let path = self.config_dir.join("providers.yml");
        std::fs::write(&path, content).expect("failed to write providers.yml");
        path
    }

    pub fn write_config_yaml(&self, content: &str) -> PathBuf {
        let path = self.config_dir.join("config.yml");
        std::fs::write(&path, content).expect("failed to write config.yml");
        path
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        for (key, value) in &self.original_env {
            match value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "expected output to contain '{item}', got: {text}"
        );
    }
}
