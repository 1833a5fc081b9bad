use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::gke::{DEFAULT_ACTIVATION_ATTEMPTS, DEFAULT_ACTIVATION_DELAY};

const CONFIG_DIR_NAME: &str = "jx-terraform";
const CONFIG_FILE_NAME: &str = "config.toml";

const TERRAFORM_BINARY_ENV: &str = "JX_TERRAFORM_BINARY";
const GCLOUD_BINARY_ENV: &str = "JX_GCLOUD_BINARY";
const BATCH_MODE_ENV: &str = "JX_BATCH_MODE";

const DEFAULT_TERRAFORM_BINARY: &str = "terraform";
const DEFAULT_GCLOUD_BINARY: &str = "gcloud";

/// Optional settings read from `~/.config/jx-terraform/config.toml`
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    pub terraform_binary: Option<String>,
    pub gcloud_binary: Option<String>,
    pub batch_mode: Option<bool>,
    pub login_attempts: Option<u32>,
    pub login_retry_secs: Option<u64>,
}

/// Settings after layering the config file, environment and command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub home_dir: PathBuf,
    pub terraform_binary: String,
    pub gcloud_binary: String,
    pub batch_mode: bool,
    pub login_attempts: u32,
    pub login_retry_delay: Duration,
}

impl Settings {
    /// Precedence: command line, then environment, then config file, then defaults
    pub fn resolve(
        home_dir: PathBuf,
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        batch_flag: bool,
    ) -> Self {
        let terraform_binary = env(TERRAFORM_BINARY_ENV)
            .filter(|v| !v.is_empty())
            .or(file.terraform_binary)
            .unwrap_or_else(|| DEFAULT_TERRAFORM_BINARY.to_string());
        let gcloud_binary = env(GCLOUD_BINARY_ENV)
            .filter(|v| !v.is_empty())
            .or(file.gcloud_binary)
            .unwrap_or_else(|| DEFAULT_GCLOUD_BINARY.to_string());
        let batch_mode = batch_flag
            || env(BATCH_MODE_ENV)
                .and_then(|v| parse_bool(&v))
                .or(file.batch_mode)
                .unwrap_or(false);

        Self {
            home_dir,
            terraform_binary,
            gcloud_binary,
            batch_mode,
            login_attempts: file.login_attempts.unwrap_or(DEFAULT_ACTIVATION_ATTEMPTS),
            login_retry_delay: file
                .login_retry_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ACTIVATION_DELAY),
        }
    }

    /// Load everything from the real environment
    pub fn load(batch_flag: bool) -> Result<Self> {
        let home_dir = get_home_dir()?;
        let file = load_config(&config_file_path(&home_dir))?;
        Ok(Self::resolve(
            home_dir,
            file,
            |key| std::env::var(key).ok(),
            batch_flag,
        ))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn get_home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE")) // Windows fallback
        .or_else(|_| -> Result<String, std::env::VarError> {
            let username = whoami::username();
            if cfg!(target_os = "macos") {
                Ok(format!("/Users/{}", username))
            } else {
                Ok(format!("/home/{}", username))
            }
        })
        .map(PathBuf::from)
        .with_context(|| "Could not determine home directory")
}

pub fn config_file_path(home_dir: &Path) -> PathBuf {
    home_dir
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// A missing file is an empty config; a malformed one is an error
pub fn load_config(config_path: &Path) -> Result<FileConfig> {
    if !config_path.exists() {
        return Ok(FileConfig::default());
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(
            PathBuf::from("/home/op"),
            FileConfig::default(),
            env_from(&[]),
            false,
        );
        assert_eq!(settings.home_dir, PathBuf::from("/home/op"));
        assert_eq!(settings.terraform_binary, "terraform");
        assert_eq!(settings.gcloud_binary, "gcloud");
        assert!(!settings.batch_mode);
        assert_eq!(settings.login_attempts, 10);
        assert_eq!(settings.login_retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            terraform_binary: Some("/opt/tf/terraform".to_string()),
            gcloud_binary: Some("/opt/gcloud/bin/gcloud".to_string()),
            batch_mode: Some(false),
            login_attempts: Some(3),
            login_retry_secs: Some(1),
        };
        let settings = Settings::resolve(
            PathBuf::from("/h"),
            file,
            env_from(&[
                (TERRAFORM_BINARY_ENV, "/usr/local/bin/terraform"),
                (BATCH_MODE_ENV, "yes"),
            ]),
            false,
        );
        assert_eq!(settings.terraform_binary, "/usr/local/bin/terraform");
        assert_eq!(settings.gcloud_binary, "/opt/gcloud/bin/gcloud");
        assert!(settings.batch_mode);
        assert_eq!(settings.login_attempts, 3);
        assert_eq!(settings.login_retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_batch_flag_wins() {
        let settings = Settings::resolve(
            PathBuf::from("/h"),
            FileConfig {
                batch_mode: Some(false),
                ..Default::default()
            },
            env_from(&[(BATCH_MODE_ENV, "false")]),
            true,
        );
        assert!(settings.batch_mode);
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let settings = Settings::resolve(
            PathBuf::from("/h"),
            FileConfig::default(),
            env_from(&[(GCLOUD_BINARY_ENV, "")]),
            false,
        );
        assert_eq!(settings.gcloud_binary, "gcloud");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("sometimes"), None);
    }

    #[test]
    fn test_load_config_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&config_file_path(dir.path())).unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_load_config_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "terraform_binary = \"/opt/terraform\"\nbatch_mode = true\nlogin_attempts = 2\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.terraform_binary.as_deref(), Some("/opt/terraform"));
        assert_eq!(config.batch_mode, Some(true));
        assert_eq!(config.login_attempts, Some(2));
        assert_eq!(config.gcloud_binary, None);
    }

    #[test]
    fn test_load_config_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "batch_mode = \"not a bool").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
