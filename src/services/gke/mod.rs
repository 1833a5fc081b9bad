//! Google Cloud authentication through the gcloud CLI
//!
//! Login produces a [`Session`] value that the update workflow carries
//! around, instead of relying on whatever gcloud happens to have cached.

use crate::utils::exec;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// How the session was established
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMethod {
    ServiceAccount(PathBuf),
    Interactive,
    Skipped,
}

/// Authenticated provider session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub method: LoginMethod,
    /// Active account reported by the provider, when known
    pub account: Option<String>,
}

impl Session {
    pub fn skipped() -> Self {
        Self {
            method: LoginMethod::Skipped,
            account: None,
        }
    }
}

/// Establishes a provider session
pub trait SessionManager {
    fn login(&self, service_account: Option<&Path>, skip_login: bool) -> Result<Session>;
}

/// IAM changes can take over a minute to propagate after a key is activated
pub const DEFAULT_ACTIVATION_ATTEMPTS: u32 = 10;
pub const DEFAULT_ACTIVATION_DELAY: Duration = Duration::from_secs(10);

pub struct Gcloud {
    binary: PathBuf,
    activation_attempts: u32,
    activation_delay: Duration,
}

impl Gcloud {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            activation_attempts: DEFAULT_ACTIVATION_ATTEMPTS,
            activation_delay: DEFAULT_ACTIVATION_DELAY,
        }
    }

    pub fn with_activation_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.activation_attempts = attempts.max(1);
        self.activation_delay = delay;
        self
    }

    fn activate_service_account(&self, key_file: &Path) -> Result<Session> {
        info!("Activating service account {}", key_file.display());
        if !key_file.exists() {
            anyhow::bail!(
                "Unable to locate service account {}",
                key_file.display()
            );
        }

        exec::execute(&self.binary, &activate_args(key_file))?
            .ensure_success("gcloud auth activate-service-account")?;

        let account = self
            .wait_for_active_account()
            .context("Service account was activated but never became the active account")?;
        info!("Logged in as {}", account);

        Ok(Session {
            method: LoginMethod::ServiceAccount(key_file.to_path_buf()),
            account: Some(account),
        })
    }

    fn wait_for_active_account(&self) -> Result<String> {
        let mut last_error = None;
        for attempt in 1..=self.activation_attempts {
            match self.active_account() {
                Ok(Some(account)) => return Ok(account),
                Ok(None) => debug!(attempt, "no active gcloud account yet"),
                Err(e) => {
                    debug!(attempt, err = %e, "gcloud auth list failed");
                    last_error = Some(e);
                }
            }
            if attempt < self.activation_attempts {
                thread::sleep(self.activation_delay);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => anyhow::bail!(
                "no active account after {} attempts",
                self.activation_attempts
            ),
        }
    }

    fn active_account(&self) -> Result<Option<String>> {
        let output = exec::execute(&self.binary, &auth_list_args())?;
        output.ensure_success("gcloud auth list")?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }

    fn interactive_login(&self) -> Result<Session> {
        let status = exec::execute_interactive(&self.binary, &login_args())?;
        if !status.success() {
            anyhow::bail!(
                "gcloud auth login failed with exit code: {}",
                status.code().unwrap_or(1)
            );
        }

        Ok(Session {
            method: LoginMethod::Interactive,
            account: self.active_account().ok().flatten(),
        })
    }
}

impl SessionManager for Gcloud {
    fn login(&self, service_account: Option<&Path>, skip_login: bool) -> Result<Session> {
        match service_account {
            Some(key_file) if !key_file.as_os_str().is_empty() => {
                self.activate_service_account(key_file)
            }
            _ if skip_login => {
                debug!("skipping gcloud login");
                Ok(Session::skipped())
            }
            _ => self.interactive_login(),
        }
    }
}

fn activate_args(key_file: &Path) -> Vec<String> {
    vec![
        "auth".to_string(),
        "activate-service-account".to_string(),
        "--key-file".to_string(),
        key_file.display().to_string(),
    ]
}

fn auth_list_args() -> Vec<String> {
    vec![
        "auth".to_string(),
        "list".to_string(),
        "--filter=status:ACTIVE".to_string(),
        "--format=value(account)".to_string(),
    ]
}

fn login_args() -> Vec<String> {
    vec!["auth".to_string(), "login".to_string(), "--brief".to_string()]
}
