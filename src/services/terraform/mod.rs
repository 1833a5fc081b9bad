//! Terraform invocations for an existing plan directory

use crate::utils::exec;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The init/plan/apply lifecycle of the plan tool.
///
/// Failures are returned as-is; nothing here retries, since a failed apply
/// may already have changed real infrastructure.
pub trait PlanRunner {
    fn init(&self, plan_dir: &Path) -> Result<()>;
    fn plan(&self, state_file: &Path, vars_file: &Path, plan_dir: &Path) -> Result<()>;
    fn apply(&self, state_file: &Path, vars_file: &Path, plan_dir: &Path) -> Result<()>;
}

pub struct Terraform {
    binary: PathBuf,
}

impl Terraform {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl PlanRunner for Terraform {
    fn init(&self, plan_dir: &Path) -> Result<()> {
        let output = exec::execute(&self.binary, &init_args(plan_dir))?;
        debug!(output = %output.combined(), "terraform init finished");
        output.ensure_success("terraform init")
    }

    fn plan(&self, state_file: &Path, vars_file: &Path, plan_dir: &Path) -> Result<()> {
        exec::execute_streaming(&self.binary, &plan_args(state_file, vars_file, plan_dir))?
            .ensure_success("terraform plan")
    }

    fn apply(&self, state_file: &Path, vars_file: &Path, plan_dir: &Path) -> Result<()> {
        exec::execute_streaming(&self.binary, &apply_args(state_file, vars_file, plan_dir))?
            .ensure_success("terraform apply")
    }
}

pub fn init_args(plan_dir: &Path) -> Vec<String> {
    vec!["init".to_string(), plan_dir.display().to_string()]
}

pub fn plan_args(state_file: &Path, vars_file: &Path, plan_dir: &Path) -> Vec<String> {
    vec![
        "plan".to_string(),
        format!("-state={}", state_file.display()),
        format!("-var-file={}", vars_file.display()),
        plan_dir.display().to_string(),
    ]
}

/// `-auto-approve` because confirmation already happened on our side
pub fn apply_args(state_file: &Path, vars_file: &Path, plan_dir: &Path) -> Vec<String> {
    vec![
        "apply".to_string(),
        "-auto-approve".to_string(),
        format!("-state={}", state_file.display()),
        format!("-var-file={}", vars_file.display()),
        plan_dir.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = "/h/.jx/clusters/demo/terraform/terraform.tfstate";
    const VARS: &str = "/h/.jx/clusters/demo/terraform/terraform.tfvars";
    const PLAN: &str = "/h/.jx/clusters/demo/terraform";

    #[test]
    fn test_init_args() {
        assert_eq!(init_args(Path::new(PLAN)), ["init", PLAN]);
    }

    #[test]
    fn test_plan_args_order() {
        assert_eq!(
            plan_args(Path::new(STATE), Path::new(VARS), Path::new(PLAN)),
            [
                "plan".to_string(),
                format!("-state={}", STATE),
                format!("-var-file={}", VARS),
                PLAN.to_string(),
            ]
        );
    }

    #[test]
    fn test_apply_args_auto_approve_first() {
        let args = apply_args(Path::new(STATE), Path::new(VARS), Path::new(PLAN));
        assert_eq!(args[0], "apply");
        assert_eq!(args[1], "-auto-approve");
        assert_eq!(args[2], format!("-state={}", STATE));
        assert_eq!(args[3], format!("-var-file={}", VARS));
        assert_eq!(args[4], PLAN);
        assert_eq!(args.len(), 5);
    }

    #[cfg(unix)]
    mod with_fake_terraform {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn fake_terraform(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("terraform");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_successful_lifecycle() {
            let dir = tempfile::tempdir().unwrap();
            let terraform = Terraform::new(fake_terraform(dir.path(), "echo ok"));
            let plan_dir = dir.path();
            let state = plan_dir.join("terraform.tfstate");
            let vars = plan_dir.join("terraform.tfvars");

            terraform.init(plan_dir).unwrap();
            terraform.plan(&state, &vars, plan_dir).unwrap();
            terraform.apply(&state, &vars, plan_dir).unwrap();
        }

        #[test]
        fn test_init_failure_carries_tool_output() {
            let dir = tempfile::tempdir().unwrap();
            let terraform = Terraform::new(fake_terraform(
                dir.path(),
                "echo 'Error: Failed to query available provider packages' >&2; exit 1",
            ));

            let err = terraform.init(dir.path()).unwrap_err().to_string();
            assert!(err.contains("terraform init failed with exit code 1"));
            assert!(err.contains("Failed to query available provider packages"));
        }

        #[test]
        fn test_plan_failure_carries_streamed_output() {
            let dir = tempfile::tempdir().unwrap();
            let terraform = Terraform::new(fake_terraform(
                dir.path(),
                "echo 'Error: Invalid reference' >&2; exit 1",
            ));
            let state = dir.path().join("terraform.tfstate");
            let vars = dir.path().join("terraform.tfvars");

            let err = terraform
                .plan(&state, &vars, dir.path())
                .unwrap_err()
                .to_string();
            assert!(err.contains("terraform plan failed"));
            assert!(err.contains("Invalid reference"));
        }
    }
}
