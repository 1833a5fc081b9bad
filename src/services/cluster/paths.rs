//! On-disk layout of a cluster managed under `~/.jx/clusters/<name>`

use anyhow::{Context, Result};
use std::fs::DirBuilder;
use std::path::{Component, Path, PathBuf};

const JX_DIR_NAME: &str = ".jx";
const CLUSTERS_DIR_NAME: &str = "clusters";
const TERRAFORM_DIR_NAME: &str = "terraform";
const VARS_FILE_NAME: &str = "terraform.tfvars";
const STATE_FILE_NAME: &str = "terraform.tfstate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPaths {
    pub home_dir: PathBuf,
    pub clusters_dir: PathBuf,
    pub cluster_dir: PathBuf,
    pub key_path: PathBuf,
    pub plan_dir: PathBuf,
    pub vars_file: PathBuf,
    pub state_file: PathBuf,
}

impl ClusterPaths {
    /// Compute every path without touching the filesystem.
    ///
    /// An empty override is treated the same as no override.
    pub fn derive(
        home_dir: &Path,
        cluster_name: &str,
        service_account_override: Option<&Path>,
    ) -> Self {
        let clusters_dir = home_dir.join(JX_DIR_NAME).join(CLUSTERS_DIR_NAME);
        let cluster_dir = clusters_dir.join(cluster_name);

        let key_path = match service_account_override {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => cluster_dir.join(default_key_file_name(cluster_name)),
        };

        let plan_dir = cluster_dir.join(TERRAFORM_DIR_NAME);
        let vars_file = plan_dir.join(VARS_FILE_NAME);
        let state_file = plan_dir.join(STATE_FILE_NAME);

        Self {
            home_dir: home_dir.to_path_buf(),
            clusters_dir,
            cluster_dir,
            key_path,
            plan_dir,
            vars_file,
            state_file,
        }
    }
}

/// `jx-<name>.key.json`, the key file written when the cluster was created
pub fn default_key_file_name(cluster_name: &str) -> String {
    format!("jx-{}.key.json", cluster_name)
}

/// A cluster name must be a single plain path component so that every
/// derived path stays under `~/.jx/clusters`
pub fn validate_cluster_name(cluster_name: &str) -> Result<()> {
    let mut components = Path::new(cluster_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == cluster_name => Ok(()),
        _ => anyhow::bail!(
            "Invalid cluster name '{}': it must not contain path separators or '..'",
            cluster_name
        ),
    }
}

/// Derive the cluster paths and make sure the cluster directory exists
pub fn resolve(
    home_dir: &Path,
    cluster_name: &str,
    service_account_override: Option<&Path>,
) -> Result<ClusterPaths> {
    validate_cluster_name(cluster_name)?;
    let paths = ClusterPaths::derive(home_dir, cluster_name, service_account_override);
    create_dir_all_permissive(&paths.cluster_dir)?;
    Ok(paths)
}

/// Create a directory and its parents with mode 0777 (before umask)
fn create_dir_all_permissive(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    builder
        .create(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Read-only existence check used for the key file and the plan directory
pub fn check_exists(path: &Path) -> bool {
    path.exists()
}
