//! `jx update cluster gke terraform`

use crate::commands::GlobalOptions;
use crate::config::Settings;
use crate::services::cluster::{
    ClusterIdentity, StepOutcome, UpdateRequest, UpdateWorkflow, WorkflowState,
};
use crate::services::gke::Gcloud;
use crate::services::terraform::Terraform;
use crate::utils::exec;
use crate::utils::prompt::{ConfirmationGate, RunMode, StdinPrompt};
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use tracing::error;

#[derive(Subcommand, Clone, Debug)]
pub enum UpdateCommands {
    /// Update an existing Kubernetes cluster
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ClusterCommands {
    /// Update a cluster running on Google Kubernetes Engine
    Gke {
        #[command(subcommand)]
        command: GkeCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum GkeCommands {
    /// Re-apply the terraform plan in ~/.jx/clusters/<cluster>/terraform against the cluster
    Terraform(TerraformArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct TerraformArgs {
    /// The name of this cluster
    #[arg(long, short = 'n', default_value = "")]
    pub name: String,
    /// Skip Google auth if already logged in via gcloud auth
    #[arg(long)]
    pub skip_login: bool,
    /// Use a service account key file to login to GCE
    #[arg(long)]
    pub service_account: Option<PathBuf>,
}

pub fn handle_update(global: &GlobalOptions, command: UpdateCommands) -> Result<()> {
    match command {
        UpdateCommands::Cluster {
            command:
                ClusterCommands::Gke {
                    command: GkeCommands::Terraform(args),
                },
        } => update_cluster_gke_terraform(global, args),
    }
}

fn update_cluster_gke_terraform(global: &GlobalOptions, args: TerraformArgs) -> Result<()> {
    let settings = Settings::load(global.batch_mode)?;

    // Both tools have to be present before anything is asked or changed
    let terraform = exec::resolve_binary(&settings.terraform_binary)?;
    let gcloud = exec::resolve_binary(&settings.gcloud_binary)?;

    let workflow = UpdateWorkflow::new(
        Gcloud::new(gcloud)
            .with_activation_retry(settings.login_attempts, settings.login_retry_delay),
        Terraform::new(terraform),
        ConfirmationGate::new(RunMode::from_batch_flag(settings.batch_mode), StdinPrompt),
    );

    let request = UpdateRequest {
        identity: ClusterIdentity {
            name: args.name.clone(),
            service_account_override: args.service_account,
        },
        home_dir: settings.home_dir,
        skip_login: args.skip_login,
    };

    let run = workflow.run(&request);
    if let StepOutcome::AbortedByUser(_) = run.outcome {
        println!("Aborted.");
    }

    match run.into_result() {
        Ok(WorkflowState::Applied) => {
            println!("✓ Terraform plan applied to cluster '{}'", args.name);
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) => {
            error!("error updating cluster {:#}", e);
            Err(e)
        }
    }
}
