//! Re-applying the Terraform plan of an existing GKE cluster
//!
//! The workflow is strictly linear. Each step either proceeds, aborts cleanly
//! (operator said no, or something the cluster needs is not on disk yet) or
//! fails with an error that the caller reports.

pub mod paths;

use crate::services::gke::{Session, SessionManager};
use crate::services::terraform::PlanRunner;
use crate::utils::prompt::{ConfirmationGate, Prompt};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

pub use paths::ClusterPaths;

pub const EXPERIMENTAL_FEATURE_MESSAGE: &str =
    "Updating a GKE cluster with terraform is an experimental feature in jx.  Would you like to continue?";
pub const APPLY_PLAN_MESSAGE: &str = "Would you like to apply this plan";

/// Which cluster to update, as given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub name: String,
    pub service_account_override: Option<PathBuf>,
}

/// Everything a single update run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub identity: ClusterIdentity,
    pub home_dir: PathBuf,
    pub skip_login: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Start,
    ExperimentalOptIn,
    LoggedIn,
    PathsResolved,
    PreconditionsChecked,
    Initialized,
    Planned,
    ApplyOptIn,
    Applied,
    Aborted,
    Failed,
}

/// The two points where the operator is asked before continuing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    ExperimentalFeature,
    ApplyPlan,
}

impl Gate {
    pub fn message(self) -> &'static str {
        match self {
            Gate::ExperimentalFeature => EXPERIMENTAL_FEATURE_MESSAGE,
            Gate::ApplyPlan => APPLY_PLAN_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingPrecondition {
    ClusterName,
    ServiceAccountKey(PathBuf),
    PlanDirectory(PathBuf),
}

impl fmt::Display for MissingPrecondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingPrecondition::ClusterName => write!(f, "No cluster name provided"),
            MissingPrecondition::ServiceAccountKey(path) => {
                write!(f, "Unable to find service account key {}", path.display())
            }
            MissingPrecondition::PlanDirectory(path) => {
                write!(f, "Unable to find terraform plan dir {}", path.display())
            }
        }
    }
}

/// Result of one step, and of the run as a whole (the last step reached)
#[derive(Debug)]
pub enum StepOutcome {
    Proceed,
    AbortedByUser(Gate),
    AbortedMissingPrecondition(MissingPrecondition),
    Failed(anyhow::Error),
}

impl StepOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            StepOutcome::AbortedByUser(_) | StepOutcome::AbortedMissingPrecondition(_)
        )
    }
}

/// What happened during one update run
#[derive(Debug)]
pub struct UpdateRun {
    pub outcome: StepOutcome,
    /// States entered, in order, starting with `Start`
    pub states: Vec<WorkflowState>,
    pub session: Option<Session>,
    pub paths: Option<ClusterPaths>,
}

impl UpdateRun {
    pub fn final_state(&self) -> WorkflowState {
        self.states.last().copied().unwrap_or(WorkflowState::Start)
    }

    pub fn reached(&self, state: WorkflowState) -> bool {
        self.states.contains(&state)
    }

    /// Aborts are a clean finish; only failures become errors
    pub fn into_result(self) -> anyhow::Result<WorkflowState> {
        let state = self.final_state();
        match self.outcome {
            StepOutcome::Failed(err) => Err(err),
            _ => Ok(state),
        }
    }
}

/// Drives one update run against the provider, the plan tool and the operator
pub struct UpdateWorkflow<S, R, P> {
    sessions: S,
    runner: R,
    gate: ConfirmationGate<P>,
}

impl<S: SessionManager, R: PlanRunner, P: Prompt> UpdateWorkflow<S, R, P> {
    pub fn new(sessions: S, runner: R, gate: ConfirmationGate<P>) -> Self {
        Self {
            sessions,
            runner,
            gate,
        }
    }

    pub fn run(&self, request: &UpdateRequest) -> UpdateRun {
        let mut run = UpdateRun {
            outcome: StepOutcome::Proceed,
            states: vec![WorkflowState::Start],
            session: None,
            paths: None,
        };
        let outcome = self.execute(request, &mut run);

        let terminal = match &outcome {
            StepOutcome::Proceed => WorkflowState::Applied,
            StepOutcome::AbortedByUser(_) | StepOutcome::AbortedMissingPrecondition(_) => {
                WorkflowState::Aborted
            }
            StepOutcome::Failed(_) => WorkflowState::Failed,
        };
        enter(&mut run, terminal);
        run.outcome = outcome;
        run
    }

    fn execute(&self, request: &UpdateRequest, run: &mut UpdateRun) -> StepOutcome {
        let identity = &request.identity;

        if let outcome @ StepOutcome::AbortedByUser(_) = self.ask(Gate::ExperimentalFeature) {
            return outcome;
        }
        enter(run, WorkflowState::ExperimentalOptIn);

        let service_account = identity
            .service_account_override
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty());
        match self.sessions.login(service_account, request.skip_login) {
            Ok(session) => {
                if let Some(account) = &session.account {
                    debug!(account = %account, "provider session established");
                }
                run.session = Some(session);
            }
            Err(e) => return StepOutcome::Failed(e),
        }
        enter(run, WorkflowState::LoggedIn);

        if identity.name.is_empty() {
            return missing(MissingPrecondition::ClusterName);
        }

        let paths = match paths::resolve(&request.home_dir, &identity.name, service_account) {
            Ok(paths) => paths,
            Err(e) => return StepOutcome::Failed(e),
        };
        run.paths = Some(paths.clone());
        enter(run, WorkflowState::PathsResolved);

        if !paths::check_exists(&paths.key_path) {
            return missing(MissingPrecondition::ServiceAccountKey(paths.key_path));
        }
        if !paths::check_exists(&paths.plan_dir) {
            return missing(MissingPrecondition::PlanDirectory(paths.plan_dir));
        }
        enter(run, WorkflowState::PreconditionsChecked);

        if let Err(e) = self.runner.init(&paths.plan_dir) {
            return StepOutcome::Failed(e);
        }
        enter(run, WorkflowState::Initialized);

        if let Err(e) = self
            .runner
            .plan(&paths.state_file, &paths.vars_file, &paths.plan_dir)
        {
            return StepOutcome::Failed(e);
        }
        enter(run, WorkflowState::Planned);

        if let outcome @ StepOutcome::AbortedByUser(_) = self.ask(Gate::ApplyPlan) {
            return outcome;
        }
        enter(run, WorkflowState::ApplyOptIn);

        info!("Applying plan...");
        if let Err(e) = self
            .runner
            .apply(&paths.state_file, &paths.vars_file, &paths.plan_dir)
        {
            return StepOutcome::Failed(e);
        }

        StepOutcome::Proceed
    }

    fn ask(&self, gate: Gate) -> StepOutcome {
        if self.gate.confirm(gate.message()) {
            StepOutcome::Proceed
        } else {
            debug!(?gate, "operator declined");
            StepOutcome::AbortedByUser(gate)
        }
    }
}

fn enter(run: &mut UpdateRun, state: WorkflowState) {
    debug!(?state, "update workflow transition");
    run.states.push(state);
}

fn missing(reason: MissingPrecondition) -> StepOutcome {
    info!("{}", reason);
    StepOutcome::AbortedMissingPrecondition(reason)
}
