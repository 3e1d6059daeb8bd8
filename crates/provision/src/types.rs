//! Core types for provisioning

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of inventory object a platform can look up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Host,
    Vm,
    Network,
    Datastore,
    Cluster,
    Datacenter,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Host => "host",
            Self::Vm => "VM",
            Self::Network => "network",
            Self::Datastore => "datastore",
            Self::Cluster => "cluster",
            Self::Datacenter => "datacenter",
        };
        f.write_str(name)
    }
}

/// Handle to an inventory object returned by a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
    /// Platform-specific identifier
    pub id: String,
}

/// Identifier of an asynchronous platform task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a platform task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Not finished yet
    Queued,
    /// Finished successfully
    Success,
    /// Finished with an error
    Error(String),
}

impl TaskOutcome {
    /// Check if the task has finished
    pub fn is_done(&self) -> bool {
        !matches!(self, Self::Queued)
    }
}

/// Result of running one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepResult {
    /// Platform task completed
    Completed,
    /// Guest script exited with status 0
    ScriptCompleted,
    /// Step was not run
    Skipped { reason: String },
    /// Step failed
    Failed { error: String },
}

impl StepResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub completed: usize,
    pub scripts: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Guest addresses reported after provisioning, by VM
    pub addresses: Vec<(String, String)>,
}

impl ExecuteSummary {
    /// Total number of steps processed
    pub fn total(&self) -> usize {
        self.completed + self.scripts + self.skipped + self.failed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.completed += other.completed;
        self.scripts += other.scripts;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.addresses.extend(other.addresses.iter().cloned());
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &StepResult) {
        match result {
            StepResult::Completed => self.completed += 1,
            StepResult::ScriptCompleted => self.scripts += 1,
            StepResult::Skipped { .. } => self.skipped += 1,
            StepResult::Failed { .. } => self.failed += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't submit anything, just report what would run
    pub dry_run: bool,
    /// Number of guest scripts run at once within a batch
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

/// Why a plan stopped before completing
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// A platform task finished with an error
    #[error("{phase}: task for {target} failed: {message}")]
    TaskFailed {
        phase: String,
        target: String,
        message: String,
    },

    /// A guest script exited non-zero
    #[error("script {script} on {vm} exited with status {code}")]
    ScriptFailed {
        vm: String,
        script: String,
        code: i32,
    },

    /// An object a step depends on does not exist
    #[error("couldn't find {kind} {name} needed by {target}")]
    MissingObject {
        kind: ObjectKind,
        name: String,
        target: String,
    },

    /// A collaborator call failed
    #[error("{context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// Task waiter returned a different number of outcomes than tasks
    #[error("{phase}: expected {expected} task outcome(s), got {actual}")]
    OutcomeMismatch {
        phase: String,
        expected: usize,
        actual: usize,
    },
}

impl ExecuteError {
    /// Wrap a collaborator error with what was being attempted
    pub fn platform(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Platform {
            context: context.into(),
            source,
        }
    }
}

/// Result type for plan execution
pub type Result<T> = std::result::Result<T, ExecuteError>;
