//! Collaborator traits
//!
//! These traits keep the provision crate independent of any particular
//! virtualization SDK, terminal or progress display.

use crate::planner::Step;
use crate::types::{ObjectKind, ObjectRef, StepResult, TaskId, TaskOutcome};
use anyhow::Result;

/// Inventory lookups and task submission against a virtualization platform
pub trait Platform: Send + Sync {
    /// Find an inventory object by name
    fn find(&self, kind: ObjectKind, name: &str) -> Result<Option<ObjectRef>>;

    /// Issue the asynchronous task for a step
    fn submit(&self, step: &Step) -> Result<TaskId>;

    /// Guest IP address of a VM, if the guest reports one
    fn guest_ip(&self, vm: &str) -> Result<Option<String>>;
}

/// Polls submitted tasks until they finish
pub trait TaskWaiter {
    /// Block until every task is done, returning outcomes in task order
    fn wait(&self, tasks: &[TaskId]) -> Result<Vec<TaskOutcome>>;
}

/// Uploads and runs scripts inside guests
///
/// Called from several threads at once when a batch holds several tasks.
pub trait GuestExecutor: Send + Sync {
    /// Run one script and return its exit code
    fn run_script(&self, vm: &str, username: &str, password: &str, script: &str) -> Result<i32>;
}

/// Confirmation callback for user interaction
///
/// Implement this trait to handle user confirmations.
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Progress callback for execution operations
pub trait ProgressCallback {
    /// Called when a phase or script batch starts
    fn on_phase_start(&mut self, name: &str, count: usize);

    /// Called when one step or script task finishes
    fn on_step_complete(&mut self, target: &str, description: &str, result: &StepResult);

    /// Called when a phase or script batch completes
    fn on_phase_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&mut self, _name: &str, _count: usize) {}
    fn on_step_complete(&mut self, _target: &str, _description: &str, _result: &StepResult) {}
    fn on_phase_complete(&mut self) {}
}
