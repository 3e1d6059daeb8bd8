//! Log-only platform
//!
//! Reports every inventory lookup as found and every task as successful,
//! logging what a real platform would be asked to do.

use anyhow::Result;
use provision::{
    GuestExecutor, ObjectKind, ObjectRef, Platform, Step, TaskId, TaskOutcome, TaskWaiter,
};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct LogPlatform {
    next_task: AtomicUsize,
}

impl LogPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks submitted so far
    pub fn submitted(&self) -> usize {
        self.next_task.load(Ordering::Relaxed)
    }
}

impl Platform for LogPlatform {
    fn find(&self, kind: ObjectKind, name: &str) -> Result<Option<ObjectRef>> {
        log::trace!("find {kind} {name}");
        Ok(Some(ObjectRef {
            kind,
            name: name.to_string(),
            id: format!("{kind}:{name}"),
        }))
    }

    fn submit(&self, step: &Step) -> Result<TaskId> {
        let id = self.next_task.fetch_add(1, Ordering::Relaxed) + 1;
        let task = TaskId(format!("task-{id}"));
        log::info!("{task}: {}", step.description());
        Ok(task)
    }

    fn guest_ip(&self, vm: &str) -> Result<Option<String>> {
        log::debug!("{vm} reports no guest IP on the log platform");
        Ok(None)
    }
}

impl TaskWaiter for LogPlatform {
    fn wait(&self, tasks: &[TaskId]) -> Result<Vec<TaskOutcome>> {
        log::debug!("Waiting for {} task(s)", tasks.len());
        Ok(tasks.iter().map(|_| TaskOutcome::Success).collect())
    }
}

impl GuestExecutor for LogPlatform {
    fn run_script(&self, vm: &str, username: &str, _password: &str, script: &str) -> Result<i32> {
        log::info!("Run {script} on {vm} as {username}");
        Ok(0)
    }
}
