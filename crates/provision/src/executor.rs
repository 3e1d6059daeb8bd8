//! Execution engine - runs a plan phase by phase
//!
//! Within a phase every step is submitted before any is awaited, so the
//! platform can work on them concurrently. A failed task stops the run;
//! steps already completed are not rolled back.

use crate::context::{ConfirmCallback, GuestExecutor, Platform, ProgressCallback, TaskWaiter};
use crate::planner::{Phase, Plan};
use crate::types::{ExecuteError, ExecuteOptions, ExecuteSummary, Result, StepResult, TaskOutcome};
use clusterfile::ScriptTask;
use rayon::prelude::*;

/// Runs plans against a set of collaborators
pub struct Executor<'a> {
    platform: &'a dyn Platform,
    waiter: &'a dyn TaskWaiter,
    guest: &'a dyn GuestExecutor,
    opts: ExecuteOptions,
}

impl<'a> Executor<'a> {
    pub fn new(
        platform: &'a dyn Platform,
        waiter: &'a dyn TaskWaiter,
        guest: &'a dyn GuestExecutor,
        opts: ExecuteOptions,
    ) -> Self {
        Self {
            platform,
            waiter,
            guest,
            opts,
        }
    }

    /// Execute a plan with the given callbacks
    ///
    /// Phases carrying a confirmation prompt are skipped when the callback
    /// declines. In a dry run nothing is submitted and no prompt is shown;
    /// every step is reported as skipped.
    pub fn run<C, P>(&self, plan: &Plan, confirm: &mut C, progress: &mut P) -> Result<ExecuteSummary>
    where
        C: ConfirmCallback,
        P: ProgressCallback,
    {
        let mut summary = ExecuteSummary::default();

        for phase in &plan.phases {
            let results = self.run_phase(phase, confirm, progress)?;
            for result in &results {
                summary.add_result(result);
            }
        }

        for batch in &plan.scripts {
            let results = self.run_batch(batch, progress)?;
            for result in &results {
                summary.add_result(result);
            }
        }

        if !self.opts.dry_run {
            for vm in &plan.report_addresses {
                let ip = self
                    .platform
                    .guest_ip(vm)
                    .map_err(|e| ExecuteError::platform(format!("get IP of {vm}"), e))?;
                match ip {
                    Some(ip) => {
                        log::info!("{vm}: {ip}");
                        summary.addresses.push((vm.clone(), ip));
                    }
                    None => log::warn!("{vm} has no guest IP address yet"),
                }
            }
        }

        Ok(summary)
    }

    fn run_phase<C, P>(&self, phase: &Phase, confirm: &mut C, progress: &mut P) -> Result<Vec<StepResult>>
    where
        C: ConfirmCallback,
        P: ProgressCallback,
    {
        progress.on_phase_start(&phase.name, phase.steps.len());

        if self.opts.dry_run {
            let results = phase
                .steps
                .iter()
                .map(|step| {
                    log::info!("Would {}", step.description());
                    let result = StepResult::Skipped {
                        reason: "dry run".to_string(),
                    };
                    progress.on_step_complete(&step.target, &step.description(), &result);
                    result
                })
                .collect();
            progress.on_phase_complete();
            return Ok(results);
        }

        if let Some(prompt) = &phase.confirm {
            let accepted = confirm
                .confirm(prompt)
                .map_err(|e| ExecuteError::platform(format!("{} confirmation", phase.name), e))?;
            if !accepted {
                log::info!("{}: not confirmed, skipping {} step(s)", phase.name, phase.steps.len());
                let results = phase
                    .steps
                    .iter()
                    .map(|step| {
                        let result = StepResult::Skipped {
                            reason: "not confirmed".to_string(),
                        };
                        progress.on_step_complete(&step.target, &step.description(), &result);
                        result
                    })
                    .collect();
                progress.on_phase_complete();
                return Ok(results);
            }
        }

        for step in &phase.steps {
            for (kind, name) in step.requirements() {
                let found = self
                    .platform
                    .find(kind, &name)
                    .map_err(|e| ExecuteError::platform(format!("look up {kind} {name}"), e))?;
                if found.is_none() {
                    return Err(ExecuteError::MissingObject {
                        kind,
                        name,
                        target: step.target.clone(),
                    });
                }
            }
        }

        let mut tasks = Vec::with_capacity(phase.steps.len());
        for step in &phase.steps {
            let task = self
                .platform
                .submit(step)
                .map_err(|e| ExecuteError::platform(step.description(), e))?;
            log::debug!("{}: submitted {task} for {}", phase.name, step.target);
            tasks.push(task);
        }

        let outcomes = self
            .waiter
            .wait(&tasks)
            .map_err(|e| ExecuteError::platform(format!("wait for {}", phase.name), e))?;
        if outcomes.len() != tasks.len() {
            return Err(ExecuteError::OutcomeMismatch {
                phase: phase.name.clone(),
                expected: tasks.len(),
                actual: outcomes.len(),
            });
        }

        let mut results = Vec::with_capacity(outcomes.len());
        for (step, outcome) in phase.steps.iter().zip(outcomes) {
            let message = match outcome {
                TaskOutcome::Success => {
                    progress.on_step_complete(&step.target, &step.description(), &StepResult::Completed);
                    results.push(StepResult::Completed);
                    continue;
                }
                TaskOutcome::Error(message) => message,
                TaskOutcome::Queued => "task did not finish".to_string(),
            };
            let failed = StepResult::Failed {
                error: message.clone(),
            };
            progress.on_step_complete(&step.target, &step.description(), &failed);
            log::error!(
                "{}: {} failed after {} step(s) completed",
                phase.name,
                step.target,
                results.len()
            );
            return Err(ExecuteError::TaskFailed {
                phase: phase.name.clone(),
                target: step.target.clone(),
                message,
            });
        }

        progress.on_phase_complete();
        Ok(results)
    }

    /// Run one script batch; every task finishes before the batch returns
    fn run_batch<P: ProgressCallback>(&self, batch: &[ScriptTask], progress: &mut P) -> Result<Vec<StepResult>> {
        let label = batch.first().map_or("script", |t| t.label.as_str());
        let name = format!("Run {label}");
        progress.on_phase_start(&name, batch.len());

        if self.opts.dry_run {
            let results = batch
                .iter()
                .map(|task| {
                    log::info!("Would run {} on {}", task.scripts.join(", "), task.vm);
                    let result = StepResult::Skipped {
                        reason: "dry run".to_string(),
                    };
                    progress.on_step_complete(&task.vm, &task.scripts.join(", "), &result);
                    result
                })
                .collect();
            progress.on_phase_complete();
            return Ok(results);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.jobs.max(1))
            .build()
            .map_err(|e| ExecuteError::platform("create script thread pool", anyhow::anyhow!(e)))?;

        let guest = self.guest;
        let outcomes: Vec<Result<()>> =
            pool.install(|| batch.par_iter().map(|task| run_task(guest, task)).collect());

        let mut results = Vec::with_capacity(batch.len());
        for (task, outcome) in batch.iter().zip(outcomes) {
            let result = match &outcome {
                Ok(()) => StepResult::ScriptCompleted,
                Err(e) => StepResult::Failed {
                    error: e.to_string(),
                },
            };
            progress.on_step_complete(&task.vm, &task.scripts.join(", "), &result);
            outcome?;
            results.push(result);
        }

        progress.on_phase_complete();
        Ok(results)
    }
}

/// Run a task's scripts in order, stopping at the first failure
fn run_task(guest: &dyn GuestExecutor, task: &ScriptTask) -> Result<()> {
    for script in &task.scripts {
        log::debug!("Running {script} on {}", task.vm);
        let code = guest
            .run_script(&task.vm, &task.guest_username, &task.guest_password, script)
            .map_err(|e| ExecuteError::platform(format!("run {script} on {}", task.vm), e))?;
        if code != 0 {
            return Err(ExecuteError::ScriptFailed {
                vm: task.vm.clone(),
                script: script.clone(),
                code,
            });
        }
    }
    Ok(())
}

/// Simple execution without callbacks
///
/// Accepts every confirmation and reports no progress.
pub fn execute_simple(
    plan: &Plan,
    opts: ExecuteOptions,
    platform: &dyn Platform,
    waiter: &dyn TaskWaiter,
    guest: &dyn GuestExecutor,
) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    Executor::new(platform, waiter, guest, opts).run(plan, &mut AutoConfirm, &mut NoProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::planner::Step;
    use crate::types::{ObjectKind, ObjectRef, TaskId};
    use clusterfile::{ClusterFile, LabelOrder};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Mock platform recording submitted steps
    #[derive(Default)]
    struct MockPlatform {
        submitted: Mutex<Vec<String>>,
        missing: HashSet<String>,
        fail_target: Option<String>,
    }

    impl Platform for MockPlatform {
        fn find(&self, kind: ObjectKind, name: &str) -> anyhow::Result<Option<ObjectRef>> {
            if self.missing.contains(name) {
                return Ok(None);
            }
            Ok(Some(ObjectRef {
                kind,
                name: name.to_string(),
                id: format!("{kind}-{name}"),
            }))
        }

        fn submit(&self, step: &Step) -> anyhow::Result<TaskId> {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(step.description());
            Ok(TaskId(step.target.clone()))
        }

        fn guest_ip(&self, vm: &str) -> anyhow::Result<Option<String>> {
            Ok((vm != "db").then(|| format!("10.0.0.{}", vm.len())))
        }
    }

    impl TaskWaiter for MockPlatform {
        fn wait(&self, tasks: &[TaskId]) -> anyhow::Result<Vec<TaskOutcome>> {
            Ok(tasks
                .iter()
                .map(|t| match &self.fail_target {
                    Some(target) if *target == t.0 => TaskOutcome::Error("no space".into()),
                    _ => TaskOutcome::Success,
                })
                .collect())
        }
    }

    /// Mock guest recording script runs
    #[derive(Default)]
    struct MockGuest {
        runs: Mutex<Vec<(String, String)>>,
        exit_code: i32,
    }

    impl GuestExecutor for MockGuest {
        fn run_script(&self, vm: &str, _username: &str, _password: &str, script: &str) -> anyhow::Result<i32> {
            self.runs.lock().unwrap().push((vm.to_string(), script.to_string()));
            Ok(self.exit_code)
        }
    }

    const CLUSTER: &str = "\
[_SVS_]
sw = host:esx1
[_VMS_]
vm{1:2}: template:centos creds script:/first.sh sequence:1 script:/second.sh sequence:2
db = template:centos
[creds]
guest_username = root
guest_password = pw
";

    fn plan(create: bool) -> Plan {
        let spec = ClusterFile::parse(CLUSTER)
            .unwrap()
            .read(&mut clusterfile::AutoConfirm)
            .unwrap();
        if create {
            Plan::create(&spec, LabelOrder::default()).unwrap()
        } else {
            Plan::destroy(&spec)
        }
    }

    #[test]
    fn test_create_runs_everything() {
        let platform = MockPlatform::default();
        let guest = MockGuest::default();
        let plan = plan(true);
        let summary =
            execute_simple(&plan, ExecuteOptions::default(), &platform, &platform, &guest).unwrap();

        assert_eq!(summary.completed, plan.total_steps());
        assert_eq!(summary.scripts, 4);
        assert!(summary.is_success());
        assert_eq!(
            summary.addresses,
            vec![
                ("vm1".to_string(), "10.0.0.3".to_string()),
                ("vm2".to_string(), "10.0.0.3".to_string()),
            ]
        );

        let submitted = platform.submitted.lock().unwrap();
        assert_eq!(submitted[0], "create standard virtual switch sw on esx1");
    }

    #[test]
    fn test_script_batches_run_in_label_order() {
        let platform = MockPlatform::default();
        let guest = MockGuest::default();
        execute_simple(&plan(true), ExecuteOptions::default(), &platform, &platform, &guest).unwrap();

        let runs = guest.runs.lock().unwrap();
        let firsts: Vec<_> = runs.iter().take(2).map(|(_, s)| s.as_str()).collect();
        let seconds: Vec<_> = runs.iter().skip(2).map(|(_, s)| s.as_str()).collect();
        assert_eq!(firsts, vec!["/first.sh", "/first.sh"]);
        assert_eq!(seconds, vec!["/second.sh", "/second.sh"]);
    }

    #[test]
    fn test_dry_run_submits_nothing() {
        let platform = MockPlatform::default();
        let guest = MockGuest::default();
        let plan = plan(true);
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = execute_simple(&plan, opts, &platform, &platform, &guest).unwrap();

        assert_eq!(summary.skipped, plan.total_steps() + plan.total_scripts());
        assert!(platform.submitted.lock().unwrap().is_empty());
        assert!(guest.runs.lock().unwrap().is_empty());
        assert!(summary.addresses.is_empty());
    }

    #[test]
    fn test_task_error_stops_run() {
        let platform = MockPlatform {
            fail_target: Some("vm2".into()),
            ..Default::default()
        };
        let guest = MockGuest::default();
        let err = execute_simple(&plan(true), ExecuteOptions::default(), &platform, &platform, &guest)
            .unwrap_err();

        assert!(matches!(
            err,
            ExecuteError::TaskFailed { ref phase, ref target, .. } if phase == "Clone VM" && target == "vm2"
        ));
        assert!(guest.runs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_script_failure_reports_exit_code() {
        let platform = MockPlatform::default();
        let guest = MockGuest {
            exit_code: 3,
            ..Default::default()
        };
        let err = execute_simple(&plan(true), ExecuteOptions::default(), &platform, &platform, &guest)
            .unwrap_err();

        assert!(matches!(err, ExecuteError::ScriptFailed { code: 3, ref script, .. } if script == "/first.sh"));
    }

    #[test]
    fn test_missing_template() {
        let platform = MockPlatform {
            missing: HashSet::from(["centos".to_string()]),
            ..Default::default()
        };
        let guest = MockGuest::default();
        let err = execute_simple(&plan(true), ExecuteOptions::default(), &platform, &platform, &guest)
            .unwrap_err();

        assert!(matches!(err, ExecuteError::MissingObject { kind: ObjectKind::Vm, ref name, .. } if name == "centos"));
    }

    #[test]
    fn test_declined_destroy_skips_phase() {
        let platform = MockPlatform::default();
        let guest = MockGuest::default();
        let plan = plan(false);
        let executor = Executor::new(&platform, &platform, &guest, ExecuteOptions::default());
        let summary = executor.run(&plan, &mut AutoDecline, &mut NoProgress).unwrap();

        assert_eq!(summary.skipped, plan.total_steps());
        assert!(platform.submitted.lock().unwrap().is_empty());
    }

    /// Answers like an operator typing something unusable
    struct UnusableAnswer;

    impl ConfirmCallback for UnusableAnswer {
        fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
            anyhow::bail!("unrecognized answer \"maybe\"")
        }
    }

    #[test]
    fn test_unusable_destroy_answer_aborts_run() {
        let platform = MockPlatform::default();
        let guest = MockGuest::default();
        let executor = Executor::new(&platform, &platform, &guest, ExecuteOptions::default());
        let err = executor
            .run(&plan(false), &mut UnusableAnswer, &mut NoProgress)
            .unwrap_err();

        assert!(matches!(err, ExecuteError::Platform { ref context, .. } if context == "Destroy VM confirmation"));
        assert!(platform.submitted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_confirmed_destroy_removes_vms_before_switches() {
        let platform = MockPlatform::default();
        let guest = MockGuest::default();
        let executor = Executor::new(&platform, &platform, &guest, ExecuteOptions::default());
        executor.run(&plan(false), &mut AutoConfirm, &mut NoProgress).unwrap();

        let submitted = platform.submitted.lock().unwrap();
        assert_eq!(
            *submitted,
            vec![
                "destroy vm1",
                "destroy vm2",
                "destroy db",
                "destroy standard virtual switch sw",
            ]
        );
    }
}
