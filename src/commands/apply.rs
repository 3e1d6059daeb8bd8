use anyhow::{Result, bail};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use provision::{
    ConfirmCallback, ExecuteOptions, ExecuteSummary, Executor, Plan, ProgressCallback, StepResult,
};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::platform::LogPlatform;
use crate::prompt::TerminalConfirm;
use crate::settings::Settings;
use crate::ui;

/// Build the plan and run it
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let settings = Settings::load()?;
    let spec = super::load_spec(ctx, &args.file, &settings)?;
    let plan = super::build_plan(&spec, args.mode, &settings)?;

    if plan.is_empty() {
        ui::info("Nothing to do");
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs.unwrap_or(settings.script_jobs),
    };

    if !ctx.quiet {
        ui::header(&format!("Applying {}", args.file));
        if opts.dry_run {
            ui::warn("Dry run - nothing will be submitted");
        }
    }

    let platform = LogPlatform::new();
    let mut progress = BarProgress::new(ctx.quiet);
    let summary = if ctx.yes {
        execute(&plan, opts, &platform, &mut provision::AutoConfirm, &mut progress)
    } else {
        execute(&plan, opts, &platform, &mut TerminalConfirm, &mut progress)
    };

    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            progress.abandon();
            bail!("Provisioning stopped: {e}");
        }
    };

    if !ctx.quiet {
        print_summary(&summary, args.dry_run);
    }
    Ok(())
}

fn execute<C: ConfirmCallback>(
    plan: &Plan,
    opts: ExecuteOptions,
    platform: &LogPlatform,
    confirm: &mut C,
    progress: &mut BarProgress,
) -> provision::Result<ExecuteSummary> {
    Executor::new(platform, platform, platform, opts).run(plan, confirm, progress)
}

fn print_summary(summary: &ExecuteSummary, dry_run: bool) {
    println!();
    if dry_run {
        ui::info(&format!("Would run {}", ui::plural(summary.skipped, "step")));
        return;
    }

    ui::success(&format!(
        "{} completed, {} run",
        ui::plural(summary.completed, "step"),
        ui::plural(summary.scripts, "script task")
    ));
    if summary.skipped > 0 {
        ui::warn(&format!("{} skipped", ui::plural(summary.skipped, "step")));
    }
    if !summary.addresses.is_empty() {
        ui::section("Addresses");
        for (vm, ip) in &summary.addresses {
            ui::kv(vm, ip);
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// One progress bar per phase or script batch
struct BarProgress {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl BarProgress {
    fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }

    fn abandon(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_phase_start(&mut self, name: &str, count: usize) {
        self.abandon();
        if self.quiet {
            return;
        }

        ui::section(name);
        let bar = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_step_complete(&mut self, target: &str, description: &str, result: &StepResult) {
        let Some(bar) = &self.bar else {
            return;
        };
        match result {
            StepResult::Completed | StepResult::ScriptCompleted => {
                bar.set_message(target.to_string());
            }
            StepResult::Skipped { reason } => {
                bar.println(format!("  {} {description} ({reason})", "-".dimmed()));
            }
            StepResult::Failed { error } => {
                bar.println(format!("  {} {target}: {error}", "✗".red()));
            }
        }
        bar.inc(1);
    }

    fn on_phase_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message("done");
        }
    }
}
