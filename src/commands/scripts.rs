use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::settings::Settings;
use crate::ui;

/// Print script batches in the order they run
pub fn run(ctx: &Context, file: &str) -> Result<()> {
    let settings = Settings::load()?;
    let spec = super::load_spec(ctx, file, &settings)?;
    let batches = clusterfile::collect_scripts_with(&spec.vms, settings.script_order)?;

    if batches.is_empty() {
        ui::info("No post-provisioning scripts");
        return Ok(());
    }

    ui::header("Script batches");
    for (i, batch) in batches.iter().enumerate() {
        let label = batch.first().map_or("script", |t| t.label.as_str());
        ui::step(i + 1, batches.len(), &format!("{label} ({})", ui::plural(batch.len(), "VM")));
        for task in batch {
            println!("  {} {}", task.vm.bold(), task.scripts.join(" → ").dimmed());
        }
    }
    Ok(())
}
