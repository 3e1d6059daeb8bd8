use anyhow::Result;

use crate::Context;
use crate::settings::Settings;
use crate::ui;

/// Read and validate a cluster file
pub fn run(ctx: &Context, file: &str) -> Result<()> {
    let settings = Settings::load()?;
    let spec = super::load_spec(ctx, file, &settings)?;
    let batches = clusterfile::collect_scripts_with(&spec.vms, settings.script_order)?;

    if ctx.quiet {
        return Ok(());
    }

    ui::success(&format!("{file} is valid"));
    ui::kv("standard switches", &spec.svs.len().to_string());
    ui::kv("distributed switches", &spec.dvs.len().to_string());
    ui::kv("VMs", &spec.vms.len().to_string());
    ui::kv(
        "script batches",
        &format!(
            "{} ({})",
            batches.len(),
            ui::plural(batches.iter().map(Vec::len).sum(), "task")
        ),
    );
    Ok(())
}
