use anyhow::{Context as AnyhowContext, Result};

use crate::Context;
use crate::cli::PlanArgs;
use crate::settings::Settings;
use crate::ui;

/// Print the ordered provisioning plan
pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let settings = Settings::load()?;
    let spec = super::load_spec(ctx, &args.file, &settings)?;
    let plan = super::build_plan(&spec, args.mode, &settings)?;

    if args.json {
        let json = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
        println!("{json}");
        return Ok(());
    }

    if plan.is_empty() {
        ui::info("Nothing to do");
        return Ok(());
    }

    ui::header(&format!("Plan for {}", args.file));
    print!("{plan}");
    println!();
    ui::dim(&format!(
        "{}, {}",
        ui::plural(plan.total_steps(), "platform step"),
        ui::plural(plan.total_scripts(), "script task")
    ));
    Ok(())
}
