use anyhow::{Context as AnyhowContext, Result};
use clusterfile::{AutoConfirm, ClusterFile, ClusterSpec};
use provision::Plan;
use std::path::PathBuf;

use crate::Context;
use crate::cli::ModeArgs;
use crate::paths;
use crate::prompt::TerminalConfirm;
use crate::settings::Settings;

pub mod apply;
pub mod check;
pub mod plan;
pub mod scripts;
pub mod show;

/// Resolve a cluster file argument against settings
pub fn locate(file: &str, settings: &Settings) -> Result<PathBuf> {
    paths::find_cluster_file(file, &settings.search_dirs)
}

/// Load and read a cluster file, asking about range fan-outs unless `--yes`
pub fn load_spec(ctx: &Context, file: &str, settings: &Settings) -> Result<ClusterSpec> {
    let path = locate(file, settings)?;
    let cluster = ClusterFile::load(&path).with_context(|| format!("Failed to load {}", path.display()))?;

    let read = if ctx.yes {
        cluster.read(&mut AutoConfirm)
    } else {
        cluster.read(&mut TerminalConfirm)
    };
    read.map_err(|e| {
        let category = e.category().description();
        anyhow::Error::new(e).context(format!("{category} in {}", path.display()))
    })
}

/// Build the plan selected by `--create` / `--destroy`
pub fn build_plan(spec: &ClusterSpec, mode: ModeArgs, settings: &Settings) -> Result<Plan> {
    if mode.destroy {
        Ok(Plan::destroy(spec))
    } else {
        Plan::create(spec, settings.script_order).context("Failed to order post-provisioning scripts")
    }
}
