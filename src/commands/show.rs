use anyhow::{Context as AnyhowContext, Result};
use clusterfile::{ClusterSpec, SwitchRecord, VmRecord};
use colored::Colorize;

use crate::Context;
use crate::cli::ShowArgs;
use crate::settings::Settings;
use crate::ui;

/// Print the resolved switches and VMs
pub fn run(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let settings = Settings::load()?;
    let spec = super::load_spec(ctx, &args.file, &settings)?;

    if args.json {
        let json = serde_json::to_string_pretty(&spec).context("Failed to serialize cluster")?;
        println!("{json}");
        return Ok(());
    }

    print_spec(&spec);
    Ok(())
}

fn print_spec(spec: &ClusterSpec) {
    if !spec.svs.is_empty() || !spec.dvs.is_empty() {
        ui::header("Switches");
        for switch in spec.switches() {
            print_switch(switch);
        }
    }

    if !spec.vms.is_empty() {
        ui::header("Virtual machines");
        for vm in &spec.vms {
            print_vm(vm);
        }
    }
}

fn print_switch(switch: &SwitchRecord) {
    ui::section(&format!("{} ({})", switch.name, switch.op));
    ui::kv_opt("port group", switch.port_group.as_deref());
    ui::kv("hosts", &switch.hosts.join(", "));
    ui::kv_opt("datacenter", switch.datacenter.as_deref());
    if let Some(mtu) = switch.mtu {
        ui::kv("mtu", &mtu.to_string());
    }
    if !switch.pnic.is_empty() {
        ui::kv("pnic", &switch.pnic.join(", "));
    }
}

fn print_vm(vm: &VmRecord) {
    ui::section(&vm.vm);
    for (key, field) in vm.properties() {
        if key == "guest_password" {
            ui::kv(key, "********");
        } else {
            ui::kv(key, &field.to_operand_value());
        }
    }
    for group in &vm.scripts {
        ui::kv(&group.label, &group.scripts.join(", ").dimmed().to_string());
    }
}
