//! Plan builder - turns a cluster spec into ordered provisioning phases
//!
//! Creation runs switches first, then VM configuration phases in a fixed
//! order, then guest script batches, then an address report. Destruction
//! removes VMs before the switches they may be attached to.

use crate::types::ObjectKind;
use clusterfile::record::{Network, Placement};
use clusterfile::{ClusterSpec, LabelOrder, ScriptTask, SwitchOp, SwitchRecord, VmRecord};
use serde::Serialize;
use std::fmt;

// ============================================================================
// Steps
// ============================================================================

/// What a step asks the platform to do
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateSwitch(SwitchRecord),
    DestroySwitch(SwitchRecord),
    Clone {
        placement: Placement,
        cpu: Option<i64>,
        memory: Option<f64>,
    },
    CpuShares {
        shares: i64,
    },
    MemoryShares {
        shares: i64,
    },
    CpuMemory {
        cpu: Option<i64>,
        memory: Option<f64>,
        cores_per_socket: Option<i64>,
    },
    Reservation {
        cpu: bool,
        memory: bool,
    },
    NetworkAdapter {
        port_group: String,
        adapter_number: Option<String>,
        switch: Option<String>,
        allow_guest_mtu_change: bool,
    },
    NetworkConfig {
        network: Network,
        hostname: Option<String>,
    },
    Latency {
        level: String,
    },
    Passthrough {
        devices: Vec<String>,
        mmio_size: Option<i64>,
    },
    Vgpu {
        profile: String,
    },
    Sriov {
        pf: Vec<String>,
        port_groups: Vec<String>,
        dvs_names: Vec<String>,
    },
    Pvrdma {
        port_group: String,
    },
    SecureBoot {
        enabled: bool,
    },
    PowerOn,
    PowerOff,
    DestroyVm,
}

/// One platform task against one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    /// Switch or VM name
    pub target: String,
    #[serde(flatten)]
    pub action: Action,
}

impl Step {
    fn new(target: &str, action: Action) -> Self {
        Self {
            target: target.to_string(),
            action,
        }
    }

    /// Short description for plan output and logs
    pub fn description(&self) -> String {
        match &self.action {
            Action::CreateSwitch(sw) => format!(
                "create {} {} on {}",
                sw.op.description(),
                sw.name,
                join_or(&sw.hosts, "no hosts")
            ),
            Action::DestroySwitch(sw) => format!("destroy {} {}", sw.op.description(), sw.name),
            Action::Clone { placement, .. } => {
                let mut text = format!(
                    "clone {} from {}",
                    self.target,
                    placement.template.as_deref().unwrap_or("?")
                );
                if let Some(host) = &placement.host {
                    text.push_str(&format!(" on {host}"));
                }
                if let Some(datastore) = &placement.datastore {
                    text.push_str(&format!(" in {datastore}"));
                }
                if placement.linked == Some(true) {
                    text.push_str(" (linked)");
                }
                text
            }
            Action::CpuShares { shares } => format!("set CPU shares of {} to {shares}", self.target),
            Action::MemoryShares { shares } => {
                format!("set memory shares of {} to {shares}", self.target)
            }
            Action::CpuMemory {
                cpu,
                memory,
                cores_per_socket,
            } => {
                let mut parts = Vec::new();
                if let Some(cpu) = cpu {
                    parts.push(format!("{cpu} CPU(s)"));
                }
                if let Some(memory) = memory {
                    parts.push(format!("{memory} GB memory"));
                }
                if let Some(cores) = cores_per_socket {
                    parts.push(format!("{cores} core(s) per socket"));
                }
                format!("configure {} with {}", self.target, parts.join(", "))
            }
            Action::Reservation { cpu, memory } => {
                let what: Vec<&str> = [(*cpu, "CPU"), (*memory, "memory")]
                    .into_iter()
                    .filter_map(|(on, name)| on.then_some(name))
                    .collect();
                format!("reserve {} for {}", what.join(" and "), self.target)
            }
            Action::NetworkAdapter { port_group, .. } => {
                format!("add adapter on {port_group} to {}", self.target)
            }
            Action::NetworkConfig { network, .. } => match (&network.ip, network.is_dhcp) {
                (Some(ip), _) => format!("configure {} with address {ip}", self.target),
                (None, Some(true)) => format!("configure {} for DHCP", self.target),
                _ => format!("configure network of {}", self.target),
            },
            Action::Latency { level } => format!("set latency sensitivity of {} to {level}", self.target),
            Action::Passthrough { devices, .. } => {
                format!("pass through {} to {}", devices.join(", "), self.target)
            }
            Action::Vgpu { profile } => format!("add vGPU {profile} to {}", self.target),
            Action::Sriov { port_groups, .. } => {
                format!("add SR-IOV adapter(s) on {} to {}", port_groups.join(", "), self.target)
            }
            Action::Pvrdma { port_group } => {
                format!("add PVRDMA adapter on {port_group} to {}", self.target)
            }
            Action::SecureBoot { enabled } => format!(
                "{} secure boot on {}",
                if *enabled { "enable" } else { "disable" },
                self.target
            ),
            Action::PowerOn => format!("power on {}", self.target),
            Action::PowerOff => format!("power off {}", self.target),
            Action::DestroyVm => format!("destroy {}", self.target),
        }
    }

    /// Objects that must exist before the step is submitted
    pub fn requirements(&self) -> Vec<(ObjectKind, String)> {
        let mut required = Vec::new();
        match &self.action {
            Action::CreateSwitch(sw) => {
                required.extend(sw.hosts.iter().map(|h| (ObjectKind::Host, h.clone())));
            }
            Action::DestroySwitch(_) => {}
            Action::Clone { placement, .. } => {
                let wanted = [
                    (ObjectKind::Vm, &placement.template),
                    (ObjectKind::Datacenter, &placement.datacenter),
                    (ObjectKind::Cluster, &placement.cluster),
                    (ObjectKind::Host, &placement.host),
                    (ObjectKind::Datastore, &placement.datastore),
                ];
                required.extend(
                    wanted
                        .into_iter()
                        .filter_map(|(kind, name)| name.clone().map(|n| (kind, n))),
                );
            }
            Action::NetworkAdapter { port_group, .. } => {
                required.push((ObjectKind::Vm, self.target.clone()));
                required.push((ObjectKind::Network, port_group.clone()));
            }
            _ => required.push((ObjectKind::Vm, self.target.clone())),
        }
        required
    }
}

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Whether a plan builds or tears down the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Create,
    Destroy,
}

/// Steps submitted together and awaited together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub name: String,
    pub steps: Vec<Step>,
    /// Prompt that must be accepted before the phase runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

/// An ordered provisioning plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub mode: Mode,
    pub phases: Vec<Phase>,
    /// Guest script batches, run after every phase
    pub scripts: Vec<Vec<ScriptTask>>,
    /// VMs whose guest address is reported at the end
    pub report_addresses: Vec<String>,
}

impl Plan {
    /// Plan the creation of everything in `spec`
    pub fn create(spec: &ClusterSpec, order: LabelOrder) -> clusterfile::Result<Self> {
        let mut plan = Self::empty(Mode::Create);

        for (op, switches) in [(SwitchOp::Svs, &spec.svs), (SwitchOp::Dvs, &spec.dvs)] {
            plan.push_phase(
                format!("Create {}", op.description()),
                switches
                    .iter()
                    .map(|sw| Step::new(&sw.name, Action::CreateSwitch(sw.clone())))
                    .collect(),
                None,
            );
        }

        let vms = &spec.vms;
        plan.push_vm_phase("Clone VM", vms, clone_step);
        plan.push_vm_phase("Configure CPU shares", vms, |vm| {
            vm.compute
                .cpu_shares
                .map(|shares| Action::CpuShares { shares })
        });
        plan.push_vm_phase("Configure memory shares", vms, |vm| {
            vm.compute
                .memory_shares
                .map(|shares| Action::MemoryShares { shares })
        });
        plan.push_vm_phase("Configure CPU/memory", vms, cpu_memory_step);
        plan.push_vm_phase("Configure CPU/memory reservation", vms, |vm| {
            let c = &vm.compute;
            (c.cpu_reservation.is_some() || c.memory_reservation.is_some()).then(|| {
                Action::Reservation {
                    cpu: c.cpu_reservation.unwrap_or(false),
                    memory: c.memory_reservation.unwrap_or(false),
                }
            })
        });
        plan.push_vm_phase("Add network adapter(s)", vms, adapter_step);
        plan.push_vm_phase("Configure network properties", vms, |vm| {
            let n = &vm.network;
            (n.ip.is_some() || n.is_dhcp.is_some()).then(|| Action::NetworkConfig {
                network: n.clone(),
                hostname: vm.guest.hostname.clone(),
            })
        });
        plan.push_vm_phase("Configure latency sensitivity", vms, |vm| {
            vm.compute
                .latency
                .clone()
                .map(|level| Action::Latency { level })
        });
        plan.push_vm_phase("Add passthrough device(s)", vms, |vm| {
            let d = &vm.devices;
            (!d.device.is_empty()).then(|| Action::Passthrough {
                devices: d.device.clone(),
                mmio_size: d.mmio_size,
            })
        });
        plan.push_vm_phase("Add vGPU", vms, |vm| {
            vm.devices
                .vgpu
                .clone()
                .map(|profile| Action::Vgpu { profile })
        });
        plan.push_vm_phase("Add SR-IOV device(s)", vms, |vm| {
            let d = &vm.devices;
            (!d.sriov_port_group.is_empty()).then(|| Action::Sriov {
                pf: d.pf.clone(),
                port_groups: d.sriov_port_group.clone(),
                dvs_names: d.sriov_dvs_name.clone(),
            })
        });
        plan.push_vm_phase("Add PVRDMA device", vms, |vm| {
            vm.devices
                .pvrdma_port_group
                .clone()
                .map(|port_group| Action::Pvrdma { port_group })
        });
        plan.push_vm_phase("Configure secure boot", vms, |vm| {
            vm.secure_boot.map(|enabled| Action::SecureBoot { enabled })
        });
        // VMs power on unless told otherwise
        plan.push_vm_phase("Power on", vms, |vm| {
            (!is_power_off(vm)).then_some(Action::PowerOn)
        });
        plan.push_vm_phase("Power off", vms, |vm| is_power_off(vm).then_some(Action::PowerOff));

        plan.scripts = clusterfile::collect_scripts_with(vms, order)?;
        plan.report_addresses = vms.iter().map(|vm| vm.vm.clone()).collect();
        Ok(plan)
    }

    /// Plan the removal of everything in `spec`
    pub fn destroy(spec: &ClusterSpec) -> Self {
        let mut plan = Self::empty(Mode::Destroy);

        let names: Vec<&str> = spec.vms.iter().map(|vm| vm.vm.as_str()).collect();
        plan.push_phase(
            "Destroy VM".to_string(),
            spec.vms
                .iter()
                .map(|vm| Step::new(&vm.vm, Action::DestroyVm))
                .collect(),
            Some(format!("Do you really want to destroy {}?", names.join(", "))),
        );

        for (op, switches) in [(SwitchOp::Svs, &spec.svs), (SwitchOp::Dvs, &spec.dvs)] {
            let names: Vec<&str> = switches.iter().map(|sw| sw.name.as_str()).collect();
            plan.push_phase(
                format!("Destroy {}", op.description()),
                switches
                    .iter()
                    .map(|sw| Step::new(&sw.name, Action::DestroySwitch(sw.clone())))
                    .collect(),
                Some(format!(
                    "Do you really want to destroy {}es {}?",
                    op.description(),
                    names.join(", ")
                )),
            );
        }
        plan
    }

    fn empty(mode: Mode) -> Self {
        Self {
            mode,
            phases: Vec::new(),
            scripts: Vec::new(),
            report_addresses: Vec::new(),
        }
    }

    /// Add a phase unless it has no steps
    fn push_phase(&mut self, name: String, steps: Vec<Step>, confirm: Option<String>) {
        if steps.is_empty() {
            log::trace!("Skipping empty phase {name}");
            return;
        }
        self.phases.push(Phase {
            name,
            steps,
            confirm,
        });
    }

    fn push_vm_phase(&mut self, name: &str, vms: &[VmRecord], action: impl Fn(&VmRecord) -> Option<Action>) {
        let steps = vms
            .iter()
            .filter_map(|vm| action(vm).map(|a| Step::new(&vm.vm, a)))
            .collect();
        self.push_phase(name.to_string(), steps, None);
    }

    /// Total number of platform steps
    pub fn total_steps(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }

    /// Total number of guest script tasks
    pub fn total_scripts(&self) -> usize {
        self.scripts.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty() && self.scripts.is_empty()
    }
}

fn clone_step(vm: &VmRecord) -> Option<Action> {
    vm.placement.template.as_ref()?;
    Some(Action::Clone {
        placement: vm.placement.clone(),
        cpu: vm.compute.cpu,
        memory: vm.compute.memory,
    })
}

fn cpu_memory_step(vm: &VmRecord) -> Option<Action> {
    let c = &vm.compute;
    if c.cpu.is_none() && c.memory.is_none() && c.cores_per_socket.is_none() {
        return None;
    }
    Some(Action::CpuMemory {
        cpu: c.cpu,
        memory: c.memory,
        cores_per_socket: c.cores_per_socket,
    })
}

fn adapter_step(vm: &VmRecord) -> Option<Action> {
    let n = &vm.network;
    let port_group = n.port_group.clone()?;
    Some(Action::NetworkAdapter {
        port_group,
        adapter_number: n.adapter_number.clone(),
        switch: n.dvs_name.clone().or_else(|| n.svs_name.clone()),
        allow_guest_mtu_change: n.allow_guest_mtu_change.unwrap_or(false),
    })
}

/// Only the exact value `off` keeps a VM powered off.
fn is_power_off(vm: &VmRecord) -> bool {
    vm.power.as_deref() == Some("off")
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut number = 0;
        for phase in &self.phases {
            writeln!(f, "{} ({})", phase.name, phase.steps.len())?;
            if let Some(prompt) = &phase.confirm {
                writeln!(f, "  requires confirmation: {prompt}")?;
            }
            for step in &phase.steps {
                number += 1;
                writeln!(f, "  {number:>3}. {}", step.description())?;
            }
        }
        for batch in &self.scripts {
            let label = batch.first().map_or("script", |t| t.label.as_str());
            writeln!(f, "Run {label} ({})", batch.len())?;
            for task in batch {
                number += 1;
                writeln!(f, "  {number:>3}. {} on {}", task.scripts.join(", "), task.vm)?;
            }
        }
        if !self.report_addresses.is_empty() {
            writeln!(f, "Report guest addresses ({})", self.report_addresses.len())?;
        }
        Ok(())
    }
}
