//! Entity records.
//!
//! Reading happens in two phases. A [`RecordBuilder`] collects typed fields
//! while operands are applied and while ranges are unfolded. Once an entity
//! is fully resolved it is finalized into a [`SwitchRecord`] or [`VmRecord`].

use crate::error::{Error, Result};
use crate::schema::{self, EntityKind, Field, FieldKind};
use crate::tokens::Operand;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Builder
// ============================================================================

/// Key used for unlabelled scripts; labelled ones append the sequence number.
pub const SCRIPT_KEY: &str = "script";

/// A list of scripts sharing one execution label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptGroup {
    /// `script` for the pending group, `scriptN` after `sequence:N`
    pub label: String,
    /// Script paths in definition order
    pub scripts: Vec<String>,
}

impl ScriptGroup {
    /// The `N` of a `sequence:N` label, if this group has one.
    pub fn sequence(&self) -> Option<&str> {
        self.label
            .strip_prefix(SCRIPT_KEY)
            .filter(|n| !n.is_empty())
    }
}

/// Script accumulator: sequence-labelled groups plus one pending list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptSlots {
    labelled: Vec<ScriptGroup>,
    pending: Vec<String>,
}

impl ScriptSlots {
    fn push(&mut self, script: String) {
        self.pending.push(script);
    }

    /// Move pending scripts under `script<sequence>`.
    fn relabel(&mut self, sequence: &str) -> Result<()> {
        let label = format!("{SCRIPT_KEY}{sequence}");
        if self.pending.is_empty() {
            return Err(Error::InvalidValue {
                key: "sequence".to_string(),
                value: sequence.to_string(),
                expected: "to follow at least one script",
            });
        }
        if self.labelled.iter().any(|g| g.label == label) {
            return Err(Error::InvalidValue {
                key: "sequence".to_string(),
                value: sequence.to_string(),
                expected: "a sequence number not used earlier in the entry",
            });
        }
        self.labelled.push(ScriptGroup {
            label,
            scripts: std::mem::take(&mut self.pending),
        });
        Ok(())
    }

    /// Labelled groups, then the pending group if non-empty.
    fn into_groups(self) -> Vec<ScriptGroup> {
        let mut groups = self.labelled;
        if !self.pending.is_empty() {
            groups.push(ScriptGroup {
                label: SCRIPT_KEY.to_string(),
                scripts: self.pending,
            });
        }
        groups
    }
}

/// Mutable record used while an entry is being read.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    entity: EntityKind,
    identity: String,
    fields: BTreeMap<&'static str, Field>,
    scripts: ScriptSlots,
}

impl RecordBuilder {
    /// Start a record for `entity` named `identity`.
    pub fn new(entity: EntityKind, identity: impl Into<String>) -> Self {
        Self {
            entity,
            identity: identity.into(),
            fields: BTreeMap::new(),
            scripts: ScriptSlots::default(),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn set_identity(&mut self, identity: impl Into<String>) {
        self.identity = identity.into();
    }

    /// Apply one operand; unknown keys fail with [`Error::UnknownKey`].
    pub fn apply(&mut self, operand: &Operand) -> Result<()> {
        let (key, kind) =
            schema::lookup(self.entity, &operand.key).ok_or_else(|| Error::UnknownKey {
                key: operand.key.clone(),
            })?;

        if key == self.entity.identity_key() {
            self.identity.clone_from(&operand.value);
            return Ok(());
        }

        match kind {
            FieldKind::Append if key == SCRIPT_KEY => self.scripts.push(operand.value.clone()),
            FieldKind::Append => {
                let item = operand.value.clone();
                match self.fields.get_mut(key) {
                    Some(Field::Append(items)) => items.push(item),
                    _ => {
                        self.fields.insert(key, Field::Append(vec![item]));
                    }
                }
            }
            FieldKind::Sequence => {
                schema::coerce(key, kind, &operand.value)?;
                self.scripts.relabel(&operand.value)?;
            }
            _ => {
                let field = schema::coerce(key, kind, &operand.value)?;
                self.fields.insert(key, field);
            }
        }
        Ok(())
    }

    /// Apply operands in order.
    pub fn apply_all(&mut self, operands: &[Operand]) -> Result<()> {
        operands.iter().try_for_each(|o| self.apply(o))
    }

    /// String value of `key`, if set.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Field::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Replace the string value of a schema key.
    pub fn set_str(&mut self, key: &'static str, value: String) {
        self.fields.insert(key, Field::Str(value));
    }

    fn finish(self) -> Result<(String, BTreeMap<&'static str, Field>, Vec<ScriptGroup>)> {
        if self.identity.trim().is_empty() {
            return Err(Error::MissingRequiredKey {
                key: self.entity.identity_key().to_string(),
                entity: "entry".to_string(),
            });
        }
        Ok((self.identity, self.fields, self.scripts.into_groups()))
    }
}

// ============================================================================
// Switch Records
// ============================================================================

/// Which kind of switch an entry creates or destroys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchOp {
    /// Standard virtual switch (`_SVS_`)
    Svs,
    /// Distributed virtual switch (`_DVS_`)
    Dvs,
}

impl SwitchOp {
    /// Derive the operation from a directive section name.
    pub fn from_section(section: &str) -> Result<Self> {
        match section.replace('_', "").to_lowercase().as_str() {
            "svs" => Ok(Self::Svs),
            "dvs" => Ok(Self::Dvs),
            _ => Err(Error::UnknownOperation {
                name: section.to_string(),
            }),
        }
    }

    /// Human-readable switch kind.
    pub fn description(self) -> &'static str {
        match self {
            Self::Svs => "standard virtual switch",
            Self::Dvs => "distributed virtual switch",
        }
    }
}

impl fmt::Display for SwitchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Svs => write!(f, "svs"),
            Self::Dvs => write!(f, "dvs"),
        }
    }
}

/// A resolved virtual switch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchRecord {
    pub op: SwitchOp,
    pub name: String,
    pub port_group: Option<String>,
    /// Member hosts, expanded from a scatter range if one was given
    pub hosts: Vec<String>,
    pub datacenter: Option<String>,
    pub mtu: Option<i64>,
    pub pnic: Vec<String>,
}

impl SwitchRecord {
    /// Finalize a switch builder with its resolved host list.
    pub fn from_builder(op: SwitchOp, builder: RecordBuilder, hosts: Vec<String>) -> Result<Self> {
        let (name, fields, _) = builder.finish()?;
        let mut record = Self {
            op,
            name,
            port_group: None,
            hosts,
            datacenter: None,
            mtu: None,
            pnic: Vec::new(),
        };
        for (key, field) in fields {
            match key {
                "port_group" => record.port_group = field.into_string(),
                "datacenter" => record.datacenter = field.into_string(),
                "mtu" => record.mtu = field.into_int(),
                "pnic" => record.pnic = field.into_items(),
                // host is resolved by the reader
                _ => {}
            }
        }
        Ok(record)
    }
}

// ============================================================================
// VM Records
// ============================================================================

/// Where and how the VM is cloned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub template: Option<String>,
    pub datacenter: Option<String>,
    pub cluster: Option<String>,
    pub host: Option<String>,
    pub datastore: Option<String>,
    pub vm_folder: Option<String>,
    pub resource_pool: Option<String>,
    pub linked: Option<bool>,
    pub instant: Option<bool>,
}

/// CPU, memory and scheduling settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Compute {
    pub cpu: Option<i64>,
    /// Memory in GB
    pub memory: Option<f64>,
    pub cores_per_socket: Option<i64>,
    pub cpu_shares: Option<i64>,
    pub memory_shares: Option<i64>,
    pub cpu_reservation: Option<bool>,
    pub memory_reservation: Option<bool>,
    pub latency: Option<String>,
}

/// Network adapter and guest network settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Network {
    pub port_group: Option<String>,
    pub adapter_number: Option<String>,
    pub ip: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    pub dns: Vec<String>,
    pub domain: Option<String>,
    pub is_dhcp: Option<bool>,
    pub dvs_name: Option<String>,
    pub svs_name: Option<String>,
    pub allow_guest_mtu_change: Option<bool>,
}

/// Passthrough, vGPU, SR-IOV and PVRDMA devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Devices {
    pub device: Vec<String>,
    pub mmio_size: Option<i64>,
    pub vgpu: Option<String>,
    pub pf: Vec<String>,
    pub sriov_port_group: Vec<String>,
    pub sriov_dvs_name: Vec<String>,
    pub pvrdma_port_group: Option<String>,
}

/// Guest OS credentials and identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Guest {
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub hostname: Option<String>,
}

/// A resolved virtual machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmRecord {
    pub vm: String,
    pub placement: Placement,
    pub compute: Compute,
    pub network: Network,
    pub devices: Devices,
    pub guest: Guest,
    pub power: Option<String>,
    pub secure_boot: Option<bool>,
    pub scripts: Vec<ScriptGroup>,
}

impl VmRecord {
    /// Finalize a fully unfolded VM builder.
    pub fn from_builder(builder: RecordBuilder) -> Result<Self> {
        let (vm, fields, scripts) = builder.finish()?;
        let mut record = Self {
            vm,
            placement: Placement::default(),
            compute: Compute::default(),
            network: Network::default(),
            devices: Devices::default(),
            guest: Guest::default(),
            power: None,
            secure_boot: None,
            scripts,
        };
        for (key, field) in fields {
            record.assign(key, field);
        }
        Ok(record)
    }

    fn assign(&mut self, key: &str, field: Field) {
        let (p, c, n, d, g) = (
            &mut self.placement,
            &mut self.compute,
            &mut self.network,
            &mut self.devices,
            &mut self.guest,
        );
        match key {
            "template" => p.template = field.into_string(),
            "datacenter" => p.datacenter = field.into_string(),
            "cluster" => p.cluster = field.into_string(),
            "host" => p.host = field.into_string(),
            "datastore" => p.datastore = field.into_string(),
            "vm_folder" => p.vm_folder = field.into_string(),
            "resource_pool" => p.resource_pool = field.into_string(),
            "linked" => p.linked = field.into_bool(),
            "instant" => p.instant = field.into_bool(),
            "cpu" => c.cpu = field.into_int(),
            "memory" => c.memory = field.into_float(),
            "cores_per_socket" => c.cores_per_socket = field.into_int(),
            "cpu_shares" => c.cpu_shares = field.into_int(),
            "memory_shares" => c.memory_shares = field.into_int(),
            "cpu_reservation" => c.cpu_reservation = field.into_bool(),
            "memory_reservation" => c.memory_reservation = field.into_bool(),
            "latency" => c.latency = field.into_string(),
            "port_group" => n.port_group = field.into_string(),
            "adapter_number" => n.adapter_number = field.into_string(),
            "ip" => n.ip = field.into_string(),
            "netmask" => n.netmask = field.into_string(),
            "gateway" => n.gateway = field.into_string(),
            "dns" => n.dns = field.into_items(),
            "domain" => n.domain = field.into_string(),
            "is_dhcp" => n.is_dhcp = field.into_bool(),
            "dvs_name" => n.dvs_name = field.into_string(),
            "svs_name" => n.svs_name = field.into_string(),
            "allow_guest_mtu_change" => n.allow_guest_mtu_change = field.into_bool(),
            "device" => d.device = field.into_items(),
            "mmio_size" => d.mmio_size = field.into_int(),
            "vgpu" => d.vgpu = field.into_string(),
            "pf" => d.pf = field.into_items(),
            "sriov_port_group" => d.sriov_port_group = field.into_items(),
            "sriov_dvs_name" => d.sriov_dvs_name = field.into_items(),
            "pvrdma_port_group" => d.pvrdma_port_group = field.into_string(),
            "guest_username" => g.username = field.into_string(),
            "guest_password" => g.password = field.into_string(),
            "guest_hostname" => g.hostname = field.into_string(),
            "power" => self.power = field.into_string(),
            "secure_boot" => self.secure_boot = field.into_bool(),
            _ => log::warn!("Ignoring {key} on {}: no VM setting for it", self.vm),
        }
    }

    /// Every set property as `(key, value)`, scripts excluded.
    pub fn properties(&self) -> Vec<(&'static str, Field)> {
        fn s(out: &mut Vec<(&'static str, Field)>, key: &'static str, v: Option<&String>) {
            if let Some(v) = v {
                out.push((key, Field::Str(v.clone())));
            }
        }
        fn i(out: &mut Vec<(&'static str, Field)>, key: &'static str, v: Option<i64>) {
            if let Some(v) = v {
                out.push((key, Field::Int(v)));
            }
        }
        fn b(out: &mut Vec<(&'static str, Field)>, key: &'static str, v: Option<bool>) {
            if let Some(v) = v {
                out.push((key, Field::Bool(v)));
            }
        }
        fn l(out: &mut Vec<(&'static str, Field)>, key: &'static str, v: &[String], list: bool) {
            if v.is_empty() {
                return;
            }
            let field = if list {
                Field::List(v.to_vec())
            } else {
                Field::Append(v.to_vec())
            };
            out.push((key, field));
        }

        let (p, c, n, d, g) = (
            &self.placement,
            &self.compute,
            &self.network,
            &self.devices,
            &self.guest,
        );
        let mut out = Vec::new();
        s(&mut out, "template", p.template.as_ref());
        s(&mut out, "datacenter", p.datacenter.as_ref());
        s(&mut out, "cluster", p.cluster.as_ref());
        s(&mut out, "host", p.host.as_ref());
        s(&mut out, "datastore", p.datastore.as_ref());
        s(&mut out, "vm_folder", p.vm_folder.as_ref());
        s(&mut out, "resource_pool", p.resource_pool.as_ref());
        b(&mut out, "linked", p.linked);
        b(&mut out, "instant", p.instant);
        i(&mut out, "cpu", c.cpu);
        if let Some(memory) = c.memory {
            out.push(("memory", Field::Float(memory)));
        }
        i(&mut out, "cores_per_socket", c.cores_per_socket);
        i(&mut out, "cpu_shares", c.cpu_shares);
        i(&mut out, "memory_shares", c.memory_shares);
        b(&mut out, "cpu_reservation", c.cpu_reservation);
        b(&mut out, "memory_reservation", c.memory_reservation);
        s(&mut out, "latency", c.latency.as_ref());
        s(&mut out, "port_group", n.port_group.as_ref());
        s(&mut out, "adapter_number", n.adapter_number.as_ref());
        s(&mut out, "ip", n.ip.as_ref());
        s(&mut out, "netmask", n.netmask.as_ref());
        s(&mut out, "gateway", n.gateway.as_ref());
        l(&mut out, "dns", &n.dns, true);
        s(&mut out, "domain", n.domain.as_ref());
        b(&mut out, "is_dhcp", n.is_dhcp);
        s(&mut out, "dvs_name", n.dvs_name.as_ref());
        s(&mut out, "svs_name", n.svs_name.as_ref());
        b(&mut out, "allow_guest_mtu_change", n.allow_guest_mtu_change);
        l(&mut out, "device", &d.device, true);
        i(&mut out, "mmio_size", d.mmio_size);
        s(&mut out, "vgpu", d.vgpu.as_ref());
        l(&mut out, "pf", &d.pf, false);
        l(&mut out, "sriov_port_group", &d.sriov_port_group, false);
        l(&mut out, "sriov_dvs_name", &d.sriov_dvs_name, false);
        s(&mut out, "pvrdma_port_group", d.pvrdma_port_group.as_ref());
        s(&mut out, "guest_username", g.username.as_ref());
        s(&mut out, "guest_password", g.password.as_ref());
        s(&mut out, "guest_hostname", g.hostname.as_ref());
        s(&mut out, "power", self.power.as_ref());
        b(&mut out, "secure_boot", self.secure_boot);
        out
    }

    /// Operand tokens that read back into this record.
    ///
    /// Append keys are emitted once per item, and each labelled script
    /// group is followed by its `sequence:N` token.
    pub fn to_operands(&self) -> Vec<String> {
        let mut tokens = vec![format!("vm:{}", self.vm)];
        for (key, field) in self.properties() {
            match field {
                Field::Append(items) => {
                    tokens.extend(items.iter().map(|item| format!("{key}:{item}")));
                }
                other => tokens.push(format!("{key}:{}", other.to_operand_value())),
            }
        }
        for group in &self.scripts {
            tokens.extend(group.scripts.iter().map(|s| format!("{SCRIPT_KEY}:{s}")));
            if let Some(sequence) = group.sequence() {
                tokens.push(format!("sequence:{sequence}"));
            }
        }
        tokens
    }
}
