//! # Clusterfile
//!
//! Reader for cluster files: INI-style documents that declare virtual
//! switches and virtual machines using compact range expressions.
//!
//! ```text
//! [_SVS_]
//! vSwitch1 = port_group:pg1 host:esx{1:2} mtu:9000
//!
//! [_VMS_]
//! web{1:4}: template:centos host:esx{1:2} datastore:ds{{1:2}} creds
//!           script:/opt/setup.sh sequence:1 script:/opt/app.sh
//!
//! [creds]
//! guest_username = root
//! guest_password = secret
//! ```
//!
//! ## Pipeline
//!
//! 1. [`ini`] splits the file into sections and raw entries.
//! 2. [`tokens`] turns an entry's operands into `key:value` pairs, inlining
//!    property bundles.
//! 3. [`record`] types each value against the [`schema`].
//! 4. [`range`] and [`mapping`] unfold `{lo:hi}` and `{{lo:hi}}` ranges.
//! 5. [`confirm`] asks the operator to accept multi-record fan-outs.
//! 6. [`scripts`] orders post-provisioning scripts into batches.
//!
//! The crate does no terminal I/O. Confirmation is injected through the
//! [`Confirm`] trait.

pub mod confirm;
pub mod error;
pub mod ini;
pub mod mapping;
pub mod range;
pub mod record;
pub mod schema;
pub mod scripts;
pub mod switch;
pub mod tokens;
pub mod vm;

pub use confirm::{AutoConfirm, AutoDecline, Confirm, MappingTable, parse_answer};
pub use error::{Error, ErrorCategory, Result};
pub use ini::ConfigFile;
pub use record::{ScriptGroup, SwitchOp, SwitchRecord, VmRecord};
pub use scripts::{LabelOrder, ScriptTask, collect_scripts, collect_scripts_with};
pub use switch::read_switch_section;
pub use vm::read_vm_section;

use serde::Serialize;
use std::path::Path;

/// Section holding standard virtual switches.
pub const SVS_SECTION: &str = "_SVS_";
/// Section holding distributed virtual switches.
pub const DVS_SECTION: &str = "_DVS_";
/// Section holding virtual machines.
pub const VMS_SECTION: &str = "_VMS_";

const DIRECTIVES: [&str; 3] = [SVS_SECTION, DVS_SECTION, VMS_SECTION];

/// Everything a cluster file declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterSpec {
    pub svs: Vec<SwitchRecord>,
    pub dvs: Vec<SwitchRecord>,
    pub vms: Vec<VmRecord>,
}

impl ClusterSpec {
    /// Whether no entity was declared.
    pub fn is_empty(&self) -> bool {
        self.svs.is_empty() && self.dvs.is_empty() && self.vms.is_empty()
    }

    /// Standard then distributed switches.
    pub fn switches(&self) -> impl Iterator<Item = &SwitchRecord> {
        self.svs.iter().chain(&self.dvs)
    }
}

/// A loaded cluster file, ready to be read.
#[derive(Debug, Clone)]
pub struct ClusterFile {
    config: ConfigFile,
}

impl ClusterFile {
    /// Load a cluster file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        log::debug!("Loading cluster file {}", path.display());
        Ok(Self {
            config: ConfigFile::load(path)?,
        })
    }

    /// Parse cluster file content.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(Self {
            config: ConfigFile::parse(content)?,
        })
    }

    /// The underlying sections.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Read `_SVS_`, `_DVS_` and `_VMS_` in that order.
    ///
    /// Fails on directive sections no reader understands and when the file
    /// declares nothing at all.
    pub fn read(&self, confirm: &mut impl Confirm) -> Result<ClusterSpec> {
        if let Some(unknown) = self
            .config
            .sections()
            .iter()
            .find(|s| s.is_directive() && !DIRECTIVES.contains(&s.name()))
        {
            return Err(Error::UnknownOperation {
                name: unknown.name().to_string(),
            });
        }

        let spec = ClusterSpec {
            svs: read_switch_section(&self.config, SVS_SECTION)?,
            dvs: read_switch_section(&self.config, DVS_SECTION)?,
            vms: read_vm_section(&self.config, VMS_SECTION, confirm)?,
        };
        if spec.is_empty() {
            return Err(Error::EmptyCluster);
        }
        log::info!(
            "Read {} standard switch(es), {} distributed switch(es), {} VM(s)",
            spec.svs.len(),
            spec.dvs.len(),
            spec.vms.len()
        );
        Ok(spec)
    }
}
