//! Reader for the `_SVS_` and `_DVS_` directive sections.

use crate::error::{Error, Result};
use crate::ini::ConfigFile;
use crate::range::{self, Expansion};
use crate::record::{RecordBuilder, SwitchOp, SwitchRecord};
use crate::schema::EntityKind;
use crate::tokens::parse_operands;

/// Read every switch entry of `section`.
///
/// A missing section yields no records. Any error aborts the whole read
/// and carries the section and entry it came from.
pub fn read_switch_section(config: &ConfigFile, section: &str) -> Result<Vec<SwitchRecord>> {
    let Some(entries) = config.section(section) else {
        log::debug!("No [{section}] section");
        return Ok(Vec::new());
    };
    let op = SwitchOp::from_section(section)?;

    let mut records = Vec::with_capacity(entries.len());
    for (name, operands) in entries.entries() {
        let record = read_entry(config, op, name, operands).map_err(|e| e.in_section(section, name))?;
        log::debug!(
            "Read {} {} on {} host(s)",
            op.description(),
            record.name,
            record.hosts.len()
        );
        records.push(record);
    }
    Ok(records)
}

fn read_entry(config: &ConfigFile, op: SwitchOp, name: &str, operands: &str) -> Result<SwitchRecord> {
    let mut builder = RecordBuilder::new(EntityKind::Switch, name);
    builder.apply_all(&parse_operands(operands, config)?)?;
    let hosts = unfold_hosts(builder.get_str("host"))?;
    SwitchRecord::from_builder(op, builder, hosts)
}

/// Expand the `host` value into the switch's member hosts.
fn unfold_hosts(host: Option<&str>) -> Result<Vec<String>> {
    let Some(host) = host else {
        return Ok(Vec::new());
    };
    match range::expand(host)? {
        Expansion::Scalar(h) => Ok(vec![h]),
        Expansion::Scatter(hosts) => Ok(hosts),
        Expansion::Bunch(_) => Err(Error::range_mapping(
            "cluster level operation doesn't support bunch mapping for host",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn read(content: &str, section: &str) -> Result<Vec<SwitchRecord>> {
        read_switch_section(&ConfigFile::parse(content).unwrap(), section)
    }

    #[test]
    fn test_missing_section_is_empty() {
        assert!(read("[_VMS_]\nvm1 = cpu:2\n", "_SVS_").unwrap().is_empty());
    }

    #[test]
    fn test_svs_with_host_range() {
        let records = read(
            "[_SVS_]\nvSwitch1 = port_group:pg1 host:esx{1:3} mtu:9000 pnic:[vmnic1]\n",
            "_SVS_",
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        let sw = &records[0];
        assert_eq!(sw.op, SwitchOp::Svs);
        assert_eq!(sw.name, "vSwitch1");
        assert_eq!(sw.hosts, vec!["esx1", "esx2", "esx3"]);
        assert_eq!(sw.mtu, Some(9000));
        assert_eq!(sw.pnic, vec!["vmnic1"]);
    }

    #[test]
    fn test_dvs_scalar_host_and_bundle() {
        let records = read(
            "[_DVS_]\ndvs0 = net datacenter:dc1\n[net]\nhost = esx9\nport_group = pg-data\n",
            "_DVS_",
        )
        .unwrap();
        let sw = &records[0];
        assert_eq!(sw.op, SwitchOp::Dvs);
        assert_eq!(sw.hosts, vec!["esx9"]);
        assert_eq!(sw.port_group.as_deref(), Some("pg-data"));
        assert_eq!(sw.datacenter.as_deref(), Some("dc1"));
    }

    #[test]
    fn test_name_token_overrides_entry_name() {
        let records = read("[_SVS_]\nsw = name:vSwitchX\n", "_SVS_").unwrap();
        assert_eq!(records[0].name, "vSwitchX");
    }

    #[test]
    fn test_bunch_host_rejected() {
        let err = read("[_SVS_]\nsw = host:esx{{1:2}}\n", "_SVS_").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RangeMapping);
        assert!(err.to_string().contains("[_SVS_] sw"));
    }

    #[test]
    fn test_unknown_token_aborts_section() {
        let err = read(
            "[_SVS_]\ngood = host:esx1\nbad = host:esx2 bogus\n",
            "_SVS_",
        )
        .unwrap_err();
        assert!(matches!(err.root(), Error::UnknownKey { key } if key == "bogus"));
    }

    #[test]
    fn test_vm_key_in_switch_rejected() {
        let err = read("[_SVS_]\nsw = cpu:4\n", "_SVS_").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnknownKey);
    }
}
