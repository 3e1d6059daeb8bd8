//! Reader for the `_VMS_` directive section.
//!
//! A VM entry whose name carries a scatter range produces one record per
//! pivot value. The range keys below are mapped onto that pivot, and the
//! resulting table is shown to a [`Confirm`] gate before it is accepted.

use crate::confirm::{Confirm, MappingTable};
use crate::error::{Error, Result};
use crate::ini::ConfigFile;
use crate::mapping;
use crate::range::{self, Expansion};
use crate::record::{RecordBuilder, VmRecord};
use crate::schema::EntityKind;
use crate::tokens::{normalize, parse_operands};
use std::collections::HashSet;

/// Pivot key that decides how many records an entry yields.
pub const PIVOT_KEY: &str = "vm";

/// Keys that may carry a range mapped onto the pivot, in table order.
pub const RANGE_KEYS: [&str; 4] = ["host", "datastore", "guest_hostname", "ip"];

/// Read every VM entry of `section`.
///
/// A missing section yields no records. Every error aborts the whole read;
/// nothing from the section is returned.
pub fn read_vm_section(
    config: &ConfigFile,
    section: &str,
    confirm: &mut impl Confirm,
) -> Result<Vec<VmRecord>> {
    let Some(entries) = config.section(section) else {
        log::info!("No {section} section defined");
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (name, operands) in entries.entries() {
        let (identity, operands) = splice_identity(name, operands);
        let unfolded = read_entry(config, &identity, &operands, confirm)
            .map_err(|e| e.in_section(section, &identity))?;
        for record in unfolded {
            if !seen.insert(record.vm.clone()) {
                return Err(Error::DuplicateEntity { name: record.vm }.in_section(section, &identity));
            }
            records.push(record);
        }
    }
    log::debug!("Read {} VM record(s) from [{section}]", records.len());
    Ok(records)
}

/// Repair an identity whose range colon was taken as the entry delimiter.
///
/// `web{1:3}: host:esx1` arrives as name `web{1` and value
/// `3}: host:esx1`; the first colon-delimited segment of the value is moved
/// back onto the name.
pub fn splice_identity(name: &str, operands: &str) -> (String, String) {
    let normalized = normalize(operands);
    if !name.contains('{') {
        return (name.to_string(), normalized);
    }
    match normalized.split_once(':') {
        Some((tail, rest)) => (format!("{name}:{tail}"), rest.to_string()),
        None => (name.to_string(), normalized),
    }
}

fn read_entry(
    config: &ConfigFile,
    identity: &str,
    operands: &str,
    confirm: &mut impl Confirm,
) -> Result<Vec<VmRecord>> {
    let mut builder = RecordBuilder::new(EntityKind::Vm, identity);
    builder.apply_all(&parse_operands(operands, config)?)?;
    let builders = unfold(builder, confirm)?;
    builders.into_iter().map(VmRecord::from_builder).collect()
}

/// Unfold the pivot range and map the range keys onto it.
fn unfold(builder: RecordBuilder, confirm: &mut impl Confirm) -> Result<Vec<RecordBuilder>> {
    let pivot = match range::expand(builder.identity())? {
        Expansion::Scalar(_) => return Ok(vec![builder]),
        Expansion::Scatter(names) => names,
        Expansion::Bunch(_) => {
            return Err(Error::range_mapping(format!(
                "{PIVOT_KEY} range must use scatter {{lo:hi}} form"
            )));
        }
    };

    let mut mapped: Vec<(&'static str, Vec<String>)> = Vec::new();
    for key in RANGE_KEYS {
        let Some(value) = builder.get_str(key) else {
            continue;
        };
        let expansion = range::expand(value)?;
        if !expansion.is_range() {
            continue;
        }
        let values = mapping::map_expansion(&pivot, &expansion)?;
        log::debug!(
            "{key} {} over {} {PIVOT_KEY} value(s)",
            mapping::describe(expansion.kind()),
            pivot.len()
        );
        mapped.push((key, values));
    }

    let table = MappingTable::from_columns(
        std::iter::once((PIVOT_KEY.to_string(), pivot.clone()))
            .chain(mapped.iter().map(|(k, v)| ((*k).to_string(), v.clone())))
            .collect(),
    );
    if !confirm.confirm_mapping(&table)? {
        return Err(Error::NotConfirmed {
            reason: format!("range mapping for {} declined", builder.identity()),
        });
    }

    Ok(pivot
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut unfolded = builder.clone();
            unfolded.set_identity(name.clone());
            for (key, values) in &mapped {
                unfolded.set_str(*key, values[i].clone());
            }
            unfolded
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{AutoConfirm, AutoDecline};
    use crate::error::ErrorCategory;

    fn read(content: &str) -> Result<Vec<VmRecord>> {
        read_vm_section(&ConfigFile::parse(content).unwrap(), "_VMS_", &mut AutoConfirm)
    }

    fn names(records: &[VmRecord]) -> Vec<&str> {
        records.iter().map(|r| r.vm.as_str()).collect()
    }

    #[test]
    fn test_missing_section_is_empty() {
        assert!(read("[_SVS_]\nsw = host:esx1\n").unwrap().is_empty());
    }

    #[test]
    fn test_splice_identity() {
        assert_eq!(
            splice_identity("web{1", "3}: host:esx1 cpu:2"),
            ("web{1:3}".to_string(), "host:esx1 cpu:2".to_string())
        );
        assert_eq!(
            splice_identity("db", "cpu : 2"),
            ("db".to_string(), "cpu:2".to_string())
        );
    }

    #[test]
    fn test_single_vm_without_range() {
        let records = read("[_VMS_]\ndb01 = template:centos cpu:4 host:esx1\n").unwrap();
        assert_eq!(names(&records), vec!["db01"]);
        assert_eq!(records[0].placement.host.as_deref(), Some("esx1"));
        assert_eq!(records[0].compute.cpu, Some(4));
    }

    #[test]
    fn test_fan_out_with_scatter_host_and_script() {
        let records = read("[_VMS_]\nvm{1:2}: host:h{1:2} script:/s.sh\n").unwrap();
        assert_eq!(names(&records), vec!["vm1", "vm2"]);
        assert_eq!(records[0].placement.host.as_deref(), Some("h1"));
        assert_eq!(records[1].placement.host.as_deref(), Some("h2"));
        for record in &records {
            assert_eq!(record.scripts.len(), 1);
            assert_eq!(record.scripts[0].label, "script");
            assert_eq!(record.scripts[0].scripts, vec!["/s.sh"]);
        }
    }

    #[test]
    fn test_bunch_datastore_and_scalar_copy() {
        let records = read(
            "[_VMS_]\nweb{1:4}: host:esx{1:2} datastore:ds{{1:2}} template:centos\n",
        )
        .unwrap();
        let hosts: Vec<_> = records.iter().map(|r| r.placement.host.clone().unwrap()).collect();
        let stores: Vec<_> = records
            .iter()
            .map(|r| r.placement.datastore.clone().unwrap())
            .collect();
        assert_eq!(hosts, vec!["esx1", "esx2", "esx1", "esx2"]);
        assert_eq!(stores, vec!["ds1", "ds1", "ds2", "ds2"]);
        assert!(
            records
                .iter()
                .all(|r| r.placement.template.as_deref() == Some("centos"))
        );
    }

    #[test]
    fn test_range_key_without_pivot_range_stays_literal() {
        let records = read("[_VMS_]\nsolo = host:esx{1:2}\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].placement.host.as_deref(), Some("esx{1:2}"));
    }

    #[test]
    fn test_confirmation_sees_mapping_table() {
        let config =
            ConfigFile::parse("[_VMS_]\nn{1:3}: ip:10.0.0.{10:12} host:esx1\n").unwrap();
        let mut shown = None;
        let mut gate = |t: &MappingTable| -> Result<bool> {
            shown = Some(t.clone());
            Ok(true)
        };
        read_vm_section(&config, "_VMS_", &mut gate).unwrap();
        let table = shown.unwrap();
        assert_eq!(table.columns, vec!["vm", "ip"]);
        assert_eq!(table.rows[2], vec!["n3", "10.0.0.12"]);
    }

    #[test]
    fn test_declined_mapping_aborts() {
        let config = ConfigFile::parse("[_VMS_]\nvm{1:2}: host:h{1:2}\n").unwrap();
        let err = read_vm_section(&config, "_VMS_", &mut AutoDecline).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotConfirmed);
    }

    #[test]
    fn test_single_record_skips_confirmation() {
        let config = ConfigFile::parse("[_VMS_]\nvm1 = host:h1\n").unwrap();
        let records = read_vm_section(&config, "_VMS_", &mut AutoDecline).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_unknown_token_aborts_section() {
        let err = read("[_VMS_]\nok = cpu:2\nvm{1:2}: host:h1 nosuch\n").unwrap_err();
        assert!(matches!(err.root(), Error::UnknownKey { key } if key == "nosuch"));
    }

    #[test]
    fn test_uneven_bunch_fails() {
        let err = read("[_VMS_]\nvm{1:3}: datastore:ds{{1:2}}\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RangeMapping);
    }

    #[test]
    fn test_mapped_range_longer_than_pivot_fails() {
        let err = read("[_VMS_]\nvm{1:2}: host:esx{1:3}\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RangeMapping);
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let err = read("[_VMS_]\nvm{1:2}: cpu:2\nvm2 = cpu:4\n").unwrap_err();
        assert!(matches!(err.root(), Error::DuplicateEntity { name } if name == "vm2"));
    }

    #[test]
    fn test_bundle_applies_to_every_record() {
        let records = read(
            "[_VMS_]\nc{1:2}: creds\n[creds]\nguest_username = root\nguest_password = pw\n",
        )
        .unwrap();
        assert!(
            records
                .iter()
                .all(|r| r.guest.username.as_deref() == Some("root"))
        );
    }
}
