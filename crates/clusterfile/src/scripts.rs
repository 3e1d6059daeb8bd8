//! Post-provisioning script scheduling.
//!
//! Every script list of every VM becomes one [`ScriptTask`]. Tasks are
//! grouped into batches by label: all tasks of one batch run before any
//! task of the next.

use crate::error::{Error, Result};
use crate::record::{SCRIPT_KEY, VmRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One script list to run inside one guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptTask {
    pub guest_username: String,
    #[serde(skip_serializing)]
    pub guest_password: String,
    pub vm: String,
    pub scripts: Vec<String>,
    pub label: String,
}

/// How batch labels are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelOrder {
    /// Plain string order: `script` < `script1` < `script10` < `script2`
    #[default]
    Lexicographic,
    /// Unlabelled first, then by sequence number: `script1` < `script2` < `script10`
    Numeric,
}

impl LabelOrder {
    /// Compare two labels.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Lexicographic => a.cmp(b),
            Self::Numeric => numeric_key(a).cmp(&numeric_key(b)),
        }
    }
}

fn numeric_key(label: &str) -> (Option<u128>, &str) {
    let suffix = label.strip_prefix(SCRIPT_KEY).unwrap_or(label);
    (suffix.parse().ok(), label)
}

/// Collect script tasks in batch order using [`LabelOrder::Lexicographic`].
pub fn collect_scripts(records: &[VmRecord]) -> Result<Vec<Vec<ScriptTask>>> {
    collect_scripts_with(records, LabelOrder::default())
}

/// Collect script tasks and group them into ordered batches.
///
/// A record contributes one task per non-empty script list and must then
/// carry both `guest_username` and `guest_password`. Tasks with equal
/// labels keep their record order.
pub fn collect_scripts_with(records: &[VmRecord], order: LabelOrder) -> Result<Vec<Vec<ScriptTask>>> {
    let mut tasks = Vec::new();
    for record in records {
        let groups: Vec<_> = record
            .scripts
            .iter()
            .filter(|g| !g.scripts.is_empty())
            .collect();
        if groups.is_empty() {
            continue;
        }

        let username = required(record.guest.username.as_deref(), "guest_username", &record.vm)?;
        let password = required(record.guest.password.as_deref(), "guest_password", &record.vm)?;
        tasks.extend(groups.into_iter().map(|group| ScriptTask {
            guest_username: username.to_string(),
            guest_password: password.to_string(),
            vm: record.vm.clone(),
            scripts: group.scripts.clone(),
            label: group.label.clone(),
        }));
    }

    // stable: equal labels keep record order
    tasks.sort_by(|a, b| order.compare(&a.label, &b.label));

    let mut batches: Vec<Vec<ScriptTask>> = Vec::new();
    for task in tasks {
        match batches.last_mut() {
            Some(batch) if batch[0].label == task.label => batch.push(task),
            _ => batches.push(vec![task]),
        }
    }
    log::debug!(
        "Scheduled {} script batch(es): {}",
        batches.len(),
        batches
            .iter()
            .map(|b| b[0].label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(batches)
}

fn required<'a>(value: Option<&'a str>, key: &str, vm: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::MissingRequiredKey {
            key: key.to_string(),
            entity: vm.to_string(),
        })
}
