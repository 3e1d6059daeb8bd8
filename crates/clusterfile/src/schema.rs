//! Key schemas for switch and VM entries.
//!
//! Every key an entry may carry is listed once, together with the kind of
//! value it holds. [`coerce`] turns a raw operand value into a typed
//! [`Field`] according to that kind.

use crate::error::{Error, Result};
use serde::Serialize;

/// Entity an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Standard or distributed virtual switch
    Switch,
    /// Virtual machine
    Vm,
}

impl EntityKind {
    /// Key carrying the entity's identity.
    pub fn identity_key(self) -> &'static str {
        match self {
            Self::Switch => "name",
            Self::Vm => "vm",
        }
    }

    fn table(self) -> &'static [(&'static str, FieldKind)] {
        match self {
            Self::Switch => SWITCH_KEYS,
            Self::Vm => VM_KEYS,
        }
    }
}

/// How a key's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Float,
    Bool,
    /// `[a,b,c]` literal, or a single bare value
    List,
    /// Repeated key; values accumulate in order
    Append,
    /// Relabels the pending `script` values with a sequence number
    Sequence,
}

/// A typed value held by a record under construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Append(Vec<String>),
}

impl Field {
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_int(self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn into_float(self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Items of a list or append value.
    pub fn into_items(self) -> Vec<String> {
        match self {
            Self::List(items) | Self::Append(items) => items,
            _ => Vec::new(),
        }
    }

    /// Operand text that parses back to this value.
    pub fn to_operand_value(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::List(items) | Self::Append(items) => {
                let escaped: Vec<String> = items.iter().map(|i| i.replace(',', "\\,")).collect();
                format!("[{}]", escaped.join(","))
            }
        }
    }
}

/// Keys accepted in `_SVS_` / `_DVS_` entries.
pub const SWITCH_KEYS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Str),
    ("port_group", FieldKind::Str),
    ("host", FieldKind::Str),
    ("datacenter", FieldKind::Str),
    ("mtu", FieldKind::Int),
    ("pnic", FieldKind::List),
];

/// Keys accepted in `_VMS_` entries.
pub const VM_KEYS: &[(&str, FieldKind)] = &[
    ("vm", FieldKind::Str),
    ("template", FieldKind::Str),
    ("datacenter", FieldKind::Str),
    ("datastore", FieldKind::Str),
    ("cluster", FieldKind::Str),
    ("host", FieldKind::Str),
    ("vm_folder", FieldKind::Str),
    ("resource_pool", FieldKind::Str),
    ("latency", FieldKind::Str),
    ("guest_username", FieldKind::Str),
    ("guest_password", FieldKind::Str),
    ("port_group", FieldKind::Str),
    ("ip", FieldKind::Str),
    ("adapter_number", FieldKind::Str),
    ("netmask", FieldKind::Str),
    ("gateway", FieldKind::Str),
    ("domain", FieldKind::Str),
    ("guest_hostname", FieldKind::Str),
    ("vgpu", FieldKind::Str),
    ("pvrdma_port_group", FieldKind::Str),
    ("power", FieldKind::Str),
    ("dvs_name", FieldKind::Str),
    ("svs_name", FieldKind::Str),
    ("memory", FieldKind::Float),
    ("cpu", FieldKind::Int),
    ("mmio_size", FieldKind::Int),
    ("cpu_shares", FieldKind::Int),
    ("memory_shares", FieldKind::Int),
    ("cores_per_socket", FieldKind::Int),
    ("cpu_reservation", FieldKind::Bool),
    ("memory_reservation", FieldKind::Bool),
    ("is_dhcp", FieldKind::Bool),
    ("linked", FieldKind::Bool),
    ("instant", FieldKind::Bool),
    ("secure_boot", FieldKind::Bool),
    ("allow_guest_mtu_change", FieldKind::Bool),
    ("device", FieldKind::List),
    ("dns", FieldKind::List),
    ("script", FieldKind::Append),
    ("pf", FieldKind::Append),
    ("sriov_port_group", FieldKind::Append),
    ("sriov_dvs_name", FieldKind::Append),
    ("sequence", FieldKind::Sequence),
];

/// Look up a key, returning its canonical name and kind.
pub fn lookup(entity: EntityKind, key: &str) -> Option<(&'static str, FieldKind)> {
    entity.table().iter().copied().find(|(name, _)| *name == key)
}

/// Coerce a raw value into the field type for `kind`.
///
/// [`FieldKind::Append`] yields a one-element list to be merged by the
/// caller. [`FieldKind::Sequence`] yields the validated sequence number.
pub fn coerce(key: &str, kind: FieldKind, raw: &str) -> Result<Field> {
    let invalid = |expected| Error::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    };

    match kind {
        FieldKind::Str => Ok(Field::Str(raw.to_string())),
        FieldKind::Int => raw
            .parse()
            .map(Field::Int)
            .map_err(|_| invalid("an integer")),
        FieldKind::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Field::Float)
            .ok_or_else(|| invalid("a number")),
        FieldKind::Bool => parse_bool(raw)
            .map(Field::Bool)
            .ok_or_else(|| invalid("a boolean (yes/no, true/false, on/off, 1/0)")),
        FieldKind::List => Ok(Field::List(parse_list(raw))),
        FieldKind::Append => Ok(Field::Append(vec![raw.to_string()])),
        FieldKind::Sequence => {
            if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
                Ok(Field::Str(raw.to_string()))
            } else {
                Err(invalid("a sequence number"))
            }
        }
    }
}

/// Permissive boolean parser shared by values and operator answers.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parse `[a,b,c]` into items; a value without brackets is a single item.
///
/// Commas escaped as `\,` stay inside an item. Items are trimmed and
/// surrounding quotes are removed.
pub fn parse_list(raw: &str) -> Vec<String> {
    let Some(inner) = raw
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    else {
        return vec![raw.to_string()];
    };

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .iter()
        .map(|item| unquote(item.trim()).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn unquote(item: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = item
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_per_entity() {
        assert_eq!(
            lookup(EntityKind::Switch, "mtu"),
            Some(("mtu", FieldKind::Int))
        );
        assert_eq!(lookup(EntityKind::Switch, "cpu"), None);
        assert_eq!(
            lookup(EntityKind::Vm, "script"),
            Some(("script", FieldKind::Append))
        );
        assert_eq!(lookup(EntityKind::Vm, "pnic"), None);
    }

    #[test]
    fn test_schema_tables_have_unique_keys() {
        for table in [SWITCH_KEYS, VM_KEYS] {
            let mut names: Vec<_> = table.iter().map(|(n, _)| *n).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len());
        }
    }

    #[test]
    fn test_identity_keys_are_strings() {
        for entity in [EntityKind::Switch, EntityKind::Vm] {
            assert_eq!(
                lookup(entity, entity.identity_key()).map(|(_, k)| k),
                Some(FieldKind::Str)
            );
        }
    }

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(coerce("cpu", FieldKind::Int, "4").unwrap(), Field::Int(4));
        assert_eq!(
            coerce("memory", FieldKind::Float, "16.5").unwrap(),
            Field::Float(16.5)
        );
        assert_eq!(
            coerce("linked", FieldKind::Bool, "Yes").unwrap(),
            Field::Bool(true)
        );
        assert_eq!(
            coerce("host", FieldKind::Str, "esx1").unwrap(),
            Field::Str("esx1".into())
        );
    }

    #[test]
    fn test_coerce_rejects_bad_values() {
        assert!(matches!(
            coerce("cpu", FieldKind::Int, "four"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(coerce("memory", FieldKind::Float, "NaN").is_err());
        assert!(coerce("linked", FieldKind::Bool, "maybe").is_err());
        assert!(coerce("sequence", FieldKind::Sequence, "first").is_err());
    }

    #[test]
    fn test_parse_bool_forms() {
        for s in ["y", "YES", "t", "True", "on", "1", " yes "] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["n", "No", "f", "FALSE", "off", "0"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        for s in ["", "2", "yep", "nah"] {
            assert_eq!(parse_bool(s), None, "{s}");
        }
    }

    #[test]
    fn test_parse_list_literal() {
        assert_eq!(parse_list("[vmnic0,vmnic1]"), vec!["vmnic0", "vmnic1"]);
        assert_eq!(parse_list("['a', \"b\"]"), vec!["a", "b"]);
        assert_eq!(parse_list("[]"), Vec::<String>::new());
        assert_eq!(parse_list("[a,,b,]"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_list_bare_value() {
        assert_eq!(parse_list("vmnic0"), vec!["vmnic0"]);
    }

    #[test]
    fn test_parse_list_escaped_comma() {
        assert_eq!(parse_list(r"[a\,b,c]"), vec!["a,b", "c"]);
    }

    #[test]
    fn test_list_operand_value_reparses() {
        let field = Field::List(vec!["a,b".into(), "c".into()]);
        assert_eq!(parse_list(&field.to_operand_value()), vec!["a,b", "c"]);
    }
}
