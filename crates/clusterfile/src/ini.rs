//! Reader for the INI-style cluster file container.
//!
//! ```text
//! [_VMS_]
//! web{1:3}: template:centos host:esx{1:3} common
//!
//! [common]
//! guest_username = root
//! guest_password = secret
//! ```
//!
//! Entry names and values are split on the first `=` or `:`, names are kept
//! case-sensitive, and indented lines continue the previous value.

use crate::error::{Error, Result};
use std::path::Path;

/// One `[name]` block of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    /// Section name as written between the brackets.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Look up one entry's raw value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the section has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this is a reserved `_NAME_` directive section.
    pub fn is_directive(&self) -> bool {
        is_directive_name(&self.name)
    }
}

/// Whether `name` has the `_NAME_` shape reserved for directive sections.
pub fn is_directive_name(name: &str) -> bool {
    name.len() > 2 && name.starts_with('_') && name.ends_with('_')
}

/// The parsed file: ordered sections of ordered entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    sections: Vec<Section>,
}

impl ConfigFile {
    /// Parse a cluster file from a path.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        log::debug!(
            "Read {} section(s) from {}",
            config.sections.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse a cluster file from a string.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = ConfigFile::default();
        // Set after an entry line so indented lines can extend its value
        let mut continuing = false;

        for (idx, raw) in content.lines().enumerate() {
            let line_num = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                continuing = false;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = raw.starts_with(char::is_whitespace);
            if indented && continuing {
                if let Some((_, value)) = config
                    .sections
                    .last_mut()
                    .and_then(|s| s.entries.last_mut())
                {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                }
                continue;
            }

            if let Some(header) = parse_header(trimmed) {
                let name = header.ok_or_else(|| syntax(line_num, "empty section name"))?;
                if config.has_section(name) {
                    return Err(syntax(line_num, format!("section [{name}] already exists")));
                }
                config.sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                continuing = false;
                continue;
            }

            let (key, value) = split_entry(trimmed)
                .ok_or_else(|| syntax(line_num, format!("expected 'name = value', got '{trimmed}'")))?;
            if key.is_empty() {
                return Err(syntax(line_num, "entry has no name"));
            }

            let section = config
                .sections
                .last_mut()
                .ok_or_else(|| syntax(line_num, "entry appears before any [section] header"))?;
            if section.entries.iter().any(|(k, _)| k == key) {
                return Err(syntax(
                    line_num,
                    format!("entry '{key}' already exists in [{}]", section.name),
                ));
            }
            section.entries.push((key.to_string(), value.to_string()));
            continuing = true;
        }

        Ok(config)
    }

    /// All sections in file order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Find a section by exact name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Whether a section with this exact name exists.
    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }
}

/// Returns `Some(Some(name))` for a header, `Some(None)` for `[]`.
fn parse_header(line: &str) -> Option<Option<&str>> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    Some((!inner.is_empty()).then_some(inner))
}

/// Split on the first `=` or `:`.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let pos = line.find(['=', ':'])?;
    Some((line[..pos].trim(), line[pos + 1..].trim()))
}

fn syntax(line: usize, message: impl Into<String>) -> Error {
    Error::Syntax {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_in_order() {
        let config = ConfigFile::parse(
            r"
[_VMS_]
web = template:centos

[common]
guest_username = root
guest_password = secret
",
        )
        .unwrap();
        let names: Vec<_> = config.sections().iter().map(Section::name).collect();
        assert_eq!(names, vec!["_VMS_", "common"]);
        assert_eq!(config.section("common").unwrap().get("guest_username"), Some("root"));
        assert_eq!(config.section("_VMS_").unwrap().get("web"), Some("template:centos"));
    }

    #[test]
    fn test_split_on_first_delimiter() {
        let config = ConfigFile::parse("[_VMS_]\nweb{1:3}: host:esx{1:3}\n").unwrap();
        let section = config.section("_VMS_").unwrap();
        let entries: Vec<_> = section.entries().collect();
        assert_eq!(entries, vec![("web{1", "3}: host:esx{1:3}")]);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let config = ConfigFile::parse("[Common]\nGuest = x\nguest = y\n").unwrap();
        let section = config.section("Common").unwrap();
        assert_eq!(section.get("Guest"), Some("x"));
        assert_eq!(section.get("guest"), Some("y"));
        assert!(config.section("common").is_none());
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let config = ConfigFile::parse(
            "# leading comment\n[_SVS_]\n; another\n\nsw0 = host:esx1\n",
        )
        .unwrap();
        assert_eq!(config.section("_SVS_").unwrap().len(), 1);
    }

    #[test]
    fn test_continuation_lines() {
        let config = ConfigFile::parse(
            "[_VMS_]\nweb = template:centos\n    cpu:4\n    memory:8\n[x]\n",
        )
        .unwrap();
        assert_eq!(
            config.section("_VMS_").unwrap().get("web"),
            Some("template:centos\ncpu:4\nmemory:8")
        );
    }

    #[test]
    fn test_empty_value() {
        let config = ConfigFile::parse("[common]\ndomain =\n").unwrap();
        assert_eq!(config.section("common").unwrap().get("domain"), Some(""));
    }

    #[test]
    fn test_entry_before_section_is_error() {
        let err = ConfigFile::parse("web = template:centos\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_line_without_delimiter_is_error() {
        let err = ConfigFile::parse("[_VMS_]\njust-a-word\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_section_is_error() {
        let err = ConfigFile::parse("[a]\n[b]\n[a]\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_duplicate_entry_is_error() {
        let err = ConfigFile::parse("[a]\nx = 1\nx = 2\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_directive_names() {
        assert!(is_directive_name("_VMS_"));
        assert!(is_directive_name("_SVS_"));
        assert!(!is_directive_name("common"));
        assert!(!is_directive_name("_"));
        assert!(!is_directive_name("__"));
        assert!(!is_directive_name("_private"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigFile::load(&dir.path().join("nope.conf")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.conf");
        std::fs::write(&path, "[_SVS_]\nsw0 = host:esx1\n").unwrap();
        let config = ConfigFile::load(&path).unwrap();
        assert!(config.has_section("_SVS_"));
    }
}
