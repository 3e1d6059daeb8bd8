//! Operand tokenizer for directive entries.
//!
//! An entry's value is a whitespace-separated list of `key:value` tokens and
//! property bundle names:
//!
//! ```text
//! web = template:centos cpu : 4 dns:[10.0.0.1, 10.0.0.2] common
//! ```
//!
//! Whitespace around `:` and `,` is dropped before splitting, so the line
//! above yields `template`, `cpu`, `dns` and then every entry of `[common]`.

use crate::error::{Error, Result};
use crate::ini::ConfigFile;
use regex::Regex;
use std::sync::LazyLock;

static SPACED_COLON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*:\s*").unwrap());
static SPACED_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").unwrap());

/// One `key:value` pair taken from an operand string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub key: String,
    pub value: String,
}

impl Operand {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Remove whitespace around `:` and `,` separators.
pub fn normalize(operands: &str) -> String {
    let s = SPACED_COLON.replace_all(operands, ":");
    SPACED_COMMA.replace_all(&s, ",").into_owned()
}

/// Tokenize an operand string into ordered `key:value` pairs.
///
/// Tokens naming a property bundle section are replaced by that section's
/// entries. Empty values are skipped. A token that is neither a bundle name
/// nor contains `:` fails with [`Error::UnknownKey`].
pub fn parse_operands(operands: &str, config: &ConfigFile) -> Result<Vec<Operand>> {
    let normalized = normalize(operands);
    let mut parsed = Vec::new();

    for token in normalized.split_whitespace() {
        if let Some(bundle) = config.section(token).filter(|s| !s.is_directive()) {
            log::trace!("Inlining bundle [{}]", bundle.name());
            parsed.extend(
                bundle
                    .entries()
                    .filter(|(_, v)| !v.is_empty())
                    .map(|(k, v)| Operand::new(k, v)),
            );
        } else if let Some((key, value)) = token.split_once(':') {
            if !value.is_empty() {
                parsed.push(Operand::new(key, value));
            }
        } else {
            return Err(Error::UnknownKey {
                key: token.to_string(),
            });
        }
    }

    Ok(parsed)
}
