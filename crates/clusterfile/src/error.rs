//! Error types for cluster file reading.
//!
//! Every error here is raised during the pure read phase, before any
//! platform call is issued for the section being read. Errors are grouped
//! into categories so the CLI can report them consistently.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of cluster file errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// An operand or key is not part of the section's schema
    UnknownKey,
    /// A directive section that no reader understands
    UnknownOperation,
    /// A range cannot be mapped onto its pivot
    RangeMapping,
    /// The operator declined or gave an unusable answer
    NotConfirmed,
    /// A key required by a later stage is absent or empty
    MissingRequiredKey,
    /// The file itself or a value in it is malformed
    Syntax,
    /// The file could not be read
    Io,
}

impl ErrorCategory {
    /// Short human-readable label for this category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnknownKey => "Unknown key",
            Self::UnknownOperation => "Unknown operation",
            Self::RangeMapping => "Range mapping failed",
            Self::NotConfirmed => "Not confirmed",
            Self::MissingRequiredKey => "Missing required key",
            Self::Syntax => "Invalid cluster file",
            Self::Io => "Could not read cluster file",
        }
    }
}

/// Errors that can occur while reading a cluster file.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed INI line
    #[error("line {line}: {message}")]
    Syntax {
        /// Line number where the problem was found (1-indexed)
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// Operand token or key not in the schema
    #[error("unknown key {key}")]
    UnknownKey {
        /// The offending token or key
        key: String,
    },

    /// Unrecognized directive section
    #[error("unknown operation {name}")]
    UnknownOperation {
        /// Section name of the directive
        name: String,
    },

    /// Range could not be mapped onto the pivot range
    #[error("range definition is wrong, couldn't do range mapping: {message}")]
    RangeMapping {
        /// What went wrong
        message: String,
    },

    /// Range bounds that cannot produce a sequence
    #[error("invalid range in '{value}': {message}")]
    InvalidRange {
        /// The raw value carrying the range
        value: String,
        /// What went wrong
        message: String,
    },

    /// Value that does not coerce to the key's type
    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        /// Schema key
        key: String,
        /// Raw value
        value: String,
        /// Expected type or form
        expected: &'static str,
    },

    /// Operator declined the mapping or answered with something unusable
    #[error("not confirmed: {reason}")]
    NotConfirmed {
        /// Why the confirmation failed
        reason: String,
    },

    /// Required key absent or empty
    #[error("please provide the value of {key} for {entity}")]
    MissingRequiredKey {
        /// Missing key
        key: String,
        /// Identity of the record that needs it
        entity: String,
    },

    /// Two entries resolve to the same entity
    #[error("{name} is defined more than once")]
    DuplicateEntity {
        /// Identity that appears twice
        name: String,
    },

    /// Nothing usable was read from the file
    #[error("couldn't correctly read cluster configuration file, please check the format")]
    EmptyCluster,

    /// Cluster file not found
    #[error("couldn't find cluster file {0}")]
    FileNotFound(PathBuf),

    /// Error raised while reading one entry of a section
    #[error("[{section}] {entry}: {source}")]
    InSection {
        /// Section being read
        section: String,
        /// Entry being read
        entry: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownKey { .. } => ErrorCategory::UnknownKey,
            Error::UnknownOperation { .. } => ErrorCategory::UnknownOperation,
            Error::RangeMapping { .. } | Error::InvalidRange { .. } => ErrorCategory::RangeMapping,
            Error::NotConfirmed { .. } => ErrorCategory::NotConfirmed,
            Error::MissingRequiredKey { .. } => ErrorCategory::MissingRequiredKey,
            Error::InSection { source, .. } => source.category(),
            Error::Io(_) | Error::FileNotFound(_) => ErrorCategory::Io,
            Error::Syntax { .. }
            | Error::InvalidValue { .. }
            | Error::DuplicateEntity { .. }
            | Error::EmptyCluster => ErrorCategory::Syntax,
        }
    }

    /// Shorthand for a [`Error::RangeMapping`] error.
    pub fn range_mapping(message: impl Into<String>) -> Self {
        Error::RangeMapping {
            message: message.into(),
        }
    }

    /// Attach section and entry context to this error.
    pub fn in_section(self, section: &str, entry: &str) -> Self {
        match self {
            // Context is attached once, at the innermost reader
            Error::InSection { .. } | Error::NotConfirmed { .. } => self,
            other => Error::InSection {
                section: section.to_string(),
                entry: entry.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with section context removed.
    pub fn root(&self) -> &Error {
        match self {
            Error::InSection { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for cluster file operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_follows_section_context() {
        let err = Error::UnknownKey {
            key: "bogus".to_string(),
        }
        .in_section("_VMS_", "web");
        assert_eq!(err.category(), ErrorCategory::UnknownKey);
        assert!(matches!(err.root(), Error::UnknownKey { key } if key == "bogus"));
    }

    #[test]
    fn test_section_context_message_is_single_line() {
        let err = Error::range_mapping("pivot has 2 values, host has 3").in_section("_VMS_", "web");
        let message = err.to_string();
        assert!(message.starts_with("[_VMS_] web: range definition is wrong"));
        assert!(!message.contains('\n'));
    }

    #[test]
    fn test_context_is_attached_once() {
        let err = Error::EmptyCluster
            .in_section("_SVS_", "a")
            .in_section("_SVS_", "b");
        assert_eq!(err.to_string(), format!("[_SVS_] a: {}", Error::EmptyCluster));
    }

    #[test]
    fn test_invalid_range_is_range_mapping() {
        let err = Error::InvalidRange {
            value: "vm{3:1}".to_string(),
            message: "start is greater than end".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::RangeMapping);
    }
}
