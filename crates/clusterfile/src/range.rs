//! Range expressions embedded in values.
//!
//! Two bracket forms expand a value into an ordered sequence:
//!
//! - scatter `{lo:hi}`: `esx{1:3}` becomes `esx1`, `esx2`, `esx3`
//! - bunch `{{lo:hi}}`: same expansion, mapped as contiguous blocks
//!
//! The forms are disjoint: a scatter brace may not follow another `{`.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static SCATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^{])(\{(\d+):(\d+)\})").unwrap());
static BUNCH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\{\{(\d+):(\d+)\}\})").unwrap());

/// Upper bound on the values a single range may expand to.
pub const MAX_RANGE_VALUES: usize = 100_000;

/// Which range form a value uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// No range
    Scalar,
    /// `{lo:hi}`, mapped round-robin
    Scatter,
    /// `{{lo:hi}}`, mapped in contiguous blocks
    Bunch,
}

impl std::fmt::Display for RangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scalar => "scalar",
            Self::Scatter => "scatter",
            Self::Bunch => "bunch",
        };
        f.write_str(name)
    }
}

/// A value after range evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// The value had no range and is returned unchanged
    Scalar(String),
    /// Expanded scatter range
    Scatter(Vec<String>),
    /// Expanded bunch range
    Bunch(Vec<String>),
}

impl Expansion {
    /// The range form that produced this expansion.
    pub fn kind(&self) -> RangeKind {
        match self {
            Self::Scalar(_) => RangeKind::Scalar,
            Self::Scatter(_) => RangeKind::Scatter,
            Self::Bunch(_) => RangeKind::Bunch,
        }
    }

    /// Whether a range was found.
    pub fn is_range(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }

    /// Expanded values; a scalar yields itself once.
    pub fn values(&self) -> &[String] {
        match self {
            Self::Scalar(v) => std::slice::from_ref(v),
            Self::Scatter(vs) | Self::Bunch(vs) => vs,
        }
    }
}

/// Evaluate the range expression in `value`, if any.
///
/// Only the first range token is expanded. Every occurrence of that exact
/// token text is substituted, so `n{1:2}-{1:2}` yields `n1-1`, `n2-2`.
pub fn expand(value: &str) -> Result<Expansion> {
    let scatter = SCATTER.captures(value);
    let bunch = BUNCH.captures(value);

    match (scatter, bunch) {
        (None, None) => Ok(Expansion::Scalar(value.to_string())),
        (Some(caps), None) => unfold(value, &caps).map(Expansion::Scatter),
        (None, Some(caps)) => unfold(value, &caps).map(Expansion::Bunch),
        (Some(_), Some(_)) => Err(Error::range_mapping(format!(
            "'{value}' mixes scatter {{lo:hi}} and bunch {{{{lo:hi}}}} ranges"
        ))),
    }
}

/// Substitute each integer of the captured range into the original value.
fn unfold(value: &str, caps: &Captures<'_>) -> Result<Vec<String>> {
    let token = &caps[1];
    let start = parse_bound(value, &caps[2])?;
    let end = parse_bound(value, &caps[3])?;

    if start > end {
        return Err(Error::InvalidRange {
            value: value.to_string(),
            message: format!("start {start} is greater than end {end}"),
        });
    }

    let count = (end - start)
        .checked_add(1)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|&n| n <= MAX_RANGE_VALUES)
        .ok_or_else(|| Error::InvalidRange {
            value: value.to_string(),
            message: format!("expands to more than {MAX_RANGE_VALUES} values"),
        })?;

    let mut values = Vec::with_capacity(count);
    values.extend((start..=end).map(|i| value.replace(token, &i.to_string())));
    Ok(values)
}

fn parse_bound(value: &str, digits: &str) -> Result<u64> {
    digits.parse().map_err(|_| Error::InvalidRange {
        value: value.to_string(),
        message: format!("{digits} is out of range"),
    })
}
