//! Mapping an expanded range onto a pivot range.
//!
//! The pivot (usually the VM name range) fixes how many entities are
//! produced. A secondary range is spread over it either round-robin
//! (scatter) or in contiguous equal blocks (bunch).

use crate::error::{Error, Result};
use crate::range::{Expansion, RangeKind};

/// Assign `source[i % source.len()]` to every pivot index.
///
/// ```
/// use clusterfile::mapping::scatter_map;
///
/// let pivot = ["vm1", "vm2", "vm3", "vm4"];
/// let hosts = ["esx1".to_string(), "esx2".to_string()];
/// let mapped = scatter_map(&pivot, &hosts).unwrap();
/// assert_eq!(mapped, ["esx1", "esx2", "esx1", "esx2"]);
/// ```
pub fn scatter_map<T, U: Clone>(pivot: &[T], source: &[U]) -> Result<Vec<U>> {
    check_sizes(pivot.len(), source.len())?;
    Ok(source.iter().cycle().take(pivot.len()).cloned().collect())
}

/// Repeat each source element `pivot.len() / source.len()` times, in order.
///
/// The pivot length must be an exact multiple of the source length.
///
/// ```
/// use clusterfile::mapping::bunch_map;
///
/// let pivot = ["vm1", "vm2", "vm3", "vm4"];
/// let hosts = ["esx1".to_string(), "esx2".to_string()];
/// let mapped = bunch_map(&pivot, &hosts).unwrap();
/// assert_eq!(mapped, ["esx1", "esx1", "esx2", "esx2"]);
/// ```
pub fn bunch_map<T, U: Clone>(pivot: &[T], source: &[U]) -> Result<Vec<U>> {
    check_sizes(pivot.len(), source.len())?;
    if pivot.len() % source.len() != 0 {
        return Err(Error::range_mapping(format!(
            "bunch range of {} values doesn't evenly divide {} pivot values",
            source.len(),
            pivot.len()
        )));
    }

    let block = pivot.len() / source.len();
    Ok(source
        .iter()
        .flat_map(|item| std::iter::repeat_n(item, block))
        .cloned()
        .collect())
}

/// Map an expansion onto the pivot with the mapper matching its range form.
///
/// A scalar is copied to every pivot index.
pub fn map_expansion<T>(pivot: &[T], expansion: &Expansion) -> Result<Vec<String>> {
    match expansion {
        Expansion::Scalar(v) => Ok(vec![v.clone(); pivot.len()]),
        Expansion::Scatter(vs) => scatter_map(pivot, vs),
        Expansion::Bunch(vs) => bunch_map(pivot, vs),
    }
}

/// Mapper name for log messages.
pub fn describe(kind: RangeKind) -> &'static str {
    match kind {
        RangeKind::Scalar => "copied",
        RangeKind::Scatter => "scatter-mapped",
        RangeKind::Bunch => "bunch-mapped",
    }
}

fn check_sizes(pivot: usize, source: usize) -> Result<()> {
    if source == 0 {
        return Err(Error::range_mapping("range has no values"));
    }
    if pivot < source {
        return Err(Error::range_mapping(format!(
            "pivot range has {pivot} values but the mapped range has {source}"
        )));
    }
    Ok(())
}
