//! Confirmation gate for range fan-outs.
//!
//! Before a multi-record VM expansion is accepted the reader renders the
//! mapping as a [`MappingTable`] and asks a [`Confirm`] implementation to
//! accept it. The library never touches the terminal; the binary supplies
//! an interactive implementation.

use crate::error::Result;
use crate::schema;
use console::measure_text_width;
use std::fmt;

/// Pivot values and mapped range values, one row per produced record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    /// Column headers, pivot key first
    pub columns: Vec<String>,
    /// One row per record, aligned with `columns`
    pub rows: Vec<Vec<String>>,
}

impl MappingTable {
    /// Build a table from equally long per-key columns.
    pub fn from_columns(columns: Vec<(String, Vec<String>)>) -> Self {
        let len = columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        let rows = (0..len)
            .map(|i| {
                columns
                    .iter()
                    .map(|(_, c)| c.get(i).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        }
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map_or("", String::as_str))
                .collect(),
        )
    }

    /// Render with a header rule and vertical column separators.
    ///
    /// ```text
    ///  vm   | host
    /// ======+======
    ///  web1 | esx1
    ///  web2 | esx2
    /// ```
    pub fn render(&self) -> String {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| measure_text_width(cell))
                    .chain(std::iter::once(measure_text_width(header)))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| -> String {
            widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = cells.get(i).map_or("", String::as_str);
                    let pad = width.saturating_sub(measure_text_width(cell));
                    format!(" {cell}{} ", " ".repeat(pad))
                })
                .collect::<Vec<_>>()
                .join("|")
        };

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(line(&self.columns));
        out.push(
            widths
                .iter()
                .map(|w| "=".repeat(w + 2))
                .collect::<Vec<_>>()
                .join("+"),
        );
        out.extend(self.rows.iter().map(|row| line(row)));
        out.join("\n")
    }
}

impl fmt::Display for MappingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Decides whether a range mapping is what the operator expected.
///
/// Returning `Ok(false)` makes the reader fail with
/// [`Error::NotConfirmed`](crate::Error::NotConfirmed). Implementations
/// may also return that error themselves, e.g. for an unusable answer.
pub trait Confirm {
    fn confirm_mapping(&mut self, table: &MappingTable) -> Result<bool>;
}

/// Accepts every mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm_mapping(&mut self, table: &MappingTable) -> Result<bool> {
        log::debug!("Auto-confirming mapping of {} record(s)", table.rows.len());
        Ok(true)
    }
}

/// Rejects every mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecline;

impl Confirm for AutoDecline {
    fn confirm_mapping(&mut self, _table: &MappingTable) -> Result<bool> {
        Ok(false)
    }
}

impl<F> Confirm for F
where
    F: FnMut(&MappingTable) -> Result<bool>,
{
    fn confirm_mapping(&mut self, table: &MappingTable) -> Result<bool> {
        self(table)
    }
}

/// Interpret an operator's answer.
///
/// ```
/// use clusterfile::confirm::parse_answer;
///
/// assert_eq!(parse_answer(" Yes "), Some(true));
/// assert_eq!(parse_answer("off"), Some(false));
/// assert_eq!(parse_answer("sure"), None);
/// ```
pub fn parse_answer(answer: &str) -> Option<bool> {
    schema::parse_bool(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MappingTable {
        MappingTable::from_columns(vec![
            ("vm".into(), vec!["web1".into(), "web2".into()]),
            ("host".into(), vec!["esx-a".into(), "esx-b".into()]),
        ])
    }

    #[test]
    fn test_from_columns_builds_rows() {
        let t = table();
        assert_eq!(t.columns, vec!["vm", "host"]);
        assert_eq!(t.rows, vec![vec!["web1", "esx-a"], vec!["web2", "esx-b"]]);
        assert_eq!(t.column("host"), Some(vec!["esx-a", "esx-b"]));
        assert_eq!(t.column("ip"), None);
    }

    #[test]
    fn test_render_layout() {
        let rendered = table().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                " vm   | host  ",
                "======+=======",
                " web1 | esx-a ",
                " web2 | esx-b ",
            ]
        );
    }

    #[test]
    fn test_render_pads_to_widest_cell() {
        let t = MappingTable::from_columns(vec![(
            "vm".into(),
            vec!["a".into(), "longer-name".into()],
        )]);
        let rendered = t.render();
        let widths: Vec<usize> = rendered.lines().map(str::len).collect();
        assert!(widths.iter().all(|w| *w == widths[0]));
    }

    #[test]
    fn test_auto_confirm_and_decline() {
        let t = table();
        assert!(AutoConfirm.confirm_mapping(&t).unwrap());
        assert!(!AutoDecline.confirm_mapping(&t).unwrap());
    }

    #[test]
    fn test_closure_confirm() {
        let mut seen = 0;
        let mut gate = |t: &MappingTable| -> Result<bool> {
            seen = t.rows.len();
            Ok(true)
        };
        assert!(gate.confirm_mapping(&table()).unwrap());
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y"), Some(true));
        assert_eq!(parse_answer("N"), Some(false));
        assert_eq!(parse_answer(""), None);
    }
}
