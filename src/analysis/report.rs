//! Tabular view of per-bin tallies

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::SelectionTally;

/// One magnitude bin of one selector, ready for output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSummary {
    pub mag_lo: f64,
    pub mag_hi: f64,
    pub true_galaxies: u64,
    pub true_stars: u64,
    pub selected_galaxies: u64,
    pub selected_stars: u64,
    pub total_selected: u64,
    /// Percent; `null` when no galaxy fell in the bin
    pub efficiency: Option<f64>,
    /// Percent; `null` when nothing was selected
    pub impurity: Option<f64>,
}

impl BinSummary {
    pub fn new((mag_lo, mag_hi): (f64, f64), tally: &SelectionTally) -> Self {
        Self {
            mag_lo,
            mag_hi,
            true_galaxies: tally.true_galaxies,
            true_stars: tally.true_stars,
            selected_galaxies: tally.selected_galaxies,
            selected_stars: tally.selected_stars,
            total_selected: tally.selected(),
            efficiency: tally.efficiency(),
            impurity: tally.impurity(),
        }
    }
}

/// Percentage with two decimals, or `N/A`
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "N/A".to_string(),
    }
}

/// Fixed-width table, one line per bin
pub fn format_table(rows: &[BinSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>13}  {:>9}  {:>9}  {:>9}  {:>9}  {:>10}  {:>10}",
        "modelmag_r", "sel gal", "true gal", "sel star", "selected", "eff [%]", "imp [%]"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:>13}  {:>9}  {:>9}  {:>9}  {:>9}  {:>10}  {:>10}",
            format!("[{:.1}, {:.1})", row.mag_lo, row.mag_hi),
            row.selected_galaxies,
            row.true_galaxies,
            row.selected_stars,
            row.total_selected,
            format_percent(row.efficiency),
            format_percent(row.impurity),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Label;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(100.0)), "100.00");
        assert_eq!(format_percent(Some(33.3333)), "33.33");
        assert_eq!(format_percent(None), "N/A");
    }

    #[test]
    fn test_table_shows_na() {
        let empty = BinSummary::new((14.0, 15.0), &SelectionTally::default());
        let mut t = SelectionTally::default();
        t.record(Label::Galaxy, true);
        let full = BinSummary::new((15.0, 16.0), &t);

        let table = format_table(&[empty, full]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("[14.0, 15.0)"));
        assert!(lines[1].trim_end().ends_with("N/A"));
        assert!(lines[2].contains("100.00"));
    }

    #[test]
    fn test_summary_serializes_missing_as_null() {
        let summary = BinSummary::new((14.0, 15.0), &SelectionTally::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["efficiency"].is_null());
        assert!(json["impurity"].is_null());
    }
}
