//! Text shown around the result table in batch mode.

use std::fmt::Write;

use crate::dataset::{Analysis, Dataset};
use crate::filter::{CascadeOptions, DateRange, FilterSelection};
use crate::roles::SemanticRole;

/// One line naming the dataset, the filters in effect and what the table shows.
pub fn caption(dataset: &Dataset, selection: &FilterSelection, analysis: &Analysis, data: bool) -> String {
    let mut out = format!(
        "{}: {} [{}] | {} rows after filters",
        dataset.kind.title(),
        dataset.source_name,
        dataset.sheet,
        analysis.filtered.height()
    );
    for role in SemanticRole::FILTER_ORDER {
        if let Some(values) = selection.active(role) {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            let _ = write!(out, " | {}: {}", role, values.join(", "));
        }
    }
    if let Some(range) = selection.date_range {
        let _ = write!(out, " | dates {} .. {}", range.start, range.end);
    }
    if !data {
        let pivot = &analysis.pivot;
        let _ = write!(
            out,
            " | by {}, {} groups, sorted by {}",
            pivot.row_column,
            pivot.height(),
            pivot.sort_by
        );
    }
    out
}

/// Every sheet of the dataset's workbook with its size and resolvable roles. `*` marks the
/// working sheet.
pub fn sheet_listing(dataset: &Dataset) -> String {
    let mut out = format!("{} ({}):\n", dataset.kind, dataset.source_name);
    for score in &dataset.sheet_scores {
        let mark = if score.name == dataset.sheet { '*' } else { ' ' };
        let roles: Vec<&str> = score.resolved.iter().map(|r| r.label()).collect();
        let _ = writeln!(
            out,
            "  {} {}  {} rows x {} columns  score {} [{}]",
            mark,
            score.name,
            score.rows,
            score.columns,
            score.score(),
            roles.join(", ")
        );
    }
    out
}

/// Offered values per filter role, then the date range of the data.
pub fn options_listing(options: &CascadeOptions, bounds: Option<DateRange>) -> String {
    let mut out = String::new();
    for role in SemanticRole::FILTER_ORDER {
        if options.has_role(role) {
            let values = options.get(role);
            let _ = writeln!(out, "{} ({}): {}", role, values.len(), values.join(", "));
        } else {
            let _ = writeln!(out, "{}: no matching column", role);
        }
    }
    match bounds {
        Some(range) => {
            let _ = writeln!(out, "Date: {} .. {}", range.start, range.end);
        }
        None => out.push_str("Date: no matching column\n"),
    }
    out
}
