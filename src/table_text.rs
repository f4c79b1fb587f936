//! Plain-text rendering of frames for batch output, shared cell formatting for the dashboard.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::datatypes::TimeUnit;
use polars::prelude::*;
use std::borrow::Cow;

/// Shown for the null group in pivots and charts.
pub const BLANK_LABEL: &str = "(blank)";

fn datetime_from(v: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
    };
    dt.map(|d| d.naive_utc())
}

/// Display text for one cell: two decimals for floats, empty for null, minutes for datetimes.
pub fn cell_text(value: &AnyValue) -> Cow<'static, str> {
    match value {
        AnyValue::Null => Cow::Borrowed(""),
        AnyValue::Float64(v) => Cow::Owned(format!("{:.2}", v)),
        AnyValue::Float32(v) => Cow::Owned(format!("{:.2}", v)),
        AnyValue::Datetime(v, unit, _) | AnyValue::DatetimeOwned(v, unit, _) => {
            match datetime_from(*v, *unit) {
                Some(dt) => Cow::Owned(dt.format("%Y-%m-%d %H:%M").to_string()),
                None => Cow::Owned(v.to_string()),
            }
        }
        AnyValue::Date(days) => {
            let day = NaiveDate::from_ymd_opt(1970, 1, 1)
                .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(*days as i64)));
            match day {
                Some(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
                None => Cow::Owned(days.to_string()),
            }
        }
        other => Cow::Owned(other.str_value().into_owned()),
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric()
}

/// Column names followed by every row as display text.
pub fn frame_cells(frame: &DataFrame) -> PolarsResult<(Vec<String>, Vec<Vec<String>>)> {
    let header: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let mut rows = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        let mut row = Vec::with_capacity(frame.width());
        for column in frame.get_columns() {
            row.push(cell_text(&column.get(i)?).into_owned());
        }
        rows.push(row);
    }
    Ok((header, rows))
}

/// Aligned text table with a rule under the header. Numeric columns are right-aligned.
pub fn format_table(frame: &DataFrame) -> PolarsResult<String> {
    let (header, rows) = frame_cells(frame)?;
    let numeric: Vec<bool> = frame
        .get_columns()
        .iter()
        .map(|c| is_numeric(c.dtype()))
        .collect();
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let render = |cells: &[String], out: &mut String| {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let pad = widths[i].saturating_sub(cell.chars().count());
                if numeric[i] {
                    format!("{}{}", " ".repeat(pad), cell)
                } else {
                    format!("{}{}", cell, " ".repeat(pad))
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    let mut out = String::new();
    render(&header, &mut out);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in &rows {
        render(row, &mut out);
    }
    Ok(out)
}
