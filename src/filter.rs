//! Cascading categorical filters and the day-granularity date filter.
//!
//! Categorical filters run in [`SemanticRole::FILTER_ORDER`], then the date range. An empty
//! selection for a role passes every row through. The options offered for a role come from
//! the table narrowed by the roles before it, never by the role itself or those after it.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use color_eyre::Result;
use polars::datatypes::TimeUnit;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::DashboardError;
use crate::roles::{RoleMapping, SemanticRole};

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> std::result::Result<Self, DashboardError> {
        if start > end {
            return Err(DashboardError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Start of `start`, in microseconds since the epoch.
    pub fn lower_micros(&self) -> i64 {
        self.start.and_time(NaiveTime::MIN).and_utc().timestamp_micros()
    }

    /// Start of the day after `end`, in microseconds since the epoch. Exclusive.
    pub fn upper_micros(&self) -> i64 {
        (self.end + Duration::days(1))
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp_micros()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Move the start by `days`, keeping it inside `bounds` and not after `end`.
    pub fn shift_start(&mut self, days: i64, bounds: &DateRange) {
        let moved = self.start + Duration::days(days);
        self.start = moved.max(bounds.start).min(self.end);
    }

    /// Move the end by `days`, keeping it inside `bounds` and not before `start`.
    pub fn shift_end(&mut self, days: i64, bounds: &DateRange) {
        let moved = self.end + Duration::days(days);
        self.end = moved.min(bounds.end).max(self.start);
    }
}

/// Accepted values per categorical role plus an optional date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    pub values: BTreeMap<SemanticRole, BTreeSet<String>>,
    pub date_range: Option<DateRange>,
}

impl FilterSelection {
    pub fn set<I, S>(&mut self, role: SemanticRole, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if set.is_empty() {
            self.values.remove(&role);
        } else {
            self.values.insert(role, set);
        }
    }

    /// Accepted values for `role`, or `None` when the role passes every row.
    pub fn active(&self, role: SemanticRole) -> Option<&BTreeSet<String>> {
        self.values.get(&role).filter(|v| !v.is_empty())
    }

    pub fn is_selected(&self, role: SemanticRole, value: &str) -> bool {
        self.values.get(&role).is_some_and(|v| v.contains(value))
    }

    /// Flip one value. Returns true when the value is now selected.
    pub fn toggle(&mut self, role: SemanticRole, value: &str) -> bool {
        let set = self.values.entry(role).or_default();
        let selected = if set.remove(value) {
            false
        } else {
            set.insert(value.to_string());
            true
        };
        if set.is_empty() {
            self.values.remove(&role);
        }
        selected
    }

    pub fn clear(&mut self, role: SemanticRole) {
        self.values.remove(&role);
    }

    pub fn clear_all(&mut self) {
        self.values.clear();
        self.date_range = None;
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(BTreeSet::is_empty) && self.date_range.is_none()
    }

    /// Drop selected values that are no longer offered. Returns true when anything changed.
    pub fn prune(&mut self, options: &CascadeOptions) -> bool {
        let mut changed = false;
        for (role, selected) in self.values.iter_mut() {
            let offered = options.get(*role);
            let before = selected.len();
            selected.retain(|v| offered.iter().any(|o| o == v));
            changed |= selected.len() != before;
        }
        self.values.retain(|_, v| !v.is_empty());
        changed
    }
}

/// Selectable values per categorical role. Roles the dataset cannot resolve are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeOptions {
    pub options: BTreeMap<SemanticRole, Vec<String>>,
}

impl CascadeOptions {
    pub fn get(&self, role: SemanticRole) -> &[String] {
        self.options.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_role(&self, role: SemanticRole) -> bool {
        self.options.contains_key(&role)
    }
}

fn membership(column: &str, values: &BTreeSet<String>) -> Option<Expr> {
    values
        .iter()
        .map(|v| col(column).cast(DataType::String).eq(lit(v.clone())))
        .reduce(|acc, e| acc.or(e))
}

fn date_expr(column: &str, range: &DateRange) -> Expr {
    let micros = col(column)
        .cast(DataType::Datetime(TimeUnit::Microseconds, None))
        .cast(DataType::Int64);
    micros
        .clone()
        .gt_eq(lit(range.lower_micros()))
        .and(micros.lt(lit(range.upper_micros())))
}

fn categorical_filter(
    lf: LazyFrame,
    mapping: &RoleMapping,
    role: SemanticRole,
    selection: &FilterSelection,
) -> LazyFrame {
    let Some(values) = selection.active(role) else {
        return lf;
    };
    match mapping
        .column(role)
        .and_then(|column| membership(column, values))
    {
        Some(expr) => lf.filter(expr),
        None => {
            warn!(%role, "no column for filter, skipping");
            lf
        }
    }
}

/// Apply every active filter. Rows with a null in an active filter column are dropped.
pub fn apply_filters(
    frame: &DataFrame,
    mapping: &RoleMapping,
    selection: &FilterSelection,
) -> Result<DataFrame> {
    let mut lf = frame.clone().lazy();
    for role in SemanticRole::FILTER_ORDER {
        lf = categorical_filter(lf, mapping, role, selection);
    }
    if let Some(range) = &selection.date_range {
        match mapping.column(SemanticRole::Date) {
            Some(column) => lf = lf.filter(date_expr(column, range)),
            None => warn!("no date column, skipping date filter"),
        }
    }
    let filtered = lf.collect()?;
    debug!(
        rows_in = frame.height(),
        rows_out = filtered.height(),
        "applied filters"
    );
    Ok(filtered)
}

/// Sorted distinct non-null values of `column`, as text.
pub fn distinct_values(frame: &DataFrame, column: &str) -> Result<Vec<String>> {
    let series = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let set: BTreeSet<String> = series
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    Ok(set.into_iter().collect())
}

/// Options for each categorical role, each derived from the table narrowed by the
/// selections of the roles before it.
pub fn cascade_options(
    frame: &DataFrame,
    mapping: &RoleMapping,
    selection: &FilterSelection,
) -> Result<CascadeOptions> {
    let mut out = CascadeOptions::default();
    let mut narrowed = frame.clone();
    for role in SemanticRole::FILTER_ORDER {
        let Some(column) = mapping.column(role) else {
            continue;
        };
        out.options.insert(role, distinct_values(&narrowed, column)?);
        if selection.active(role).is_some() {
            narrowed = categorical_filter(narrowed.lazy(), mapping, role, selection).collect()?;
        }
    }
    Ok(out)
}

/// First and last calendar day present in the date column.
pub fn date_bounds(frame: &DataFrame, mapping: &RoleMapping) -> Result<Option<DateRange>> {
    let Some(column) = mapping.column(SemanticRole::Date) else {
        return Ok(None);
    };
    let micros = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        .cast(&DataType::Int64)?;
    let ca = micros.i64()?;
    let day = |us: i64| DateTime::from_timestamp_micros(us).map(|dt| dt.date_naive());
    let min = ca.into_iter().flatten().min().and_then(day);
    let max = ca.into_iter().flatten().max().and_then(day);
    Ok(match (min, max) {
        (Some(start), Some(end)) => Some(DateRange { start, end }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> RoleMapping {
        let mut m = RoleMapping::default();
        m.set(SemanticRole::Agent, "Agent");
        m.set(SemanticRole::Location, "Location");
        m.set(SemanticRole::Leader, "Leader");
        m.set(SemanticRole::Date, "When");
        m.set(SemanticRole::Score, "Score");
        m
    }

    fn at(day: u32, hour: u32, min: u32) -> i64 {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
            .and_utc()
            .timestamp_micros()
    }

    fn frame() -> DataFrame {
        let when = Series::new(
            "When".into(),
            vec![
                Some(at(1, 9, 0)),
                Some(at(1, 23, 59)),
                Some(at(2, 0, 0)),
                None,
                Some(at(3, 12, 0)),
            ],
        )
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
        .unwrap();
        let mut df = df!(
            "Agent" => &["A", "B", "C", "D", "E"],
            "Location" => &[Some("Ankara"), Some("Ankara"), Some("İzmir"), None, Some("İstanbul")],
            "Leader" => &["Zeynep", "Mert", "Can", "Zeynep", "Ece"],
            "Score" => &[1.0, 2.0, 3.0, 4.0, 5.0]
        )
        .unwrap();
        df.with_column(when).unwrap();
        df
    }

    #[test]
    fn test_empty_selection_is_pass_through() {
        let df = frame();
        let out = apply_filters(&df, &mapping(), &FilterSelection::default()).unwrap();
        assert_eq!(out.height(), df.height());
    }

    #[test]
    fn test_categorical_filter_excludes_nulls() {
        let mut sel = FilterSelection::default();
        sel.set(SemanticRole::Location, ["Ankara", "İzmir"]);
        let out = apply_filters(&frame(), &mapping(), &sel).unwrap();
        assert_eq!(out.height(), 3);
        let agents = distinct_values(&out, "Agent").unwrap();
        assert_eq!(agents, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_filters_combine_with_and() {
        let mut sel = FilterSelection::default();
        sel.set(SemanticRole::Location, ["Ankara"]);
        sel.set(SemanticRole::Leader, ["Mert", "Can"]);
        let out = apply_filters(&frame(), &mapping(), &sel).unwrap();
        assert_eq!(distinct_values(&out, "Agent").unwrap(), vec!["B"]);
    }

    #[test]
    fn test_single_day_range_excludes_next_midnight() {
        let mut sel = FilterSelection::default();
        sel.date_range = Some(DateRange::single_day(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ));
        let out = apply_filters(&frame(), &mapping(), &sel).unwrap();
        assert_eq!(distinct_values(&out, "Agent").unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_date_range_is_inclusive_of_end_day() {
        let mut sel = FilterSelection::default();
        sel.date_range = Some(
            DateRange::new(
                NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            )
            .unwrap(),
        );
        let out = apply_filters(&frame(), &mapping(), &sel).unwrap();
        assert_eq!(distinct_values(&out, "Agent").unwrap(), vec!["C", "E"]);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_leader_options_follow_location() {
        let mut sel = FilterSelection::default();
        sel.set(SemanticRole::Location, ["Ankara"]);
        sel.set(SemanticRole::Leader, ["Mert"]);
        let opts = cascade_options(&frame(), &mapping(), &sel).unwrap();
        // the location list itself is not narrowed by its own selection
        assert_eq!(
            opts.get(SemanticRole::Location),
            &["Ankara", "İstanbul", "İzmir"]
        );
        // Zeynep's Ankara row stays offered even though Mert is selected
        assert_eq!(opts.get(SemanticRole::Leader), &["Mert", "Zeynep"]);
        assert!(!opts.has_role(SemanticRole::Team));
    }

    #[test]
    fn test_filter_on_unresolved_role_is_skipped() {
        let mut sel = FilterSelection::default();
        sel.set(SemanticRole::Skill, ["Fatura"]);
        let out = apply_filters(&frame(), &mapping(), &sel).unwrap();
        assert_eq!(out.height(), 5);
    }

    #[test]
    fn test_date_bounds() {
        let bounds = date_bounds(&frame(), &mapping()).unwrap().unwrap();
        assert_eq!(bounds.start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(bounds.end, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let mut sel = FilterSelection::default();
        sel.set(SemanticRole::Location, ["Bursa"]);
        let out = apply_filters(&frame(), &mapping(), &sel).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn test_toggle_and_prune() {
        let mut sel = FilterSelection::default();
        assert!(sel.toggle(SemanticRole::Leader, "Mert"));
        assert!(sel.toggle(SemanticRole::Leader, "Ece"));
        assert!(!sel.toggle(SemanticRole::Leader, "Ece"));
        sel.toggle(SemanticRole::Leader, "Ece");
        let mut opts = CascadeOptions::default();
        opts.options
            .insert(SemanticRole::Leader, vec!["Mert".to_string()]);
        assert!(sel.prune(&opts));
        assert!(sel.is_selected(SemanticRole::Leader, "Mert"));
        assert!(!sel.is_selected(SemanticRole::Leader, "Ece"));
        assert!(!sel.prune(&opts));
    }

    #[test]
    fn test_shift_range_within_bounds() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let bounds = DateRange::new(d(1), d(10)).unwrap();
        let mut range = bounds;
        range.shift_start(-3, &bounds);
        assert_eq!(range.start, d(1));
        range.shift_end(-20, &bounds);
        assert_eq!(range.end, d(1));
        range.shift_end(4, &bounds);
        range.shift_start(10, &bounds);
        assert_eq!(range, DateRange::new(d(5), d(5)).unwrap());
    }
}
