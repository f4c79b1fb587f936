//! Group-by aggregation of the score column by one row dimension.

use callboard_cli::MeasureChoice;
use color_eyre::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::DashboardError;
use crate::roles::SemanticRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Count,
    Mean,
    Min,
    Max,
}

impl Measure {
    pub const ALL: [Self; 4] = [Self::Count, Self::Mean, Self::Min, Self::Max];

    /// Output column name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Mean => "Mean",
            Self::Min => "Min",
            Self::Max => "Max",
        }
    }

    fn expr(self, score: Expr) -> Expr {
        let e = match self {
            // non-null values only
            Self::Count => score.count(),
            Self::Mean => score.mean(),
            Self::Min => score.min(),
            Self::Max => score.max(),
        };
        e.alias(self.label())
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<MeasureChoice> for Measure {
    fn from(m: MeasureChoice) -> Self {
        match m {
            MeasureChoice::Count => Self::Count,
            MeasureChoice::Mean => Self::Mean,
            MeasureChoice::Min => Self::Min,
            MeasureChoice::Max => Self::Max,
        }
    }
}

/// Row dimension, requested measures and row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotSpec {
    pub row: SemanticRole,
    pub measures: Vec<Measure>,
    pub top_n: usize,
}

impl PivotSpec {
    /// Add or remove a measure, keeping request order.
    pub fn toggle_measure(&mut self, measure: Measure) {
        if let Some(pos) = self.measures.iter().position(|m| *m == measure) {
            self.measures.remove(pos);
        } else {
            self.measures.push(measure);
        }
    }
}

#[derive(Debug, Clone)]
pub struct PivotResult {
    /// Row column followed by one column per measure.
    pub frame: DataFrame,
    pub row_column: String,
    pub measures: Vec<Measure>,
    pub sort_by: Measure,
}

impl PivotResult {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Measure plotted on a chart: Mean when present, otherwise the sort key.
    pub fn chart_measure(&self) -> Measure {
        if self.measures.contains(&Measure::Mean) {
            Measure::Mean
        } else {
            self.sort_by
        }
    }
}

/// Measures in request order without repeats; Count alone when nothing was requested.
fn effective_measures(requested: &[Measure]) -> Vec<Measure> {
    let mut out: Vec<Measure> = Vec::with_capacity(requested.len().max(1));
    for m in requested {
        if !out.contains(m) {
            out.push(*m);
        }
    }
    if out.is_empty() {
        out.push(Measure::Count);
    }
    out
}

/// Group `frame` by `row_column` and aggregate `score_column`.
///
/// Missing row values form their own group. Groups start in ascending key order (the missing
/// group last), are sorted descending by Mean when requested or else by the first measure,
/// keeping that order for ties, and are cut to `top_n`.
pub fn pivot(
    frame: &DataFrame,
    row_column: &str,
    measures: &[Measure],
    score_column: &str,
    top_n: usize,
) -> Result<PivotResult> {
    if top_n == 0 {
        return Err(DashboardError::InvalidTopN(top_n).into());
    }
    let measures = effective_measures(measures);
    let sort_by = if measures.contains(&Measure::Mean) {
        Measure::Mean
    } else {
        measures[0]
    };

    let score = col(score_column).cast(DataType::Float64);
    let aggs: Vec<Expr> = measures.iter().map(|m| m.expr(score.clone())).collect();
    let result = frame
        .clone()
        .lazy()
        .group_by([col(row_column)])
        .agg(aggs)
        .sort_by_exprs(
            vec![col(row_column)],
            SortMultipleOptions::default()
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .sort_by_exprs(
            vec![col(sort_by.label())],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .limit(top_n as IdxSize)
        .collect()?;

    debug!(
        row = row_column,
        groups = result.height(),
        sort_by = sort_by.label(),
        "pivoted"
    );
    Ok(PivotResult {
        frame: result,
        row_column: row_column.to_string(),
        measures,
        sort_by,
    })
}
