//! Error taxonomy and user-facing error message formatting.
//!
//! `DashboardError` carries the conditions an analyst has to act on (a missing upload, a
//! workbook without the mandatory columns, an invalid control value). Everything else is
//! propagated as a `color_eyre::Report` and turned into a one-line message by
//! [`user_message_from_report`].

use polars::prelude::PolarsError;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::dataset::DatasetKind;
use crate::roles::SemanticRole;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("No {dataset} workbook was provided. Upload the {dataset} file to continue.")]
    MissingInput { dataset: DatasetKind },

    #[error(
        "The {dataset} workbook ({source_name}, sheet '{sheet}') has no column for {}. \
         Rename the column or add an alias under [roles] in the config.",
        join_roles(.roles)
    )]
    MissingColumns {
        dataset: DatasetKind,
        source_name: String,
        sheet: String,
        roles: Vec<SemanticRole>,
    },

    #[error("The {dataset} workbook ({source_name}) has no sheet named '{sheet}'")]
    SheetNotFound {
        dataset: DatasetKind,
        source_name: String,
        sheet: String,
    },

    #[error("Cannot pivot by {role}: the active dataset has no {role} column")]
    RowDimensionUnavailable { role: SemanticRole },

    #[error("{role} cannot be used as a pivot row")]
    InvalidRowDimension { role: SemanticRole },

    #[error("{source_name} contains no worksheets")]
    EmptyWorkbook { source_name: String },

    #[error("Could not read {source_name}: {message}")]
    Workbook {
        source_name: String,
        message: String,
    },

    #[error("Top-N must be a positive number of rows (got {0})")]
    InvalidTopN(usize),

    #[error("Date range starts after it ends ({start} > {end})")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Invalid date '{0}'. Use YYYY-MM-DD or DD.MM.YYYY")]
    InvalidDate(String),

    #[error("Nothing to chart: the pivot has no numeric values")]
    NoChartData,
}

fn join_roles(roles: &[SemanticRole]) -> String {
    roles
        .iter()
        .map(|r| r.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::ComputeError(msg) => format!("Could not compute result: {}", msg),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting to known error types.
/// Walks the cause chain to find DashboardError, PolarsError or io::Error.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    let with_path = |msg: String| match path {
        Some(p) => format!("Failed to load {}: {}", p.display(), msg),
        None => msg,
    };

    for cause in report.chain() {
        if let Some(de) = cause.downcast_ref::<DashboardError>() {
            return de.to_string();
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return with_path(user_message_from_polars(pe));
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return with_path(user_message_from_io(io_err, None));
        }
    }

    // Fallback: use first line of display to avoid long tracebacks
    let display = report.to_string();
    let first_line = display.lines().next().unwrap_or("An error occurred");
    with_path(first_line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::eyre;

    #[test]
    fn test_missing_columns_names_every_role() {
        let err = DashboardError::MissingColumns {
            dataset: DatasetKind::Survey,
            source_name: "anket.xlsx".to_string(),
            sheet: "Data".to_string(),
            roles: vec![SemanticRole::Agent, SemanticRole::Score],
        };
        let msg = err.to_string();
        assert!(msg.contains("Agent, Score"), "got: {}", msg);
        assert!(msg.contains("'Data'"), "got: {}", msg);
        assert!(msg.contains("survey"), "got: {}", msg);
    }

    #[test]
    fn test_missing_input_names_dataset() {
        let msg = DashboardError::MissingInput {
            dataset: DatasetKind::Complaints,
        }
        .to_string();
        assert!(msg.contains("complaints"), "got: {}", msg);
    }

    #[test]
    fn test_user_message_from_io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let msg = user_message_from_io(&err, None);
        assert!(msg.contains("not found"), "got: {}", msg);
    }

    #[test]
    fn test_user_message_from_polars_column_not_found() {
        let err = PolarsError::ColumnNotFound("Puan".into());
        let msg = user_message_from_polars(&err);
        assert!(msg.contains("Puan"), "got: {}", msg);
        assert!(msg.contains("Column not found"), "got: {}", msg);
    }

    #[test]
    fn test_user_message_from_report_prefers_dashboard_error() {
        let report = color_eyre::eyre::Report::new(DashboardError::InvalidTopN(0));
        let msg = user_message_from_report(&report, Some(Path::new("x.xlsx")));
        assert!(msg.starts_with("Top-N"), "got: {}", msg);
    }

    #[test]
    fn test_user_message_from_report_fallback_first_line() {
        let report = eyre!("first line\nsecond line");
        assert_eq!(user_message_from_report(&report, None), "first line");
    }
}
