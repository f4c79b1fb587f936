//! A prepared dataset: the working sheet of one upload, its role mapping, and a frame whose
//! role columns have been coerced to the types the engines expect.

use callboard_cli::DatasetChoice;
use color_eyre::Result;
use polars::datatypes::TimeUnit;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::error::DashboardError;
use crate::filter::{self, CascadeOptions, DateRange, FilterSelection};
use crate::pivot::{self, PivotResult, PivotSpec};
use crate::roles::{RoleAliases, RoleMapping, SemanticRole};
use crate::sheet_select::{score_sheets, select_best_sheet, SheetScore};
use crate::workbook::{excel_serial_to_datetime, parse_naive_datetime_str, Workbook};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Survey,
    Calls,
    Complaints,
}

impl DatasetKind {
    pub const ALL: [Self; 3] = [Self::Survey, Self::Calls, Self::Complaints];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::Calls => "calls",
            Self::Complaints => "complaints",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Survey => "Survey",
            Self::Calls => "Calls",
            Self::Complaints => "Complaints",
        }
    }

    /// Next kind, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Survey => Self::Calls,
            Self::Calls => Self::Complaints,
            Self::Complaints => Self::Survey,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DatasetChoice> for DatasetKind {
    fn from(c: DatasetChoice) -> Self {
        match c {
            DatasetChoice::Survey => Self::Survey,
            DatasetChoice::Calls => Self::Calls,
            DatasetChoice::Complaints => Self::Complaints,
        }
    }
}

/// Output of one pass through filter and pivot.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub filtered: DataFrame,
    pub pivot: PivotResult,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub source_name: String,
    pub sheet: String,
    pub frame: DataFrame,
    pub mapping: RoleMapping,
    /// Score of every sheet in the workbook, in workbook order.
    pub sheet_scores: Vec<SheetScore>,
}

impl Dataset {
    /// Select the working sheet, resolve roles and coerce the role columns.
    ///
    /// Fails with [`DashboardError::MissingColumns`] when Agent or Score cannot be resolved on
    /// the selected sheet.
    pub fn prepare(
        kind: DatasetKind,
        workbook: &Workbook,
        aliases: &RoleAliases,
        sheet_override: Option<&str>,
    ) -> Result<Self> {
        let groups = aliases.groups(&SemanticRole::SHEET_SELECTION);
        let sheet = match sheet_override {
            Some(name) => workbook
                .sheet(name)
                .ok_or_else(|| DashboardError::SheetNotFound {
                    dataset: kind,
                    source_name: workbook.source_name.clone(),
                    sheet: name.to_string(),
                })?,
            None => {
                select_best_sheet(workbook, &groups)
                    .ok_or_else(|| DashboardError::EmptyWorkbook {
                        source_name: workbook.source_name.clone(),
                    })?
                    .1
            }
        };

        let mapping = RoleMapping::resolve(&sheet.column_names(), aliases);
        let missing = mapping.missing(&SemanticRole::MANDATORY);
        if !missing.is_empty() {
            return Err(DashboardError::MissingColumns {
                dataset: kind,
                source_name: workbook.source_name.clone(),
                sheet: sheet.name.clone(),
                roles: missing,
            }
            .into());
        }
        for (role, column) in mapping.iter() {
            debug!(dataset = %kind, %role, column, "resolved role");
        }

        let frame = coerce_role_columns(sheet.frame.clone(), &mapping)?;
        info!(
            dataset = %kind,
            source = %workbook.source_name,
            sheet = %sheet.name,
            rows = frame.height(),
            "prepared dataset"
        );
        Ok(Self {
            kind,
            source_name: workbook.source_name.clone(),
            sheet: sheet.name.clone(),
            frame,
            mapping,
            sheet_scores: score_sheets(workbook, &groups),
        })
    }

    pub fn column(&self, role: SemanticRole) -> Option<&str> {
        self.mapping.column(role)
    }

    pub fn filter(&self, selection: &FilterSelection) -> Result<DataFrame> {
        filter::apply_filters(&self.frame, &self.mapping, selection)
    }

    pub fn options(&self, selection: &FilterSelection) -> Result<CascadeOptions> {
        filter::cascade_options(&self.frame, &self.mapping, selection)
    }

    pub fn date_bounds(&self) -> Result<Option<DateRange>> {
        filter::date_bounds(&self.frame, &self.mapping)
    }

    /// Pivot an already filtered frame of this dataset.
    pub fn pivot(&self, filtered: &DataFrame, spec: &PivotSpec) -> Result<PivotResult> {
        if !spec.row.is_categorical() {
            return Err(DashboardError::InvalidRowDimension { role: spec.row }.into());
        }
        let row_column = self
            .mapping
            .column(spec.row)
            .ok_or(DashboardError::RowDimensionUnavailable { role: spec.row })?;
        let score_column = self
            .mapping
            .column(SemanticRole::Score)
            .ok_or_else(|| DashboardError::MissingColumns {
                dataset: self.kind,
                source_name: self.source_name.clone(),
                sheet: self.sheet.clone(),
                roles: vec![SemanticRole::Score],
            })?;
        pivot::pivot(
            filtered,
            row_column,
            &spec.measures,
            score_column,
            spec.top_n,
        )
    }

    /// Filter then pivot. Everything is recomputed from the prepared frame.
    pub fn analyze(&self, selection: &FilterSelection, spec: &PivotSpec) -> Result<Analysis> {
        let filtered = self.filter(selection)?;
        let pivot = self.pivot(&filtered, spec)?;
        Ok(Analysis { filtered, pivot })
    }
}

/// Categorical roles become text, Date becomes `Datetime(us)` and Score becomes Float64.
/// Values that cannot be converted become null.
fn coerce_role_columns(mut frame: DataFrame, mapping: &RoleMapping) -> Result<DataFrame> {
    for role in SemanticRole::FILTER_ORDER
        .iter()
        .chain(std::iter::once(&SemanticRole::Agent))
    {
        if let Some(name) = mapping.column(*role) {
            let series = frame.column(name)?.as_materialized_series().clone();
            if series.dtype() != &DataType::String {
                frame.with_column(series.cast(&DataType::String)?)?;
            }
        }
    }
    if let Some(name) = mapping.column(SemanticRole::Date) {
        let series = frame.column(name)?.as_materialized_series().clone();
        frame.with_column(coerce_datetime(&series)?)?;
    }
    if let Some(name) = mapping.column(SemanticRole::Score) {
        let series = frame.column(name)?.as_materialized_series().clone();
        frame.with_column(coerce_score(&series)?)?;
    }
    Ok(frame)
}

/// `" 4,5 "` and `"4.5"` both read as 4.5.
pub fn parse_score(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn coerce_score(series: &Series) -> Result<Series> {
    let name = series.name().clone();
    let out = match series.dtype() {
        DataType::Float64 => series.clone(),
        DataType::String => {
            let values: Vec<Option<f64>> = series
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_score))
                .collect();
            Series::new(name, values)
        }
        dt if dt.is_primitive_numeric() || dt == &DataType::Boolean => {
            series.cast(&DataType::Float64)?
        }
        _ => Series::full_null(name, series.len(), &DataType::Float64),
    };
    Ok(out)
}

fn coerce_datetime(series: &Series) -> Result<Series> {
    let target = DataType::Datetime(TimeUnit::Microseconds, None);
    let name = series.name().clone();
    let out = match series.dtype() {
        DataType::Datetime(TimeUnit::Microseconds, None) => series.clone(),
        DataType::Datetime(_, _) | DataType::Date => series.cast(&target)?,
        DataType::String => {
            let values: Vec<Option<i64>> = series
                .str()?
                .into_iter()
                .map(|v| {
                    v.and_then(parse_naive_datetime_str)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name, values).cast(&target)?
        }
        dt if dt.is_primitive_numeric() => {
            let floats = series.cast(&DataType::Float64)?;
            let values: Vec<Option<i64>> = floats
                .f64()?
                .into_iter()
                .map(|v| {
                    v.and_then(excel_serial_to_datetime)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name, values).cast(&target)?
        }
        _ => Series::full_null(name, series.len(), &target),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::Measure;
    use crate::workbook::{Sheet, WorkbookFormat};

    fn survey_workbook() -> Workbook {
        let data = df!(
            "Müşteri Temsilcisi Adı" => &["Ali", "Ali", "Veli", "Ayşe"],
            "Takım Lideri" => &["Zeynep", "Zeynep", "Mert", "Mert"],
            "Lokasyon" => &["Ankara", "Ankara", "İzmir", "Ankara"],
            "Çağrı Tarih Saati" => &["01.03.2024 09:15", "02.03.2024 10:00", "bilinmiyor", "03.03.2024 17:45"],
            "Soru Puan 1" => &["4", "5", "3,5", "yok"]
        )
        .unwrap();
        let notes = df!("Not" => &["x"]).unwrap();
        Workbook::new(
            "anket.xlsx",
            WorkbookFormat::Excel,
            vec![
                Sheet {
                    name: "Notlar".to_string(),
                    frame: notes,
                },
                Sheet {
                    name: "Data".to_string(),
                    frame: data,
                },
            ],
        )
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(" 4,5 "), Some(4.5));
        assert_eq!(parse_score("3"), Some(3.0));
        assert_eq!(parse_score("yok"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("NaN"), None);
    }

    #[test]
    fn test_prepare_selects_sheet_and_coerces() {
        let wb = survey_workbook();
        let aliases = RoleAliases::builtin(DatasetKind::Survey);
        let ds = Dataset::prepare(DatasetKind::Survey, &wb, &aliases, None).unwrap();
        assert_eq!(ds.sheet, "Data");
        assert_eq!(ds.sheet_scores.len(), 2);

        let score = ds.frame.column("Soru Puan 1").unwrap();
        assert_eq!(score.dtype(), &DataType::Float64);
        assert_eq!(score.null_count(), 1);
        assert_eq!(score.get(2).unwrap().extract::<f64>(), Some(3.5));

        let date = ds.frame.column("Çağrı Tarih Saati").unwrap();
        assert_eq!(
            date.dtype(),
            &DataType::Datetime(TimeUnit::Microseconds, None)
        );
        assert_eq!(date.null_count(), 1);
    }

    #[test]
    fn test_prepare_missing_mandatory_columns() {
        let frame = df!("Lokasyon" => &["Ankara"], "Tarih" => &["2024-03-01"]).unwrap();
        let wb = Workbook::new(
            "sikayet.csv",
            WorkbookFormat::Csv,
            vec![Sheet {
                name: "sikayet".to_string(),
                frame,
            }],
        );
        let aliases = RoleAliases::builtin(DatasetKind::Complaints);
        let err = Dataset::prepare(DatasetKind::Complaints, &wb, &aliases, None).unwrap_err();
        match err.downcast_ref::<DashboardError>() {
            Some(DashboardError::MissingColumns { roles, .. }) => {
                assert_eq!(roles, &vec![SemanticRole::Agent, SemanticRole::Score]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sheet_override() {
        let wb = survey_workbook();
        let aliases = RoleAliases::builtin(DatasetKind::Survey);
        let err = Dataset::prepare(DatasetKind::Survey, &wb, &aliases, Some("Yok")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DashboardError>(),
            Some(DashboardError::SheetNotFound { .. })
        ));
        let err =
            Dataset::prepare(DatasetKind::Survey, &wb, &aliases, Some("Notlar")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DashboardError>(),
            Some(DashboardError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_pivot_by_unresolved_role() {
        let wb = survey_workbook();
        let aliases = RoleAliases::builtin(DatasetKind::Survey);
        let ds = Dataset::prepare(DatasetKind::Survey, &wb, &aliases, None).unwrap();
        let spec = PivotSpec {
            row: SemanticRole::Team,
            measures: vec![Measure::Count],
            top_n: 10,
        };
        let err = ds.pivot(&ds.frame, &spec).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DashboardError>(),
            Some(DashboardError::RowDimensionUnavailable { .. })
        ));
    }

    #[test]
    fn test_analyze_filters_then_pivots() {
        let wb = survey_workbook();
        let aliases = RoleAliases::builtin(DatasetKind::Survey);
        let ds = Dataset::prepare(DatasetKind::Survey, &wb, &aliases, None).unwrap();
        let mut selection = FilterSelection::default();
        selection.set(SemanticRole::Location, ["Ankara"]);
        let spec = PivotSpec {
            row: SemanticRole::Leader,
            measures: vec![Measure::Count, Measure::Mean],
            top_n: 10,
        };
        let analysis = ds.analyze(&selection, &spec).unwrap();
        assert_eq!(analysis.filtered.height(), 3);
        let pivot = &analysis.pivot.frame;
        assert_eq!(pivot.height(), 2);
        let leaders = pivot.column("Takım Lideri").unwrap();
        assert_eq!(
            leaders.as_materialized_series().str().unwrap().get(0),
            Some("Zeynep")
        );
        assert_eq!(
            pivot.column("Mean").unwrap().get(0).unwrap().extract::<f64>(),
            Some(4.5)
        );
        // Ayşe's score is unparseable: Mert has one row but no scored value
        assert_eq!(
            pivot.column("Count").unwrap().get(1).unwrap().extract::<i64>(),
            Some(0)
        );
    }
}
