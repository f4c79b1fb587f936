//! Workbook parsing: every sheet of an uploaded file becomes a polars `DataFrame`.
//!
//! Excel-family files go through calamine with per-column type inference; CSV files become a
//! single sheet named after the file stem.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use callboard_cli::FileFormat;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use color_eyre::Result;
use polars::datatypes::TimeUnit;
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::error::DashboardError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkbookFormat {
    Excel,
    Csv,
}

impl WorkbookFormat {
    /// Pick the format from the source name's extension, falling back to the file header.
    pub fn detect(source_name: &str, bytes: &[u8]) -> Self {
        match FileFormat::from_path(Path::new(source_name)) {
            Some(f) => f.into(),
            None => Self::sniff(bytes),
        }
    }

    /// Zip containers (xlsx, xlsm, xlsb, ods) and CFB files (xls) are Excel; anything else is
    /// treated as delimited text.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(CFB_MAGIC) {
            Self::Excel
        } else {
            Self::Csv
        }
    }
}

impl From<FileFormat> for WorkbookFormat {
    fn from(f: FileFormat) -> Self {
        match f {
            FileFormat::Excel => Self::Excel,
            FileFormat::Csv => Self::Csv,
        }
    }
}

/// One table of a workbook.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub frame: DataFrame,
}

impl Sheet {
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }
}

/// Parsed upload. Sheets keep the order they have in the file.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub source_name: String,
    pub format: WorkbookFormat,
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(source_name: impl Into<String>, format: WorkbookFormat, sheets: Vec<Sheet>) -> Self {
        Self {
            source_name: source_name.into(),
            format,
            sheets,
        }
    }

    /// Parse raw file bytes. `format` overrides detection.
    pub fn from_bytes(
        source_name: &str,
        bytes: &[u8],
        format: Option<WorkbookFormat>,
    ) -> Result<Self> {
        let format = format.unwrap_or_else(|| WorkbookFormat::detect(source_name, bytes));
        let sheets = match format {
            WorkbookFormat::Excel => read_excel_sheets(source_name, bytes)?,
            WorkbookFormat::Csv => vec![read_csv_sheet(source_name, bytes)?],
        };
        if sheets.is_empty() {
            return Err(DashboardError::EmptyWorkbook {
                source_name: source_name.to_string(),
            }
            .into());
        }
        debug!(
            source = source_name,
            ?format,
            sheets = sheets.len(),
            "parsed workbook"
        );
        Ok(Self::new(source_name, format, sheets))
    }

    /// The same parsed sheets under another upload name. A CSV sheet follows the new file
    /// stem.
    pub fn renamed(&self, source_name: &str) -> Self {
        let mut sheets = self.sheets.clone();
        if self.format == WorkbookFormat::Csv {
            for sheet in &mut sheets {
                sheet.name = csv_sheet_name(source_name);
            }
        }
        Self::new(source_name, self.format, sheets)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

fn workbook_error(source_name: &str, err: impl std::fmt::Display) -> DashboardError {
    DashboardError::Workbook {
        source_name: source_name.to_string(),
        message: err.to_string(),
    }
}

fn read_excel_sheets(source_name: &str, bytes: &[u8]) -> Result<Vec<Sheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| workbook_error(source_name, e))?;
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| workbook_error(source_name, e))?;
        let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
        let frame = rows_to_frame(&rows)?;
        debug!(
            sheet = %name,
            rows = frame.height(),
            columns = frame.width(),
            "read sheet"
        );
        sheets.push(Sheet { name, frame });
    }
    Ok(sheets)
}

/// First row is the header; blank headers become `column_N` and repeated ones get a suffix.
fn rows_to_frame(rows: &[Vec<Data>]) -> Result<DataFrame> {
    let Some(header_row) = rows.first() else {
        return Ok(DataFrame::new(vec![])?);
    };
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(header_row.len());
    for (col_idx, cell) in header_row.iter().enumerate() {
        let header = calamine::DataType::as_string(cell)
            .unwrap_or_else(|| cell.to_string())
            .trim()
            .to_string();
        let base = if header.is_empty() {
            format!("column_{}", col_idx + 1)
        } else {
            header
        };
        let name = unique_name(&base, &mut seen);
        let cells: Vec<Option<&Data>> = rows[1..].iter().map(|row| row.get(col_idx)).collect();
        let inferred = infer_column_type(&cells);
        columns.push(column_to_series(&name, &cells, inferred)?.into());
    }
    Ok(DataFrame::new(columns)?)
}

fn unique_name(base: &str, seen: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while !seen.insert(name.clone()) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    name
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Date,
    Datetime,
}

/// Whole-number floats become Int64; datetime cells, and text columns where every value
/// parses as a date, become Date (all midnight) or Datetime.
fn infer_column_type(cells: &[Option<&Data>]) -> CellType {
    use calamine::DataType as CalamineTrait;
    let mut has_string = false;
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_datetime = false;
    for cell in cells.iter().flatten() {
        if CalamineTrait::is_string(*cell) {
            has_string = true;
            break;
        }
        if CalamineTrait::is_float(*cell)
            || CalamineTrait::is_datetime(*cell)
            || CalamineTrait::is_datetime_iso(*cell)
        {
            has_float = true;
        }
        if CalamineTrait::is_int(*cell) {
            has_int = true;
        }
        if CalamineTrait::is_bool(*cell) {
            has_bool = true;
        }
        if CalamineTrait::is_datetime(*cell) || CalamineTrait::is_datetime_iso(*cell) {
            has_datetime = true;
        }
    }
    if has_string {
        let any_parsed = cells
            .iter()
            .flatten()
            .any(|c| cell_to_naive_datetime(c).is_some());
        let all_non_empty_parse = cells
            .iter()
            .flatten()
            .all(|c| CalamineTrait::is_empty(*c) || cell_to_naive_datetime(c).is_some());
        if any_parsed && all_non_empty_parse {
            date_or_datetime(cells)
        } else {
            CellType::Utf8
        }
    } else if has_datetime {
        date_or_datetime(cells)
    } else if has_int && !has_float {
        CellType::Int64
    } else if has_float {
        let all_whole = cells.iter().flatten().all(|cell| {
            cell.as_f64()
                .is_none_or(|f| f.is_finite() && (f - f.trunc()).abs() < 1e-10)
        });
        if all_whole {
            CellType::Int64
        } else {
            CellType::Float64
        }
    } else if has_bool {
        CellType::Boolean
    } else {
        CellType::Utf8
    }
}

fn date_or_datetime(cells: &[Option<&Data>]) -> CellType {
    if cells
        .iter()
        .flatten()
        .filter_map(|c| cell_to_naive_datetime(c))
        .all(|dt| dt.time() == NaiveTime::MIN)
    {
        CellType::Date
    } else {
        CellType::Datetime
    }
}

fn cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?;
    parse_naive_datetime_str(s)
}

/// Parse the date and datetime spellings found in call-center exports: ISO forms and the
/// Turkish `dd.mm.yyyy` forms.
pub fn parse_naive_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Excel serial day number (1900 date system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let micros = (serial * 86_400_000_000.0).round() as i64;
    epoch.checked_add_signed(Duration::microseconds(micros))
}

fn column_to_series(name: &str, cells: &[Option<&Data>], col_type: CellType) -> Result<Series> {
    use calamine::DataType as CalamineTrait;
    let series = match col_type {
        CellType::Int64 => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_i64()))
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Float64 => {
            let v: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_f64()))
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Utf8 => {
            // datetime cells keep their value as text next to unparseable strings
            let v: Vec<Option<String>> = cells
                .iter()
                .map(|c| {
                    c.and_then(|cell| {
                        if CalamineTrait::is_datetime(cell) || CalamineTrait::is_datetime_iso(cell)
                        {
                            cell_to_naive_datetime(cell)
                                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                        } else {
                            cell.as_string()
                        }
                    })
                })
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            let v: Vec<Option<i32>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_to_naive_datetime)
                        .map(|dt| (dt.date() - epoch).num_days() as i32)
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Date)?
        }
        CellType::Datetime => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_to_naive_datetime)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series)
}

fn read_csv_sheet(source_name: &str, bytes: &[u8]) -> Result<Sheet> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let separator = sniff_separator(body);
    let read_options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .map_parse_options(|opts| opts.with_separator(separator));
    let frame = CsvReader::new(Cursor::new(body.to_vec()))
        .with_options(read_options)
        .finish()
        .map_err(|e| workbook_error(source_name, e))?;
    let name = csv_sheet_name(source_name);
    debug!(sheet = %name, rows = frame.height(), separator = %(separator as char), "read csv");
    Ok(Sheet { name, frame })
}

fn csv_sheet_name(source_name: &str) -> String {
    Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Sheet1")
        .to_string()
}

/// Semicolon-separated exports are common where the decimal separator is a comma.
fn sniff_separator(body: &[u8]) -> u8 {
    let header = body.split(|b| *b == b'\n').next().unwrap_or(body);
    let count = |sep: u8| header.iter().filter(|b| **b == sep).count();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|sep| (count(*sep), *sep == b','))
        .unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_format_from_magic_bytes() {
        assert_eq!(WorkbookFormat::sniff(b"PK\x03\x04rest"), WorkbookFormat::Excel);
        assert_eq!(
            WorkbookFormat::sniff(b"\xD0\xCF\x11\xE0\xA1\xB1"),
            WorkbookFormat::Excel
        );
        assert_eq!(WorkbookFormat::sniff(b"Agent,Score\n"), WorkbookFormat::Csv);
    }

    #[test]
    fn test_detect_prefers_extension() {
        assert_eq!(
            WorkbookFormat::detect("anket.csv", b"PK\x03\x04"),
            WorkbookFormat::Csv
        );
        assert_eq!(
            WorkbookFormat::detect("upload", b"PK\x03\x04"),
            WorkbookFormat::Excel
        );
    }

    #[test]
    fn test_csv_with_bom_and_semicolons() {
        let bytes = "\u{FEFF}Temsilci;Lokasyon;Puan\nAli;Ankara;4\nVeli;İzmir;5\n".as_bytes();
        let wb = Workbook::from_bytes("anket.csv", bytes, None).unwrap();
        assert_eq!(wb.sheet_names(), vec!["anket"]);
        let sheet = &wb.sheets()[0];
        assert_eq!(
            sheet.column_names(),
            vec!["Temsilci", "Lokasyon", "Puan"]
        );
        assert_eq!(sheet.frame.height(), 2);
    }

    #[test]
    fn test_parse_naive_datetime_str_formats() {
        let dt = parse_naive_datetime_str("05.03.2024 14:30").unwrap();
        assert_eq!(dt.to_string(), "2024-03-05 14:30:00");
        let d = parse_naive_datetime_str("2024-03-05").unwrap();
        assert_eq!(d.time(), NaiveTime::MIN);
        assert!(parse_naive_datetime_str("yarın").is_none());
        assert!(parse_naive_datetime_str("  ").is_none());
    }

    #[test]
    fn test_excel_serial_epoch() {
        let dt = excel_serial_to_datetime(45356.5).unwrap();
        assert_eq!(dt.to_string(), "2024-03-05 12:00:00");
        assert!(excel_serial_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn test_rows_to_frame_infers_types_and_names() {
        let rows = vec![
            vec![
                Data::String("Temsilci".into()),
                Data::Empty,
                Data::String("Puan".into()),
                Data::String("Puan".into()),
            ],
            vec![
                Data::String("Ali".into()),
                Data::Float(1.0),
                Data::Float(4.5),
                Data::String("03.01.2024".into()),
            ],
            vec![
                Data::String("Veli".into()),
                Data::Float(2.0),
                Data::Empty,
                Data::String("04.01.2024".into()),
            ],
        ];
        let df = rows_to_frame(&rows).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(names, vec!["Temsilci", "column_2", "Puan", "Puan_2"]);
        assert_eq!(df.column("column_2").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("Puan").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Puan_2").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("Puan").unwrap().null_count(), 1);
    }

    #[test]
    fn test_mixed_int_and_fractional_float_stays_float() {
        let rows = vec![
            vec![Data::String("Puan".into()), Data::String("Adet".into())],
            vec![Data::Int(4), Data::Int(2)],
            vec![Data::Float(4.5), Data::Float(3.0)],
        ];
        let df = rows_to_frame(&rows).unwrap();
        assert_eq!(df.column("Puan").unwrap().dtype(), &DataType::Float64);
        let puan = df.column("Puan").unwrap().as_materialized_series().clone();
        let values: Vec<Option<f64>> = puan.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(4.0), Some(4.5)]);
        // whole floats next to ints are still integers
        assert_eq!(df.column("Adet").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_datetime_cells_survive_a_text_cell() {
        let rows = vec![
            vec![Data::String("Tarih".into())],
            vec![Data::DateTimeIso("2024-03-01T09:00:00".into())],
            vec![Data::String("bilinmiyor".into())],
            vec![Data::Empty],
        ];
        let df = rows_to_frame(&rows).unwrap();
        let tarih = df.column("Tarih").unwrap().as_materialized_series().clone();
        assert_eq!(tarih.dtype(), &DataType::String);
        let values: Vec<Option<&str>> = tarih.str().unwrap().into_iter().collect();
        assert_eq!(
            values,
            vec![Some("2024-03-01 09:00:00"), Some("bilinmiyor"), None]
        );
    }

    #[test]
    fn test_renamed_csv_workbook_follows_new_stem() {
        let wb = Workbook::from_bytes("anket.csv", b"Temsilci,Puan\nAli,4\n", None).unwrap();
        let renamed = wb.renamed("sikayet.csv");
        assert_eq!(renamed.source_name, "sikayet.csv");
        assert_eq!(renamed.sheet_names(), vec!["sikayet"]);
        assert_eq!(wb.sheet_names(), vec!["anket"]);
    }

    #[test]
    fn test_header_only_sheet_has_no_rows() {
        let rows = vec![vec![Data::String("Temsilci".into())]];
        let df = rows_to_frame(&rows).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 1);
    }
}
