//! CSV and JSON output of the displayed table.

use color_eyre::Result;
use polars::prelude::*;
use serde_json::{Map, Number, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ExportConfig;
use crate::table_text::cell_text;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub delimiter: u8,
    pub include_bom: bool,
    pub include_header: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_bom: true,
            include_header: true,
        }
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            // validated as ASCII on load
            delimiter: u8::try_from(config.delimiter).unwrap_or(b','),
            include_bom: config.include_bom,
            include_header: true,
        }
    }
}

/// Write `frame` as CSV so spreadsheet tools detect the encoding.
pub fn write_csv<W: Write>(frame: &DataFrame, mut writer: W, options: &ExportOptions) -> Result<()> {
    if options.include_bom {
        writer.write_all(UTF8_BOM)?;
    }
    let mut frame = frame.clone();
    CsvWriter::new(&mut writer)
        .with_separator(options.delimiter)
        .include_header(options.include_header)
        .finish(&mut frame)?;
    writer.flush()?;
    Ok(())
}

pub fn export_csv(frame: &DataFrame, path: &Path, options: &ExportOptions) -> Result<()> {
    let file = File::create(path)?;
    write_csv(frame, BufWriter::new(file), options)?;
    info!(path = %path.display(), rows = frame.height(), "exported csv");
    Ok(())
}

/// File name for a dashboard export, e.g. `survey_pivot_agent.csv`, under `directory`.
pub fn export_file_name(
    directory: Option<&Path>,
    dataset: &str,
    view: &str,
    extension: &str,
) -> PathBuf {
    let name = format!("{}_{}.{}", dataset, view, extension);
    match directory {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn json_value(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Float64(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        AnyValue::Float32(v) => Number::from_f64(*v as f64).map_or(Value::Null, Value::Number),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        other => Value::String(cell_text(other).into_owned()),
    }
}

/// Array of row objects keyed by column name.
pub fn frame_to_json(frame: &DataFrame) -> Result<Value> {
    let names: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let mut rows = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        let mut row = Map::new();
        for (name, column) in names.iter().zip(frame.get_columns()) {
            row.insert(name.clone(), json_value(&column.get(i)?));
        }
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "Temsilci" => &[Some("Ayşe"), None],
            "Mean" => &[Some(4.5), None]
        )
        .unwrap()
    }

    #[test]
    fn test_write_csv_has_bom_and_header() {
        let mut buf = Vec::new();
        write_csv(&sample(), &mut buf, &ExportOptions::default()).unwrap();
        assert!(buf.starts_with(UTF8_BOM));
        let text = String::from_utf8(buf[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Temsilci,Mean"));
        assert_eq!(lines.next(), Some("Ayşe,4.5"));
        assert_eq!(lines.next(), Some(","));
    }

    #[test]
    fn test_write_csv_delimiter_without_bom() {
        let options = ExportOptions {
            delimiter: b';',
            include_bom: false,
            include_header: true,
        };
        let mut buf = Vec::new();
        write_csv(&sample(), &mut buf, &options).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Temsilci;Mean\n"));
    }

    #[test]
    fn test_options_from_config() {
        let config = ExportConfig {
            delimiter: '\t',
            include_bom: false,
            directory: None,
        };
        let options = ExportOptions::from(&config);
        assert_eq!(options.delimiter, b'\t');
        assert!(!options.include_bom);
    }

    #[test]
    fn test_frame_to_json_rows() {
        let json = frame_to_json(&sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"Temsilci": "Ayşe", "Mean": 4.5},
                {"Temsilci": null, "Mean": null}
            ])
        );
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(
            export_file_name(Some(Path::new("/tmp/r")), "survey", "pivot_agent", "csv"),
            PathBuf::from("/tmp/r/survey_pivot_agent.csv")
        );
        assert_eq!(
            export_file_name(None, "calls", "data", "png"),
            PathBuf::from("calls_data.png")
        );
    }
}
