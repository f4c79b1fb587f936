#![allow(dead_code)]

use callboard::config::RolesConfig;
use callboard::{DatasetKind, Session};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    /// Year, month, day, hour, minute; stored as a real Excel datetime.
    DateTime(u16, u8, u8, u16, u8),
    Empty,
}

/// Build an in-memory `.xlsx` with one sheet per `(name, header, rows)` entry.
pub fn xlsx_bytes(sheets: &[(&str, &[&str], Vec<Vec<Cell>>)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm");
    for (name, header, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name).unwrap();
        for (col, title) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *title).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            let r = r as u32 + 1;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    Cell::Text(text) => {
                        sheet.write_string(r, c, *text).unwrap();
                    }
                    Cell::Number(n) => {
                        sheet.write_number(r, c, *n).unwrap();
                    }
                    Cell::DateTime(y, m, d, hh, mm) => {
                        let value = ExcelDateTime::from_ymd(*y, *m, *d)
                            .unwrap()
                            .and_hms(*hh, *mm, 0)
                            .unwrap();
                        sheet
                            .write_datetime_with_format(r, c, &value, &datetime_format)
                            .unwrap();
                    }
                    Cell::Empty => {}
                }
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Comma-separated bytes from a header and rows of text.
pub fn csv_bytes(header: &[&str], rows: &[&[&str]]) -> Vec<u8> {
    let mut out = header.join(",");
    out.push('\n');
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

/// Four survey answers over two leaders and two locations.
pub fn survey_csv() -> Vec<u8> {
    csv_bytes(
        &["Temsilci", "Takım Lideri", "Lokasyon", "Tarih", "Puan"],
        &[
            &["Ali", "Mert", "Ankara", "2024-03-01", "4"],
            &["Veli", "Mert", "Ankara", "2024-03-02", "2"],
            &["Ayşe", "Selin", "İzmir", "2024-03-03", "5"],
            &["Can", "Selin", "Ankara", "2024-03-04", "3"],
        ],
    )
}

pub fn session_with(kind: DatasetKind, name: &str, bytes: &[u8]) -> Session {
    let mut session = Session::new(RolesConfig::default(), 4);
    session.load_bytes(kind, name, bytes, None, None).unwrap();
    session
}
