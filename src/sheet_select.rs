//! Choosing the working sheet of a workbook.

use crate::resolve::resolve_column;
use crate::roles::SemanticRole;
use crate::workbook::{Sheet, Workbook};

/// How many role groups one sheet can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetScore {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub resolved: Vec<SemanticRole>,
}

impl SheetScore {
    pub fn score(&self) -> usize {
        self.resolved.len()
    }
}

fn resolved_roles(sheet: &Sheet, role_groups: &[(SemanticRole, Vec<String>)]) -> Vec<SemanticRole> {
    let columns = sheet.column_names();
    role_groups
        .iter()
        .filter(|(_, candidates)| resolve_column(&columns, candidates).is_some())
        .map(|(role, _)| *role)
        .collect()
}

/// Score every sheet, in workbook order.
pub fn score_sheets(
    workbook: &Workbook,
    role_groups: &[(SemanticRole, Vec<String>)],
) -> Vec<SheetScore> {
    workbook
        .sheets()
        .iter()
        .map(|sheet| SheetScore {
            name: sheet.name.clone(),
            rows: sheet.frame.height(),
            columns: sheet.frame.width(),
            resolved: resolved_roles(sheet, role_groups),
        })
        .collect()
}

/// The sheet resolving the most role groups. Ties keep the earliest sheet; `None` only when
/// the workbook has no sheets.
pub fn select_best_sheet<'a>(
    workbook: &'a Workbook,
    role_groups: &[(SemanticRole, Vec<String>)],
) -> Option<(&'a str, &'a Sheet)> {
    let mut best: Option<(usize, &Sheet)> = None;
    for sheet in workbook.sheets() {
        let score = resolved_roles(sheet, role_groups).len();
        if best.is_none_or(|(top, _)| score > top) {
            best = Some((score, sheet));
        }
    }
    best.map(|(_, sheet)| (sheet.name.as_str(), sheet))
}
