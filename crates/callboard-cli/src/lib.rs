//! Shared CLI definitions for callboard.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Which uploaded dataset an option refers to.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatasetChoice {
    /// Call-quality survey workbook (required)
    Survey,
    /// Raw call data workbook
    Calls,
    /// Complaint workbook
    Complaints,
}

impl DatasetChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::Calls => "calls",
            Self::Complaints => "complaints",
        }
    }
}

/// Categorical role used as the pivot row dimension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RowChoice {
    Agent,
    Leader,
    Location,
    Team,
    Skill,
}

/// Aggregate computed over the score column per pivot row.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MeasureChoice {
    /// Number of non-empty scores
    Count,
    /// Average score
    Mean,
    /// Lowest score
    Min,
    /// Highest score
    Max,
}

/// Input file format (used to bypass extension-based detection).
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Excel (.xls, .xlsx, .xlsm, .xlsb)
    Excel,
    /// Comma-separated values (one sheet)
    Csv,
}

impl FileFormat {
    /// Detect file format from path extension. Returns None when extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "xlsx", "csv").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "csv" | "txt" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Parse a `KIND=NAME` sheet override, e.g. `survey=Data`.
pub fn parse_sheet_override(s: &str) -> Result<(DatasetChoice, String), String> {
    let (kind, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=SHEET, got '{}'", s))?;
    let kind = DatasetChoice::from_str(kind.trim(), true)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("sheet name is empty in '{}'", s));
    }
    Ok((kind, name.to_string()))
}

/// Command-line arguments for callboard
#[derive(Clone, Parser, Debug)]
#[command(
    name = "callboard",
    version,
    about = "Call-center survey, call and complaint analysis in the terminal"
)]
pub struct Args {
    /// Call-quality survey workbook (xlsx, xls, xlsb, csv). Required for analysis.
    #[arg(long = "survey", short = 's', value_name = "PATH")]
    pub survey: Option<PathBuf>,

    /// Raw call data workbook
    #[arg(long = "calls", value_name = "PATH")]
    pub calls: Option<PathBuf>,

    /// Complaint workbook
    #[arg(long = "complaints", value_name = "PATH")]
    pub complaints: Option<PathBuf>,

    /// Use this sheet instead of the best-scoring one, e.g. --sheet survey=Data (repeatable)
    #[arg(long = "sheet", value_name = "KIND=SHEET", value_parser = parse_sheet_override)]
    pub sheets: Vec<(DatasetChoice, String)>,

    /// Force the input format instead of detecting it from the file extension
    #[arg(long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// Dataset to filter and pivot
    #[arg(long = "dataset", value_enum, default_value = "survey")]
    pub dataset: DatasetChoice,

    /// Keep only these locations (repeatable)
    #[arg(long = "location", short = 'l', value_name = "VALUE")]
    pub locations: Vec<String>,

    /// Keep only these team leaders (repeatable)
    #[arg(long = "leader", value_name = "VALUE")]
    pub leaders: Vec<String>,

    /// Keep only these teams (repeatable)
    #[arg(long = "team", value_name = "VALUE")]
    pub teams: Vec<String>,

    /// Keep only these skills (repeatable)
    #[arg(long = "skill", value_name = "VALUE")]
    pub skills: Vec<String>,

    /// First day of the date filter (YYYY-MM-DD or DD.MM.YYYY), inclusive
    #[arg(long = "from", value_name = "DATE")]
    pub from: Option<String>,

    /// Last day of the date filter (YYYY-MM-DD or DD.MM.YYYY), inclusive
    #[arg(long = "to", value_name = "DATE")]
    pub to: Option<String>,

    /// Pivot row dimension (default from config: agent)
    #[arg(long = "row", value_enum)]
    pub row: Option<RowChoice>,

    /// Measures to compute over the score column (repeatable; default from config: count, mean)
    #[arg(long = "measure", short = 'm', value_enum)]
    pub measures: Vec<MeasureChoice>,

    /// Number of pivot rows to keep after sorting
    #[arg(long = "top", value_name = "N", value_parser = clap::value_parser!(u16).range(5..=500))]
    pub top: Option<u16>,

    /// Show the filtered rows instead of the pivot summary
    #[arg(long = "data", action)]
    pub data: bool,

    /// Print the displayed table as JSON
    #[arg(long = "json", action)]
    pub json: bool,

    /// Print the cascading filter options for the current selection
    #[arg(long = "options", action)]
    pub options: bool,

    /// List every sheet of every loaded workbook with its role score
    #[arg(long = "list-sheets", action)]
    pub list_sheets: bool,

    /// Write the displayed table to this CSV file (UTF-8 with BOM)
    #[arg(long = "export", value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Write a bar chart of the pivot to this file (.png or .eps)
    #[arg(long = "chart", value_name = "FILE")]
    pub chart: Option<PathBuf>,

    /// Open the interactive dashboard
    #[arg(long = "interactive", short = 'i', action)]
    pub interactive: bool,

    /// Enable debug logging
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/callboard/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

impl Args {
    /// Source path given for a dataset, if any.
    pub fn path_for(&self, kind: DatasetChoice) -> Option<&Path> {
        match kind {
            DatasetChoice::Survey => self.survey.as_deref(),
            DatasetChoice::Calls => self.calls.as_deref(),
            DatasetChoice::Complaints => self.complaints.as_deref(),
        }
    }

    /// Sheet override for a dataset (last one wins).
    pub fn sheet_for(&self, kind: DatasetChoice) -> Option<&str> {
        self.sheets
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
    }
}

/// Escape a string for use inside a markdown table cell (pipes and newlines).
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let mut parts = Vec::new();
        if let Some(s) = arg.get_short() {
            parts.push(format!("-{s}"));
        }
        if let Some(l) = arg.get_long() {
            parts.push(format!("--{l}"));
        }
        let op = parts.join(", ");
        let placeholder: String = if arg.get_action().takes_values() {
            arg.get_value_names()
                .map(|names| {
                    names
                        .iter()
                        .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default()
        } else {
            String::new()
        };
        let option_str = if placeholder.is_empty() {
            op
        } else {
            format!("{op} {placeholder}")
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
