pub mod cache;
pub mod chart_export;
pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod export;
pub mod filter;
pub mod logging;
pub mod pivot;
pub mod report;
pub mod resolve;
pub mod roles;
pub mod session;
pub mod sheet_select;
pub mod table_text;
pub mod widgets;
pub mod workbook;

pub use cache::{CacheManager, CacheStats, WorkbookCache};
pub use config::{AppConfig, ColorParser, ConfigManager, Theme};
pub use dashboard::{AppEvent, Dashboard};
pub use dataset::{Analysis, Dataset, DatasetKind};
pub use error::DashboardError;
pub use filter::{apply_filters, cascade_options, CascadeOptions, DateRange, FilterSelection};
pub use pivot::{pivot, Measure, PivotResult, PivotSpec};
pub use resolve::{normalize_label, resolve_column};
pub use roles::{RoleAliases, RoleMapping, SemanticRole};
pub use session::{Session, SessionOptions};
pub use sheet_select::{score_sheets, select_best_sheet, SheetScore};
pub use workbook::{Sheet, Workbook, WorkbookFormat};

/// Application name used for cache directory and other app-specific paths
pub const APP_NAME: &str = "callboard";
