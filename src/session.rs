//! Loaded uploads and the options that drive one analysis session.

use callboard_cli::{Args, DatasetChoice};
use chrono::NaiveDate;
use color_eyre::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::{CacheStats, WorkbookCache};
use crate::config::{AppConfig, RolesConfig};
use crate::dataset::{Dataset, DatasetKind};
use crate::error::DashboardError;
use crate::filter::{CascadeOptions, DateRange, FilterSelection};
use crate::pivot::{Measure, PivotSpec};
use crate::roles::{RoleAliases, SemanticRole};
use crate::workbook::{parse_naive_datetime_str, WorkbookFormat};

/// Parse a `--from`/`--to` value.
pub fn parse_day(text: &str) -> std::result::Result<NaiveDate, DashboardError> {
    parse_naive_datetime_str(text)
        .map(|dt| dt.date())
        .ok_or_else(|| DashboardError::InvalidDate(text.to_string()))
}

/// Everything the command line and config decide before any file is read.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub sources: BTreeMap<DatasetKind, PathBuf>,
    pub sheets: BTreeMap<DatasetKind, String>,
    pub format: Option<WorkbookFormat>,
    pub active: DatasetKind,
    /// Categorical values given on the command line
    pub values: BTreeMap<SemanticRole, Vec<String>>,
    pub default_locations: Vec<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub pivot: PivotSpec,
    pub top_n_min: usize,
    pub top_n_max: usize,
    pub cache_capacity: usize,
}

impl SessionOptions {
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Result<Self> {
        let mut sources = BTreeMap::new();
        let mut sheets = BTreeMap::new();
        for choice in [
            DatasetChoice::Survey,
            DatasetChoice::Calls,
            DatasetChoice::Complaints,
        ] {
            let kind = DatasetKind::from(choice);
            if let Some(path) = args.path_for(choice) {
                sources.insert(kind, path.to_path_buf());
            }
            if let Some(sheet) = args.sheet_for(choice) {
                sheets.insert(kind, sheet.to_string());
            }
        }

        let mut values = BTreeMap::new();
        for (role, given) in [
            (SemanticRole::Location, &args.locations),
            (SemanticRole::Leader, &args.leaders),
            (SemanticRole::Team, &args.teams),
            (SemanticRole::Skill, &args.skills),
        ] {
            if !given.is_empty() {
                values.insert(role, given.clone());
            }
        }

        let date_from = args.from.as_deref().map(parse_day).transpose()?;
        let date_to = args.to.as_deref().map(parse_day).transpose()?;
        if let (Some(start), Some(end)) = (date_from, date_to) {
            DateRange::new(start, end)?;
        }

        // CLI args override config
        let row = args
            .row
            .map(|r| match r {
                callboard_cli::RowChoice::Agent => SemanticRole::Agent,
                callboard_cli::RowChoice::Leader => SemanticRole::Leader,
                callboard_cli::RowChoice::Location => SemanticRole::Location,
                callboard_cli::RowChoice::Team => SemanticRole::Team,
                callboard_cli::RowChoice::Skill => SemanticRole::Skill,
            })
            .unwrap_or(config.pivot.default_row);
        let measures: Vec<Measure> = if args.measures.is_empty() {
            config.pivot.default_measures.clone()
        } else {
            args.measures.iter().copied().map(Measure::from).collect()
        };
        let top_n = config
            .pivot
            .clamp_top_n(args.top.map(usize::from).unwrap_or(config.pivot.top_n));

        Ok(Self {
            sources,
            sheets,
            format: args.format.map(WorkbookFormat::from),
            active: args.dataset.into(),
            values,
            default_locations: config.filters.default_locations.clone(),
            date_from,
            date_to,
            pivot: PivotSpec {
                row,
                measures,
                top_n,
            },
            top_n_min: config.pivot.top_n_min,
            top_n_max: config.pivot.top_n_max,
            cache_capacity: config.cache.max_workbooks,
        })
    }

    /// Starting selection for `dataset`: command-line values, or the default locations that
    /// are actually offered, plus the date range completed from the data's bounds.
    pub fn initial_selection(&self, dataset: &Dataset) -> Result<FilterSelection> {
        let mut selection = FilterSelection::default();
        for (role, given) in &self.values {
            selection.set(*role, given.iter().cloned());
        }
        if !self.values.contains_key(&SemanticRole::Location) {
            let options = dataset.options(&FilterSelection::default())?;
            let offered = default_locations_offered(&self.default_locations, &options);
            if !offered.is_empty() {
                info!(locations = ?offered, "preselecting default locations");
            }
            selection.set(SemanticRole::Location, offered);
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            let bounds = dataset.date_bounds()?;
            let start = self.date_from.or(bounds.map(|b| b.start));
            let end = self.date_to.or(bounds.map(|b| b.end));
            if let (Some(start), Some(end)) = (start, end) {
                selection.date_range = Some(DateRange::new(start, end)?);
            }
        }
        Ok(selection)
    }
}

fn default_locations_offered(defaults: &[String], options: &CascadeOptions) -> Vec<String> {
    let offered = options.get(SemanticRole::Location);
    defaults
        .iter()
        .filter(|d| offered.contains(d))
        .cloned()
        .collect()
}

/// Where a dataset came from, so it can be re-read.
#[derive(Debug, Clone)]
struct Source {
    path: Option<PathBuf>,
    sheet: Option<String>,
    format: Option<WorkbookFormat>,
}

/// Prepared datasets plus the workbook cache shared by every (re)load.
pub struct Session {
    cache: WorkbookCache,
    roles: RolesConfig,
    sources: BTreeMap<DatasetKind, Source>,
    datasets: BTreeMap<DatasetKind, Dataset>,
}

impl Session {
    pub fn new(roles: RolesConfig, cache_capacity: usize) -> Self {
        Self {
            cache: WorkbookCache::new(cache_capacity),
            roles,
            sources: BTreeMap::new(),
            datasets: BTreeMap::new(),
        }
    }

    /// Load every source named in `options`. The survey workbook is required.
    pub fn open(options: &SessionOptions, roles: RolesConfig) -> Result<Self> {
        if !options.sources.contains_key(&DatasetKind::Survey) {
            return Err(DashboardError::MissingInput {
                dataset: DatasetKind::Survey,
            }
            .into());
        }
        let mut session = Self::new(roles, options.cache_capacity);
        for (kind, path) in &options.sources {
            let sheet = options.sheets.get(kind).cloned();
            session.load_file(*kind, path, sheet, options.format)?;
        }
        Ok(session)
    }

    pub fn aliases(&self, kind: DatasetKind) -> RoleAliases {
        RoleAliases::from_config(kind, &self.roles)
    }

    pub fn load_file(
        &mut self,
        kind: DatasetKind,
        path: &Path,
        sheet: Option<String>,
        format: Option<WorkbookFormat>,
    ) -> Result<&Dataset> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.sources.insert(
            kind,
            Source {
                path: Some(path.to_path_buf()),
                sheet: sheet.clone(),
                format,
            },
        );
        self.prepare(kind, &name, &bytes, sheet.as_deref(), format)
    }

    /// Load an upload that only exists in memory.
    pub fn load_bytes(
        &mut self,
        kind: DatasetKind,
        source_name: &str,
        bytes: &[u8],
        sheet: Option<String>,
        format: Option<WorkbookFormat>,
    ) -> Result<&Dataset> {
        self.sources.insert(
            kind,
            Source {
                path: None,
                sheet: sheet.clone(),
                format,
            },
        );
        self.prepare(kind, source_name, bytes, sheet.as_deref(), format)
    }

    fn prepare(
        &mut self,
        kind: DatasetKind,
        source_name: &str,
        bytes: &[u8],
        sheet: Option<&str>,
        format: Option<WorkbookFormat>,
    ) -> Result<&Dataset> {
        let workbook = self.cache.get_or_parse(source_name, bytes, format)?;
        let dataset = Dataset::prepare(kind, &workbook, &self.aliases(kind), sheet)?;
        self.datasets.insert(kind, dataset);
        self.dataset(kind)
    }

    /// Re-read every file-backed source. Unchanged files come from the cache.
    pub fn reload(&mut self) -> Result<()> {
        let sources: Vec<(DatasetKind, Source)> = self
            .sources
            .iter()
            .map(|(k, s)| (*k, s.clone()))
            .collect();
        for (kind, source) in sources {
            match source.path {
                Some(path) => {
                    self.load_file(kind, &path, source.sheet, source.format)?;
                }
                None => warn!(dataset = %kind, "in-memory upload cannot be re-read"),
            }
        }
        let stats = self.cache.stats();
        info!(hits = stats.hits, misses = stats.misses, "reloaded sources");
        Ok(())
    }

    pub fn dataset(&self, kind: DatasetKind) -> Result<&Dataset> {
        self.datasets
            .get(&kind)
            .ok_or_else(|| DashboardError::MissingInput { dataset: kind }.into())
    }

    pub fn require_survey(&self) -> Result<&Dataset> {
        self.dataset(DatasetKind::Survey)
    }

    pub fn has(&self, kind: DatasetKind) -> bool {
        self.datasets.contains_key(&kind)
    }

    /// Loaded datasets in kind order.
    pub fn datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.values()
    }

    /// Next loaded dataset after `kind`, wrapping around.
    pub fn next_loaded(&self, kind: DatasetKind) -> DatasetKind {
        let mut next = kind.next();
        while next != kind {
            if self.has(next) {
                return next;
            }
            next = next.next();
        }
        kind
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
