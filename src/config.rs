use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use supports_color::Stream;

use crate::dataset::DatasetKind;
use crate::pivot::Measure;
use crate::roles::SemanticRole;

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub roles: RolesConfig,
    pub filters: FiltersConfig,
    pub pivot: PivotConfig,
    pub export: ExportConfig,
    pub cache: CacheConfig,
    pub performance: PerformanceConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

/// Extra column aliases per role, tried before the built-in ones.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RolesConfig {
    pub agent: Vec<String>,
    pub leader: Vec<String>,
    pub location: Vec<String>,
    pub team: Vec<String>,
    pub skill: Vec<String>,
    pub date: Vec<String>,
    /// Survey score
    pub score: Vec<String>,
    pub calls_score: Vec<String>,
    pub complaints_score: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FiltersConfig {
    /// Locations preselected when they are among the offered options
    pub default_locations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PivotConfig {
    pub default_row: SemanticRole,
    pub default_measures: Vec<Measure>,
    pub top_n: usize,
    pub top_n_min: usize,
    pub top_n_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    pub delimiter: char,
    pub include_bom: bool,
    /// Where the dashboard writes exports (current directory when unset)
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub max_workbooks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub event_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub primary: String,
    pub secondary: String,
    pub success: String,
    pub error: String,
    pub warning: String,
    pub dimmed: String,
    pub controls_bg: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub text_inverse: String,
    pub table_header: String,
    pub table_border: String,
    pub table_selected: String,
    pub panel_border: String,
    pub panel_border_active: String,
    pub chart_bar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            roles: RolesConfig::default(),
            filters: FiltersConfig::default(),
            pivot: PivotConfig::default(),
            export: ExportConfig::default(),
            cache: CacheConfig::default(),
            performance: PerformanceConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            default_locations: vec!["Ankara".to_string()],
        }
    }
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            default_row: SemanticRole::Agent,
            default_measures: vec![Measure::Count, Measure::Mean],
            top_n: 20,
            top_n_min: 5,
            top_n_max: 500,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_bom: true,
            directory: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_workbooks: 8 }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            event_poll_interval_ms: 25,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            colors: ColorConfig::default(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: "cyan".to_string(),
            secondary: "yellow".to_string(),
            success: "green".to_string(),
            error: "red".to_string(),
            warning: "yellow".to_string(),
            dimmed: "dark_gray".to_string(),
            controls_bg: "indexed(236)".to_string(),
            text_primary: "white".to_string(),
            text_secondary: "dark_gray".to_string(),
            text_inverse: "black".to_string(),
            table_header: "white".to_string(),
            table_border: "cyan".to_string(),
            table_selected: "reversed".to_string(),
            panel_border: "cyan".to_string(),
            panel_border_active: "yellow".to_string(),
            chart_bar: "#1f77b4".to_string(),
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let config_manager = ConfigManager::new(app_name)?;
        Self::load_from(&config_manager)
    }

    /// Load defaults merged with `config.toml` in the manager's directory, if present
    pub fn load_from(config_manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        config.merge(Self::load_user_config(config_manager)?);
        config.validate()?;
        Ok(config)
    }

    fn load_user_config(config_manager: &ConfigManager) -> Result<AppConfig> {
        let config_path = config_manager.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.roles.merge(other.roles);
        self.filters.merge(other.filters);
        self.pivot.merge(other.pivot);
        self.export.merge(other.export);
        self.cache.merge(other.cache);
        self.performance.merge(other.performance);
        self.theme.merge(other.theme);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        self.pivot.validate()?;

        if !self.export.delimiter.is_ascii() || self.export.delimiter == '"' {
            return Err(eyre!(
                "Invalid export delimiter: {:?}. Must be a single ASCII character other than '\"'",
                self.export.delimiter
            ));
        }

        if self.cache.max_workbooks == 0 {
            return Err(eyre!("max_workbooks must be greater than 0"));
        }

        if self.performance.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }

        let parser = ColorParser::new();
        self.theme.colors.validate(&parser)?;

        Ok(())
    }
}

impl RolesConfig {
    /// Configured aliases for `role`; the score list depends on the dataset.
    pub fn aliases_for(&self, role: SemanticRole, kind: DatasetKind) -> &[String] {
        match role {
            SemanticRole::Agent => &self.agent,
            SemanticRole::Leader => &self.leader,
            SemanticRole::Location => &self.location,
            SemanticRole::Team => &self.team,
            SemanticRole::Skill => &self.skill,
            SemanticRole::Date => &self.date,
            SemanticRole::Score => match kind {
                DatasetKind::Survey => &self.score,
                DatasetKind::Calls => &self.calls_score,
                DatasetKind::Complaints => &self.complaints_score,
            },
        }
    }

    pub fn merge(&mut self, other: Self) {
        macro_rules! take_non_empty {
            ($($field:ident),*) => {
                $(
                    if !other.$field.is_empty() {
                        self.$field = other.$field;
                    }
                )*
            };
        }
        take_non_empty!(
            agent,
            leader,
            location,
            team,
            skill,
            date,
            score,
            calls_score,
            complaints_score
        );
    }
}

impl FiltersConfig {
    pub fn merge(&mut self, other: Self) {
        let default = FiltersConfig::default();
        if other.default_locations != default.default_locations {
            self.default_locations = other.default_locations;
        }
    }
}

impl PivotConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PivotConfig::default();
        if other.default_row != default.default_row {
            self.default_row = other.default_row;
        }
        if other.default_measures != default.default_measures {
            self.default_measures = other.default_measures;
        }
        if other.top_n != default.top_n {
            self.top_n = other.top_n;
        }
        if other.top_n_min != default.top_n_min {
            self.top_n_min = other.top_n_min;
        }
        if other.top_n_max != default.top_n_max {
            self.top_n_max = other.top_n_max;
        }
    }

    fn validate(&self) -> Result<()> {
        if !SemanticRole::PIVOT_ROWS.contains(&self.default_row) {
            return Err(eyre!(
                "Invalid default_row: {}. Must be agent, leader, location, team or skill",
                self.default_row
            ));
        }
        if self.top_n_min == 0 || self.top_n_min > self.top_n_max {
            return Err(eyre!(
                "top_n_min ({}) must be at least 1 and not above top_n_max ({})",
                self.top_n_min,
                self.top_n_max
            ));
        }
        if self.top_n < self.top_n_min || self.top_n > self.top_n_max {
            return Err(eyre!(
                "top_n ({}) must be between {} and {}",
                self.top_n,
                self.top_n_min,
                self.top_n_max
            ));
        }
        Ok(())
    }

    /// Clamp a requested top-N into the configured control bounds.
    pub fn clamp_top_n(&self, n: usize) -> usize {
        n.clamp(self.top_n_min, self.top_n_max)
    }
}

impl ExportConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ExportConfig::default();
        if other.delimiter != default.delimiter {
            self.delimiter = other.delimiter;
        }
        if other.include_bom != default.include_bom {
            self.include_bom = other.include_bom;
        }
        if other.directory.is_some() {
            self.directory = other.directory;
        }
    }
}

impl CacheConfig {
    pub fn merge(&mut self, other: Self) {
        let default = CacheConfig::default();
        if other.max_workbooks != default.max_workbooks {
            self.max_workbooks = other.max_workbooks;
        }
    }
}

impl PerformanceConfig {
    pub fn merge(&mut self, other: Self) {
        let default = PerformanceConfig::default();
        if other.event_poll_interval_ms != default.event_poll_interval_ms {
            self.event_poll_interval_ms = other.event_poll_interval_ms;
        }
    }
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        self.colors.merge(other.colors);
    }
}

impl ColorConfig {
    fn fields(&self) -> [(&'static str, &str); 16] {
        [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("success", &self.success),
            ("error", &self.error),
            ("warning", &self.warning),
            ("dimmed", &self.dimmed),
            ("controls_bg", &self.controls_bg),
            ("text_primary", &self.text_primary),
            ("text_secondary", &self.text_secondary),
            ("text_inverse", &self.text_inverse),
            ("table_header", &self.table_header),
            ("table_border", &self.table_border),
            ("table_selected", &self.table_selected),
            ("panel_border", &self.panel_border),
            ("panel_border_active", &self.panel_border_active),
            ("chart_bar", &self.chart_bar),
        ]
    }

    /// Validate all color strings can be parsed
    fn validate(&self, parser: &ColorParser) -> Result<()> {
        for (name, value) in self.fields() {
            parser
                .parse(value)
                .map_err(|e| eyre!("Invalid color value for '{}': {}", name, e))?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();
        macro_rules! take_changed {
            ($($field:ident),*) => {
                $(
                    if other.$field != default.$field {
                        self.$field = other.$field;
                    }
                )*
            };
        }
        take_changed!(
            primary,
            secondary,
            success,
            error,
            warning,
            dimmed,
            controls_bg,
            text_primary,
            text_secondary,
            text_inverse,
            table_header,
            table_border,
            table_selected,
            panel_border,
            panel_border_active,
            chart_bar
        );
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    /// Create a new ColorParser with automatic terminal capability detection
    pub fn new() -> Self {
        let no_color = std::env::var("NO_COLOR").is_ok();
        let support = supports_color::on(Stream::Stdout);

        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color,
        }
    }

    /// Parse a color string (hex, indexed or named) and convert to a terminal color
    pub fn parse(&self, s: &str) -> Result<Color> {
        let color = self.parse_spec(s)?;
        if self.no_color {
            return Ok(Color::Reset);
        }
        Ok(color)
    }

    fn parse_spec(&self, s: &str) -> Result<Color> {
        let trimmed = s.trim();

        if trimmed.starts_with('#') && trimmed.len() == 7 {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.convert_rgb_to_terminal_color(r, g, b));
        }

        if trimmed.to_lowercase().starts_with("indexed(") && trimmed.ends_with(')') {
            let num_str = &trimmed[8..trimmed.len() - 1];
            let num = num_str.parse::<u8>().map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            })?;
            return Ok(Color::Indexed(num));
        }

        let lower = trimmed.to_lowercase();
        match lower.as_str() {
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),

            "bright_black" | "bright black" => Ok(Color::Indexed(8)),
            "bright_red" | "bright red" => Ok(Color::Indexed(9)),
            "bright_green" | "bright green" => Ok(Color::Indexed(10)),
            "bright_yellow" | "bright yellow" => Ok(Color::Indexed(11)),
            "bright_blue" | "bright blue" => Ok(Color::Indexed(12)),
            "bright_magenta" | "bright magenta" => Ok(Color::Indexed(13)),
            "bright_cyan" | "bright cyan" => Ok(Color::Indexed(14)),
            "bright_white" | "bright white" => Ok(Color::Indexed(15)),

            "gray" | "grey" => Ok(Color::Indexed(8)),
            "dark_gray" | "dark gray" | "dark_grey" | "dark grey" => Ok(Color::Indexed(8)),
            "light_gray" | "light gray" | "light_grey" | "light grey" => Ok(Color::Indexed(7)),

            // handled as a modifier when rendering
            "reset" | "reversed" => Ok(Color::Reset),

            _ => Err(eyre!(
                "Unknown color name: '{}'. Supported: basic ANSI colors (red, blue, etc.), \
                 bright variants (bright_red, etc.), indexed(n), or hex colors (#ff0000)",
                trimmed
            )),
        }
    }

    fn convert_rgb_to_terminal_color(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse hex color string (#ff0000) to RGB components
pub(crate) fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    if !s.starts_with('#') || s.len() != 7 {
        return Err(eyre!(
            "Invalid hex color format: '{}'. Expected format: #rrggbb",
            s
        ));
    }

    let r = u8::from_str_radix(&s[1..3], 16)
        .map_err(|_| eyre!("Invalid red component in hex color: {}", s))?;
    let g = u8::from_str_radix(&s[3..5], 16)
        .map_err(|_| eyre!("Invalid green component in hex color: {}", s))?;
    let b = u8::from_str_radix(&s[5..7], 16)
        .map_err(|_| eyre!("Invalid blue component in hex color: {}", s))?;

    Ok((r, g, b))
}

/// Convert RGB to nearest 256-color palette index (xterm palette)
fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 10 {
        // grayscale ramp 232-255
        let gray = (r as u16 + g as u16 + b as u16) / 3;
        if gray < 8 {
            return 16;
        } else if gray > 247 {
            return 231;
        } else {
            return 232 + ((gray - 8) * 24 / 240) as u8;
        }
    }

    // 6x6x6 color cube 16-231
    let r_idx = (r as u16 * 5 / 255) as u8;
    let g_idx = (g as u16 * 5 / 255) as u8;
    let b_idx = (b as u16 * 5 / 255) as u8;

    16 + 36 * r_idx + 6 * g_idx + b_idx
}

/// Convert RGB to nearest basic ANSI color (8 colors)
fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let r_bright = r > 128;
    let g_bright = g > 128;
    let b_bright = b > 128;

    let max_diff = r.max(g).max(b) as i16 - r.min(g).min(b) as i16;
    if max_diff < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }

    match (r_bright, g_bright, b_bright) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Theme containing parsed colors ready for use
#[derive(Debug, Clone, Default)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
}

impl Theme {
    /// Create a Theme from a ThemeConfig by parsing all color strings
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        let parser = ColorParser::new();
        let mut colors = HashMap::new();
        for (name, value) in config.colors.fields() {
            colors.insert(name.to_string(), parser.parse(value)?);
        }
        Ok(Self { colors })
    }

    /// Get a color by name, returns Reset if not found
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }
}

// Default configuration template
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
