use callboard::{AppConfig, ConfigManager, Measure, SemanticRole};
use std::fs;
use tempfile::TempDir;

fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

fn write_config(config_manager: &ConfigManager, content: &str) {
    config_manager.ensure_config_dir().unwrap();
    fs::write(config_manager.config_path("config.toml"), content).unwrap();
}

#[test]
fn test_defaults_without_config_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let config = AppConfig::load_from(&config_manager).unwrap();

    assert_eq!(config.version, "0.1");
    assert_eq!(config.filters.default_locations, vec!["Ankara".to_string()]);
    assert_eq!(config.pivot.default_row, SemanticRole::Agent);
    assert_eq!(
        config.pivot.default_measures,
        vec![Measure::Count, Measure::Mean]
    );
    assert_eq!(config.pivot.top_n, 20);
    assert_eq!(config.export.delimiter, ',');
    assert!(config.export.include_bom);
    assert_eq!(config.cache.max_workbooks, 8);
    assert_eq!(config.performance.event_poll_interval_ms, 25);
}

#[test]
fn test_partial_config_merges_with_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_config(
        &config_manager,
        r##"
[roles]
agent = ["Operatör"]

[filters]
default_locations = ["İzmir", "Bursa"]

[pivot]
default_row = "leader"
default_measures = ["max"]
top_n = 50

[export]
delimiter = ";"

[theme.colors]
chart_bar = "#ff7f0e"
"##,
    );

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.roles.agent, vec!["Operatör".to_string()]);
    assert!(config.roles.score.is_empty());
    assert_eq!(
        config.filters.default_locations,
        vec!["İzmir".to_string(), "Bursa".to_string()]
    );
    assert_eq!(config.pivot.default_row, SemanticRole::Leader);
    assert_eq!(config.pivot.default_measures, vec![Measure::Max]);
    assert_eq!(config.pivot.top_n, 50);
    assert_eq!(config.pivot.top_n_max, 500);
    assert_eq!(config.export.delimiter, ';');
    assert!(config.export.include_bom);
    assert_eq!(config.theme.colors.chart_bar, "#ff7f0e");
    assert_eq!(config.theme.colors.primary, "cyan");
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[pivot]\ntop_n = 1000\n",
        "[pivot]\ndefault_row = \"date\"\n",
        "[pivot]\ntop_n_min = 0\n",
        "[export]\ndelimiter = '\"'\n",
        "[cache]\nmax_workbooks = 0\n",
        "[theme.colors]\nprimary = \"not_a_color\"\n",
        "version = \"9.0\"\n",
    ];
    for content in cases {
        let (_temp_dir, config_manager) = setup_test_config_dir();
        write_config(&config_manager, content);
        assert!(
            AppConfig::load_from(&config_manager).is_err(),
            "accepted: {}",
            content
        );
    }
}

#[test]
fn test_malformed_toml_names_the_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_config(&config_manager, "[pivot\ntop_n = ");
    let err = AppConfig::load_from(&config_manager).unwrap_err();
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn test_write_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());
    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(written, config_manager.generate_default_config());
    assert!(written.contains("[pivot]"));
    assert!(written.contains("[theme.colors]"));

    assert!(config_manager.write_default_config(false).is_err());
    assert!(config_manager.write_default_config(true).is_ok());

    // the template loads back to the built-in defaults
    let config = AppConfig::load_from(&config_manager).unwrap();
    let defaults = AppConfig::default();
    assert_eq!(config.pivot, defaults.pivot);
    assert_eq!(config.filters, defaults.filters);
    assert_eq!(config.export, defaults.export);
    assert_eq!(config.roles, defaults.roles);
}
