/*!
 * Tests for configuration files as users write them
 */

use dataset_translator::app_config::{BackendId, ColumnSelection, OutputFormat};
use dataset_translator::{Config, ConfigError, Controller};

#[test]
fn test_loadOrCreate_withUserFile_shouldKeepDefaultsForOmittedSections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{
            "dataset": {"source": "aya.parquet", "columns_to_translate": ["inputs", "targets"], "limit": 100},
            "translation": {"primary_api": "fanar", "enable_fallback": false},
            "apis": {"fanar": {"api_key": "secret", "rate_limit_rpm": 20}},
            "output": {"format": "parquet", "keep_columns": ["id"]},
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let (config, created) = Config::load_or_create(&path).unwrap();

    assert!(!created);
    assert_eq!(config.dataset.limit, Some(100));
    assert_eq!(
        config.dataset.columns_to_translate,
        ColumnSelection::Named(vec!["inputs".to_string(), "targets".to_string()])
    );
    assert_eq!(config.translation.backend_chain(), vec![BackendId::Fanar]);
    assert_eq!(config.apis.fanar.rate_limit_rpm, Some(20));
    assert_eq!(config.output.format, OutputFormat::Parquet);
    assert_eq!(config.checkpoint.interval, 50);
    assert!(config.validate().is_ok());
}

#[test]
fn test_loadOrCreate_withMalformedFile_shouldReportParseError() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(Config::load_or_create(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_defaultFile_shouldRoundTrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf.json");

    let (written, created) = Config::load_or_create(&path).unwrap();
    assert!(created);
    let (read, _) = Config::load_or_create(&path).unwrap();

    assert_eq!(
        serde_json::to_value(&written).unwrap(),
        serde_json::to_value(&read).unwrap()
    );
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"columns_to_translate\": \"auto\""));
}

#[test]
fn test_unknownOutputFormat_shouldFailToParse() {
    let json = r#"{"output": {"format": "xlsx"}}"#;
    assert!(serde_json::from_str::<Config>(json).is_err());
    assert!("xlsx".parse::<OutputFormat>().is_err());
    assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
}

#[test]
fn test_checkConnections_withoutKeys_shouldFailBeforeAnyRequest() {
    let mut config = Config::default();
    config.dataset.source = "data.csv".to_string();
    let controller = Controller::with_config(config).unwrap();

    let result = tokio_test::block_on(controller.check_connections());

    assert!(matches!(result, Err(ConfigError::Invalid(message)) if message.contains("NVIDIA_API_KEY")));
}
