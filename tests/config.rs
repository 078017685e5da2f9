use anyhow::Result;
use ironbucket::source::template::DEFAULT_FILE_NAME_TEMPLATE;
use ironbucket::{ErrorsTolerance, InputFormat, SourceConfig, SourceError};
use std::collections::HashMap;
use std::path::PathBuf;

fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn defaults() {
    let config = SourceConfig::default();
    assert_eq!(config.fetch_page_size, 10);
    assert_eq!(config.list_page_size(), 20);
    assert_eq!(config.max_poll_records, 500);
    assert_eq!(config.input_format, InputFormat::Bytes);
    assert_eq!(config.errors_tolerance, ErrorsTolerance::None);
    assert_eq!(config.transformer.max_buffer_size, 4096);
    assert!(!config.transformer.schemas_enable);
    assert_eq!(config.file_name_template, DEFAULT_FILE_NAME_TEMPLATE);
    assert_eq!(config.target_topic, None);
}

#[test]
fn reads_connector_properties() -> Result<()> {
    let config = SourceConfig::from_properties(&props(&[
        ("bucket", "landing"),
        ("prefix", "raw/"),
        ("fetch.page.size", "25"),
        ("task.id", "4"),
        ("tasks.max", "3"),
        ("input.format", "JSONL"),
        ("max.buffer.size", "1024"),
        ("schemas.enable", "true"),
        ("temp.dir", "/var/tmp/ingest"),
        ("errors.tolerance", "all"),
        ("file.name.template", "{{topic}}/{{partition}}"),
        ("topic", "events"),
        ("max.poll.records", "50"),
    ]))?;

    assert_eq!(config.bucket, "landing");
    assert_eq!(config.prefix.as_deref(), Some("raw/"));
    assert_eq!(config.list_page_size(), 50);
    assert_eq!((config.task_id, config.max_tasks), (Some(4), Some(3)));
    assert_eq!(config.input_format, InputFormat::Jsonl);
    assert_eq!(config.transformer.max_buffer_size, 1024);
    assert!(config.transformer.schemas_enable);
    assert_eq!(config.transformer.temp_dir, Some(PathBuf::from("/var/tmp/ingest")));
    assert_eq!(config.errors_tolerance, ErrorsTolerance::All);
    assert_eq!(config.file_name_template, "{{topic}}/{{partition}}");
    assert_eq!(config.target_topic.as_deref(), Some("events"));
    assert_eq!(config.max_poll_records, 50);
    Ok(())
}

#[test]
fn unparseable_numbers_fall_back_to_defaults() -> Result<()> {
    let config = SourceConfig::from_properties(&props(&[
        ("fetch.page.size", "lots"),
        ("tasks.max", "three"),
        ("max.poll.records", "-1"),
    ]))?;
    assert_eq!(config.fetch_page_size, 10);
    assert_eq!(config.max_tasks, None);
    assert_eq!(config.max_poll_records, 500);
    Ok(())
}

#[test]
fn unknown_enums_are_rejected() {
    let bad_format = SourceConfig::from_properties(&props(&[("input.format", "xml")]));
    assert!(matches!(bad_format, Err(SourceError::Config(_))));

    let bad_tolerance = SourceConfig::from_properties(&props(&[("errors.tolerance", "some")]));
    assert!(matches!(bad_tolerance, Err(SourceError::Config(_))));
}

#[test]
fn deserializes_from_json_with_defaults() -> Result<()> {
    let config: SourceConfig = serde_json::from_str(
        r#"{"bucket": "b", "input_format": "parquet", "errors_tolerance": "all",
            "transformer": {"schemas_enable": true}}"#,
    )?;
    assert_eq!(config.input_format, InputFormat::Parquet);
    assert_eq!(config.errors_tolerance, ErrorsTolerance::All);
    assert!(config.transformer.schemas_enable);
    assert_eq!(config.transformer.max_buffer_size, 4096);
    assert_eq!(config.max_poll_records, 500);
    Ok(())
}
