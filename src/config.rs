//! Configuration of one worker's record pipeline.
//!
//! [`SourceConfig`] can be built directly, deserialized with serde, or read from the
//! flat string properties a connector host passes in via
//! [`SourceConfig::from_properties`].

use crate::error::{SourceError, SourceResult};
use crate::source::template::DEFAULT_FILE_NAME_TEMPLATE;
use crate::transform::{InputFormat, TransformerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// What happens when an object cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorsTolerance {
    /// Stop the worker.
    #[default]
    None,
    /// Skip the object for the rest of the run and carry on.
    All,
}

impl fmt::Display for ErrorsTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::All => "all",
        })
    }
}

impl FromStr for ErrorsTolerance {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            other => Err(SourceError::Config(format!(
                "unknown errors.tolerance '{other}', expected 'none' or 'all'"
            ))),
        }
    }
}

/// Settings for one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Bucket to read from.
    pub bucket: String,
    /// Only keys starting with this prefix are listed.
    pub prefix: Option<String>,
    /// Listing requests ask for twice this many keys per page.
    pub fetch_page_size: u32,
    /// Raw worker ordinal, reduced modulo the worker count.
    pub task_id: Option<i64>,
    /// Number of cooperating workers. Unset or non-positive means one.
    pub max_tasks: Option<i64>,
    pub input_format: InputFormat,
    pub transformer: TransformerConfig,
    pub errors_tolerance: ErrorsTolerance,
    /// Pattern that maps object keys to destination topic and partition.
    pub file_name_template: String,
    /// Overrides the topic taken from the object key.
    pub target_topic: Option<String>,
    /// Upper bound on the records returned by one poll.
    pub max_poll_records: usize,
}

pub const PAGE_SIZE_FACTOR: u32 = 2;

impl SourceConfig {
    /// Page size sent with listing requests.
    #[must_use]
    pub fn list_page_size(&self) -> u32 {
        self.fetch_page_size.saturating_mul(PAGE_SIZE_FACTOR)
    }

    /// Reads connector-style properties (`bucket`, `fetch.page.size`, `tasks.max`, ...).
    ///
    /// Unparseable numbers are logged and replaced by their defaults.
    ///
    /// # Errors
    /// Returns [`SourceError::Config`] for an unknown `input.format` or
    /// `errors.tolerance`.
    pub fn from_properties(props: &HashMap<String, String>) -> SourceResult<Self> {
        let defaults = Self::default();
        let text = |name: &str| {
            props
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            bucket: text("bucket").unwrap_or(defaults.bucket),
            prefix: text("prefix"),
            fetch_page_size: parse_or(props, "fetch.page.size", defaults.fetch_page_size),
            task_id: parse_opt(props, "task.id"),
            max_tasks: parse_opt(props, "tasks.max"),
            input_format: text("input.format")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(defaults.input_format),
            transformer: TransformerConfig {
                max_buffer_size: parse_or(
                    props,
                    "max.buffer.size",
                    defaults.transformer.max_buffer_size,
                ),
                schemas_enable: parse_or(props, "schemas.enable", defaults.transformer.schemas_enable),
                temp_dir: text("temp.dir").map(PathBuf::from),
            },
            errors_tolerance: text("errors.tolerance")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(defaults.errors_tolerance),
            file_name_template: text("file.name.template").unwrap_or(defaults.file_name_template),
            target_topic: text("topic"),
            max_poll_records: parse_or(props, "max.poll.records", defaults.max_poll_records),
        })
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: None,
            fetch_page_size: 10,
            task_id: None,
            max_tasks: None,
            input_format: InputFormat::default(),
            transformer: TransformerConfig::default(),
            errors_tolerance: ErrorsTolerance::default(),
            file_name_template: DEFAULT_FILE_NAME_TEMPLATE.to_string(),
            target_topic: None,
            max_poll_records: 500,
        }
    }
}

fn parse_opt<T>(props: &HashMap<String, String>, name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = props.get(name)?.trim();
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(option = name, value = raw, error = %e, "ignoring unparseable option");
            None
        }
    }
}

fn parse_or<T>(props: &HashMap<String, String>, name: &str, default: T) -> T
where
    T: FromStr + fmt::Debug,
    T::Err: fmt::Display,
{
    parse_opt(props, name).unwrap_or_else(|| {
        if props.contains_key(name) {
            warn!(option = name, ?default, "using default");
        }
        default
    })
}
