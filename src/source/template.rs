//! Object-key templates such as `{{topic}}-{{partition}}-{{start_offset}}`.
//!
//! A template is compiled once into an anchored regular expression. Placeholders become
//! named capture groups; everything else must match literally.

use crate::error::{SourceError, SourceResult};
use regex::Regex;

pub const DEFAULT_FILE_NAME_TEMPLATE: &str = "{{topic}}-{{partition}}-{{start_offset}}";

const PLACEHOLDERS: [(&str, &str); 3] = [
    ("topic", r"(?P<topic>[a-zA-Z0-9\-_.]+?)"),
    ("partition", r"(?P<partition>\d+)"),
    ("start_offset", r"(?P<start_offset>[a-zA-Z0-9\-_.]+)"),
];

/// Destination fields recovered from an object key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TemplateMatch {
    pub topic: Option<String>,
    pub partition: Option<u32>,
    pub start_offset: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FilenameTemplate {
    source: String,
    pattern: Regex,
}

impl FilenameTemplate {
    /// Compiles `template`.
    ///
    /// # Errors
    /// Returns [`SourceError::Config`] for an unknown or repeated placeholder, or an
    /// unterminated `{{`.
    pub fn compile(template: &str) -> SourceResult<Self> {
        let mut pattern = String::from("^");
        let mut seen = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            pattern.push_str(&regex::escape(&rest[..open]));
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or_else(|| {
                SourceError::Config(format!("unterminated placeholder in template '{template}'"))
            })?;
            let name = after[..close].trim();
            let group = PLACEHOLDERS
                .iter()
                .find(|(placeholder, _)| *placeholder == name)
                .map(|(_, group)| *group)
                .ok_or_else(|| {
                    SourceError::Config(format!(
                        "unknown placeholder '{{{{{name}}}}}' in template '{template}'"
                    ))
                })?;
            if seen.contains(&name) {
                return Err(SourceError::Config(format!(
                    "placeholder '{{{{{name}}}}}' repeated in template '{template}'"
                )));
            }
            seen.push(name);
            pattern.push_str(group);
            rest = &after[close + 2..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        let pattern = Regex::new(&pattern)
            .map_err(|e| SourceError::Config(format!("template '{template}': {e}")))?;
        Ok(Self {
            source: template.to_string(),
            pattern,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Matches `key` against the template. `None` when the key does not fit, or when
    /// the partition does not fit in a `u32`.
    #[must_use]
    pub fn parse(&self, key: &str) -> Option<TemplateMatch> {
        let caps = self.pattern.captures(key)?;
        let partition = match caps.name("partition") {
            Some(m) => Some(m.as_str().parse::<u32>().ok()?),
            None => None,
        };
        Some(TemplateMatch {
            topic: caps.name("topic").map(|m| m.as_str().to_string()),
            partition,
            start_offset: caps.name("start_offset").map(|m| m.as_str().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template() {
        let template = FilenameTemplate::compile(DEFAULT_FILE_NAME_TEMPLATE).unwrap();
        let m = template.parse("topic-00-1700000000.txt").unwrap();
        assert_eq!(m.topic.as_deref(), Some("topic"));
        assert_eq!(m.partition, Some(0));
        assert_eq!(m.start_offset.as_deref(), Some("1700000000.txt"));
    }

    #[test]
    fn test_topic_may_contain_dashes() {
        let template = FilenameTemplate::compile(DEFAULT_FILE_NAME_TEMPLATE).unwrap();
        let m = template.parse("my-topic-7-42").unwrap();
        assert_eq!(m.topic.as_deref(), Some("my-topic"));
        assert_eq!(m.partition, Some(7));
        assert_eq!(template.parse("my-topic-x-42"), None);

        let template = FilenameTemplate::compile("data/{{topic}}/{{partition}}.jsonl").unwrap();
        let m = template.parse("data/my-topic/12.jsonl").unwrap();
        assert_eq!(m.topic.as_deref(), Some("my-topic"));
        assert_eq!(m.partition, Some(12));
    }

    #[test]
    fn test_literals_are_escaped() {
        let template = FilenameTemplate::compile("{{topic}}.{{partition}}").unwrap();
        assert!(template.parse("orders.3").is_some());
        assert!(template.parse("orders-3").is_none());
    }

    #[test]
    fn test_without_partition() {
        let template = FilenameTemplate::compile("{{topic}}/file").unwrap();
        let m = template.parse("events/file").unwrap();
        assert_eq!(m.partition, None);
    }

    #[test]
    fn test_invalid_templates() {
        assert!(FilenameTemplate::compile("{{topic").is_err());
        assert!(FilenameTemplate::compile("{{bogus}}").is_err());
        assert!(FilenameTemplate::compile("{{topic}}-{{topic}}").is_err());
    }
}
