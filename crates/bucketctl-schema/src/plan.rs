use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse plan: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported plan_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("plan declares no buckets")]
    NoBuckets,
    #[error("bucket name must not be empty (declared as '{0}')")]
    EmptyBucketName(String),
    #[error("invalid bucket name '{0}': only ASCII letters, digits, '.', '-' and '_' are allowed")]
    InvalidBucketName(String),
    #[error("duplicate bucket name '{0}'")]
    DuplicateBucketName(String),
    #[error("tag key must not be empty (bucket '{bucket}')")]
    EmptyTagKey { bucket: String },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlanV1 {
    pub plan_version: u32,
    #[serde(default)]
    pub buckets: Vec<BucketEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BucketEntry {
    pub name: String,
    #[serde(default)]
    pub tags: TagSpec,
}

/// Tags as declared in a plan: either one free-form string or a table of
/// key/value pairs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TagSpec {
    Value(String),
    Map(BTreeMap<String, String>),
}

impl Default for TagSpec {
    fn default() -> Self {
        Self::Map(BTreeMap::new())
    }
}

pub fn parse_plan_str(input: &str) -> Result<PlanV1, PlanError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_plan_file(path: impl AsRef<Path>) -> Result<PlanV1, PlanError> {
    let content = fs::read_to_string(path)?;
    parse_plan_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_table_tags() {
        let input = r#"
plan_version = 1

[[buckets]]
name = "logs-bucket"
tags = "team=infra"

[[buckets]]
name = "assets"
tags = { team = "web", env = "prod" }
"#;
        let plan = parse_plan_str(input).expect("should parse");
        assert_eq!(plan.plan_version, 1);
        assert_eq!(plan.buckets.len(), 2);
        assert_eq!(plan.buckets[0].tags, TagSpec::Value("team=infra".to_owned()));
        match &plan.buckets[1].tags {
            TagSpec::Map(map) => {
                assert_eq!(map.get("env").map(String::as_str), Some("prod"));
                assert_eq!(map.get("team").map(String::as_str), Some("web"));
            }
            TagSpec::Value(v) => panic!("expected table tags, got '{v}'"),
        }
    }

    #[test]
    fn tags_default_to_empty_table() {
        let plan = parse_plan_str(
            r#"
plan_version = 1
[[buckets]]
name = "bare"
"#,
        )
        .unwrap();
        assert_eq!(plan.buckets[0].tags, TagSpec::Map(BTreeMap::new()));
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"
plan_version = 1

[[buckets]]
name = "logs"
region = "eu-west-1"
"#;
        assert!(parse_plan_str(input).is_err());
    }

    #[test]
    fn rejects_missing_version() {
        let input = r#"
[[buckets]]
name = "logs"
"#;
        assert!(parse_plan_str(input).is_err());
    }

    #[test]
    fn reads_plan_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bucketctl.toml");
        std::fs::write(
            &path,
            "plan_version = 1\n[[buckets]]\nname = \"on-disk\"\ntags = \"x\"\n",
        )
        .unwrap();
        let plan = parse_plan_file(&path).unwrap();
        assert_eq!(plan.buckets[0].name, "on-disk");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_plan_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, PlanError::Io(_)));
    }
}
