//! Rule configuration records.
//!
//! Rules arrive as plain JSON data, either a bare array of records or an
//! object with a `rules` array:
//!
//! ```json
//! [{
//!   "uuid": "8b5f0a1e",
//!   "action": "filter",
//!   "trimAllParams": true,
//!   "pattern": { "scheme": "*", "host": ["www.youtube.com"], "path": "watch*" },
//!   "types": ["main_frame"]
//! }]
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::matcher::OriginRelation;
use crate::types::ResourceType;

fn default_true() -> bool {
    true
}

fn default_scheme() -> String {
    "*".to_string()
}

/// Accept either a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) if value.is_empty() => Vec::new(),
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Request pattern of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub host: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub path: Vec<String>,
    /// Expansion list for `example.*` hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_level_domains: Option<Vec<String>>,
    #[serde(default)]
    pub all_urls: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginRelation>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: Vec::new(),
            path: Vec::new(),
            top_level_domains: None,
            all_urls: false,
            includes: Vec::new(),
            excludes: Vec::new(),
            origin: None,
        }
    }
}

/// Query parameter names removed by a filter rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamsFilterConfig {
    #[serde(default)]
    pub values: Vec<String>,
    /// Remove every parameter except the listed ones
    #[serde(default)]
    pub invert: bool,
}

/// A single rule record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[serde(default)]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub action: String,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Turns a whitelist rule into a logged whitelist rule
    #[serde(default)]
    pub log: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub redirect_document: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_filter: Option<ParamsFilterConfig>,
    #[serde(default)]
    pub trim_all_params: bool,
    #[serde(default)]
    pub skip_redirection_filter: bool,
    #[serde(default)]
    pub skip_on_same_domain: bool,
    #[serde(default)]
    pub pattern: PatternConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<ResourceType>>,
}

impl RuleConfig {
    /// Minimal record for `action`, matching everything
    pub fn new(uuid: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            tag: None,
            action: action.into(),
            active: true,
            log: false,
            redirect_url: None,
            redirect_document: false,
            params_filter: None,
            trim_all_params: false,
            skip_redirection_filter: false,
            skip_on_same_domain: false,
            pattern: PatternConfig {
                all_urls: true,
                ..PatternConfig::default()
            },
            types: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    List(Vec<RuleConfig>),
    Wrapped { rules: Vec<RuleConfig> },
}

/// Parse rule records from JSON text
pub fn load_rules(json: &str) -> Result<Vec<RuleConfig>> {
    let file: RuleFile = serde_json::from_str(json)?;
    Ok(match file {
        RuleFile::List(rules) => rules,
        RuleFile::Wrapped { rules } => rules,
    })
}

/// Read and parse a rules file
pub fn load_rules_from_file(path: impl AsRef<Path>) -> Result<Vec<RuleConfig>> {
    let json = fs::read_to_string(path)?;
    load_rules(&json)
}
