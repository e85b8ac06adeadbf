use regex::Regex;
use tracing::warn;

use super::RequestMatcher;
use crate::error::Result;
use crate::types::Request;

/// Translate a `*`/`?` glob into a regex body. Everything else is literal.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut buf = [0u8; 4];
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    out
}

/// Regex body for a single value: `/body/` is used as a regex when it
/// compiles, anything else is a glob.
fn value_to_regex(value: &str) -> String {
    if value.len() > 2 && value.starts_with('/') && value.ends_with('/') {
        let body = &value[1..value.len() - 1];
        match Regex::new(body) {
            Ok(_) => return body.to_string(),
            Err(e) => warn!(value = value, error = %e, "invalid regex value, matching as glob"),
        }
    }
    glob_to_regex(value)
}

/// Compile values into one case-insensitive alternation.
///
/// Anchored regexes must match the whole input; `containing` ones match
/// anywhere. Returns `None` for an empty list.
pub fn compile_values(values: &[String], containing: bool) -> Result<Option<Regex>> {
    if values.is_empty() {
        return Ok(None);
    }
    let alternatives = values
        .iter()
        .map(|v| format!("(?:{})", value_to_regex(v)))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = if containing {
        format!("(?i){}", alternatives)
    } else {
        format!("(?i)^(?:{})$", alternatives)
    };
    Ok(Some(Regex::new(&pattern)?))
}

/// Matches request urls containing any of a set of globs/regexes
#[derive(Debug, Clone)]
pub struct ValueMatcher {
    regex: Regex,
}

impl ValueMatcher {
    pub fn new(values: &[String]) -> Result<Option<Self>> {
        Ok(compile_values(values, true)?.map(|regex| Self { regex }))
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl RequestMatcher for ValueMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.is_match(&request.url)
    }
}
