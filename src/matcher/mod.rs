mod glob;
mod match_pattern;
mod origin;

pub use glob::{compile_values, glob_to_regex, ValueMatcher};
pub use match_pattern::{match_urls, MatchPattern, ALL_URLS};
pub use origin::{OriginMatcher, OriginRelation};

use crate::types::Request;

/// Trait for request matchers
pub trait RequestMatcher: Send + Sync {
    /// Check if the request matches this matcher
    fn matches(&self, request: &Request) -> bool;
}

/// All matcher - matches everything
#[derive(Debug, Clone)]
pub struct AllMatcher;

impl RequestMatcher for AllMatcher {
    fn matches(&self, _request: &Request) -> bool {
        true
    }
}

/// Enum wrapper for all matcher types
#[derive(Debug, Clone)]
pub enum Matcher {
    All(AllMatcher),
    /// Url contains one of the values
    Includes(ValueMatcher),
    /// Url contains none of the values
    Excludes(ValueMatcher),
    Origin(OriginMatcher),
}

impl RequestMatcher for Matcher {
    fn matches(&self, request: &Request) -> bool {
        match self {
            Matcher::All(m) => m.matches(request),
            Matcher::Includes(m) => m.matches(request),
            Matcher::Excludes(m) => !m.matches(request),
            Matcher::Origin(m) => m.matches(request),
        }
    }
}

/// Conjunction of matchers, evaluated in order
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    matchers: Vec<Matcher>,
}

impl PatternMatcher {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self { matchers }
    }

    /// Build from optional include/exclude values and origin relation.
    pub fn compile(
        includes: &[String],
        excludes: &[String],
        origin: Option<OriginRelation>,
    ) -> crate::error::Result<Self> {
        let mut matchers = Vec::new();
        if let Some(m) = ValueMatcher::new(includes)? {
            matchers.push(Matcher::Includes(m));
        }
        if let Some(m) = ValueMatcher::new(excludes)? {
            matchers.push(Matcher::Excludes(m));
        }
        if let Some(relation) = origin {
            matchers.push(Matcher::Origin(OriginMatcher::new(relation)));
        }
        if matchers.is_empty() {
            matchers.push(Matcher::All(AllMatcher));
        }
        Ok(Self { matchers })
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl RequestMatcher for PatternMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.matchers.iter().all(|m| m.matches(request))
    }
}
