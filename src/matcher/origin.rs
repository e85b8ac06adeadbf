use serde::{Deserialize, Serialize};

use super::RequestMatcher;
use crate::domain::is_same_domain;
use crate::types::Request;
use crate::url::UrlParser;

/// Relation between a request and the document that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginRelation {
    SameDomain,
    SameOrigin,
    ThirdPartyDomain,
    ThirdPartyOrigin,
}

impl OriginRelation {
    fn is_same(self) -> bool {
        matches!(self, OriginRelation::SameDomain | OriginRelation::SameOrigin)
    }
}

/// Origin relation matcher. Top-level requests without an origin count as
/// same-domain and same-origin.
#[derive(Debug, Clone)]
pub struct OriginMatcher {
    relation: OriginRelation,
}

impl OriginMatcher {
    pub fn new(relation: OriginRelation) -> Self {
        Self { relation }
    }

    pub fn relation(&self) -> OriginRelation {
        self.relation
    }
}

fn is_same_origin(a: &str, b: &str) -> bool {
    UrlParser::new(a)
        .origin()
        .eq_ignore_ascii_case(&UrlParser::new(b).origin())
}

impl RequestMatcher for OriginMatcher {
    fn matches(&self, request: &Request) -> bool {
        let Some(origin) = request.origin_url.as_deref() else {
            return self.relation.is_same();
        };
        match self.relation {
            OriginRelation::SameDomain => is_same_domain(&request.url, origin),
            OriginRelation::ThirdPartyDomain => !is_same_domain(&request.url, origin),
            OriginRelation::SameOrigin => is_same_origin(&request.url, origin),
            OriginRelation::ThirdPartyOrigin => !is_same_origin(&request.url, origin),
        }
    }
}
