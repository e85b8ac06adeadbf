use regex::Regex;
use tracing::debug;

use crate::domain::is_same_domain;
use crate::error::Result;
use crate::matcher::compile_values;
use crate::url::{parse_inline_url, UrlParser};

/// Strips tracking query parameters and unwraps redirector links
#[derive(Debug, Clone, Default)]
pub struct FilterRule {
    params: Option<Regex>,
    invert: bool,
    trim_all: bool,
    skip_redirection_filter: bool,
    skip_on_same_domain: bool,
}

impl FilterRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove parameters whose names match `values` (globs or `/regex/`),
    /// or every other parameter when `invert` is set.
    pub fn with_params(mut self, values: &[String], invert: bool) -> Result<Self> {
        self.params = compile_values(values, false)?;
        self.invert = invert;
        Ok(self)
    }

    /// Drop the whole query
    pub fn with_trim_all(mut self, trim_all: bool) -> Self {
        self.trim_all = trim_all;
        self
    }

    /// Do not extract inline urls
    pub fn with_skip_redirection_filter(mut self, skip: bool) -> Self {
        self.skip_redirection_filter = skip;
        self
    }

    /// Keep redirector links whose target is on the same domain
    pub fn with_skip_on_same_domain(mut self, skip: bool) -> Self {
        self.skip_on_same_domain = skip;
        self
    }

    /// Trim parameters, then replace the url by its inline target if it
    /// carries one. The inline target is trimmed too.
    pub fn apply(&self, url: &str) -> String {
        let trimmed = self.trim_params(url);
        if self.skip_redirection_filter {
            return trimmed;
        }
        match parse_inline_url(&trimmed) {
            Some(inline) if self.skip_on_same_domain && is_same_domain(&inline, &trimmed) => {
                debug!(url = %trimmed, inline = %inline, "same-domain inline url kept");
                trimmed
            }
            Some(inline) => self.trim_params(&inline),
            None => trimmed,
        }
    }

    fn trim_params(&self, url: &str) -> String {
        let mut parser = UrlParser::new(url);
        if self.trim_all {
            parser.set_search("");
            return parser.into_href();
        }

        let Some(params) = &self.params else {
            return parser.into_href();
        };
        let query = parser.query();
        if query.is_empty() {
            return parser.into_href();
        }

        let kept = query
            .split('&')
            .filter(|pair| {
                let name = pair.split_once('=').map_or(*pair, |(name, _)| name);
                params.is_match(name) == self.invert
            })
            .collect::<Vec<_>>()
            .join("&");
        parser.set_search(&kept);
        parser.into_href()
    }
}
