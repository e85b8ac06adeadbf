use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{load_rules, load_rules_from_file, RuleConfig};
use crate::controller::RequestController;
use crate::error::{ControlError, Result};
use crate::matcher::{match_urls, MatchPattern, PatternMatcher};
use crate::rule::{Action, FilterRule, RedirectRule, Rule, RuleKind};
use crate::types::{Outcome, Request};

/// Default expansion list for `example.*` hosts
pub const DEFAULT_TOP_LEVEL_DOMAINS: &[&str] = &[
    "com", "net", "org", "de", "co.uk", "fr", "it", "es", "nl", "ca", "com.au", "jp", "ru", "br",
    "in", "se", "pl",
];

/// Rule compilation options.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Used when a pattern has `example.*` hosts but no own list
    pub top_level_domains: Vec<String>,
    /// Keep rules configured as inactive (they never match until enabled)
    pub keep_inactive: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            top_level_domains: DEFAULT_TOP_LEVEL_DOMAINS
                .iter()
                .map(|tld| tld.to_string())
                .collect(),
            keep_inactive: false,
        }
    }
}

impl CompileOptions {
    /// Create new compile options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default top-level domain list.
    pub fn with_top_level_domains<I, S>(mut self, tlds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.top_level_domains = tlds.into_iter().map(Into::into).collect();
        self
    }

    /// Keep inactive rules.
    pub fn with_keep_inactive(mut self, keep: bool) -> Self {
        self.keep_inactive = keep;
        self
    }
}

/// Compile a single rule record
pub fn create_rule(config: &RuleConfig, options: &CompileOptions) -> Result<Rule> {
    let action = Action::from_config(&config.action, config.log)?;

    let kind = match action {
        Action::Whitelist => RuleKind::Whitelist,
        Action::LoggedWhitelist => RuleKind::LoggedWhitelist,
        Action::Block => RuleKind::Block,
        Action::Secure => RuleKind::Secure,
        Action::Redirect => {
            let template = config.redirect_url.as_deref().ok_or_else(|| {
                ControlError::ConfigError(format!("Redirect rule {} has no redirectUrl", config.uuid))
            })?;
            RuleKind::Redirect(
                RedirectRule::new(template)?.with_redirect_document(config.redirect_document),
            )
        }
        Action::Filter => {
            let mut filter = FilterRule::new()
                .with_trim_all(config.trim_all_params)
                .with_skip_redirection_filter(config.skip_redirection_filter)
                .with_skip_on_same_domain(config.skip_on_same_domain);
            if let Some(params) = &config.params_filter {
                filter = filter.with_params(&params.values, params.invert)?;
            }
            RuleKind::Filter(filter)
        }
    };

    let pattern = &config.pattern;
    let matcher = PatternMatcher::compile(&pattern.includes, &pattern.excludes, pattern.origin)?;

    let tlds = pattern
        .top_level_domains
        .as_deref()
        .unwrap_or(&options.top_level_domains);
    let match_patterns = match_urls(
        &pattern.scheme,
        &pattern.host,
        &pattern.path,
        tlds,
        pattern.all_urls,
    )
    .iter()
    .map(|url| MatchPattern::new(url))
    .collect::<Result<Vec<_>>>()?;

    debug!(
        uuid = %config.uuid,
        action = %action,
        patterns = match_patterns.len(),
        "compiled rule"
    );

    Ok(Rule::new(config.uuid.clone(), kind)
        .with_tag(config.tag.clone())
        .with_matcher(matcher)
        .with_match_patterns(match_patterns)
        .with_types(config.types.clone())
        .with_active(config.active))
}

/// Compiled rules in configuration order
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Arc<Rule>>,
}

impl RuleSet {
    /// Compile rule records. Any invalid record fails the whole set.
    pub fn new(configs: &[RuleConfig], options: &CompileOptions) -> Result<Self> {
        let mut rules = Vec::with_capacity(configs.len());
        for config in configs {
            if !config.active && !options.keep_inactive {
                continue;
            }
            rules.push(Arc::new(create_rule(config, options)?));
        }
        info!(rules = rules.len(), configured = configs.len(), "compiled request control rules");
        Ok(Self { rules })
    }

    /// Compile rules from JSON text.
    pub fn from_json(json: &str, options: &CompileOptions) -> Result<Self> {
        Self::new(&load_rules(json)?, options)
    }

    /// Compile rules from a JSON file.
    pub fn from_file(path: impl AsRef<Path>, options: &CompileOptions) -> Result<Self> {
        Self::new(&load_rules_from_file(path)?, options)
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn rule(&self, uuid: &str) -> Option<&Arc<Rule>> {
        self.rules.iter().find(|rule| rule.uuid() == uuid)
    }

    /// Get the number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of every rule's match patterns, for the host's request filter
    pub fn match_patterns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .flat_map(|rule| rule.match_patterns())
            .map(|pattern| pattern.source().to_string())
            .filter(|source| seen.insert(source.clone()))
            .collect()
    }

    /// Mark every rule whose request filter and predicate match. Returns
    /// the number of marked rules.
    pub fn mark_matching(&self, request: &Request, controller: &mut RequestController) -> usize {
        self.rules
            .iter()
            .filter(|rule| rule.filter_matches(request))
            .filter(|rule| controller.mark(request, rule))
            .count()
    }

    /// Mark and resolve in one step
    pub fn process(&self, request: &Request, controller: &mut RequestController) -> Option<Outcome> {
        self.mark_matching(request, controller);
        controller.resolve(request)
    }
}
