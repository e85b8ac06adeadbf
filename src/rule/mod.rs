//! Rule variants.
//!
//! Every rule has a fixed priority by kind, highest first:
//!
//! | Action | Priority | Outcome |
//! |--------|----------|---------|
//! | Logged whitelist | 50 | none, notified |
//! | Whitelist | 40 | none |
//! | Block | 30 | cancel |
//! | Secure | 20 | upgrade to https |
//! | Redirect, Filter | 10 | rewritten url |

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

mod composite;
mod filter;
mod redirect;

pub use composite::CompositeRule;
pub use filter::FilterRule;
pub use redirect::RedirectRule;

use crate::effects::Effects;
use crate::error::ControlError;
use crate::matcher::{MatchPattern, PatternMatcher, RequestMatcher};
use crate::types::{Outcome, Request, ResourceType};

pub const PRIORITY_LOGGED_WHITELIST: i32 = 50;
pub const PRIORITY_WHITELIST: i32 = 40;
pub const PRIORITY_BLOCK: i32 = 30;
pub const PRIORITY_SECURE: i32 = 20;
pub const PRIORITY_TRANSFORM: i32 = 10;

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Whitelist,
    LoggedWhitelist,
    Block,
    Secure,
    Redirect,
    Filter,
}

impl Action {
    pub fn priority(self) -> i32 {
        match self {
            Action::LoggedWhitelist => PRIORITY_LOGGED_WHITELIST,
            Action::Whitelist => PRIORITY_WHITELIST,
            Action::Block => PRIORITY_BLOCK,
            Action::Secure => PRIORITY_SECURE,
            Action::Redirect | Action::Filter => PRIORITY_TRANSFORM,
        }
    }

    /// Whether the action rewrites the request url
    pub fn is_transforming(self) -> bool {
        matches!(self, Action::Redirect | Action::Filter)
    }

    /// Position inside a composite rule
    fn composite_rank(self) -> u8 {
        match self {
            Action::Redirect => 0,
            Action::Filter => 1,
            _ => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Whitelist => "whitelist",
            Action::LoggedWhitelist => "logged_whitelist",
            Action::Block => "block",
            Action::Secure => "secure",
            Action::Redirect => "redirect",
            Action::Filter => "filter",
        }
    }

    /// Action of a configuration record; `log` turns whitelist into logged
    /// whitelist.
    pub fn from_config(action: &str, log: bool) -> Result<Self, ControlError> {
        match action.parse::<Action>()? {
            Action::Whitelist if log => Ok(Action::LoggedWhitelist),
            action => Ok(action),
        }
    }
}

impl FromStr for Action {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitelist" => Ok(Action::Whitelist),
            "logged_whitelist" => Ok(Action::LoggedWhitelist),
            "block" => Ok(Action::Block),
            "secure" => Ok(Action::Secure),
            "redirect" => Ok(Action::Redirect),
            "filter" => Ok(Action::Filter),
            other => Err(ControlError::UnsupportedAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a rule
#[derive(Debug, Clone)]
pub enum RuleKind {
    Whitelist,
    LoggedWhitelist,
    Block,
    Secure,
    Redirect(RedirectRule),
    Filter(FilterRule),
}

/// A compiled rule
#[derive(Debug)]
pub struct Rule {
    uuid: String,
    tag: Option<String>,
    active: AtomicBool,
    matcher: PatternMatcher,
    match_patterns: Vec<MatchPattern>,
    types: Option<Vec<ResourceType>>,
    kind: RuleKind,
}

impl Rule {
    /// Active rule matching every request
    pub fn new(uuid: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            uuid: uuid.into(),
            tag: None,
            active: AtomicBool::new(true),
            matcher: PatternMatcher::default(),
            match_patterns: vec![MatchPattern::all_urls()],
            types: None,
            kind,
        }
    }

    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_match_patterns(mut self, patterns: Vec<MatchPattern>) -> Self {
        self.match_patterns = patterns;
        self
    }

    /// Restrict the request filter to these resource types
    pub fn with_types(mut self, types: Option<Vec<ResourceType>>) -> Self {
        self.types = types;
        self
    }

    pub fn with_active(self, active: bool) -> Self {
        self.active.store(active, Ordering::Relaxed);
        self
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    pub fn action(&self) -> Action {
        match self.kind {
            RuleKind::Whitelist => Action::Whitelist,
            RuleKind::LoggedWhitelist => Action::LoggedWhitelist,
            RuleKind::Block => Action::Block,
            RuleKind::Secure => Action::Secure,
            RuleKind::Redirect(_) => Action::Redirect,
            RuleKind::Filter(_) => Action::Filter,
        }
    }

    pub fn priority(&self) -> i32 {
        self.action().priority()
    }

    pub fn is_transforming(&self) -> bool {
        self.action().is_transforming()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn match_patterns(&self) -> &[MatchPattern] {
        &self.match_patterns
    }

    pub fn types(&self) -> Option<&[ResourceType]> {
        self.types.as_deref()
    }

    /// Request filter of the host browser: resource type and match
    /// patterns.
    pub fn filter_matches(&self, request: &Request) -> bool {
        if let Some(types) = &self.types {
            if !types.contains(&request.resource_type) {
                return false;
            }
        }
        self.match_patterns
            .iter()
            .any(|pattern| pattern.matches(&request.url))
    }

    /// In-process predicate: active flag and compiled pattern matcher
    pub fn matches(&self, request: &Request) -> bool {
        self.is_active() && self.matcher.matches(request)
    }

    /// Rewritten url for transforming rules, `None` for the others.
    pub fn apply(&self, url: &str) -> Option<String> {
        match &self.kind {
            RuleKind::Redirect(rule) => Some(rule.apply(url)),
            RuleKind::Filter(rule) => Some(rule.apply(url)),
            _ => None,
        }
    }

    pub fn redirect_document(&self) -> bool {
        match &self.kind {
            RuleKind::Redirect(rule) => rule.redirect_document(),
            _ => false,
        }
    }

    /// Outcome of this rule for `request`, reporting through `effects`.
    pub fn resolve(self: &Arc<Self>, request: &Request, effects: &Effects) -> Option<Outcome> {
        match &self.kind {
            RuleKind::Whitelist => None,
            RuleKind::LoggedWhitelist => {
                effects.notifier.notify(self, request, None);
                None
            }
            RuleKind::Block => {
                effects.notifier.notify(self, request, None);
                Some(Outcome::Cancel)
            }
            RuleKind::Secure => {
                effects.notifier.notify(self, request, None);
                Some(Outcome::UpgradeToSecure)
            }
            RuleKind::Redirect(_) | RuleKind::Filter(_) => {
                let target = self.apply(&request.url)?;
                redirect::resolve_target(
                    std::slice::from_ref(self),
                    request,
                    target,
                    self.redirect_document(),
                    effects,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::OriginRelation;

    fn request(url: &str) -> Request {
        Request::new("1", url, ResourceType::MainFrame, 1)
    }

    #[test]
    fn test_priorities_are_ordered() {
        let order = [
            Action::LoggedWhitelist,
            Action::Whitelist,
            Action::Block,
            Action::Secure,
            Action::Redirect,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].priority() > pair[1].priority());
        }
        assert_eq!(Action::Redirect.priority(), Action::Filter.priority());
    }

    #[test]
    fn test_action_from_config() {
        assert_eq!(Action::from_config("whitelist", true).unwrap(), Action::LoggedWhitelist);
        assert_eq!(Action::from_config("whitelist", false).unwrap(), Action::Whitelist);
        assert_eq!(Action::from_config("block", true).unwrap(), Action::Block);
        let err = Action::from_config("allow", false).unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedAction(a) if a == "allow"));
    }

    #[test]
    fn test_simple_resolutions() {
        let effects = Effects::default();
        let r = request("http://example.com/");
        let block = Arc::new(Rule::new("b", RuleKind::Block));
        let secure = Arc::new(Rule::new("s", RuleKind::Secure));
        let white = Arc::new(Rule::new("w", RuleKind::Whitelist));
        let logged = Arc::new(Rule::new("l", RuleKind::LoggedWhitelist));
        assert_eq!(block.resolve(&r, &effects), Some(Outcome::Cancel));
        assert_eq!(secure.resolve(&r, &effects), Some(Outcome::UpgradeToSecure));
        assert_eq!(white.resolve(&r, &effects), None);
        assert_eq!(logged.resolve(&r, &effects), None);
    }

    #[test]
    fn test_redirect_resolution() {
        let effects = Effects::default();
        let rule = Arc::new(Rule::new(
            "r",
            RuleKind::Redirect(RedirectRule::new("https://{hostname}{pathname}").unwrap()),
        ));
        assert_eq!(
            rule.resolve(&request("http://example.com/a"), &effects),
            Some(Outcome::RedirectUrl("https://example.com/a".into()))
        );
        assert_eq!(rule.resolve(&request("https://example.com/a"), &effects), None);
    }

    #[test]
    fn test_invalid_redirect_has_no_effect() {
        let rule = Arc::new(Rule::new(
            "r",
            RuleKind::Redirect(RedirectRule::new("not a url {pathname}").unwrap()),
        ));
        assert_eq!(rule.resolve(&request("http://example.com/a"), &Effects::default()), None);
    }

    #[test]
    fn test_redirect_document_cancels_sub_frame() {
        let rule = Arc::new(Rule::new(
            "r",
            RuleKind::Redirect(
                RedirectRule::new("https://b.com/")
                    .unwrap()
                    .with_redirect_document(true),
            ),
        ));
        let frame = Request::new("1", "https://a.com/", ResourceType::SubFrame, 4);
        assert_eq!(rule.resolve(&frame, &Effects::default()), Some(Outcome::Cancel));
        let top = request("https://a.com/");
        assert_eq!(
            rule.resolve(&top, &Effects::default()),
            Some(Outcome::RedirectUrl("https://b.com/".into()))
        );
    }

    #[test]
    fn test_active_flag() {
        let rule = Rule::new("b", RuleKind::Block);
        let r = request("https://example.com/");
        assert!(rule.matches(&r));
        rule.set_active(false);
        assert!(!rule.matches(&r));
        assert!(!Rule::new("b", RuleKind::Block).with_active(false).is_active());
    }

    #[test]
    fn test_matcher_and_filter() {
        let rule = Rule::new("b", RuleKind::Block)
            .with_matcher(
                PatternMatcher::compile(&[], &[], Some(OriginRelation::ThirdPartyDomain)).unwrap(),
            )
            .with_match_patterns(vec![MatchPattern::new("*://*.tracker.net/*").unwrap()])
            .with_types(Some(vec![ResourceType::Script]));

        let script = Request::new("1", "https://cdn.tracker.net/t.js", ResourceType::Script, 1)
            .with_origin("https://example.com/");
        assert!(rule.filter_matches(&script));
        assert!(rule.matches(&script));

        let image = Request::new("2", "https://cdn.tracker.net/t.gif", ResourceType::Image, 1);
        assert!(!rule.filter_matches(&image));

        let other = Request::new("3", "https://example.org/t.js", ResourceType::Script, 1);
        assert!(!rule.filter_matches(&other));
    }
}
