//! Request Control - rule-based request rewriting for Rust
//!
//! This library decides, per intercepted request, whether to allow, block,
//! upgrade, rewrite or redirect it:
//! - String-level url component access and mutation
//! - Redirect templates with component expansions and manipulations
//! - Query parameter filtering and inline (redirector) url extraction
//! - WebExtension match patterns and include/exclude/origin predicates
//! - Priority-based arbitration of every rule matching a request
//!
//! # Example
//!
//! ```rust
//! use request_control_r::{CompileOptions, Outcome, Request, RequestController, ResourceType, RuleSet};
//!
//! let rules = r#"[
//!     { "uuid": "yt", "action": "filter", "trimAllParams": true,
//!       "pattern": { "scheme": "https", "host": "www.youtube.com", "path": "watch*" } },
//!     { "uuid": "ads", "action": "block",
//!       "pattern": { "host": "*.doubleclick.net", "path": "*" } }
//! ]"#;
//!
//! let rule_set = RuleSet::from_json(rules, &CompileOptions::default()).unwrap();
//! let mut controller = RequestController::default();
//!
//! let request = Request::new(
//!     "1",
//!     "https://www.youtube.com/watch?v=X&feature=em#hash",
//!     ResourceType::MainFrame,
//!     1,
//! );
//! assert_eq!(
//!     rule_set.process(&request, &mut controller),
//!     Some(Outcome::RedirectUrl("https://www.youtube.com/watch#hash".into()))
//! );
//! ```
//!
//! # Redirect Templates
//!
//! | Construct | Example | Description |
//! |-----------|---------|-------------|
//! | Literal | `https://example.org/` | Copied as is |
//! | Expansion | `{hostname}` | Url component of the request |
//! | Query expansion | `{search.v}` | Value of one query parameter |
//! | Manipulation | `{href/.*url=(.*)/$1\|decodeURIComponent}` | Expansion piped through steps |
//! | Instruction | `[protocol=https]` | Set a component after assembly |
//!
//! ## Manipulations
//!
//! - `/pattern/replacement` - regex replace, first match
//! - `//pattern/replacement` - regex replace, all matches
//! - `:offset:length` - substring
//! - `encodeURI`, `decodeURI`, `encodeURIComponent`, `decodeURIComponent`,
//!   `encodeBase64`, `decodeBase64`

pub mod compile;
pub mod config;
pub mod controller;
pub mod domain;
pub mod effects;
pub mod error;
pub mod manipulation;
pub mod matcher;
pub mod records;
pub mod rule;
pub mod template;
pub mod types;
pub mod url;

// Re-export commonly used items
pub use compile::{create_rule, CompileOptions, RuleSet, DEFAULT_TOP_LEVEL_DOMAINS};
pub use config::{load_rules, load_rules_from_file, ParamsFilterConfig, PatternConfig, RuleConfig};
pub use controller::RequestController;
pub use domain::{effective_domain, is_same_domain};
pub use error::{ControlError, Result};
pub use manipulation::{Codec, Manipulation, Pipeline};
pub use matcher::{
    AllMatcher, MatchPattern, Matcher, OriginMatcher, OriginRelation, PatternMatcher,
    RequestMatcher, ValueMatcher,
};
pub use rule::{Action, CompositeRule, FilterRule, RedirectRule, Rule, RuleKind};
pub use template::{ParamRef, Template};
pub use types::{Outcome, Request, ResourceType};
pub use crate::url::{parse_inline_url, Component, QueryParser, UrlParser};

// Re-export side-effect types
pub use effects::{Effects, NilNotifier, NilTabUpdater, Notifier, TabUpdateCallback, TabUpdater};
#[cfg(feature = "async")]
pub use effects::{AsyncTabUpdater, TokioTabUpdater};
pub use records::{RecordingNotifier, RequestRecord, DEFAULT_RECORDS_PER_TAB};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_full_workflow() {
        let rules_text = r#"{ "rules": [
            { "uuid": "trim", "action": "filter",
              "paramsFilter": { "values": ["utm_*", "fbclid"] },
              "pattern": { "allUrls": true } },
            { "uuid": "out", "action": "redirect",
              "redirectUrl": "{href/.*url=(.*)/$1|decodeURIComponent}",
              "pattern": { "host": "go.redirectingat.com", "path": "*" } },
            { "uuid": "ads", "action": "block", "tag": "ads",
              "pattern": { "host": "*.ads.example", "path": "*", "origin": "third-party-domain" } },
            { "uuid": "https", "action": "secure",
              "pattern": { "scheme": "http", "host": "secure.example.com", "path": "*" } },
            { "uuid": "keep", "action": "whitelist", "log": true,
              "pattern": { "host": "*.bank.example", "path": "*" } }
        ] }"#;

        // Compile rules
        let rule_set = RuleSet::from_json(rules_text, &CompileOptions::default()).unwrap();
        assert_eq!(rule_set.len(), 5);

        let notifier = Arc::new(RecordingNotifier::default());
        let mut controller = RequestController::new(notifier.clone(), Arc::new(NilTabUpdater));

        // Tracking params trimmed
        let request = Request::new(
            "1",
            "https://news.example.org/story?id=7&utm_source=feed&fbclid=abc",
            ResourceType::MainFrame,
            1,
        );
        assert_eq!(
            rule_set.process(&request, &mut controller),
            Some(Outcome::RedirectUrl("https://news.example.org/story?id=7".into()))
        );

        // Redirector unwrapped; filter composed behind the redirect
        let request = Request::new(
            "2",
            "http://go.redirectingat.com/?id=1&url=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FTest%3Futm_medium%3Dx",
            ResourceType::MainFrame,
            1,
        );
        assert_eq!(
            rule_set.process(&request, &mut controller),
            Some(Outcome::RedirectUrl("https://en.wikipedia.org/wiki/Test".into()))
        );

        // Third-party ad blocked
        let request = Request::new("3", "https://cdn.ads.example/a.js", ResourceType::Script, 1)
            .with_origin("https://news.example.org/");
        assert_eq!(rule_set.process(&request, &mut controller), Some(Outcome::Cancel));

        // Upgrade to https
        let request = Request::new("4", "http://secure.example.com/", ResourceType::Image, 1);
        assert_eq!(
            rule_set.process(&request, &mut controller),
            Some(Outcome::UpgradeToSecure)
        );

        // Logged whitelist outranks the filter
        let request = Request::new("5", "https://www.bank.example/?utm_source=x", ResourceType::Image, 1);
        assert_eq!(rule_set.process(&request, &mut controller), None);

        assert_eq!(controller.pending(), 0);
        assert_eq!(notifier.count(1), 6);
    }
}
