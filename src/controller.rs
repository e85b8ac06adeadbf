//! Per-request rule arbitration.
//!
//! Every matching rule is marked on the request; the single resolve call
//! then settles the request with the winning entry:
//!
//! - a strictly higher priority replaces the entry
//! - an equal-priority url-transforming rule of a kind not yet present is
//!   composed with the entry (redirects before filters)
//! - any other tie keeps the first rule

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::effects::{Effects, Notifier, TabUpdater};
use crate::rule::{CompositeRule, Rule};
use crate::types::{Outcome, Request};

/// Rule entry of a marked request
#[derive(Debug, Clone)]
enum Marked {
    Single(Arc<Rule>),
    Composite(CompositeRule),
}

impl Marked {
    fn priority(&self) -> i32 {
        match self {
            Marked::Single(rule) => rule.priority(),
            Marked::Composite(composite) => composite.priority(),
        }
    }

    /// Merge an equal-priority rule into the entry. Returns whether the
    /// rule was taken.
    fn compose(&mut self, rule: &Arc<Rule>) -> bool {
        if !rule.is_transforming() {
            return false;
        }
        match self {
            Marked::Single(existing)
                if existing.is_transforming() && existing.action() != rule.action() =>
            {
                let mut composite = CompositeRule::new(Arc::clone(existing));
                composite.push(Arc::clone(rule));
                *self = Marked::Composite(composite);
                true
            }
            Marked::Composite(composite) if !composite.contains(rule.action()) => {
                composite.push(Arc::clone(rule));
                true
            }
            _ => false,
        }
    }

    fn resolve(&self, request: &Request, effects: &Effects) -> Option<Outcome> {
        match self {
            Marked::Single(rule) => rule.resolve(request, effects),
            Marked::Composite(composite) => composite.resolve(request, effects),
        }
    }
}

/// Arbitrates matching rules per request id
#[derive(Debug, Default)]
pub struct RequestController {
    marked: HashMap<String, Marked>,
    effects: Effects,
}

impl RequestController {
    pub fn new(notifier: Arc<dyn Notifier>, tab_updater: Arc<dyn TabUpdater>) -> Self {
        Self::with_effects(Effects::new(notifier, tab_updater))
    }

    pub fn with_effects(effects: Effects) -> Self {
        Self {
            marked: HashMap::new(),
            effects,
        }
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// Record `rule` for `request` if the rule matches it.
    pub fn mark(&mut self, request: &Request, rule: &Arc<Rule>) -> bool {
        if !rule.matches(request) {
            return false;
        }

        match self.marked.entry(request.request_id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(Marked::Single(Arc::clone(rule)));
            }
            Entry::Occupied(mut entry) => {
                let current = entry.get_mut();
                let priority = current.priority();
                if rule.priority() > priority {
                    debug!(
                        request_id = %request.request_id,
                        rule = rule.uuid(),
                        action = %rule.action(),
                        "higher priority rule replaces marked rule"
                    );
                    *current = Marked::Single(Arc::clone(rule));
                } else if rule.priority() == priority && current.compose(rule) {
                    debug!(
                        request_id = %request.request_id,
                        rule = rule.uuid(),
                        action = %rule.action(),
                        "rule composed with marked rule"
                    );
                }
            }
        }
        true
    }

    /// Settle `request` and drop its entry. Unmarked requests have no
    /// outcome.
    pub fn resolve(&mut self, request: &Request) -> Option<Outcome> {
        let marked = self.marked.remove(&request.request_id)?;
        let outcome = marked.resolve(request, &self.effects);
        debug!(request_id = %request.request_id, outcome = ?outcome, "request resolved");
        outcome
    }

    /// Number of marked, unresolved requests
    pub fn pending(&self) -> usize {
        self.marked.len()
    }

    pub fn is_marked(&self, request_id: &str) -> bool {
        self.marked.contains_key(request_id)
    }

    /// Drop the entry of a request that will never be resolved
    pub fn forget(&mut self, request_id: &str) -> bool {
        self.marked.remove(request_id).is_some()
    }

    /// Drop every entry, e.g. after the rules changed
    pub fn clear(&mut self) {
        self.marked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{FilterRule, RedirectRule, RuleKind};
    use crate::types::ResourceType;

    fn request(id: &str, url: &str) -> Request {
        Request::new(id, url, ResourceType::MainFrame, 1)
    }

    fn rule(uuid: &str, kind: RuleKind) -> Arc<Rule> {
        Arc::new(Rule::new(uuid, kind))
    }

    fn redirect(uuid: &str, template: &str) -> Arc<Rule> {
        rule(uuid, RuleKind::Redirect(RedirectRule::new(template).unwrap()))
    }

    #[test]
    fn test_higher_priority_wins_regardless_of_order() {
        let mut controller = RequestController::default();
        let r = request("1", "http://a.com/?x=1");
        controller.mark(&r, &rule("f", RuleKind::Filter(FilterRule::new().with_trim_all(true))));
        controller.mark(&r, &rule("b", RuleKind::Block));
        controller.mark(&r, &redirect("r", "https://b.com/"));
        assert_eq!(controller.resolve(&r), Some(Outcome::Cancel));
    }

    #[test]
    fn test_first_of_equal_kind_wins() {
        let mut controller = RequestController::default();
        let r = request("1", "http://a.com/");
        controller.mark(&r, &redirect("r1", "https://one.com/"));
        controller.mark(&r, &redirect("r2", "https://two.com/"));
        assert_eq!(
            controller.resolve(&r),
            Some(Outcome::RedirectUrl("https://one.com/".into()))
        );
    }

    #[test]
    fn test_redirect_and_filter_compose() {
        let mut controller = RequestController::default();
        let r = request("1", "http://a.com/p?utm=1");
        controller.mark(&r, &rule("f", RuleKind::Filter(FilterRule::new().with_trim_all(true))));
        controller.mark(&r, &redirect("r", "https://b.com{pathname}{search}"));
        assert_eq!(
            controller.resolve(&r),
            Some(Outcome::RedirectUrl("https://b.com/p".into()))
        );
    }

    #[test]
    fn test_resolve_removes_entry() {
        let mut controller = RequestController::default();
        let r = request("1", "http://a.com/");
        assert!(controller.mark(&r, &rule("b", RuleKind::Block)));
        assert_eq!(controller.pending(), 1);
        assert!(controller.is_marked("1"));
        assert_eq!(controller.resolve(&r), Some(Outcome::Cancel));
        assert_eq!(controller.resolve(&r), None);
        assert_eq!(controller.pending(), 0);
    }

    #[test]
    fn test_inactive_rule_not_marked() {
        let mut controller = RequestController::default();
        let block = rule("b", RuleKind::Block);
        block.set_active(false);
        assert!(!controller.mark(&request("1", "http://a.com/"), &block));
        assert_eq!(controller.pending(), 0);
    }

    #[test]
    fn test_forget_and_clear() {
        let mut controller = RequestController::default();
        let block = rule("b", RuleKind::Block);
        controller.mark(&request("1", "http://a.com/"), &block);
        controller.mark(&request("2", "http://b.com/"), &block);
        assert!(controller.forget("1"));
        assert!(!controller.forget("1"));
        assert_eq!(controller.pending(), 1);
        controller.clear();
        assert_eq!(controller.pending(), 0);
    }

    #[test]
    fn test_whitelist_outranks_block() {
        let mut controller = RequestController::default();
        let r = request("1", "http://a.com/");
        controller.mark(&r, &rule("b", RuleKind::Block));
        controller.mark(&r, &rule("w", RuleKind::Whitelist));
        assert_eq!(controller.resolve(&r), None);
    }
}
