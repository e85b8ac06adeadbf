use std::sync::Arc;

use super::redirect::resolve_target;
use super::{Action, Rule};
use crate::effects::Effects;
use crate::types::{Outcome, Request};

/// Equal-priority url-transforming rules applied in sequence.
///
/// Redirect rules always precede filter rules so inline-url extraction
/// sees the redirected url.
#[derive(Debug, Clone)]
pub struct CompositeRule {
    members: Vec<Arc<Rule>>,
}

impl CompositeRule {
    pub fn new(first: Arc<Rule>) -> Self {
        Self {
            members: vec![first],
        }
    }

    /// Add a member behind every member of the same or an earlier kind.
    pub fn push(&mut self, rule: Arc<Rule>) {
        let rank = rule.action().composite_rank();
        let at = self
            .members
            .iter()
            .position(|member| member.action().composite_rank() > rank)
            .unwrap_or(self.members.len());
        self.members.insert(at, rule);
    }

    pub fn contains(&self, action: Action) -> bool {
        self.members.iter().any(|member| member.action() == action)
    }

    pub fn members(&self) -> &[Arc<Rule>] {
        &self.members
    }

    pub fn priority(&self) -> i32 {
        self.members
            .first()
            .map(|member| member.priority())
            .unwrap_or_default()
    }

    /// Apply each member to the cumulative url. Only members that changed
    /// the url are notified.
    pub fn resolve(&self, request: &Request, effects: &Effects) -> Option<Outcome> {
        let mut url = request.url.clone();
        let mut applied = Vec::new();
        let mut redirect_document = false;

        for member in &self.members {
            let Some(next) = member.apply(&url) else {
                continue;
            };
            if next != url {
                redirect_document |= member.redirect_document();
                applied.push(Arc::clone(member));
                url = next;
            }
        }

        resolve_target(&applied, request, url, redirect_document, effects)
    }
}
