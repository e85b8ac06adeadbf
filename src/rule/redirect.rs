use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use super::Rule;
use crate::effects::Effects;
use crate::error::{ControlError, Result};
use crate::template::Template;
use crate::types::{Outcome, Request};

/// Rewrites request urls through a redirect template
#[derive(Debug, Clone)]
pub struct RedirectRule {
    template: Template,
    redirect_document: bool,
}

impl RedirectRule {
    pub fn new(redirect_url: &str) -> Result<Self> {
        Ok(Self {
            template: Template::parse(redirect_url)?,
            redirect_document: false,
        })
    }

    /// Navigate the tab instead of redirecting sub-document requests.
    pub fn with_redirect_document(mut self, redirect_document: bool) -> Self {
        self.redirect_document = redirect_document;
        self
    }

    pub fn redirect_document(&self) -> bool {
        self.redirect_document
    }

    pub fn apply(&self, url: &str) -> String {
        self.template.apply(url)
    }
}

/// Turn a rewritten url into an outcome for `request`.
///
/// Every rule in `applied` contributed to `target` and is notified. An
/// unchanged url has no effect. With `redirect_document` set, a
/// sub-document request is cancelled and its tab is navigated instead;
/// notifications then wait for the tab update.
pub(crate) fn resolve_target(
    applied: &[Arc<Rule>],
    request: &Request,
    target: String,
    redirect_document: bool,
    effects: &Effects,
) -> Option<Outcome> {
    if applied.is_empty() || target == request.url {
        return None;
    }

    if let Err(e) = Url::parse(&target) {
        warn!(request_id = %request.request_id, target = %target, error = %e, "redirect produced an invalid url");
        let error = ControlError::InvalidUrl { target };
        for rule in applied {
            effects.notifier.error(rule, request, &error);
        }
        return None;
    }

    if redirect_document && !request.is_main_frame() {
        debug!(request_id = %request.request_id, tab_id = request.tab_id, target = %target, "redirecting tab document");
        let rules = applied.to_vec();
        let notifier = Arc::clone(&effects.notifier);
        let pending = request.clone();
        let url = target.clone();
        effects.tab_updater.update_tab(
            request.tab_id,
            &target,
            Box::new(move || {
                for rule in &rules {
                    notifier.notify(rule, &pending, Some(&url));
                }
            }),
        );
        return Some(Outcome::Cancel);
    }

    for rule in applied {
        effects.notifier.notify(rule, request, Some(&target));
    }
    Some(Outcome::RedirectUrl(target))
}
