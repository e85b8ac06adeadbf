//! Side effects requested by resolved rules.
//!
//! The controller never talks to the host browser directly. It reports
//! applied rules through a [`Notifier`] and asks a [`TabUpdater`] to
//! navigate tabs for document redirects.

use std::sync::Arc;

#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio::runtime::Handle;
#[cfg(feature = "async")]
use tracing::warn;

use crate::error::ControlError;
#[cfg(feature = "async")]
use crate::error::Result;
use crate::rule::Rule;
use crate::types::Request;

/// Completion callback of a tab update
pub type TabUpdateCallback = Box<dyn FnOnce() + Send + 'static>;

/// Receives applied-rule and failure reports.
pub trait Notifier: Send + Sync {
    /// A rule took effect on a request. `target` is the new url for
    /// redirects.
    fn notify(&self, rule: &Rule, request: &Request, target: Option<&str>);

    /// A rule failed to resolve; the request proceeds unmodified.
    fn error(&self, rule: &Rule, request: &Request, error: &ControlError);
}

/// Tab navigation interface.
pub trait TabUpdater: Send + Sync {
    /// Navigate `tab_id` to `url` and call `on_complete` once done.
    fn update_tab(&self, tab_id: i64, url: &str, on_complete: TabUpdateCallback);
}

/// Async tab navigation interface.
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncTabUpdater: Send + Sync {
    /// Navigate `tab_id` to `url`.
    async fn update_tab(&self, tab_id: i64, url: &str) -> Result<()>;
}

/// Notifier that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilNotifier;

impl Notifier for NilNotifier {
    fn notify(&self, _rule: &Rule, _request: &Request, _target: Option<&str>) {}

    fn error(&self, _rule: &Rule, _request: &Request, _error: &ControlError) {}
}

/// Tab updater that completes immediately without navigating.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilTabUpdater;

impl TabUpdater for NilTabUpdater {
    fn update_tab(&self, _tab_id: i64, _url: &str, on_complete: TabUpdateCallback) {
        on_complete();
    }
}

/// Runs an [`AsyncTabUpdater`] on a tokio runtime, completing the callback
/// from the spawned task. Failed updates are logged and never complete.
#[cfg(feature = "async")]
pub struct TokioTabUpdater {
    handle: Handle,
    inner: Arc<dyn AsyncTabUpdater>,
}

#[cfg(feature = "async")]
impl TokioTabUpdater {
    pub fn new(handle: Handle, inner: Arc<dyn AsyncTabUpdater>) -> Self {
        Self { handle, inner }
    }

    /// Use the runtime of the calling context.
    ///
    /// Fails outside of a tokio runtime.
    pub fn current(inner: Arc<dyn AsyncTabUpdater>) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| ControlError::TabUpdate(e.to_string()))?;
        Ok(Self::new(handle, inner))
    }
}

#[cfg(feature = "async")]
impl TabUpdater for TokioTabUpdater {
    fn update_tab(&self, tab_id: i64, url: &str, on_complete: TabUpdateCallback) {
        let inner = Arc::clone(&self.inner);
        let url = url.to_string();
        self.handle.spawn(async move {
            match inner.update_tab(tab_id, &url).await {
                Ok(()) => on_complete(),
                Err(e) => warn!(tab_id, url = %url, error = %e, "tab update failed"),
            }
        });
    }
}

/// Side-effect handles shared by every rule resolution.
#[derive(Clone)]
pub struct Effects {
    pub notifier: Arc<dyn Notifier>,
    pub tab_updater: Arc<dyn TabUpdater>,
}

impl Effects {
    pub fn new(notifier: Arc<dyn Notifier>, tab_updater: Arc<dyn TabUpdater>) -> Self {
        Self {
            notifier,
            tab_updater,
        }
    }
}

impl Default for Effects {
    fn default() -> Self {
        Self::new(Arc::new(NilNotifier), Arc::new(NilTabUpdater))
    }
}

impl std::fmt::Debug for Effects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effects").finish_non_exhaustive()
    }
}
