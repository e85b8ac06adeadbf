//! Per-tab log of applied rules.

use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::effects::Notifier;
use crate::error::{ControlError, Result};
use crate::rule::{Action, Rule};
use crate::types::{Request, ResourceType};

/// Default number of records kept per tab
pub const DEFAULT_RECORDS_PER_TAB: usize = 100;

/// One applied rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub action: Action,
    pub rule_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the unix epoch
    pub timestamp: u64,
}

impl RequestRecord {
    fn new(rule: &Rule, request: &Request) -> Self {
        Self {
            action: rule.action(),
            rule_uuid: rule.uuid().to_string(),
            tag: rule.tag().map(str::to_string),
            url: request.url.clone(),
            resource_type: request.resource_type,
            target: None,
            error: None,
            timestamp: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Notifier keeping a bounded record list per tab.
///
/// The host clears a tab's records with [`RecordingNotifier::clear_tab`]
/// when the tab navigates.
#[derive(Debug)]
pub struct RecordingNotifier {
    tabs: Mutex<HashMap<i64, VecDeque<RequestRecord>>>,
    capacity: usize,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDS_PER_TAB)
    }
}

impl RecordingNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn push(&self, tab_id: i64, record: RequestRecord) {
        let mut tabs = self.tabs.lock();
        let records = tabs.entry(tab_id).or_default();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Records of a tab, oldest first
    pub fn records(&self, tab_id: i64) -> Vec<RequestRecord> {
        self.tabs
            .lock()
            .get(&tab_id)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Badge count of a tab
    pub fn count(&self, tab_id: i64) -> usize {
        self.tabs.lock().get(&tab_id).map_or(0, VecDeque::len)
    }

    pub fn clear_tab(&self, tab_id: i64) {
        self.tabs.lock().remove(&tab_id);
    }

    pub fn clear(&self) {
        self.tabs.lock().clear();
    }

    /// Records of a tab as a JSON array
    pub fn to_json(&self, tab_id: i64) -> Result<String> {
        Ok(serde_json::to_string(&self.records(tab_id))?)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, rule: &Rule, request: &Request, target: Option<&str>) {
        info!(
            tab_id = request.tab_id,
            rule = rule.uuid(),
            action = %rule.action(),
            url = %request.url,
            target = target.unwrap_or_default(),
            "rule applied"
        );
        let mut record = RequestRecord::new(rule, request);
        record.target = target.map(str::to_string);
        self.push(request.tab_id, record);
    }

    fn error(&self, rule: &Rule, request: &Request, error: &ControlError) {
        warn!(
            tab_id = request.tab_id,
            rule = rule.uuid(),
            url = %request.url,
            error = %error,
            "rule failed"
        );
        let mut record = RequestRecord::new(rule, request);
        record.target = error.target().map(str::to_string);
        record.error = Some(error.to_string());
        self.push(request.tab_id, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleKind;

    fn request(tab: i64, kind: ResourceType) -> Request {
        Request::new("1", "https://example.com/a", kind, tab)
    }

    #[test]
    fn test_records_per_tab() {
        let notifier = RecordingNotifier::default();
        let block = Rule::new("b", RuleKind::Block).with_tag(Some("ads".into()));
        notifier.notify(&block, &request(1, ResourceType::Script), None);
        notifier.notify(&block, &request(1, ResourceType::Image), None);
        notifier.notify(&block, &request(2, ResourceType::Image), None);

        assert_eq!(notifier.count(1), 2);
        assert_eq!(notifier.count(2), 1);
        assert_eq!(notifier.count(3), 0);
        let records = notifier.records(1);
        assert_eq!(records[0].action, Action::Block);
        assert_eq!(records[0].tag.as_deref(), Some("ads"));
        assert_eq!(records[1].resource_type, ResourceType::Image);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let notifier = RecordingNotifier::new(2);
        let block = Rule::new("b", RuleKind::Block);
        for kind in [ResourceType::Script, ResourceType::Image, ResourceType::Font] {
            notifier.notify(&block, &request(1, kind), None);
        }
        let kinds: Vec<ResourceType> = notifier.records(1).iter().map(|r| r.resource_type).collect();
        assert_eq!(kinds, vec![ResourceType::Image, ResourceType::Font]);
    }

    #[test]
    fn test_redirect_target_recorded() {
        let notifier = RecordingNotifier::default();
        let block = Rule::new("b", RuleKind::Block);
        notifier.notify(&block, &request(1, ResourceType::MainFrame), Some("https://b.com/"));
        let records = notifier.records(1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target.as_deref(), Some("https://b.com/"));
    }

    #[test]
    fn test_error_records_target() {
        let notifier = RecordingNotifier::default();
        let rule = Rule::new("r", RuleKind::Secure);
        let error = ControlError::InvalidUrl {
            target: "bad url".into(),
        };
        notifier.error(&rule, &request(1, ResourceType::Script), &error);
        let record = &notifier.records(1)[0];
        assert_eq!(record.target.as_deref(), Some("bad url"));
        assert!(record.error.as_deref().unwrap().contains("bad url"));
    }

    #[test]
    fn test_clear_and_json() {
        let notifier = RecordingNotifier::default();
        let rule = Rule::new("w", RuleKind::LoggedWhitelist);
        notifier.notify(&rule, &request(5, ResourceType::Image), None);
        let json = notifier.to_json(5).unwrap();
        assert!(json.contains("\"action\":\"logged_whitelist\""));
        assert!(json.contains("\"ruleUuid\":\"w\""));
        assert!(json.contains("\"type\":\"image\""));

        notifier.clear_tab(5);
        assert_eq!(notifier.count(5), 0);
        notifier.notify(&rule, &request(6, ResourceType::Image), None);
        notifier.clear();
        assert_eq!(notifier.to_json(6).unwrap(), "[]");
    }
}
