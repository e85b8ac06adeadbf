use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Browser resource type of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Beacon,
    Imageset,
    WebManifest,
    #[serde(other)]
    Other,
}

impl ResourceType {
    /// Browser name of the resource type
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::MainFrame => "main_frame",
            ResourceType::SubFrame => "sub_frame",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Object => "object",
            ResourceType::XmlHttpRequest => "xmlhttprequest",
            ResourceType::Ping => "ping",
            ResourceType::CspReport => "csp_report",
            ResourceType::Media => "media",
            ResourceType::Websocket => "websocket",
            ResourceType::Beacon => "beacon",
            ResourceType::Imageset => "imageset",
            ResourceType::WebManifest => "web_manifest",
            ResourceType::Other => "other",
        }
    }
}

impl FromStr for ResourceType {
    type Err = std::convert::Infallible;

    /// Unknown names map to `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "main_frame" => ResourceType::MainFrame,
            "sub_frame" => ResourceType::SubFrame,
            "stylesheet" => ResourceType::Stylesheet,
            "script" => ResourceType::Script,
            "image" => ResourceType::Image,
            "font" => ResourceType::Font,
            "object" => ResourceType::Object,
            "xmlhttprequest" => ResourceType::XmlHttpRequest,
            "ping" => ResourceType::Ping,
            "csp_report" => ResourceType::CspReport,
            "media" => ResourceType::Media,
            "websocket" => ResourceType::Websocket,
            "beacon" => ResourceType::Beacon,
            "imageset" => ResourceType::Imageset,
            "web_manifest" => ResourceType::WebManifest,
            _ => ResourceType::Other,
        })
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intercepted request descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Browser request id, unique among in-flight requests
    pub request_id: String,
    /// Request url
    pub url: String,
    /// Resource type
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Tab the request belongs to (-1 when not tied to a tab)
    pub tab_id: i64,
    /// Url of the document that initiated the request, absent for top-level navigation
    #[serde(default)]
    pub origin_url: Option<String>,
}

impl Request {
    /// Create a new request without an origin
    pub fn new(
        request_id: impl Into<String>,
        url: impl Into<String>,
        resource_type: ResourceType,
        tab_id: i64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            url: url.into(),
            resource_type,
            tab_id,
            origin_url: None,
        }
    }

    /// Set the originating document url
    pub fn with_origin(mut self, origin_url: impl Into<String>) -> Self {
        self.origin_url = Some(origin_url.into());
        self
    }

    /// Whether this request loads a top-level document
    pub fn is_main_frame(&self) -> bool {
        self.resource_type == ResourceType::MainFrame
    }
}

/// Final decision for a resolved request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// Cancel the request
    Cancel,
    /// Redirect the request to the given url
    RedirectUrl(String),
    /// Upgrade the request to a secure scheme
    UpgradeToSecure,
}

impl Outcome {
    /// Redirect target, if this is a redirect
    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Outcome::RedirectUrl(url) => Some(url),
            _ => None,
        }
    }

    pub fn is_cancel(&self) -> bool {
        matches!(self, Outcome::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_names_round_trip() {
        for name in ["main_frame", "sub_frame", "xmlhttprequest", "csp_report", "image"] {
            let parsed: ResourceType = name.parse().unwrap();
            assert_eq!(parsed.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_resource_type_is_other() {
        let parsed: ResourceType = "speculative".parse().unwrap();
        assert_eq!(parsed, ResourceType::Other);

        let from_json: ResourceType = serde_json::from_str("\"speculative\"").unwrap();
        assert_eq!(from_json, ResourceType::Other);
    }

    #[test]
    fn test_request_deserializes_browser_shape() {
        let json = r#"{
            "requestId": "42",
            "url": "https://example.com/",
            "type": "sub_frame",
            "tabId": 7,
            "originUrl": "https://example.org/"
        }"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.request_id, "42");
        assert_eq!(request.resource_type, ResourceType::SubFrame);
        assert_eq!(request.tab_id, 7);
        assert_eq!(request.origin_url.as_deref(), Some("https://example.org/"));
        assert!(!request.is_main_frame());
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = Outcome::RedirectUrl("https://example.com/".into());
        assert_eq!(outcome.redirect_url(), Some("https://example.com/"));
        assert!(!outcome.is_cancel());
        assert!(Outcome::Cancel.is_cancel());
        assert_eq!(Outcome::UpgradeToSecure.redirect_url(), None);
    }
}
