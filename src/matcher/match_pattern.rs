use regex::Regex;
use url::Url;

use super::glob::glob_to_regex;
use crate::error::{ControlError, Result};

/// Sentinel pattern matching every supported url
pub const ALL_URLS: &str = "<all_urls>";

/// Schemes covered by a `*` scheme
const WILDCARD_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

/// Schemes covered by `<all_urls>`
const ALL_URLS_SCHEMES: &[&str] = &["http", "https", "ws", "wss", "ftp", "data", "file"];

/// Browser-extension match pattern (`scheme://host/path`).
///
/// - scheme: `*` or a concrete scheme
/// - host: `*`, `*.example.com` (domain and subdomains) or an exact host
/// - path: glob over path and query, `*` matches anything including `/`
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    scheme: Option<String>,
    host: Option<String>,
    match_subdomain: bool,
    path: Option<Regex>,
}

impl MatchPattern {
    /// Pattern matching every url
    pub fn all_urls() -> Self {
        Self {
            source: ALL_URLS.to_string(),
            scheme: None,
            host: None,
            match_subdomain: true,
            path: None,
        }
    }

    pub fn new(source: &str) -> Result<Self> {
        if source == ALL_URLS {
            return Ok(Self::all_urls());
        }

        let (scheme, rest) = source
            .split_once("://")
            .ok_or_else(|| ControlError::InvalidPattern(source.to_string()))?;
        let host_end = rest
            .find('/')
            .ok_or_else(|| ControlError::InvalidPattern(source.to_string()))?;
        let (host, path) = rest.split_at(host_end);

        let (host, match_subdomain) = if host == "*" {
            (None, true)
        } else if let Some(base) = host.strip_prefix("*.") {
            (Some(base.to_ascii_lowercase()), true)
        } else if host.is_empty() || host.contains('*') {
            return Err(ControlError::InvalidPattern(source.to_string()));
        } else {
            (Some(host.to_ascii_lowercase()), false)
        };

        let path = if path == "/*" {
            None
        } else {
            Some(Regex::new(&format!("^{}$", glob_to_regex(path)))?)
        };

        Ok(Self {
            source: source.to_string(),
            scheme: (scheme != "*").then(|| scheme.to_ascii_lowercase()),
            host,
            match_subdomain,
            path,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_all_urls(&self) -> bool {
        self.source == ALL_URLS
    }

    /// Whether a parsed url is covered by this pattern
    pub fn is_match(&self, url: &Url) -> bool {
        let scheme_ok = match &self.scheme {
            Some(scheme) => url.scheme() == scheme,
            None if self.is_all_urls() => ALL_URLS_SCHEMES.contains(&url.scheme()),
            None => WILDCARD_SCHEMES.contains(&url.scheme()),
        };
        if !scheme_ok {
            return false;
        }

        if let Some(host) = &self.host {
            let Some(url_host) = url.host_str() else {
                return false;
            };
            let host_ok = url_host == host
                || (self.match_subdomain
                    && url_host
                        .strip_suffix(host.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.')));
            if !host_ok {
                return false;
            }
        }

        match &self.path {
            Some(path) => match url.query() {
                Some(query) => path.is_match(&format!("{}?{}", url.path(), query)),
                None => path.is_match(url.path()),
            },
            None => true,
        }
    }

    /// Parse `url` and test it; unparsable urls never match.
    pub fn matches(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|url| self.is_match(&url))
    }
}

/// Build the match pattern list for a rule: `<all_urls>`, or the cross
/// product of hosts and paths. Hosts ending in `.*` are expanded against
/// `top_level_domains`.
pub fn match_urls(
    scheme: &str,
    hosts: &[String],
    paths: &[String],
    top_level_domains: &[String],
    all_urls: bool,
) -> Vec<String> {
    if all_urls {
        return vec![ALL_URLS.to_string()];
    }

    let scheme = if scheme.is_empty() { "*" } else { scheme };

    let mut expanded_hosts = Vec::new();
    for host in hosts {
        match host.strip_suffix(".*") {
            Some(base) => {
                for tld in top_level_domains {
                    expanded_hosts.push(format!("{}.{}", base, tld));
                }
            }
            None => expanded_hosts.push(host.clone()),
        }
    }
    if expanded_hosts.is_empty() {
        expanded_hosts.push("*".to_string());
    }

    let mut normalized_paths: Vec<String> = paths
        .iter()
        .map(|path| {
            let path = path.trim();
            if path.is_empty() {
                "/*".to_string()
            } else if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            }
        })
        .collect();
    if normalized_paths.is_empty() {
        normalized_paths.push("/*".to_string());
    }

    let mut urls = Vec::with_capacity(expanded_hosts.len() * normalized_paths.len());
    for host in &expanded_hosts {
        for path in &normalized_paths {
            urls.push(format!("{}://{}{}", scheme, host, path));
        }
    }
    urls
}
