use super::UrlParser;

/// Find the raw value of `key` in a query string (without the leading `?`).
///
/// A key without a value (`?flag&x=1`) yields `Some("")`.
pub fn query_param<'q>(query: &'q str, key: &str) -> Option<&'q str> {
    query
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

/// Single-key query access on top of a [`UrlParser`].
///
/// The query is read once into a working buffer; every `set` rewrites the
/// buffer and writes it back into the url.
#[derive(Debug)]
pub struct QueryParser<'u> {
    url: &'u mut UrlParser,
    query: String,
}

impl<'u> QueryParser<'u> {
    pub fn new(url: &'u mut UrlParser) -> Self {
        let query = url.query().to_string();
        Self { url, query }
    }

    /// Raw value of the first occurrence of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        query_param(&self.query, key)
    }

    /// Set the first occurrence of `key` to `value`, or append `key=value`
    /// when the key is absent. Other pairs are left as they are.
    pub fn set(&mut self, key: &str, value: &str) {
        let mut replaced = false;
        let mut pairs: Vec<String> = Vec::new();
        if !self.query.is_empty() {
            for pair in self.query.split('&') {
                let name = pair.split_once('=').map_or(pair, |(k, _)| k);
                if !replaced && name == key {
                    pairs.push(format!("{}={}", key, value));
                    replaced = true;
                } else {
                    pairs.push(pair.to_string());
                }
            }
        }
        if !replaced {
            pairs.push(format!("{}={}", key, value));
        }
        self.query = pairs.join("&");
        self.url.set_search(&self.query);
    }

    /// Current query buffer without the leading `?`
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl UrlParser {
    /// Single-key access to this url's query
    pub fn query_parser(&mut self) -> QueryParser<'_> {
        QueryParser::new(self)
    }
}
