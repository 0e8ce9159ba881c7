use std::collections::HashMap;

use crate::oauth::percent_encode;

/// Query parameters for a single request.
///
/// Built fresh by every endpoint method and handed to dispatch by
/// reference; parameters never survive from one call to the next.
#[derive(Debug, Clone, Default)]
pub(crate) struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Params::default()
    }

    /// Add a parameter. Pushing a key twice replaces the earlier value, so
    /// a query string never carries duplicate keys.
    pub fn push(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// The pairs with both sides percent-encoded, for signing.
    pub fn encoded(&self) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .map(|(k, v)| {
                (
                    percent_encode(k).to_string(),
                    percent_encode(v).to_string(),
                )
            })
            .collect()
    }

    /// The assembled query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        self.encoded()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<String>>()
            .join("&")
    }
}

/// Decode an `application/x-www-form-urlencoded` body, as returned by the
/// two OAuth endpoints.
pub(crate) fn parse_form(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect()
}
