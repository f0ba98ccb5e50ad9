pub mod wikidata;
pub mod wikipedia;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::Reliability;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub reliability: Reliability,
}

/// Capability consumed by the researcher and the topic validator.
pub trait SearchProvider {
    fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    fn search_in_domain(&self, query: &str, domain: &str) -> Result<Vec<SearchResult>>;

    fn related_topics(&self, topic: &str) -> Result<Vec<String>>;

    fn topic_summary(&self, topic: &str) -> Result<Option<String>>;

    /// Confidence in [0, 1] that the topic names something real.
    fn validate_topic(&self, topic: &str) -> Result<f64>;

    fn enabled(&self) -> bool;

    fn name(&self) -> &str;
}

/// Fallback provider used when no real provider is enabled.
pub struct NullProvider;

impl SearchProvider for NullProvider {
    fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        Ok(Vec::new())
    }

    fn search_in_domain(&self, _query: &str, _domain: &str) -> Result<Vec<SearchResult>> {
        Ok(Vec::new())
    }

    fn related_topics(&self, _topic: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn topic_summary(&self, _topic: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn validate_topic(&self, _topic: &str) -> Result<f64> {
        Ok(0.0)
    }

    fn enabled(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Name-indexed provider registry built once at startup.
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn SearchProvider>>,
    default_name: String,
}

impl ProviderRegistry {
    pub fn new(default_name: &str) -> Self {
        Self {
            providers: HashMap::new(),
            default_name: default_name.to_string(),
        }
    }

    pub fn register(&mut self, provider: Box<dyn SearchProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Resolve the configured default provider, falling back to the no-op
    /// provider when the default is unknown or disabled.
    pub fn resolve_default(&self) -> &dyn SearchProvider {
        self.resolve(&self.default_name)
    }

    pub fn resolve(&self, name: &str) -> &dyn SearchProvider {
        match self.providers.get(name) {
            Some(p) if p.enabled() => p.as_ref(),
            Some(_) => {
                warn!("[wikismith:search] provider '{name}' is disabled, using no-op");
                &NullProvider
            }
            None => {
                warn!("[wikismith:search] unknown provider '{name}', using no-op");
                &NullProvider
            }
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Assign a reliability ranking from URL heuristics.
pub fn reliability_for_url(url: &str) -> Reliability {
    let lower = url.to_lowercase();

    let official = ["docs.", "documentation.", ".gov", "developer.", "spec.", "rfc-editor.org"];
    if official.iter().any(|h| lower.contains(h)) {
        return Reliability::Official;
    }

    let academic = [".edu", "arxiv.org", "acm.org", "ieee.org", "jstor.org", "nature.com"];
    if academic.iter().any(|h| lower.contains(h)) {
        return Reliability::Academic;
    }

    let authoritative = ["britannica.com", "reuters.com", "apnews.com", "bbc.", "nytimes.com"];
    if authoritative.iter().any(|h| lower.contains(h)) {
        return Reliability::Authoritative;
    }

    let reputable = ["wikipedia.org", "wikidata.org", "github.com", "stackoverflow.com"];
    if reputable.iter().any(|h| lower.contains(h)) {
        return Reliability::Reputable;
    }

    let community = ["reddit.com", "forum.", "discourse.", "news.ycombinator.com", "quora.com"];
    if community.iter().any(|h| lower.contains(h)) {
        return Reliability::Community;
    }

    Reliability::Uncertain
}

// ---------------------------------------------------------------------------
// HTTP plumbing shared by the concrete providers
// ---------------------------------------------------------------------------

/// JSON GET abstraction so provider logic is testable without a network.
pub trait SearchHttp: Send + Sync {
    fn get_json(&self, url: &str) -> Result<serde_json::Value>;
}

pub struct DefaultSearchHttp {
    retry: RetryPolicy,
}

impl DefaultSearchHttp {
    pub fn new() -> Self {
        Self {
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for DefaultSearchHttp {
    fn default() -> Self {
        Self::new()
    }
}

fn is_retryable_status(code: u16) -> bool {
    matches!(code, 429 | 503 | 504)
}

/// Percent-encode a query parameter value.
pub(crate) fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

impl SearchHttp for DefaultSearchHttp {
    fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        for attempt in 1..=self.retry.max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            match ureq::get(url)
                .set("User-Agent", "wikismith/0.1 (wiki publishing pipeline)")
                .call()
            {
                Ok(response) => {
                    return response
                        .into_json()
                        .map_err(|e| Error::Search(format!("failed to parse response: {e}")));
                }
                Err(ureq::Error::Status(code, _))
                    if attempt < self.retry.max_attempts && is_retryable_status(code) =>
                {
                    warn!(attempt, code, "retrying search request");
                }
                Err(ureq::Error::Status(code, _)) => {
                    return Err(Error::Search(format!("search request failed: HTTP {code}")));
                }
                Err(ref e) if attempt < self.retry.max_attempts => {
                    warn!(attempt, error = %e, "retrying search request after transport error");
                }
                Err(e) => {
                    return Err(Error::Search(format!("search request failed: {e}")));
                }
            }
        }
        unreachable!()
    }
}
