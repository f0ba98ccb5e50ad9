use tracing::warn;

use crate::document::Reliability;
use crate::error::Result;
use crate::wiki::normalize_page_name;

use super::{urlencode, DefaultSearchHttp, SearchHttp, SearchProvider, SearchResult};

const API_URL: &str = "https://en.wikipedia.org/w/api.php";
const SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

/// Full-text search over Wikipedia's MediaWiki API.
pub struct WikipediaProvider {
    http: Box<dyn SearchHttp>,
    max_results: usize,
    enabled: bool,
}

impl WikipediaProvider {
    pub fn new(max_results: usize, enabled: bool) -> Self {
        Self {
            http: Box::new(DefaultSearchHttp::new()),
            max_results,
            enabled,
        }
    }

    #[cfg(test)]
    pub fn with_http(http: Box<dyn SearchHttp>, max_results: usize) -> Self {
        Self {
            http,
            max_results,
            enabled: true,
        }
    }

    fn query_search(&self, srsearch: &str) -> Result<Vec<SearchResult>> {
        let url = format!(
            "{API_URL}?action=query&list=search&format=json&srlimit={}&srsearch={}",
            self.max_results,
            urlencode(srsearch)
        );
        let json = match self.http.get_json(&url) {
            Ok(json) => json,
            Err(e) => {
                // Exhausted retries degrade to an empty result set.
                warn!("[wikismith:search] wikipedia search failed: {e}");
                return Ok(Vec::new());
            }
        };

        let hits = json["query"]["search"].as_array().cloned().unwrap_or_default();
        Ok(hits
            .iter()
            .filter_map(|hit| {
                let title = hit["title"].as_str()?.to_string();
                let url = format!(
                    "https://en.wikipedia.org/wiki/{}",
                    title.replace(' ', "_")
                );
                Some(SearchResult {
                    title,
                    snippet: strip_html(hit["snippet"].as_str().unwrap_or_default()),
                    reliability: Reliability::Reputable,
                    url,
                })
            })
            .collect())
    }
}

impl SearchProvider for WikipediaProvider {
    fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.query_search(query)
    }

    fn search_in_domain(&self, query: &str, domain: &str) -> Result<Vec<SearchResult>> {
        self.query_search(&format!("{query} {domain}"))
    }

    fn related_topics(&self, topic: &str) -> Result<Vec<String>> {
        let results = self.query_search(&format!("morelike:{topic}"))?;
        Ok(results.into_iter().map(|r| r.title).collect())
    }

    fn topic_summary(&self, topic: &str) -> Result<Option<String>> {
        let url = format!("{SUMMARY_URL}/{}", urlencode(&topic.replace(' ', "_")));
        match self.http.get_json(&url) {
            Ok(json) => Ok(json["extract"].as_str().map(str::to_string)),
            Err(e) => {
                warn!("[wikismith:search] wikipedia summary failed: {e}");
                Ok(None)
            }
        }
    }

    fn validate_topic(&self, topic: &str) -> Result<f64> {
        if topic.trim().is_empty() {
            return Ok(0.0);
        }
        let results = self.query_search(topic)?;
        if results.is_empty() {
            return Ok(0.0);
        }
        let normalized = normalize_page_name(topic);
        for result in &results {
            let title = normalize_page_name(&result.title);
            if title == normalized {
                return Ok(1.0);
            }
            if title.contains(&normalized) || normalized.contains(&title) {
                return Ok(0.85);
            }
        }
        Ok(0.5)
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "wikipedia"
    }
}

/// MediaWiki snippets embed `<span class="searchmatch">` markers.
fn strip_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
