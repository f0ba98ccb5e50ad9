use tracing::warn;

use crate::error::Result;
use crate::wiki::normalize_page_name;

use super::{reliability_for_url, DefaultSearchHttp, SearchHttp, SearchProvider, SearchResult};

const API_URL: &str = "https://www.wikidata.org/w/api.php";

/// Entity search over Wikidata's `wbsearchentities` API. This is the
/// provider backing topic validation.
pub struct WikidataProvider {
    http: Box<dyn SearchHttp>,
    max_results: usize,
    enabled: bool,
}

impl WikidataProvider {
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

    fn entity_search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = format!(
            "{API_URL}?action=wbsearchentities&language=en&uselang=en&format=json&limit={}&search={}",
            self.max_results,
            super::urlencode(query)
        );
        let json = match self.http.get_json(&url) {
            Ok(json) => json,
            Err(e) => {
                warn!("[wikismith:search] wikidata search failed: {e}");
                return Ok(Vec::new());
            }
        };

        let hits = json["search"].as_array().cloned().unwrap_or_default();
        Ok(hits
            .iter()
            .filter_map(|hit| {
                let label = hit["label"].as_str()?.to_string();
                let url = hit["concepturi"].as_str().unwrap_or_default().to_string();
                Some(SearchResult {
                    title: label,
                    snippet: hit["description"].as_str().unwrap_or_default().to_string(),
                    reliability: reliability_for_url(&url),
                    url,
                })
            })
            .collect())
    }
}

/// Words that carry meaning for entity matching.
fn significant_words(topic: &str) -> Vec<String> {
    topic
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
        .map(str::to_lowercase)
        .collect()
}

fn label_overlap(topic_words: &[String], label: &str) -> f64 {
    if topic_words.is_empty() {
        return 0.0;
    }
    let label_words = significant_words(label);
    let matched = topic_words
        .iter()
        .filter(|w| label_words.contains(*w))
        .count();
    matched as f64 / topic_words.len() as f64
}

impl SearchProvider for WikidataProvider {
    fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.entity_search(query)
    }

    fn search_in_domain(&self, query: &str, domain: &str) -> Result<Vec<SearchResult>> {
        self.entity_search(&format!("{query} {domain}"))
    }

    fn related_topics(&self, topic: &str) -> Result<Vec<String>> {
        let normalized = normalize_page_name(topic);
        Ok(self
            .entity_search(topic)?
            .into_iter()
            .map(|r| r.title)
            .filter(|label| normalize_page_name(label) != normalized)
            .collect())
    }

    fn topic_summary(&self, topic: &str) -> Result<Option<String>> {
        Ok(self
            .entity_search(topic)?
            .into_iter()
            .next()
            .map(|r| r.snippet)
            .filter(|s| !s.is_empty()))
    }

    /// Banded confidence heuristic:
    /// exact normalized label 1.0; containment 0.85; single-word partial
    /// overlap 0.5–0.85; multi-word composite overlap 0.6–0.8; per-word
    /// entity matches 0.35–0.6 by match ratio; otherwise 0.0.
    fn validate_topic(&self, topic: &str) -> Result<f64> {
        if topic.trim().is_empty() {
            return Ok(0.0);
        }

        let results = self.entity_search(topic)?;
        let normalized = normalize_page_name(topic);
        let topic_words = significant_words(topic);

        if !results.is_empty() {
            for result in &results {
                if normalize_page_name(&result.title) == normalized {
                    return Ok(1.0);
                }
            }
            for result in &results {
                let label = normalize_page_name(&result.title);
                if !label.is_empty() && (label.contains(&normalized) || normalized.contains(&label))
                {
                    return Ok(0.85);
                }
            }

            let best = results
                .iter()
                .map(|r| label_overlap(&topic_words, &r.title))
                .fold(0.0f64, f64::max);
            if best > 0.0 {
                return if topic_words.len() > 1 {
                    Ok(0.6 + 0.2 * best)
                } else {
                    Ok(0.5 + 0.35 * best)
                };
            }
        }

        // No direct match: probe each significant word on its own.
        if topic_words.len() > 1 {
            let matched = topic_words
                .iter()
                .filter(|w| {
                    self.entity_search(w)
                        .map(|r| !r.is_empty())
                        .unwrap_or(false)
                })
                .count();
            if matched > 0 {
                let ratio = matched as f64 / topic_words.len() as f64;
                return Ok(0.35 + 0.25 * ratio);
            }
        }

        Ok(0.0)
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "wikidata"
    }
}
