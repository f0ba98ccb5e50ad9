use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::chat::{ChatModel, ChatRequest};
use crate::error::Result;
use crate::output::OutputWriter;
use crate::parse::parse_structured;
use crate::prompts::PromptEngine;
use crate::wiki::{camel_case, normalize_page_name, parse_links};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapKind {
    Definition,
    Redirect,
    FullArticle,
    Ignore,
}

/// A referenced but unresolved wiki page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GapConcept {
    pub name: String,
    pub page_name: String,
    pub kind: GapKind,
    pub referenced_by: Vec<String>,
    #[serde(default)]
    pub redirect_target: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

const URL_SCHEMES: [&str; 4] = ["http://", "https://", "mailto:", "ftp://"];
const DIRECTIVE_PREFIXES: [&str; 5] = ["{SET", "{INSERT", "{ALLOW", "{Image", "{TableOfContents"];
const NAMESPACE_PREFIXES: [&str; 2] = ["Category:", "Wikipedia:"];
const STOPWORDS: [&str; 8] = ["the", "and", "for", "not", "etc", "all", "any", "see"];

fn is_excluded(target: &str) -> bool {
    let trimmed = target.trim();
    if URL_SCHEMES.iter().any(|s| trimmed.starts_with(s)) {
        return true;
    }
    if DIRECTIVE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    if NAMESPACE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    if trimmed.len() <= 2 {
        return true;
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if STOPWORDS.contains(&trimmed.to_lowercase().as_str()) {
        return true;
    }
    false
}

/// Strip diacritics: NFD decomposition with combining marks removed.
fn fold_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

fn digit_subsequence(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn letter_subsequence(s: &str) -> String {
    s.chars().filter(|c| c.is_alphabetic()).collect()
}

/// Fuzzy page-name equivalence: after diacritic folding and
/// non-alphanumeric stripping, the digit subsequences must be equal and the
/// letter subsequences within Levenshtein distance 2.
fn fuzzy_equivalent(a: &str, b: &str) -> bool {
    let a = normalize_page_name(&fold_diacritics(a));
    let b = normalize_page_name(&fold_diacritics(b));
    if digit_subsequence(&a) != digit_subsequence(&b) {
        return false;
    }
    strsim::levenshtein(&letter_subsequence(&a), &letter_subsequence(&b)) <= 2
}

/// Resolve a link target to the canonical existing page, if any: exact
/// normalized equality first, fuzzy equivalence second. Returns `None` when
/// no page matches.
pub fn canonical_page(target: &str, existing: &[String]) -> Option<String> {
    let normalized = normalize_page_name(target);
    existing
        .iter()
        .find(|page| normalize_page_name(page) == normalized)
        .or_else(|| existing.iter().find(|page| fuzzy_equivalent(target, page)))
        .cloned()
}

/// Scans the generated corpus and emits a curated list of gaps.
pub struct GapDetector<'a> {
    output: &'a OutputWriter,
}

impl<'a> GapDetector<'a> {
    pub fn new(output: &'a OutputWriter) -> Self {
        Self { output }
    }

    /// Extract unresolved link targets from every page in the output
    /// directory. Idempotent over an unchanged corpus.
    pub fn scan(&self) -> Result<Vec<GapConcept>> {
        let existing = self.output.discover_existing_pages()?;
        // BTreeMap keyed by normalized name keeps the scan deterministic.
        let mut gaps: BTreeMap<String, GapConcept> = BTreeMap::new();

        for page in &existing {
            let content = std::fs::read_to_string(self.output.page_path(page))
                .map_err(|e| crate::error::Error::Writer(format!("failed to read {page}: {e}")))?;

            for link in parse_links(&content) {
                let target = link.target.trim();
                if is_excluded(target) {
                    continue;
                }

                let canonical = canonical_page(target, &existing);
                let gap = match canonical {
                    Some(ref canonical_name) => {
                        if target == canonical_name.as_str() {
                            continue; // resolves as written
                        }
                        if target != camel_case(target) {
                            GapConcept {
                                name: target.to_string(),
                                page_name: camel_case(target),
                                kind: GapKind::Redirect,
                                referenced_by: vec![page.clone()],
                                redirect_target: Some(canonical_name.clone()),
                                category: None,
                            }
                        } else {
                            // Already CamelCase but only fuzzy-close to an
                            // existing page; leave for the classifier.
                            GapConcept {
                                name: target.to_string(),
                                page_name: target.to_string(),
                                kind: GapKind::Definition,
                                referenced_by: vec![page.clone()],
                                redirect_target: None,
                                category: None,
                            }
                        }
                    }
                    None => GapConcept {
                        name: target.to_string(),
                        page_name: camel_case(target),
                        kind: GapKind::Definition,
                        referenced_by: vec![page.clone()],
                        redirect_target: None,
                        category: None,
                    },
                };

                let key = normalize_page_name(target);
                match gaps.entry(key) {
                    Entry::Occupied(mut entry) => {
                        let existing_gap = entry.get_mut();
                        if !existing_gap.referenced_by.contains(page) {
                            existing_gap.referenced_by.push(page.clone());
                        }
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(gap);
                    }
                }
            }
        }

        let found: Vec<GapConcept> = gaps.into_values().collect();
        info!("[wikismith:gaps] found {} unresolved reference(s)", found.len());
        Ok(found)
    }
}

#[derive(Debug, Deserialize)]
struct ClassifiedGap {
    name: String,
    #[serde(rename = "type")]
    kind: GapKind,
    #[serde(default)]
    redirect_target: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Batches all gaps into one categorization prompt and applies the LM's
/// verdicts. Unknown names in the response are ignored; gaps absent from
/// the response retain their default classification.
pub struct GapClassifier<'a, C: ChatModel> {
    chat: &'a C,
    prompts: &'a PromptEngine,
    universe: String,
    max_tokens: u32,
}

impl<'a, C: ChatModel> GapClassifier<'a, C> {
    pub fn new(chat: &'a C, prompts: &'a PromptEngine, universe: &str, max_tokens: u32) -> Self {
        Self {
            chat,
            prompts,
            universe: universe.to_string(),
            max_tokens,
        }
    }

    pub async fn classify(&self, gaps: &mut [GapConcept]) -> Result<()> {
        if gaps.is_empty() {
            return Ok(());
        }

        let listing = gaps
            .iter()
            .map(|g| format!("* {} (referenced by: {})", g.name, g.referenced_by.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("universe".to_string(), self.universe.clone());
        vars.insert("gaps".to_string(), listing);
        let prompt = self.prompts.render_phase("gap-classifier", &vars)?;

        let response = match self
            .chat
            .chat(&ChatRequest {
                system: None,
                prompt,
                temperature: 0.2,
                max_tokens: self.max_tokens,
            })
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("[wikismith:gaps] classification call failed, keeping defaults: {e}");
                return Ok(());
            }
        };

        let classified: Vec<ClassifiedGap> = match parse_structured(&response.text) {
            Ok(c) => c,
            Err(e) => {
                warn!("[wikismith:gaps] classification unparseable, keeping defaults: {e}");
                return Ok(());
            }
        };

        let mut by_name: HashMap<String, ClassifiedGap> = classified
            .into_iter()
            .map(|c| (normalize_page_name(&c.name), c))
            .collect();

        for gap in gaps.iter_mut() {
            if let Some(verdict) = by_name.remove(&normalize_page_name(&gap.name)) {
                gap.kind = verdict.kind;
                if verdict.redirect_target.is_some() {
                    gap.redirect_target = verdict.redirect_target;
                }
                if verdict.category.is_some() {
                    gap.category = verdict.category;
                }
            }
        }
        Ok(())
    }
}
