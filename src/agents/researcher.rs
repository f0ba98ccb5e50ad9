use std::collections::HashMap;

use tracing::warn;

use crate::document::{AgentRole, PublishingDocument, ResearchBrief, TopicBrief};
use crate::error::{Error, Result};
use crate::parse::parse_structured;
use crate::prompts::PromptEngine;
use crate::search::SearchProvider;

use super::PhaseAgent;

pub struct Researcher<'a> {
    prompts: &'a PromptEngine,
    brief: &'a TopicBrief,
    temperature: f64,
    search_context: String,
}

impl<'a> Researcher<'a> {
    pub fn new(
        prompts: &'a PromptEngine,
        brief: &'a TopicBrief,
        temperature: f64,
        search_context: String,
    ) -> Self {
        Self {
            prompts,
            brief,
            temperature,
            search_context,
        }
    }
}

/// Assemble the researcher's optional domain context from the search
/// provider: topic summary first, then ranked results with reliability tags.
/// Provider failures degrade to an empty context.
pub fn build_search_context(provider: &dyn SearchProvider, topic: &str) -> String {
    if !provider.enabled() {
        return String::new();
    }

    let mut out = String::new();
    match provider.topic_summary(topic) {
        Ok(Some(summary)) => {
            out.push_str(&format!("Summary: {summary}\n\n"));
        }
        Ok(None) => {}
        Err(e) => warn!("[wikismith:research] topic summary failed: {e}"),
    }
    match provider.search(topic) {
        Ok(results) => {
            for result in results {
                out.push_str(&format!(
                    "* [{:?}] {} — {} ({})\n",
                    result.reliability, result.title, result.snippet, result.url
                ));
            }
        }
        Err(e) => warn!("[wikismith:research] search failed: {e}"),
    }
    out
}

impl PhaseAgent for Researcher<'_> {
    fn role(&self) -> AgentRole {
        AgentRole::Researcher
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn schema_example(&self) -> &'static str {
        r#"{"key_facts": ["fact"], "sources": [{"text": "source", "reliability": "REPUTABLE"}], "suggested_outline": ["Overview"], "related_page_suggestions": [], "glossary": {}, "uncertain_areas": []}"#
    }

    fn build_prompt(&self, _doc: &PublishingDocument) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), self.brief.topic.clone());
        vars.insert("audience".to_string(), self.brief.audience.clone());
        vars.insert(
            "target_word_count".to_string(),
            self.brief.target_word_count.to_string(),
        );
        vars.insert(
            "required_sections".to_string(),
            self.brief.required_sections.join(", "),
        );
        vars.insert("search_context".to_string(), self.search_context.clone());
        self.prompts.render_phase("researcher", &vars)
    }

    fn apply_response(&self, doc: &mut PublishingDocument, raw: &str) -> Result<()> {
        let brief: ResearchBrief = parse_structured(raw)?;
        doc.research_brief = Some(brief);
        Ok(())
    }

    fn validate(&self, doc: &PublishingDocument) -> Result<()> {
        match doc.research_brief {
            Some(ref brief) if brief.is_valid() => Ok(()),
            Some(_) => Err(Error::Validation(
                "research brief requires at least one key fact and one outline entry".to_string(),
            )),
            None => Err(Error::Validation("research brief missing".to_string())),
        }
    }
}
