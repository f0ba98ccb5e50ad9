use std::collections::HashMap;

use crate::config::LinkPolicy;
use crate::document::{AgentRole, ArticleDraft, PublishingDocument, TopicBrief};
use crate::error::{Error, Result};
use crate::parse::parse_structured;
use crate::prompts::PromptEngine;
use crate::wiki::{normalize_markup, parse_links};

use super::{brief_to_text, feedback_to_text, PhaseAgent};

pub struct Writer<'a> {
    prompts: &'a PromptEngine,
    brief: &'a TopicBrief,
    existing_pages: &'a [String],
    temperature: f64,
    links: LinkPolicy,
}

impl<'a> Writer<'a> {
    pub fn new(
        prompts: &'a PromptEngine,
        brief: &'a TopicBrief,
        existing_pages: &'a [String],
        temperature: f64,
        links: LinkPolicy,
    ) -> Self {
        Self {
            prompts,
            brief,
            existing_pages,
            temperature,
            links,
        }
    }
}

/// Internal page links in content: link tokens that are neither directives
/// nor external URLs.
fn internal_link_count(content: &str) -> usize {
    parse_links(content)
        .iter()
        .filter(|link| {
            !link.target.starts_with('{')
                && !link.target.contains("://")
                && !link.target.starts_with("mailto:")
        })
        .count()
}

impl PhaseAgent for Writer<'_> {
    fn role(&self) -> AgentRole {
        AgentRole::Writer
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn schema_example(&self) -> &'static str {
        r#"{"wiki_content": "!!Heading\ntext", "summary": "abstract", "internal_links": ["PageName"], "categories": [], "metadata": {}}"#
    }

    fn build_prompt(&self, doc: &PublishingDocument) -> Result<String> {
        let research = doc
            .research_brief
            .as_ref()
            .ok_or_else(|| Error::Validation("writer requires a research brief".to_string()))?;

        // On a revision pass the previous fact-check report is present;
        // its findings go back into the writer's context.
        let revision_feedback = doc
            .fact_check_report
            .as_ref()
            .map(feedback_to_text)
            .unwrap_or_default();

        let mut vars = HashMap::new();
        vars.insert("page_name".to_string(), doc.page_name.clone());
        vars.insert("audience".to_string(), self.brief.audience.clone());
        vars.insert(
            "target_word_count".to_string(),
            self.brief.target_word_count.to_string(),
        );
        vars.insert("research_brief".to_string(), brief_to_text(research));
        vars.insert("existing_pages".to_string(), self.existing_pages.join(", "));
        vars.insert("revision_feedback".to_string(), revision_feedback);
        vars.insert("min_links".to_string(), self.links.min_per_article.to_string());
        vars.insert("max_links".to_string(), self.links.max_per_article.to_string());
        self.prompts.render_phase("writer", &vars)
    }

    fn apply_response(&self, doc: &mut PublishingDocument, raw: &str) -> Result<()> {
        let mut draft: ArticleDraft = parse_structured(raw)?;
        draft.wiki_content = normalize_markup(&draft.wiki_content);
        doc.draft = Some(draft);
        Ok(())
    }

    fn validate(&self, doc: &PublishingDocument) -> Result<()> {
        let draft = match doc.draft {
            Some(ref draft) if draft.is_valid() => draft,
            Some(_) => {
                return Err(Error::Validation(
                    "draft requires non-blank content and summary".to_string(),
                ));
            }
            None => return Err(Error::Validation("draft missing".to_string())),
        };
        let link_count = internal_link_count(&draft.wiki_content);
        if link_count < self.links.min_per_article || link_count > self.links.max_per_article {
            return Err(Error::Validation(format!(
                "draft has {link_count} internal links, outside [{}, {}]",
                self.links.min_per_article, self.links.max_per_article
            )));
        }
        Ok(())
    }
}
