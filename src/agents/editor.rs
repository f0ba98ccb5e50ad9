use std::collections::HashMap;

use crate::document::{AgentRole, FinalArticle, PublishingDocument};
use crate::error::{Error, Result};
use crate::parse::parse_structured;
use crate::prompts::PromptEngine;
use crate::wiki::normalize_markup;

use super::{critique_to_text, feedback_to_text, PhaseAgent};

pub struct Editor<'a> {
    prompts: &'a PromptEngine,
    existing_pages: &'a [String],
    temperature: f64,
    min_score: f64,
}

impl<'a> Editor<'a> {
    pub fn new(
        prompts: &'a PromptEngine,
        existing_pages: &'a [String],
        temperature: f64,
        min_score: f64,
    ) -> Self {
        Self {
            prompts,
            existing_pages,
            temperature,
            min_score,
        }
    }
}

impl PhaseAgent for Editor<'_> {
    fn role(&self) -> AgentRole {
        AgentRole::Editor
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn schema_example(&self) -> &'static str {
        r#"{"wiki_content": "!!Heading\ntext", "metadata": {}, "edit_summary": "tightened prose", "quality_score": 0.9, "added_links": []}"#
    }

    fn build_prompt(&self, doc: &PublishingDocument) -> Result<String> {
        let draft = doc
            .draft
            .as_ref()
            .ok_or_else(|| Error::Validation("editor requires a draft".to_string()))?;

        let fact_check_notes = doc
            .fact_check_report
            .as_ref()
            .map(feedback_to_text)
            .unwrap_or_default();

        // On a critique revision pass the critic's report is present.
        let review_notes = doc
            .critic_report
            .as_ref()
            .map(critique_to_text)
            .unwrap_or_default();

        let mut vars = HashMap::new();
        vars.insert("draft".to_string(), draft.wiki_content.clone());
        vars.insert("fact_check_notes".to_string(), fact_check_notes);
        vars.insert("review_notes".to_string(), review_notes);
        vars.insert("existing_pages".to_string(), self.existing_pages.join(", "));
        self.prompts.render_phase("editor", &vars)
    }

    fn apply_response(&self, doc: &mut PublishingDocument, raw: &str) -> Result<()> {
        let mut article: FinalArticle = parse_structured(raw)?;
        article.wiki_content = normalize_markup(&article.wiki_content);
        doc.final_article = Some(article);
        Ok(())
    }

    fn validate(&self, doc: &PublishingDocument) -> Result<()> {
        let article = doc
            .final_article
            .as_ref()
            .ok_or_else(|| Error::Validation("final article missing".to_string()))?;
        if article.wiki_content.trim().is_empty() {
            return Err(Error::Validation("final article content is blank".to_string()));
        }
        if !(0.0..=1.0).contains(&article.quality_score) {
            return Err(Error::Validation(format!(
                "quality score out of range: {}",
                article.quality_score
            )));
        }
        if article.quality_score < self.min_score {
            return Err(Error::Quality {
                score: article.quality_score,
                minimum: self.min_score,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ArticleDraft, TopicBrief};

    fn doc() -> PublishingDocument {
        let mut d = PublishingDocument::new(&TopicBrief::new("Compound Interest", "students", 300));
        d.draft = Some(ArticleDraft {
            wiki_content: "!!Overview\nInterest on interest.".into(),
            summary: "s".into(),
            ..Default::default()
        });
        d
    }

    fn article(score: f64) -> FinalArticle {
        FinalArticle {
            wiki_content: "!!Overview\nPolished.".into(),
            edit_summary: "polish".into(),
            quality_score: score,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_prompt_embeds_draft_and_pages() {
        let prompts = PromptEngine::new(None);
        let pages = vec!["Investing".to_string()];
        let agent = Editor::new(&prompts, &pages, 0.3, 0.7);
        let prompt = agent.build_prompt(&doc()).unwrap();
        assert!(prompt.contains("Interest on interest."));
        assert!(prompt.contains("Investing"));
        assert!(!prompt.contains("Fact-check findings"));
    }

    #[test]
    fn test_build_prompt_with_fact_check_notes() {
        use crate::document::{Confidence, FactCheckReport, QuestionableClaim, ReviewAction};
        let prompts = PromptEngine::new(None);
        let agent = Editor::new(&prompts, &[], 0.3, 0.7);
        let mut d = doc();
        d.fact_check_report = Some(FactCheckReport {
            annotated_content: String::new(),
            verified_claims: vec![],
            questionable_claims: vec![QuestionableClaim {
                claim: "x".into(),
                issue: "y".into(),
                suggestion: None,
            }],
            consistency_issues: vec![],
            overall_confidence: Confidence::Low,
            recommended_action: ReviewAction::Approve,
        });
        let prompt = agent.build_prompt(&d).unwrap();
        assert!(prompt.contains("Fact-check findings"));
        assert!(prompt.contains("1. Claim: x"));
    }

    #[test]
    fn test_build_prompt_with_critic_review_notes() {
        use crate::document::{CriticReport, ReviewAction};
        let prompts = PromptEngine::new(None);
        let agent = Editor::new(&prompts, &[], 0.3, 0.7);
        let mut d = doc();
        d.critic_report = Some(CriticReport {
            overall: 0.6,
            structure: 0.6,
            syntax: 0.5,
            style: 0.7,
            structure_issues: vec![],
            syntax_issues: vec!["markdown heading used".into()],
            style_issues: vec![],
            suggestions: vec![],
            recommended_action: ReviewAction::Revise,
        });
        let prompt = agent.build_prompt(&d).unwrap();
        assert!(prompt.contains("A critic reviewed your previous edit"));
        assert!(prompt.contains("markdown heading used"));
    }

    #[test]
    fn test_validate_quality_below_minimum() {
        let prompts = PromptEngine::new(None);
        let agent = Editor::new(&prompts, &[], 0.3, 0.9);
        let mut d = doc();
        d.final_article = Some(article(0.75));
        let err = agent.validate(&d).unwrap_err();
        match err {
            Error::Quality { score, minimum } => {
                assert_eq!(score, 0.75);
                assert_eq!(minimum, 0.9);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("Quality score"));
    }

    #[test]
    fn test_validate_quality_at_minimum_passes() {
        let prompts = PromptEngine::new(None);
        let agent = Editor::new(&prompts, &[], 0.3, 0.9);
        let mut d = doc();
        d.final_article = Some(article(0.9));
        assert!(agent.validate(&d).is_ok());
    }

    #[test]
    fn test_validate_score_out_of_range() {
        let prompts = PromptEngine::new(None);
        let agent = Editor::new(&prompts, &[], 0.3, 0.5);
        let mut d = doc();
        d.final_article = Some(article(1.4));
        let err = agent.validate(&d).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_apply_response_normalizes_markup() {
        let prompts = PromptEngine::new(None);
        let agent = Editor::new(&prompts, &[], 0.3, 0.7);
        let mut d = doc();
        agent
            .apply_response(
                &mut d,
                "{\"wiki_content\": \"## Overview\\ntext\", \"edit_summary\": \"e\", \"quality_score\": 0.8}",
            )
            .unwrap();
        assert_eq!(d.final_article.unwrap().wiki_content, "!!Overview\ntext");
    }

    #[test]
    fn test_schema_example_is_valid() {
        let prompts = PromptEngine::new(None);
        let agent = Editor::new(&prompts, &[], 0.3, 0.7);
        assert!(serde_json::from_str::<FinalArticle>(agent.schema_example()).is_ok());
    }
}
