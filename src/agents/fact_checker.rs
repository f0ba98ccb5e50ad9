use std::collections::HashMap;

use crate::document::{AgentRole, FactCheckReport, PublishingDocument};
use crate::error::{Error, Result};
use crate::parse::parse_structured;
use crate::prompts::PromptEngine;

use super::{brief_to_text, PhaseAgent};

pub struct FactChecker<'a> {
    prompts: &'a PromptEngine,
    temperature: f64,
}

impl<'a> FactChecker<'a> {
    pub fn new(prompts: &'a PromptEngine, temperature: f64) -> Self {
        Self {
            prompts,
            temperature,
        }
    }
}

impl PhaseAgent for FactChecker<'_> {
    fn role(&self) -> AgentRole {
        AgentRole::FactChecker
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn schema_example(&self) -> &'static str {
        r#"{"annotated_content": "text", "verified_claims": [{"claim": "c", "status": "supported", "source_index": 0}], "questionable_claims": [], "consistency_issues": [], "overall_confidence": "HIGH", "recommended_action": "APPROVE"}"#
    }

    fn build_prompt(&self, doc: &PublishingDocument) -> Result<String> {
        let draft = doc
            .draft
            .as_ref()
            .ok_or_else(|| Error::Validation("fact checker requires a draft".to_string()))?;
        let research = doc
            .research_brief
            .as_ref()
            .ok_or_else(|| Error::Validation("fact checker requires a research brief".to_string()))?;

        let mut vars = HashMap::new();
        vars.insert("draft".to_string(), draft.wiki_content.clone());
        vars.insert("research_brief".to_string(), brief_to_text(research));
        self.prompts.render_phase("fact-checker", &vars)
    }

    fn apply_response(&self, doc: &mut PublishingDocument, raw: &str) -> Result<()> {
        let report: FactCheckReport = parse_structured(raw)?;
        doc.fact_check_report = Some(report);
        Ok(())
    }

    /// The report may only question claims the draft actually makes.
    fn validate(&self, doc: &PublishingDocument) -> Result<()> {
        let report = doc
            .fact_check_report
            .as_ref()
            .ok_or_else(|| Error::Validation("fact-check report missing".to_string()))?;
        let draft_content = doc
            .draft
            .as_ref()
            .map(|d| d.wiki_content.to_lowercase())
            .unwrap_or_default();

        for claim in &report.questionable_claims {
            if !draft_content.contains(&claim.claim.to_lowercase()) {
                return Err(Error::Validation(format!(
                    "questionable claim not found in draft: {}",
                    claim.claim
                )));
            }
        }
        Ok(())
    }
}
