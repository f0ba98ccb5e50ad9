use std::collections::HashMap;

use chrono::Utc;

use crate::document::{AgentRole, CriticReport, PublishingDocument, QualityAssessment};
use crate::error::{Error, Result};
use crate::parse::parse_structured;
use crate::prompts::PromptEngine;

use super::PhaseAgent;

pub struct Critic<'a> {
    prompts: &'a PromptEngine,
    temperature: f64,
}

impl<'a> Critic<'a> {
    pub fn new(prompts: &'a PromptEngine, temperature: f64) -> Self {
        Self {
            prompts,
            temperature,
        }
    }
}

impl PhaseAgent for Critic<'_> {
    fn role(&self) -> AgentRole {
        AgentRole::Critic
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn schema_example(&self) -> &'static str {
        r#"{"overall": 0.9, "structure": 0.9, "syntax": 0.9, "style": 0.9, "structure_issues": [], "syntax_issues": [], "style_issues": [], "suggestions": [], "recommended_action": "APPROVE"}"#
    }

    fn build_prompt(&self, doc: &PublishingDocument) -> Result<String> {
        let article = doc
            .final_article
            .as_ref()
            .ok_or_else(|| Error::Validation("critic requires a final article".to_string()))?;

        let mut vars = HashMap::new();
        vars.insert("article".to_string(), article.wiki_content.clone());
        self.prompts.render_phase("critic", &vars)
    }

    fn apply_response(&self, doc: &mut PublishingDocument, raw: &str) -> Result<()> {
        let report: CriticReport = parse_structured(raw)?;
        doc.quality_assessment = Some(QualityAssessment {
            overall: report.overall,
            assessed_at: Utc::now(),
        });
        doc.critic_report = Some(report);
        Ok(())
    }

    fn validate(&self, doc: &PublishingDocument) -> Result<()> {
        let report = doc
            .critic_report
            .as_ref()
            .ok_or_else(|| Error::Validation("critic report missing".to_string()))?;
        for (axis, score) in [
            ("overall", report.overall),
            ("structure", report.structure),
            ("syntax", report.syntax),
            ("style", report.style),
        ] {
            if !(0.0..=1.0).contains(&score) {
                return Err(Error::Validation(format!(
                    "critic {axis} score out of range: {score}"
                )));
            }
        }
        Ok(())
    }
}
