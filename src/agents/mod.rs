pub mod critic;
pub mod editor;
pub mod fact_checker;
pub mod researcher;
pub mod writer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use tracing::warn;

use crate::chat::{ChatModel, ChatRequest};
use crate::document::{
    AgentContribution, AgentRole, FactCheckReport, PublishingDocument, ResearchBrief,
};
use crate::error::{Error, Result};
use crate::parse::correction_prompt;
use crate::retry::RetryPolicy;

/// The capability every phase agent implements: build a prompt from the
/// document's artifacts, apply the parsed response back onto the document,
/// and validate the resulting artifact.
pub trait PhaseAgent {
    fn role(&self) -> AgentRole;

    fn temperature(&self) -> f64;

    /// JSON example shown in the correction prompt after a parse failure.
    fn schema_example(&self) -> &'static str;

    fn build_prompt(&self, doc: &PublishingDocument) -> Result<String>;

    fn apply_response(&self, doc: &mut PublishingDocument, raw: &str) -> Result<()>;

    fn validate(&self, doc: &PublishingDocument) -> Result<()>;
}

/// Token counts from one completed agent invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvocationStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub attempts: u32,
}

/// Shared invocation helper: retry with backoff, one correction round after
/// a parse failure, contribution recording. Transport and parse errors are
/// retried; validation errors are not.
pub struct AgentRuntime<'a, C: ChatModel> {
    chat: &'a C,
    policy: RetryPolicy,
    max_tokens: u32,
    cancel: &'a AtomicBool,
}

impl<'a, C: ChatModel> AgentRuntime<'a, C> {
    pub fn new(chat: &'a C, policy: RetryPolicy, max_tokens: u32, cancel: &'a AtomicBool) -> Self {
        Self {
            chat,
            policy,
            max_tokens,
            cancel,
        }
    }

    pub async fn invoke<A: PhaseAgent>(
        &self,
        agent: &A,
        doc: &mut PublishingDocument,
    ) -> Result<InvocationStats> {
        let role = agent.role();
        let prompt = agent.build_prompt(doc)?;
        let started = Instant::now();

        let mut correction: Option<String> = None;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.policy.max_attempts {
            if self.cancel.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let full_prompt = match correction {
                Some(ref c) => format!("{prompt}\n\n{c}"),
                None => prompt.clone(),
            };
            let request = ChatRequest {
                system: None,
                prompt: full_prompt,
                temperature: agent.temperature(),
                max_tokens: self.max_tokens,
            };

            let response = match self.chat.chat(&request).await {
                Ok(r) => r,
                Err(e) if e.is_retryable() => {
                    warn!("[wikismith:agent] {role} attempt {attempt} transport failure: {e}");
                    last_error = Some(e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::Agent {
                        role: role.to_string(),
                        cause: e.to_string(),
                    });
                }
            };

            match agent.apply_response(doc, &response.text) {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    let mut metrics = HashMap::new();
                    metrics.insert("input_tokens".to_string(), response.input_tokens as f64);
                    metrics.insert("output_tokens".to_string(), response.output_tokens as f64);
                    metrics.insert("attempts".to_string(), attempt as f64);
                    doc.record_contribution(AgentContribution {
                        role,
                        timestamp: Utc::now(),
                        input_hash: blake3::hash(prompt.as_bytes()).to_hex().to_string(),
                        output_hash: blake3::hash(response.text.as_bytes()).to_hex().to_string(),
                        processing_ms: elapsed.as_millis() as u64,
                        metrics,
                    });
                    return Ok(InvocationStats {
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        attempts: attempt,
                    });
                }
                Err(e @ Error::Parse(_)) => {
                    warn!("[wikismith:agent] {role} attempt {attempt} parse failure: {e}");
                    correction = Some(correction_prompt(agent.schema_example(), &e.to_string()));
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let cause = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "retries exhausted".to_string());
        Err(Error::Agent {
            role: role.to_string(),
            cause,
        })
    }
}

// ---------------------------------------------------------------------------
// Prompt text rendering shared by agents and the debug artifact
// ---------------------------------------------------------------------------

/// Render a research brief as prompt text.
pub fn brief_to_text(brief: &ResearchBrief) -> String {
    let mut out = String::from("Key facts:\n");
    for fact in &brief.key_facts {
        out.push_str(&format!("* {fact}\n"));
    }
    if !brief.sources.is_empty() {
        out.push_str("Sources:\n");
        for (i, source) in brief.sources.iter().enumerate() {
            out.push_str(&format!("{i}. {} [{:?}]\n", source.text, source.reliability));
        }
    }
    out.push_str("Suggested outline:\n");
    for section in &brief.suggested_outline {
        out.push_str(&format!("* {section}\n"));
    }
    if !brief.glossary.is_empty() {
        out.push_str("Glossary:\n");
        let mut terms: Vec<_> = brief.glossary.iter().collect();
        terms.sort();
        for (term, def) in terms {
            out.push_str(&format!("* {term}: {def}\n"));
        }
    }
    if !brief.uncertain_areas.is_empty() {
        out.push_str("Uncertain areas:\n");
        for area in &brief.uncertain_areas {
            out.push_str(&format!("* {area}\n"));
        }
    }
    out
}

/// Render critic findings as revision feedback for the editor.
pub fn critique_to_text(report: &crate::document::CriticReport) -> String {
    let mut out = String::new();
    for (label, issues) in [
        ("Structure issues", &report.structure_issues),
        ("Syntax issues", &report.syntax_issues),
        ("Style issues", &report.style_issues),
        ("Suggestions", &report.suggestions),
    ] {
        if issues.is_empty() {
            continue;
        }
        out.push_str(&format!("{label}:\n"));
        for issue in issues {
            out.push_str(&format!("* {issue}\n"));
        }
    }
    out
}

/// Render fact-check findings as revision feedback for the writer.
pub fn feedback_to_text(report: &FactCheckReport) -> String {
    let mut out = String::new();
    for (i, claim) in report.questionable_claims.iter().enumerate() {
        out.push_str(&format!("{}. Claim: {}\n   Issue: {}\n", i + 1, claim.claim, claim.issue));
        if let Some(ref suggestion) = claim.suggestion {
            out.push_str(&format!("   Suggestion: {suggestion}\n"));
        }
    }
    if !report.consistency_issues.is_empty() {
        out.push_str("Consistency issues:\n");
        for issue in &report.consistency_issues {
            out.push_str(&format!("* {issue}\n"));
        }
    }
    out
}
