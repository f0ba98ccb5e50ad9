use std::fmt;

use tracing::info;

use crate::config::ApprovalMask;
use crate::document::PublishingDocument;
use crate::error::Result;

/// One gate per pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalGate {
    AfterResearch,
    AfterDraft,
    AfterFactCheck,
    AfterEdit,
    BeforePublish,
}

impl fmt::Display for ApprovalGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalGate::AfterResearch => "after-research",
            ApprovalGate::AfterDraft => "after-draft",
            ApprovalGate::AfterFactCheck => "after-factcheck",
            ApprovalGate::AfterEdit => "after-edit",
            ApprovalGate::BeforePublish => "before-publish",
        };
        write!(f, "{name}")
    }
}

/// What the decision capability sees when a gate fires.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub gate: ApprovalGate,
    pub document_id: String,
    pub page_name: String,
    /// Short human-readable description of the artifact awaiting approval.
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    RequestChanges,
    Reject,
}

#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub verdict: Verdict,
    pub reason: String,
}

/// Pluggable decision capability. May block arbitrarily; the orchestrator
/// holds no non-idempotent resources across this call.
pub trait ApprovalDecider {
    fn decide(&self, request: &ApprovalRequest) -> Result<ApprovalDecision>;
}

/// Default decider: approves everything.
pub struct AutoApprove;

impl ApprovalDecider for AutoApprove {
    fn decide(&self, _request: &ApprovalRequest) -> Result<ApprovalDecision> {
        Ok(ApprovalDecision {
            verdict: Verdict::Approve,
            reason: "auto-approved".to_string(),
        })
    }
}

/// Tagged gate outcome — callers must handle all three arms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    ChangesRequested { gate: String, reason: String },
    Rejected { gate: String, reason: String },
}

/// Suspends the pipeline between phases and consults the decider for gates
/// whose mask flag is set; masked-off gates auto-approve silently.
pub struct ApprovalService {
    mask: ApprovalMask,
    decider: Box<dyn ApprovalDecider>,
}

impl ApprovalService {
    pub fn new(mask: ApprovalMask, decider: Box<dyn ApprovalDecider>) -> Self {
        Self { mask, decider }
    }

    /// Service with all gates auto-approving.
    pub fn auto() -> Self {
        Self::new(ApprovalMask::default(), Box::new(AutoApprove))
    }

    /// Whether this gate will consult the decision capability (the
    /// orchestrator suspends the document only for these).
    pub fn requires_decision(&self, gate: ApprovalGate) -> bool {
        self.gate_enabled(gate)
    }

    fn gate_enabled(&self, gate: ApprovalGate) -> bool {
        match gate {
            ApprovalGate::AfterResearch => self.mask.after_research,
            ApprovalGate::AfterDraft => self.mask.after_draft,
            ApprovalGate::AfterFactCheck => self.mask.after_factcheck,
            ApprovalGate::AfterEdit => self.mask.after_edit,
            ApprovalGate::BeforePublish => self.mask.before_publish,
        }
    }

    pub fn check(&self, gate: ApprovalGate, doc: &PublishingDocument) -> Result<ApprovalOutcome> {
        if !self.gate_enabled(gate) {
            return Ok(ApprovalOutcome::Approved);
        }

        let request = ApprovalRequest {
            gate,
            document_id: doc.id.clone(),
            page_name: doc.page_name.clone(),
            summary: gate_summary(gate, doc),
        };

        info!("[wikismith:approval] consulting decider at {gate} for {}", doc.page_name);
        let decision = self.decider.decide(&request)?;
        match decision.verdict {
            Verdict::Approve => Ok(ApprovalOutcome::Approved),
            Verdict::RequestChanges => Ok(ApprovalOutcome::ChangesRequested {
                gate: gate.to_string(),
                reason: decision.reason,
            }),
            Verdict::Reject => Ok(ApprovalOutcome::Rejected {
                gate: gate.to_string(),
                reason: decision.reason,
            }),
        }
    }
}

fn gate_summary(gate: ApprovalGate, doc: &PublishingDocument) -> String {
    match gate {
        ApprovalGate::AfterResearch => doc
            .research_brief
            .as_ref()
            .map(|b| format!("{} key facts, outline: {}", b.key_facts.len(), b.suggested_outline.join(" / ")))
            .unwrap_or_default(),
        ApprovalGate::AfterDraft => doc
            .draft
            .as_ref()
            .map(|d| d.summary.clone())
            .unwrap_or_default(),
        ApprovalGate::AfterFactCheck => doc
            .fact_check_report
            .as_ref()
            .map(|r| {
                format!(
                    "{} verified, {} questionable, confidence {:?}",
                    r.verified_claims.len(),
                    r.questionable_claims.len(),
                    r.overall_confidence
                )
            })
            .unwrap_or_default(),
        ApprovalGate::AfterEdit | ApprovalGate::BeforePublish => doc
            .final_article
            .as_ref()
            .map(|a| a.edit_summary.clone())
            .unwrap_or_default(),
    }
}
