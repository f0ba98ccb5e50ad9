use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::agents::researcher::{build_search_context, Researcher};
use crate::agents::writer::Writer;
use crate::agents::{AgentRuntime, PhaseAgent};
use crate::agents::{critic::Critic, editor::Editor, fact_checker::FactChecker};
use crate::approval::{ApprovalGate, ApprovalOutcome, ApprovalService};
use crate::chat::ChatModel;
use crate::config::Config;
use crate::document::{
    CriticReport, DocumentState, FactCheckReport, PublishingDocument, ReviewAction, TopicBrief,
};
use crate::error::Error;
use crate::monitor::Monitor;
use crate::output::OutputWriter;
use crate::prompts::PromptEngine;
use crate::repository::DocumentRepository;
use crate::retry::RetryPolicy;
use crate::search::SearchProvider;

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineResult {
    pub success: bool,
    pub document: PublishingDocument,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
    pub failed_at_state: Option<DocumentState>,
    pub failed_document_path: Option<PathBuf>,
    pub total_time: Duration,
}

/// A phase failure carries the state it occurred at so operators can rerun
/// surgically.
struct PhaseFailure {
    state: DocumentState,
    error: Error,
}

type PhaseResult<T> = std::result::Result<T, PhaseFailure>;

fn fail<T>(state: DocumentState, error: Error) -> PhaseResult<T> {
    Err(PhaseFailure { state, error })
}

/// Drives one document through the phase sequence, enforcing transitions,
/// approval gates, and bounded revision loops.
pub struct PipelineOrchestrator<'a, C: ChatModel> {
    chat: &'a C,
    prompts: &'a PromptEngine,
    config: &'a Config,
    approval: &'a ApprovalService,
    monitor: &'a Monitor,
    output: &'a OutputWriter,
    search: &'a dyn SearchProvider,
    repository: Option<&'a DocumentRepository>,
    cancel: Arc<AtomicBool>,
}

impl<'a, C: ChatModel> PipelineOrchestrator<'a, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chat: &'a C,
        prompts: &'a PromptEngine,
        config: &'a Config,
        approval: &'a ApprovalService,
        monitor: &'a Monitor,
        output: &'a OutputWriter,
        search: &'a dyn SearchProvider,
        repository: Option<&'a DocumentRepository>,
    ) -> Self {
        Self {
            chat,
            prompts,
            config,
            approval,
            monitor,
            output,
            search,
            repository,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative cancellation handle, checked between phases and between
    /// retry attempts.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the full pipeline for one topic brief.
    pub async fn execute(&self, brief: &TopicBrief) -> PipelineResult {
        let started = Instant::now();
        let mut doc = PublishingDocument::new(brief);
        info!(
            "[wikismith:orchestrator] starting pipeline for '{}' (page {})",
            brief.topic, doc.page_name
        );

        match self.run_pipeline(brief, &mut doc).await {
            Ok(output_path) => {
                let total_time = started.elapsed();
                self.monitor.pipeline_finished(&doc.page_name, true, total_time);
                info!(
                    "[wikismith:orchestrator] published {} in {}s",
                    doc.page_name,
                    total_time.as_secs()
                );
                PipelineResult {
                    success: true,
                    document: doc,
                    output_path,
                    error_message: None,
                    failed_at_state: None,
                    failed_document_path: None,
                    total_time,
                }
            }
            Err(failure) => {
                let total_time = started.elapsed();
                warn!(
                    "[wikismith:orchestrator] pipeline failed at {}: {}",
                    failure.state, failure.error
                );
                let failed_document_path = match self.output.write_debug_artifact(
                    &doc,
                    failure.state,
                    &failure.error.to_string(),
                ) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!("[wikismith:orchestrator] failed to write debug artifact: {e}");
                        None
                    }
                };
                if !doc.state.is_terminal() {
                    let _ = doc.transition_to(DocumentState::Rejected);
                }
                self.persist(&doc);
                self.monitor.pipeline_finished(&doc.page_name, false, total_time);
                PipelineResult {
                    success: false,
                    document: doc,
                    output_path: None,
                    error_message: Some(failure.error.to_string()),
                    failed_at_state: Some(failure.state),
                    failed_document_path,
                    total_time,
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        brief: &TopicBrief,
        doc: &mut PublishingDocument,
    ) -> PhaseResult<Option<PathBuf>> {
        use DocumentState::*;

        // Existing pages are read once at pipeline start and not re-read
        // mid-run; the output directory is last-writer-wins.
        let existing_pages = self
            .output
            .discover_existing_pages()
            .map_err(|e| PhaseFailure { state: Researching, error: e })?;

        let search_context = if self.config.search_enabled {
            build_search_context(self.search, &brief.topic)
        } else {
            String::new()
        };

        let temps = &self.config.temperatures;
        let researcher = Researcher::new(self.prompts, brief, temps.research, search_context);
        let writer = Writer::new(
            self.prompts,
            brief,
            &existing_pages,
            temps.writer,
            self.config.links,
        );
        let fact_checker = FactChecker::new(self.prompts, temps.factchecker);
        let editor = Editor::new(
            self.prompts,
            &existing_pages,
            temps.editor,
            self.config.min_editor_score,
        );
        let critic = Critic::new(self.prompts, temps.critic);

        // RESEARCHING
        self.run_phase(&researcher, doc, Researching).await?;
        self.gate(ApprovalGate::AfterResearch, doc, Researching)?;

        // DRAFTING
        self.run_phase(&writer, doc, Drafting).await?;
        self.gate(ApprovalGate::AfterDraft, doc, Drafting)?;

        // FACT_CHECKING with bounded revision loop
        let mut revisions = 0u32;
        loop {
            self.run_phase(&fact_checker, doc, FactChecking).await?;
            self.gate(ApprovalGate::AfterFactCheck, doc, FactChecking)?;

            let report = doc
                .fact_check_report
                .as_ref()
                .expect("fact-check phase validated");
            let mut action = report.recommended_action;
            if action == ReviewAction::Approve
                && report.overall_confidence < self.config.min_factcheck_confidence
            {
                info!(
                    "[wikismith:orchestrator] confidence {:?} below minimum, revising",
                    report.overall_confidence
                );
                action = ReviewAction::Revise;
            }

            match action {
                ReviewAction::Approve => break,
                ReviewAction::Reject => {
                    return fail(
                        FactChecking,
                        Error::Validation("fact checker rejected the draft".to_string()),
                    );
                }
                ReviewAction::Revise => {
                    if revisions < self.config.max_revision_cycles {
                        revisions += 1;
                        info!(
                            "[wikismith:orchestrator] fact-check revision {}/{}",
                            revisions, self.config.max_revision_cycles
                        );
                        // run_phase takes the FACT_CHECKING -> DRAFTING
                        // revision edge itself.
                        self.run_phase(&writer, doc, Drafting).await?;
                    } else {
                        // Revision budget exhausted: carry the findings
                        // forward inside the draft and continue.
                        let report = doc
                            .fact_check_report
                            .clone()
                            .expect("fact-check phase validated");
                        if let Some(ref mut draft) = doc.draft {
                            draft.wiki_content = format!(
                                "{}\n\n{}\n",
                                draft.wiki_content.trim_end_matches('\n'),
                                fact_check_marker_block(&report, self.config.max_revision_cycles)
                            );
                        }
                        info!(
                            "[wikismith:orchestrator] fact-check revisions exhausted, continuing with markers"
                        );
                        break;
                    }
                }
            }
        }

        // EDITING
        self.run_phase(&editor, doc, Editing).await?;
        self.gate(ApprovalGate::AfterEdit, doc, Editing)?;

        // CRITIQUING with bounded revision loop
        let mut critique_revisions = 0u32;
        loop {
            self.run_phase(&critic, doc, Critiquing).await?;

            let action = doc
                .critic_report
                .as_ref()
                .expect("critique phase validated")
                .recommended_action;
            match action {
                ReviewAction::Approve => break,
                ReviewAction::Reject => {
                    return fail(
                        Critiquing,
                        Error::Validation("critic rejected the article".to_string()),
                    );
                }
                ReviewAction::Revise => {
                    if critique_revisions < self.config.max_revision_cycles {
                        critique_revisions += 1;
                        info!(
                            "[wikismith:orchestrator] critique revision {}/{}",
                            critique_revisions, self.config.max_revision_cycles
                        );
                        self.run_phase(&editor, doc, Editing).await?;
                    } else {
                        let report = doc
                            .critic_report
                            .clone()
                            .expect("critique phase validated");
                        if let Some(ref mut article) = doc.final_article {
                            article.wiki_content = format!(
                                "{}\n\n{}\n",
                                article.wiki_content.trim_end_matches('\n'),
                                critique_marker_block(&report, self.config.max_revision_cycles)
                            );
                        }
                        info!(
                            "[wikismith:orchestrator] critique revisions exhausted, continuing with markers"
                        );
                        break;
                    }
                }
            }
        }
        self.gate(ApprovalGate::BeforePublish, doc, Critiquing)?;

        // PUBLISHING
        let article = doc.final_article.as_ref().expect("editing phase validated");
        let output_path = if self.config.dry_run {
            info!("[wikismith:orchestrator] dry run, skipping artifact write");
            None
        } else {
            match self.output.write_article(&doc.page_name, &article.wiki_content) {
                Ok(path) => Some(path),
                Err(e) => return fail(Published, e),
            }
        };
        self.transition(doc, Published)?;
        self.persist(doc);

        Ok(output_path)
    }

    /// One phase: pre-check, invocation under retry + timeout, validation,
    /// transition, contribution, persistence.
    async fn run_phase<A: PhaseAgent>(
        &self,
        agent: &A,
        doc: &mut PublishingDocument,
        target: DocumentState,
    ) -> PhaseResult<()> {
        if self.cancel.load(Ordering::Acquire) {
            return fail(target, Error::Cancelled);
        }
        if !doc.state.can_transition_to(target) {
            return fail(
                target,
                Error::InvalidTransition {
                    from: doc.state,
                    to: target,
                },
            );
        }

        let role = agent.role();
        self.monitor.phase_started(role, &doc.page_name);
        let started = Instant::now();

        let runtime = AgentRuntime::new(self.chat, RetryPolicy::default(), self.config.max_tokens, &self.cancel);
        let timeout = Duration::from_secs(self.config.phase_timeout_secs);
        let stats = match tokio::time::timeout(timeout, runtime.invoke(agent, doc)).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => return fail(target, e),
            Err(_) => return fail(target, Error::Timeout(self.config.phase_timeout_secs)),
        };

        if let Err(e) = agent.validate(doc) {
            return fail(target, e);
        }

        self.transition(doc, target)?;
        self.monitor.phase_completed(
            role,
            &doc.page_name,
            started.elapsed(),
            stats.input_tokens,
            stats.output_tokens,
        );
        self.persist(doc);
        Ok(())
    }

    fn transition(&self, doc: &mut PublishingDocument, target: DocumentState) -> PhaseResult<()> {
        doc.transition_to(target)
            .map_err(|e| PhaseFailure { state: target, error: e })
    }

    /// Approval gate: suspend in AWAITING_APPROVAL while the decider runs,
    /// then resume to the phase state. Rejection and changes-requested are
    /// fatal, tagged with the gate's phase.
    fn gate(
        &self,
        gate: ApprovalGate,
        doc: &mut PublishingDocument,
        phase_state: DocumentState,
    ) -> PhaseResult<()> {
        if !self.approval.requires_decision(gate) {
            return Ok(());
        }

        self.transition(doc, DocumentState::AwaitingApproval)?;
        let outcome = self
            .approval
            .check(gate, doc)
            .map_err(|e| PhaseFailure { state: phase_state, error: e })?;
        match outcome {
            ApprovalOutcome::Approved => {
                self.transition(doc, phase_state)?;
                Ok(())
            }
            ApprovalOutcome::ChangesRequested { gate, reason } => {
                fail(phase_state, Error::ChangesRequested { gate, reason })
            }
            ApprovalOutcome::Rejected { gate, reason } => {
                fail(phase_state, Error::ApprovalRejected { gate, reason })
            }
        }
    }

    fn persist(&self, doc: &PublishingDocument) {
        if let Some(repo) = self.repository {
            if let Err(e) = repo.save(doc) {
                warn!("[wikismith:orchestrator] failed to persist document: {e}");
            }
        }
    }
}

/// Marker block embedded into the draft when fact-check revisions are
/// exhausted.
pub fn fact_check_marker_block(report: &FactCheckReport, max_cycles: u32) -> String {
    let mut block = String::from("__FACT CHECK FAIL BEGIN__\n");
    for (i, claim) in report.questionable_claims.iter().enumerate() {
        block.push_str(&format!("{}. Questionable Claim: {}\n", i + 1, claim.claim));
        block.push_str(&format!("   Issue: {}\n", claim.issue));
        if let Some(ref suggestion) = claim.suggestion {
            block.push_str(&format!("   Suggestion: {suggestion}\n"));
        }
    }
    if !report.consistency_issues.is_empty() {
        block.push_str("Consistency Issues:\n");
        for issue in &report.consistency_issues {
            block.push_str(&format!("* {issue}\n"));
        }
    }
    block.push_str(&format!("Unresolved after {max_cycles} revision attempts.\n"));
    block.push_str("__FACT CHECK FAIL END__");
    block
}

/// Marker block embedded into the final article when critique revisions are
/// exhausted.
pub fn critique_marker_block(report: &CriticReport, max_cycles: u32) -> String {
    let mut block = String::from("__CRITIQUE REVIEW NOTES BEGIN__\n");
    for (label, issues) in [
        ("Syntax Issues", &report.syntax_issues),
        ("Structure Issues", &report.structure_issues),
        ("Style Issues", &report.style_issues),
        ("Suggestions", &report.suggestions),
    ] {
        if issues.is_empty() {
            continue;
        }
        block.push_str(&format!("{label}:\n"));
        for issue in issues {
            block.push_str(&format!("* {issue}\n"));
        }
    }
    block.push_str(&format!("Unresolved after {max_cycles} revision attempts.\n"));
    block.push_str("__CRITIQUE REVIEW NOTES END__");
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Confidence, QuestionableClaim};

    #[test]
    fn test_fact_check_marker_block_shape() {
        let report = FactCheckReport {
            annotated_content: String::new(),
            verified_claims: vec![],
            questionable_claims: vec![
                QuestionableClaim {
                    claim: "claim one".into(),
                    issue: "issue one".into(),
                    suggestion: Some("fix one".into()),
                },
                QuestionableClaim {
                    claim: "claim two".into(),
                    issue: "issue two".into(),
                    suggestion: None,
                },
            ],
            consistency_issues: vec!["dates disagree".into()],
            overall_confidence: Confidence::Low,
            recommended_action: ReviewAction::Revise,
        };
        let block = fact_check_marker_block(&report, 2);

        assert!(block.starts_with("__FACT CHECK FAIL BEGIN__"));
        assert!(block.ends_with("__FACT CHECK FAIL END__"));
        assert!(block.contains("1. Questionable Claim: claim one"));
        assert!(block.contains("   Suggestion: fix one"));
        assert!(block.contains("2. Questionable Claim: claim two"));
        assert!(block.contains("Consistency Issues:\n* dates disagree"));
        assert!(block.contains("2 revision attempts"));
        assert_eq!(block.matches("Questionable Claim:").count(), 2);
    }

    #[test]
    fn test_fact_check_marker_block_no_consistency_section() {
        let report = FactCheckReport {
            annotated_content: String::new(),
            verified_claims: vec![],
            questionable_claims: vec![QuestionableClaim {
                claim: "c".into(),
                issue: "i".into(),
                suggestion: None,
            }],
            consistency_issues: vec![],
            overall_confidence: Confidence::Low,
            recommended_action: ReviewAction::Revise,
        };
        let block = fact_check_marker_block(&report, 3);
        assert!(!block.contains("Consistency Issues:"));
        assert!(block.contains("3 revision attempts"));
    }

    #[test]
    fn test_critique_marker_block_groups_categories() {
        let report = CriticReport {
            overall: 0.5,
            structure: 0.5,
            syntax: 0.4,
            style: 0.6,
            structure_issues: vec!["no lead".into()],
            syntax_issues: vec!["markdown heading".into()],
            style_issues: vec![],
            suggestions: vec!["add links".into()],
            recommended_action: ReviewAction::Revise,
        };
        let block = critique_marker_block(&report, 2);

        assert!(block.starts_with("__CRITIQUE REVIEW NOTES BEGIN__"));
        assert!(block.ends_with("__CRITIQUE REVIEW NOTES END__"));
        assert!(block.contains("Syntax Issues:\n* markdown heading"));
        assert!(block.contains("Structure Issues:\n* no lead"));
        assert!(!block.contains("Style Issues:"));
        assert!(block.contains("Suggestions:\n* add links"));
        let syntax_pos = block.find("Syntax Issues:").unwrap();
        let structure_pos = block.find("Structure Issues:").unwrap();
        assert!(syntax_pos < structure_pos);
    }
}
