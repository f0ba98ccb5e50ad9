use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wiki::camel_case;

/// Immutable input describing the article to produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicBrief {
    pub topic: String,
    pub audience: String,
    pub target_word_count: u32,
    #[serde(default)]
    pub required_sections: Vec<String>,
    #[serde(default)]
    pub related_pages: Vec<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
}

impl TopicBrief {
    pub fn new(topic: &str, audience: &str, target_word_count: u32) -> Self {
        Self {
            topic: topic.to_string(),
            audience: audience.to_string(),
            target_word_count,
            required_sections: Vec::new(),
            related_pages: Vec::new(),
            source_urls: Vec::new(),
        }
    }
}

/// Pipeline phase states, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentState {
    Created,
    Researching,
    Drafting,
    FactChecking,
    Editing,
    Critiquing,
    Published,
    Rejected,
    AwaitingApproval,
}

impl DocumentState {
    /// The next state in the forward chain, if any.
    pub fn next(self) -> Option<DocumentState> {
        use DocumentState::*;
        match self {
            Created => Some(Researching),
            Researching => Some(Drafting),
            Drafting => Some(FactChecking),
            FactChecking => Some(Editing),
            Editing => Some(Critiquing),
            Critiquing => Some(Published),
            Published | Rejected | AwaitingApproval => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentState::Published | DocumentState::Rejected)
    }

    /// A transition is legal iff the target is the next state, a revision
    /// target, REJECTED from any non-terminal state, AWAITING_APPROVAL from
    /// any non-terminal state, or a resume out of AWAITING_APPROVAL.
    pub fn can_transition_to(self, target: DocumentState) -> bool {
        use DocumentState::*;
        if self.next() == Some(target) {
            return true;
        }
        match (self, target) {
            (FactChecking, Drafting) => true,
            (Critiquing, Editing) => true,
            (from, Rejected) if !from.is_terminal() => true,
            (from, AwaitingApproval) if !from.is_terminal() => true,
            (AwaitingApproval, to) if to != AwaitingApproval => true,
            _ => false,
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentState::Created => "CREATED",
            DocumentState::Researching => "RESEARCHING",
            DocumentState::Drafting => "DRAFTING",
            DocumentState::FactChecking => "FACT_CHECKING",
            DocumentState::Editing => "EDITING",
            DocumentState::Critiquing => "CRITIQUING",
            DocumentState::Published => "PUBLISHED",
            DocumentState::Rejected => "REJECTED",
            DocumentState::AwaitingApproval => "AWAITING_APPROVAL",
        };
        write!(f, "{name}")
    }
}

/// Ordinal trustworthiness ranking for a research source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reliability {
    Official,
    Academic,
    Authoritative,
    Reputable,
    Community,
    Uncertain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub text: String,
    pub reliability: Reliability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchBrief {
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    pub suggested_outline: Vec<String>,
    #[serde(default)]
    pub related_page_suggestions: Vec<String>,
    #[serde(default)]
    pub glossary: HashMap<String, String>,
    #[serde(default)]
    pub uncertain_areas: Vec<String>,
}

impl ResearchBrief {
    pub fn is_valid(&self) -> bool {
        !self.key_facts.is_empty() && !self.suggested_outline.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleDraft {
    pub wiki_content: String,
    pub summary: String,
    #[serde(default)]
    pub internal_links: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ArticleDraft {
    pub fn is_valid(&self) -> bool {
        !self.wiki_content.trim().is_empty() && !self.summary.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Approve,
    Revise,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedClaim {
    pub claim: String,
    pub status: String,
    #[serde(default)]
    pub source_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionableClaim {
    pub claim: String,
    pub issue: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactCheckReport {
    pub annotated_content: String,
    #[serde(default)]
    pub verified_claims: Vec<VerifiedClaim>,
    #[serde(default)]
    pub questionable_claims: Vec<QuestionableClaim>,
    #[serde(default)]
    pub consistency_issues: Vec<String>,
    pub overall_confidence: Confidence,
    pub recommended_action: ReviewAction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinalArticle {
    pub wiki_content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub edit_summary: String,
    pub quality_score: f64,
    #[serde(default)]
    pub added_links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticReport {
    pub overall: f64,
    pub structure: f64,
    pub syntax: f64,
    pub style: f64,
    #[serde(default)]
    pub structure_issues: Vec<String>,
    #[serde(default)]
    pub syntax_issues: Vec<String>,
    #[serde(default)]
    pub style_issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub recommended_action: ReviewAction,
}

/// The five pipeline roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    Researcher,
    Writer,
    FactChecker,
    Editor,
    Critic,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentRole::Researcher => "researcher",
            AgentRole::Writer => "writer",
            AgentRole::FactChecker => "fact-checker",
            AgentRole::Editor => "editor",
            AgentRole::Critic => "critic",
        };
        write!(f, "{name}")
    }
}

/// One completed agent invocation. Value-typed and append-only; carries the
/// role enum rather than a reference to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentContribution {
    pub role: AgentRole,
    pub timestamp: DateTime<Utc>,
    pub input_hash: String,
    pub output_hash: String,
    pub processing_ms: u64,
    #[serde(default)]
    pub metrics: HashMap<String, f64>,
}

/// Advisory quality metadata; never read by control flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityAssessment {
    pub overall: f64,
    pub assessed_at: DateTime<Utc>,
}

/// The document flowing through the pipeline. Mutated only by the
/// orchestrator at phase boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishingDocument {
    pub id: String,
    pub page_name: String,
    pub title: String,
    pub state: DocumentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub research_brief: Option<ResearchBrief>,
    #[serde(default)]
    pub draft: Option<ArticleDraft>,
    #[serde(default)]
    pub fact_check_report: Option<FactCheckReport>,
    #[serde(default)]
    pub final_article: Option<FinalArticle>,
    #[serde(default)]
    pub critic_report: Option<CriticReport>,
    #[serde(default)]
    pub contributions: Vec<AgentContribution>,
    #[serde(default)]
    pub quality_assessment: Option<QualityAssessment>,
}

impl PublishingDocument {
    pub fn new(brief: &TopicBrief) -> Self {
        let title = brief.topic.clone();
        let page_name = camel_case(&title);
        let now = Utc::now();
        Self {
            id: page_name.to_lowercase(),
            page_name,
            title,
            state: DocumentState::Created,
            created_at: now,
            updated_at: now,
            research_brief: None,
            draft: None,
            fact_check_report: None,
            final_article: None,
            critic_report: None,
            contributions: Vec::new(),
            quality_assessment: None,
        }
    }

    /// Move to `target`, enforcing transition legality.
    pub fn transition_to(&mut self, target: DocumentState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_contribution(&mut self, contribution: AgentContribution) {
        self.contributions.push(contribution);
        self.updated_at = Utc::now();
    }

    /// How many times the given role has contributed.
    pub fn contribution_count(&self, role: AgentRole) -> usize {
        self.contributions.iter().filter(|c| c.role == role).count()
    }
}
