#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::json;

use wikismith::chat::{ChatModel, ChatRequest, ChatResponse};
use wikismith::config::{ApprovalMask, Config, LinkPolicy, Temperatures};
use wikismith::document::Confidence;
use wikismith::error::{Error, Result};

/// Chat model that replays canned responses in order and records prompts.
pub struct ScriptedChat {
    responses: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl ChatModel for ScriptedChat {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(text) => Ok(ChatResponse {
                text,
                input_tokens: 100,
                output_tokens: 50,
            }),
            None => Err(Error::Transport("script exhausted".to_string())),
        }
    }
}

/// Sensible default `Config` for tests. Callers override fields via struct
/// update syntax.
pub fn test_config(output_dir: &str) -> Config {
    Config {
        model: "test-model".to_string(),
        max_tokens: 1024,
        temperatures: Temperatures {
            research: 0.2,
            writer: 0.7,
            factchecker: 0.1,
            editor: 0.3,
            critic: 0.2,
        },
        max_revision_cycles: 3,
        phase_timeout_secs: 300,
        approval: ApprovalMask::default(),
        output_dir: output_dir.to_string(),
        file_extension: ".txt".to_string(),
        min_factcheck_confidence: Confidence::Low,
        min_editor_score: 0.7,
        search_enabled: false,
        search_max_results: 5,
        search_default_provider: "wikipedia".to_string(),
        links: LinkPolicy::default(),
        universe: "Test Universe".to_string(),
        prompt_dir: None,
        dry_run: false,
    }
}

// --- canned agent responses ---

pub fn research_json() -> String {
    json!({
        "key_facts": ["Version control records the history of changes"],
        "sources": [{"text": "git-scm.com documentation", "reliability": "OFFICIAL"}],
        "suggested_outline": ["Overview", "Everyday Usage"],
        "related_page_suggestions": ["BranchingModel"],
        "glossary": {"commit": "a recorded snapshot"},
        "uncertain_areas": []
    })
    .to_string()
}

pub fn draft_json(content: &str) -> String {
    json!({
        "wiki_content": content,
        "summary": "A short introduction to the topic.",
        "internal_links": [],
        "categories": [],
        "metadata": {}
    })
    .to_string()
}

pub const DEFAULT_DRAFT: &str =
    "!!Overview\nVersion control records the history of changes.\n!!Everyday Usage\nCommit early and often.";

pub fn factcheck_approve() -> String {
    json!({
        "annotated_content": "all claims check out",
        "verified_claims": [{"claim": "records the history", "status": "supported", "source_index": 0}],
        "questionable_claims": [],
        "consistency_issues": [],
        "overall_confidence": "HIGH",
        "recommended_action": "APPROVE"
    })
    .to_string()
}

pub fn factcheck_revise(
    questionable: &[(&str, &str)],
    consistency: &[&str],
) -> String {
    factcheck_with_action("REVISE", questionable, consistency)
}

pub fn factcheck_reject(questionable: &[(&str, &str)]) -> String {
    factcheck_with_action("REJECT", questionable, &[])
}

fn factcheck_with_action(
    action: &str,
    questionable: &[(&str, &str)],
    consistency: &[&str],
) -> String {
    json!({
        "annotated_content": "annotated draft",
        "verified_claims": [],
        "questionable_claims": questionable
            .iter()
            .map(|(claim, issue)| json!({"claim": claim, "issue": issue}))
            .collect::<Vec<_>>(),
        "consistency_issues": consistency,
        "overall_confidence": "LOW",
        "recommended_action": action
    })
    .to_string()
}

pub fn editor_json(score: f64) -> String {
    json!({
        "wiki_content": "!!!Version Control Basics\n!!Overview\nVersion control records the history of changes.",
        "metadata": {},
        "edit_summary": "tightened wording",
        "quality_score": score,
        "added_links": []
    })
    .to_string()
}

pub fn critic_json(action: &str) -> String {
    json!({
        "overall": 0.9,
        "structure": 0.9,
        "syntax": 0.9,
        "style": 0.9,
        "structure_issues": [],
        "syntax_issues": [],
        "style_issues": [],
        "suggestions": [],
        "recommended_action": action
    })
    .to_string()
}

pub fn critic_revise(syntax_issues: &[&str], structure_issues: &[&str]) -> String {
    json!({
        "overall": 0.6,
        "structure": 0.6,
        "syntax": 0.5,
        "style": 0.7,
        "structure_issues": structure_issues,
        "syntax_issues": syntax_issues,
        "style_issues": [],
        "suggestions": ["add internal links"],
        "recommended_action": "REVISE"
    })
    .to_string()
}
