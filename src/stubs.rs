use std::collections::HashMap;

use tracing::{info, warn};

use crate::chat::{ChatModel, ChatRequest};
use crate::error::Result;
use crate::gaps::{GapClassifier, GapConcept, GapDetector, GapKind};
use crate::output::OutputWriter;
use crate::prompts::PromptEngine;
use crate::wiki::normalize_markup;

/// Produces minimal wiki content for classified gaps.
pub struct StubGenerator<'a, C: ChatModel> {
    chat: &'a C,
    prompts: &'a PromptEngine,
    universe: String,
    audience: String,
    max_tokens: u32,
}

impl<'a, C: ChatModel> StubGenerator<'a, C> {
    pub fn new(
        chat: &'a C,
        prompts: &'a PromptEngine,
        universe: &str,
        audience: &str,
        max_tokens: u32,
    ) -> Self {
        Self {
            chat,
            prompts,
            universe: universe.to_string(),
            audience: audience.to_string(),
            max_tokens,
        }
    }

    /// Generate stub content for a gap. `FULL_ARTICLE` and `IGNORE` gaps are
    /// not materialized; redirects are deterministic and need no LM call.
    pub async fn generate(&self, gap: &GapConcept) -> Result<Option<String>> {
        match gap.kind {
            GapKind::FullArticle | GapKind::Ignore => Ok(None),
            GapKind::Redirect => match gap.redirect_target {
                Some(ref target) => Ok(Some(format!("[{{ALIAS {target}}}]\n"))),
                None => {
                    warn!("[wikismith:stubs] redirect gap '{}' has no target, skipping", gap.name);
                    Ok(None)
                }
            },
            GapKind::Definition => Ok(Some(self.definition_content(gap).await)),
        }
    }

    async fn definition_content(&self, gap: &GapConcept) -> String {
        let mut vars = HashMap::new();
        vars.insert("universe".to_string(), self.universe.clone());
        vars.insert("audience".to_string(), self.audience.clone());
        vars.insert("concept".to_string(), gap.name.clone());
        vars.insert("referenced_by".to_string(), gap.referenced_by.join(", "));

        let prompt = match self.prompts.render_phase("stub-definition", &vars) {
            Ok(p) => p,
            Err(e) => {
                warn!("[wikismith:stubs] prompt render failed for '{}': {e}", gap.name);
                return fallback_definition(gap);
            }
        };

        match self
            .chat
            .chat(&ChatRequest {
                system: None,
                prompt,
                temperature: 0.4,
                max_tokens: self.max_tokens,
            })
            .await
        {
            Ok(response) if !response.text.trim().is_empty() => {
                normalize_markup(response.text.trim())
            }
            Ok(_) => {
                warn!("[wikismith:stubs] empty definition for '{}', using fallback", gap.name);
                fallback_definition(gap)
            }
            Err(e) => {
                warn!("[wikismith:stubs] definition call failed for '{}': {e}", gap.name);
                fallback_definition(gap)
            }
        }
    }
}

/// Deterministic template used when the LM cannot supply a definition.
fn fallback_definition(gap: &GapConcept) -> String {
    format!(
        "!!{}\n\n''{}'' is a concept referenced by {}. \
         This page is a stub awaiting a full definition.\n",
        gap.name,
        gap.name,
        gap.referenced_by.join(", ")
    )
}

/// Full gap-resolution pass: scan the corpus, classify the gaps, and write
/// a stub page for every gap whose classification materializes one.
/// Returns the number of pages written.
pub async fn resolve_gaps<C: ChatModel>(
    output: &OutputWriter,
    chat: &C,
    prompts: &PromptEngine,
    universe: &str,
    audience: &str,
    max_tokens: u32,
) -> Result<usize> {
    let mut gaps = GapDetector::new(output).scan()?;
    GapClassifier::new(chat, prompts, universe, max_tokens)
        .classify(&mut gaps)
        .await?;

    let existing = output.discover_existing_pages()?;
    let generator = StubGenerator::new(chat, prompts, universe, audience, max_tokens);
    let mut written = 0usize;
    for gap in &gaps {
        // Never clobber a page that already exists (a redirect whose
        // CamelCase form is the canonical page resolves on its own).
        if existing.contains(&gap.page_name) {
            continue;
        }
        if let Some(content) = generator.generate(gap).await? {
            output.write_article(&gap.page_name, &content)?;
            written += 1;
        }
    }
    info!("[wikismith:stubs] wrote {written} stub page(s)");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatResponse;
    use crate::error::Error;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedChat {
        responses: Mutex<Vec<Result<String>>>,
    }

    impl ChatModel for ScriptedChat {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            match self.responses.lock().unwrap().remove(0) {
                Ok(text) => Ok(ChatResponse {
                    text,
                    input_tokens: 1,
                    output_tokens: 1,
                }),
                Err(e) => Err(e),
            }
        }
    }

    fn gap(kind: GapKind) -> GapConcept {
        GapConcept {
            name: "Present Value".into(),
            page_name: "PresentValue".into(),
            kind,
            referenced_by: vec!["Investing".into()],
            redirect_target: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn test_redirect_is_deterministic_no_lm_call() {
        let chat = ScriptedChat {
            responses: Mutex::new(vec![]), // any call would panic on remove(0)
        };
        let prompts = PromptEngine::new(None);
        let generator = StubGenerator::new(&chat, &prompts, "U", "a", 256);

        let mut g = gap(GapKind::Redirect);
        g.redirect_target = Some("NetPresentValue".into());
        let content = generator.generate(&g).await.unwrap().unwrap();
        assert_eq!(content, "[{ALIAS NetPresentValue}]\n");
    }

    #[tokio::test]
    async fn test_redirect_without_target_skipped() {
        let chat = ScriptedChat {
            responses: Mutex::new(vec![]),
        };
        let prompts = PromptEngine::new(None);
        let generator = StubGenerator::new(&chat, &prompts, "U", "a", 256);
        assert!(generator.generate(&gap(GapKind::Redirect)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_article_and_ignore_not_materialized() {
        let chat = ScriptedChat {
            responses: Mutex::new(vec![]),
        };
        let prompts = PromptEngine::new(None);
        let generator = StubGenerator::new(&chat, &prompts, "U", "a", 256);
        assert!(generator.generate(&gap(GapKind::FullArticle)).await.unwrap().is_none());
        assert!(generator.generate(&gap(GapKind::Ignore)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_definition_normalizes_markup() {
        let chat = ScriptedChat {
            responses: Mutex::new(vec![Ok(
                "# Present Value\n**Present value** is money discounted to today.".to_string(),
            )]),
        };
        let prompts = PromptEngine::new(None);
        let generator = StubGenerator::new(&chat, &prompts, "U", "a", 256);
        let content = generator.generate(&gap(GapKind::Definition)).await.unwrap().unwrap();
        assert!(content.starts_with("!!!Present Value"));
        assert!(content.contains("__Present value__"));
    }

    #[tokio::test]
    async fn test_definition_falls_back_on_chat_failure() {
        let chat = ScriptedChat {
            responses: Mutex::new(vec![Err(Error::Transport("down".into()))]),
        };
        let prompts = PromptEngine::new(None);
        let generator = StubGenerator::new(&chat, &prompts, "U", "a", 256);
        let content = generator.generate(&gap(GapKind::Definition)).await.unwrap().unwrap();
        assert!(content.contains("''Present Value''"));
        assert!(content.contains("stub"));
        assert!(content.contains("Investing"));
    }

    #[tokio::test]
    async fn test_definition_falls_back_on_empty_response() {
        let chat = ScriptedChat {
            responses: Mutex::new(vec![Ok("   ".to_string())]),
        };
        let prompts = PromptEngine::new(None);
        let generator = StubGenerator::new(&chat, &prompts, "U", "a", 256);
        let content = generator.generate(&gap(GapKind::Definition)).await.unwrap().unwrap();
        assert!(content.contains("stub"));
    }

    #[tokio::test]
    async fn test_resolve_gaps_end_to_end() {
        let dir = TempDir::new().unwrap();
        let output = OutputWriter::new(dir.path(), ".txt");
        output
            .write_article("Investing", "See [Present Value] and [compound interest].")
            .unwrap();
        output.write_article("CompoundInterest", "Interest on interest.").unwrap();

        // One classification response, then one definition response.
        let chat = ScriptedChat {
            responses: Mutex::new(vec![
                Ok(r#"[
                    {"name": "Present Value", "type": "DEFINITION"},
                    {"name": "compound interest", "type": "REDIRECT", "redirect_target": "CompoundInterest"}
                ]"#
                .to_string()),
                Ok("''Present value'' is money discounted to today.".to_string()),
            ]),
        };
        let prompts = PromptEngine::new(None);

        let written = resolve_gaps(&output, &chat, &prompts, "Finance", "beginners", 256)
            .await
            .unwrap();
        // the redirect's CamelCase form IS the canonical page, so only the
        // definition stub is written
        assert_eq!(written, 1);

        let canonical = std::fs::read_to_string(dir.path().join("CompoundInterest.txt")).unwrap();
        assert_eq!(canonical, "Interest on interest.\n");

        let definition = std::fs::read_to_string(dir.path().join("PresentValue.txt")).unwrap();
        assert!(definition.contains("Present value"));
    }

    #[tokio::test]
    async fn test_resolve_gaps_writes_alias_for_distinct_name() {
        let dir = TempDir::new().unwrap();
        let output = OutputWriter::new(dir.path(), ".txt");
        output.write_article("Investing", "See [Net Present Value].").unwrap();
        output.write_article("PresentValue", "Discounted money.").unwrap();

        let chat = ScriptedChat {
            responses: Mutex::new(vec![Ok(r#"[
                {"name": "Net Present Value", "type": "REDIRECT", "redirect_target": "PresentValue"}
            ]"#
            .to_string())]),
        };
        let prompts = PromptEngine::new(None);

        let written = resolve_gaps(&output, &chat, &prompts, "Finance", "beginners", 256)
            .await
            .unwrap();
        assert_eq!(written, 1);
        let alias = std::fs::read_to_string(dir.path().join("NetPresentValue.txt")).unwrap();
        assert_eq!(alias, "[{ALIAS PresentValue}]\n");
    }
}
