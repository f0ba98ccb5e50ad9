use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

const DEFAULT_RESEARCHER: &str = include_str!("default_prompts/researcher.md");
const DEFAULT_WRITER: &str = include_str!("default_prompts/writer.md");
const DEFAULT_FACT_CHECKER: &str = include_str!("default_prompts/fact-checker.md");
const DEFAULT_EDITOR: &str = include_str!("default_prompts/editor.md");
const DEFAULT_CRITIC: &str = include_str!("default_prompts/critic.md");
const DEFAULT_GAP_CLASSIFIER: &str = include_str!("default_prompts/gap-classifier.md");
const DEFAULT_STUB_DEFINITION: &str = include_str!("default_prompts/stub-definition.md");
const WIKI_SYNTAX_RULES: &str = include_str!("default_prompts/_wiki-syntax.md");

fn default_template(phase: &str) -> Option<&'static str> {
    match phase {
        "researcher" => Some(DEFAULT_RESEARCHER),
        "writer" => Some(DEFAULT_WRITER),
        "fact-checker" => Some(DEFAULT_FACT_CHECKER),
        "editor" => Some(DEFAULT_EDITOR),
        "critic" => Some(DEFAULT_CRITIC),
        "gap-classifier" => Some(DEFAULT_GAP_CLASSIFIER),
        "stub-definition" => Some(DEFAULT_STUB_DEFINITION),
        _ => None,
    }
}

/// Prompt template engine with default templates and user overrides.
pub struct PromptEngine {
    override_dir: Option<String>,
}

impl PromptEngine {
    pub fn new(override_dir: Option<String>) -> Self {
        Self { override_dir }
    }

    /// Load a prompt template for the given phase.
    /// User overrides in `override_dir` take precedence over defaults.
    pub fn load_template(&self, phase: &str) -> Result<String> {
        if let Some(ref dir) = self.override_dir {
            let path = Path::new(dir).join(format!("{phase}.md"));
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Prompt(format!(
                        "failed to read override template {}: {e}",
                        path.display()
                    ))
                })?;
                // No pre-render validation — upon's own render errors include
                // line/column and the offending snippet.
                return Ok(content);
            }
        }

        default_template(phase)
            .map(|s| s.to_string())
            .ok_or_else(|| Error::Prompt(format!("unknown prompt phase: {phase}")))
    }

    /// Load a template and render it with the given variables.
    ///
    /// The wiki syntax reference is auto-injected as `wiki_syntax` when not
    /// already present, so templates can cite it without callers supplying it.
    pub fn render_phase(&self, phase: &str, vars: &HashMap<String, String>) -> Result<String> {
        let template = self.load_template(phase)?;
        let mut all_vars = vars.clone();
        all_vars
            .entry("wiki_syntax".to_string())
            .or_insert_with(|| WIKI_SYNTAX_RULES.to_string());
        render_template(&template, &all_vars)
    }
}

/// Render a template string using the `upon` template engine.
/// Supports `{{ var }}`, `{% if %}`, and `{% for %}` syntax.
pub fn render_template(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let engine = upon::Engine::new();
    let compiled = engine
        .compile(template)
        .map_err(|e| Error::Prompt(format!("template compile error: {e}")))?;
    compiled
        .render(
            &engine,
            upon::to_value(vars).map_err(|e| Error::Prompt(e.to_string()))?,
        )
        .to_string()
        .map_err(|e| Error::Prompt(format!("template render error: {e}")))
}
