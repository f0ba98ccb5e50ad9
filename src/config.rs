use std::path::Path;

use serde::Deserialize;

use crate::cli::Cli;
use crate::document::Confidence;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigFile {
    pub anthropic: Option<AnthropicFile>,
    pub pipeline: Option<PipelineFile>,
    pub output: Option<OutputFile>,
    pub quality: Option<QualityFile>,
    pub search: Option<SearchFile>,
    pub links: Option<LinksFile>,
    pub universe: Option<String>,
    pub prompt_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct LinksFile {
    pub min_per_article: Option<usize>,
    pub max_per_article: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AnthropicFile {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<TemperatureFile>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct TemperatureFile {
    pub research: Option<f64>,
    pub writer: Option<f64>,
    pub factchecker: Option<f64>,
    pub editor: Option<f64>,
    pub critic: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PipelineFile {
    pub max_revision_cycles: Option<u32>,
    /// Per-phase timeout in seconds.
    pub phase_timeout: Option<u64>,
    pub approval: Option<ApprovalFile>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ApprovalFile {
    pub after_research: Option<bool>,
    pub after_draft: Option<bool>,
    pub after_factcheck: Option<bool>,
    pub after_edit: Option<bool>,
    pub before_publish: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct OutputFile {
    pub directory: Option<String>,
    pub file_extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct QualityFile {
    pub min_factcheck_confidence: Option<Confidence>,
    pub min_editor_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SearchFile {
    pub enabled: Option<bool>,
    pub max_results: Option<usize>,
    pub default_provider: Option<String>,
}

/// Per-role sampling temperatures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperatures {
    pub research: f64,
    pub writer: f64,
    pub factchecker: f64,
    pub editor: f64,
    pub critic: f64,
}

/// Bounds on internal-link density in generated articles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkPolicy {
    pub min_per_article: usize,
    pub max_per_article: usize,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            min_per_article: 0,
            max_per_article: 12,
        }
    }
}

/// Per-gate approval mask. A gate whose flag is false auto-approves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApprovalMask {
    pub after_research: bool,
    pub after_draft: bool,
    pub after_factcheck: bool,
    pub after_edit: bool,
    pub before_publish: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub model: String,
    pub max_tokens: u32,
    pub temperatures: Temperatures,
    pub max_revision_cycles: u32,
    pub phase_timeout_secs: u64,
    pub approval: ApprovalMask,
    pub output_dir: String,
    pub file_extension: String,
    pub min_factcheck_confidence: Confidence,
    pub min_editor_score: f64,
    pub search_enabled: bool,
    pub search_max_results: usize,
    pub search_default_provider: String,
    pub links: LinkPolicy,
    pub universe: String,
    pub prompt_dir: Option<String>,
    pub dry_run: bool,
}

const DEFAULT_CONFIG_FILE: &str = ".wikismith/config.toml";

impl Config {
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_from(cli, Path::new("."))
    }

    pub fn load_from(cli: &Cli, project_dir: &Path) -> Result<Self> {
        let file_config = match &cli.config {
            Some(explicit_path) => {
                let path = Path::new(explicit_path);
                if !path.exists() {
                    return Err(Error::ConfigNotFound(path.to_path_buf()));
                }
                let content = std::fs::read_to_string(path)?;
                parse_config(&content)?
            }
            None => {
                let path = project_dir.join(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    let content = std::fs::read_to_string(&path)?;
                    parse_config(&content)?
                } else {
                    ConfigFile::default()
                }
            }
        };

        merge(file_config, cli)
    }
}

pub fn parse_config(content: &str) -> Result<ConfigFile> {
    let config: ConfigFile = toml::from_str(content)?;
    Ok(config)
}

pub fn merge(file: ConfigFile, cli: &Cli) -> Result<Config> {
    let anthropic = file.anthropic.unwrap_or_default();
    let temperature = anthropic.temperature.unwrap_or_default();
    let pipeline = file.pipeline.unwrap_or_default();
    let approval = pipeline.approval.unwrap_or_default();
    let output = file.output.unwrap_or_default();
    let quality = file.quality.unwrap_or_default();
    let search = file.search.unwrap_or_default();
    let links = file.links.unwrap_or_default();

    let config = Config {
        model: anthropic
            .model
            .unwrap_or_else(|| "claude-sonnet-4-5".to_string()),
        max_tokens: anthropic.max_tokens.unwrap_or(4096),
        temperatures: Temperatures {
            research: temperature.research.unwrap_or(0.2),
            writer: temperature.writer.unwrap_or(0.7),
            factchecker: temperature.factchecker.unwrap_or(0.1),
            editor: temperature.editor.unwrap_or(0.3),
            critic: temperature.critic.unwrap_or(0.2),
        },
        max_revision_cycles: pipeline.max_revision_cycles.unwrap_or(3),
        phase_timeout_secs: pipeline.phase_timeout.unwrap_or(300),
        approval: ApprovalMask {
            after_research: approval.after_research.unwrap_or(false),
            after_draft: approval.after_draft.unwrap_or(false),
            after_factcheck: approval.after_factcheck.unwrap_or(false),
            after_edit: approval.after_edit.unwrap_or(false),
            before_publish: approval.before_publish.unwrap_or(false),
        },
        output_dir: cli
            .output_dir
            .clone()
            .or(output.directory)
            .unwrap_or_else(|| "wiki".to_string()),
        file_extension: output.file_extension.unwrap_or_else(|| ".txt".to_string()),
        min_factcheck_confidence: quality.min_factcheck_confidence.unwrap_or(Confidence::Low),
        min_editor_score: quality.min_editor_score.unwrap_or(0.7),
        search_enabled: search.enabled.unwrap_or(false),
        search_max_results: search.max_results.unwrap_or(5),
        search_default_provider: search
            .default_provider
            .unwrap_or_else(|| "wikipedia".to_string()),
        links: LinkPolicy {
            min_per_article: links.min_per_article.unwrap_or(0),
            max_per_article: links.max_per_article.unwrap_or(12),
        },
        universe: cli
            .universe
            .clone()
            .or(file.universe)
            .unwrap_or_else(|| "General".to_string()),
        prompt_dir: cli.prompt_dir.clone().or(file.prompt_dir),
        dry_run: cli.dry_run,
    };
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.max_tokens == 0 {
        return Err(Error::ConfigValidation(
            "anthropic.max-tokens must be > 0".to_string(),
        ));
    }
    if config.phase_timeout_secs == 0 {
        return Err(Error::ConfigValidation(
            "pipeline.phase-timeout must be > 0".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.min_editor_score) {
        return Err(Error::ConfigValidation(format!(
            "quality.min-editor-score must be in [0, 1], got {}",
            config.min_editor_score
        )));
    }
    for (name, t) in [
        ("research", config.temperatures.research),
        ("writer", config.temperatures.writer),
        ("factchecker", config.temperatures.factchecker),
        ("editor", config.temperatures.editor),
        ("critic", config.temperatures.critic),
    ] {
        if !(0.0..=1.0).contains(&t) {
            return Err(Error::ConfigValidation(format!(
                "anthropic.temperature.{name} must be in [0, 1], got {t}"
            )));
        }
    }
    if !config.file_extension.starts_with('.') {
        return Err(Error::ConfigValidation(format!(
            "output.file-extension must start with '.', got {}",
            config.file_extension
        )));
    }
    if config.links.min_per_article > config.links.max_per_article {
        return Err(Error::ConfigValidation(format!(
            "links.min-per-article ({}) exceeds links.max-per-article ({})",
            config.links.min_per_article, config.links.max_per_article
        )));
    }
    match config.search_default_provider.as_str() {
        "wikipedia" | "wikidata" | "none" => {}
        other => {
            return Err(Error::ConfigValidation(format!(
                "unknown search provider: {other} (expected: wikipedia, wikidata, none)"
            )));
        }
    }
    Ok(())
}
