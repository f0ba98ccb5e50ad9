use clap::Parser;
use tracing::info;

use wikismith::approval::ApprovalService;
use wikismith::chat::AnthropicClient;
use wikismith::cli::Cli;
use wikismith::config::Config;
use wikismith::document::TopicBrief;
use wikismith::monitor::{LogListener, Monitor};
use wikismith::orchestrator::PipelineOrchestrator;
use wikismith::output::OutputWriter;
use wikismith::prompts::PromptEngine;
use wikismith::repository::DocumentRepository;
use wikismith::search::wikidata::WikidataProvider;
use wikismith::search::wikipedia::WikipediaProvider;
use wikismith::search::ProviderRegistry;
use wikismith::stubs::resolve_gaps;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    info!("wikismith starting");

    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if cli.topic.is_none() && !cli.resolve_gaps {
        eprintln!("error: specify --topic or --resolve-gaps");
        std::process::exit(1);
    }

    info!(?config, "config loaded");

    let chat = match AnthropicClient::new(&config.model) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let prompts = PromptEngine::new(config.prompt_dir.clone());
    let output = OutputWriter::new(&config.output_dir, &config.file_extension);

    // Composition root: providers are registered once and resolved by name.
    let mut registry = ProviderRegistry::new(&config.search_default_provider);
    registry.register(Box::new(WikipediaProvider::new(
        config.search_max_results,
        config.search_enabled,
    )));
    registry.register(Box::new(WikidataProvider::new(
        config.search_max_results,
        config.search_enabled,
    )));

    if let Some(ref topic) = cli.topic {
        let mut brief = TopicBrief::new(
            topic,
            cli.audience.as_deref().unwrap_or("general readers"),
            cli.word_count.unwrap_or(500),
        );
        brief.required_sections = cli.sections.clone();
        brief.related_pages = cli.related_pages.clone();
        brief.source_urls = cli.source_urls.clone();

        let approval = ApprovalService::auto();
        let monitor = Monitor::new().with_listener(Box::new(LogListener));
        let repository = DocumentRepository::new(".wikismith/documents");

        let orchestrator = PipelineOrchestrator::new(
            &chat,
            &prompts,
            &config,
            &approval,
            &monitor,
            &output,
            registry.resolve_default(),
            Some(&repository),
        );

        let result = orchestrator.execute(&brief).await;
        if result.success {
            match result.output_path {
                Some(ref path) => info!("published: {}", path.display()),
                None => info!("dry run complete for {}", result.document.page_name),
            }
        } else {
            if let Some(ref path) = result.failed_document_path {
                eprintln!("debug artifact: {}", path.display());
            }
            eprintln!(
                "error: pipeline failed at {}: {}",
                result
                    .failed_at_state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                result.error_message.unwrap_or_default()
            );
            std::process::exit(1);
        }
    }

    if cli.resolve_gaps {
        let audience = cli.audience.as_deref().unwrap_or("general readers");
        match resolve_gaps(
            &output,
            &chat,
            &prompts,
            &config.universe,
            audience,
            config.max_tokens,
        )
        .await
        {
            Ok(written) => info!("gap resolution complete, {written} stub page(s) written"),
            Err(e) => {
                eprintln!("error: gap resolution failed: {e}");
                std::process::exit(1);
            }
        }
    }
}
