use clap::Parser;

/// wikismith — multi-agent wiki article publishing pipeline
#[derive(Parser, Debug)]
#[command(name = "wikismith", version, about)]
pub struct Cli {
    /// Topic to research and publish
    #[arg(long)]
    pub topic: Option<String>,

    /// Audience the article is written for
    #[arg(long)]
    pub audience: Option<String>,

    /// Target article length in words
    #[arg(long)]
    pub word_count: Option<u32>,

    /// Required section (repeatable)
    #[arg(long = "section")]
    pub sections: Vec<String>,

    /// Related page the article should link to (repeatable)
    #[arg(long = "related-page")]
    pub related_pages: Vec<String>,

    /// Source URL for the researcher (repeatable)
    #[arg(long = "source-url")]
    pub source_urls: Vec<String>,

    /// Scan the output directory and mint stub pages for unresolved links
    #[arg(long)]
    pub resolve_gaps: bool,

    /// Run the pipeline without writing the published artifact
    #[arg(long)]
    pub dry_run: bool,

    /// Path to config file
    #[arg(long)]
    pub config: Option<String>,

    /// Output directory for published pages
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Topic universe name used by gap classification and stub pages
    #[arg(long)]
    pub universe: Option<String>,

    /// Directory of prompt template overrides
    #[arg(long)]
    pub prompt_dir: Option<String>,
}
