use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::agents::{brief_to_text, feedback_to_text};
use crate::document::{DocumentState, PublishingDocument};
use crate::error::{Error, Result};
use crate::wiki::camel_case;

/// Materializes success and debug artifacts under the output directory with
/// deterministic page-name derived paths.
pub struct OutputWriter {
    dir: PathBuf,
    extension: String,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `CamelCase(pageName || "UnnamedPage") + extension`. Deterministic.
    pub fn page_filename(&self, page_name: &str) -> String {
        let stem = if page_name.trim().is_empty() {
            "UnnamedPage".to_string()
        } else {
            camel_case(page_name)
        };
        format!("{stem}{}", self.extension)
    }

    pub fn page_path(&self, page_name: &str) -> PathBuf {
        self.dir.join(self.page_filename(page_name))
    }

    /// Write the published article: content with exactly one trailing
    /// newline, no injected banners or metadata.
    pub fn write_article(&self, page_name: &str, content: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Writer(format!("failed to create output dir: {e}")))?;
        let path = self.page_path(page_name);
        let body = format!("{}\n", content.trim_end_matches('\n'));
        std::fs::write(&path, body)
            .map_err(|e| Error::Writer(format!("failed to write {}: {e}", path.display())))?;
        info!("[wikismith:output] wrote {}", path.display());
        Ok(path)
    }

    /// Persist everything an operator needs to diagnose a failed run:
    /// failure state, error, fact-check issues, the last draft, and the
    /// research brief summary.
    pub fn write_debug_artifact(
        &self,
        doc: &PublishingDocument,
        failed_state: DocumentState,
        error: &str,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Writer(format!("failed to create output dir: {e}")))?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let stem = if doc.page_name.trim().is_empty() {
            "UnnamedPage".to_string()
        } else {
            doc.page_name.clone()
        };
        let path = self
            .dir
            .join(format!("{stem}_FAILED_{failed_state}_{timestamp}{}", self.extension));

        let mut body = String::new();
        body.push_str("----\n");
        body.push_str("PIPELINE FAILURE\n");
        body.push_str(&format!("State: {failed_state}\n"));
        body.push_str(&format!("Time: {}\n", Utc::now().to_rfc3339()));
        body.push_str(&format!("Error: {error}\n"));
        body.push_str("----\n\n");

        if let Some(ref report) = doc.fact_check_report {
            if !report.questionable_claims.is_empty() || !report.consistency_issues.is_empty() {
                body.push_str("!!Fact Check Issues\n");
                body.push_str(&feedback_to_text(report));
                body.push('\n');
            }
        }

        if let Some(ref draft) = doc.draft {
            body.push_str("!!Last Draft\n");
            body.push_str(&draft.wiki_content);
            body.push_str("\n\n");
        }

        if let Some(ref brief) = doc.research_brief {
            body.push_str("!!Research Brief Summary\n");
            body.push_str(&brief_to_text(brief));
        }

        std::fs::write(&path, body)
            .map_err(|e| Error::Writer(format!("failed to write {}: {e}", path.display())))?;
        info!("[wikismith:output] wrote debug artifact {}", path.display());
        Ok(path)
    }

    /// Page stems (names without extension) present in the output directory.
    pub fn discover_existing_pages(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut stems = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .map_err(|e| Error::Writer(format!("failed to list {}: {e}", self.dir.display())))?
        {
            let entry = entry.map_err(|e| Error::Writer(e.to_string()))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(stem) = name.strip_suffix(&self.extension) {
                if !stem.is_empty() && !stem.starts_with('.') {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();
        Ok(stems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        ArticleDraft, Confidence, FactCheckReport, QuestionableClaim, ResearchBrief, ReviewAction,
        TopicBrief,
    };
    use tempfile::TempDir;

    fn writer(dir: &TempDir) -> OutputWriter {
        OutputWriter::new(dir.path(), ".txt")
    }

    #[test]
    fn test_page_filename_derivation() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        assert_eq!(w.page_filename("VersionControlBasics"), "VersionControlBasics.txt");
        assert_eq!(w.page_filename("compound interest"), "CompoundInterest.txt");
        assert_eq!(w.page_filename(""), "UnnamedPage.txt");
        assert_eq!(w.page_filename("  "), "UnnamedPage.txt");
    }

    #[test]
    fn test_page_filename_deterministic() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        assert_eq!(w.page_path("Some Page"), w.page_path("Some Page"));
    }

    #[test]
    fn test_write_article_single_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        let path = w.write_article("TestPage", "!!Heading\ncontent\n\n\n").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "!!Heading\ncontent\n");
    }

    #[test]
    fn test_write_article_no_banner_injection() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        let path = w.write_article("TestPage", "!!Heading\ncontent").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("<!--"));
        assert!(written.starts_with("!!Heading"));
    }

    #[test]
    fn test_discover_existing_pages() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        w.write_article("Beta", "b").unwrap();
        w.write_article("Alpha", "a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("Subdir.txt")).unwrap();

        assert_eq!(w.discover_existing_pages().unwrap(), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_discover_missing_dir_empty() {
        let dir = TempDir::new().unwrap();
        let w = OutputWriter::new(dir.path().join("missing"), ".txt");
        assert!(w.discover_existing_pages().unwrap().is_empty());
    }

    #[test]
    fn test_debug_artifact_contents() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);

        let mut doc = PublishingDocument::new(&TopicBrief::new("Test Topic", "devs", 200));
        doc.research_brief = Some(ResearchBrief {
            key_facts: vec!["a fact".into()],
            suggested_outline: vec!["Intro".into()],
            ..Default::default()
        });
        doc.draft = Some(ArticleDraft {
            wiki_content: "!!Intro\ndraft text with a dubious claim".into(),
            summary: "s".into(),
            ..Default::default()
        });
        doc.fact_check_report = Some(FactCheckReport {
            annotated_content: String::new(),
            verified_claims: vec![],
            questionable_claims: vec![QuestionableClaim {
                claim: "dubious claim".into(),
                issue: "unsourced".into(),
                suggestion: None,
            }],
            consistency_issues: vec![],
            overall_confidence: Confidence::Low,
            recommended_action: ReviewAction::Reject,
        });

        let path = w
            .write_debug_artifact(&doc, DocumentState::FactChecking, "fact check rejected the draft")
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("TestTopic_FAILED_FACT_CHECKING_"), "got {name}");
        assert!(name.ends_with(".txt"));

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("PIPELINE FAILURE"));
        assert!(body.contains("State: FACT_CHECKING"));
        assert!(body.contains("fact check rejected the draft"));
        assert!(body.contains("1. Claim: dubious claim"));
        assert!(body.contains("draft text with a dubious claim"));
        assert!(body.contains("* a fact"));
    }

    #[test]
    fn test_debug_artifact_minimal_document() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir);
        let doc = PublishingDocument::new(&TopicBrief::new("Bare", "devs", 100));
        let path = w
            .write_debug_artifact(&doc, DocumentState::Researching, "boom")
            .unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("Error: boom"));
        assert!(!body.contains("Last Draft"));
    }
}
