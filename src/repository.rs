use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::document::PublishingDocument;
use crate::error::{Error, Result};
use crate::wiki::normalize_page_name;

/// A curated set of topics sharing one wiki. The name and audience feed gap
/// classification and stub generation prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicUniverse {
    pub name: String,
    pub audience: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl TopicUniverse {
    pub fn id(&self) -> String {
        normalize_page_name(&self.name)
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Repository("id must not be empty".to_string()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::Repository(format!(
            "id contains invalid characters (allowed: a-zA-Z0-9_-): {id}"
        )));
    }
    Ok(())
}

/// Atomic JSON write: tmp file + fsync + rename, serialized by an exclusive
/// flock so two coordinators never interleave a read-modify-write.
fn save_json<T: Serialize>(dir: &Path, id: &str, value: &T) -> Result<()> {
    use std::io::Write;

    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Repository(format!("failed to create repository dir: {e}")))?;

    let lock = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dir.join(".repo.lock"))
        .map_err(|e| Error::Repository(format!("failed to open lock file: {e}")))?;

    let ret = unsafe { libc::flock(lock.as_raw_fd(), libc::LOCK_EX) };
    if ret != 0 {
        return Err(Error::Repository(format!(
            "failed to acquire repository lock: {}",
            std::io::Error::last_os_error()
        )));
    }

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Repository(format!("failed to serialize {id}: {e}")))?;

    let dest = dir.join(format!("{id}.json"));
    let tmp = dir.join(format!(".{id}.json.tmp"));

    let mut file = std::fs::File::create(&tmp)
        .map_err(|e| Error::Repository(format!("failed to create temp file: {e}")))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::Repository(format!("failed to write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| Error::Repository(format!("failed to fsync temp file: {e}")))?;

    std::fs::rename(&tmp, &dest)
        .map_err(|e| Error::Repository(format!("failed to rename temp file: {e}")))?;

    Ok(())
    // Lock released when `lock` is dropped (fd closed)
}

fn load_json<T: DeserializeOwned>(dir: &Path, id: &str) -> Result<Option<T>> {
    let path = dir.join(format!("{id}.json"));
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Repository(format!("failed to read {}: {e}", path.display())))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| Error::Repository(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(value))
}

fn delete_json(dir: &Path, id: &str) -> Result<bool> {
    let path = dir.join(format!("{id}.json"));
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)
        .map_err(|e| Error::Repository(format!("failed to delete {}: {e}", path.display())))?;
    Ok(true)
}

fn list_json(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|e| Error::Repository(format!("failed to list {}: {e}", dir.display())))?
    {
        let entry = entry.map_err(|e| Error::Repository(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(stem) = name.strip_suffix(".json") {
            if !stem.starts_with('.') {
                ids.push(stem.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

/// Opaque-by-id store for pipeline documents, one JSON file per document.
pub struct DocumentRepository {
    dir: PathBuf,
}

impl DocumentRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(&self, doc: &PublishingDocument) -> Result<()> {
        validate_id(&doc.id)?;
        save_json(&self.dir, &doc.id, doc)
    }

    pub fn load(&self, id: &str) -> Result<Option<PublishingDocument>> {
        validate_id(id)?;
        load_json(&self.dir, id)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        delete_json(&self.dir, id)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        list_json(&self.dir)
    }
}

/// Opaque-by-id store for topic universes.
pub struct UniverseRepository {
    dir: PathBuf,
}

impl UniverseRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save(&self, universe: &TopicUniverse) -> Result<()> {
        let id = universe.id();
        validate_id(&id)?;
        save_json(&self.dir, &id, universe)
    }

    pub fn load(&self, id: &str) -> Result<Option<TopicUniverse>> {
        validate_id(id)?;
        load_json(&self.dir, id)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        delete_json(&self.dir, id)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        list_json(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentState, TopicBrief};
    use tempfile::TempDir;

    fn sample_doc() -> PublishingDocument {
        PublishingDocument::new(&TopicBrief::new("Compound Interest", "students", 300))
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = DocumentRepository::new(dir.path());

        let mut doc = sample_doc();
        doc.transition_to(DocumentState::Researching).unwrap();
        repo.save(&doc).unwrap();

        let loaded = repo.load(&doc.id).unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let repo = DocumentRepository::new(dir.path());
        assert!(repo.load("nosuchdoc").unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let repo = DocumentRepository::new(dir.path());
        let doc = sample_doc();
        repo.save(&doc).unwrap();

        assert!(repo.delete(&doc.id).unwrap());
        assert!(!repo.delete(&doc.id).unwrap());
        assert!(repo.load(&doc.id).unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_without_lock_files() {
        let dir = TempDir::new().unwrap();
        let repo = DocumentRepository::new(dir.path());

        let mut b = sample_doc();
        b.id = "beta".into();
        let mut a = sample_doc();
        a.id = "alpha".into();
        repo.save(&b).unwrap();
        repo.save(&a).unwrap();

        assert_eq!(repo.list().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_list_empty_dir_missing() {
        let dir = TempDir::new().unwrap();
        let repo = DocumentRepository::new(dir.path().join("missing"));
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_id_rejected() {
        let dir = TempDir::new().unwrap();
        let repo = DocumentRepository::new(dir.path());
        assert!(repo.load("../escape").is_err());
        assert!(repo.load("").is_err());

        let mut doc = sample_doc();
        doc.id = "a/b".into();
        assert!(repo.save(&doc).is_err());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let repo = DocumentRepository::new(dir.path());

        let mut doc = sample_doc();
        repo.save(&doc).unwrap();
        doc.transition_to(DocumentState::Researching).unwrap();
        repo.save(&doc).unwrap();

        let loaded = repo.load(&doc.id).unwrap().unwrap();
        assert_eq!(loaded.state, DocumentState::Researching);
    }

    #[test]
    fn test_universe_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = UniverseRepository::new(dir.path());

        let universe = TopicUniverse {
            name: "Personal Finance".into(),
            audience: "beginners".into(),
            description: "Money basics".into(),
            topics: vec!["Investing".into(), "Compound Interest".into()],
        };
        repo.save(&universe).unwrap();

        let loaded = repo.load("personalfinance").unwrap().unwrap();
        assert_eq!(loaded, universe);
        assert_eq!(repo.list().unwrap(), vec!["personalfinance"]);
    }

    #[test]
    fn test_concurrent_saves_are_serialized() {
        use std::sync::Arc;
        use std::thread;

        let dir = TempDir::new().unwrap();
        let path: Arc<PathBuf> = Arc::new(dir.path().to_path_buf());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let p = Arc::clone(&path);
                thread::spawn(move || {
                    let repo = DocumentRepository::new(p.as_ref());
                    let mut doc = sample_doc();
                    doc.id = format!("doc-{i}");
                    repo.save(&doc).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let repo = DocumentRepository::new(path.as_ref());
        assert_eq!(repo.list().unwrap().len(), 10);
    }
}
