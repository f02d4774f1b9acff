use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::config::ConfigPaths;

const PREVIEW_LENGTH: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content_length: usize,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub meta: DocumentMeta,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct DocumentListing {
    pub meta: DocumentMeta,
    pub preview: String,
}

/// Markdown documents under `~/.parley/docs/`, one `<id>.md` per document
/// plus an `index.json` holding the metadata for listings and search.
pub struct DocumentStore {
    paths: ConfigPaths,
}

impl DocumentStore {
    pub fn new(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    fn index_file(&self) -> PathBuf {
        self.paths.docs_dir().join("index.json")
    }

    fn doc_file(&self, id: &str) -> PathBuf {
        self.paths.docs_dir().join(format!("{}.md", id))
    }

    fn load_index(&self) -> Result<Vec<DocumentMeta>> {
        let file = self.index_file();
        if !file.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read '{}'", file.display()))?;
        serde_json::from_str(&content).context("Document index is not valid JSON")
    }

    fn save_index(&self, index: &[DocumentMeta]) -> Result<()> {
        self.paths.ensure_layout()?;
        let content = serde_json::to_string_pretty(index)?;
        fs::write(self.index_file(), content).context("Failed to write document index")
    }

    fn generate_id() -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        format!("doc-{}-{}", millis, suffix)
    }

    pub fn add(&self, title: &str, content: &str, tags: Vec<String>) -> Result<DocumentMeta> {
        self.paths.ensure_layout()?;
        let now = Utc::now();
        let meta = DocumentMeta {
            id: Self::generate_id(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
            tags,
            content_length: content.len(),
        };

        fs::write(self.doc_file(&meta.id), content)
            .with_context(|| format!("Failed to write document '{}'", meta.id))?;

        let mut index = self.load_index()?;
        index.push(meta.clone());
        self.save_index(&index)?;
        Ok(meta)
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        let index = self.load_index()?;
        let meta = index
            .into_iter()
            .find(|m| m.id == id)
            .with_context(|| format!("Document '{}' not found", id))?;
        let content = fs::read_to_string(self.doc_file(id))
            .with_context(|| format!("Document file for '{}' is missing", id))?;
        Ok(Document { meta, content })
    }

    /// All documents, newest first, each with a short content preview.
    pub fn list(&self) -> Result<Vec<DocumentListing>> {
        let mut index = self.load_index()?;
        index.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut listings = Vec::with_capacity(index.len());
        for meta in index {
            let content = fs::read_to_string(self.doc_file(&meta.id)).unwrap_or_default();
            let mut preview: String = content.chars().take(PREVIEW_LENGTH).collect();
            if content.chars().count() > PREVIEW_LENGTH {
                preview.push('…');
            }
            listings.push(DocumentListing { meta, preview });
        }
        Ok(listings)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let mut index = self.load_index()?;
        let before = index.len();
        index.retain(|m| m.id != id);
        if index.len() == before {
            bail!("Document '{}' not found", id);
        }
        self.save_index(&index)?;

        let file = self.doc_file(id);
        if file.exists() {
            fs::remove_file(&file)
                .with_context(|| format!("Failed to remove document file '{}'", id))?;
        }
        Ok(())
    }

    /// Case-insensitive substring search over titles, tags and content.
    pub fn search(&self, query: &str) -> Result<Vec<DocumentMeta>> {
        let needle = query.to_lowercase();
        let index = self.load_index()?;

        let mut hits = Vec::new();
        for meta in index {
            let in_title = meta.title.to_lowercase().contains(&needle);
            let in_tags = meta.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            let in_content = if in_title || in_tags {
                false
            } else {
                fs::read_to_string(self.doc_file(&meta.id))
                    .map(|c| c.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            };
            if in_title || in_tags || in_content {
                hits.push(meta);
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(ConfigPaths::at(dir.path()));
        (dir, store)
    }

    #[test]
    fn test_add_and_get() -> Result<()> {
        let (_dir, store) = store();
        let meta = store.add("Notes", "# Heading\nBody text.", vec!["rust".to_string()])?;
        assert!(meta.id.starts_with("doc-"));

        let doc = store.get(&meta.id)?;
        assert_eq!(doc.meta.title, "Notes");
        assert_eq!(doc.content, "# Heading\nBody text.");
        Ok(())
    }

    #[test]
    fn test_list_previews_are_truncated() -> Result<()> {
        let (_dir, store) = store();
        store.add("Long", &"a".repeat(500), Vec::new())?;

        let listings = store.list()?;
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].preview.chars().count(), PREVIEW_LENGTH + 1);
        assert!(listings[0].preview.ends_with('…'));
        Ok(())
    }

    #[test]
    fn test_remove_deletes_file_and_index_entry() -> Result<()> {
        let (_dir, store) = store();
        let meta = store.add("Gone", "soon", Vec::new())?;

        store.remove(&meta.id)?;
        assert!(store.get(&meta.id).is_err());
        assert!(store.list()?.is_empty());
        assert!(store.remove(&meta.id).is_err());
        Ok(())
    }

    #[test]
    fn test_search_matches_title_tags_and_content() -> Result<()> {
        let (_dir, store) = store();
        store.add("Deployment runbook", "steps...", Vec::new())?;
        store.add("Misc", "notes", vec!["deploy".to_string()])?;
        store.add("Other", "how to deploy the service", Vec::new())?;
        store.add("Unrelated", "nothing here", Vec::new())?;

        let hits = store.search("DEPLOY")?;
        assert_eq!(hits.len(), 3);
        Ok(())
    }
}
