//! Documents as plain-text files in a directory: `<dir>/<id>.txt`.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use dq_core::{DocumentContext, DocumentStore, Error};

const EXTENSION: &str = "txt";

pub struct DirectoryDocumentStore {
    root: PathBuf,
}

impl DirectoryDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, document_id: &str) -> Result<PathBuf, Error> {
        let valid = !document_id.is_empty()
            && document_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !document_id.starts_with('.');
        if !valid {
            return Err(Error::invalid_input(format!("invalid document id: {document_id}")));
        }
        Ok(self.root.join(format!("{document_id}.{EXTENSION}")))
    }
}

#[async_trait]
impl DocumentStore for DirectoryDocumentStore {
    async fn get(&self, document_id: &str) -> Result<DocumentContext, Error> {
        let path = self.path_for(document_id)?;
        debug!(document_id, path = %path.display(), "Loading document");

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(DocumentContext::new(document_id, text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::document_not_found(document_id))
            }
            Err(e) => Err(Error::storage(format!("{}: {e}", path.display()))),
        }
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(format!("{}: {e}", self.root.display()))),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
