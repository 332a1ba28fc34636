//! Query history as a JSON-lines file, one [`HistoryRecord`] per line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use dq_core::{Error, HistoryRecord, QueryHistoryStore, QueryResult};

pub struct JsonlHistoryStore {
    path: PathBuf,
    // Serializes appends from concurrent batch items.
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn new_record_id() -> String {
        let now = Utc::now();
        format!(
            "{}-{:09}",
            now.format("%Y%m%d%H%M%S"),
            now.timestamp_subsec_nanos()
        )
    }
}

#[async_trait]
impl QueryHistoryStore for JsonlHistoryStore {
    async fn save(&self, document_id: &str, question: &str, result: &QueryResult) -> Result<String, Error> {
        let record = HistoryRecord {
            id: Self::new_record_id(),
            document_id: document_id.to_string(),
            question: question.to_string(),
            result: result.clone(),
            created_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(format!("{}: {e}", parent.display())))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::storage(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::storage(e.to_string()))?;
        file.flush().await.map_err(|e| Error::storage(e.to_string()))?;

        debug!(document_id, record_id = %record.id, "Saved query history");
        Ok(record.id)
    }

    async fn list(&self, document_id: &str) -> Result<Vec<HistoryRecord>, Error> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(format!("{}: {e}", self.path.display()))),
        };

        let mut records = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(line) {
                Ok(record) if record.document_id == document_id => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(line = number + 1, error = %e, "Skipping unreadable history line"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dq_core::Answer;

    fn result(text: &str) -> QueryResult {
        QueryResult {
            answer: Answer::new(text, true, 0.9, "stated"),
            processing_time_ms: 120,
            estimated_tokens: 40,
            attempts: 1,
            degraded: false,
        }
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistoryStore::new(dir.path().join("nested").join("history.jsonl"));

        let id = store.save("sky", "What color is the sky?", &result("Blue")).await.unwrap();
        store.save("grass", "What color is grass?", &result("Green")).await.unwrap();
        store.save("sky", "Is it always blue?", &result("No")).await.unwrap();

        let records = store.list("sky").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].result.answer.text, "Blue");
        assert_eq!(records[1].question, "Is it always blue?");
    }

    #[tokio::test]
    async fn test_lines_are_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistoryStore::new(dir.path().join("history.jsonl"));
        store.save("sky", "What color is the sky?", &result("Blue")).await.unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["documentId"], "sky");
        assert_eq!(value["result"]["text"], "Blue");
        assert_eq!(value["result"]["processingTimeMs"], 120);
        assert!(value["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = JsonlHistoryStore::new(&path);
        store.save("sky", "What color is the sky?", &result("Blue")).await.unwrap();

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{not json\n");
        std::fs::write(&path, content).unwrap();

        assert_eq!(store.list("sky").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlHistoryStore::new(dir.path().join("history.jsonl"));
        assert!(store.list("sky").await.unwrap().is_empty());
    }
}
