//! Collaborator contracts for document text and query history, plus
//! in-memory implementations for tests and embedding.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentContext;
use crate::error::Error;
use crate::executor::QueryResult;

/// Resolves a document identifier to its extracted text.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails with [`Error::DocumentNotFound`] for unknown ids. An empty text is
    /// returned as-is; readiness is checked by the executors.
    async fn get(&self, document_id: &str) -> Result<DocumentContext, Error>;

    /// Known document ids, sorted.
    async fn list(&self) -> Result<Vec<String>, Error>;
}

/// One persisted answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub document_id: String,
    pub question: String,
    pub result: QueryResult,
    pub created_at: DateTime<Utc>,
}

/// Append-only log of answered queries.
#[async_trait]
pub trait QueryHistoryStore: Send + Sync {
    /// Persist one answered query, returning the new record's id.
    async fn save(&self, document_id: &str, question: &str, result: &QueryResult) -> Result<String, Error>;

    /// Records for `document_id`, oldest first.
    async fn list(&self, document_id: &str) -> Result<Vec<HistoryRecord>, Error>;
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document_id: impl Into<String>, text: impl Into<String>) -> Result<(), Error> {
        self.documents
            .write()
            .map_err(|_| Error::storage("document store lock poisoned"))?
            .insert(document_id.into(), text.into());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, document_id: &str) -> Result<DocumentContext, Error> {
        let documents = self
            .documents
            .read()
            .map_err(|_| Error::storage("document store lock poisoned"))?;
        documents
            .get(document_id)
            .map(|text| DocumentContext::new(document_id, text.clone()))
            .ok_or_else(|| Error::document_not_found(document_id))
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let documents = self
            .documents
            .read()
            .map_err(|_| Error::storage("document store lock poisoned"))?;
        let mut ids: Vec<String> = documents.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueryHistoryStore for MemoryHistoryStore {
    async fn save(&self, document_id: &str, question: &str, result: &QueryResult) -> Result<String, Error> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::storage("history store lock poisoned"))?;
        let id = (records.len() + 1).to_string();
        records.push(HistoryRecord {
            id: id.clone(),
            document_id: document_id.to_string(),
            question: question.to_string(),
            result: result.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list(&self, document_id: &str) -> Result<Vec<HistoryRecord>, Error> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::storage("history store lock poisoned"))?;
        Ok(records
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect())
    }
}
