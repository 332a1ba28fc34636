//! Caller-facing operations: resolve the document, run the pipeline, record history.

use std::sync::Arc;

use tracing::warn;

use crate::batch::{validate_batch_size, BatchExecutor, BatchItemResult};
use crate::error::Error;
use crate::executor::{QueryExecutor, QueryResult};
use crate::model_client::ModelClient;
use crate::recommend::RecommendationGenerator;
use crate::store::{DocumentStore, HistoryRecord, QueryHistoryStore};

pub struct QueryService {
    documents: Arc<dyn DocumentStore>,
    history: Arc<dyn QueryHistoryStore>,
    executor: Arc<QueryExecutor>,
    batch: BatchExecutor,
    recommender: RecommendationGenerator,
}

impl QueryService {
    pub fn new(
        client: ModelClient,
        documents: Arc<dyn DocumentStore>,
        history: Arc<dyn QueryHistoryStore>,
    ) -> Self {
        let executor = Arc::new(QueryExecutor::new(client.clone()));
        Self {
            documents,
            history,
            batch: BatchExecutor::new(executor.clone()),
            executor,
            recommender: RecommendationGenerator::new(client),
        }
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch = self.batch.with_concurrency(concurrency);
        self
    }

    /// Answer one question and record it.
    pub async fn answer_one(&self, document_id: &str, question: &str) -> Result<QueryResult, Error> {
        let document = self.documents.get(document_id).await?;
        let result = self.executor.execute(&document, question).await?;
        self.record(document_id, question, &result).await;
        Ok(result)
    }

    /// Answer up to ten questions, recording every successful one.
    pub async fn answer_batch(
        &self,
        document_id: &str,
        questions: &[String],
    ) -> Result<Vec<BatchItemResult>, Error> {
        validate_batch_size(questions)?;
        let document = self.documents.get(document_id).await?;
        let items = self.batch.execute_batch(&document, questions).await?;

        for item in &items {
            if let BatchItemResult::Success { question, result } = item {
                self.record(document_id, question, result).await;
            }
        }

        Ok(items)
    }

    /// Up to three suggested questions. Only an unknown document is an error.
    pub async fn recommend_questions(&self, document_id: &str) -> Result<Vec<String>, Error> {
        let document = self.documents.get(document_id).await?;
        Ok(self.recommender.generate(&document.text).await)
    }

    pub async fn history(&self, document_id: &str) -> Result<Vec<HistoryRecord>, Error> {
        self.history.list(document_id).await
    }

    /// The answer has already been produced, so a failed write is logged, not returned.
    async fn record(&self, document_id: &str, question: &str, result: &QueryResult) {
        if let Err(e) = self.history.save(document_id, question, result).await {
            warn!(document_id, error = %e, "Failed to record query history");
        }
    }
}
