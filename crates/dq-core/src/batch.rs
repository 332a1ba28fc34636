//! Several questions against one document, each failing on its own.
//!
//! Only the shape of the batch (size, document readiness) can fail the whole
//! call. Every per-question error becomes a [`BatchItemResult::Failure`] at
//! that question's position, so the output always has one entry per input.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::DocumentContext;
use crate::error::Error;
use crate::executor::{QueryExecutor, QueryResult};

/// Largest number of questions accepted in one batch.
pub const MAX_BATCH_QUESTIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItemResult {
    Success { question: String, result: QueryResult },
    Failure { question: String, error: String },
}

impl BatchItemResult {
    pub fn question(&self) -> &str {
        match self {
            BatchItemResult::Success { question, .. } | BatchItemResult::Failure { question, .. } => {
                question
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchItemResult::Success { .. })
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            BatchItemResult::Success { result, .. } => Some(result),
            BatchItemResult::Failure { .. } => None,
        }
    }
}

/// Reject empty batches and batches over [`MAX_BATCH_QUESTIONS`].
pub fn validate_batch_size(questions: &[String]) -> Result<(), Error> {
    match questions.len() {
        0 => Err(Error::invalid_input("batch must contain at least one question")),
        n if n > MAX_BATCH_QUESTIONS => Err(Error::invalid_input(format!(
            "batch contains {n} questions, the maximum is {MAX_BATCH_QUESTIONS}"
        ))),
        _ => Ok(()),
    }
}

pub struct BatchExecutor {
    executor: Arc<QueryExecutor>,
    concurrency: usize,
}

impl BatchExecutor {
    /// Sequential executor: one question in flight at a time.
    pub fn new(executor: Arc<QueryExecutor>) -> Self {
        Self {
            executor,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` questions in flight. Output order is still input order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn execute_batch(
        &self,
        document: &DocumentContext,
        questions: &[String],
    ) -> Result<Vec<BatchItemResult>, Error> {
        validate_batch_size(questions)?;
        document.ensure_ready()?;

        // `buffered` yields in submission order, so results line up with `questions`.
        let items: Vec<BatchItemResult> = stream::iter(questions.iter().enumerate())
            .map(|(index, question)| self.run_one(document, index, question))
            .buffered(self.concurrency)
            .collect()
            .await;

        let succeeded = items.iter().filter(|item| item.is_success()).count();
        info!(
            document_id = %document.id,
            total = items.len(),
            succeeded,
            failed = items.len() - succeeded,
            "Batch complete"
        );

        Ok(items)
    }

    async fn run_one(&self, document: &DocumentContext, index: usize, question: &str) -> BatchItemResult {
        match self.executor.execute(document, question).await {
            Ok(result) => BatchItemResult::Success {
                question: question.to_string(),
                result,
            },
            Err(e) => {
                warn!(
                    document_id = %document.id,
                    index,
                    error = %e,
                    "Batch question failed"
                );
                BatchItemResult::Failure {
                    question: question.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }
}
