//! dq-core: question answering over stored documents
//!
//! The pipeline turns a document and a natural-language question into a
//! structured [`Answer`] by prompting a [`Provider`], retrying transient
//! overloads, and parsing whatever the model returns. Batch and
//! recommendation flows are built on the same pieces, and [`QueryService`]
//! ties them to document and history stores.

pub mod answer;
pub mod batch;
pub mod document;
pub mod error;
pub mod executor;
pub mod message;
pub mod model_client;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod recommend;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use answer::Answer;
pub use batch::{BatchExecutor, BatchItemResult, MAX_BATCH_QUESTIONS};
pub use document::{DocumentContext, Question};
pub use error::Error;
pub use executor::{QueryExecutor, QueryResult};
pub use message::{Message, Role, Usage};
pub use model_client::{Invocation, ModelClient, RetryPolicy};
pub use provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};
pub use recommend::{RecommendationGenerator, FALLBACK_QUESTIONS};
pub use service::QueryService;
pub use store::{
    DocumentStore, HistoryRecord, MemoryDocumentStore, MemoryHistoryStore, QueryHistoryStore,
};

pub type Result<T> = std::result::Result<T, Error>;
