//! Retrieval port: supporting snippets from a topic's reference documents.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Retrieval backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Return at most `top_k` snippets of `document_id` relevant to `query`,
    /// best match first.
    async fn retrieve(
        &self,
        document_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError>;
}

/// Retriever that never finds anything.
pub struct NoRetrieval;

#[async_trait]
impl DocumentRetriever for NoRetrieval {
    async fn retrieve(
        &self,
        _document_id: &str,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        Ok(Vec::new())
    }
}
