//! Keyword-overlap retrieval over in-memory documents.
//!
//! Documents are split into paragraphs; a paragraph scores one point per
//! occurrence of each query term (case-insensitive, terms shorter than three
//! characters ignored). Paragraphs without any hit are never returned.

use async_trait::async_trait;
use seminar_application::ports::retrieval::{DocumentRetriever, RetrievalError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

const MIN_TERM_LEN: usize = 3;

#[derive(Default)]
pub struct KeywordRetriever {
    /// document id -> paragraphs
    documents: RwLock<HashMap<String, Vec<String>>>,
}

impl KeywordRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document_id: impl Into<String>, text: &str) {
        let paragraphs = split_paragraphs(text);
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(document_id.into(), paragraphs);
    }

    /// Load a UTF-8 text file as a document.
    pub fn insert_file(
        &self,
        document_id: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> std::io::Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.insert(document_id, &text);
        Ok(())
    }
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .collect()
}

fn score(paragraph: &str, terms: &[String]) -> usize {
    let lowered = paragraph.to_lowercase();
    terms
        .iter()
        .map(|term| lowered.matches(term.as_str()).count())
        .sum()
}

#[async_trait]
impl DocumentRetriever for KeywordRetriever {
    async fn retrieve(
        &self,
        document_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<String>, RetrievalError> {
        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        let paragraphs = documents
            .get(document_id)
            .ok_or_else(|| RetrievalError::DocumentNotFound(document_id.to_string()))?;

        let terms = terms(query);
        let mut scored: Vec<(usize, &String)> = paragraphs
            .iter()
            .map(|p| (score(p, &terms), p))
            .filter(|(s, _)| *s > 0)
            .collect();
        // Stable: ties keep document order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let snippets: Vec<String> = scored
            .into_iter()
            .take(top_k)
            .map(|(_, p)| p.clone())
            .collect();
        debug!(document_id, query, hits = snippets.len(), "document retrieved");
        Ok(snippets)
    }
}
