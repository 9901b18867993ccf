//! Seeding the in-memory stores from file configuration.

use crate::config::FileConfig;
use crate::storage::{InMemorySeminarRepository, KeywordRetriever};
use seminar_domain::DomainError;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid topic {topic_id}: {source}")]
    Topic {
        topic_id: String,
        source: DomainError,
    },

    #[error("Failed to read document {document_id}: {source}")]
    Document {
        document_id: String,
        source: std::io::Error,
    },
}

/// Repository holding every configured role and topic
pub fn seed_repository(config: &FileConfig) -> Result<InMemorySeminarRepository, CatalogError> {
    let repository = InMemorySeminarRepository::new();
    for role in &config.roles {
        repository.insert_role(role.to_role());
    }
    for topic in &config.topics {
        let topic = topic.to_topic().map_err(|source| CatalogError::Topic {
            topic_id: topic.id.clone(),
            source,
        })?;
        repository.insert_topic(topic);
    }
    info!(
        roles = config.roles.len(),
        topics = config.topics.len(),
        "repository seeded"
    );
    Ok(repository)
}

/// Retriever over every configured document; inline text wins over `path`
pub fn load_documents(config: &FileConfig) -> Result<KeywordRetriever, CatalogError> {
    let retriever = KeywordRetriever::new();
    for document in &config.documents {
        match (&document.text, &document.path) {
            (Some(text), _) => retriever.insert(document.id.clone(), text),
            (None, Some(path)) => retriever
                .insert_file(document.id.clone(), path)
                .map_err(|source| CatalogError::Document {
                    document_id: document.id.clone(),
                    source,
                })?,
            (None, None) => {}
        }
    }
    Ok(retriever)
}
