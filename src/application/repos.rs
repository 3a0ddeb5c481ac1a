//! Repository traits describing content store adapters.

use thiserror::Error;

use crate::domain::entities::TopicRecord;
use crate::domain::types::{RelationKind, Role, TopicId};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("topic {id} not found")]
    NotFound { id: TopicId },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read-only view of the content store used by the publish pipeline.
///
/// Implementations must return related topics in a deterministic order so that
/// ambiguity checks are reproducible across runs.
pub trait TopicStore: Send + Sync {
    /// Fetch a topic by id.
    fn topic(&self, id: TopicId) -> Result<Option<TopicRecord>, RepoError>;

    /// Topics playing `other_role` in relations of `kind` where `id` plays `role`.
    fn related_topics(
        &self,
        id: TopicId,
        kind: RelationKind,
        role: Role,
        other_role: Role,
    ) -> Result<Vec<TopicId>, RepoError>;

    /// Fetch a topic, failing when the store does not hold it.
    fn require_topic(&self, id: TopicId) -> Result<TopicRecord, RepoError> {
        self.topic(id)?.ok_or(RepoError::NotFound { id })
    }
}
