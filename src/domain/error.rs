use thiserror::Error;

use crate::domain::types::{RelationKind, Role, TopicId};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("topic {id} is defined more than once")]
    DuplicateTopic { id: TopicId },
    #[error("relation `{kind}` expects roles {expected_from}/{expected_to}, found {found_from}/{found_to}")]
    RoleMismatch {
        kind: RelationKind,
        expected_from: Role,
        expected_to: Role,
        found_from: Role,
        found_to: Role,
    },
    #[error("relation `{kind}` references unknown topic {id}")]
    DanglingRelation { kind: RelationKind, id: TopicId },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
