//! In-memory content store and its TOML archive format.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    application::repos::{RepoError, TopicStore},
    domain::{
        entities::{RelationRecord, TopicRecord},
        error::DomainError,
        types::{RelationKind, Role, TopicId},
    },
    infra::error::InfraError,
};

type RelationKey = (TopicId, RelationKind, Role);

/// Content store held entirely in memory.
///
/// Uses BTreeMap/BTreeSet so related topics come back in id order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTopicStore {
    topics: BTreeMap<TopicId, TopicRecord>,
    relations: BTreeMap<RelationKey, BTreeSet<(Role, TopicId)>>,
    relation_count: usize,
}

impl InMemoryTopicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_topic(&mut self, topic: TopicRecord) {
        self.topics.insert(topic.id, topic);
    }

    /// Index a relation from both endpoints.
    pub fn add_relation(&mut self, relation: RelationRecord) {
        let RelationRecord { kind, from, to } = relation;
        self.relations
            .entry((from.topic, kind, from.role))
            .or_default()
            .insert((to.role, to.topic));
        self.relations
            .entry((to.topic, kind, to.role))
            .or_default()
            .insert((from.role, from.topic));
        self.relation_count += 1;
    }

    pub fn num_topics(&self) -> usize {
        self.topics.len()
    }

    pub fn num_relations(&self) -> usize {
        self.relation_count
    }
}

impl TopicStore for InMemoryTopicStore {
    fn topic(&self, id: TopicId) -> Result<Option<TopicRecord>, RepoError> {
        Ok(self.topics.get(&id).cloned())
    }

    fn related_topics(
        &self,
        id: TopicId,
        kind: RelationKind,
        role: Role,
        other_role: Role,
    ) -> Result<Vec<TopicId>, RepoError> {
        Ok(self
            .relations
            .get(&(id, kind, role))
            .map(|players| {
                players
                    .iter()
                    .filter(|(player_role, _)| *player_role == other_role)
                    .map(|(_, topic)| *topic)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Serialized topic graph: every topic and relation of one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicGraphArchive {
    pub topics: Vec<TopicRecord>,
    pub relations: Vec<RelationRecord>,
}

impl TopicGraphArchive {
    /// Read and validate an archive from a TOML file.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let data = fs::read_to_string(path).map_err(|err| InfraError::io(path, err))?;
        let archive: TopicGraphArchive =
            toml::from_str(&data).map_err(|err| InfraError::archive(path, err.to_string()))?;
        archive.validate()?;

        info!(
            target = "infra::store",
            op = "archive::load",
            path = %path.display(),
            topics = archive.topics.len(),
            relations = archive.relations.len(),
            "Loaded topic graph archive"
        );
        Ok(archive)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut ids = BTreeSet::new();
        for topic in &self.topics {
            if !ids.insert(topic.id) {
                return Err(DomainError::DuplicateTopic { id: topic.id });
            }
        }

        for relation in &self.relations {
            let (expected_from, expected_to) = expected_roles(relation.kind);
            if relation.from.role != expected_from || relation.to.role != expected_to {
                return Err(DomainError::RoleMismatch {
                    kind: relation.kind,
                    expected_from,
                    expected_to,
                    found_from: relation.from.role,
                    found_to: relation.to.role,
                });
            }
            for endpoint in [relation.from.topic, relation.to.topic] {
                if !ids.contains(&endpoint) {
                    return Err(DomainError::DanglingRelation {
                        kind: relation.kind,
                        id: endpoint,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn into_store(self) -> InMemoryTopicStore {
        let mut store = InMemoryTopicStore::new();
        for topic in self.topics {
            store.add_topic(topic);
        }
        for relation in self.relations {
            store.add_relation(relation);
        }
        store
    }
}

fn expected_roles(kind: RelationKind) -> (Role, Role) {
    match kind {
        RelationKind::ProcessorStart => (Role::Processor, Role::Start),
        RelationKind::Sequence => (Role::Predecessor, Role::Successor),
    }
}
