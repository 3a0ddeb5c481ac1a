//! Domain entities mirrored from the content store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::types::{RelationKind, Role, TopicId};

/// Child property naming the output format of a processor configuration.
pub const OUTPUT_FORMAT_PROPERTY: &str = "dita.output_format";
/// Optional child property carrying the body text of a content topic.
pub const BODY_PROPERTY: &str = "dita.body";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: TopicId,
    pub type_uri: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub children: BTreeMap<String, PropertyValue>,
}

impl TopicRecord {
    pub fn new(id: TopicId, type_uri: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id,
            type_uri: type_uri.into(),
            value: value.into(),
            children: BTreeMap::new(),
        }
    }

    pub fn with_child(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.children.insert(key.into(), value.into());
        self
    }

    /// Text child property, treating blank strings as absent.
    pub fn child_text(&self, key: &str) -> Option<&str> {
        self.children
            .get(key)
            .and_then(PropertyValue::as_text)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RolePlayer {
    pub topic: TopicId,
    pub role: Role,
}

/// Directed, typed edge between two topics with one role per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationRecord {
    pub kind: RelationKind,
    pub from: RolePlayer,
    pub to: RolePlayer,
}

impl RelationRecord {
    pub fn new(kind: RelationKind, from: RolePlayer, to: RolePlayer) -> Self {
        Self { kind, from, to }
    }

    pub fn processor_start(processor: TopicId, start: TopicId) -> Self {
        Self::new(
            RelationKind::ProcessorStart,
            RolePlayer {
                topic: processor,
                role: Role::Processor,
            },
            RolePlayer {
                topic: start,
                role: Role::Start,
            },
        )
    }

    pub fn sequence(predecessor: TopicId, successor: TopicId) -> Self {
        Self::new(
            RelationKind::Sequence,
            RolePlayer {
                topic: predecessor,
                role: Role::Predecessor,
            },
            RolePlayer {
                topic: successor,
                role: Role::Successor,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_text_ignores_blank_and_non_text_values() {
        let topic = TopicRecord::new(TopicId(1), "dita.processor", "html build")
            .with_child(OUTPUT_FORMAT_PROPERTY, "   ")
            .with_child("dita.copies", PropertyValue::Integer(3));

        assert_eq!(topic.child_text(OUTPUT_FORMAT_PROPERTY), None);
        assert_eq!(topic.child_text("dita.copies"), None);
        assert_eq!(topic.child_text("missing"), None);
    }

    #[test]
    fn child_text_trims_values() {
        let topic = TopicRecord::new(TopicId(1), "dita.processor", "html build")
            .with_child(OUTPUT_FORMAT_PROPERTY, " html5\n");
        assert_eq!(topic.child_text(OUTPUT_FORMAT_PROPERTY), Some("html5"));
    }
}
