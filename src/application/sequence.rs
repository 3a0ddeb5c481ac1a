//! Resolves the authoring order of a topic chain.
//!
//! Order is encoded implicitly in the content store: a processor configuration
//! points at its start topic through a `processor_start` relation, and every
//! topic points at the next one through a `sequence` relation. The resolver
//! turns that chain into an explicit list.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{RepoError, TopicStore};
use crate::domain::entities::TopicRecord;
use crate::domain::types::{RelationKind, Role, TopicId};

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("no start topic defined for processor {processor_id}")]
    NoStartTopic { processor_id: TopicId },
    #[error("processor {processor_id} has {count} start topics; exactly one is required")]
    MultipleStartTopics { processor_id: TopicId, count: usize },
    #[error("topic {topic_id} has {count} successors; sequences must not branch")]
    BranchingSequence { topic_id: TopicId, count: usize },
    #[error("sequence revisits topic {topic_id} after {length} topics")]
    SequenceCycle { topic_id: TopicId, length: usize },
    #[error("finding {step} failed")]
    SequenceLookupFailure {
        step: &'static str,
        #[source]
        source: RepoError,
    },
}

impl SequenceError {
    fn lookup(step: &'static str) -> impl FnOnce(RepoError) -> Self {
        move |source| Self::SequenceLookupFailure { step, source }
    }
}

pub struct SequenceResolver<S: TopicStore + ?Sized> {
    store: Arc<S>,
}

impl<S: TopicStore + ?Sized> SequenceResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Walk from the processor's start topic along successor relations.
    ///
    /// Returns topics in discovery order. A chain whose last topic has no
    /// successor ends there; a second start relation, a second successor or a
    /// revisited topic fail the whole resolution.
    pub fn resolve(&self, processor_id: TopicId) -> Result<Vec<TopicRecord>, SequenceError> {
        let mut sequence = Vec::new();
        let mut visited = HashSet::new();

        let mut current = Some(self.start_topic(processor_id)?);
        while let Some(topic_id) = current {
            if !visited.insert(topic_id) {
                return Err(SequenceError::SequenceCycle {
                    topic_id,
                    length: sequence.len(),
                });
            }

            let topic = self
                .store
                .require_topic(topic_id)
                .map_err(SequenceError::lookup("topic in sequence"))?;
            debug!(
                target = "application::sequence",
                position = sequence.len(),
                topic_id = %topic_id,
                "Topic appended to sequence"
            );
            sequence.push(topic);

            current = self.next_topic(topic_id)?;
        }

        metrics::histogram!("topicpress_sequence_length").record(sequence.len() as f64);
        info!(
            target = "application::sequence",
            op = "sequence::resolve",
            processor_id = %processor_id,
            topics = sequence.len(),
            "Topics in sequence: {}",
            sequence.len()
        );
        Ok(sequence)
    }

    fn start_topic(&self, processor_id: TopicId) -> Result<TopicId, SequenceError> {
        let starts = self
            .store
            .related_topics(
                processor_id,
                RelationKind::ProcessorStart,
                Role::Processor,
                Role::Start,
            )
            .map_err(SequenceError::lookup("start topic"))?;

        match starts.as_slice() {
            [] => Err(SequenceError::NoStartTopic { processor_id }),
            [start] => Ok(*start),
            many => Err(SequenceError::MultipleStartTopics {
                processor_id,
                count: many.len(),
            }),
        }
    }

    fn next_topic(&self, topic_id: TopicId) -> Result<Option<TopicId>, SequenceError> {
        let successors = self
            .store
            .related_topics(
                topic_id,
                RelationKind::Sequence,
                Role::Predecessor,
                Role::Successor,
            )
            .map_err(SequenceError::lookup("next topic in sequence"))?;

        match successors.as_slice() {
            [] => Ok(None),
            [next] => Ok(Some(*next)),
            many => Err(SequenceError::BranchingSequence {
                topic_id,
                count: many.len(),
            }),
        }
    }
}
