//! Top-level publish run: resolve, export, render.

use std::{path::PathBuf, sync::Arc, time::Instant};

use tracing::info;

use crate::application::{
    error::PublishError,
    export::{DocumentExporter, ExportError},
    render::{PipelineInvoker, RenderReport, Toolchain},
    repos::{RepoError, TopicStore},
    sequence::SequenceResolver,
};
use crate::domain::types::TopicId;

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Topics of the resolved sequence, in order.
    pub sequence: Vec<TopicId>,
    /// Intermediate document handed to the toolchain.
    pub document: PathBuf,
    pub render: RenderReport,
}

pub struct PublishProcess<S, E, T>
where
    S: TopicStore + ?Sized,
    E: DocumentExporter + ?Sized,
    T: Toolchain + ?Sized,
{
    store: Arc<S>,
    resolver: SequenceResolver<S>,
    exporter: Arc<E>,
    invoker: PipelineInvoker<S, T>,
}

impl<S, E, T> PublishProcess<S, E, T>
where
    S: TopicStore + ?Sized,
    E: DocumentExporter + ?Sized,
    T: Toolchain + ?Sized,
{
    pub fn new(store: Arc<S>, exporter: Arc<E>, invoker: PipelineInvoker<S, T>) -> Self {
        Self {
            resolver: SequenceResolver::new(Arc::clone(&store)),
            store,
            exporter,
            invoker,
        }
    }

    /// Publish the topic graph `container_id` as configured by `processor_id`.
    ///
    /// Each step runs only after the previous one succeeded; the first failure
    /// is returned unchanged.
    pub fn run(
        &self,
        processor_id: TopicId,
        container_id: TopicId,
    ) -> Result<PublishOutcome, PublishError> {
        let started_at = Instant::now();

        let sequence = self.resolver.resolve(processor_id)?;
        let container = self.store.require_topic(container_id).map_err(|err| match err {
            RepoError::NotFound { .. } => {
                PublishError::from(ExportError::ContainerNotFound { container_id })
            }
            other => PublishError::from(other),
        })?;

        let document = self.exporter.export(&container, &sequence)?;
        let render = self.invoker.render(processor_id, container_id)?;

        info!(
            target = "application::publish",
            op = "publish::run",
            result = "success",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            processor_id = %processor_id,
            container_id = %container_id,
            topics = sequence.len(),
            "Publish run finished"
        );
        Ok(PublishOutcome {
            sequence: sequence.iter().map(|topic| topic.id).collect(),
            document,
            render,
        })
    }
}
