use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::application::render::toolchain::ToolchainError;
use crate::application::repos::RepoError;
use crate::domain::types::TopicId;

/// One toolchain invocation: which document to render, where, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    /// Intermediate document produced by the exporter.
    pub input: PathBuf,
    /// Directory receiving the rendered artifacts.
    pub output_dir: PathBuf,
    /// Base directory for the toolchain's own temporary files.
    pub temp_dir: PathBuf,
    /// Output format (DITA transtype), e.g. `html5` or `pdf`.
    pub format: String,
}

#[derive(Debug, Clone)]
pub struct RenderReport {
    pub processor_id: TopicId,
    pub container_id: TopicId,
    pub job: RenderJob,
    pub elapsed: Duration,
}

/// Errors surfaced by the pipeline invoker. Toolchain failures are wrapped
/// whole so callers can walk the cause chain.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("processor configuration {processor_id} not found")]
    ProcessorNotFound { processor_id: TopicId },
    #[error("output format not set on processor configuration {processor_id}")]
    OutputFormatMissing { processor_id: TopicId },
    #[error("reading processor configuration {processor_id} failed")]
    Lookup {
        processor_id: TopicId,
        #[source]
        source: RepoError,
    },
    #[error("DITA-OT processing of {} as `{format}` failed", .input.display())]
    RenderFailure {
        input: PathBuf,
        format: String,
        #[source]
        source: ToolchainError,
    },
}
