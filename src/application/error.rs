use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{
        export::ExportError,
        render::{RenderError, ToolchainError},
        repos::RepoError,
        sequence::SequenceError,
    },
    config::LoadError,
    domain::error::DomainError,
    infra::{bootstrap::BootstrapError, dirs::DirectoryError, error::InfraError},
};

/// Flattened cause chain of a failure, outermost message first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    /// Messages joined into a single line: `outer: inner: root`.
    pub fn chain(&self) -> String {
        self.messages.join(": ")
    }
}

/// Any failure of a publish run or of the startup steps preceding it.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl PublishError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Short machine-readable classification used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            PublishError::Sequence(_) => "sequence",
            PublishError::Export(_) => "export",
            PublishError::Render(_) => "render",
            PublishError::Toolchain(_) => "toolchain",
            PublishError::Bootstrap(_) => "bootstrap",
            PublishError::Directory(_) => "directory",
            PublishError::Repo(_) => "store",
            PublishError::Domain(_) => "content",
            PublishError::Infra(InfraError::Telemetry(_)) => "telemetry",
            PublishError::Infra(_) => "infra",
            PublishError::Config(_) => "config",
            PublishError::Unexpected(_) => "unexpected",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::PublishError", self)
    }
}
