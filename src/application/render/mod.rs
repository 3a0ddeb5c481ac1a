//! Hands the exported document to the DITA Open Toolkit.
//!
//! The toolchain never sees the host's ambient environment: every invocation
//! runs inside the isolated [`ExecutionContext`] granted by a [`ContextScope`].

mod pipeline;
mod runtime;
mod toolchain;
mod types;

pub use pipeline::PipelineInvoker;
pub use runtime::{ContextScope, ExecutionContext, RuntimeContext};
pub use toolchain::{DitaCli, INSTALL_MARKER, Toolchain, ToolchainError};
pub use types::{RenderError, RenderJob, RenderReport};
