use std::{path::PathBuf, sync::Arc, time::Instant};

use tracing::{info, warn};

use crate::application::export::intermediate_document_path;
use crate::application::render::runtime::RuntimeContext;
use crate::application::render::toolchain::{Toolchain, ToolchainError, absolute_or_given};
use crate::application::render::types::{RenderError, RenderJob, RenderReport};
use crate::application::repos::{RepoError, TopicStore};
use crate::domain::entities::OUTPUT_FORMAT_PROPERTY;
use crate::domain::types::TopicId;

/// Hands intermediate documents to the rendering toolchain.
pub struct PipelineInvoker<S: TopicStore + ?Sized, T: Toolchain + ?Sized> {
    store: Arc<S>,
    toolchain: Arc<T>,
    runtime: RuntimeContext,
    temp_dir: PathBuf,
    output_dir: PathBuf,
    formats: Vec<String>,
}

impl<S: TopicStore + ?Sized, T: Toolchain + ?Sized> PipelineInvoker<S, T> {
    /// Build an invoker and query the toolchain's output formats once.
    ///
    /// Relative directories are anchored at the current directory before the
    /// toolchain switches into its own.
    pub fn new(
        store: Arc<S>,
        toolchain: Arc<T>,
        runtime: RuntimeContext,
        temp_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, ToolchainError> {
        let formats = toolchain.supported_formats()?;
        info!(
            target = "application::render::pipeline",
            op = "pipeline::init",
            formats = %formats.join(","),
            "Supported output formats: {}",
            formats.len()
        );
        Ok(Self {
            store,
            toolchain,
            runtime,
            temp_dir: absolute_or_given(temp_dir.into()),
            output_dir: absolute_or_given(output_dir.into()),
            formats,
        })
    }

    /// Output formats advertised by the toolchain at startup.
    pub fn supported_formats(&self) -> &[String] {
        &self.formats
    }

    /// Read the output format configured on a processor configuration topic.
    pub fn output_format(&self, processor_id: TopicId) -> Result<String, RenderError> {
        let processor = self.store.require_topic(processor_id).map_err(|err| match err {
            RepoError::NotFound { .. } => RenderError::ProcessorNotFound { processor_id },
            source => RenderError::Lookup {
                processor_id,
                source,
            },
        })?;

        processor
            .child_text(OUTPUT_FORMAT_PROPERTY)
            .map(str::to_string)
            .ok_or(RenderError::OutputFormatMissing { processor_id })
    }

    /// Render `<temp_dir>/<container_id>.xml` in the processor's output format.
    ///
    /// The toolchain runs inside its isolated execution context; the ambient
    /// context is restored before this returns, whatever the outcome.
    pub fn render(
        &self,
        processor_id: TopicId,
        container_id: TopicId,
    ) -> Result<RenderReport, RenderError> {
        let format = self.output_format(processor_id)?;
        if !self.formats.is_empty() && !self.formats.contains(&format) {
            warn!(
                target = "application::render::pipeline",
                op = "pipeline::render",
                processor_id = %processor_id,
                format = %format,
                "Output format is not advertised by the toolchain"
            );
        }

        let job = RenderJob {
            input: intermediate_document_path(&self.temp_dir, container_id),
            output_dir: self.output_dir.clone(),
            temp_dir: self.temp_dir.clone(),
            format,
        };

        let started_at = Instant::now();
        let outcome = {
            let scope = self.runtime.enter(self.toolchain.isolated_context());
            self.toolchain.run(scope.context(), &job)
        };
        let elapsed = started_at.elapsed();

        let result = if outcome.is_ok() { "success" } else { "error" };
        metrics::counter!("topicpress_render_total", "result" => result).increment(1);
        metrics::histogram!("topicpress_render_ms").record(elapsed.as_secs_f64() * 1000.0);

        outcome.map_err(|source| RenderError::RenderFailure {
            input: job.input.clone(),
            format: job.format.clone(),
            source,
        })?;

        info!(
            target = "application::render::pipeline",
            op = "pipeline::render",
            result = "success",
            elapsed_ms = elapsed.as_millis() as u64,
            processor_id = %processor_id,
            container_id = %container_id,
            format = %job.format,
            "Rendering finished"
        );
        Ok(RenderReport {
            processor_id,
            container_id,
            job,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Mutex;

    use crate::application::render::runtime::ExecutionContext;
    use crate::domain::entities::TopicRecord;
    use crate::infra::store::InMemoryTopicStore;

    const PROCESSOR: TopicId = TopicId(100);
    const CONTAINER: TopicId = TopicId(500);

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    struct RecordingToolchain {
        behaviour: Behaviour,
        calls: Mutex<Vec<(ExecutionContext, RenderJob)>>,
    }

    impl RecordingToolchain {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(ExecutionContext, RenderJob)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl Toolchain for RecordingToolchain {
        fn supported_formats(&self) -> Result<Vec<String>, ToolchainError> {
            Ok(vec!["html5".to_string(), "pdf".to_string()])
        }

        fn isolated_context(&self) -> ExecutionContext {
            ExecutionContext::inherited()
                .with_working_dir("/opt/dita-ot")
                .with_var("DITA_HOME", "/opt/dita-ot")
                .without_var("CLASSPATH")
        }

        fn run(&self, context: &ExecutionContext, job: &RenderJob) -> Result<(), ToolchainError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((context.clone(), job.clone()));
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(ToolchainError::Cli {
                    exit_code: Some(1),
                    stderr: "boom".to_string(),
                }),
                Behaviour::Panic => panic!("toolchain crashed"),
            }
        }
    }

    fn store_with_processor(format: Option<&str>) -> Arc<InMemoryTopicStore> {
        let mut processor = TopicRecord::new(PROCESSOR, "dita.processor", "Guide to HTML");
        if let Some(format) = format {
            processor = processor.with_child(OUTPUT_FORMAT_PROPERTY, format);
        }
        let mut store = InMemoryTopicStore::default();
        store.add_topic(processor);
        Arc::new(store)
    }

    fn ambient() -> ExecutionContext {
        ExecutionContext::inherited().with_var("CLASSPATH", "/host/lib")
    }

    fn invoker(
        store: Arc<InMemoryTopicStore>,
        toolchain: Arc<RecordingToolchain>,
    ) -> PipelineInvoker<InMemoryTopicStore, RecordingToolchain> {
        PipelineInvoker::new(
            store,
            toolchain,
            RuntimeContext::new(ambient()),
            "/work/dita-temp",
            "/work/dita-output",
        )
        .expect("invoker")
    }

    #[test]
    fn invokes_toolchain_once_with_intermediate_document() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Succeed));
        let invoker = invoker(store_with_processor(Some("html5")), toolchain.clone());

        let report = invoker.render(PROCESSOR, CONTAINER).expect("render");

        let calls = toolchain.calls();
        assert_eq!(calls.len(), 1);
        let (context, job) = &calls[0];
        assert_eq!(job.input, PathBuf::from("/work/dita-temp/500.xml"));
        assert_eq!(job.output_dir, PathBuf::from("/work/dita-output"));
        assert_eq!(job.temp_dir, PathBuf::from("/work/dita-temp"));
        assert_eq!(job.format, "html5");
        assert!(context.removes("CLASSPATH"));
        assert_eq!(&report.job, job);
        assert_eq!(report.container_id, CONTAINER);
        assert_eq!(invoker.runtime.current(), ambient());
    }

    #[test]
    fn missing_output_format_fails_before_invocation() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Succeed));
        let invoker = invoker(store_with_processor(None), toolchain.clone());

        let err = invoker.render(PROCESSOR, CONTAINER).expect_err("no format");

        assert!(matches!(
            err,
            RenderError::OutputFormatMissing { processor_id } if processor_id == PROCESSOR
        ));
        assert!(toolchain.calls().is_empty());
    }

    #[test]
    fn blank_output_format_counts_as_missing() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Succeed));
        let invoker = invoker(store_with_processor(Some("   ")), toolchain.clone());

        let err = invoker.render(PROCESSOR, CONTAINER).expect_err("blank format");
        assert!(matches!(err, RenderError::OutputFormatMissing { .. }));
        assert!(toolchain.calls().is_empty());
    }

    #[test]
    fn unknown_processor_is_reported() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Succeed));
        let invoker = invoker(store_with_processor(Some("html5")), toolchain.clone());

        let err = invoker.render(TopicId(7), CONTAINER).expect_err("unknown");
        assert!(matches!(
            err,
            RenderError::ProcessorNotFound { processor_id } if processor_id == TopicId(7)
        ));
    }

    #[test]
    fn toolchain_failure_is_wrapped_and_context_restored() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Fail));
        let invoker = invoker(store_with_processor(Some("pdf")), toolchain.clone());

        let err = invoker.render(PROCESSOR, CONTAINER).expect_err("toolchain fails");

        match err {
            RenderError::RenderFailure {
                input,
                format,
                source,
            } => {
                assert_eq!(input, PathBuf::from("/work/dita-temp/500.xml"));
                assert_eq!(format, "pdf");
                assert!(matches!(source, ToolchainError::Cli { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(invoker.runtime.current(), ambient());
    }

    #[test]
    fn context_restored_when_toolchain_panics() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Panic));
        let invoker = invoker(store_with_processor(Some("html5")), toolchain.clone());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            invoker.render(PROCESSOR, CONTAINER).is_ok()
        }));

        assert!(outcome.is_err());
        assert_eq!(invoker.runtime.current(), ambient());
    }

    #[test]
    fn relative_work_dirs_are_passed_as_absolute_paths() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Succeed));
        let invoker = PipelineInvoker::new(
            store_with_processor(Some("html5")),
            toolchain.clone(),
            RuntimeContext::new(ambient()),
            "dita-temp",
            "dita-output",
        )
        .expect("invoker");

        invoker.render(PROCESSOR, CONTAINER).expect("render");

        let cwd = std::env::current_dir().expect("current dir");
        let (_, job) = &toolchain.calls()[0];
        assert_eq!(job.input, cwd.join("dita-temp").join("500.xml"));
        assert_eq!(job.temp_dir, cwd.join("dita-temp"));
        assert_eq!(job.output_dir, cwd.join("dita-output"));
    }

    #[test]
    fn exposes_formats_queried_at_startup() {
        let toolchain = Arc::new(RecordingToolchain::new(Behaviour::Succeed));
        let invoker = invoker(store_with_processor(Some("html5")), toolchain);

        assert_eq!(invoker.supported_formats(), ["html5", "pdf"]);
    }
}
