use std::{path::Path, process, sync::Arc};

use topicpress::{
    application::{
        error::PublishError,
        export::DitaMapExporter,
        publish::PublishProcess,
        render::{PipelineInvoker, RuntimeContext, Toolchain},
        sequence::SequenceResolver,
    },
    config::{self, Command},
    infra::{
        bootstrap::{BootstrapOutcome, Runtime},
        store::{InMemoryTopicStore, TopicGraphArchive},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

fn main() {
    if let Err(error) = run() {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &PublishError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %report.chain(), code = error.code(), "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %report.chain(), code = error.code(), "application error");
    });
}

fn run() -> Result<(), PublishError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Sequence(args) => run_sequence(&args.source),
        Command::Render(args) => {
            let (runtime, _) = prepare_toolchain(&settings)?;
            run_render(&runtime, args)
        }
        Command::Formats(_) => {
            let (runtime, _) = prepare_toolchain(&settings)?;
            run_formats(&runtime)
        }
        Command::Bootstrap(_) => {
            let (runtime, outcome) = prepare_toolchain(&settings)?;
            let install = runtime.dirs().install.display();
            match outcome {
                BootstrapOutcome::AlreadyInstalled => {
                    println!("DITA-OT already installed at {install}")
                }
                BootstrapOutcome::Unpacked { entries } => {
                    println!("Unpacked {entries} entries into {install}")
                }
            }
            Ok(())
        }
    }
}

fn prepare_toolchain(
    settings: &config::Settings,
) -> Result<(Runtime, BootstrapOutcome), PublishError> {
    let runtime = Runtime::prepare(settings)?;
    let outcome = runtime.bootstrap()?;
    Ok((runtime, outcome))
}

fn load_store(path: &Path) -> Result<Arc<InMemoryTopicStore>, PublishError> {
    let archive = TopicGraphArchive::load(path)?;
    Ok(Arc::new(archive.into_store()))
}

fn run_sequence(source: &config::StoreArgs) -> Result<(), PublishError> {
    let store = load_store(&source.store)?;
    let sequence = SequenceResolver::new(store).resolve(source.processor)?;

    let rendered = serde_json::to_string_pretty(&sequence)
        .map_err(|err| PublishError::unexpected(format!("failed to encode sequence: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn run_formats(runtime: &Runtime) -> Result<(), PublishError> {
    for format in runtime.toolchain().supported_formats()? {
        println!("{format}");
    }
    Ok(())
}

fn run_render(runtime: &Runtime, args: config::RenderArgs) -> Result<(), PublishError> {
    let store = load_store(&args.source.store)?;
    let dirs = runtime.dirs();

    let invoker = PipelineInvoker::new(
        Arc::clone(&store),
        Arc::new(runtime.toolchain()),
        RuntimeContext::default(),
        &dirs.temp,
        &dirs.output,
    )?;
    let exporter = Arc::new(DitaMapExporter::new(&dirs.temp));
    let process = PublishProcess::new(store, exporter, invoker);

    let outcome = process.run(args.source.processor, args.topicmap)?;
    info!(
        target = "topicpress::render",
        topics = outcome.sequence.len(),
        document = %outcome.document.display(),
        "Render completed"
    );
    println!("{}", outcome.render.job.output_dir.display());
    Ok(())
}
