use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::domain::types::TopicId;

/// Command-line arguments for the topicpress binary.
#[derive(Debug, Parser)]
#[command(
    name = "topicpress",
    version,
    about = "Publish topic graphs through the DITA Open Toolkit"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TOPICPRESS_CONFIG_FILE",
        value_name = "PATH",
        global = true,
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Resolve, export and render one topic graph.
    Render(RenderArgs),
    /// Print the resolved topic sequence of a processor configuration as JSON.
    Sequence(SequenceArgs),
    /// List the output formats supported by the installed toolchain.
    Formats(ToolchainArgs),
    /// Unpack the bundled toolchain unless it is already installed.
    Bootstrap(ToolchainArgs),
}

impl Command {
    pub fn overrides(&self) -> &RuntimeOverrides {
        match self {
            Command::Render(args) => &args.overrides,
            Command::Sequence(args) => &args.overrides,
            Command::Formats(args) | Command::Bootstrap(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct StoreArgs {
    /// Topic graph archive (TOML) to load into the content store.
    #[arg(long = "store", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub store: PathBuf,

    /// Id of the processor configuration topic.
    #[arg(long = "processor", value_name = "ID")]
    pub processor: TopicId,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub source: StoreArgs,

    /// Id of the topic graph (container) to publish.
    #[arg(long = "topicmap", value_name = "ID")]
    pub topicmap: TopicId,

    #[command(flatten)]
    pub overrides: RuntimeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct SequenceArgs {
    #[command(flatten)]
    pub source: StoreArgs,

    #[command(flatten)]
    pub overrides: RuntimeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ToolchainArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the toolchain installation directory.
    #[arg(long = "install-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub install_dir: Option<PathBuf>,

    /// Override the directory receiving rendered output.
    #[arg(long = "output-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Override the working directory for intermediate documents.
    #[arg(long = "temp-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub temp_dir: Option<PathBuf>,

    /// Override the toolchain launcher, relative to the installation directory.
    #[arg(long = "toolchain-executable", value_name = "PATH")]
    pub toolchain_executable: Option<PathBuf>,

    /// Override the bundled toolchain archive used by bootstrap.
    #[arg(
        long = "toolchain-bundle",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub toolchain_bundle: Option<PathBuf>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
