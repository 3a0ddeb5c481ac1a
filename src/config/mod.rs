//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{
    CliArgs, Command, RenderArgs, RuntimeOverrides, SequenceArgs, StoreArgs, ToolchainArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "topicpress";
const ENV_PREFIX: &str = "TOPICPRESS";
pub(crate) const DEFAULT_TOOLCHAIN_EXECUTABLE: &str = "bin/dita";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub dirs: DirSettings,
    pub toolchain: ToolchainSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Configured working directories. `None` selects the temp-dir fallback.
#[derive(Debug, Clone, Default)]
pub struct DirSettings {
    pub install_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ToolchainSettings {
    /// Launcher path; relative paths resolve against the install directory.
    pub executable: PathBuf,
    /// Bundled toolchain archive; `None` selects `<exe dir>/resources/dita-ot.zip`.
    pub bundle_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    dirs: RawDirSettings,
    toolchain: RawToolchainSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(dir) = overrides.install_dir.as_ref() {
            self.dirs.install_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.output_dir.as_ref() {
            self.dirs.output_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.temp_dir.as_ref() {
            self.dirs.temp_dir = Some(dir.clone());
        }
        if let Some(path) = overrides.toolchain_executable.as_ref() {
            self.toolchain.executable = Some(path.clone());
        }
        if let Some(path) = overrides.toolchain_bundle.as_ref() {
            self.toolchain.bundle_path = Some(path.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            dirs,
            toolchain,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let dirs = build_dir_settings(dirs)?;
        let toolchain = build_toolchain_settings(toolchain)?;

        Ok(Self {
            logging,
            dirs,
            toolchain,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_dir_settings(dirs: RawDirSettings) -> Result<DirSettings, LoadError> {
    Ok(DirSettings {
        install_dir: non_empty_path(dirs.install_dir, "dirs.install_dir")?,
        output_dir: non_empty_path(dirs.output_dir, "dirs.output_dir")?,
        temp_dir: non_empty_path(dirs.temp_dir, "dirs.temp_dir")?,
    })
}

fn build_toolchain_settings(
    toolchain: RawToolchainSettings,
) -> Result<ToolchainSettings, LoadError> {
    let executable = toolchain
        .executable
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TOOLCHAIN_EXECUTABLE));
    if executable.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "toolchain.executable",
            "path must not be empty",
        ));
    }

    let bundle_path = non_empty_path(toolchain.bundle_path, "toolchain.bundle_path")?;

    Ok(ToolchainSettings {
        executable,
        bundle_path,
    })
}

fn non_empty_path(
    path: Option<PathBuf>,
    key: &'static str,
) -> Result<Option<PathBuf>, LoadError> {
    match path {
        Some(path) if path.as_os_str().is_empty() => {
            Err(LoadError::invalid(key, "path must not be empty"))
        }
        other => Ok(other),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDirSettings {
    install_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawToolchainSettings {
    executable: Option<PathBuf>,
    bundle_path: Option<PathBuf>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
