//! Working directory resolution.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

use crate::config::DirSettings;

pub const INSTALL_DIR_NAME: &str = "dita-ot";
pub const OUTPUT_DIR_NAME: &str = "dita-output";
pub const TEMP_DIR_NAME: &str = "dita-temp";
const FALLBACK_ROOT: &str = "topicpress";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("failed to create directory {}", .path.display())]
    DirectoryCreationFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The three directories every run works in, absolute and existing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDirs {
    /// Toolchain installation.
    pub install: PathBuf,
    /// Rendered artifacts.
    pub output: PathBuf,
    /// Intermediate documents and toolchain scratch space.
    pub temp: PathBuf,
}

impl WorkDirs {
    pub fn resolve(settings: &DirSettings) -> Result<Self, DirectoryError> {
        Ok(Self {
            install: resolve_dir(settings.install_dir.as_deref(), INSTALL_DIR_NAME)?,
            output: resolve_dir(settings.output_dir.as_deref(), OUTPUT_DIR_NAME)?,
            temp: resolve_dir(settings.temp_dir.as_deref(), TEMP_DIR_NAME)?,
        })
    }
}

/// Use `configured` or fall back to `<system temp>/topicpress/<fallback_name>`;
/// the result is absolute and exists on return.
pub fn resolve_dir(
    configured: Option<&Path>,
    fallback_name: &str,
) -> Result<PathBuf, DirectoryError> {
    resolve_dir_under(configured, &env::temp_dir(), fallback_name)
}

fn resolve_dir_under(
    configured: Option<&Path>,
    fallback_base: &Path,
    fallback_name: &str,
) -> Result<PathBuf, DirectoryError> {
    let path = match configured {
        Some(path) => path.to_path_buf(),
        None => fallback_base.join(FALLBACK_ROOT).join(fallback_name),
    };
    let creation_failure = |source| DirectoryError::DirectoryCreationFailure {
        path: path.clone(),
        source,
    };

    let path = std::path::absolute(&path).map_err(creation_failure)?;
    fs::create_dir_all(&path).map_err(creation_failure)?;

    debug!(
        target = "infra::dirs",
        op = "dirs::resolve",
        name = fallback_name,
        path = %path.display(),
        "Working directory ready"
    );
    Ok(path)
}
