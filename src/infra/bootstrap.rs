//! Startup step making sure a DITA-OT installation is available.

use std::{
    env,
    fs::{self, File},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Instant,
};

use thiserror::Error;
use tracing::{info, warn};
use zip::{ZipArchive, result::ZipError};

use crate::{
    application::render::{DitaCli, INSTALL_MARKER},
    config::{Settings, ToolchainSettings},
    infra::dirs::{DirectoryError, WorkDirs},
};

const BUNDLE_DIR: &str = "resources";
const BUNDLE_FILE: &str = "dita-ot.zip";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bundled DITA-OT archive not found at {}", .path.display())]
    ToolchainUnavailable { path: PathBuf },
    #[error("failed to install DITA-OT at {}", .path.display())]
    BootstrapIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unreadable DITA-OT archive {}", .path.display())]
    BootstrapArchive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
}

impl BootstrapError {
    fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::BootstrapIo { path, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The marker directory was present; nothing was touched.
    AlreadyInstalled,
    /// The bundled archive was unpacked.
    Unpacked { entries: usize },
}

/// `<directory of the running executable>/resources/dita-ot.zip`.
pub fn default_bundle_path() -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    exe_dir.join(BUNDLE_DIR).join(BUNDLE_FILE)
}

/// Unpack the bundled toolchain into `install_dir` unless it is already there.
///
/// `bundle` defaults to [`default_bundle_path`].
pub fn ensure_toolchain_available(
    install_dir: &Path,
    bundle: Option<&Path>,
) -> Result<BootstrapOutcome, BootstrapError> {
    if install_dir.join(INSTALL_MARKER).is_dir() {
        info!(
            target = "infra::bootstrap",
            op = "bootstrap::ensure",
            result = "skipped",
            install_dir = %install_dir.display(),
            "DITA-OT already installed"
        );
        return Ok(BootstrapOutcome::AlreadyInstalled);
    }

    let bundle = bundle.map_or_else(default_bundle_path, Path::to_path_buf);
    let started_at = Instant::now();
    let entries = unpack(&bundle, install_dir)?;

    if !install_dir.join(INSTALL_MARKER).is_dir() {
        warn!(
            target = "infra::bootstrap",
            op = "bootstrap::ensure",
            bundle = %bundle.display(),
            "Archive did not contain the `{INSTALL_MARKER}` directory; bootstrap will rerun"
        );
    }
    info!(
        target = "infra::bootstrap",
        op = "bootstrap::ensure",
        result = "success",
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        entries,
        install_dir = %install_dir.display(),
        "DITA-OT unpacked"
    );
    Ok(BootstrapOutcome::Unpacked { entries })
}

fn unpack(bundle: &Path, install_dir: &Path) -> Result<usize, BootstrapError> {
    let file = File::open(bundle).map_err(|err| match err.kind() {
        ErrorKind::NotFound => BootstrapError::ToolchainUnavailable {
            path: bundle.to_path_buf(),
        },
        _ => BootstrapError::BootstrapIo {
            path: bundle.to_path_buf(),
            source: err,
        },
    })?;
    let archive_error = |source| BootstrapError::BootstrapArchive {
        path: bundle.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(file).map_err(archive_error)?;

    fs::create_dir_all(install_dir).map_err(BootstrapError::io(install_dir))?;

    let mut unpacked = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(
                target = "infra::bootstrap",
                op = "bootstrap::unpack",
                entry = entry.name(),
                "Skipping archive entry outside the install directory"
            );
            continue;
        };
        let target = install_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(BootstrapError::io(&target))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(BootstrapError::io(parent))?;
            }
            let mut out = File::create(&target).map_err(BootstrapError::io(&target))?;
            io::copy(&mut entry, &mut out).map_err(BootstrapError::io(&target))?;
        }

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(BootstrapError::io(&target))?;
        }
        unpacked += 1;
    }

    Ok(unpacked)
}

/// Working directories and toolchain location for one process.
#[derive(Debug, Clone)]
pub struct Runtime {
    dirs: WorkDirs,
    toolchain: ToolchainSettings,
}

impl Runtime {
    /// Resolve and create the working directories.
    pub fn prepare(settings: &Settings) -> Result<Self, DirectoryError> {
        Ok(Self {
            dirs: WorkDirs::resolve(&settings.dirs)?,
            toolchain: settings.toolchain.clone(),
        })
    }

    pub fn dirs(&self) -> &WorkDirs {
        &self.dirs
    }

    /// Make sure the install directory holds a toolchain.
    pub fn bootstrap(&self) -> Result<BootstrapOutcome, BootstrapError> {
        ensure_toolchain_available(&self.dirs.install, self.toolchain.bundle_path.as_deref())
    }

    pub fn toolchain(&self) -> DitaCli {
        DitaCli::new(&self.dirs.install, &self.toolchain.executable)
    }
}
