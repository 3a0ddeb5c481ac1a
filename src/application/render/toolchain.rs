use std::{
    ffi::OsString,
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Instant,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::render::runtime::ExecutionContext;
use crate::application::render::types::RenderJob;

/// Marker directory whose presence identifies an installed toolchain.
pub const INSTALL_MARKER: &str = "config";
const CONFIGURATION_FILE: &str = "configuration.properties";
const TRANSTYPES_KEY: &str = "transtypes";

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("DITA-OT launcher unavailable at {}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn DITA-OT launcher")]
    Io(#[source] io::Error),
    #[error("DITA-OT invocation failed (exit {exit_code:?}): {stderr}")]
    Cli {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("failed to read toolchain configuration {}", .path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// External rendering toolchain driven by the pipeline invoker.
pub trait Toolchain: Send + Sync {
    /// Output formats the installation supports, in declaration order.
    fn supported_formats(&self) -> Result<Vec<String>, ToolchainError>;

    /// Context isolating the toolchain from the host's dependency resolution.
    fn isolated_context(&self) -> ExecutionContext;

    /// Render `job` inside `context`. Blocks until the toolchain exits.
    fn run(&self, context: &ExecutionContext, job: &RenderJob) -> Result<(), ToolchainError>;
}

/// DITA Open Toolkit driven through its `dita` command-line launcher.
#[derive(Debug, Clone)]
pub struct DitaCli {
    install_dir: PathBuf,
    launcher: PathBuf,
}

impl DitaCli {
    /// `executable` is resolved against `install_dir` unless absolute.
    /// A relative `install_dir` is anchored at the current directory, since
    /// the launcher runs with the installation as its working directory.
    pub fn new(install_dir: impl Into<PathBuf>, executable: &Path) -> Self {
        let install_dir = absolute_or_given(install_dir.into());
        let launcher = if executable.is_absolute() {
            executable.to_path_buf()
        } else {
            install_dir.join(executable)
        };
        Self {
            install_dir,
            launcher,
        }
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }
}

impl Toolchain for DitaCli {
    fn supported_formats(&self) -> Result<Vec<String>, ToolchainError> {
        let path = self.install_dir.join(INSTALL_MARKER).join(CONFIGURATION_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(parse_transtypes(&contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    target = "application::render::toolchain",
                    op = "toolchain::supported_formats",
                    path = %path.display(),
                    "Toolchain configuration missing; no output formats advertised"
                );
                Ok(Vec::new())
            }
            Err(source) => Err(ToolchainError::Configuration { path, source }),
        }
    }

    fn isolated_context(&self) -> ExecutionContext {
        ExecutionContext::inherited()
            .with_working_dir(&self.install_dir)
            .with_var("DITA_HOME", &self.install_dir)
            .without_var("CLASSPATH")
    }

    fn run(&self, context: &ExecutionContext, job: &RenderJob) -> Result<(), ToolchainError> {
        let started_at = Instant::now();

        let mut command = Command::new(&self.launcher);
        command
            .arg(flag("--input=", &job.input))
            .arg(flag("--output=", &job.output_dir))
            .arg(format!("--format={}", job.format))
            .arg(flag("--temp=", &job.temp_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        context.apply(&mut command);

        let output = command.output().map_err(|err| {
            warn!(
                target = "application::render::toolchain",
                op = "toolchain::run",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = "spawn_cli",
                launcher = %self.launcher.display(),
                error = %err,
                "Failed to spawn DITA-OT launcher"
            );
            if err.kind() == ErrorKind::NotFound {
                ToolchainError::NotFound {
                    path: self.launcher.clone(),
                    source: err,
                }
            } else {
                ToolchainError::Io(err)
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(
                target = "application::render::toolchain",
                op = "toolchain::run",
                stdout = %stdout.trim_end(),
                "DITA-OT output"
            );
        }

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "application::render::toolchain",
                op = "toolchain::run",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "dita_cli",
                stderr = %stderr,
                "DITA-OT invocation failed"
            );
            return Err(ToolchainError::Cli { exit_code, stderr });
        }

        info!(
            target = "application::render::toolchain",
            op = "toolchain::run",
            result = "success",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            format = %job.format,
            output_dir = %job.output_dir.display(),
            "DITA-OT processing successful"
        );
        Ok(())
    }
}

pub(crate) fn absolute_or_given(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

fn flag(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path.as_os_str());
    arg
}

/// Extract the `transtypes` list from a Java-style properties file.
fn parse_transtypes(contents: &str) -> Vec<String> {
    let mut formats: Vec<String> = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((key, value)) = line.split_once(['=', ':']) else {
            continue;
        };
        if key.trim() != TRANSTYPES_KEY {
            continue;
        }
        for format in value.split([';', ',', '|']).map(str::trim) {
            if !format.is_empty() && !formats.iter().any(|known| known == format) {
                formats.push(format.to_string());
            }
        }
    }
    formats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_transtypes_from_properties() {
        let properties = "\
# generated by the integrator
default.language = en
transtypes = html5;pdf | xhtml,html5
! trailing comment
";
        assert_eq!(parse_transtypes(properties), vec!["html5", "pdf", "xhtml"]);
    }

    #[test]
    fn missing_configuration_yields_no_formats() {
        let dir = TempDir::new().expect("temp dir");
        let cli = DitaCli::new(dir.path(), Path::new("bin/dita"));
        assert!(cli.supported_formats().expect("formats").is_empty());
    }

    #[test]
    fn reads_formats_from_installation() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir_all(dir.path().join(INSTALL_MARKER)).expect("config dir");
        fs::write(
            dir.path().join(INSTALL_MARKER).join(CONFIGURATION_FILE),
            "transtypes=html5;pdf\n",
        )
        .expect("write properties");

        let cli = DitaCli::new(dir.path(), Path::new("bin/dita"));
        assert_eq!(cli.supported_formats().expect("formats"), vec!["html5", "pdf"]);
    }

    #[test]
    fn isolated_context_points_at_installation() {
        let cli = DitaCli::new("/opt/dita-ot", Path::new("bin/dita"));
        let context = cli.isolated_context();

        assert_eq!(cli.launcher(), Path::new("/opt/dita-ot/bin/dita"));
        assert_eq!(context.working_dir(), Some(Path::new("/opt/dita-ot")));
        assert_eq!(
            context.var("DITA_HOME"),
            Some(Path::new("/opt/dita-ot").as_os_str())
        );
        assert!(context.removes("CLASSPATH"));
    }

    #[test]
    fn absolute_launcher_is_used_verbatim() {
        let cli = DitaCli::new("/opt/dita-ot", Path::new("/usr/local/bin/dita"));
        assert_eq!(cli.launcher(), Path::new("/usr/local/bin/dita"));
    }

    #[test]
    fn missing_launcher_is_reported_as_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let cli = DitaCli::new(dir.path(), Path::new("bin/dita"));
        let job = RenderJob {
            input: dir.path().join("1.xml"),
            output_dir: dir.path().join("out"),
            temp_dir: dir.path().join("tmp"),
            format: "html5".to_string(),
        };

        let err = cli
            .run(&ExecutionContext::inherited(), &job)
            .expect_err("launcher missing");
        assert!(matches!(err, ToolchainError::NotFound { .. }), "{err:?}");
    }

    #[cfg(unix)]
    mod cli {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn make_executable(path: &Path) {
            let mut perms = fs::metadata(path).expect("metadata").permissions();
            perms.set_mode(0o755);
            fs::set_permissions(path, perms).expect("set perms");
        }

        fn install_launcher(dir: &Path, script: &str) -> DitaCli {
            let bin = dir.join("bin");
            fs::create_dir_all(&bin).expect("bin dir");
            let launcher = bin.join("dita");
            fs::write(&launcher, script).expect("write script");
            make_executable(&launcher);
            DitaCli::new(dir, Path::new("bin/dita"))
        }

        fn job(dir: &Path) -> RenderJob {
            RenderJob {
                input: dir.join("work").join("42.xml"),
                output_dir: dir.join("out"),
                temp_dir: dir.join("work"),
                format: "html5".to_string(),
            }
        }

        #[test]
        fn passes_job_arguments_and_context_to_launcher() {
            let dir = TempDir::new().expect("temp dir");
            let log = dir.path().join("invocation.log");
            let script = format!(
                r#"#!/bin/sh
set -eu
for arg in "$@"; do echo "$arg" >> "{log}"; done
echo "home=$DITA_HOME" >> "{log}"
echo "classpath=${{CLASSPATH:-unset}}" >> "{log}"
echo "cwd=$(pwd -P)" >> "{log}"
"#,
                log = log.display()
            );
            let cli = install_launcher(dir.path(), &script);

            cli.run(&cli.isolated_context(), &job(dir.path()))
                .expect("launcher succeeds");

            let logged = fs::read_to_string(&log).expect("read log");
            let lines: Vec<_> = logged.lines().collect();
            let input = format!("--input={}", dir.path().join("work/42.xml").display());
            let output = format!("--output={}", dir.path().join("out").display());
            let temp = format!("--temp={}", dir.path().join("work").display());
            assert_eq!(lines[0], input);
            assert_eq!(lines[1], output);
            assert_eq!(lines[2], "--format=html5");
            assert_eq!(lines[3], temp);
            assert_eq!(lines[4], format!("home={}", dir.path().display()));
            assert_eq!(lines[5], "classpath=unset");
            let cwd = dir.path().canonicalize().expect("canonical dir");
            assert_eq!(lines[6], format!("cwd={}", cwd.display()));
        }

        #[test]
        fn relative_install_dir_is_anchored_before_running() {
            let dir = TempDir::new_in(".").expect("temp dir in working directory");
            let name = dir.path().file_name().expect("temp dir name");
            let log = dir.path().join("ran.log");
            install_launcher(
                dir.path(),
                &format!("#!/bin/sh\necho ran > \"{}\"\n", log.display()),
            );

            let cli = DitaCli::new(Path::new(name), Path::new("bin/dita"));

            assert!(cli.launcher().is_absolute());
            assert!(cli.launcher().ends_with(Path::new(name).join("bin/dita")));
            cli.run(&cli.isolated_context(), &job(dir.path()))
                .expect("launcher found from its own working directory");
            assert_eq!(fs::read_to_string(&log).expect("read log"), "ran\n");
        }

        #[test]
        fn surfaces_launcher_errors() {
            let dir = TempDir::new().expect("temp dir");
            let cli = install_launcher(
                dir.path(),
                "#!/bin/sh\necho \"Error: [DOTA001F] invalid transtype\" >&2\nexit 3\n",
            );

            let err = cli
                .run(&cli.isolated_context(), &job(dir.path()))
                .expect_err("expected cli failure");
            match err {
                ToolchainError::Cli { exit_code, stderr } => {
                    assert_eq!(exit_code, Some(3));
                    assert!(stderr.contains("DOTA001F"), "stderr did not propagate: {stderr}");
                }
                other => panic!("unexpected error variant: {other:?}"),
            }
        }
    }
}
