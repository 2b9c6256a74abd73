//! External conversion of proprietary track files to GPX.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of one conversion. `diagnostic` is the tool's own stderr text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub diagnostic: String,
}

impl ConversionResult {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            diagnostic: diagnostic.into(),
        }
    }
}

pub trait TrackConverter: Send + Sync {
    /// Convert `input` into a GPX file written at `output`
    fn convert_to_gpx(&self, input: &Path, output: &Path) -> ConversionResult;
}

/// Runs `gpsbabel` (or a compatible program) as a child process
#[derive(Debug, Clone)]
pub struct GpsBabel {
    program: PathBuf,
    timeout: Duration,
}

impl GpsBabel {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn args(input: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-t".into(),
            "-i".into(),
            "gdb,via=1".into(),
            "-f".into(),
            input.as_os_str().to_owned(),
            "-o".into(),
            "gpx".into(),
            "-F".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

impl TrackConverter for GpsBabel {
    fn convert_to_gpx(&self, input: &Path, output: &Path) -> ConversionResult {
        debug!("Running {:?} on {:?}", self.program, input);
        let mut child = match Command::new(&self.program)
            .args(Self::args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ConversionResult::failed(format!(
                    "Failed to start {}: {}",
                    self.program.display(),
                    e
                ));
            }
        };

        // Drain stderr on its own thread so a chatty tool cannot block on a full pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(
                        "{} exceeded {:?} converting {:?}; killing it",
                        self.program.display(),
                        self.timeout,
                        input
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    break Err(format!(
                        "{} timed out after {} seconds",
                        self.program.display(),
                        self.timeout.as_secs()
                    ));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => break Err(format!("Failed waiting for {}: {}", self.program.display(), e)),
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        match status {
            Ok(status) if status.success() => ConversionResult {
                success: true,
                output_path: Some(output.to_path_buf()),
                diagnostic: stderr,
            },
            Ok(status) if !stderr.trim().is_empty() => {
                debug!("{} exited with {}", self.program.display(), status);
                ConversionResult::failed(stderr)
            }
            Ok(status) => ConversionResult::failed(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )),
            Err(message) => ConversionResult::failed(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_fails_with_diagnostic() {
        let converter = GpsBabel::new("/nonexistent/gpsbabel", Duration::from_secs(5));
        let result = converter.convert_to_gpx(Path::new("in.gdb"), Path::new("out.gpx"));
        assert!(!result.success);
        assert!(result.output_path.is_none());
        assert!(result.diagnostic.contains("Failed to start"));
    }

    #[test]
    fn test_args_layout() {
        let args = GpsBabel::args(Path::new("a.gdb"), Path::new("b.gpx"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["-t", "-i", "gdb,via=1", "-f", "a.gdb", "-o", "gpx", "-F", "b.gpx"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_stderr_is_passed_through_verbatim() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-babel");
        std::fs::write(&script, "#!/bin/sh\necho 'GDB: Unsupported version' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter = GpsBabel::new(&script, Duration::from_secs(10));
        let result = converter.convert_to_gpx(Path::new("in.gdb"), &dir.path().join("out.gpx"));
        assert!(!result.success);
        assert_eq!(result.diagnostic, "GDB: Unsupported version\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_failure_reports_exit_status() {
        let converter = GpsBabel::new("/bin/false", Duration::from_secs(10));
        let result = converter.convert_to_gpx(Path::new("in.gdb"), Path::new("out.gpx"));
        assert!(!result.success);
        assert!(result.diagnostic.contains("exited with"));
    }
}
