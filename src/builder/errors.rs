//! Build pipeline error types and diagnostics.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;
use crate::util::process::{ProcessBuilder, ProcessOutput};

/// Error raised by a pipeline stage. Every variant is fatal to the run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An external tool was absent, exited non-zero, or produced no usable output.
    #[error("`{command}` {reason}{}", format_captured(.stdout, .stderr))]
    ToolchainInvocation {
        command: String,
        reason: String,
        stdout: String,
        stderr: String,
    },

    /// The rewrite target was not present in generated source.
    #[error("pattern `{pattern}` not found in {}", .path.display())]
    PatchApplication { path: PathBuf, pattern: String },

    /// The host operating system has no platform profile.
    #[error("unsupported platform `{os}`")]
    PlatformConfiguration { os: String },
}

impl BuildError {
    /// The command could not be started at all.
    pub fn spawn_failed(cmd: &ProcessBuilder, err: &io::Error) -> Self {
        let reason = if err.kind() == io::ErrorKind::NotFound {
            format!(
                "could not be started: `{}` was not found on PATH",
                cmd.get_program().display()
            )
        } else {
            format!("could not be started: {}", err)
        };

        BuildError::ToolchainInvocation {
            command: cmd.display_command(),
            reason,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// The command ran but exited non-zero or was killed.
    pub fn exit_failed(cmd: &ProcessBuilder, output: &ProcessOutput) -> Self {
        let reason = match output.status.code() {
            Some(code) => format!("failed with exit code {}", code),
            None => "was terminated by a signal".to_string(),
        };

        BuildError::ToolchainInvocation {
            command: cmd.display_command(),
            reason,
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        }
    }

    /// The command exited zero but the expected output is missing or empty.
    pub fn missing_output(cmd: &ProcessBuilder, output: &ProcessOutput, path: &Path) -> Self {
        BuildError::ToolchainInvocation {
            command: cmd.display_command(),
            reason: format!(
                "exited successfully but produced no usable output at {}",
                path.display()
            ),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        }
    }

    /// The command exited zero but its output could not be understood.
    pub fn invalid_output(
        cmd: &ProcessBuilder,
        output: &ProcessOutput,
        detail: impl std::fmt::Display,
    ) -> Self {
        BuildError::ToolchainInvocation {
            command: cmd.display_command(),
            reason: format!("printed unexpected output: {}", detail),
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::ToolchainInvocation {
                command,
                reason,
                stdout,
                stderr,
            } => {
                let mut diag = Diagnostic::error(format!("`{}` {}", command, reason));

                if !stderr.trim().is_empty() {
                    diag = diag.with_context(format!("stderr:\n{}", stderr.trim_end()));
                }
                if !stdout.trim().is_empty() {
                    diag = diag.with_context(format!("stdout:\n{}", stdout.trim_end()));
                }

                diag.with_suggestion("Check that the tool is installed and on PATH")
                    .with_suggestion("Re-run with `--verbose` to see every command")
            }

            BuildError::PatchApplication { path, pattern } => Diagnostic::error(format!(
                "generated source does not contain `{}`",
                pattern
            ))
            .with_location(path)
            .with_context("the binding generator's output format has changed")
            .with_suggestion("Check the binding generator version"),

            BuildError::PlatformConfiguration { os } => {
                Diagnostic::error(format!("unsupported platform `{}`", os))
                    .with_context("supported platforms: linux, macos, windows")
            }
        }
    }
}

fn format_captured(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stderr.is_empty() {
        out.push('\n');
        out.push_str(stderr.trim_end());
    }
    if !stdout.is_empty() {
        out.push('\n');
        out.push_str(stdout.trim_end());
    }
    out
}
