//! Subprocess execution utilities.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::builder::errors::BuildError;
use crate::builder::toolchain::CommandSpec;

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit status of the process
    pub status: ExitStatus,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
    /// Wall-clock time from spawn to exit
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Standard output as lossy UTF-8.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error as lossy UTF-8.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Create a process builder from a toolchain command spec.
    pub fn from_spec(spec: CommandSpec) -> Self {
        ProcessBuilder::new(&spec.program).args(&spec.args)
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable on top of the inherited environment.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set several environment variables.
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the environment overrides.
    pub fn get_envs(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command, capturing its output.
    ///
    /// Blocks until the process exits. A non-zero exit is not an error here;
    /// use [`ProcessBuilder::exec_and_check`] for that.
    pub fn exec(&self) -> io::Result<ProcessOutput> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("running `{}`", self.display_command());

        let start = Instant::now();
        let output = cmd.spawn()?.wait_with_output()?;

        Ok(ProcessOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
            elapsed: start.elapsed(),
        })
    }

    /// Execute and require a zero exit status.
    pub fn exec_and_check(&self) -> Result<ProcessOutput, BuildError> {
        let output = self
            .exec()
            .map_err(|e| BuildError::spawn_failed(self, &e))?;

        if !output.success() {
            return Err(BuildError::exit_failed(self, &output));
        }

        Ok(output)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![quote_arg(&self.program.display().to_string())];
        parts.extend(self.args.iter().map(|a| quote_arg(a)));
        parts.join(" ")
    }
}

fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: impl AsRef<OsStr>) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find an executable in an explicit search path, relative to `cwd`.
pub fn find_executable_in(
    name: impl AsRef<OsStr>,
    paths: Option<&str>,
    cwd: &Path,
) -> Option<PathBuf> {
    match paths {
        Some(paths) => which::which_in(name, Some(paths), cwd).ok(),
        None => find_executable(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.success());
        assert!(output.stdout_lossy().contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_and_check_reports_exit_status() {
        let err = ProcessBuilder::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .exec_and_check()
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("sh -c"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_missing_program_is_toolchain_error() {
        let err = ProcessBuilder::new("bindforge-definitely-not-installed")
            .exec_and_check()
            .unwrap_err();

        assert!(matches!(err, BuildError::ToolchainInvocation { .. }));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("go").args([
            "build",
            "-buildmode=c-shared",
            "-o",
            "out dir/libta_go.so",
        ]);

        assert_eq!(
            pb.display_command(),
            "go build -buildmode=c-shared -o \"out dir/libta_go.so\""
        );
    }

    #[test]
    fn test_env_overrides_are_sorted() {
        let pb = ProcessBuilder::new("go")
            .env("CGO_LDFLAGS_ALLOW", ".*")
            .env("CGO_ENABLED", "1");

        let keys: Vec<_> = pb.get_envs().keys().cloned().collect();
        assert_eq!(keys, vec!["CGO_ENABLED", "CGO_LDFLAGS_ALLOW"]);
    }
}
