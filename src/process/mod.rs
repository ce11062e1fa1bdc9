//! Builds the reproto command line and runs it.
//!
//! The tool's standard output and standard error are drained on two scoped
//! threads while the caller waits for the exit status, so a tool emitting
//! large amounts of output never blocks on a full pipe. Every line is
//! forwarded to `tracing` as it arrives (stdout at info, stderr at error)
//! and also kept for the caller.

mod output;

pub use output::ProcessOutput;

use std::io::{self, ErrorKind};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};
use wait_timeout::ChildExt;

use self::output::{Stream, drain};
use crate::error::{ProcessError, ProcessResult};
use crate::fs::absolute;
use crate::observability::LOG_TARGET;

/// Describes one `reproto compile java` run.
///
/// # Examples
///
/// ```
/// use reproto_launcher::process::Invocation;
///
/// let invocation = Invocation::new("/usr/bin/reproto", "/build/generated")
///     .module("jackson")
///     .target("io.example.api");
/// let args = invocation.arguments()?;
/// assert_eq!(args.first().map(String::as_str), Some("compile"));
/// # Ok::<(), reproto_launcher::ProcessError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Invocation {
    executable: Utf8PathBuf,
    output: Utf8PathBuf,
    debug: bool,
    paths: Vec<Utf8PathBuf>,
    modules: Vec<String>,
    package_prefix: Option<String>,
    targets: Vec<String>,
    timeout: Option<Duration>,
}

impl Invocation {
    /// Runs `executable`, writing generated sources below `output`.
    #[must_use]
    pub fn new(executable: impl Into<Utf8PathBuf>, output: impl Into<Utf8PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            output: output.into(),
            debug: false,
            paths: Vec::new(),
            modules: Vec::new(),
            package_prefix: None,
            targets: Vec::new(),
            timeout: None,
        }
    }

    /// Asks the tool for debug output.
    #[must_use]
    pub const fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Adds a specification source root.
    #[must_use]
    pub fn path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Adds several specification source roots.
    #[must_use]
    pub fn paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Enables a code generation module.
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.modules.push(module.into());
        self
    }

    /// Enables several code generation modules.
    #[must_use]
    pub fn modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules.extend(modules.into_iter().map(Into::into));
        self
    }

    /// Prefixes every generated package.
    #[must_use]
    pub fn package_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.package_prefix = Some(prefix.into());
        self
    }

    /// Adds a package to compile.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Adds several packages to compile.
    #[must_use]
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Kills the tool when it runs longer than `timeout`.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executable that will be run.
    #[must_use]
    pub fn executable(&self) -> &Utf8Path {
        &self.executable
    }

    /// Builds the argument vector, resolving paths against the current
    /// directory.
    ///
    /// ```text
    /// [--debug] compile java (--path <p>)* (--module <m>)* --out <out> [--package-prefix <p>] (--package <t>)*
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Io`] when the current directory cannot be read.
    pub fn arguments(&self) -> ProcessResult<Vec<String>> {
        let resolve = |path: &Utf8Path| {
            absolute(path).map_err(|source| ProcessError::Io {
                executable: self.executable.clone(),
                source,
            })
        };

        let mut args = Vec::new();
        if self.debug {
            args.push("--debug".to_owned());
        }
        args.extend(["compile".to_owned(), "java".to_owned()]);
        for path in &self.paths {
            args.push("--path".to_owned());
            args.push(resolve(path)?.into_string());
        }
        for module in &self.modules {
            args.push("--module".to_owned());
            args.push(module.clone());
        }
        args.push("--out".to_owned());
        args.push(resolve(&self.output)?.into_string());
        if let Some(prefix) = &self.package_prefix {
            args.push("--package-prefix".to_owned());
            args.push(prefix.clone());
        }
        for target in &self.targets {
            args.push("--package".to_owned());
            args.push(target.clone());
        }
        Ok(args)
    }

    /// Runs the tool and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Failed`] with the captured lines when the tool
    /// exits non-zero, [`ProcessError::Terminated`] when a signal ends it,
    /// [`ProcessError::TimedOut`] when the timeout elapses, and
    /// [`ProcessError::Spawn`] or [`ProcessError::Io`] when it cannot be run.
    pub fn run(&self) -> ProcessResult<ProcessOutput> {
        let args = self.arguments()?;
        info!(
            target: LOG_TARGET,
            "executing: {} {}",
            self.executable,
            args.join(" ")
        );

        let mut child = Command::new(self.executable.as_std_path())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        let (exit, stdout, stderr) = self.collect(&mut child);
        let io_error = |source| ProcessError::Io {
            executable: self.executable.clone(),
            source,
        };
        let stdout = stdout.map_err(io_error)?;
        let stderr = stderr.map_err(io_error)?;

        match exit.map_err(io_error)? {
            Exit::TimedOut(limit) => Err(ProcessError::TimedOut {
                executable: self.executable.clone(),
                timeout_secs: limit.as_secs(),
            }),
            Exit::Status(status) => match status.code() {
                Some(0) => Ok(ProcessOutput { stdout, stderr }),
                Some(exit_code) => Err(ProcessError::Failed {
                    executable: self.executable.clone(),
                    exit_code,
                    stdout,
                    stderr,
                }),
                None => Err(ProcessError::Terminated {
                    executable: self.executable.clone(),
                }),
            },
        }
    }

    /// Drains both pipes on scoped threads while waiting for the child.
    fn collect(
        &self,
        child: &mut Child,
    ) -> (
        io::Result<Exit>,
        io::Result<Vec<String>>,
        io::Result<Vec<String>>,
    ) {
        let tool = self
            .executable
            .file_name()
            .unwrap_or_else(|| self.executable.as_str());
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // drain threads log through the caller's subscriber
        let dispatch = tracing::dispatcher::get_default(Clone::clone);

        thread::scope(|scope| {
            let stdout = scope.spawn(|| {
                tracing::dispatcher::with_default(&dispatch, || {
                    stdout_pipe.map_or_else(
                        || Ok(Vec::new()),
                        |pipe| drain(pipe, Stream::Stdout, tool),
                    )
                })
            });
            let stderr = scope.spawn(|| {
                tracing::dispatcher::with_default(&dispatch, || {
                    stderr_pipe.map_or_else(
                        || Ok(Vec::new()),
                        |pipe| drain(pipe, Stream::Stderr, tool),
                    )
                })
            });

            let exit = self.wait(child);
            (exit, join(stdout), join(stderr))
        })
    }

    fn wait(&self, child: &mut Child) -> io::Result<Exit> {
        let Some(limit) = self.timeout else {
            return child.wait().map(Exit::Status);
        };
        match child.wait_timeout(limit) {
            Ok(Some(status)) => Ok(Exit::Status(status)),
            Ok(None) => {
                warn!(
                    target: LOG_TARGET,
                    executable = %self.executable,
                    timeout_secs = limit.as_secs(),
                    "tool timed out; terminating"
                );
                kill(child)?;
                child.wait()?;
                Ok(Exit::TimedOut(limit))
            }
            Err(err) => {
                // reap the child so the drain threads see end of stream
                if let Err(kill_err) = kill(child) {
                    warn!(
                        target: LOG_TARGET,
                        executable = %self.executable,
                        error = %kill_err,
                        "failed to terminate tool after wait error"
                    );
                }
                drop(child.wait());
                Err(err)
            }
        }
    }
}

enum Exit {
    Status(ExitStatus),
    TimedOut(Duration),
}

fn kill(child: &mut Child) -> io::Result<()> {
    match child.kill() {
        // `InvalidInput` means the child already exited.
        Err(err) if err.kind() != ErrorKind::InvalidInput => Err(err),
        _ => Ok(()),
    }
}

fn join(
    handle: thread::ScopedJoinHandle<'_, io::Result<Vec<String>>>,
) -> io::Result<Vec<String>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("output reader panicked")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[cfg(unix)]
    #[rstest]
    fn arguments_follow_cli_grammar() {
        let invocation = Invocation::new("/usr/bin/reproto", "/build/out")
            .debug(true)
            .paths(["/src/a", "/src/b"])
            .modules(["jackson", "lombok"])
            .package_prefix("io.example")
            .targets(["api", "model"]);

        let args = invocation.arguments().expect("arguments");

        assert_eq!(
            args,
            [
                "--debug",
                "compile",
                "java",
                "--path",
                "/src/a",
                "--path",
                "/src/b",
                "--module",
                "jackson",
                "--module",
                "lombok",
                "--out",
                "/build/out",
                "--package-prefix",
                "io.example",
                "--package",
                "api",
                "--package",
                "model",
            ]
        );
    }

    #[rstest]
    fn minimal_arguments_omit_optional_flags() {
        let invocation = Invocation::new("reproto", "out").target("api");

        let args = invocation.arguments().expect("arguments");

        assert_eq!(args.first().map(String::as_str), Some("compile"));
        assert!(!args.iter().any(|arg| arg == "--debug" || arg == "--package-prefix"));
        let out = args
            .iter()
            .position(|arg| arg == "--out")
            .and_then(|index| args.get(index + 1))
            .expect("out value");
        assert!(Utf8Path::new(out).is_absolute());
        assert!(out.ends_with("out"));
        assert_eq!(args.last().map(String::as_str), Some("api"));
    }

    #[rstest]
    fn missing_executable_is_a_spawn_error() {
        let err = Invocation::new("/nonexistent/reproto-missing", "out")
            .target("api")
            .run()
            .expect_err("should fail to spawn");

        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
