use std::process::{Output, Stdio};

use crate::docker::DockerError;

/// Abstraction over Docker CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait DockerExecutor: Send + Sync {
    /// Execute a docker command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, DockerError>;

    /// Execute a docker command, streaming output to the terminal.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), DockerError>;

    /// Execute a docker command with data piped to stdin.
    async fn exec_with_stdin(&self, args: &[String], stdin_data: &[u8])
    -> Result<String, DockerError>;

    /// Start a docker command without waiting for it.
    ///
    /// Synchronous so it can be called from `Drop` while a future is being
    /// cancelled.
    fn spawn_detached(&self, args: &[String]) -> Result<(), DockerError>;
}

/// Runs the real Docker CLI (or a compatible binary such as `podman`).
///
/// Child processes are killed when the returned future is dropped, so a
/// cancelled stage leaves nothing running behind it.
#[derive(Debug, Clone)]
pub struct RealExecutor {
    program: String,
}

impl RealExecutor {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        tracing::debug!(program = %self.program, ?args, "exec");
        let mut command = tokio::process::Command::new(&self.program);
        command.args(args).kill_on_drop(true);
        command
    }

    fn not_found(&self, source: std::io::Error) -> DockerError {
        DockerError::NotFound {
            program: self.program.clone(),
            source,
        }
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, DockerError> {
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.not_found(e))?;

        captured(args, output)
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), DockerError> {
        let status = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.not_found(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(DockerError::CommandFailed {
                args: args.to_vec(),
                status: status.to_string(),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    async fn exec_with_stdin(
        &self,
        args: &[String],
        stdin_data: &[u8],
    ) -> Result<String, DockerError> {
        use tokio::io::AsyncWriteExt;

        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.not_found(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(stdin_data)
                .await
                .map_err(|e| DockerError::StdinWrite { source: e })?;
            stdin
                .shutdown()
                .await
                .map_err(|e| DockerError::StdinWrite { source: e })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.not_found(e))?;

        captured(args, output)
    }

    fn spawn_detached(&self, args: &[String]) -> Result<(), DockerError> {
        tracing::debug!(program = %self.program, ?args, "spawn detached");
        let mut child = std::process::Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.not_found(e))?;

        // reap off the async runtime
        std::thread::spawn(move || {
            if let Err(e) = child.wait() {
                tracing::warn!(error = %e, "detached docker command was not reaped");
            }
        });

        Ok(())
    }
}

fn captured(args: &[String], output: Output) -> Result<String, DockerError> {
    if output.status.success() {
        String::from_utf8(output.stdout).map_err(|e| DockerError::InvalidUtf8 { source: e })
    } else {
        Err(DockerError::CommandFailed {
            args: args.to_vec(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
