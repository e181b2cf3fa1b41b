//! External process execution with captured output

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{CommandError, Result};

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    fn from_std(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
            success: output.status.success(),
        }
    }
}

/// Runs collaborator CLIs with fixed argument vectors and captures their
/// output. Every phase of the pipeline goes through this runner, so failures
/// carry a consistent shape: program name, exit code, captured stderr.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    verbose: bool,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner that echoes every argv to the console before running it.
    pub fn verbose(verbose: bool) -> Self {
        Self { verbose }
    }

    fn echo(&self, line: &str) {
        if self.verbose {
            println!("Running: {line}");
        }
    }

    /// Run a command; non-zero exit becomes a CommandError::Failed.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run_unchecked(program, args).await?;
        if !output.success {
            warn!(program, code = ?output.code, "command failed");
            return Err(CommandError::Failed {
                program: program.to_string(),
                code: output.code,
                stderr: if output.stderr.is_empty() {
                    output.stdout
                } else {
                    output.stderr
                },
            }
            .into());
        }
        Ok(output)
    }

    /// Run a command, tolerating a non-zero exit. Only spawn failures error.
    pub async fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!(program, ?args, "running command");
        self.echo(&format!("{program} {}", args.join(" ")));

        let output = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput::from_std(output))
    }

    /// Chain exactly two processes with a pipe: the producer's stdout feeds
    /// the filter's stdin. Both must exit zero. This is the only place two
    /// processes run concurrently; it is a data-flow pipe, not independent
    /// work, and the caller blocks until both terminate.
    pub async fn run_piped(
        &self,
        producer: &str,
        producer_args: &[&str],
        filter: &str,
        filter_args: &[&str],
    ) -> Result<CommandOutput> {
        debug!(producer, ?producer_args, filter, "running piped command");
        self.echo(&format!(
            "{producer} {} | {filter} {}",
            producer_args.join(" "),
            filter_args.join(" ")
        ));

        let mut producer_child = Command::new(producer)
            .args(producer_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: producer.to_string(),
                source,
            })?;

        let producer_stdout =
            producer_child
                .stdout
                .take()
                .ok_or_else(|| CommandError::Spawn {
                    program: producer.to_string(),
                    source: std::io::Error::other("failed to capture stdout"),
                })?;
        let mut producer_stderr =
            producer_child
                .stderr
                .take()
                .ok_or_else(|| CommandError::Spawn {
                    program: producer.to_string(),
                    source: std::io::Error::other("failed to capture stderr"),
                })?;

        // Drain producer stderr concurrently so a chatty producer cannot
        // block on a full pipe while the filter is still reading stdout.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = producer_stderr.read_to_string(&mut buf).await;
            buf
        });

        let filter_stdin: Stdio =
            producer_stdout
                .try_into()
                .map_err(|source| CommandError::Spawn {
                    program: filter.to_string(),
                    source,
                })?;

        let filter_output = Command::new(filter)
            .args(filter_args)
            .stdin(filter_stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                program: filter.to_string(),
                source,
            })?;

        let producer_status =
            producer_child
                .wait()
                .await
                .map_err(|source| CommandError::Spawn {
                    program: producer.to_string(),
                    source,
                })?;
        let producer_stderr = stderr_task.await.unwrap_or_default();

        if !producer_status.success() {
            return Err(CommandError::Failed {
                program: producer.to_string(),
                code: producer_status.code(),
                stderr: producer_stderr,
            }
            .into());
        }

        let filter_out = CommandOutput::from_std(filter_output);
        if !filter_out.success {
            return Err(CommandError::Failed {
                program: filter.to_string(),
                code: filter_out.code,
                stderr: filter_out.stderr,
            }
            .into());
        }

        Ok(filter_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = CommandRunner::new();
        let output = runner.run("echo", &["hello"]).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.success);
    }

    #[tokio::test]
    async fn test_run_fails_on_nonzero_exit() {
        let runner = CommandRunner::new();
        let err = runner.run("false", &[]).await.unwrap_err();
        match err {
            ReleaseError::Command(CommandError::Failed { program, .. }) => {
                assert_eq!(program, "false");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_unchecked_tolerates_failure() {
        let runner = CommandRunner::new();
        let output = runner.run_unchecked("false", &[]).await.unwrap();
        assert!(!output.success);
    }

    #[tokio::test]
    async fn test_spawn_error_for_missing_program() {
        let runner = CommandRunner::new();
        let err = runner
            .run("slipway-no-such-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Command(CommandError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_verbose_runner_still_captures_output() {
        // The argv echo goes to the console; capture must be unaffected.
        let runner = CommandRunner::verbose(true);
        let output = runner.run("echo", &["hello"]).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_piped_chains_two_processes() {
        let runner = CommandRunner::new();
        let output = runner
            .run_piped("echo", &["alpha"], "tr", &["a-z", "A-Z"])
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "ALPHA");
    }

    #[tokio::test]
    async fn test_run_piped_fails_when_filter_fails() {
        let runner = CommandRunner::new();
        let err = runner
            .run_piped("echo", &["alpha"], "false", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Command(_)));
    }
}
