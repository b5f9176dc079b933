use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use std::future::Future;
use std::io;
use std::process::{Output, Stdio};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Command execution failed [status: {0:?}]")]
    CommandFailed(Option<i32>),
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

pub trait ShellCommandExt {
    /// Run the command and return its raw stdout, untouched.
    fn run_output(&mut self) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;
    /// Run the command and return its stdout as trimmed text.
    fn run_stdout(&mut self) -> impl Future<Output = Result<String, Error>> + Send;
    /// Run the command with `input` piped to its stdin.
    fn run_stdin(&mut self, input: &[u8]) -> impl Future<Output = Result<(), Error>> + Send;
}

impl ShellCommandExt for Command {
    /// Unconditionally captures stdout and stderr regardless of command settings.
    /// See tokio's output behaviour: https://docs.rs/tokio/latest/tokio/process/struct.Command.html#method.output
    async fn run_output(&mut self) -> Result<Vec<u8>, Error> {
        let output = self.output().await?;
        let cmd_debug = format!("{:?}", self);
        check_output(cmd_debug, &output)?;
        Ok(output.stdout)
    }

    async fn run_stdout(&mut self) -> Result<String, Error> {
        let output = self.output().await?;
        let cmd_debug = format!("{:?}", self);
        stdout_from_output(cmd_debug, output)
    }

    async fn run_stdin(&mut self, input: &[u8]) -> Result<(), Error> {
        let mut child = self
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is dropped before waiting, otherwise the child never sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => match stdin.write_all(input).await {
                Ok(()) => stdin.shutdown().await,
                Err(err) => Err(err),
            },
            None => Ok(()),
        };

        // a child exiting early breaks the pipe; its status and stderr say why
        let output = child.wait_with_output().await?;
        let cmd_debug = format!("{:?}", self);
        check_output(cmd_debug, &output)?;
        written.map_err(Error::from)
    }
}

pub fn stdout_from_output(cmd: String, output: Output) -> Result<String, Error> {
    check_output(cmd, &output)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn check_output(cmd: String, output: &Output) -> Result<(), Error> {
    let stderrempty = output.stderr.is_empty();
    match (stderrempty, output.status) {
        (true, status) if status.success() => Ok(()),
        (false, status) if status.success() => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(cmd, %stderr, "Non empty stderr on successful command");
            Ok(())
        }
        (_, status) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(cmd, status_code = ?status.code(), %stdout, %stderr, "Error executing command");
            Err(Error::CommandFailed(status.code()))
        }
    }
}
