//! kubectl Adapter
//!
//! Implements the cluster query and remote execution ports by running
//! `kubectl` as a child process. Every child is killed when the
//! cancellation token fires, nothing is left running after an interrupt.

use crate::domain::ports::{
    ClusterQuery, ExecTarget, QueryScope, RemoteExecutor, RemoteStream, ResourceQuery,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// =============================================================================
// Argument Builders
// =============================================================================

/// Arguments for `kubectl get` answering a query
pub fn query_args(query: &ResourceQuery) -> Vec<String> {
    let mut args = vec!["get".to_string(), query.kind.clone()];
    if let Some(name) = &query.name {
        args.push(name.clone());
    }

    match &query.scope {
        QueryScope::Current => {}
        QueryScope::Namespace(namespace) => {
            args.push("--namespace".into());
            args.push(namespace.clone());
        }
        QueryScope::AllNamespaces => args.push("--all-namespaces".into()),
    }

    if let Some(selector) = &query.label_selector {
        args.push("--selector".into());
        args.push(selector.clone());
    }
    if let Some(selector) = &query.field_selector {
        args.push("--field-selector".into());
        args.push(selector.clone());
    }

    args.push("--output".into());
    args.push(format!("jsonpath={}", query.jsonpath));
    args
}

/// Arguments for `kubectl exec` running `command` in the controller
pub fn exec_args(target: &ExecTarget, command: &[String], interactive: bool) -> Vec<String> {
    let mut args = vec![
        "exec".to_string(),
        "--namespace".to_string(),
        target.endpoint.namespace.clone(),
    ];

    if interactive {
        args.push("--stdin".into());
        if target.tty {
            args.push("--tty".into());
        }
    }

    args.push(target.endpoint.exec_ref());
    args.push("--".into());
    args.extend(command.iter().cloned());
    args
}

// =============================================================================
// kubectl Client
// =============================================================================

/// Runs kubectl subprocesses
#[derive(Debug, Clone)]
pub struct KubectlClient {
    program: String,
}

impl KubectlClient {
    /// Create a client for the given kubectl binary
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).kill_on_drop(true);
        cmd
    }

    fn unavailable(&self, e: std::io::Error) -> Error {
        Error::ToolUnavailable {
            program: self.program.clone(),
            reason: e.to_string(),
        }
    }

    /// Run to completion and capture stdout; non-zero exit carries stderr
    async fn run_captured(&self, args: &[String], cancel: &CancellationToken) -> Result<Vec<u8>> {
        debug!("Running {} {}", self.program, args.join(" "));

        let child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        // Dropping the output future drops the child, which kills it
        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        };

        if !output.status.success() {
            return Err(failure(&self.program, args, output.status, &output.stderr));
        }

        Ok(output.stdout)
    }

    /// Start the child and return its stdout while it is still running
    async fn run_streamed(&self, args: &[String], cancel: &CancellationToken) -> Result<RemoteStream> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!("Streaming {} {}", self.program, args.join(" "));

        let mut child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        let stdout = child.stdout.take().ok_or_else(|| Error::ToolUnavailable {
            program: self.program.clone(),
            reason: "stdout was not captured".into(),
        })?;

        let program = self.program.clone();
        let args = args.to_vec();
        let cancel = cancel.clone();
        let finished = async move {
            // The child lives in this future, dropping it kills the child
            let output = tokio::select! {
                output = child.wait_with_output() => output?,
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            };

            if !output.status.success() {
                return Err(failure(&program, &args, output.status, &output.stderr));
            }
            Ok::<(), Error>(())
        };

        Ok(RemoteStream {
            stdout: Box::new(stdout),
            finished: Box::pin(finished),
        })
    }

    /// Run with the terminal's stdio attached and return the exit code
    async fn run_inherited(&self, args: &[String], cancel: &CancellationToken) -> Result<i32> {
        debug!("Running {} {}", self.program, args.join(" "));

        let mut child = self
            .command(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        tokio::select! {
            status = child.wait() => Ok(exit_code(status?)),
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                Err(Error::Cancelled)
            }
        }
    }
}

fn failure(program: &str, args: &[String], status: ExitStatus, stderr: &[u8]) -> Error {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    debug!("{} exited with {}: {}", program, status, stderr);
    Error::QueryFailed {
        command: format!("{} {}", program, args.first().map(String::as_str).unwrap_or("")),
        stderr,
    }
}

/// Exit code of a finished child, signals map to `128 + signal`
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[async_trait]
impl ClusterQuery for KubectlClient {
    async fn api_resources(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let args = vec!["api-resources".to_string(), "--output".to_string(), "name".to_string()];
        let out = self.run_captured(&args, cancel).await?;

        Ok(String::from_utf8_lossy(&out)
            .split_whitespace()
            .map(str::to_string)
            .collect())
    }

    async fn get(&self, query: &ResourceQuery, cancel: &CancellationToken) -> Result<Vec<u8>> {
        self.run_captured(&query_args(query), cancel).await
    }
}

#[async_trait]
impl RemoteExecutor for KubectlClient {
    async fn exec(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<i32> {
        self.run_inherited(&exec_args(target, command, true), cancel).await
    }

    async fn exec_output(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        self.run_captured(&exec_args(target, command, false), cancel).await
    }

    async fn exec_stream(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<RemoteStream> {
        self.run_streamed(&exec_args(target, command, false), cancel).await
    }
}
