//! Scripted cluster for unit tests
//!
//! Queries are keyed by the `kubectl get` arguments they would produce, so
//! tests read like the commands they stand in for.

use crate::domain::ports::{ClusterQuery, ExecTarget, RemoteExecutor, RemoteStream, ResourceQuery};
use crate::error::{Error, Result};
use crate::kubectl::{exec_args, query_args};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

enum Reply {
    Output(Vec<u8>),
    Failure(String),
    Unavailable,
}

#[derive(Default)]
pub struct FakeCluster {
    api_resources: Vec<String>,
    replies: HashMap<String, Reply>,
    exec_replies: HashMap<String, Vec<u8>>,
    exit_code: i32,
    queries: Mutex<Vec<String>>,
    execs: Mutex<Vec<Vec<String>>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_resources(mut self, resources: &[&str]) -> Self {
        self.api_resources = resources.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Answer `kubectl <command>` with `stdout`
    pub fn reply(mut self, command: &str, stdout: &str) -> Self {
        self.replies
            .insert(command.to_string(), Reply::Output(stdout.as_bytes().to_vec()));
        self
    }

    /// Fail `kubectl <command>` with `stderr`
    pub fn fail(mut self, command: &str, stderr: &str) -> Self {
        self.replies
            .insert(command.to_string(), Reply::Failure(stderr.to_string()));
        self
    }

    /// Make `kubectl <command>` fail to start
    pub fn unavailable(mut self, command: &str) -> Self {
        self.replies.insert(command.to_string(), Reply::Unavailable);
        self
    }

    /// Answer a captured or streamed exec of `command` with `stdout`
    pub fn exec_reply(mut self, command: &str, stdout: &[u8]) -> Self {
        self.exec_replies.insert(command.to_string(), stdout.to_vec());
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Every `kubectl get` issued, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Every `kubectl exec` argument vector issued, in order
    pub fn execs(&self) -> Vec<Vec<String>> {
        self.execs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterQuery for FakeCluster {
    async fn api_resources(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.api_resources.clone())
    }

    async fn get(&self, query: &ResourceQuery, cancel: &CancellationToken) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let key = query_args(query).join(" ");
        self.queries.lock().unwrap().push(key.clone());

        match self.replies.get(&key) {
            Some(Reply::Output(stdout)) => Ok(stdout.clone()),
            Some(Reply::Failure(stderr)) => Err(Error::QueryFailed {
                command: "kubectl get".into(),
                stderr: stderr.clone(),
            }),
            Some(Reply::Unavailable) => Err(Error::ToolUnavailable {
                program: "kubectl".into(),
                reason: "not found".into(),
            }),
            None => Err(Error::QueryFailed {
                command: "kubectl get".into(),
                stderr: format!("Error from server (NotFound): {}", key),
            }),
        }
    }
}

#[async_trait]
impl RemoteExecutor for FakeCluster {
    async fn exec(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<i32> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.execs.lock().unwrap().push(exec_args(target, command, true));
        Ok(self.exit_code)
    }

    async fn exec_output(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.execs.lock().unwrap().push(exec_args(target, command, false));

        self.exec_replies
            .get(&command.join(" "))
            .cloned()
            .ok_or_else(|| exec_failure(command))
    }

    async fn exec_stream(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<RemoteStream> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.execs.lock().unwrap().push(exec_args(target, command, false));

        // Like kubectl, an unscripted command starts fine and fails on exit
        let (stdout, status) = match self.exec_replies.get(&command.join(" ")) {
            Some(stdout) => (stdout.clone(), Ok(())),
            None => (Vec::new(), Err(exec_failure(command))),
        };

        Ok(RemoteStream {
            stdout: Box::new(std::io::Cursor::new(stdout)),
            finished: Box::pin(async move { status }),
        })
    }
}

fn exec_failure(command: &[String]) -> Error {
    Error::QueryFailed {
        command: "kubectl exec".into(),
        stderr: format!("command terminated with exit code 1: {}", command.join(" ")),
    }
}
