//! Command Forwarder
//!
//! Runs the user's command in the LINSTOR controller: locate the controller,
//! expand special arguments, then `kubectl exec` with stdio attached.

use super::sos_report::{is_sos_report_download, SosReportDownload};
use crate::config::PluginConfig;
use crate::controller::ControllerLocator;
use crate::domain::ports::{ClusterQueryRef, ExecTarget, RemoteExecutorRef};
use crate::error::Result;
use crate::resolve::ArgumentExpander;
use tokio_util::sync::CancellationToken;

/// Forwards a command line to the LINSTOR controller
pub struct CommandForwarder {
    locator: ControllerLocator,
    expander: ArgumentExpander,
    executor: RemoteExecutorRef,
    remote_command: String,
}

impl CommandForwarder {
    pub fn new(cluster: ClusterQueryRef, executor: RemoteExecutorRef, config: PluginConfig) -> Self {
        Self {
            expander: ArgumentExpander::new(cluster.clone()),
            remote_command: config.remote_command.clone(),
            locator: ControllerLocator::new(cluster, config),
            executor,
        }
    }

    /// Run `args` in the controller and return the remote exit code
    ///
    /// `tty` enables an interactive remote terminal; pass whether stdout is
    /// one.
    pub async fn run(&self, args: &[String], tty: bool, cancel: &CancellationToken) -> Result<i32> {
        let endpoint = self.locator.locate(cancel).await?;
        let target = ExecTarget { endpoint, tty };

        if is_sos_report_download(args) {
            let download = SosReportDownload::new(self.executor.clone(), self.remote_command.clone());
            return download
                .run(&target, &args[2..], &mut std::io::stdout(), cancel)
                .await;
        }

        self.forward(&target, args, cancel).await
    }

    /// Expand `args` and execute them in an already located controller
    pub async fn forward(
        &self,
        target: &ExecTarget,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<i32> {
        let command = self.remote_command_line(args, cancel).await?;
        self.executor.exec(target, &command, cancel).await
    }

    /// Remote command followed by the expanded arguments
    pub async fn remote_command_line(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let (expanded, notices) = self.expander.expand_all(args, cancel).await?;
        for notice in &notices {
            eprintln!("{}", notice);
        }

        let mut command = Vec::with_capacity(expanded.len() + 1);
        command.push(self.remote_command.clone());
        command.extend(expanded);
        Ok(command)
    }
}
