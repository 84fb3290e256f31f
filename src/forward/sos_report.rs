//! sos-report Download
//!
//! `sos-report download` creates a report on the controller and copies the
//! resulting archive to the local machine. `kubectl exec` has no file copy,
//! so the report is streamed out through `tar -cf -` and unpacked on a
//! blocking thread as it arrives.

use crate::domain::ports::{ExecTarget, RemoteExecutorRef, RemoteStream};
use crate::error::{Error, Result};
use clap::{ArgAction, CommandFactory, Parser};
use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

/// Check for `sos-report download` and its short forms
pub fn is_sos_report_download(args: &[String]) -> bool {
    if args.len() < 2 {
        return false;
    }

    let is_sos_report = args[0] == "sos" || args[0] == "sos-report";
    let is_download = args[1] == "dl" || args[1] == "download";
    is_sos_report && is_download
}

/// Flags accepted after `sos-report download`
#[derive(Parser, Debug, Default, PartialEq, Eq)]
#[command(
    name = "download",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct DownloadArgs {
    #[arg(short = 'h', long, action = ArgAction::SetTrue)]
    pub help: bool,

    /// Create sos-report with logs since n days. e.g. "3days"
    #[arg(short, long)]
    pub since: Option<String>,

    /// Only include the given nodes in the sos-report
    #[arg(short, long)]
    pub nodes: Vec<String>,

    /// Only include nodes that have the given resources deployed in the sos-report
    #[arg(short, long)]
    pub resources: Vec<String>,

    /// Do not include the given nodes in the sos-report
    #[arg(short = 'e', long)]
    pub exclude_nodes: Vec<String>,

    /// Do not include the controller in the sos-report
    #[arg(long)]
    pub no_controller: bool,

    /// Destination file or directory
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,
}

impl DownloadArgs {
    /// Parse the flags following the `sos-report download` tokens
    pub fn parse_flags(args: &[String]) -> Result<Self> {
        Self::try_parse_from(args).map_err(|e| Error::ReportFlags(e.to_string()))
    }

    /// Flag reference printed for `--help`
    pub fn usage() -> String {
        Self::command().render_help().to_string()
    }

    /// Remote command creating the report
    pub fn create_command(&self, remote_command: &str) -> Vec<String> {
        let mut command: Vec<String> = [remote_command, "-m", "--output-version", "v1", "sos-report", "create"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if let Some(since) = &self.since {
            command.push("--since".into());
            command.push(since.clone());
        }
        for (flag, values) in [
            ("--nodes", &self.nodes),
            ("--resources", &self.resources),
            ("--exclude-nodes", &self.exclude_nodes),
        ] {
            if !values.is_empty() {
                command.push(flag.into());
                command.extend(values.iter().cloned());
            }
        }
        if self.no_controller {
            command.push("--no-controller".into());
        }

        command
    }
}

#[derive(Debug, Deserialize)]
struct LinstorMessage {
    #[serde(default)]
    obj_refs: ObjRefs,
}

#[derive(Debug, Default, Deserialize)]
struct ObjRefs {
    #[serde(default)]
    path: String,
}

/// Extract the report path from `sos-report create` machine output
fn report_path(output: &[u8]) -> Result<String> {
    let messages: Vec<LinstorMessage> = serde_json::from_slice(output)?;

    if messages.len() != 1 {
        return Err(Error::ReportCreate(format!(
            "expected exactly one LINSTOR message, got {}",
            messages.len()
        )));
    }

    let path = messages
        .into_iter()
        .next()
        .map(|m| m.obj_refs.path)
        .unwrap_or_default();
    if path.is_empty() {
        return Err(Error::ReportCreate(
            "LINSTOR message does not have sos-report path".into(),
        ));
    }

    Ok(path)
}

/// Local file the report is written to
fn destination(report: &str, requested: Option<&str>) -> PathBuf {
    let file_name = Path::new(report)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(report));

    let Some(requested) = requested else {
        return file_name;
    };

    match std::fs::metadata(requested) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => PathBuf::from(requested),
        Ok(meta) if meta.is_dir() => Path::new(requested).join(file_name),
        _ => file_name,
    }
}

/// Write the first entry of a tar stream to `dest`, then drain the rest
fn extract_first_entry<R: Read>(stream: R, dest: &mut File) -> Result<u64> {
    let mut archive = tar::Archive::new(stream);
    let written = {
        let mut entry = archive
            .entries()
            .map_err(|e| Error::ReportCopy(format!("failed to read tar header: {}", e)))?
            .next()
            .ok_or_else(|| Error::ReportCopy("archive is empty".into()))?
            .map_err(|e| Error::ReportCopy(format!("failed to read tar header: {}", e)))?;

        std::io::copy(&mut entry, dest)?
    };

    // The remote tar must be able to write its trailer and exit cleanly
    std::io::copy(&mut archive.into_inner(), &mut std::io::sink())?;
    Ok(written)
}

/// Unpack the streamed archive into `dest` while the remote tar is running
async fn save_report(stream: RemoteStream, mut dest: File) -> Result<u64> {
    let RemoteStream { stdout, finished } = stream;
    let reader = SyncIoBridge::new(stdout);
    let extract = tokio::task::spawn_blocking(move || extract_first_entry(reader, &mut dest));

    let (extracted, status) = tokio::join!(extract, finished);
    let extracted = extracted
        .map_err(|e| Error::ReportCopy(format!("extraction task failed: {}", e)))
        .and_then(|written| written);

    // A remote failure explains a broken archive better than the archive does
    match (extracted, status) {
        (_, Err(Error::Cancelled)) => Err(Error::Cancelled),
        (_, Err(Error::QueryFailed { stderr, .. })) if !stderr.is_empty() => Err(Error::ReportCopy(stderr)),
        (Err(e), _) => Err(e),
        (Ok(_), Err(Error::QueryFailed { stderr, .. })) => Err(Error::ReportCopy(stderr)),
        (Ok(_), Err(e)) => Err(e),
        (Ok(written), Ok(())) => Ok(written),
    }
}

/// Downloads a freshly created sos-report from the controller
pub struct SosReportDownload {
    executor: RemoteExecutorRef,
    remote_command: String,
}

impl SosReportDownload {
    pub fn new(executor: RemoteExecutorRef, remote_command: impl Into<String>) -> Self {
        Self {
            executor,
            remote_command: remote_command.into(),
        }
    }

    /// Run the download with `args` being everything after `sos-report download`
    pub async fn run<W: Write>(
        &self,
        target: &ExecTarget,
        args: &[String],
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<i32> {
        let flags = DownloadArgs::parse_flags(args)?;

        if flags.help {
            write!(out, "{}", DownloadArgs::usage())?;
            return Ok(0);
        }

        if flags.paths.len() > 1 {
            write!(out, "{}", DownloadArgs::usage())?;
            eprintln!("Expected at most one path argument");
            return Ok(1);
        }

        let create = flags.create_command(&self.remote_command);
        let created = match self.executor.exec_output(target, &create, cancel).await {
            Ok(stdout) => stdout,
            Err(Error::QueryFailed { stderr, .. }) => return Err(Error::ReportCreate(stderr)),
            Err(e) => return Err(e),
        };
        let report = report_path(&created)?;
        info!("Created sos-report {}", report);

        let dest = destination(&report, flags.paths.first().map(String::as_str));
        let file = File::create(&dest).map_err(|e| {
            Error::ReportCopy(format!("failed to open destination file {}: {}", dest.display(), e))
        })?;

        let copy = vec!["tar".to_string(), "-cf".into(), "-".into(), report.clone()];
        let stream = match self.executor.exec_stream(target, &copy, cancel).await {
            Ok(stream) => stream,
            Err(Error::QueryFailed { stderr, .. }) => return Err(Error::ReportCopy(stderr)),
            Err(e) => return Err(e),
        };

        let written = save_report(stream, file).await?;
        debug!("Wrote {} bytes to {}", written, dest.display());

        let (color, reset) = if target.tty { (GREEN, RESET) } else { ("", "") };
        writeln!(out, "{}SUCCESS:{}\n    File saved to: {}", color, reset, dest.display())?;
        Ok(0)
    }
}
