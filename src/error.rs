//! Error types for kubectl-linstor
//!
//! Provides structured error types for reference resolution, controller
//! discovery, the kubectl transport and the sos-report download.

use thiserror::Error;

/// Unified error type for the plugin
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Resource Lookup Errors
    // =========================================================================
    #[error("maybe missing namespace: {kind}:<namespace>/{name}")]
    AmbiguousNamespace { kind: String, name: String },

    #[error("could not convert {conversion}: {diagnostic}")]
    LookupFailed { conversion: String, diagnostic: String },

    #[error("could not find {field} for {kind} '{reference}'")]
    EmptyResult {
        kind: String,
        reference: String,
        field: String,
    },

    #[error("could not convert Pod's PVC '{claim}' to PV: {source}")]
    ClaimResolution {
        claim: String,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Controller Discovery Errors
    // =========================================================================
    #[error("could not find a managed LINSTOR Controller resource")]
    NoControllerFound,

    #[error("could not find a {kind} resource")]
    NoControllerCandidate { kind: String },

    #[error("found more than one {kind} resource: {candidates:?}")]
    AmbiguousController { kind: String, candidates: Vec<String> },

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("failed to run {program}: {reason}")]
    ToolUnavailable { program: String, reason: String },

    #[error("{command} failed: {stderr}")]
    QueryFailed { command: String, stderr: String },

    #[error("interrupted")]
    Cancelled,

    // =========================================================================
    // sos-report Errors
    // =========================================================================
    #[error("failed to parse flags: {0}")]
    ReportFlags(String),

    #[error("failed to create sos-report: {0}")]
    ReportCreate(String),

    #[error("failed to copy sos-report to host: {0}")]
    ReportCopy(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How far an error is allowed to travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Per-argument resolution failure, degrade to the literal argument
    Recoverable,
    /// Discovery or pre-flight failure, abort before any remote call
    Fatal,
    /// The underlying tool could not run or was interrupted
    Transport,
}

impl Error {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::AmbiguousNamespace { .. }
            | Error::LookupFailed { .. }
            | Error::EmptyResult { .. }
            | Error::ClaimResolution { .. } => ErrorClass::Recoverable,

            Error::ToolUnavailable { .. } | Error::Cancelled | Error::Io(_) => {
                ErrorClass::Transport
            }

            _ => ErrorClass::Fatal,
        }
    }

    /// Check if the caller may swallow this error and continue
    pub fn is_recoverable(&self) -> bool {
        // A pod whose claim lookup hit a transport failure is still a transport failure
        match self {
            Error::ClaimResolution { source, .. } => source.is_recoverable(),
            other => other.class() == ErrorClass::Recoverable,
        }
    }

    /// Process exit code used when this error ends the invocation
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type alias for the plugin
pub type Result<T> = std::result::Result<T, Error>;
