//! kubectl-linstor - LINSTOR client as a kubectl plugin
//!
//! Locates the LINSTOR controller running in the cluster and runs the
//! `linstor` client inside it, rewriting `pvc:` and `pod:` arguments into
//! LINSTOR resource names on the way.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Command Forwarder                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────┐          ┌─────────────────────────┐   │
//! │  │ Controller Locator  │          │   Argument Expander     │   │
//! │  │ (LinstorCluster /   │          │   (pvc: / pod:)         │   │
//! │  │  LinstorController) │          └───────────┬─────────────┘   │
//! │  └──────────┬──────────┘                      │                 │
//! │             │                    ┌────────────┴────────────┐    │
//! │             │                    │ Pod / Claim Resolvers   │    │
//! │             │                    └────────────┬────────────┘    │
//! ├─────────────┴───────────────────────────────────┴───────────────┤
//! │                 Ports (ClusterQuery / RemoteExecutor)           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 kubectl adapter (get / exec)                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controller`]: Controller discovery
//! - [`resolve`]: `pvc:` and `pod:` argument resolution
//! - [`forward`]: Command forwarding and sos-report download
//! - [`kubectl`]: kubectl subprocess adapter
//! - [`domain`]: Core types and ports
//! - [`config`]: Plugin configuration
//! - [`error`]: Error types and handling

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forward;
pub mod kubectl;
pub mod resolve;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::PluginConfig;

pub use controller::{ControllerLocator, InstallShape};

pub use domain::ports::{
    ClusterQuery, ClusterQueryRef, ControllerEndpoint, EndpointKind, ExecTarget, NamespacedRef,
    QueryScope, ReferenceKind, RemoteExecutor, RemoteExecutorRef, RemoteStream, ResourceQuery,
    ResourceToken, VolumeIdentifier,
};

pub use error::{Error, ErrorClass, Result};

pub use forward::{is_sos_report_download, CommandForwarder, SosReportDownload};

pub use kubectl::KubectlClient;

pub use resolve::{ArgumentExpander, ClaimResolver, Expansion, Notice, PodResolver, PodVolumes};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
