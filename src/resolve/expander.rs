//! Argument Expander
//!
//! Rewrites `pvc:[namespace/]name` and `pod:[namespace/]name` arguments into
//! LINSTOR resource names. A reference that cannot be resolved is passed on
//! unexpanded with a warning; only transport failures stop the command.

use super::claim::ClaimResolver;
use super::pod::PodResolver;
use crate::domain::ports::{ClusterQueryRef, NamespacedRef, ReferenceKind, ResourceToken};
use crate::error::Result;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Message for the user about what happened to an argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Argument was rewritten
    Resolved { original: String, resolved: String },
    /// Argument could not be resolved and is passed on as is
    Fallback {
        original: String,
        kind: ReferenceKind,
        reason: String,
    },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Resolved { original, resolved } => write!(f, "{} -> {}", original, resolved),
            Notice::Fallback { original, kind: ReferenceKind::Pvc, reason } => write!(
                f,
                "could not convert PVC to PV name, continue with unexpanded arg '{}': {}",
                original, reason
            ),
            Notice::Fallback { original, kind: ReferenceKind::Pod, reason } => write!(
                f,
                "could not convert pod to PV names, continue with unexpanded arg '{}': {}",
                original, reason
            ),
        }
    }
}

/// Result of expanding one argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Replacement arguments, in order
    pub args: Vec<String>,
    /// Diagnostic for the error stream, never part of `args`
    pub notice: Option<Notice>,
}

impl Expansion {
    fn unchanged(arg: &str) -> Self {
        Self {
            args: vec![arg.to_string()],
            notice: None,
        }
    }
}

/// Expands special `pvc:` and `pod:` arguments
#[derive(Clone)]
pub struct ArgumentExpander {
    claims: ClaimResolver,
    pods: PodResolver,
}

impl ArgumentExpander {
    pub fn new(cluster: ClusterQueryRef) -> Self {
        Self {
            claims: ClaimResolver::new(cluster.clone()),
            pods: PodResolver::new(cluster),
        }
    }

    /// Expand a single argument
    pub async fn expand(&self, arg: &str, cancel: &CancellationToken) -> Result<Expansion> {
        let (kind, reference) = match ResourceToken::parse(arg) {
            ResourceToken::Plain(_) => return Ok(Expansion::unchanged(arg)),
            ResourceToken::Tagged(kind, reference) => (kind, reference),
        };

        match self.resolve(kind, &reference, cancel).await {
            Ok((args, resolved)) => Ok(Expansion {
                args,
                notice: Some(Notice::Resolved {
                    original: arg.to_string(),
                    resolved,
                }),
            }),
            Err(e) if e.is_recoverable() => {
                // The notice is what the user sees
                debug!("Passing '{}' on unexpanded: {}", arg, e);
                Ok(Expansion {
                    args: vec![arg.to_string()],
                    notice: Some(Notice::Fallback {
                        original: arg.to_string(),
                        kind,
                        reason: e.to_string(),
                    }),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Expand every argument in order, collecting notices alongside
    pub async fn expand_all(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<(Vec<String>, Vec<Notice>)> {
        let mut expanded = Vec::with_capacity(args.len());
        let mut notices = Vec::new();

        for arg in args {
            let expansion = self.expand(arg, cancel).await?;
            expanded.extend(expansion.args);
            notices.extend(expansion.notice);
        }

        Ok((expanded, notices))
    }

    async fn resolve(
        &self,
        kind: ReferenceKind,
        reference: &NamespacedRef,
        cancel: &CancellationToken,
    ) -> Result<(Vec<String>, String)> {
        match kind {
            ReferenceKind::Pvc => {
                let volume = self.claims.resolve(reference, cancel).await?;
                Ok((vec![volume.to_string()], volume.into_string()))
            }
            ReferenceKind::Pod => {
                let resolved = self.pods.resolve(reference, cancel).await?;
                let mapping = resolved.mapping();
                let args = resolved.volumes.into_iter().map(|v| v.into_string()).collect();
                Ok((args, mapping))
            }
        }
    }
}
