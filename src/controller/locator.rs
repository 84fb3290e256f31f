//! Controller Locator
//!
//! Finds the one LINSTOR controller the command is sent to. Two install
//! shapes are recognized, tried in order:
//!
//! 1. `LinstorCluster` (current operator): the controller workload carries
//!    the `app.kubernetes.io/component=linstor-controller` label.
//! 2. `LinstorController` (legacy operator): exactly one resource exists and
//!    its workload is named `<resource>-controller`.
//!
//! When both resource kinds are registered the current shape wins.

use crate::config::PluginConfig;
use crate::domain::ports::{
    ClusterQueryRef, ControllerEndpoint, EndpointKind, NamespacedRef, QueryScope, ResourceQuery,
};
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Plural of the current operator's custom resource
pub const CLUSTER_RESOURCE: &str = "linstorclusters";

/// Plural of the legacy operator's custom resource
pub const LEGACY_RESOURCE: &str = "linstorcontrollers";

/// One `namespace/name` line per listed object
const NAMESPACED_NAMES: &str = r#"{range .items[*]}{.metadata.namespace}{"/"}{.metadata.name}{"\n"}{end}"#;

const RUNNING_PODS: &str = "status.phase=Running";

/// Operator install shape found in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallShape {
    Cluster,
    Legacy,
}

impl InstallShape {
    /// Pick the install shape from installed API resource names
    pub fn detect(api_resources: &[String]) -> Option<Self> {
        let installed = |plural: &str| {
            api_resources
                .iter()
                .any(|resource| resource.split('.').next() == Some(plural))
        };

        if installed(CLUSTER_RESOURCE) {
            Some(InstallShape::Cluster)
        } else if installed(LEGACY_RESOURCE) {
            Some(InstallShape::Legacy)
        } else {
            None
        }
    }
}

/// Locates the LINSTOR controller endpoint
pub struct ControllerLocator {
    cluster: ClusterQueryRef,
    config: PluginConfig,
}

impl ControllerLocator {
    pub fn new(cluster: ClusterQueryRef, config: PluginConfig) -> Self {
        Self { cluster, config }
    }

    /// Resolve the controller, failing unless exactly one is found
    pub async fn locate(&self, cancel: &CancellationToken) -> Result<ControllerEndpoint> {
        let api_resources = self.cluster.api_resources(cancel).await?;

        let endpoint = match InstallShape::detect(&api_resources) {
            Some(InstallShape::Cluster) => self.locate_labelled(cancel).await?,
            Some(InstallShape::Legacy) => self.locate_legacy(cancel).await?,
            None => return Err(Error::NoControllerFound),
        };

        info!(
            "Using LINSTOR controller {} in namespace {}",
            endpoint.exec_ref(),
            endpoint.namespace
        );
        Ok(endpoint)
    }

    async fn locate_labelled(&self, cancel: &CancellationToken) -> Result<ControllerEndpoint> {
        let kind = self.config.controller_target;
        let mut query = ResourceQuery::list(kind.resource(), QueryScope::AllNamespaces, NAMESPACED_NAMES)
            .with_label_selector(self.config.controller_selector.clone());
        if kind == EndpointKind::Pod {
            query = query.with_field_selector(RUNNING_PODS);
        }

        let found = self.list(&query, cancel).await?;
        let workload = exactly_one(&format!("LINSTOR Controller {}", display_kind(kind)), found)?;

        Ok(ControllerEndpoint {
            namespace: workload.namespace.unwrap_or_default(),
            name: workload.name,
            kind,
        })
    }

    async fn locate_legacy(&self, cancel: &CancellationToken) -> Result<ControllerEndpoint> {
        let query = ResourceQuery::list(LEGACY_RESOURCE, QueryScope::AllNamespaces, NAMESPACED_NAMES);
        let found = self.list(&query, cancel).await?;
        let instance = exactly_one("LinstorController", found)?;
        let namespace = instance.namespace.unwrap_or_default();

        match self.config.controller_target {
            EndpointKind::Deployment => Ok(ControllerEndpoint {
                namespace,
                name: self.config.legacy_controller_name(&instance.name),
                kind: EndpointKind::Deployment,
            }),
            EndpointKind::Pod => {
                let query = ResourceQuery::list(
                    "pods",
                    QueryScope::Namespace(namespace.clone()),
                    NAMESPACED_NAMES,
                )
                .with_label_selector(self.config.legacy_pod_selector(&instance.name))
                .with_field_selector(RUNNING_PODS);

                let found = self.list(&query, cancel).await?;
                let pod = exactly_one("LINSTOR Controller Pod", found)?;

                Ok(ControllerEndpoint {
                    namespace: pod.namespace.unwrap_or(namespace),
                    name: pod.name,
                    kind: EndpointKind::Pod,
                })
            }
        }
    }

    async fn list(&self, query: &ResourceQuery, cancel: &CancellationToken) -> Result<Vec<NamespacedRef>> {
        let out = self.cluster.get(query, cancel).await?;
        let found: Vec<NamespacedRef> = String::from_utf8_lossy(&out)
            .split_whitespace()
            .map(NamespacedRef::parse)
            .collect();

        debug!("{} candidates: {:?}", query.kind, found);
        Ok(found)
    }
}

fn display_kind(kind: EndpointKind) -> &'static str {
    match kind {
        EndpointKind::Deployment => "Deployment",
        EndpointKind::Pod => "Pod",
    }
}

/// The single candidate, or an error naming all of them
fn exactly_one(kind: &str, mut found: Vec<NamespacedRef>) -> Result<NamespacedRef> {
    match found.len() {
        0 => Err(Error::NoControllerCandidate {
            kind: kind.to_string(),
        }),
        1 => Ok(found.remove(0)),
        _ => Err(Error::AmbiguousController {
            kind: kind.to_string(),
            candidates: found.iter().map(ToString::to_string).collect(),
        }),
    }
}
