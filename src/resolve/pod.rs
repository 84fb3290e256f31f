//! Pod Resolver
//!
//! A pod expands to the volumes of every PVC it mounts. Claims are resolved
//! one at a time in the order the pod spec lists them, and the first failure
//! aborts the whole pod.

use super::claim::ClaimResolver;
use super::lookup::{FieldSpec, ResourceLookup};
use crate::domain::ports::{ClusterQueryRef, NamespacedRef, ReferenceKind, VolumeIdentifier};
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const CLAIM_NAMES: FieldSpec<'static> = FieldSpec {
    tag: ReferenceKind::Pod,
    resource: "pods",
    jsonpath: "{.spec.volumes[*].persistentVolumeClaim.claimName}",
    field: "volume claims",
    conversion: "Pod to PVCs",
};

/// Volumes of a pod, paired by index with the claims they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodVolumes {
    pub volumes: Vec<VolumeIdentifier>,
    pub claims: Vec<String>,
}

impl PodVolumes {
    /// `[claim -> volume]` pairs, space separated
    pub fn mapping(&self) -> String {
        self.claims
            .iter()
            .zip(&self.volumes)
            .map(|(claim, volume)| format!("[{} -> {}]", claim, volume))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Resolves pod references to the LINSTOR resources of its claims
#[derive(Clone)]
pub struct PodResolver {
    lookup: ResourceLookup,
    claims: ClaimResolver,
}

impl PodResolver {
    pub fn new(cluster: ClusterQueryRef) -> Self {
        Self {
            lookup: ResourceLookup::new(cluster.clone()),
            claims: ClaimResolver::new(cluster),
        }
    }

    /// Resolve all claims of a pod, all or nothing
    pub async fn resolve(&self, pod: &NamespacedRef, cancel: &CancellationToken) -> Result<PodVolumes> {
        let claims = self.lookup.list(CLAIM_NAMES, pod, cancel).await?;
        debug!("Pod {} mounts claims {:?}", pod, claims);

        let mut volumes = Vec::with_capacity(claims.len());
        for claim in &claims {
            let claim_ref = pod.sibling(claim);
            let volume = self
                .claims
                .resolve(&claim_ref, cancel)
                .await
                .map_err(|e| Error::ClaimResolution {
                    claim: claim_ref.to_string(),
                    source: Box::new(e),
                })?;
            volumes.push(volume);
        }

        Ok(PodVolumes { volumes, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCluster;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    const POD_QUERY: &str =
        "get pods web-0 --namespace default --output jsonpath={.spec.volumes[*].persistentVolumeClaim.claimName}";

    fn pvc_query(name: &str) -> String {
        format!(
            "get persistentvolumeclaims {} --namespace default --output jsonpath={{.spec.volumeName}}",
            name
        )
    }

    #[tokio::test]
    async fn test_resolve_in_claim_order() {
        let cluster = Arc::new(
            FakeCluster::new()
                .reply(POD_QUERY, "c2 c1")
                .reply(&pvc_query("c1"), "v1")
                .reply(&pvc_query("c2"), "v2"),
        );
        let resolver = PodResolver::new(cluster.clone());

        let resolved = resolver
            .resolve(&NamespacedRef::parse("default/web-0"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resolved.claims, vec!["c2", "c1"]);
        assert_eq!(
            resolved.volumes,
            vec![VolumeIdentifier::new("v2"), VolumeIdentifier::new("v1")]
        );
        assert_eq!(resolved.mapping(), "[c2 -> v2] [c1 -> v1]");

        // Claims are looked up one by one, after the pod
        assert_eq!(
            cluster.queries(),
            vec![POD_QUERY.to_string(), pvc_query("c2"), pvc_query("c1")]
        );
    }

    #[tokio::test]
    async fn test_one_failing_claim_fails_pod() {
        let resolver = PodResolver::new(Arc::new(
            FakeCluster::new()
                .reply(POD_QUERY, "c1 c2")
                .reply(&pvc_query("c1"), "v1")
                .reply(&pvc_query("c2"), ""),
        ));

        let result = resolver
            .resolve(&NamespacedRef::parse("default/web-0"), &CancellationToken::new())
            .await;
        assert_matches!(result, Err(Error::ClaimResolution { claim, .. }) if claim == "default/c2");
    }

    #[tokio::test]
    async fn test_failed_pod_lookup_wording() {
        let resolver = PodResolver::new(Arc::new(
            FakeCluster::new().fail(POD_QUERY, "Error from server (NotFound): pods \"web-0\" not found"),
        ));

        let err = resolver
            .resolve(&NamespacedRef::parse("default/web-0"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "could not convert Pod to PVCs: Error from server (NotFound): pods \"web-0\" not found"
        );
    }

    #[tokio::test]
    async fn test_pod_without_claims() {
        let resolver = PodResolver::new(Arc::new(FakeCluster::new().reply(POD_QUERY, "")));

        let resolved = resolver
            .resolve(&NamespacedRef::parse("default/web-0"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(resolved.volumes.is_empty());
        assert!(resolved.claims.is_empty());
    }

    #[tokio::test]
    async fn test_unqualified_pod_claims_stay_unqualified() {
        let cluster = Arc::new(
            FakeCluster::new()
                .reply(
                    "get pods web-0 --output jsonpath={.spec.volumes[*].persistentVolumeClaim.claimName}",
                    "c1",
                )
                .reply("get persistentvolumeclaims c1 --output jsonpath={.spec.volumeName}", "v1"),
        );
        let resolver = PodResolver::new(cluster);

        let resolved = resolver
            .resolve(&NamespacedRef::parse("web-0"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved.volumes, vec![VolumeIdentifier::new("v1")]);
    }
}
