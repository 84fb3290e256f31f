//! Claim Resolver
//!
//! LINSTOR resources are named after the PV the CSI driver provisioned, so a
//! PVC resolves to the `spec.volumeName` it is bound to.

use super::lookup::{FieldSpec, ResourceLookup};
use crate::domain::ports::{ClusterQueryRef, NamespacedRef, ReferenceKind, VolumeIdentifier};
use crate::error::Result;
use tokio_util::sync::CancellationToken;

const BOUND_VOLUME: FieldSpec<'static> = FieldSpec {
    tag: ReferenceKind::Pvc,
    resource: "persistentvolumeclaims",
    jsonpath: "{.spec.volumeName}",
    field: "volume name",
    conversion: "PVC to PV name",
};

/// Resolves PVC references to LINSTOR resource names
#[derive(Clone)]
pub struct ClaimResolver {
    lookup: ResourceLookup,
}

impl ClaimResolver {
    pub fn new(cluster: ClusterQueryRef) -> Self {
        Self {
            lookup: ResourceLookup::new(cluster),
        }
    }

    /// Resolve a claim to the volume it is bound to
    pub async fn resolve(
        &self,
        claim: &NamespacedRef,
        cancel: &CancellationToken,
    ) -> Result<VolumeIdentifier> {
        let volume = self.lookup.scalar(BOUND_VOLUME, claim, cancel).await?;
        Ok(VolumeIdentifier::new(volume))
    }
}
