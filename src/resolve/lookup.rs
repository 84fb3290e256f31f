//! Cluster Resource Lookup
//!
//! Reads one field of one named object. Failures of the query are mapped to
//! resolution errors: a missing namespace qualifier is the usual cause when
//! no namespace was given, otherwise kubectl's own diagnostic is surfaced.

use crate::domain::ports::{ClusterQueryRef, NamespacedRef, QueryScope, ReferenceKind, ResourceQuery};
use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Field of a named object to read
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec<'a> {
    /// Tag the user wrote, used in the missing-namespace hint
    pub tag: ReferenceKind,
    /// Plural resource kind, e.g. `persistentvolumeclaims`
    pub resource: &'a str,
    pub jsonpath: &'a str,
    /// Human readable field name for empty results
    pub field: &'a str,
    /// What the lookup converts, reported when kubectl fails
    pub conversion: &'a str,
}

/// Single round trip reads against the cluster API
#[derive(Clone)]
pub struct ResourceLookup {
    cluster: ClusterQueryRef,
}

impl ResourceLookup {
    pub fn new(cluster: ClusterQueryRef) -> Self {
        Self { cluster }
    }

    /// Read a scalar field, failing with `EmptyResult` when it is unset
    pub async fn scalar(
        &self,
        spec: FieldSpec<'_>,
        reference: &NamespacedRef,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let raw = self.fetch(spec, reference, cancel).await?;
        let value = raw.trim();

        if value.is_empty() {
            return Err(Error::EmptyResult {
                kind: spec.tag.to_string(),
                reference: reference.to_string(),
                field: spec.field.to_string(),
            });
        }

        Ok(value.to_string())
    }

    /// Read a whitespace separated list field, in the order returned
    pub async fn list(
        &self,
        spec: FieldSpec<'_>,
        reference: &NamespacedRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let raw = self.fetch(spec, reference, cancel).await?;
        Ok(raw.split_whitespace().map(str::to_string).collect())
    }

    async fn fetch(
        &self,
        spec: FieldSpec<'_>,
        reference: &NamespacedRef,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let query = ResourceQuery::named(
            spec.resource,
            &reference.name,
            QueryScope::from(reference.namespace.clone()),
            spec.jsonpath,
        );

        match self.cluster.get(&query, cancel).await {
            Ok(out) => Ok(String::from_utf8_lossy(&out).into_owned()),
            Err(Error::QueryFailed { stderr, .. }) => {
                debug!("Lookup of {} {} failed: {}", spec.resource, reference, stderr);
                match &reference.namespace {
                    None => Err(Error::AmbiguousNamespace {
                        kind: spec.tag.to_string(),
                        name: reference.name.clone(),
                    }),
                    Some(_) => Err(Error::LookupFailed {
                        conversion: spec.conversion.to_string(),
                        diagnostic: stderr,
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }
}
