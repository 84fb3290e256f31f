//! Domain Ports - Core types and collaborator traits
//!
//! The resolvers, the controller locator and the forwarder only ever talk to
//! the cluster through these traits. The kubectl adapter implements them for
//! real use, tests implement them with scripted responses.

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

// =============================================================================
// References
// =============================================================================

/// A `[namespace/]name` reference to a namespaced cluster object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedRef {
    /// Namespace, `None` means the caller's current namespace
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl NamespacedRef {
    /// Parse a `[namespace/]name` token, splitting on the first `/`
    pub fn parse(token: &str) -> Self {
        match token.split_once('/') {
            Some((namespace, name)) => Self {
                namespace: Some(namespace.to_string()),
                name: name.to_string(),
            },
            None => Self {
                namespace: None,
                name: token.to_string(),
            },
        }
    }

    /// Qualify a sibling object name with this reference's namespace
    pub fn sibling(&self, name: &str) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for NamespacedRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Tag of a special `<tag>:<reference>` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Pvc,
    Pod,
}

impl ReferenceKind {
    /// Match a tag case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "pvc" => Some(ReferenceKind::Pvc),
            "pod" => Some(ReferenceKind::Pod),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Pvc => write!(f, "pvc"),
            ReferenceKind::Pod => write!(f, "pod"),
        }
    }
}

/// A raw command line argument, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceToken {
    /// Forwarded unchanged
    Plain(String),
    /// `pvc:` or `pod:` followed by a reference
    Tagged(ReferenceKind, NamespacedRef),
}

impl ResourceToken {
    /// Classify an argument by the prefix before its first `:`
    pub fn parse(arg: &str) -> Self {
        let Some((tag, rest)) = arg.split_once(':') else {
            return ResourceToken::Plain(arg.to_string());
        };

        match ReferenceKind::from_tag(tag) {
            Some(kind) => ResourceToken::Tagged(kind, NamespacedRef::parse(rest)),
            None => ResourceToken::Plain(arg.to_string()),
        }
    }
}

/// Name of a LINSTOR resource, which is the name of the bound PV
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeIdentifier(String);

impl VolumeIdentifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for VolumeIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Controller Endpoint
// =============================================================================

/// How the controller is addressed for remote execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndpointKind {
    #[default]
    Deployment,
    Pod,
}

impl EndpointKind {
    /// Plural resource name used when listing candidates
    pub fn resource(&self) -> &'static str {
        match self {
            EndpointKind::Deployment => "deployments",
            EndpointKind::Pod => "pods",
        }
    }
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointKind::Deployment => write!(f, "deployment"),
            EndpointKind::Pod => write!(f, "pod"),
        }
    }
}

impl std::str::FromStr for EndpointKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deployment" | "deploy" => Ok(EndpointKind::Deployment),
            "pod" => Ok(EndpointKind::Pod),
            other => Err(format!("unknown controller target '{}', use deployment or pod", other)),
        }
    }
}

/// The single LINSTOR controller the command is sent to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerEndpoint {
    pub namespace: String,
    pub name: String,
    pub kind: EndpointKind,
}

impl ControllerEndpoint {
    /// Reference understood by `kubectl exec`, e.g. `deployment/linstor-controller`
    pub fn exec_ref(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

// =============================================================================
// Cluster Query Port
// =============================================================================

/// Namespace scope of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// Whatever namespace the current context selects
    Current,
    Namespace(String),
    AllNamespaces,
}

impl From<Option<String>> for QueryScope {
    fn from(namespace: Option<String>) -> Self {
        match namespace {
            Some(namespace) => QueryScope::Namespace(namespace),
            None => QueryScope::Current,
        }
    }
}

/// A read-only query against the cluster API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    /// Resource kind, e.g. `persistentvolumeclaims`
    pub kind: String,
    /// Object name, `None` lists the kind
    pub name: Option<String>,
    pub scope: QueryScope,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
    /// jsonpath expression applied to the result
    pub jsonpath: String,
}

impl ResourceQuery {
    /// Query a single named object
    pub fn named(kind: &str, name: &str, scope: QueryScope, jsonpath: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: Some(name.to_string()),
            scope,
            label_selector: None,
            field_selector: None,
            jsonpath: jsonpath.to_string(),
        }
    }

    /// List objects of a kind
    pub fn list(kind: &str, scope: QueryScope, jsonpath: &str) -> Self {
        Self {
            kind: kind.to_string(),
            name: None,
            scope,
            label_selector: None,
            field_selector: None,
            jsonpath: jsonpath.to_string(),
        }
    }

    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn with_field_selector(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }
}

/// Port for read-only cluster API access
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// Names of all installed API resources, e.g. `linstorclusters.piraeus.io`
    async fn api_resources(&self, cancel: &CancellationToken) -> Result<Vec<String>>;

    /// Run a query and return the raw jsonpath output
    async fn get(&self, query: &ResourceQuery, cancel: &CancellationToken) -> Result<Vec<u8>>;
}

// =============================================================================
// Remote Execution Port
// =============================================================================

/// Where and how a remote command runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub endpoint: ControllerEndpoint,
    /// Attach a TTY to the remote process
    pub tty: bool,
}

/// Output of a remote command, read while the command is still running
pub struct RemoteStream {
    /// Remote stdout
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    /// Resolves once the command exits, failing with its stderr on a non-zero exit.
    /// Dropping it stops the command.
    pub finished: Pin<Box<dyn Future<Output = Result<()>> + Send>>,
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream").finish_non_exhaustive()
    }
}

/// Port for running commands inside the controller
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run with inherited stdio and return the remote exit code
    async fn exec(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<i32>;

    /// Run without a TTY and capture stdout
    async fn exec_output(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>;

    /// Run without a TTY and hand stdout over as it is produced
    async fn exec_stream(
        &self,
        target: &ExecTarget,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<RemoteStream>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterQueryRef = Arc<dyn ClusterQuery>;
pub type RemoteExecutorRef = Arc<dyn RemoteExecutor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_ref_parse() {
        assert_eq!(
            NamespacedRef::parse("data"),
            NamespacedRef { namespace: None, name: "data".into() }
        );
        assert_eq!(
            NamespacedRef::parse("default/data"),
            NamespacedRef { namespace: Some("default".into()), name: "data".into() }
        );
        // Only the first slash splits
        assert_eq!(
            NamespacedRef::parse("a/b/c"),
            NamespacedRef { namespace: Some("a".into()), name: "b/c".into() }
        );
    }

    #[test]
    fn test_namespaced_ref_display() {
        assert_eq!(NamespacedRef::parse("ns/x").to_string(), "ns/x");
        assert_eq!(NamespacedRef::parse("x").to_string(), "x");
        assert_eq!(NamespacedRef::parse("ns/pod").sibling("c1").to_string(), "ns/c1");
    }

    #[test]
    fn test_resource_token_parse() {
        assert_eq!(ResourceToken::parse("node"), ResourceToken::Plain("node".into()));
        assert_eq!(
            ResourceToken::parse("foo:bar"),
            ResourceToken::Plain("foo:bar".into())
        );
        assert_eq!(
            ResourceToken::parse("PVC:ns/data"),
            ResourceToken::Tagged(ReferenceKind::Pvc, NamespacedRef::parse("ns/data"))
        );
        assert_eq!(
            ResourceToken::parse("Pod:web-0"),
            ResourceToken::Tagged(ReferenceKind::Pod, NamespacedRef::parse("web-0"))
        );
    }

    #[test]
    fn test_endpoint_exec_ref() {
        let endpoint = ControllerEndpoint {
            namespace: "piraeus".into(),
            name: "linstor-controller".into(),
            kind: EndpointKind::Deployment,
        };
        assert_eq!(endpoint.exec_ref(), "deployment/linstor-controller");

        let endpoint = ControllerEndpoint { kind: EndpointKind::Pod, ..endpoint };
        assert_eq!(endpoint.exec_ref(), "pod/linstor-controller");
    }

    #[test]
    fn test_endpoint_kind_from_str() {
        assert_eq!("Deployment".parse::<EndpointKind>(), Ok(EndpointKind::Deployment));
        assert_eq!("pod".parse::<EndpointKind>(), Ok(EndpointKind::Pod));
        assert!("statefulset".parse::<EndpointKind>().is_err());
    }
}
