//! Plugin configuration
//!
//! Collected from command line options and environment variables in
//! `main.rs`, consumed by the locator, the kubectl adapter and the forwarder.

use crate::domain::ports::EndpointKind;

/// Label carried by the controller workload of a LinstorCluster install
pub const CONTROLLER_COMPONENT_SELECTOR: &str = "app.kubernetes.io/component=linstor-controller";

/// Configuration for kubectl-linstor
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// kubectl binary used for every cluster call
    pub kubectl: String,
    /// Command run inside the controller
    pub remote_command: String,
    /// Address the controller as a deployment or as a running pod
    pub controller_target: EndpointKind,
    /// Label selector for the controller workload
    pub controller_selector: String,
    /// Suffix appended to a LinstorController name to get its deployment
    pub legacy_controller_suffix: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            remote_command: "linstor".to_string(),
            controller_target: EndpointKind::Deployment,
            controller_selector: CONTROLLER_COMPONENT_SELECTOR.to_string(),
            legacy_controller_suffix: "-controller".to_string(),
        }
    }
}

impl PluginConfig {
    /// Name of the workload backing a legacy LinstorController resource
    pub fn legacy_controller_name(&self, instance: &str) -> String {
        format!("{}{}", instance, self.legacy_controller_suffix)
    }

    /// Label selector matching the pods of a legacy controller workload
    pub fn legacy_pod_selector(&self, instance: &str) -> String {
        format!("app.kubernetes.io/instance={}", self.legacy_controller_name(instance))
    }
}
