use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CloudHsmSpec names the external HSM cluster whose endpoints are mirrored
/// into a ConfigMap with the same name and namespace.
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[kube(
    kind = "CloudHSM",
    group = "cloudhsm.hhamalai.net",
    version = "v1alpha1",
    plural = "cloudhsms",
    shortname = "hsm",
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.clusterId"}"#
)]
#[kube(namespaced)]
#[kube(status = "CloudHsmStatus")]
#[serde(rename_all = "camelCase")]
pub struct CloudHsmSpec {
    /// Identifier of the HSM cluster on the provider side, e.g. `cluster-igklspoyj5v`.
    ///
    /// Changing it on an existing object is not supported.
    pub cluster_id: String,
}

/// Observed state of the HSM cluster.
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
pub struct CloudHsmStatus {
    /// Reserved for a list of HSM devices. Not populated by the controller.
    #[serde(default)]
    pub devices: Vec<String>,
}
