use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, ObjectReference};
use kube::{
    api::{Api, PostParams},
    client::Client,
    runtime::events::{Event, Recorder, Reporter},
    ResourceExt,
};

use crate::api::cloudhsm::CloudHSM;

/// Namespaced object access used by the reconciler.
///
/// Absent objects are `Ok(None)`, every other failure is returned as is.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_cluster(&self, namespace: &str, name: &str) -> kube::Result<Option<CloudHSM>>;

    async fn get_config_map(&self, namespace: &str, name: &str)
        -> kube::Result<Option<ConfigMap>>;

    async fn create_config_map(&self, config_map: &ConfigMap) -> kube::Result<ConfigMap>;

    /// Full replace of an existing ConfigMap.
    async fn replace_config_map(&self, config_map: &ConfigMap) -> kube::Result<ConfigMap>;

    async fn publish(&self, event: &Event, reference: &ObjectReference) -> kube::Result<()>;
}

/// Store backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    recorder: Recorder,
}

impl KubeStore {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self {
            recorder: Recorder::new(client.clone(), reporter),
            client,
        }
    }

    fn config_maps(&self, config_map: &ConfigMap) -> Api<ConfigMap> {
        let ns = config_map.namespace().unwrap_or(String::from("default"));
        Api::namespaced(self.client.clone(), &ns)
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> kube::Result<Option<CloudHSM>> {
        Api::<CloudHSM>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> kube::Result<Option<ConfigMap>> {
        Api::<ConfigMap>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> kube::Result<ConfigMap> {
        self.config_maps(config_map)
            .create(&PostParams::default(), config_map)
            .await
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> kube::Result<ConfigMap> {
        self.config_maps(config_map)
            .replace(&config_map.name_any(), &PostParams::default(), config_map)
            .await
    }

    async fn publish(&self, event: &Event, reference: &ObjectReference) -> kube::Result<()> {
        self.recorder.publish(event, reference).await
    }
}
