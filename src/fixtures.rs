//! Helper objects for reconciler tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, ObjectReference};
use kube::api::ObjectMeta;
use kube::core::ErrorResponse;
use kube::runtime::events::Event;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;

use crate::api::cloudhsm::{CloudHSM, CloudHsmSpec};
use crate::controllers::store::ObjectStore;

pub fn sample_hsm(name: &str, namespace: &str, cluster_id: &str) -> CloudHSM {
    let mut hsm = CloudHSM::new(
        name,
        CloudHsmSpec {
            cluster_id: cluster_id.to_string(),
        },
    );
    hsm.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(format!("{namespace}-{name}-uid")),
        ..Default::default()
    };
    hsm
}

pub fn hsm_ref(name: &str, namespace: &str) -> ObjectRef<CloudHSM> {
    ObjectRef::new(name).within(namespace)
}

fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    })
}

#[derive(Default)]
struct Inner {
    clusters: BTreeMap<(String, String), CloudHSM>,
    config_maps: BTreeMap<(String, String), ConfigMap>,
    creates: usize,
    replaces: usize,
    last_replaced_version: Option<String>,
    events: Vec<String>,
    cluster_read_error: Option<String>,
    write_error: Option<String>,
    config_map_read_error: Option<String>,
    event_error: Option<String>,
    next_version: u64,
}

/// In-memory object store, cloned handles share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn with_cluster(hsm: CloudHSM) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().clusters.insert(
            (hsm.namespace().unwrap_or_default(), hsm.name_any()),
            hsm,
        );
        store
    }

    pub fn insert_config_map(&self, config_map: ConfigMap) {
        self.inner.lock().unwrap().config_maps.insert(
            (config_map.namespace().unwrap_or_default(), config_map.name_any()),
            config_map,
        );
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.inner
            .lock()
            .unwrap()
            .config_maps
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn data(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
        self.config_map(namespace, name)?.data
    }

    pub fn creates(&self) -> usize {
        self.inner.lock().unwrap().creates
    }

    pub fn replaces(&self) -> usize {
        self.inner.lock().unwrap().replaces
    }

    pub fn last_replaced_version(&self) -> Option<String> {
        self.inner.lock().unwrap().last_replaced_version.clone()
    }

    /// Reasons of the published events, in order.
    pub fn events(&self) -> Vec<String> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn fail_cluster_reads(&self, message: &str) {
        self.inner.lock().unwrap().cluster_read_error = Some(message.to_string());
    }

    pub fn fail_writes(&self, message: &str) {
        self.inner.lock().unwrap().write_error = Some(message.to_string());
    }

    pub fn fail_config_map_reads(&self, message: &str) {
        self.inner.lock().unwrap().config_map_read_error = Some(message.to_string());
    }

    pub fn fail_events(&self, message: &str) {
        self.inner.lock().unwrap().event_error = Some(message.to_string());
    }
}

impl Inner {
    fn check_write(&self) -> kube::Result<()> {
        match &self.write_error {
            Some(message) => Err(api_error(500, "InternalError", message)),
            None => Ok(()),
        }
    }

    fn store(&mut self, config_map: &ConfigMap) -> ConfigMap {
        self.next_version += 1;
        let mut stored = config_map.clone();
        stored.metadata.resource_version = Some(self.next_version.to_string());
        self.config_maps.insert(
            (config_map.namespace().unwrap_or_default(), config_map.name_any()),
            stored.clone(),
        );
        stored
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_cluster(&self, namespace: &str, name: &str) -> kube::Result<Option<CloudHSM>> {
        let inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.cluster_read_error {
            return Err(api_error(500, "InternalError", message));
        }
        Ok(inner
            .clusters
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> kube::Result<Option<ConfigMap>> {
        if let Some(message) = &self.inner.lock().unwrap().config_map_read_error {
            return Err(api_error(503, "ServiceUnavailable", message));
        }
        Ok(self.config_map(namespace, name))
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> kube::Result<ConfigMap> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_write()?;
        let key = (config_map.namespace().unwrap_or_default(), config_map.name_any());
        if inner.config_maps.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists", "configmap already exists"));
        }
        inner.creates += 1;
        Ok(inner.store(config_map))
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> kube::Result<ConfigMap> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_write()?;
        let key = (config_map.namespace().unwrap_or_default(), config_map.name_any());
        let current = inner
            .config_maps
            .get(&key)
            .ok_or_else(|| api_error(404, "NotFound", "configmap not found"))?;
        if config_map.metadata.resource_version.is_some()
            && config_map.metadata.resource_version != current.metadata.resource_version
        {
            return Err(api_error(409, "Conflict", "the object has been modified"));
        }
        inner.replaces += 1;
        inner.last_replaced_version = config_map.metadata.resource_version.clone();
        Ok(inner.store(config_map))
    }

    async fn publish(&self, event: &Event, _reference: &ObjectReference) -> kube::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.event_error {
            return Err(api_error(403, "Forbidden", message));
        }
        inner.events.push(event.reason.clone());
        Ok(())
    }
}
