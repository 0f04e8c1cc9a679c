use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use kube::runtime::events::{Event, EventType};
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument};

use crate::api::cloudhsm::CloudHSM;

use super::members::{ClusterMembersApi, MemberResolver};
use super::store::ObjectStore;
use super::{ReconcileError, ReconcileResult};

pub static APP_LABEL: &str = "app";
pub static HSM_IPS_KEY: &str = "hsm_ips";
pub static HSM_FIRST_IP_KEY: &str = "hsm_first_ip";
pub static HSM_IP_KEY_PREFIX: &str = "hsm_ip.";

/// ConfigMap data for the given active member addresses.
///
/// `hsm_ip.<i>` per address, `hsm_ips` as a comma separated list and
/// `hsm_first_ip` when there is at least one address.
pub fn hsm_config_data(addresses: &[String]) -> BTreeMap<String, String> {
    let mut data: BTreeMap<String, String> = addresses
        .iter()
        .enumerate()
        .map(|(i, address)| (format!("{HSM_IP_KEY_PREFIX}{i}"), address.clone()))
        .collect();

    data.insert(HSM_IPS_KEY.to_string(), addresses.join(","));
    if let Some(first) = addresses.first() {
        data.insert(HSM_FIRST_IP_KEY.to_string(), first.clone());
    }

    data
}

impl CloudHSM {
    /// ConfigMap mirroring the active HSM endpoints, owned by this CloudHSM.
    pub fn endpoints_config_map(&self, addresses: &[String]) -> ReconcileResult<ConfigMap> {
        let owner = self
            .controller_owner_ref(&())
            .ok_or_else(|| ReconcileError::OwnerReference(self.name_any()))?;

        Ok(ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name_any()),
                namespace: self.namespace(),
                labels: Some([(APP_LABEL.to_string(), self.name_any())].into()),
                owner_references: Some(vec![OwnerReference {
                    block_owner_deletion: Some(true),
                    ..owner
                }]),
                ..Default::default()
            },
            data: Some(hsm_config_data(addresses)),
            ..Default::default()
        })
    }
}

/// Keeps the endpoints ConfigMap of a CloudHSM in sync with its cluster members.
pub struct HsmReconciler<M, S> {
    resolver: MemberResolver<M>,
    store: S,
    requeue_after: Duration,
}

impl<M, S> HsmReconciler<M, S>
where
    M: ClusterMembersApi,
    S: ObjectStore,
{
    pub fn new(resolver: MemberResolver<M>, store: S, requeue_after: Duration) -> Self {
        Self {
            resolver,
            store,
            requeue_after,
        }
    }

    #[instrument(skip_all, fields(name = %hsm_ref.name, namespace = ?hsm_ref.namespace))]
    pub async fn reconcile(&self, hsm_ref: &ObjectRef<CloudHSM>) -> ReconcileResult<Action> {
        let namespace = hsm_ref.namespace.clone().unwrap_or_default();
        let Some(hsm) = self
            .store
            .get_cluster(&namespace, &hsm_ref.name)
            .await
            .map_err(ReconcileError::Load)?
        else {
            // Owned ConfigMap is garbage collected together with the CloudHSM
            debug!("CloudHSM not found, nothing to do");
            return Ok(Action::await_change());
        };

        info!(cluster_id = %hsm.spec.cluster_id, "Reconciling CloudHSM");

        let addresses = self
            .resolver
            .list_active_addresses(&hsm.spec.cluster_id)
            .await?;

        let config_map = hsm.endpoints_config_map(&addresses)?;
        self.converge(&hsm, config_map).await?;

        Ok(Action::requeue(self.requeue_after))
    }

    async fn converge(&self, hsm: &CloudHSM, mut desired: ConfigMap) -> ReconcileResult<()> {
        let namespace = desired.namespace().unwrap_or_default();
        let name = desired.name_any();

        let existing = self
            .store
            .get_config_map(&namespace, &name)
            .await
            .map_err(ReconcileError::Lookup)?;

        let Some(existing) = existing else {
            info!(configmap = %name, %namespace, "Creating a new ConfigMap");
            self.store
                .create_config_map(&desired)
                .await
                .map_err(ReconcileError::Create)?;

            return self
                .record(hsm, "Created", format!("Created ConfigMap `{name}` in `{namespace}`"))
                .await;
        };

        let changed = existing.data != desired.data || existing.labels() != desired.labels();
        desired.metadata.resource_version = existing.metadata.resource_version;

        debug!(configmap = %name, %namespace, changed, "Updating ConfigMap");
        self.store
            .replace_config_map(&desired)
            .await
            .map_err(ReconcileError::Update)?;

        if changed {
            info!(configmap = %name, %namespace, "Updated ConfigMap");
            self.record(hsm, "Updated", format!("Updated ConfigMap `{name}` in `{namespace}`"))
                .await?;
        }

        Ok(())
    }

    async fn record(&self, hsm: &CloudHSM, reason: &str, note: String) -> ReconcileResult<()> {
        self.store
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: reason.into(),
                    note: Some(note),
                    action: "Reconciling".into(),
                    secondary: None,
                },
                &hsm.object_ref(&()),
            )
            .await
            .map_err(ReconcileError::Event)
    }
}
