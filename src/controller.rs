use crate::api::cloudhsm::CloudHSM;
use crate::config::Settings;
use crate::controllers::cloudhsm::{HsmReconciler, APP_LABEL};
use crate::controllers::members::{CloudHsmApi, MemberResolver};
use crate::controllers::store::KubeStore;
use crate::{telemetry, Error, Metrics, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{Api, ListParams, ResourceExt},
    client::Client,
    runtime::controller::{Action, Controller},
    runtime::events::Reporter,
    runtime::reflector::ObjectRef,
    runtime::watcher::Config,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

pub type Reconciler = HsmReconciler<CloudHsmApi, KubeStore>;

// Context for the reconciler
#[derive(Clone)]
pub struct Context {
    /// CloudHSM to ConfigMap reconciler
    pub reconciler: Arc<Reconciler>,
    /// Diagnostoics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prom metrics
    pub metrics: Metrics,
    /// Retry delay after a failed reconciliation
    pub error_requeue: Duration,
}

#[instrument(skip(ctx, hsm), fields(trace_id = display(telemetry::get_trace_id()), name = hsm.name_any(), namespace = hsm.namespace()))]
async fn reconcile(hsm: Arc<CloudHSM>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure();
    ctx.diagnostics.write().await.last_event = Utc::now();

    Ok(ctx
        .reconciler
        .reconcile(&ObjectRef::from_obj(hsm.as_ref()))
        .await?)
}

fn error_policy(hsm: Arc<CloudHSM>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&hsm, error);
    Action::requeue(ctx.error_requeue)
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
    #[serde(skip)]
    pub reporter: Reporter,
}
impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
            reporter: "cloudhsm-operator".into(),
        }
    }
}

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    pub fn new(reporter: Reporter) -> Self {
        Self {
            diagnostics: Arc::new(RwLock::new(Diagnostics {
                reporter,
                ..Default::default()
            })),
            registry: Default::default(),
        }
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, reconciler: Reconciler, error_requeue: Duration) -> Result<Arc<Context>> {
        Ok(Arc::new(Context {
            reconciler: Arc::new(reconciler),
            metrics: Metrics::default().register(&self.registry)?,
            diagnostics: self.diagnostics.clone(),
            error_requeue,
        }))
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, settings: Settings) -> Result<()> {
    let client = Client::try_default().await?;
    let hsms = Api::<CloudHSM>::all(client.clone());
    if let Err(e) = hsms.list(&ListParams::default().limit(1)).await {
        error!("CloudHsms are not queryable; {e:?}. Is the CRD installed?");
        return Err(e.into());
    }

    let reporter = state.diagnostics().await.reporter;
    let reconciler = HsmReconciler::new(
        MemberResolver::new(CloudHsmApi::from_env().await),
        KubeStore::new(client.clone(), reporter),
        settings.requeue_interval,
    );
    let context = state.to_context(reconciler, settings.error_requeue_interval)?;

    info!(
        requeue_interval = ?settings.requeue_interval,
        "Starting CloudHSM controller"
    );
    Controller::new(hsms, Config::default().any_semantic())
        .owns(
            Api::<ConfigMap>::all(client),
            Config::default().labels(APP_LABEL),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn state_carries_reporter_into_diagnostics() {
        let state = State::new("hsm-controller".into());
        let diagnostics = state.diagnostics().await;

        assert_eq!(diagnostics.reporter.controller, "hsm-controller");
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert!(json.get("last_event").is_some());
        assert!(json.get("reporter").is_none());
        assert!(state.metrics().is_empty());
    }
}
