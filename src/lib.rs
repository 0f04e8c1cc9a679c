use config::ConfigError;
use controllers::ReconcileError;
use telemetry::TelemetryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Metrics registration error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::KubeError(_) => "kube".to_string(),
            Error::Reconcile(e) => e.metric_label().to_string(),
            Error::Metrics(_) => "metrics".to_string(),
            Error::Config(_) => "config".to_string(),
            Error::Telemetry(_) => "telemetry".to_string(),
        }
    }
}

impl ReconcileError {
    pub fn metric_label(&self) -> &'static str {
        match self {
            ReconcileError::Load(_) => "load",
            ReconcileError::Resolve(_) => "resolve",
            ReconcileError::OwnerReference(_) => "owner_reference",
            ReconcileError::Lookup(_) => "lookup",
            ReconcileError::Create(_) => "create",
            ReconcileError::Update(_) => "update",
            ReconcileError::Event(_) => "event",
        }
    }
}

/// Expose all controller components used by main
pub mod controller;
pub use crate::controller::*;
pub mod api;
pub mod config;
pub mod controllers;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::Metrics;

#[cfg(test)]
pub mod fixtures;
