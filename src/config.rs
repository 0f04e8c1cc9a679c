use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub static REQUEUE_INTERVAL_ENV: &str = "HSM_REQUEUE_INTERVAL";
pub static ERROR_REQUEUE_INTERVAL_ENV: &str = "HSM_ERROR_REQUEUE_INTERVAL";
pub static BIND_ADDRESS_ENV: &str = "HSM_METRICS_BIND_ADDRESS";
pub static REPORTER_ENV: &str = "HSM_REPORTER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid duration in {0}: {1}")]
    Duration(&'static str, #[source] humantime::DurationError),

    #[error("Invalid address in {0}: {1}")]
    Address(&'static str, #[source] std::net::AddrParseError),
}

/// Controller settings, overridable from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Delay before a CloudHSM is reconciled again after a successful run.
    pub requeue_interval: Duration,
    /// Delay before a failed reconciliation is retried.
    pub error_requeue_interval: Duration,
    /// Address of the metrics and health endpoint.
    pub bind_address: SocketAddr,
    /// Reporter name on published events.
    pub reporter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            requeue_interval: Duration::from_secs(60),
            error_requeue_interval: Duration::from_secs(30),
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8443)),
            reporter: "cloudhsm-operator".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(value) = lookup(REQUEUE_INTERVAL_ENV) {
            settings.requeue_interval = humantime::parse_duration(&value)
                .map_err(|e| ConfigError::Duration(REQUEUE_INTERVAL_ENV, e))?;
        }
        if let Some(value) = lookup(ERROR_REQUEUE_INTERVAL_ENV) {
            settings.error_requeue_interval = humantime::parse_duration(&value)
                .map_err(|e| ConfigError::Duration(ERROR_REQUEUE_INTERVAL_ENV, e))?;
        }
        if let Some(value) = lookup(BIND_ADDRESS_ENV) {
            settings.bind_address = value
                .parse()
                .map_err(|e| ConfigError::Address(BIND_ADDRESS_ENV, e))?;
        }
        if let Some(value) = lookup(REPORTER_ENV) {
            settings.reporter = value;
        }

        Ok(settings)
    }
}
