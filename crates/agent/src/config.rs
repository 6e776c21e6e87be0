//! Agent configuration

use agent_lib::{ServiceConfig, WorkloadKind, WorkloadRef};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Namespace and name used when the downward API provides neither
const FALLBACK_NAMESPACE: &str = "ippr";
const FALLBACK_NAME: &str = "ippr";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Kind of the managed workload (`Deployment` or `Pod`)
    #[serde(default = "default_workload_kind")]
    pub workload_kind: String,

    /// Namespace of the managed workload
    #[serde(default)]
    pub namespace: String,

    /// Name of the managed workload
    #[serde(default)]
    pub workload_name: String,

    /// HTTP port for the resource API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Upper bound for each orchestrator call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_workload_kind() -> String {
    "Deployment".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            workload_kind: default_workload_kind(),
            namespace: String::new(),
            workload_name: String::new(),
            api_port: default_api_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `AGENT_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("AGENT"))
            .build()
            .context("Failed to read agent configuration")?;

        let mut loaded: AgentConfig = config
            .try_deserialize()
            .context("Invalid agent configuration")?;

        if loaded.namespace.is_empty() {
            loaded.namespace = std::env::var("NAMESPACE").unwrap_or_default();
        }
        if loaded.workload_name.is_empty() {
            loaded.workload_name = std::env::var("POD_NAME").unwrap_or_default();
        }

        Ok(loaded)
    }

    /// The workload this process manages.
    ///
    /// If either namespace or name is missing both fall back to defaults, so
    /// a half-configured agent never targets a mismatched pair.
    pub fn workload(&self) -> Result<WorkloadRef> {
        let kind: WorkloadKind = self
            .workload_kind
            .parse()
            .map_err(anyhow::Error::msg)
            .context("AGENT_WORKLOAD_KIND")?;

        let (namespace, name) = if self.namespace.is_empty() || self.workload_name.is_empty() {
            (FALLBACK_NAMESPACE, FALLBACK_NAME)
        } else {
            (self.namespace.as_str(), self.workload_name.as_str())
        };

        Ok(WorkloadRef::new(kind, namespace, name))
    }

    /// Pipeline settings; a zero timeout would fail every orchestrator call
    pub fn service_config(&self) -> Result<ServiceConfig> {
        if self.request_timeout_secs == 0 {
            anyhow::bail!("AGENT_REQUEST_TIMEOUT_SECS must be at least one second");
        }
        Ok(ServiceConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }
}
