//! Observability infrastructure for the resize agent
//!
//! Provides:
//! - Prometheus metrics (orchestrator latency, patch outcomes, rejected quantities)
//! - Structured JSON logging with tracing

use crate::models::{ResourceKind, WorkloadRef};
use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for orchestrator round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ResizeMetricsInner> = OnceLock::new();

/// Orchestrator operations timed by the latency histogram
pub mod operations {
    pub const FETCH: &str = "fetch";
    pub const APPLY: &str = "apply";
    pub const LIST_PODS: &str = "list_pods";
}

struct ResizeMetricsInner {
    orchestrator_latency_seconds: HistogramVec,
    patches_total: IntCounterVec,
    invalid_quantities_total: IntCounterVec,
    workload_info: GaugeVec,
}

impl ResizeMetricsInner {
    fn new() -> Self {
        Self {
            orchestrator_latency_seconds: register_histogram_vec!(
                "resize_agent_orchestrator_latency_seconds",
                "Time spent waiting on the orchestrator API",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register orchestrator_latency_seconds"),

            patches_total: register_int_counter_vec!(
                "resize_agent_patches_total",
                "Patch requests by outcome",
                &["result"]
            )
            .expect("Failed to register patches_total"),

            invalid_quantities_total: register_int_counter_vec!(
                "resize_agent_invalid_quantities_total",
                "Override values rejected by the quantity parser",
                &["resource"]
            )
            .expect("Failed to register invalid_quantities_total"),

            workload_info: register_gauge_vec!(
                "resize_agent_workload_info",
                "The workload this agent manages",
                &["kind", "namespace", "name"]
            )
            .expect("Failed to register workload_info"),
        }
    }
}

/// Handle to the process-wide resize metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ResizeMetrics {
    _private: (),
}

impl Default for ResizeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ResizeMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ResizeMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ResizeMetricsInner {
        GLOBAL_METRICS.get_or_init(ResizeMetricsInner::new)
    }

    /// Record how long an orchestrator call took
    pub fn observe_orchestrator_latency(&self, operation: &str, duration_secs: f64) {
        self.inner()
            .orchestrator_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn inc_patches(&self, result: &str) {
        self.inner().patches_total.with_label_values(&[result]).inc();
    }

    pub fn inc_invalid_quantity(&self, kind: ResourceKind) {
        self.inner()
            .invalid_quantities_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Publish the managed workload's identity
    pub fn set_workload(&self, target: &WorkloadRef) {
        self.inner()
            .workload_info
            .with_label_values(&[&target.kind.to_string(), &target.namespace, &target.name])
            .set(1.0);
    }
}

/// Structured logger for agent events
///
/// Every event carries the managed workload's identity so a failure can be
/// diagnosed from the log line alone.
#[derive(Clone)]
pub struct StructuredLogger {
    workload: String,
}

impl StructuredLogger {
    pub fn new(target: &WorkloadRef) -> Self {
        Self {
            workload: target.to_string(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "agent_started",
            workload = %self.workload,
            agent_version = %version,
            "Resize agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            workload = %self.workload,
            reason = %reason,
            "Resize agent shutting down"
        );
    }

    /// Log a patch accepted by the orchestrator
    pub fn log_patch_applied(&self, container: &str, cpu: Option<&str>, memory: Option<&str>) {
        info!(
            event = "patch_applied",
            workload = %self.workload,
            container = %container,
            cpu = ?cpu,
            memory = ?memory,
            "Workload patched with new resource values"
        );
    }

    /// Log an override rejected before reaching the orchestrator
    pub fn log_patch_rejected(&self, kind: ResourceKind, raw: &str, reason: &str) {
        warn!(
            event = "patch_rejected",
            workload = %self.workload,
            field = %kind,
            raw_value = %raw,
            reason = %reason,
            "Rejected invalid resource override"
        );
    }

    /// Log a failed orchestrator interaction
    pub fn log_orchestrator_error(&self, operation: &str, error: &str) {
        warn!(
            event = "orchestrator_error",
            workload = %self.workload,
            operation = %operation,
            error = %error,
            "Orchestrator call failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkloadKind;

    #[test]
    fn test_resize_metrics_creation() {
        let metrics = ResizeMetrics::new();

        metrics.observe_orchestrator_latency(operations::FETCH, 0.01);
        metrics.observe_orchestrator_latency(operations::APPLY, 0.02);
        metrics.inc_patches("ok");
        metrics.inc_invalid_quantity(ResourceKind::Cpu);
        metrics.set_workload(&WorkloadRef::new(WorkloadKind::Pod, "ippr", "ippr"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new(&WorkloadRef::new(
            WorkloadKind::Deployment,
            "ippr",
            "web",
        ));
        assert_eq!(logger.workload, "Deployment ippr/web");
    }
}
