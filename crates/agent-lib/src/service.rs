//! The read-merge-build-apply pipeline behind the HTTP API
//!
//! Each call is independent: the live object is read fresh, nothing is
//! cached, and the only shared state is the immutable workload reference.
//! Concurrent patches race at the orchestrator (last write wins).

use crate::error::{ResizeError, Result};
use crate::gateway::{self, WorkloadApi};
use crate::health::{components, HealthRegistry};
use crate::models::{
    PatchResponse, ResourceInfo, ResourceKind, ResourceOverride, RestartInfo, WorkloadKind,
    WorkloadRef,
};
use crate::observability::{operations, ResizeMetrics, StructuredLogger};
use crate::patch;
use crate::resources::{merge, ValidatedOverride};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Tunables for the pipeline
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upper bound for any single orchestrator call
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Reports and patches the resources of one workload
#[derive(Clone)]
pub struct ResizeService {
    api: Arc<dyn WorkloadApi>,
    target: WorkloadRef,
    config: ServiceConfig,
    health: HealthRegistry,
    metrics: ResizeMetrics,
    logger: StructuredLogger,
}

impl ResizeService {
    pub fn new(
        api: Arc<dyn WorkloadApi>,
        target: WorkloadRef,
        config: ServiceConfig,
        health: HealthRegistry,
    ) -> Self {
        let metrics = ResizeMetrics::new();
        metrics.set_workload(&target);
        let logger = StructuredLogger::new(&target);

        Self {
            api,
            target,
            config,
            health,
            metrics,
            logger,
        }
    }

    pub fn target(&self) -> &WorkloadRef {
        &self.target
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Current CPU request and limit of the first container
    pub async fn cpu_info(&self) -> Result<ResourceInfo> {
        self.resource_info(ResourceKind::Cpu).await
    }

    /// Current memory request and limit of the first container
    pub async fn memory_info(&self) -> Result<ResourceInfo> {
        self.resource_info(ResourceKind::Memory).await
    }

    async fn resource_info(&self, kind: ResourceKind) -> Result<ResourceInfo> {
        let snapshot = self
            .call(
                operations::FETCH,
                gateway::fetch(self.api.as_ref(), &self.target),
            )
            .await?;
        Ok(snapshot.resources.info(kind))
    }

    /// Restart count summed over every container of every target pod
    pub async fn restarts(&self) -> Result<RestartInfo> {
        let statuses = self
            .call(
                operations::LIST_PODS,
                gateway::target_pods(self.api.as_ref(), &self.target),
            )
            .await?;
        Ok(RestartInfo {
            restarts: gateway::total_restarts(&statuses),
        })
    }

    /// Validate, merge and apply a partial resource update.
    ///
    /// Overrides are parsed before anything is read, so an invalid field
    /// never reaches the orchestrator. An override with no fields is a no-op.
    pub async fn patch(&self, request: &ResourceOverride) -> Result<PatchResponse> {
        let changes = match request.validate() {
            Ok(changes) => changes,
            Err(err) => {
                if let ResizeError::InvalidQuantity { kind, raw, source } = &err {
                    self.metrics.inc_invalid_quantity(*kind);
                    self.logger
                        .log_patch_rejected(*kind, raw, &source.to_string());
                }
                self.metrics.inc_patches("invalid");
                return Err(err);
            }
        };

        if changes.is_empty() {
            info!(workload = %self.target, "Empty resource override, nothing to patch");
            self.metrics.inc_patches("noop");
            return Ok(PatchResponse::ok("No resource changes requested"));
        }

        let result = self.read_merge_apply(&changes).await;
        self.metrics
            .inc_patches(if result.is_ok() { "ok" } else { "failed" });
        result
    }

    async fn read_merge_apply(&self, changes: &ValidatedOverride) -> Result<PatchResponse> {
        let snapshot = self
            .call(
                operations::FETCH,
                gateway::fetch(self.api.as_ref(), &self.target),
            )
            .await?;

        let desired = merge(&snapshot.resources, changes);
        let doc = patch::build(self.target.kind, &snapshot.container_name, &desired);
        debug!(workload = %self.target, patch = %doc.as_json(), "Built patch document");

        self.call(
            operations::APPLY,
            gateway::apply(self.api.as_ref(), &self.target, &doc),
        )
        .await?;

        let cpu = changes.cpu.map(|q| q.to_string());
        let memory = changes.memory.map(|q| q.to_string());
        self.logger
            .log_patch_applied(&snapshot.container_name, cpu.as_deref(), memory.as_deref());

        let message = match self.target.kind {
            WorkloadKind::Deployment => "Deployment patched successfully",
            WorkloadKind::Pod => "Pod resized successfully",
        };
        Ok(PatchResponse::ok(message))
    }

    /// Run one orchestrator call under the request timeout, recording
    /// latency, health and failures
    async fn call<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let timeout = self.config.request_timeout;

        let outcome = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ResizeError::Transient(format!(
                "{} timed out after {:?}",
                operation, timeout
            ))),
        };

        self.metrics
            .observe_orchestrator_latency(operation, started.elapsed().as_secs_f64());

        match &outcome {
            Ok(_) => self.health.record_success(components::ORCHESTRATOR).await,
            Err(err) => {
                self.logger
                    .log_orchestrator_error(operation, &err.to_string());
                if matches!(err, ResizeError::Transient(_)) {
                    self.health
                        .record_failure(components::ORCHESTRATOR, err.to_string())
                        .await;
                }
            }
        }

        outcome
    }
}
