//! In-memory `WorkloadApi` for tests
//!
//! Serves a fixed workload, records every call, and can be told to fail or
//! stall so pipeline behaviour can be checked without a cluster.

use crate::error::{ResizeError, Result};
use crate::gateway::{PatchTarget, Workload, WorkloadApi};
use crate::models::WorkloadRef;
use crate::patch::PatchDocument;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodStatus, PodTemplateSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as ApiQuantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// A call made against the fake
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Get(WorkloadRef),
    Patch(WorkloadRef, PatchTarget, PatchDocument),
    ListPods(String, String),
}

/// Build a container with the given requests and limits.
///
/// With both lists empty the container has no `resources` at all.
pub fn container(name: &str, requests: &[(&str, &str)], limits: &[(&str, &str)]) -> Container {
    let to_list = |items: &[(&str, &str)]| -> Option<BTreeMap<String, ApiQuantity>> {
        if items.is_empty() {
            return None;
        }
        Some(
            items
                .iter()
                .map(|(k, v)| (k.to_string(), ApiQuantity(v.to_string())))
                .collect(),
        )
    };

    let resources = if requests.is_empty() && limits.is_empty() {
        None
    } else {
        Some(ResourceRequirements {
            requests: to_list(requests),
            limits: to_list(limits),
            ..Default::default()
        })
    };

    Container {
        name: name.to_string(),
        resources,
        ..Default::default()
    }
}

/// Recording fake of the orchestrator
#[derive(Default)]
pub struct FakeWorkloadApi {
    workload: Option<Workload>,
    pods: Vec<Pod>,
    read_failure: Option<String>,
    patch_failure: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeWorkloadApi {
    /// A Deployment whose pod template holds `containers`
    pub fn deployment(name: &str, containers: Vec<Container>) -> Self {
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        };

        Self {
            workload: Some(Workload::Deployment(Box::new(deployment))),
            ..Default::default()
        }
    }

    /// A Pod running `containers`
    pub fn pod(name: &str, containers: Vec<Container>) -> Self {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers,
                ..Default::default()
            }),
            status: None,
        };

        Self {
            workload: Some(Workload::Pod(Box::new(pod))),
            ..Default::default()
        }
    }

    /// No object exists; reads report `NotFound`
    pub fn missing() -> Self {
        Self::default()
    }

    /// Set the Deployment's `matchLabels`
    pub fn with_selector(mut self, labels: &[(&str, &str)]) -> Self {
        if let Some(Workload::Deployment(deployment)) = self.workload.as_mut() {
            if let Some(spec) = deployment.spec.as_mut() {
                spec.selector = LabelSelector {
                    match_labels: Some(
                        labels
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect(),
                    ),
                    match_expressions: None,
                };
            }
        }
        self
    }

    /// Pods returned by `list_pods`, one per status
    pub fn with_pods(mut self, statuses: Vec<PodStatus>) -> Self {
        self.pods = statuses
            .into_iter()
            .map(|status| Pod {
                status: Some(status),
                ..Default::default()
            })
            .collect();
        self
    }

    /// Status of the managed Pod
    pub fn with_status(mut self, status: PodStatus) -> Self {
        if let Some(Workload::Pod(pod)) = self.workload.as_mut() {
            pod.status = Some(status);
        }
        self
    }

    /// Every read fails with a transient error
    pub fn failing_reads(mut self, message: &str) -> Self {
        self.read_failure = Some(message.to_string());
        self
    }

    /// Every patch is rejected
    pub fn rejecting_patches(mut self, reason: &str) -> Self {
        self.patch_failure = Some(reason.to_string());
        self
    }

    /// Every call stalls for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock_calls().clone()
    }

    /// Patches submitted so far, in order
    pub fn patches(&self) -> Vec<(PatchTarget, PatchDocument)> {
        self.lock_calls()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Patch(_, target, doc) => Some((*target, doc.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        self.lock_calls().push(call);
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn stall(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl WorkloadApi for FakeWorkloadApi {
    async fn get_workload(&self, target: &WorkloadRef) -> Result<Workload> {
        self.record(RecordedCall::Get(target.clone()));
        self.stall().await;

        if let Some(message) = &self.read_failure {
            return Err(ResizeError::Transient(message.clone()));
        }
        self.workload
            .clone()
            .ok_or_else(|| ResizeError::NotFound(target.to_string()))
    }

    async fn patch_workload(
        &self,
        target: &WorkloadRef,
        patch_target: PatchTarget,
        doc: &PatchDocument,
    ) -> Result<()> {
        self.record(RecordedCall::Patch(target.clone(), patch_target, doc.clone()));
        self.stall().await;

        match &self.patch_failure {
            Some(reason) => Err(ResizeError::Apply {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        self.record(RecordedCall::ListPods(
            namespace.to_string(),
            label_selector.to_string(),
        ));
        self.stall().await;

        if let Some(message) = &self.read_failure {
            return Err(ResizeError::Transient(message.clone()));
        }
        Ok(self.pods.clone())
    }
}
