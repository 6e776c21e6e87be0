//! Orchestrator access for the managed workload
//!
//! This module provides:
//! - The `WorkloadApi` seam over the orchestrator (kube-backed in production)
//! - Reading the first container's resources from the live object
//! - Applying a patch to the right object and subresource for the kind
//! - Resolving the pods behind a workload for restart accounting

mod client;

pub use client::KubeWorkloadApi;

use crate::error::{ResizeError, Result};
use crate::models::{WorkloadKind, WorkloadRef};
use crate::patch::PatchDocument;
use crate::resources::ResourceSet;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Pod, PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use tracing::{debug, warn};

/// Subresource that accepts in-place resource changes on a running Pod
pub const RESIZE_SUBRESOURCE: &str = "resize";

/// A point-in-time copy of the managed object
#[derive(Debug, Clone)]
pub enum Workload {
    Deployment(Box<Deployment>),
    Pod(Box<Pod>),
}

impl Workload {
    /// The pod spec holding the container list
    pub fn pod_spec(&self) -> Option<&PodSpec> {
        match self {
            Workload::Deployment(d) => d.spec.as_ref()?.template.spec.as_ref(),
            Workload::Pod(p) => p.spec.as_ref(),
        }
    }

    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::Pod(_) => WorkloadKind::Pod,
        }
    }
}

/// Where a patch is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    /// The object itself
    Object,
    /// A named subresource of the object
    Subresource(&'static str),
}

impl PatchTarget {
    /// Deployments are patched directly; Pods only accept resource changes
    /// through their resize subresource
    pub fn for_kind(kind: WorkloadKind) -> Self {
        match kind {
            WorkloadKind::Deployment => PatchTarget::Object,
            WorkloadKind::Pod => PatchTarget::Subresource(RESIZE_SUBRESOURCE),
        }
    }
}

/// Minimal orchestrator surface the agent needs
#[async_trait]
pub trait WorkloadApi: Send + Sync {
    /// Read the managed object
    async fn get_workload(&self, target: &WorkloadRef) -> Result<Workload>;

    /// Submit a strategic merge patch
    async fn patch_workload(
        &self,
        target: &WorkloadRef,
        patch_target: PatchTarget,
        doc: &PatchDocument,
    ) -> Result<()>;

    /// List pods in a namespace matching a label selector
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>>;
}

/// Live resources of the workload's first container
#[derive(Debug, Clone)]
pub struct WorkloadSnapshot {
    pub container_name: String,
    pub resources: ResourceSet,
    pub raw: Workload,
}

/// Read the current resources of the first container.
///
/// A workload without containers is reported as `NotFound`.
pub async fn fetch(api: &dyn WorkloadApi, target: &WorkloadRef) -> Result<WorkloadSnapshot> {
    let workload = api.get_workload(target).await?;

    let container = workload
        .pod_spec()
        .and_then(|spec| spec.containers.first())
        .ok_or_else(|| ResizeError::NotFound(format!("no containers found in {}", target)))?;

    let container_name = container.name.clone();
    let resources = match &container.resources {
        Some(requirements) => ResourceSet::from_requirements(requirements)?,
        None => ResourceSet::default(),
    };

    debug!(
        workload = %target,
        container = %container_name,
        "Fetched container resources"
    );

    Ok(WorkloadSnapshot {
        container_name,
        resources,
        raw: workload,
    })
}

/// Submit `doc` to the object or subresource appropriate for the kind
pub async fn apply(api: &dyn WorkloadApi, target: &WorkloadRef, doc: &PatchDocument) -> Result<()> {
    api.patch_workload(target, PatchTarget::for_kind(target.kind), doc)
        .await
}

/// Statuses of every pod that belongs to the workload.
///
/// A Deployment resolves its pods through its selector; a Pod yields its own
/// status.
pub async fn target_pods(api: &dyn WorkloadApi, target: &WorkloadRef) -> Result<Vec<PodStatus>> {
    match api.get_workload(target).await? {
        Workload::Deployment(deployment) => {
            let selector = deployment
                .spec
                .as_ref()
                .map(|spec| selector_string(&spec.selector))
                .unwrap_or_default();

            if selector.is_empty() {
                warn!(workload = %target, "Deployment has an empty selector, no pods counted");
                return Ok(Vec::new());
            }

            let pods = api.list_pods(&target.namespace, &selector).await?;
            Ok(pods.into_iter().filter_map(|pod| pod.status).collect())
        }
        Workload::Pod(pod) => Ok(pod.status.into_iter().collect()),
    }
}

/// Sum of container restart counts across pod statuses, saturating at `i32::MAX`
pub fn total_restarts(statuses: &[PodStatus]) -> i32 {
    statuses
        .iter()
        .flat_map(|status| status.container_statuses.iter().flatten())
        .map(|container| container.restart_count)
        .fold(0i32, i32::saturating_add)
}

/// Render a label selector in the string form the list API accepts
pub fn selector_string(selector: &LabelSelector) -> String {
    let mut terms: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.as_deref().unwrap_or_default().join(",");
        let term = match expr.operator.as_str() {
            "In" => format!("{} in ({})", expr.key, values),
            "NotIn" => format!("{} notin ({})", expr.key, values),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => {
                warn!(operator = %other, key = %expr.key, "Skipping unknown selector operator");
                continue;
            }
        };
        terms.push(term);
    }

    terms.join(",")
}
