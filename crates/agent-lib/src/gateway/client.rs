//! `WorkloadApi` backed by the Kubernetes API server

use super::{PatchTarget, Workload, WorkloadApi};
use crate::error::{ResizeError, Result};
use crate::models::{WorkloadKind, WorkloadRef};
use crate::patch::PatchDocument;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use tracing::debug;

/// Orchestrator gateway over a shared kube client
#[derive(Clone)]
pub struct KubeWorkloadApi {
    client: Client,
}

impl KubeWorkloadApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl WorkloadApi for KubeWorkloadApi {
    async fn get_workload(&self, target: &WorkloadRef) -> Result<Workload> {
        let result = match target.kind {
            WorkloadKind::Deployment => self
                .deployments(&target.namespace)
                .get(&target.name)
                .await
                .map(|d| Workload::Deployment(Box::new(d))),
            WorkloadKind::Pod => self
                .pods(&target.namespace)
                .get(&target.name)
                .await
                .map(|p| Workload::Pod(Box::new(p))),
        };

        result.map_err(|e| read_error(target, e))
    }

    async fn patch_workload(
        &self,
        target: &WorkloadRef,
        patch_target: PatchTarget,
        doc: &PatchDocument,
    ) -> Result<()> {
        let patch = Patch::Strategic(doc.as_json());
        debug!(workload = %target, target = ?patch_target, patch = %doc.as_json(), "Submitting patch");

        let result = match target.kind {
            WorkloadKind::Deployment => {
                submit(self.deployments(&target.namespace), &target.name, patch_target, &patch).await
            }
            WorkloadKind::Pod => {
                submit(self.pods(&target.namespace), &target.name, patch_target, &patch).await
            }
        };

        result.map_err(|e| ResizeError::Apply {
            reason: e.to_string(),
        })
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        let params = ListParams::default().labels(label_selector);
        self.pods(namespace)
            .list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| ResizeError::Transient(e.to_string()))
    }
}

async fn submit<K>(
    api: Api<K>,
    name: &str,
    patch_target: PatchTarget,
    patch: &Patch<&Value>,
) -> kube::Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    let params = PatchParams::default();
    match patch_target {
        PatchTarget::Object => api.patch(name, &params, patch).await.map(|_| ()),
        PatchTarget::Subresource(subresource) => api
            .patch_subresource(subresource, name, &params, patch)
            .await
            .map(|_| ()),
    }
}

fn read_error(target: &WorkloadRef, err: kube::Error) -> ResizeError {
    match err {
        kube::Error::Api(response) if response.code == 404 => {
            ResizeError::NotFound(format!("{}: {}", target, response.message))
        }
        other => ResizeError::Transient(other.to_string()),
    }
}
