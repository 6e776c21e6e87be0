//! Strategic-merge patch documents for container resources

use crate::models::WorkloadKind;
use crate::quantity::Quantity;
use crate::resources::ResourceSet;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A partial object carrying one container's resources
///
/// Containers are merged by name on the server side, so a document that
/// lists a single container leaves every other container as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument(Value);

impl PatchDocument {
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }

    /// The `resources` object of the addressed container, whichever shape
    /// the document has
    pub fn container_resources(&self) -> Option<&Value> {
        self.containers()?.first()?.get("resources")
    }

    /// The container list, under the pod template or the pod spec
    pub fn containers(&self) -> Option<&Vec<Value>> {
        let spec = self.0.get("spec")?;
        let pod_spec = match spec.get("template") {
            Some(template) => template.get("spec")?,
            None => spec,
        };
        pod_spec.get("containers")?.as_array()
    }
}

/// Shape a patch for `kind` that sets `resources` on `container_name` only.
///
/// Deployments are patched through their pod template; Pods carry the
/// container list directly under `spec`.
pub fn build(kind: WorkloadKind, container_name: &str, resources: &ResourceSet) -> PatchDocument {
    let mut resource_obj = Map::new();
    if !resources.requests.is_empty() {
        resource_obj.insert("requests".to_string(), quantity_map(&resources.requests));
    }
    if !resources.limits.is_empty() {
        resource_obj.insert("limits".to_string(), quantity_map(&resources.limits));
    }

    let containers = json!([{
        "name": container_name,
        "resources": Value::Object(resource_obj),
    }]);

    let doc = match kind {
        WorkloadKind::Deployment => json!({
            "spec": {
                "template": {
                    "spec": {
                        "containers": containers,
                    }
                }
            }
        }),
        WorkloadKind::Pod => json!({
            "spec": {
                "containers": containers,
            }
        }),
    };

    PatchDocument(doc)
}

fn quantity_map(list: &BTreeMap<String, Quantity>) -> Value {
    Value::Object(
        list.iter()
            .map(|(name, amount)| (name.clone(), Value::String(amount.to_string())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> ResourceSet {
        let mut set = ResourceSet::default();
        set.set_pinned(
            crate::models::ResourceKind::Memory,
            Quantity::parse("1Gi").unwrap(),
        );
        set
    }

    #[test]
    fn test_deployment_nests_under_pod_template() {
        let doc = build(WorkloadKind::Deployment, "app", &resources());

        assert_eq!(
            doc.as_json(),
            &json!({
                "spec": {"template": {"spec": {"containers": [{
                    "name": "app",
                    "resources": {
                        "requests": {"memory": "1Gi"},
                        "limits": {"memory": "1Gi"}
                    }
                }]}}}
            })
        );
        assert!(doc.as_json()["spec"].get("containers").is_none());
    }

    #[test]
    fn test_pod_nests_directly_under_spec() {
        let doc = build(WorkloadKind::Pod, "app", &resources());

        assert_eq!(
            doc.as_json(),
            &json!({
                "spec": {"containers": [{
                    "name": "app",
                    "resources": {
                        "requests": {"memory": "1Gi"},
                        "limits": {"memory": "1Gi"}
                    }
                }]}
            })
        );
        assert!(doc.as_json()["spec"].get("template").is_none());
    }

    #[test]
    fn test_shapes_are_not_interchangeable() {
        let deployment = build(WorkloadKind::Deployment, "app", &resources());
        let pod = build(WorkloadKind::Pod, "app", &resources());

        assert_ne!(deployment, pod);
        assert_eq!(deployment.container_resources(), pod.container_resources());
    }

    #[test]
    fn test_only_addressed_container_is_listed() {
        for kind in [WorkloadKind::Deployment, WorkloadKind::Pod] {
            let doc = build(kind, "sidecar", &resources());
            let containers = doc.containers().unwrap();
            assert_eq!(containers.len(), 1);
            assert_eq!(containers[0]["name"], "sidecar");
        }
    }

    #[test]
    fn test_empty_resource_maps_are_omitted() {
        let doc = build(WorkloadKind::Pod, "app", &ResourceSet::default());
        assert_eq!(doc.container_resources(), Some(&json!({})));
    }

    #[test]
    fn test_quantities_are_canonical() {
        let mut set = ResourceSet::default();
        set.set_pinned(
            crate::models::ResourceKind::Cpu,
            Quantity::parse("0.5").unwrap(),
        );
        let doc = build(WorkloadKind::Deployment, "app", &set);
        assert_eq!(doc.container_resources().unwrap()["limits"]["cpu"], "500m");
    }
}
