//! Container resource sets and the override merge engine

use crate::error::{ResizeError, Result};
use crate::models::{ResourceInfo, ResourceKind, ResourceOverride};
use crate::quantity::Quantity;
use k8s_openapi::api::core::v1::ResourceRequirements;
use std::collections::BTreeMap;

/// Requests and limits of a single container, keyed by resource name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSet {
    pub requests: BTreeMap<String, Quantity>,
    pub limits: BTreeMap<String, Quantity>,
}

impl ResourceSet {
    /// Convert the orchestrator's representation; absent maps become empty ones
    pub fn from_requirements(requirements: &ResourceRequirements) -> Result<Self> {
        Ok(Self {
            requests: convert_list(requirements.requests.as_ref())?,
            limits: convert_list(requirements.limits.as_ref())?,
        })
    }

    /// Current request for a resource, zero when unset
    pub fn request(&self, kind: ResourceKind) -> Quantity {
        self.requests
            .get(kind.as_str())
            .copied()
            .unwrap_or(Quantity::ZERO)
    }

    /// Current limit for a resource, zero when unset
    pub fn limit(&self, kind: ResourceKind) -> Quantity {
        self.limits
            .get(kind.as_str())
            .copied()
            .unwrap_or(Quantity::ZERO)
    }

    /// Request/limit pair as canonical strings
    pub fn info(&self, kind: ResourceKind) -> ResourceInfo {
        ResourceInfo {
            limit: self.limit(kind).to_string(),
            request: self.request(kind).to_string(),
        }
    }

    /// Set request and limit of one resource to the same amount
    pub fn set_pinned(&mut self, kind: ResourceKind, amount: Quantity) {
        self.requests.insert(kind.as_str().to_string(), amount);
        self.limits.insert(kind.as_str().to_string(), amount);
    }
}

fn convert_list(
    list: Option<&BTreeMap<String, k8s_openapi::apimachinery::pkg::api::resource::Quantity>>,
) -> Result<BTreeMap<String, Quantity>> {
    let Some(list) = list else {
        return Ok(BTreeMap::new());
    };

    list.iter()
        .map(|(name, raw)| {
            Quantity::parse(&raw.0)
                .map(|q| (name.clone(), q))
                .map_err(|_| ResizeError::MalformedLiveQuantity {
                    name: name.clone(),
                    raw: raw.0.clone(),
                })
        })
        .collect()
}

/// An override whose present fields have all been parsed successfully
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatedOverride {
    pub cpu: Option<Quantity>,
    pub memory: Option<Quantity>,
}

impl ValidatedOverride {
    /// True when no resource would change
    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }

    /// Names of the resources this override touches
    pub fn touched(&self) -> Vec<ResourceKind> {
        let mut kinds = Vec::with_capacity(2);
        if self.cpu.is_some() {
            kinds.push(ResourceKind::Cpu);
        }
        if self.memory.is_some() {
            kinds.push(ResourceKind::Memory);
        }
        kinds
    }
}

impl ResourceOverride {
    /// Parse every present field; any failure rejects the whole override.
    ///
    /// Empty or whitespace-only strings count as absent.
    pub fn validate(&self) -> Result<ValidatedOverride> {
        Ok(ValidatedOverride {
            cpu: parse_field(ResourceKind::Cpu, self.cpu.as_deref())?,
            memory: parse_field(ResourceKind::Memory, self.memory.as_deref())?,
        })
    }
}

fn parse_field(kind: ResourceKind, raw: Option<&str>) -> Result<Option<Quantity>> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => parse_for(kind, raw).map(Some),
        _ => Ok(None),
    }
}

/// Parse a quantity, tagging failures with the resource they were meant for
pub fn parse_for(kind: ResourceKind, raw: &str) -> Result<Quantity> {
    Quantity::parse(raw).map_err(|source| ResizeError::InvalidQuantity {
        kind,
        raw: raw.to_string(),
        source,
    })
}

/// Combine the live resources with an override.
///
/// Present fields overwrite both request and limit of that resource with the
/// same amount. Everything else is carried over from `current` untouched.
pub fn merge(current: &ResourceSet, changes: &ValidatedOverride) -> ResourceSet {
    let mut desired = current.clone();
    if let Some(cpu) = changes.cpu {
        desired.set_pinned(ResourceKind::Cpu, cpu);
    }
    if let Some(memory) = changes.memory {
        desired.set_pinned(ResourceKind::Memory, memory);
    }
    desired
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity as ApiQuantity;

    fn q(raw: &str) -> Quantity {
        Quantity::parse(raw).unwrap()
    }

    fn set(requests: &[(&str, &str)], limits: &[(&str, &str)]) -> ResourceSet {
        ResourceSet {
            requests: requests
                .iter()
                .map(|(k, v)| (k.to_string(), q(v)))
                .collect(),
            limits: limits.iter().map(|(k, v)| (k.to_string(), q(v))).collect(),
        }
    }

    fn override_of(cpu: Option<&str>, memory: Option<&str>) -> ResourceOverride {
        ResourceOverride {
            cpu: cpu.map(String::from),
            memory: memory.map(String::from),
        }
    }

    #[test]
    fn test_cpu_override_pins_request_and_limit() {
        let current = set(&[("memory", "256Mi")], &[("memory", "512Mi")]);
        let changes = override_of(Some("500m"), None).validate().unwrap();

        let desired = merge(&current, &changes);

        assert_eq!(desired.requests["cpu"], q("500m"));
        assert_eq!(desired.limits["cpu"], q("500m"));
        assert_eq!(desired.requests["memory"], q("256Mi"));
        assert_eq!(desired.limits["memory"], q("512Mi"));
    }

    #[test]
    fn test_empty_override_is_identity() {
        let current = set(&[("cpu", "1"), ("memory", "1Gi")], &[("cpu", "2")]);

        let changes = ResourceOverride::default().validate().unwrap();
        assert!(changes.is_empty());
        assert_eq!(merge(&current, &changes), current);

        let blank = override_of(Some(""), Some("  ")).validate().unwrap();
        assert!(blank.is_empty());
        assert_eq!(merge(&current, &blank), current);
    }

    #[test]
    fn test_merge_preserves_untouched_resource_names() {
        let current = set(
            &[("cpu", "100m"), ("ephemeral-storage", "1Gi"), ("nvidia.com/gpu", "1")],
            &[("cpu", "200m"), ("nvidia.com/gpu", "1")],
        );
        let changes = override_of(None, Some("1Gi")).validate().unwrap();

        let desired = merge(&current, &changes);

        for (name, amount) in &current.requests {
            assert_eq!(desired.requests.get(name), Some(amount), "request {name}");
        }
        for (name, amount) in &current.limits {
            assert_eq!(desired.limits.get(name), Some(amount), "limit {name}");
        }
        assert_eq!(desired.requests["memory"], q("1Gi"));
        assert_eq!(desired.limits["memory"], q("1Gi"));
    }

    #[test]
    fn test_merge_does_not_mutate_current() {
        let current = set(&[("cpu", "100m")], &[("cpu", "100m")]);
        let before = current.clone();
        let changes = override_of(Some("2"), Some("64Mi")).validate().unwrap();

        let _ = merge(&current, &changes);

        assert_eq!(current, before);
    }

    #[test]
    fn test_invalid_field_rejects_whole_override() {
        let err = override_of(Some("not-a-number"), Some("1Gi"))
            .validate()
            .unwrap_err();
        match err {
            ResizeError::InvalidQuantity { kind, raw, .. } => {
                assert_eq!(kind, ResourceKind::Cpu);
                assert_eq!(raw, "not-a-number");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = override_of(Some("1"), Some("12XB")).validate().unwrap_err();
        assert!(matches!(
            err,
            ResizeError::InvalidQuantity {
                kind: ResourceKind::Memory,
                ..
            }
        ));
    }

    #[test]
    fn test_from_requirements_initializes_absent_maps() {
        let empty = ResourceSet::from_requirements(&ResourceRequirements::default()).unwrap();
        assert!(empty.requests.is_empty());
        assert!(empty.limits.is_empty());
        assert_eq!(empty.info(ResourceKind::Cpu).request, "0");

        let mut requests = BTreeMap::new();
        requests.insert("cpu".to_string(), ApiQuantity("250m".to_string()));
        let requirements = ResourceRequirements {
            requests: Some(requests),
            ..Default::default()
        };
        let converted = ResourceSet::from_requirements(&requirements).unwrap();
        assert_eq!(
            converted.info(ResourceKind::Cpu),
            ResourceInfo {
                limit: "0".to_string(),
                request: "250m".to_string(),
            }
        );
    }

    #[test]
    fn test_from_requirements_rejects_malformed_live_quantity() {
        let mut limits = BTreeMap::new();
        limits.insert("memory".to_string(), ApiQuantity("lots".to_string()));
        let requirements = ResourceRequirements {
            limits: Some(limits),
            ..Default::default()
        };

        let err = ResourceSet::from_requirements(&requirements).unwrap_err();
        assert!(matches!(err, ResizeError::MalformedLiveQuantity { .. }));
    }
}
