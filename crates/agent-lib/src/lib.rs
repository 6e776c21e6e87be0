//! Agent library for in-place workload resizing
//!
//! This crate provides the core functionality for:
//! - Parsing and canonicalizing resource quantities
//! - Merging partial CPU/memory overrides into a container's resources
//! - Building strategic-merge patches for Deployments and Pods
//! - Reading and patching the workload through the orchestrator API
//! - Health checks and observability

pub mod error;
pub mod gateway;
pub mod health;
pub mod models;
pub mod observability;
pub mod patch;
pub mod quantity;
pub mod resources;
pub mod service;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{ResizeError, Result};
pub use gateway::{KubeWorkloadApi, WorkloadApi};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ResizeMetrics, StructuredLogger};
pub use quantity::{Quantity, QuantityError};
pub use resources::{merge, ResourceSet, ValidatedOverride};
pub use service::{ResizeService, ServiceConfig};
