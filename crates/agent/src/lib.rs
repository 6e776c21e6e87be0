//! Resize Agent - HTTP front end for in-place workload resizing
//!
//! Exposes the current CPU/memory settings and restart count of one
//! Deployment or Pod, and accepts partial resource updates for it.

pub mod api;
pub mod config;
