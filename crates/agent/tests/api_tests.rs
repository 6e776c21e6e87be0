//! Integration tests for the agent API endpoints

use agent_lib::{
    gateway::{PatchTarget, RESIZE_SUBRESOURCE},
    health::{components, HealthRegistry},
    testing::{container, FakeWorkloadApi},
    ResizeService, ServiceConfig, WorkloadKind, WorkloadRef,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use k8s_openapi::api::core::v1::{ContainerStatus, PodStatus};
use resize_agent::api::{create_router, serve, AppState};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app(kind: WorkloadKind, api: Arc<FakeWorkloadApi>) -> (Router, HealthRegistry) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::ORCHESTRATOR).await;
    health_registry.register(components::API).await;

    let service = ResizeService::new(
        api,
        WorkloadRef::new(kind, "ippr", "ippr"),
        ServiceConfig::default(),
        health_registry.clone(),
    );
    let state = Arc::new(AppState::new(service, health_registry.clone()));

    (create_router(state), health_registry)
}

fn pod_api() -> Arc<FakeWorkloadApi> {
    Arc::new(FakeWorkloadApi::pod(
        "ippr",
        vec![container(
            "ippr",
            &[("cpu", "250m"), ("memory", "128Mi")],
            &[("cpu", "500m"), ("memory", "256Mi")],
        )],
    ))
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_patch(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/patch")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_cpu_info_reports_canonical_quantities() {
    let (app, _) = setup_test_app(WorkloadKind::Pod, pod_api()).await;

    let (status, body) = get(app, "/api/cpuInfo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"limit": "500m", "request": "250m"}));
}

#[tokio::test]
async fn test_mem_info_reports_canonical_quantities() {
    let (app, _) = setup_test_app(WorkloadKind::Pod, pod_api()).await;

    let (status, body) = get(app, "/api/memInfo").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"limit": "256Mi", "request": "128Mi"}));
}

#[tokio::test]
async fn test_restarts_sums_container_statuses() {
    let api = Arc::new(
        FakeWorkloadApi::deployment("ippr", vec![container("ippr", &[], &[])])
            .with_selector(&[("app", "ippr")])
            .with_pods(vec![
                PodStatus {
                    container_statuses: Some(vec![
                        ContainerStatus {
                            restart_count: 2,
                            ..Default::default()
                        },
                        ContainerStatus {
                            restart_count: 1,
                            ..Default::default()
                        },
                    ]),
                    ..Default::default()
                },
                PodStatus::default(),
            ]),
    );
    let (app, _) = setup_test_app(WorkloadKind::Deployment, api).await;

    let (status, body) = get(app, "/api/restarts").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"restarts": 3}));
}

#[tokio::test]
async fn test_patch_memory_on_pod_uses_resize_subresource() {
    let api = Arc::new(FakeWorkloadApi::pod("ippr", vec![container("ippr", &[], &[])]));
    let (app, _) = setup_test_app(WorkloadKind::Pod, api.clone()).await;

    let (status, body) = post_patch(app, r#"{"memory": "1Gi"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let patches = api.patches();
    assert_eq!(patches.len(), 1);
    let (target, doc) = &patches[0];
    assert_eq!(*target, PatchTarget::Subresource(RESIZE_SUBRESOURCE));
    assert_eq!(
        doc.as_json(),
        &serde_json::json!({"spec": {"containers": [{
            "name": "ippr",
            "resources": {
                "requests": {"memory": "1Gi"},
                "limits": {"memory": "1Gi"}
            }
        }]}})
    );
}

#[tokio::test]
async fn test_patch_memory_on_pod_resends_existing_cpu() {
    let api = pod_api();
    let (app, _) = setup_test_app(WorkloadKind::Pod, api.clone()).await;

    let (status, body) = post_patch(app, r#"{"memory": "1Gi"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Pod resized successfully");

    let patches = api.patches();
    assert_eq!(patches.len(), 1);
    let (target, doc) = &patches[0];
    assert_eq!(*target, PatchTarget::Subresource(RESIZE_SUBRESOURCE));
    assert_eq!(
        doc.as_json(),
        &serde_json::json!({"spec": {"containers": [{
            "name": "ippr",
            "resources": {
                "requests": {"cpu": "250m", "memory": "1Gi"},
                "limits": {"cpu": "500m", "memory": "1Gi"}
            }
        }]}})
    );
}

#[tokio::test]
async fn test_patch_invalid_cpu_returns_400_without_orchestrator_call() {
    let api = pod_api();
    let (app, _) = setup_test_app(WorkloadKind::Pod, api.clone()).await;

    let (status, body) = post_patch(app, r#"{"cpu": "not-a-number"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_QUANTITY");
    assert!(body["error"].as_str().unwrap().contains("cpu"));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_patch_malformed_body_returns_400() {
    let api = pod_api();
    let (app, _) = setup_test_app(WorkloadKind::Pod, api.clone()).await;

    let (status, body) = post_patch(app, "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "DECODE_ERROR");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_patch_empty_body_is_noop() {
    let api = pod_api();
    let (app, _) = setup_test_app(WorkloadKind::Pod, api.clone()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/patch")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_patch_rejected_by_orchestrator_returns_500() {
    let api = Arc::new(
        FakeWorkloadApi::deployment("ippr", vec![container("ippr", &[], &[])])
            .rejecting_patches("admission webhook denied the request"),
    );
    let (app, _) = setup_test_app(WorkloadKind::Deployment, api).await;

    let (status, body) = post_patch(app, r#"{"cpu": "2"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "APPLY_ERROR");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("admission webhook denied the request"));
}

#[tokio::test]
async fn test_missing_containers_returns_500() {
    let api = Arc::new(FakeWorkloadApi::deployment("ippr", vec![]));
    let (app, _) = setup_test_app(WorkloadKind::Deployment, api).await;

    let (status, body) = get(app, "/api/cpuInfo").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_get_on_patch_is_method_not_allowed() {
    let (app, _) = setup_test_app(WorkloadKind::Pod, pod_api()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/patch")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_index_serves_html() {
    let (app, _) = setup_test_app(WorkloadKind::Pod, pod_api()).await;

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/html"));
}

#[tokio::test]
async fn test_healthz_turns_unhealthy_after_failed_reads() {
    let api = Arc::new(
        FakeWorkloadApi::pod("ippr", vec![container("ippr", &[], &[])])
            .failing_reads("connection refused"),
    );
    let (app, health) = setup_test_app(WorkloadKind::Pod, api).await;

    for _ in 0..3 {
        let (status, _) = get(app.clone(), "/api/cpuInfo").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(
        body["components"]["orchestrator"]["message"],
        "Orchestrator request failed: connection refused"
    );
    assert!(!health.readiness().await.ready);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, health) = setup_test_app(WorkloadKind::Pod, pod_api()).await;

    let (status, _) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    health.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let api = pod_api();
    let (app, _) = setup_test_app(WorkloadKind::Pod, api).await;

    let (_, _) = post_patch(app.clone(), r#"{"cpu": "750m"}"#).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("resize_agent_orchestrator_latency_seconds_bucket"));
    assert!(metrics_text.contains("resize_agent_patches_total"));
    assert!(metrics_text.contains("resize_agent_workload_info"));
}

#[tokio::test]
async fn test_bind_failure_marks_api_component_degraded() {
    let (_, health) = setup_test_app(WorkloadKind::Pod, pod_api()).await;
    let service = ResizeService::new(
        pod_api(),
        WorkloadRef::new(WorkloadKind::Pod, "ippr", "ippr"),
        ServiceConfig::default(),
        health.clone(),
    );
    let state = Arc::new(AppState::new(service, health.clone()));

    let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = serve(port, state, std::future::ready(())).await;

    assert!(result.is_err());
    let report = health.health().await;
    assert_eq!(report.components[components::API].consecutive_failures, 1);
    assert!(report.components[components::API]
        .message
        .as_deref()
        .unwrap()
        .contains("Failed to bind"));
}

#[tokio::test]
async fn test_successful_bind_marks_api_component_healthy() {
    let (_, health) = setup_test_app(WorkloadKind::Pod, pod_api()).await;
    health
        .record_failure(components::API, "previous bind failed")
        .await;
    let service = ResizeService::new(
        pod_api(),
        WorkloadRef::new(WorkloadKind::Pod, "ippr", "ippr"),
        ServiceConfig::default(),
        health.clone(),
    );
    let state = Arc::new(AppState::new(service, health.clone()));

    serve(0, state, std::future::ready(())).await.unwrap();

    let report = health.health().await;
    assert_eq!(report.components[components::API].consecutive_failures, 0);
    assert!(report.components[components::API].message.is_none());
}
