use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use prometheus::Registry;
use tokio::net::TcpListener;

use vcd_devkit::fixtures::target;
use vcd_devkit::test_utils::init_tracing;
use vcd_devkit::{sample_inventory, FakeConnector, Fault, Op};
use vcd_exporter::config::TargetStore;
use vcd_exporter::error::CollectError;
use vcd_exporter::http::{build_router, AppState, ScrapeTelemetry};
use vcd_exporter::Collector;

/// Serves the router on an ephemeral port and returns its base URL.
async fn app(connector: &FakeConnector, timeout: Duration) -> String {
    let store = TargetStore::new(vec![target("default"), target("lab")]);
    let collector = Collector::new(Arc::new(store), connector.clone()).with_timeout(timeout);
    let registry = Registry::new();
    let telemetry = ScrapeTelemetry::register(&registry).unwrap();
    let router = build_router(AppState {
        collector: Arc::new(collector),
        telemetry,
        registry,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    base
}

async fn get(base: &str, path: &str) -> (StatusCode, Option<String>, String) {
    let response = reqwest::get(format!("{base}{path}")).await.unwrap();
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (status, content_type, response.text().await.unwrap())
}

#[tokio::test]
async fn test_healthz() {
    let base = app(&FakeConnector::new(), Duration::from_secs(5)).await;
    let (status, _, body) = get(&base, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Server is UP");
}

#[tokio::test]
async fn test_scrape_default_target() {
    init_tracing();
    let connector = FakeConnector::new().with_inventory("default", sample_inventory());
    let base = app(&connector, Duration::from_secs(5)).await;

    let (status, content_type, body) = get(&base, "/vcd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain; version=0.0.4; charset=utf-8"));
    assert!(body.contains("# TYPE vcd_org_is_enabled gauge"));
    assert!(body.contains(r#"vcd_org_is_enabled{org_full_name="acme corp",org_id="urn:vcloud:org:acme",org_name="acme"} 1"#));
    assert!(body.contains(r#"vm_name="web-2""#));
    assert_eq!(body.matches("vcd_vdc_vapp_vm_vcpu{").count(), 2);
    assert_eq!(connector.logouts(), 1);
}

#[tokio::test]
async fn test_scrape_named_target() {
    init_tracing();
    let connector = FakeConnector::new().with_inventory("lab", sample_inventory());
    let base = app(&connector, Duration::from_secs(5)).await;

    let (status, _, body) = get(&base, "/vcd?target=lab").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("vcd_vdc_cpu_allocated"));
    assert_eq!(connector.sections_seen(), ["lab"]);
}

#[tokio::test]
async fn test_unknown_target_is_404() {
    let connector = FakeConnector::new();
    let base = app(&connector, Duration::from_secs(5)).await;

    let (status, _, body) = get(&base, "/vcd?target=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No Config found for: nope");
    assert_eq!(connector.logins(), 0);
}

#[tokio::test]
async fn test_login_failure_is_502() {
    let connector = FakeConnector::new().fail_login(
        "default",
        Fault::Fail(CollectError::Auth {
            user: "default-user".into(),
            org: "default".into(),
            host: "default.vcd.test".into(),
        }),
    );
    let base = app(&connector, Duration::from_secs(5)).await;

    let (status, _, body) = get(&base, "/vcd").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("default-user@default"));
}

#[tokio::test]
async fn test_timeout_is_504() {
    let connector = FakeConnector::new()
        .with_inventory("default", sample_inventory())
        .fault(Op::ListOrgs, "", Fault::Hang);
    let base = app(&connector, Duration::from_millis(50)).await;

    let (status, _, _) = get(&base, "/vcd").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(connector.logouts(), 1);
}

#[tokio::test]
async fn test_metrics_counts_scrapes() {
    init_tracing();
    let connector = FakeConnector::new()
        .with_inventory("default", sample_inventory())
        .fault(
            Op::GetVm,
            "web-1",
            Fault::Fail(CollectError::traversal(vcd_exporter::Level::Vm, "boom")),
        );
    let base = app(&connector, Duration::from_secs(5)).await;

    get(&base, "/vcd").await;
    get(&base, "/vcd?target=nope").await;

    let (status, _, body) = get(&base, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"vcd_exporter_scrapes_total{outcome="success",target="default"} 1"#));
    assert!(body.contains(r#"vcd_exporter_scrapes_total{outcome="config",target="unresolved"} 1"#));
    assert!(body.contains(r#"vcd_exporter_scrape_errors_total{level="vm",target="default"} 1"#));
    // scrape samples never leak into /metrics
    assert!(!body.contains("vcd_org_is_enabled"));
}
