/**
 * HTTP SURFACE - axum router of the exporter
 *
 * ROUTES:
 * - GET /healthz          liveness, always "Server is UP"
 * - GET /metrics          process metrics + the exporter's own counters
 * - GET /vcd?target=name  one fresh inventory walk of the named section
 *
 * Scrape telemetry is updated here and nowhere else; the collection core
 * never touches a registry.
 */

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use serde::Deserialize;
use tracing::error;

use crate::collector::Collector;
use crate::error::CollectError;
use crate::exposition::{self, CONTENT_TYPE};
use crate::inventory::Connector;
use crate::traversal::Collection;

pub const HEALTH_MESSAGE: &str = "Server is UP";

/// Counters describing the exporter's own scrapes.
#[derive(Clone)]
pub struct ScrapeTelemetry {
    scrapes: IntCounterVec,
    errors: IntCounterVec,
    duration: HistogramVec,
}

impl ScrapeTelemetry {
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let scrapes = IntCounterVec::new(
            Opts::new("vcd_exporter_scrapes_total", "Scrapes of /vcd by target and outcome"),
            &["target", "outcome"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                "vcd_exporter_scrape_errors_total",
                "Non-fatal collection errors by target and inventory level",
            ),
            &["target", "level"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "vcd_exporter_scrape_duration_seconds",
                "Time spent collecting one target",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
            &["target"],
        )?;
        registry.register(Box::new(scrapes.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        Ok(Self {
            scrapes,
            errors,
            duration,
        })
    }

    fn observe(&self, target: &str, outcome: &Result<Collection, CollectError>, seconds: f64) {
        let label = match outcome {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        self.scrapes.with_label_values(&[target, label]).inc();
        self.duration.with_label_values(&[target]).observe(seconds);
        if let Ok(collection) = outcome {
            for err in &collection.errors {
                let level = err.level().map(|l| l.as_str()).unwrap_or("none");
                self.errors.with_label_values(&[target, level]).inc();
            }
        }
    }
}

pub struct AppState<C> {
    pub collector: Arc<Collector<C>>,
    pub telemetry: ScrapeTelemetry,
    /// Rendered on `/metrics`.
    pub registry: Registry,
}

// derive(Clone) would require C: Clone
impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            collector: Arc::clone(&self.collector),
            telemetry: self.telemetry.clone(),
            registry: self.registry.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScrapeParams {
    target: Option<String>,
}

pub fn build_router<C: Connector>(app_state: AppState<C>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { HEALTH_MESSAGE }))
        .route("/metrics", get(get_metrics::<C>))
        .route("/vcd", get(get_vcd::<C>))
        .with_state(app_state)
}

/// HTTP status of a scrape that ended without samples.
pub fn error_status(err: &CollectError) -> StatusCode {
    match err {
        CollectError::UnresolvedTarget(_) => StatusCode::NOT_FOUND,
        CollectError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CollectError::Auth { .. }
        | CollectError::Connectivity { .. }
        | CollectError::Traversal { .. }
        | CollectError::Assembly { .. } => StatusCode::BAD_GATEWAY,
    }
}

// GET /metrics
async fn get_metrics<C: Connector>(State(app): State<AppState<C>>) -> Response {
    match exposition::encode(&app.registry) {
        Ok(text) => exposition_response(text),
        Err(e) => {
            error!(error = %e, "cannot encode exporter metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// GET /vcd?target=<section>
async fn get_vcd<C: Connector>(
    State(app): State<AppState<C>>,
    Query(params): Query<ScrapeParams>,
) -> Response {
    let requested = params.target.as_deref();
    // Only configured sections become label values.
    let target = match app.collector.store().resolve(requested) {
        Ok(config) => config.section.clone(),
        Err(_) => "unresolved".to_string(),
    };

    let started = Instant::now();
    let outcome = app.collector.collect(requested).await;
    app.telemetry
        .observe(&target, &outcome, started.elapsed().as_secs_f64());

    match outcome {
        Ok(collection) => match exposition::render_samples(&collection.samples) {
            Ok(text) => exposition_response(text),
            Err(e) => {
                error!(target = %target, error = %e, "cannot render samples");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err) => (error_status(&err), err.to_string()).into_response(),
    }
}

fn exposition_response(text: String) -> Response {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], text).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Level;
    use std::time::Duration;

    #[test]
    fn test_error_status() {
        assert_eq!(
            error_status(&CollectError::UnresolvedTarget("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&CollectError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            error_status(&CollectError::traversal(Level::Org, "boom")),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_status(&CollectError::Auth {
                user: "u".into(),
                org: "o".into(),
                host: "h".into()
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_telemetry_counts_outcomes_and_errors() {
        let registry = Registry::new();
        let telemetry = ScrapeTelemetry::register(&registry).unwrap();

        let partial = Collection {
            samples: Vec::new(),
            errors: vec![
                CollectError::traversal(Level::AppGroup, "a"),
                CollectError::assembly(Level::Vm, "b"),
            ],
        };
        telemetry.observe("prod", &Ok(partial), 0.2);
        telemetry.observe("prod", &Err(CollectError::Timeout(Duration::from_secs(1))), 1.0);

        let text = exposition::encode(&registry).unwrap();
        assert!(text.contains(r#"vcd_exporter_scrapes_total{outcome="success",target="prod"} 1"#));
        assert!(text.contains(r#"vcd_exporter_scrapes_total{outcome="timeout",target="prod"} 1"#));
        assert!(text.contains(r#"vcd_exporter_scrape_errors_total{level="vapp",target="prod"} 1"#));
        assert!(text.contains(r#"vcd_exporter_scrape_errors_total{level="vm",target="prod"} 1"#));
        assert!(text.contains(r#"vcd_exporter_scrape_duration_seconds_count{target="prod"} 2"#));
    }

    #[test]
    fn test_telemetry_registers_once() {
        let registry = Registry::new();
        ScrapeTelemetry::register(&registry).unwrap();
        assert!(ScrapeTelemetry::register(&registry).is_err());
    }
}
