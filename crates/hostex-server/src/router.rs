use std::{sync::Arc, time::Duration};

use axum::{Router, http::HeaderMap, routing::get};
use hostex_collector::{CollectorRegistry, Scraper};
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::{config::ExporterConfig, handlers};

pub const SCRAPE_TIMEOUT_HEADER: &str = "x-prometheus-scrape-timeout-seconds";

/// Floor applied after subtracting the timeout margin.
const MIN_SCRAPE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub default_timeout: Duration,
    pub timeout_margin: Duration,
}

impl ScrapeSettings {
    /// The scrape budget: the Prometheus-provided timeout (or the default)
    /// minus the margin.
    pub fn timeout_for(&self, headers: &HeaderMap) -> Duration {
        let requested = headers
            .get(SCRAPE_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(self.default_timeout);

        requested
            .saturating_sub(self.timeout_margin)
            .max(MIN_SCRAPE_TIMEOUT)
    }
}

pub struct ExporterState {
    pub registry: Arc<CollectorRegistry>,
    pub scraper: Arc<Scraper>,
    pub settings: ScrapeSettings,
    pub metrics_path: String,
    pub in_flight: Semaphore,
}

impl ExporterState {
    pub fn new(
        registry: Arc<CollectorRegistry>,
        scraper: Arc<Scraper>,
        config: &ExporterConfig,
    ) -> Self {
        Self {
            registry,
            scraper,
            settings: ScrapeSettings {
                default_timeout: config.scrape_timeout,
                timeout_margin: config.timeout_margin,
            },
            metrics_path: config.metrics_path.clone(),
            in_flight: Semaphore::new(config.max_requests),
        }
    }
}

pub fn exporter_router(state: Arc<ExporterState>) -> Router {
    Router::new()
        .route("/", get(handlers::index::landing_page))
        .route("/health", get(handlers::health::health))
        .route(&state.metrics_path, get(handlers::metrics::scrape_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
