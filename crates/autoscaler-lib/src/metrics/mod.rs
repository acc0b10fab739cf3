//! Utilization metrics from an external metrics source
//!
//! The client in this module never fails: any error from the source is
//! logged and replaced by zero utilization so the control loop keeps its
//! shape during a monitoring outage.

mod prometheus_api;

pub use prometheus_api::PrometheusSource;

use crate::config::MetricsConfig;
use crate::error::MetricsError;
use crate::observability::AutoscalerMetrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use async_trait::async_trait;

/// Utilization reported when the metrics source cannot be read
pub const FALLBACK_UTILIZATION: f64 = 0.0;

/// Trait for metrics source implementations
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Evaluate an instant query and return the latest sample of the first series
    async fn instant_query(&self, query: &str) -> Result<f64, MetricsError>;
}

/// A utilization value and whether it came from the fallback path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationReading {
    pub percent: f64,
    pub fallback: bool,
}

impl UtilizationReading {
    fn fallback() -> Self {
        Self {
            percent: FALLBACK_UTILIZATION,
            fallback: true,
        }
    }
}

/// Render the average-rate query for a counter selector over a window
pub fn render_query(selector: &str, window: Duration) -> String {
    format!("avg(rate({}[{}]))", selector, format_window(window))
}

fn format_window(window: Duration) -> String {
    let secs = window.as_secs().max(1);
    if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Fail-open utilization client
pub struct MetricsClient {
    source: Arc<dyn MetricsSource>,
    selector: String,
    window: Duration,
    metrics: Option<AutoscalerMetrics>,
}

impl MetricsClient {
    /// Create a client for the configured selector and window
    pub fn new(source: Arc<dyn MetricsSource>, config: &MetricsConfig) -> Self {
        Self {
            source,
            selector: config.selector.clone(),
            window: config.window(),
            metrics: None,
        }
    }

    /// Count query failures in the given metrics handle
    pub fn with_metrics(mut self, metrics: AutoscalerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Query utilization percentage for an expression over a window.
    ///
    /// Returns 0.0 when the source fails.
    pub async fn query(&self, expression: &str, window: Duration) -> f64 {
        self.read(expression, window).await.percent
    }

    /// Query utilization and report whether the fallback was used
    pub async fn read(&self, expression: &str, window: Duration) -> UtilizationReading {
        let query = render_query(expression, window);

        match self.source.instant_query(&query).await {
            Ok(raw) => {
                let percent = to_percent(raw);
                debug!(query = %query, utilization = percent, "Metrics query succeeded");
                UtilizationReading {
                    percent,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(
                    query = %query,
                    error = %e,
                    "Metrics query failed, using fallback utilization"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_metrics_query_failures();
                }
                UtilizationReading::fallback()
            }
        }
    }

    /// Query utilization with the configured selector and window
    pub async fn utilization(&self) -> UtilizationReading {
        self.read(&self.selector, self.window).await
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Scale a per-second CPU rate to a percentage
fn to_percent(raw: f64) -> f64 {
    let percent = raw * 100.0;
    if percent.is_finite() && percent > 0.0 {
        percent
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticSource {
        result: Mutex<Option<Result<f64, MetricsError>>>,
        queries: Mutex<Vec<String>>,
    }

    impl StaticSource {
        fn returning(result: Result<f64, MetricsError>) -> Self {
            Self {
                result: Mutex::new(Some(result)),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MetricsSource for StaticSource {
        async fn instant_query(&self, query: &str) -> Result<f64, MetricsError> {
            self.queries.lock().unwrap().push(query.to_string());
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(MetricsError::EmptyResult))
        }
    }

    #[test]
    fn test_render_query_reference_window() {
        let query = render_query(
            r#"container_cpu_usage_seconds_total{pod=~"cpu-eater.*"}"#,
            Duration::from_secs(60),
        );
        assert_eq!(
            query,
            r#"avg(rate(container_cpu_usage_seconds_total{pod=~"cpu-eater.*"}[1m]))"#
        );
    }

    #[test]
    fn test_render_query_seconds_window() {
        assert_eq!(render_query("up", Duration::from_secs(90)), "avg(rate(up[90s]))");
        assert_eq!(render_query("up", Duration::from_secs(300)), "avg(rate(up[5m]))");
    }

    #[tokio::test]
    async fn test_query_scales_to_percent() {
        let source = Arc::new(StaticSource::returning(Ok(0.42)));
        let client = MetricsClient::new(source.clone(), &MetricsConfig::default());

        let value = client.query("cpu", Duration::from_secs(60)).await;

        assert!((value - 42.0).abs() < 1e-9);
        assert_eq!(source.queries.lock().unwrap()[0], "avg(rate(cpu[1m]))");
    }

    #[tokio::test]
    async fn test_query_fails_open_to_zero() {
        let source = Arc::new(StaticSource::returning(Err(MetricsError::EmptyResult)));
        let client = MetricsClient::new(source, &MetricsConfig::default());

        let reading = client.utilization().await;

        assert_eq!(reading.percent, 0.0);
        assert!(reading.fallback);
    }

    #[tokio::test]
    async fn test_negative_rate_is_coerced_to_zero() {
        let source = Arc::new(StaticSource::returning(Ok(-0.3)));
        let client = MetricsClient::new(source, &MetricsConfig::default());

        let reading = client.utilization().await;

        assert_eq!(reading.percent, 0.0);
        assert!(!reading.fallback);
    }

    #[tokio::test]
    async fn test_multi_core_utilization_passes_through() {
        let source = Arc::new(StaticSource::returning(Ok(1.5)));
        let client = MetricsClient::new(source, &MetricsConfig::default());

        assert!((client.utilization().await.percent - 150.0).abs() < 1e-9);
    }
}
