//! Prometheus metrics collection.
//!
//! Provides metrics for:
//! - HTTP request latency and counts
//! - Council orchestration outcomes
//! - Provider usage (tokens, cost)
//! - Streaming connections

use conclave_engine::MetricsSink;
use conclave_types::ConsensusDecision;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use uuid::Uuid;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path pattern
    pub path: String,
    /// Response status code
    pub status: u16,
}

/// Consensus outcome labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ConsensusLabels {
    /// Synthesis strategy tag.
    pub strategy: String,
    /// Confidence band.
    pub confidence: String,
}

/// Global metrics state.
pub static METRICS: Lazy<CouncilMetrics> = Lazy::new(CouncilMetrics::new);

/// Metrics state container.
#[derive(Clone)]
pub struct CouncilMetrics {
    /// Prometheus registry.
    pub registry: Arc<RwLock<Registry>>,
    /// HTTP request counter.
    pub http_requests_total: Family<HttpLabels, Counter>,
    /// HTTP request duration histogram (seconds).
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,
    /// HTTP active connections gauge.
    pub http_active_connections: Gauge,
    /// Requests submitted.
    pub requests_submitted_total: Counter,
    /// Consensus decisions by strategy and confidence.
    pub consensus_decisions_total: Family<ConsensusLabels, Counter>,
    /// Total provider cost in microdollars.
    pub provider_cost_microusd_total: Counter,
    /// Prompt tokens spent.
    pub prompt_tokens_total: Counter,
    /// Completion tokens spent.
    pub completion_tokens_total: Counter,
    /// Active SSE connections.
    pub stream_connections: Gauge,
}

impl Default for CouncilMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CouncilMetrics {
    /// Create a new metrics state with all metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests_total = Family::<HttpLabels, Counter>::default();
        registry.register(
            "conclave_http_requests",
            "Total HTTP requests",
            http_requests_total.clone(),
        );

        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 16))
            });
        registry.register(
            "conclave_http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_active_connections = Gauge::default();
        registry.register(
            "conclave_http_active_connections",
            "Number of active HTTP connections",
            http_active_connections.clone(),
        );

        let requests_submitted_total = Counter::default();
        registry.register(
            "conclave_requests_submitted",
            "Total council requests submitted",
            requests_submitted_total.clone(),
        );

        let consensus_decisions_total = Family::<ConsensusLabels, Counter>::default();
        registry.register(
            "conclave_consensus_decisions",
            "Consensus decisions by strategy and confidence",
            consensus_decisions_total.clone(),
        );

        let provider_cost_microusd_total = Counter::default();
        registry.register(
            "conclave_provider_cost_microusd",
            "Cumulative provider cost in microdollars",
            provider_cost_microusd_total.clone(),
        );

        let prompt_tokens_total = Counter::default();
        registry.register(
            "conclave_prompt_tokens",
            "Cumulative prompt tokens",
            prompt_tokens_total.clone(),
        );

        let completion_tokens_total = Counter::default();
        registry.register(
            "conclave_completion_tokens",
            "Cumulative completion tokens",
            completion_tokens_total.clone(),
        );

        let stream_connections = Gauge::default();
        registry.register(
            "conclave_stream_connections",
            "Active SSE connections",
            stream_connections.clone(),
        );

        Self {
            registry: Arc::new(RwLock::new(registry)),
            http_requests_total,
            http_request_duration_seconds,
            http_active_connections,
            requests_submitted_total,
            consensus_decisions_total,
            provider_cost_microusd_total,
            prompt_tokens_total,
            completion_tokens_total,
            stream_connections,
        }
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests_total.get_or_create(&labels).inc();
        self.http_request_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Encode metrics for Prometheus scraping.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        let registry = self.registry.read();
        prometheus_client::encoding::text::encode(&mut buffer, &registry)
            .expect("Failed to encode metrics");
        buffer
    }
}

impl MetricsSink for CouncilMetrics {
    fn log_cost(
        &self,
        request_id: Uuid,
        cost_usd: f64,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) {
        self.provider_cost_microusd_total
            .inc_by((cost_usd * 1_000_000.0) as u64);
        self.prompt_tokens_total.inc_by(prompt_tokens);
        self.completion_tokens_total.inc_by(completion_tokens);
        tracing::debug!(
            request_id = %request_id,
            cost_usd = cost_usd,
            "Request cost recorded"
        );
    }

    fn log_consensus_decision(&self, request_id: Uuid, decision: &ConsensusDecision) {
        self.consensus_decisions_total
            .get_or_create(&ConsensusLabels {
                strategy: decision.synthesis_strategy.to_string(),
                confidence: decision.confidence.to_string(),
            })
            .inc();
        tracing::debug!(request_id = %request_id, "Consensus decision recorded");
    }
}

/// Normalize path for metrics (replace dynamic segments).
fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    let normalized: Vec<&str> = parts
        .iter()
        .map(|part| {
            if is_dynamic_segment(part) {
                ":param"
            } else {
                *part
            }
        })
        .collect();
    normalized.join("/")
}

/// Check if a path segment is dynamic (UUID or numeric).
fn is_dynamic_segment(segment: &str) -> bool {
    if segment.len() == 36 && segment.contains('-') {
        return true;
    }
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_types::SynthesisStrategyKind;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/api/v1/requests"), "/api/v1/requests");
        assert_eq!(
            normalize_path("/api/v1/requests/3f9c3de4-7f1a-4a5e-8d57-8a5a2b4c6d7e"),
            "/api/v1/requests/:param"
        );
        assert_eq!(
            normalize_path("/api/v1/requests/3f9c3de4-7f1a-4a5e-8d57-8a5a2b4c6d7e/stream"),
            "/api/v1/requests/:param/stream"
        );
    }

    #[test]
    fn test_metrics_encode() {
        let metrics = CouncilMetrics::new();
        metrics.record_http_request("GET", "/health", 200, 0.001);
        let encoded = metrics.encode();
        assert!(encoded.contains("conclave_http_requests"));
    }

    #[test]
    fn test_metrics_sink_impl() {
        let metrics = CouncilMetrics::new();
        let decision = ConsensusDecision::new(
            "x",
            0.9,
            SynthesisStrategyKind::ConsensusExtraction,
            vec!["m".into()],
        )
        .unwrap();

        metrics.log_cost(Uuid::new_v4(), 0.5, 100, 50);
        metrics.log_consensus_decision(Uuid::new_v4(), &decision);

        let encoded = metrics.encode();
        assert!(encoded.contains("conclave_provider_cost_microusd"));
        assert!(encoded.contains("conclave_consensus_decisions"));
    }
}
