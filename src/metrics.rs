//! Prometheus metrics collection for Dunder
//!
//! This module provides metrics instrumentation for tracking:
//! - Classification outcomes and latency
//! - Dispatches by agent and result
//! - Retries of the classify+dispatch sequence
//!
//! Metrics are exposed via the `/metrics` endpoint in Prometheus text format.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Classification outcome for type-safe metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationOutcome {
    /// The answer named a registered agent
    Matched,
    /// The answer named nobody in the registry
    Unmatched,
    /// The completion backend failed
    Failed,
    /// The router-side classification timeout fired
    TimedOut,
    /// Registry was empty, no LLM call made
    Skipped,
}

impl ClassificationOutcome {
    /// Convert to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Unmatched => "unmatched",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of handing a request to an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    Success,
    Error,
}

impl DispatchResult {
    /// Convert to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Metrics collector for Dunder
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    classifications_total: IntCounterVec,
    classification_duration: HistogramVec,
    dispatch_total: IntCounterVec,
    route_retries: IntCounter,
    metrics_recording_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 5 outcomes
        let classifications_total = IntCounterVec::new(
            Opts::new(
                "dunder_classifications_total",
                "Total number of intent classifications by outcome",
            ),
            &["outcome"],
        )?;

        // Classification latency covers prompt rendering, the LLM round trip and matching
        let classification_duration = HistogramVec::new(
            HistogramOpts::new(
                "dunder_classification_duration_ms",
                "Intent classification latency in milliseconds",
            )
            .buckets(vec![
                1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0,
            ]),
            &["outcome"],
        )?;

        // Cardinality: registered agents × 2 results (agent names come from configuration)
        let dispatch_total = IntCounterVec::new(
            Opts::new(
                "dunder_dispatch_total",
                "Total number of requests dispatched to agents by agent and result",
            ),
            &["agent", "result"],
        )?;

        let route_retries = IntCounter::with_opts(Opts::new(
            "dunder_route_retries_total",
            "Total number of classify+dispatch retries after a retryable failure",
        ))?;

        let metrics_recording_failures = IntCounterVec::new(
            Opts::new(
                "dunder_metrics_recording_failures_total",
                "Total number of metrics recording failures by operation. \
                Indicates Prometheus internal errors.",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(classifications_total.clone()))?;
        registry.register(Box::new(classification_duration.clone()))?;
        registry.register(Box::new(dispatch_total.clone()))?;
        registry.register(Box::new(route_retries.clone()))?;
        registry.register(Box::new(metrics_recording_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            classifications_total,
            classification_duration,
            dispatch_total,
            route_retries,
            metrics_recording_failures,
        })
    }

    /// Record one classification and how long it took
    ///
    /// # Errors
    ///
    /// Returns an error if `duration_ms` is NaN, infinite or negative, or if
    /// the label lookup fails.
    pub fn record_classification(
        &self,
        outcome: ClassificationOutcome,
        duration_ms: f64,
    ) -> Result<(), prometheus::Error> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(prometheus::Error::Msg(format!(
                "Histogram value must be finite and non-negative, got: {}",
                duration_ms
            )));
        }

        self.classifications_total
            .get_metric_with_label_values(&[outcome.as_str()])?
            .inc();
        self.classification_duration
            .get_metric_with_label_values(&[outcome.as_str()])?
            .observe(duration_ms);
        Ok(())
    }

    /// Record a dispatch to `agent`
    ///
    /// # Errors
    ///
    /// Returns an error if the label lookup fails.
    pub fn record_dispatch(
        &self,
        agent: &str,
        result: DispatchResult,
    ) -> Result<(), prometheus::Error> {
        self.dispatch_total
            .get_metric_with_label_values(&[agent, result.as_str()])?
            .inc();
        Ok(())
    }

    /// Record one retry of the classify+dispatch sequence
    pub fn route_retry(&self) {
        self.route_retries.inc();
    }

    /// Number of retries recorded since startup
    pub fn route_retries_count(&self) -> u64 {
        self.route_retries.get()
    }

    /// Record that a metrics operation itself failed
    pub fn metrics_recording_failure(&self, operation: &str) {
        self.metrics_recording_failures
            .with_label_values(&[operation])
            .inc();
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    metric_family_count = metric_count,
                    "Prometheus text encoder failed"
                );
                prometheus::Error::Msg(format!(
                    "Failed to encode {} metric families: {}",
                    metric_count, e
                ))
            })?;

        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                e.utf8_error().valid_up_to(),
                e
            ))
        })
    }
}
