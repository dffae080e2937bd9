use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the pipeline series.
    pub fn init(primary_available: bool) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe();

        // Static gauge: 1 when the classifier loaded at startup.
        gauge!("primary_predictor_available").set(if primary_available { 1.0 } else { 0.0 });

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Descriptions so series show up with help text on /metrics.
pub fn describe() {
    describe_counter!("inference_requests_total", "Pipeline runs with valid input.");
    describe_counter!(
        "inference_tier_total",
        "Finalized predictions by producing tier."
    );
    describe_counter!(
        "arbiter_rejections_total",
        "Primary predictions rejected by the arbiter, by reason."
    );
    describe_counter!(
        "secondary_failures_total",
        "Generative-model prediction failures, by reason."
    );
    describe_counter!(
        "summary_fallback_total",
        "Summaries produced from the template instead of the model."
    );
    describe_counter!(
        "records_persist_failed_total",
        "Inference records that could not be persisted."
    );
}
