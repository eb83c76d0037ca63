//! Prometheus metrics for chat-service.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

static INIT_LOCK: Mutex<()> = Mutex::new(());

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Request metrics
pub static CHAT_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Provider metrics
pub static GENAI_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GENAI_PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static GENAI_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Database metrics
pub static DB_OPERATION_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static DB_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let chat_requests = IntCounterVec::new(
        Opts::new("chat_requests_total", "Total chat requests by outcome"),
        &["outcome"],
    )?;

    let genai_tokens = IntCounterVec::new(
        Opts::new("genai_tokens_total", "Total tokens processed"),
        &["model", "type"], // type: input, output
    )?;

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "genai_provider_latency_seconds",
            "AI provider API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["provider", "model"],
    )?;

    let provider_errors = IntCounterVec::new(
        Opts::new("genai_provider_errors_total", "Total AI provider errors"),
        &["provider", "error_type"],
    )?;

    let db_duration = HistogramVec::new(
        HistogramOpts::new(
            "db_operation_duration_seconds",
            "Database operation duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["operation", "collection"],
    )?;

    let db_errors = IntCounterVec::new(
        Opts::new("db_errors_total", "Total database errors"),
        &["operation", "collection"],
    )?;

    registry.register(Box::new(chat_requests.clone()))?;
    registry.register(Box::new(genai_tokens.clone()))?;
    registry.register(Box::new(provider_latency.clone()))?;
    registry.register(Box::new(provider_errors.clone()))?;
    registry.register(Box::new(db_duration.clone()))?;
    registry.register(Box::new(db_errors.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = CHAT_REQUESTS_TOTAL.set(chat_requests);
    let _ = GENAI_TOKENS_TOTAL.set(genai_tokens);
    let _ = GENAI_PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = GENAI_PROVIDER_ERRORS_TOTAL.set(provider_errors);
    let _ = DB_OPERATION_DURATION_SECONDS.set(db_duration);
    let _ = DB_ERRORS_TOTAL.set(db_errors);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record the final outcome of a chat request.
pub fn record_chat_request(outcome: &str) {
    if let Some(counter) = CHAT_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_tokens(model: &str, input_tokens: i32, output_tokens: i32) {
    if let Some(counter) = GENAI_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[model, "input"])
            .inc_by(input_tokens.max(0) as u64);
        counter
            .with_label_values(&[model, "output"])
            .inc_by(output_tokens.max(0) as u64);
    }
}

/// Record provider latency.
pub fn record_provider_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = GENAI_PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = GENAI_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

/// Record database operation duration.
pub fn record_db_operation(operation: &str, collection: &str, duration_secs: f64) {
    if let Some(histogram) = DB_OPERATION_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[operation, collection])
            .observe(duration_secs);
    }
}

/// Record a database error.
pub fn record_db_error(operation: &str, collection: &str) {
    if let Some(counter) = DB_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation, collection]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_recorded_chat_outcomes() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_chat_request("success");
        let text = get_metrics();

        assert!(text.contains("chat_requests_total"));
        assert!(text.contains("outcome=\"success\""));
    }
}
