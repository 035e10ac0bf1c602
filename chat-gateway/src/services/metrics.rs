//! Metrics collection for chat-gateway.
//!
//! Request metrics come from `service_core::middleware::metrics`; the
//! counters here track messages and push gateway traffic.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use super::fanout::FanOutReport;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> anyhow::Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Prometheus text exposition, empty when no recorder is installed.
pub fn render_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

pub fn record_message_created(kind: &str) {
    metrics::counter!("chat_messages_created_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_fanout(report: &FanOutReport) {
    metrics::counter!("push_fanout_total", "outcome" => "delivered")
        .increment(report.delivered as u64);
    metrics::counter!("push_fanout_total", "outcome" => "failed").increment(report.failed as u64);
}

pub fn record_gateway_call(operation: &'static str, status: &'static str) {
    metrics::counter!(
        "push_gateway_calls_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}
