//! Prometheus counters for action outcomes.

use std::net::SocketAddr;

pub const ACTIONS_SUCCESS: &str = "ranklist_actions_success_total";
pub const ACTIONS_ERROR: &str = "ranklist_actions_error_total";
pub const RANKINGS_REORDERED: &str = "ranklist_rankings_reordered_total";
pub const CATEGORIES_RECONCILED: &str = "ranklist_categories_reconciled_total";

pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            tracing::warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

pub struct ActionMetrics;

impl ActionMetrics {
    pub fn record_success(action: &'static str) {
        ::metrics::counter!(ACTIONS_SUCCESS, "action" => action).increment(1);
    }

    pub fn record_error(action: &'static str, kind: &'static str) {
        ::metrics::counter!(ACTIONS_ERROR, "action" => action, "kind" => kind).increment(1);
    }

    pub fn record_reordered(rows: usize) {
        ::metrics::counter!(RANKINGS_REORDERED).increment(rows as u64);
    }

    /// `change` is one of `inserted`, `updated`, `deleted`.
    pub fn record_categories(change: &'static str, count: usize) {
        if count > 0 {
            ::metrics::counter!(CATEGORIES_RECONCILED, "change" => change).increment(count as u64);
        }
    }
}
