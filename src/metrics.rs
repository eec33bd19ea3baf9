use std::net::SocketAddr;

use crate::constants;

/// Install the Prometheus exporter when a metrics port is configured.
/// Without it the `metrics` macros are no-ops.
pub fn init_metrics() {
    let port: u16 = match std::env::var(constants::ENV_METRICS_PORT)
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(p) => p,
        None => return,
    };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            tracing::warn!("Prometheus exporter install failed: {}", e);
        }
    }
}

pub mod names {
    pub const RECORDS_TOTAL: &str = "skin_merge_records_total";
    pub const CODES_TOTAL: &str = "skin_merge_codes_total";
    pub const RUN_DURATION_SECONDS: &str = "skin_merge_run_duration_seconds";
}
