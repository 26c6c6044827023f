//! Metrics collection and Prometheus export.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const UPLOADS_TOTAL: &str = "fileshare_uploads_total";
pub const DOWNLOADS_TOTAL: &str = "fileshare_downloads_total";
pub const DELETES_TOTAL: &str = "fileshare_deletes_total";
pub const COMPENSATIONS_TOTAL: &str = "fileshare_compensations_total";
pub const UPLOAD_DURATION_SECONDS: &str = "fileshare_upload_duration_seconds";

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics handle already initialized"))
}

/// Current metrics in Prometheus text format.
pub fn render_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub(crate) fn record_outcome(name: &'static str, outcome: &'static str) {
    metrics::counter!(name, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this crate that installs the global recorder.
    #[test]
    fn test_recorded_outcomes_are_rendered() {
        init_metrics().unwrap();
        assert!(init_metrics().is_err());

        record_outcome(UPLOADS_TOTAL, "success");
        record_outcome(UPLOADS_TOTAL, "success");
        record_outcome(COMPENSATIONS_TOTAL, "failed");

        let rendered = render_metrics();
        assert!(
            rendered.contains(r#"fileshare_uploads_total{outcome="success"} 2"#),
            "{}",
            rendered
        );
        assert!(rendered.contains(r#"fileshare_compensations_total{outcome="failed"} 1"#));
    }
}
