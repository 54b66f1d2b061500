use prometheus::{Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};
use tracing::{info, warn};

use crate::report::RunSummary;

const NAMESPACE: &str = "slacksweep";
const JOB_NAME: &str = "slacksweep";

fn render(summary: &RunSummary) -> Result<String, prometheus::Error> {
    let registry = Registry::new();

    let deleted = IntCounter::with_opts(
        Opts::new("deleted_messages_total", "Messages deleted by this run").namespace(NAMESPACE),
    )?;
    deleted.inc_by(summary.total_deleted() - summary.files.deleted);
    registry.register(Box::new(deleted))?;

    let files = IntCounter::with_opts(
        Opts::new("deleted_files_total", "Files deleted by this run").namespace(NAMESPACE),
    )?;
    files.inc_by(summary.files.deleted);
    registry.register(Box::new(files))?;

    let errors = IntCounter::with_opts(
        Opts::new("failures_total", "Transient failures seen by this run").namespace(NAMESPACE),
    )?;
    errors.inc_by(summary.total_errors());
    registry.register(Box::new(errors))?;

    let duration = Gauge::with_opts(
        Opts::new("run_duration_seconds", "Wall-clock duration of this run").namespace(NAMESPACE),
    )?;
    duration.set(summary.elapsed_secs);
    registry.register(Box::new(duration))?;

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Push end-of-run counters to a Prometheus pushgateway. Failures are logged
/// and swallowed; metrics never fail the run.
pub async fn push_run_metrics(http: &reqwest::Client, base_url: &str, summary: &RunSummary) {
    let body = match render(summary) {
        Ok(body) => body,
        Err(err) => {
            warn!("metrics encode failed: {err}");
            return;
        }
    };

    let url = format!("{}/metrics/job/{JOB_NAME}", base_url.trim_end_matches('/'));
    match http
        .put(&url)
        .header("content-type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => info!("pushed run metrics"),
        Ok(resp) => warn!("metrics push returned {}", resp.status()),
        Err(err) => warn!("metrics push failed: {err}"),
    }
}
