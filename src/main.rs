mod config;
mod metrics;
mod purge;
mod report;
mod slack;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Cli;
use purge::retention::{now_epoch_secs, Horizon};
use purge::retry::{ErrorBudget, RetryPolicy};
use purge::Purger;
use report::RunReporter;
use slack::web::WebApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let http = reqwest::Client::builder()
        .user_agent(concat!("slacksweep/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building http client")?;

    let purge_api = WebApi::new(cli.user_token.clone(), http.clone());
    let notify_api = WebApi::new(cli.notify_token().to_string(), http.clone());

    let purger = Purger {
        api: &purge_api,
        horizon: Horizon::new(cli.retention_window()),
        retry: RetryPolicy::default(),
        preserve_reacted: cli.preserve_reacted,
    };
    let reporter = RunReporter {
        notifier: &notify_api,
        report_channel: cli.report_channel.clone(),
    };
    let mut budget = ErrorBudget::new(cli.error_budget);

    let summary = reporter
        .run(&purger, &mut budget, cli.purge_files, now_epoch_secs())
        .await?;
    info!(
        "run complete: {} deleted, {} errors in {:.1}s",
        summary.total_deleted(),
        summary.total_errors(),
        summary.elapsed_secs
    );

    if let Some(ref url) = cli.pushgateway_url {
        metrics::push_run_metrics(&http, url, &summary).await;
    }

    Ok(())
}
