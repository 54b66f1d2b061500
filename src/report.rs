use anyhow::Context;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{info, warn};

use crate::purge::files::{purge_files, FileTally};
use crate::purge::retry::ErrorBudget;
use crate::purge::{ChannelTally, Purger};
use crate::slack::SlackApi;

/// Aggregate of one run. Owned and mutated by the driving task only; the
/// concurrent delete workers hand outcomes back instead of touching counters.
#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub tallies: Vec<ChannelTally>,
    pub files: FileTally,
}

impl RunSummary {
    pub fn total_deleted(&self) -> u64 {
        self.tallies.iter().map(|t| t.deleted).sum::<u64>() + self.files.deleted
    }

    pub fn total_errors(&self) -> u64 {
        self.tallies.iter().map(|t| t.errors).sum::<u64>() + self.files.errors
    }

    fn deletes_per_sec(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.total_deleted() as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Posts the bracketing notifications and drives the purge across channels.
/// The notifier may run as a different credential than the purge token, so
/// the operational identity stays separate from the purge identity.
pub struct RunReporter<'a> {
    pub notifier: &'a dyn SlackApi,
    pub report_channel: String,
}

impl RunReporter<'_> {
    pub async fn run(
        &self,
        purger: &Purger<'_>,
        budget: &mut ErrorBudget,
        sweep_files: bool,
        now_secs: f64,
    ) -> anyhow::Result<RunSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let start_text = format!(
            "Purge run started\n{}",
            started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let thread_ts = match self
            .notifier
            .post_message(&self.report_channel, &start_text, None, false)
            .await
        {
            Ok(ts) => Some(ts),
            Err(err) => {
                // The purge matters more than the announcement.
                warn!("start notification failed: {err}");
                None
            }
        };

        let channels = purger
            .api
            .list_channels()
            .await
            .context("channel enumeration failed")?;
        info!("purging {} channels", channels.len());

        let mut tallies = Vec::with_capacity(channels.len());
        for channel in &channels {
            let tally = purger.purge_channel(budget, channel, now_secs).await?;
            info!(
                "{} (#{}): {} deleted, {} errors",
                channel.id, channel.name, tally.deleted, tally.errors
            );
            tallies.push(tally);
        }

        let files = if sweep_files {
            purge_files(purger.api, purger.horizon, purger.retry, budget, now_secs).await?
        } else {
            FileTally::default()
        };

        let finished_at = Utc::now();
        let summary = RunSummary {
            started_at,
            finished_at,
            elapsed_secs: clock.elapsed().as_secs_f64(),
            tallies,
            files,
        };

        let mut end_text = format!(
            "Purge run finished\nelapsed: {:.1}s\ndeleted: {}\nerrors: {}\navg: {:.2}/s",
            summary.elapsed_secs,
            summary.total_deleted(),
            summary.total_errors(),
            summary.deletes_per_sec(),
        );
        if sweep_files {
            end_text.push_str(&format!("\nfiles: {}", summary.files.deleted));
        }
        if let Err(err) = self
            .notifier
            .post_message(&self.report_channel, &end_text, thread_ts.as_deref(), true)
            .await
        {
            warn!("end notification failed: {err}");
        }

        Ok(summary)
    }
}
