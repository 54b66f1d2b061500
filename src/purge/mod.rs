pub mod deleter;
pub mod files;
pub mod retention;
pub mod retry;

use tracing::{debug, warn};

use crate::slack::{Channel, Message, SlackApi};
use deleter::{delete_batch, DeleteOutcome};
use retention::Horizon;
use retry::{ErrorBudget, RetryPolicy};

/// One history page per paginator call; the Web API caps at 100 anyway.
pub const PAGE_SIZE: u32 = 100;

/// Run-ending failures. Everything transient stays inside the loop.
#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error("transient-failure budget exhausted: {used} failures (limit {limit})")]
    BudgetExhausted { used: u32, limit: u32 },
}

/// Per-channel outcome counts. `errors` counts failure events, so a message
/// that failed once and then deleted fine shows up in both columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTally {
    pub channel_id: String,
    pub deleted: u64,
    pub errors: u64,
}

/// Knobs for one purge run, shared across all channels.
pub struct Purger<'a> {
    pub api: &'a dyn SlackApi,
    pub horizon: Horizon,
    pub retry: RetryPolicy,
    /// Keep messages that carry at least one reaction.
    pub preserve_reacted: bool,
}

impl Purger<'_> {
    /// Drive one channel to completion: fetch a page, delete it, re-fetch.
    /// Deletion shrinks the eligible set, so re-issuing the same query walks
    /// the remaining backlog without a cursor; an empty page means done.
    pub async fn purge_channel(
        &self,
        budget: &mut ErrorBudget,
        channel: &Channel,
        now_secs: f64,
    ) -> Result<ChannelTally, PurgeError> {
        let mut tally = ChannelTally {
            channel_id: channel.id.clone(),
            ..Default::default()
        };
        let latest = self.horizon.cutoff_ts(now_secs);
        let api = self.api;
        let channel_id = channel.id.as_str();
        let latest_ref = latest.as_str();

        loop {
            let page = self
                .retry
                .run("conversations.history", budget, move || {
                    api.history(channel_id, latest_ref, PAGE_SIZE)
                })
                .await?;
            tally.errors += u64::from(page.failures);
            if page.value.is_empty() {
                break;
            }

            let work = self
                .expand_batch(budget, &mut tally, channel_id, page.value)
                .await?;
            let deleted_before = tally.deleted;

            for (message, outcome) in delete_batch(api, channel_id, work).await {
                match outcome {
                    DeleteOutcome::Deleted => tally.deleted += 1,
                    DeleteOutcome::Gone => {
                        debug!("message {}/{} was already gone", channel_id, message.ts);
                    }
                    DeleteOutcome::Failed(err) => {
                        warn!("chat.delete {}/{} failed: {err}", channel_id, message.ts);
                        tally.errors += 1;
                        budget.charge()?;
                        self.retry.pause(&err).await;

                        let ts = message.ts.as_str();
                        let retried = self
                            .retry
                            .run("chat.delete", budget, move || async move {
                                match api.delete_message(channel_id, ts).await {
                                    Ok(()) => Ok(true),
                                    Err(e) if e.is_message_gone() => Ok(false),
                                    Err(e) => Err(e),
                                }
                            })
                            .await?;
                        tally.errors += u64::from(retried.failures);
                        if retried.value {
                            tally.deleted += 1;
                        }
                    }
                }
            }

            // Preserved messages come back on every re-query; a round that
            // deleted nothing cannot make progress on the next one either.
            if tally.deleted == deleted_before {
                break;
            }
        }

        Ok(tally)
    }

    /// Turn one history page into the deletable work list: drop preserved
    /// messages, pull in thread replies behind each parent, and dedup the
    /// parent (conversations.replies lists it as its own first entry).
    async fn expand_batch(
        &self,
        budget: &mut ErrorBudget,
        tally: &mut ChannelTally,
        channel_id: &str,
        page: Vec<Message>,
    ) -> Result<Vec<Message>, PurgeError> {
        let api = self.api;
        let mut work = Vec::with_capacity(page.len());

        for message in page {
            if self.preserve_reacted && message.reacted {
                debug!("keeping reacted message {channel_id}/{}", message.ts);
                continue;
            }
            if message.reply_count > 0 {
                let thread_ts = message.ts.as_str();
                let replies = self
                    .retry
                    .run("conversations.replies", budget, move || {
                        api.replies(channel_id, thread_ts)
                    })
                    .await?;
                tally.errors += u64::from(replies.failures);
                work.extend(
                    replies
                        .value
                        .into_iter()
                        .filter(|reply| reply.ts != message.ts),
                );
            }
            work.push(message);
        }

        Ok(work)
    }
}
