use futures_util::stream::{self, StreamExt};

use crate::slack::{ApiError, Message, SlackApi};

/// Upper bound on concurrently in-flight chat.delete calls. Above this the
/// workspace rate limits kick in and transient failures spike.
pub const MAX_IN_FLIGHT: usize = 20;

/// Per-message result of one deletion round. Failures are uniformly
/// transient; the API does not distinguish further.
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    /// Already absent on the remote; nothing to do, nothing to count.
    Gone,
    Failed(ApiError),
}

/// Issue one chat.delete per message, at most `MAX_IN_FLIGHT` at a time.
/// Every message resolves on its own: a failure neither blocks nor aborts
/// its siblings. Retrying is the caller's decision, not the pool's.
pub async fn delete_batch(
    api: &dyn SlackApi,
    channel_id: &str,
    batch: Vec<Message>,
) -> Vec<(Message, DeleteOutcome)> {
    stream::iter(batch)
        .map(move |message| async move {
            let outcome = match api.delete_message(channel_id, &message.ts).await {
                Ok(()) => DeleteOutcome::Deleted,
                Err(err) if err.is_message_gone() => DeleteOutcome::Gone,
                Err(err) => DeleteOutcome::Failed(err),
            };
            (message, outcome)
        })
        .buffer_unordered(MAX_IN_FLIGHT)
        .collect()
        .await
}
