pub mod web;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use std::time::Duration;

/// A conversation visible to the purge credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

/// One history entry, reduced to what the purge needs. The channel id travels
/// alongside in call parameters rather than inside the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Slack message timestamp (`seconds.micros`); doubles as the message id.
    pub ts: String,
    /// Number of thread replies hanging off this message.
    pub reply_count: u64,
    /// Whether anyone reacted to this message.
    pub reacted: bool,
}

/// An uploaded file, from files.list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackFile {
    pub id: String,
    /// Upload time, epoch seconds.
    pub created: i64,
}

/// Remote-call failure, classified at the call site and nowhere else.
/// Everything here is treated as transient by the retry layer; the API does
/// not tell a permanent deletion error apart from a passing one.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// HTTP 429, or an `"ok": false` payload carrying `ratelimited`.
    #[error("rate limited (retry-after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Slack said `"ok": false`; the payload error code, verbatim.
    #[error("slack: {0}")]
    Api(String),

    #[error("unexpected status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl ApiError {
    /// Rate-limit responses carry a server-suggested wait.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// The message was already gone when we tried to delete it.
    pub fn is_message_gone(&self) -> bool {
        matches!(self, ApiError::Api(code) if code == "message_not_found")
    }

    /// The file was already gone when we tried to delete it.
    pub fn is_file_gone(&self) -> bool {
        matches!(self, ApiError::Api(code) if code == "file_not_found" || code == "file_deleted")
    }
}

/// The Slack Web API surface the purge depends on. One implementation talks
/// to slack.com; tests script their own workspace.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// conversations.list: every live channel visible to the credential.
    async fn list_channels(&self) -> Result<Vec<Channel>, ApiError>;

    /// conversations.history bounded by `latest` (exclusive), newest first,
    /// at most `limit` messages.
    async fn history(
        &self,
        channel_id: &str,
        latest: &str,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError>;

    /// conversations.replies: the thread rooted at `thread_ts`, parent
    /// included as the first entry.
    async fn replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>, ApiError>;

    /// chat.delete one message.
    async fn delete_message(&self, channel_id: &str, ts: &str) -> Result<(), ApiError>;

    /// files.list: files uploaded up to `ts_to` (epoch seconds, inclusive).
    async fn list_files(&self, ts_to: i64) -> Result<Vec<SlackFile>, ApiError>;

    /// files.delete one file.
    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError>;

    /// chat.postMessage; returns the posted message's `ts`. `broadcast` only
    /// has meaning together with `thread_ts`.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
        broadcast: bool,
    ) -> Result<String, ApiError>;
}
