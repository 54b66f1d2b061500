use super::{ApiError, Channel, Message, SlackApi, SlackFile};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// How much of an unexpected response body to keep in error messages.
const ERROR_BODY_MAX: usize = 200;

/// conversations.list page size; the channel walk follows `next_cursor`.
const CHANNEL_PAGE_SIZE: u32 = 200;

/// Token-scoped Slack Web API client. Does no retrying of its own; failures
/// are classified and handed back to the caller.
pub struct WebApi {
    token: String,
    api_base: String,
    http: reqwest::Client,
}

impl WebApi {
    pub fn new(token: String, http: reqwest::Client) -> Self {
        Self::with_base(token, http, DEFAULT_API_BASE)
    }

    /// Point the client at a non-default API base (tests).
    pub fn with_base(token: String, http: reqwest::Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            token,
            api_base,
            http,
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn get(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let resp = self
            .http
            .get(self.url(method))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let resp = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Slack returns 200 for most app-level errors; check the JSON `ok` field.
    async fn decode(resp: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited {
                retry_after: parse_retry_after(&headers),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                body: truncated(&body),
            });
        }

        let payload: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        if payload.get("ok") == Some(&serde_json::Value::Bool(false)) {
            let code = payload
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            if code == "ratelimited" {
                return Err(ApiError::RateLimited {
                    retry_after: parse_retry_after(&headers),
                });
            }
            return Err(ApiError::Api(code.to_string()));
        }
        Ok(payload)
    }
}

fn truncated(body: &str) -> String {
    if body.len() <= ERROR_BODY_MAX {
        body.to_string()
    } else {
        body.chars().take(ERROR_BODY_MAX).collect()
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    parse_retry_after_value(value)
}

fn parse_retry_after_value(value: &str) -> Option<Duration> {
    if value.is_empty() {
        return None;
    }
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    // Slack occasionally sends fractional seconds; keep the whole part.
    let whole = value
        .split_once('.')
        .map(|(whole, _)| whole)
        .unwrap_or(value);
    whole.parse::<u64>().ok().map(Duration::from_secs)
}

fn message_from_value(msg: &serde_json::Value) -> Option<Message> {
    let ts = msg.get("ts").and_then(|t| t.as_str())?;
    let reply_count = msg.get("reply_count").and_then(|c| c.as_u64()).unwrap_or(0);
    let reacted = msg
        .get("reactions")
        .and_then(|r| r.as_array())
        .is_some_and(|r| !r.is_empty());
    Some(Message {
        ts: ts.to_string(),
        reply_count,
        reacted,
    })
}

fn messages_from_payload(payload: &serde_json::Value) -> Vec<Message> {
    payload
        .get("messages")
        .and_then(|m| m.as_array())
        .into_iter()
        .flatten()
        .filter_map(message_from_value)
        .collect()
}

fn channels_from_payload(payload: &serde_json::Value) -> Vec<Channel> {
    payload
        .get("channels")
        .and_then(|c| c.as_array())
        .into_iter()
        .flatten()
        .filter_map(|channel| {
            let id = channel.get("id").and_then(|id| id.as_str())?;
            let is_archived = channel
                .get("is_archived")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let is_member = channel
                .get("is_member")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            if is_archived || !is_member {
                return None;
            }
            let name = channel
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or_default();
            Some(Channel {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

fn next_cursor(payload: &serde_json::Value) -> Option<String> {
    payload
        .get("response_metadata")
        .and_then(|rm| rm.get("next_cursor"))
        .and_then(|c| c.as_str())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToOwned::to_owned)
}

#[async_trait]
impl SlackApi for WebApi {
    async fn list_channels(&self) -> Result<Vec<Channel>, ApiError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("exclude_archived", "true".to_string()),
                ("limit", CHANNEL_PAGE_SIZE.to_string()),
                ("types", "public_channel,private_channel".to_string()),
            ];
            if let Some(ref next) = cursor {
                query.push(("cursor", next.clone()));
            }

            let payload = self.get("conversations.list", &query).await?;
            channels.extend(channels_from_payload(&payload));

            cursor = next_cursor(&payload);
            if cursor.is_none() {
                break;
            }
        }

        channels.sort_by(|a, b| a.id.cmp(&b.id));
        channels.dedup_by(|a, b| a.id == b.id);
        Ok(channels)
    }

    async fn history(
        &self,
        channel_id: &str,
        latest: &str,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError> {
        let query = vec![
            ("channel", channel_id.to_string()),
            ("latest", latest.to_string()),
            ("limit", limit.to_string()),
        ];
        let payload = self.get("conversations.history", &query).await?;
        Ok(messages_from_payload(&payload))
    }

    async fn replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>, ApiError> {
        let query = vec![
            ("channel", channel_id.to_string()),
            ("ts", thread_ts.to_string()),
        ];
        let payload = self.get("conversations.replies", &query).await?;
        Ok(messages_from_payload(&payload))
    }

    async fn delete_message(&self, channel_id: &str, ts: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "channel": channel_id, "ts": ts });
        self.post("chat.delete", &body).await.map(|_| ())
    }

    async fn list_files(&self, ts_to: i64) -> Result<Vec<SlackFile>, ApiError> {
        let query = vec![("ts_to", ts_to.to_string()), ("count", "200".to_string())];
        let payload = self.get("files.list", &query).await?;
        Ok(payload
            .get("files")
            .and_then(|f| f.as_array())
            .into_iter()
            .flatten()
            .filter_map(|file| {
                let id = file.get("id").and_then(|id| id.as_str())?;
                let created = file.get("created").and_then(|c| c.as_i64()).unwrap_or(0);
                Some(SlackFile {
                    id: id.to_string(),
                    created,
                })
            })
            .collect())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "file": file_id });
        self.post("files.delete", &body).await.map(|_| ())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
        broadcast: bool,
    ) -> Result<String, ApiError> {
        let mut body = serde_json::json!({ "channel": channel_id, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = serde_json::json!(ts);
            if broadcast {
                body["reply_broadcast"] = serde_json::json!(true);
            }
        }
        let payload = self.post("chat.postMessage", &body).await?;
        Ok(payload
            .get("ts")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string())
    }
}
