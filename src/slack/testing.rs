use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ApiError, Channel, Message, SlackApi, SlackFile};

/// What a notification post looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_id: String,
    pub text: String,
    pub thread_ts: Option<String>,
    pub broadcast: bool,
}

/// Scripted in-memory workspace. Deleting a message really removes it, so a
/// re-issued history query shrinks the way the live API's would.
#[derive(Default)]
pub struct FakeSlack {
    channels: Vec<Channel>,
    state: Mutex<State>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    history_calls: AtomicUsize,
    /// Yield this many times inside delete_message to widen the window in
    /// which sibling deletes can be observed in flight.
    delete_spin: usize,
}

#[derive(Default)]
struct State {
    /// channel id -> top-level messages, any order.
    messages: HashMap<String, Vec<Message>>,
    /// (channel id, thread ts) -> thread listing, parent first like the API.
    threads: HashMap<(String, String), Vec<Message>>,
    /// ts -> number of times delete should fail before succeeding.
    delete_failures: HashMap<String, u32>,
    history_failures: u32,
    files: Vec<SlackFile>,
    file_failures: HashMap<String, u32>,
    deleted: Vec<String>,
    deleted_files: Vec<String>,
    posts: Vec<PostedMessage>,
}

impl FakeSlack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, id: &str, name: &str) -> Self {
        self.channels.push(Channel {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_delete_spin(mut self, spin: usize) -> Self {
        self.delete_spin = spin;
        self
    }

    pub fn message(ts: &str) -> Message {
        Message {
            ts: ts.to_string(),
            reply_count: 0,
            reacted: false,
        }
    }

    pub fn seed_message(&self, channel_id: &str, message: Message) {
        self.state
            .lock()
            .unwrap()
            .messages
            .entry(channel_id.to_string())
            .or_default()
            .push(message);
    }

    /// Script a thread listing; the parent is prepended, as the API does.
    pub fn seed_thread(&self, channel_id: &str, parent_ts: &str, replies: Vec<Message>) {
        let mut thread = vec![Self::message(parent_ts)];
        thread.extend(replies);
        self.state
            .lock()
            .unwrap()
            .threads
            .insert((channel_id.to_string(), parent_ts.to_string()), thread);
    }

    pub fn fail_delete(&self, ts: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .delete_failures
            .insert(ts.to_string(), times);
    }

    pub fn fail_history(&self, times: u32) {
        self.state.lock().unwrap().history_failures = times;
    }

    pub fn seed_file(&self, id: &str, created: i64) {
        self.state.lock().unwrap().files.push(SlackFile {
            id: id.to_string(),
            created,
        });
    }

    pub fn fail_file_delete(&self, id: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .file_failures
            .insert(id.to_string(), times);
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn deleted_files(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_files.clone()
    }

    pub fn posts(&self) -> Vec<PostedMessage> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn remaining(&self, channel_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(channel_id)
            .map(|messages| messages.iter().map(|m| m.ts.clone()).collect())
            .unwrap_or_default()
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn ts_secs(ts: &str) -> f64 {
        ts.parse().unwrap_or(0.0)
    }

    fn try_delete(&self, channel_id: &str, ts: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.delete_failures.get_mut(ts) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::Api("internal_error".to_string()));
            }
        }

        let mut found = false;
        if let Some(messages) = state.messages.get_mut(channel_id) {
            let before = messages.len();
            messages.retain(|m| m.ts != ts);
            found |= messages.len() != before;
        }
        for ((thread_channel, _), thread) in state.threads.iter_mut() {
            if thread_channel != channel_id {
                continue;
            }
            let before = thread.len();
            thread.retain(|m| m.ts != ts);
            found |= thread.len() != before;
        }

        if found {
            state.deleted.push(ts.to_string());
            Ok(())
        } else {
            Err(ApiError::Api("message_not_found".to_string()))
        }
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn list_channels(&self) -> Result<Vec<Channel>, ApiError> {
        Ok(self.channels.clone())
    }

    async fn history(
        &self,
        channel_id: &str,
        latest: &str,
        limit: u32,
    ) -> Result<Vec<Message>, ApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.history_failures > 0 {
            state.history_failures -= 1;
            return Err(ApiError::Api("internal_error".to_string()));
        }

        let bound = Self::ts_secs(latest);
        let mut page: Vec<Message> = state
            .messages
            .get(channel_id)
            .into_iter()
            .flatten()
            .filter(|m| Self::ts_secs(&m.ts) < bound)
            .cloned()
            .collect();
        page.sort_by(|a, b| Self::ts_secs(&b.ts).total_cmp(&Self::ts_secs(&a.ts)));
        page.truncate(limit as usize);
        Ok(page)
    }

    async fn replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .threads
            .get(&(channel_id.to_string(), thread_ts.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_message(&self, channel_id: &str, ts: &str) -> Result<(), ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        for _ in 0..self.delete_spin {
            tokio::task::yield_now().await;
        }
        let result = self.try_delete(channel_id, ts);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_files(&self, ts_to: i64) -> Result<Vec<SlackFile>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .iter()
            .filter(|f| f.created <= ts_to)
            .cloned()
            .collect())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.file_failures.get_mut(file_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::Api("internal_error".to_string()));
            }
        }
        let before = state.files.len();
        state.files.retain(|f| f.id != file_id);
        if state.files.len() == before {
            return Err(ApiError::Api("file_not_found".to_string()));
        }
        state.deleted_files.push(file_id.to_string());
        Ok(())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
        broadcast: bool,
    ) -> Result<String, ApiError> {
        let mut state = self.state.lock().unwrap();
        let ts = format!("1726000000.{:06}", state.posts.len());
        state.posts.push(PostedMessage {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(ToOwned::to_owned),
            broadcast,
        });
        Ok(ts)
    }
}
