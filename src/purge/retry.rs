use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::PurgeError;
use crate::slack::ApiError;

/// Ceiling on transient failures tolerated across one whole run, shared by
/// every retry site: pagination, deletion, the file sweep. Rate limits and
/// network blips are expected and shouldn't end a multi-channel job, but an
/// endpoint that keeps failing must terminate the run rather than loop.
#[derive(Debug)]
pub struct ErrorBudget {
    limit: u32,
    used: u32,
}

impl ErrorBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Record one transient failure. Errors once the ceiling is crossed.
    pub fn charge(&mut self) -> Result<(), PurgeError> {
        self.used += 1;
        if self.used > self.limit {
            Err(PurgeError::BudgetExhausted {
                used: self.used,
                limit: self.limit,
            })
        } else {
            Ok(())
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}

/// Successful result of a retried operation, plus how many failure events it
/// took to get there.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    pub failures: u32,
}

/// Fixed-delay retry combinator. Attempts are not bounded locally; every
/// failure charges the run-level budget, and an exhausted budget ends the
/// run instead of the loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt; rate-limit responses know better than
    /// the fixed delay.
    pub async fn pause(&self, err: &ApiError) {
        tokio::time::sleep(err.retry_after().unwrap_or(self.delay)).await;
    }

    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        budget: &mut ErrorBudget,
        mut op: F,
    ) -> Result<Retried<T>, PurgeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut failures = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(Retried { value, failures }),
                Err(err) => {
                    failures += 1;
                    warn!("{what} failed (attempt {failures}): {err}");
                    budget.charge()?;
                    self.pause(&err).await;
                }
            }
        }
    }
}
