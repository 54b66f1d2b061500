use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Retention horizon: messages strictly older than `now - window` are fair
/// game, everything else survives.
#[derive(Debug, Clone, Copy)]
pub struct Horizon {
    window: Duration,
}

impl Horizon {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Strict inequality: a timestamp exactly on the boundary is kept, so a
    /// borderline-fresh message can't be raced into deletion by clock skew
    /// between pagination calls.
    pub fn is_expired(&self, now_secs: f64, ts_secs: f64) -> bool {
        ts_secs < self.cutoff_secs(now_secs)
    }

    /// The cutoff as fractional epoch seconds.
    pub fn cutoff_secs(&self, now_secs: f64) -> f64 {
        now_secs - self.window.as_secs_f64()
    }

    /// The cutoff rendered as a Slack timestamp (`seconds.micros`) for the
    /// server-side `latest` bound. Slack treats `latest` as exclusive, which
    /// matches the strict boundary here.
    pub fn cutoff_ts(&self, now_secs: f64) -> String {
        let cutoff = self.cutoff_secs(now_secs).max(0.0);
        let secs = cutoff.trunc() as u64;
        let micros = (((cutoff - cutoff.trunc()) * 1_000_000.0).round() as u64).min(999_999);
        format!("{secs}.{micros:06}")
    }
}

/// Wall clock as fractional epoch seconds, the unit Slack timestamps use.
pub fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
