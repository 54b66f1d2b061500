use clap::Parser;
use std::time::Duration;

pub const DEFAULT_RETENTION_DAYS: u64 = 3;
pub const DEFAULT_ERROR_BUDGET: u32 = 30;

/// Purge messages older than a retention window from every channel the
/// credential can see, then report the outcome in-channel.
#[derive(Debug, Parser)]
#[command(name = "slacksweep", version, about)]
pub struct Cli {
    /// Credential the purge runs as; needs history and chat:write scopes.
    #[arg(long, env = "SLACK_USER_TOKEN", hide_env_values = true)]
    pub user_token: String,

    /// Separate credential for the start/end notifications. Falls back to
    /// the purge credential.
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Channel that receives the start/end notifications.
    #[arg(long, env = "SLACK_CHANNEL_ID")]
    pub report_channel: String,

    /// Retention window in days.
    #[arg(long, env = "DAYS", default_value_t = DEFAULT_RETENTION_DAYS)]
    pub days: u64,

    /// Retention window in seconds; overrides --days when set.
    #[arg(long)]
    pub retention_secs: Option<u64>,

    /// Transient failures tolerated across the whole run before aborting.
    #[arg(long, default_value_t = DEFAULT_ERROR_BUDGET)]
    pub error_budget: u32,

    /// Keep messages that carry at least one reaction.
    #[arg(long)]
    pub preserve_reacted: bool,

    /// Also sweep uploaded files older than the window.
    #[arg(long)]
    pub purge_files: bool,

    /// Pushgateway base URL for end-of-run counters.
    #[arg(long, env = "PUSHGATEWAY_URL")]
    pub pushgateway_url: Option<String>,
}

impl Cli {
    /// The retention window at seconds granularity.
    pub fn retention_window(&self) -> Duration {
        match self.retention_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(self.days * 24 * 60 * 60),
        }
    }

    pub fn notify_token(&self) -> &str {
        self.bot_token.as_deref().unwrap_or(&self.user_token)
    }
}
