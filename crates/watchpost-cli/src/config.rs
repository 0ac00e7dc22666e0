use std::str::FromStr;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use watchpost_client::DiscordConfig;
use watchpost_core::{AppError, MonitorConfig, PollRule, RequestPolicy, SearchMode};

/// Command-line flags, each backed by an environment variable.
#[derive(Parser, Debug)]
#[command(
    name = "watchpost",
    version,
    about = "Watch a web page or JSON endpoint and notify Discord when a value appears"
)]
pub struct Settings {
    /// URL to poll (http or https)
    #[arg(long = "url", env = "TARGET_URL")]
    pub target_url: String,

    /// How to search the fetched content: html/text or json/structured
    #[arg(long, env = "SEARCH_TYPE", default_value = "json")]
    pub search_type: String,

    /// Value to look for
    #[arg(long = "target", env = "TARGET_MATCH")]
    pub target_match: String,

    /// JSONPath expression selecting the values to compare (json mode)
    #[arg(long = "path", env = "TARGET_LOCATION")]
    pub target_location: Option<String>,

    /// Notify when the value is absent instead of present
    #[arg(
        long,
        env = "NEGATIVE",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub negative: bool,

    /// Compare text with exact casing
    #[arg(
        long,
        env = "CASE_SENSITIVE",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub case_sensitive: bool,

    /// Seconds between checks
    #[arg(long = "interval", env = "CHECK_INTERVAL", default_value_t = 900)]
    pub check_interval: u64,

    /// Seconds allowed for a single HTTP attempt
    #[arg(long = "timeout", env = "REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Seconds to wait before every HTTP attempt
    #[arg(long = "delay", env = "REQUEST_DELAY", default_value_t = 1.0)]
    pub request_delay: f64,

    /// Attempts per fetch, the first one included
    #[arg(long, env = "MAX_RETRIES", default_value_t = 5)]
    pub max_retries: u32,

    /// Send a notification with the configuration when monitoring starts
    #[arg(
        long,
        env = "NOTIFY_ON_START",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "true",
        default_missing_value = "true"
    )]
    pub notify_on_start: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(skip = std::env::var("DISCORD_BOT_TOKEN").ok())]
    pub discord_bot_token: Option<String>,

    #[arg(skip = std::env::var("DISCORD_CHANNEL_ID").ok())]
    pub discord_channel_id: Option<String>,
}

/// Everything the binary needs after validation.
#[derive(Debug)]
pub struct RuntimeConfig {
    pub monitor: MonitorConfig,
    pub discord: DiscordConfig,
}

impl Settings {
    /// Validate the raw settings into a monitor and Discord configuration.
    pub fn into_config(self) -> Result<RuntimeConfig, AppError> {
        let mode = SearchMode::from_str(&self.search_type)?;
        if self.target_match.is_empty() {
            return Err(AppError::Config("TARGET_MATCH must not be empty".into()));
        }
        let rule = PollRule::from_parts(mode, self.target_match, self.target_location.as_deref())?
            .negated(self.negative)
            .with_case_sensitive(self.case_sensitive);

        let inter_request_delay = Duration::try_from_secs_f64(self.request_delay).map_err(|e| {
            AppError::Config(format!(
                "REQUEST_DELAY must be a non-negative number of seconds, got {}: {e}",
                self.request_delay
            ))
        })?;
        let policy = RequestPolicy {
            timeout: Duration::from_secs(self.request_timeout),
            inter_request_delay,
            max_retries: self.max_retries,
            ..RequestPolicy::default()
        };

        let monitor = MonitorConfig::new(&self.target_url, rule)?
            .with_policy(policy)?
            .with_check_interval(Duration::from_secs(self.check_interval))?
            .with_notify_on_start(self.notify_on_start);

        let discord = DiscordConfig::new(
            self.discord_bot_token,
            self.discord_channel_id.as_deref(),
        )?;

        Ok(RuntimeConfig { monitor, discord })
    }
}

/// Default filter directives for our crates at the given level.
///
/// Also accepts the `WARNING`, `CRITICAL` and `FATAL` level names found in
/// existing `.env` files.
pub fn log_directives(level: &str) -> Result<String, AppError> {
    let name = match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    };
    let level = tracing::Level::from_str(&name)
        .map_err(|_| AppError::Config(format!("Invalid LOG_LEVEL '{level}'")))?;
    let level = level.as_str().to_ascii_lowercase();
    Ok(["watchpost", "watchpost_core", "watchpost_client"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(","))
}
