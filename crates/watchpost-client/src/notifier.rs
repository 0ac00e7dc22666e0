use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use watchpost_core::error::AppError;
use watchpost_core::traits::Notifier;

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const EMBED_COLOR: u32 = 0x00FF00;
const EMBED_FOOTER: &str = "Watchpost";
/// Discord rejects embed descriptions longer than this many characters.
const MAX_DESCRIPTION_CHARS: usize = 4096;

/// Credentials for posting to a Discord channel as a bot.
#[derive(Debug, Clone, Default)]
pub struct DiscordConfig {
    pub bot_token: Option<String>,
    pub channel_id: Option<u64>,
}

impl DiscordConfig {
    /// Build from raw configuration values; blank values count as unset.
    pub fn new(bot_token: Option<String>, channel_id: Option<&str>) -> Result<Self, AppError> {
        let bot_token = bot_token.filter(|t| !t.trim().is_empty());
        let channel_id = match channel_id.map(str::trim).filter(|c| !c.is_empty()) {
            None => None,
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                AppError::Config(format!(
                    "Invalid DISCORD_CHANNEL_ID '{raw}': must be a numeric channel id"
                ))
            })?),
        };
        Ok(Self {
            bot_token,
            channel_id,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.channel_id.is_some()
    }
}

/// Notifier posting embeds to a Discord channel through the REST API.
///
/// Every notification is logged. When credentials are missing the message is
/// only logged and `send` returns `false`.
#[derive(Clone)]
pub struct DiscordNotifier {
    config: DiscordConfig,
    api_base: String,
    timeout: Duration,
    client: Arc<Mutex<Option<Client>>>,
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: Arc::new(Mutex::new(None)),
        }
    }

    /// Point the notifier at another API root (used by tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn client(&self) -> Result<Client, AppError> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::Client(e.to_string()))?;
        tracing::info!("Discord client initialized");
        *slot = Some(client.clone());
        Ok(client)
    }

    async fn post_embed(
        &self,
        bot_token: &str,
        channel_id: u64,
        message: &str,
        title: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let request = CreateMessage::embed(title, message);

        let response = self
            .client()
            .await?
            .post(&url)
            .header("Authorization", format!("Bot {bot_token}"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(self.timeout)
                } else {
                    AppError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::error!("Discord rejected the bot token. Check DISCORD_BOT_TOKEN.");
            }
            StatusCode::FORBIDDEN => {
                tracing::error!(
                    channel_id,
                    "Bot doesn't have permission to send messages to the specified channel."
                );
            }
            StatusCode::NOT_FOUND => {
                tracing::error!(channel_id, "Discord channel not found.");
            }
            _ => {}
        }
        tracing::debug!(status = status.as_u16(), %detail, "Discord API error");

        Err(AppError::HttpStatus {
            status: status.as_u16(),
            url,
        })
    }
}

impl Notifier for DiscordNotifier {
    async fn send(&self, message: &str, title: &str) -> bool {
        tracing::info!("NOTIFICATION: {title} - {message}");

        let (Some(bot_token), Some(channel_id)) =
            (self.config.bot_token.as_deref(), self.config.channel_id)
        else {
            tracing::warn!("Discord not configured. Set DISCORD_BOT_TOKEN and DISCORD_CHANNEL_ID.");
            return false;
        };

        match self.post_embed(bot_token, channel_id, message, title).await {
            Ok(()) => {
                tracing::info!(channel_id, "Discord message sent successfully");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send Discord message");
                false
            }
        }
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            tracing::info!("Discord client connection closed");
        }
    }
}

// ---- Discord API types ----

#[derive(Debug, Serialize)]
struct CreateMessage {
    embeds: Vec<Embed>,
}

impl CreateMessage {
    fn embed(title: &str, description: &str) -> Self {
        Self {
            embeds: vec![Embed {
                title: title.to_string(),
                description: truncate_chars(description, MAX_DESCRIPTION_CHARS),
                color: EMBED_COLOR,
                timestamp: Utc::now().to_rfc3339(),
                footer: EmbedFooter {
                    text: EMBED_FOOTER.to_string(),
                },
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
    footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
