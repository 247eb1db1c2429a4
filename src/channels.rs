//! Notification transports for Argus
//!
//! Each configured transport receives every finished message independently.
//! A failed send is logged and never retried; replaying a past transition
//! would be worse than a missed message.

use crate::config::NotifyConfig;
use crate::error::Result;
use crate::logging::get_logger;
use crate::notify::NotificationRequest;
use async_trait::async_trait;

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// A single notification transport
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Transport name for log lines
    fn name(&self) -> &'static str;

    /// Deliver one message
    async fn send(&self, text: &str) -> Result<()>;
}

/// Discord webhook transport
pub struct DiscordChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(webhook_url: String, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl NotifyChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// ntfy topic transport
pub struct NtfyChannel {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl NtfyChannel {
    pub fn new(
        server: &str,
        topic: &str,
        token: String,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: format!("{}/{}", server.trim_end_matches('/'), topic),
            token,
            client,
        })
    }
}

#[async_trait]
impl NotifyChannel for NtfyChannel {
    fn name(&self) -> &'static str {
        "ntfy"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let mut request = self.client.post(&self.url).body(text.to_string());
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request.send().await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Pushover transport
pub struct PushoverChannel {
    token: String,
    user: String,
    client: reqwest::Client,
}

impl PushoverChannel {
    pub fn new(token: String, user: String, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            token,
            user,
            client,
        })
    }
}

#[async_trait]
impl NotifyChannel for PushoverChannel {
    fn name(&self) -> &'static str {
        "pushover"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(PUSHOVER_API_URL)
            .form(&[
                ("token", self.token.as_str()),
                ("user", self.user.as_str()),
                ("message", text),
            ])
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Fan-out over all configured transports
pub struct Dispatcher {
    channels: Vec<Box<dyn NotifyChannel>>,
    logger: crate::logging::StructuredLogger,
}

impl Dispatcher {
    /// Build the dispatcher from configuration. Unconfigured transports are
    /// skipped silently.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let timeout = std::time::Duration::from_secs(config.timeout_secs);
        let mut channels: Vec<Box<dyn NotifyChannel>> = Vec::new();

        if !config.discord_webhook_url.is_empty() {
            channels.push(Box::new(DiscordChannel::new(
                config.discord_webhook_url.clone(),
                timeout,
            )?));
        }
        if !config.ntfy.topic.is_empty() {
            channels.push(Box::new(NtfyChannel::new(
                &config.ntfy.server,
                &config.ntfy.topic,
                config.ntfy.token.clone(),
                timeout,
            )?));
        }
        if !config.pushover.token.is_empty() && !config.pushover.user.is_empty() {
            channels.push(Box::new(PushoverChannel::new(
                config.pushover.token.clone(),
                config.pushover.user.clone(),
                timeout,
            )?));
        }

        Ok(Self::new(channels))
    }

    /// Build a dispatcher over explicit channels
    pub fn new(channels: Vec<Box<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            logger: get_logger("channels"),
        }
    }

    /// Number of active transports
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send every request to every transport. A transport failure is logged
    /// and does not block the other transports or the invocation.
    pub async fn dispatch(&self, requests: &[NotificationRequest]) {
        for request in requests {
            for channel in &self.channels {
                match channel.send(&request.text).await {
                    Ok(()) => self
                        .logger
                        .info(&format!("Sent {} notification: {}", channel.name(), request.text)),
                    Err(e) => self.logger.error(&format!(
                        "{} dispatch failed, not retrying: {}",
                        channel.name(),
                        e
                    )),
                }
            }
        }
    }
}
