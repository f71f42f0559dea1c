use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use remediation_core::{ChatNotifier, CoreError, NotificationPayload};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::errors::ChatError;

/// Slack rejects section text longer than this.
const SECTION_TEXT_LIMIT: usize = 3000;

/// Slack rejects header text longer than this.
const HEADER_TEXT_LIMIT: usize = 150;

/// Shape of the chat-webhook payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatFormat {
    /// Flat object with the nine notification fields (workflow webhooks).
    #[default]
    Fields,
    /// Block Kit message (incoming webhooks).
    Blocks,
}

impl FromStr for ChatFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fields" => Ok(Self::Fields),
            "blocks" => Ok(Self::Blocks),
            other => Err(format!("unknown chat format {other:?}, expected fields or blocks")),
        }
    }
}

/// Build the webhook body for `payload` in the configured format.
pub fn build_payload(format: ChatFormat, payload: &NotificationPayload, sent_at: DateTime<Utc>) -> Value {
    match format {
        ChatFormat::Fields => json!(payload),
        ChatFormat::Blocks => build_blocks(payload, sent_at),
    }
}

/// Escape text for Slack mrkdwn: `&`, `<` and `>` are control characters.
pub fn escape_mrkdwn(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(ch),
        }
    }
    result
}

/// Truncate to at most `limit` characters, marking the cut with an ellipsis.
fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('\u{2026}');
    clipped
}

fn mrkdwn_section(text: String) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": clip(&text, SECTION_TEXT_LIMIT) }
    })
}

fn code_block(text: &str) -> String {
    format!("```{}```", escape_mrkdwn(text))
}

fn build_blocks(p: &NotificationPayload, sent_at: DateTime<Utc>) -> Value {
    let metrics_link = if p.metrics_url.starts_with("http") {
        format!("<{}|{} Metrics Console>", p.metrics_url, p.metrics_type)
    } else {
        escape_mrkdwn(&p.metrics_url)
    };

    json!({
        "text": format!("EC2 alarm {} fired at {}", p.alarm_name, p.timestamp),
        "blocks": [
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": clip(&format!("\u{1f6a8} {}", p.alarm_name), HEADER_TEXT_LIMIT),
                    "emoji": true
                }
            },
            {
                "type": "section",
                "fields": [
                    { "type": "mrkdwn", "text": format!("*Time:*\n{}", escape_mrkdwn(&p.timestamp)) },
                    { "type": "mrkdwn", "text": format!("*Metric:*\n{}", p.metrics_type) }
                ]
            },
            mrkdwn_section(format!("*Resource Details:*\n{}", code_block(&p.resource_details))),
            mrkdwn_section(format!("*{} Metrics:*\n{metrics_link}", p.metrics_type)),
            mrkdwn_section(format!(
                "*Top 5 {} Processes:*\n{}",
                p.processes_type,
                code_block(&p.top_processes)
            )),
            { "type": "divider" },
            mrkdwn_section(format!("*General Remediation Advice:*\n{}", escape_mrkdwn(&p.advice))),
            mrkdwn_section(format!("*Actions Taken by AI:*\n{}", escape_mrkdwn(&p.actions_taken))),
            {
                "type": "context",
                "elements": [
                    {
                        "type": "mrkdwn",
                        "text": format!("Sent at {}", sent_at.format("%Y-%m-%d %H:%M:%S UTC"))
                    }
                ]
            }
        ]
    })
}

/// Chat webhook client.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    webhook_url: String,
    retry_delays: Vec<Duration>,
}

impl SlackClient {
    /// Create a client that retries twice, after 1s and 2s.
    pub fn new(webhook_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
            retry_delays: vec![Duration::from_secs(1), Duration::from_secs(2)],
        }
    }

    /// Replace the delays between attempts; one retry per entry.
    #[cfg(test)]
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    async fn post_once(&self, payload: &Value) -> Result<(), ChatError> {
        let resp = self.http.post(&self.webhook_url).json(payload).send().await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(ChatError::Status(status));
        }

        Ok(())
    }

    /// Post with retry and exponential backoff.
    pub async fn post_with_retry(&self, payload: &Value) -> Result<(), ChatError> {
        let mut last_err = None;

        for (attempt, delay) in std::iter::once(&Duration::ZERO)
            .chain(self.retry_delays.iter())
            .enumerate()
        {
            if attempt > 0 {
                warn!(attempt, "webhook post failed, retrying after {delay:?}");
                tokio::time::sleep(*delay).await;
            }

            match self.post_once(payload).await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(attempt, "webhook post succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) => {
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatNotifier for SlackClient {
    async fn post(&self, payload: &Value) -> Result<(), CoreError> {
        self.post_with_retry(payload)
            .await
            .map_err(|e| CoreError::Chat(Box::new(e)))
    }
}
