use std::time::Duration;

use crate::errors::ConfigError;
use crate::slack::ChatFormat;

const DEFAULT_MODEL_ID: &str = "anthropic.claude-v2";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_POLL_ATTEMPTS: u32 = 8;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_LINK_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration, read once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    /// SNS topic notifications are published to (the one this function listens on).
    pub topic_arn: String,
    /// Bedrock model asked for advice.
    pub model_id: String,
    /// Chat webhook; chat delivery is disabled when unset.
    pub slack_webhook_url: Option<String>,
    pub chat_format: ChatFormat,
    /// Region used in console links.
    pub region: String,
    /// How many times the diagnostic command is polled.
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub link_check_timeout: Duration,
    /// Dispatch a deferred reboot once notifications are out.
    pub execute_deferred_reboot: bool,
}

impl Config {
    /// Load configuration from the process environment. `sdk_region` is the
    /// region resolved by the AWS SDK, used when `AWS_REGION` is unset.
    pub fn from_env(sdk_region: Option<&str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), sdk_region)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        sdk_region: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let topic_arn = non_empty("SNS_TOPIC_ARN").ok_or(ConfigError::Missing("SNS_TOPIC_ARN"))?;

        let chat_format = match non_empty("CHAT_FORMAT") {
            Some(v) => v.parse::<ChatFormat>().map_err(|reason| ConfigError::Invalid {
                var: "CHAT_FORMAT",
                value: v.clone(),
                reason,
            })?,
            None => ChatFormat::default(),
        };

        let poll_attempts = match non_empty("SSM_POLL_ATTEMPTS") {
            Some(v) => v.trim().parse::<u32>().map_err(|e| {
                ConfigError::Invalid {
                    var: "SSM_POLL_ATTEMPTS",
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => DEFAULT_POLL_ATTEMPTS,
        };

        let execute_deferred_reboot = match non_empty("EXECUTE_DEFERRED_REBOOT") {
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Invalid {
                var: "EXECUTE_DEFERRED_REBOOT",
                value: v.clone(),
                reason: "expected true or false".to_string(),
            })?,
            None => true,
        };

        Ok(Self {
            topic_arn,
            model_id: non_empty("MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            slack_webhook_url: non_empty("SLACK_WEBHOOK_URL"),
            chat_format,
            region: non_empty("AWS_REGION")
                .or_else(|| sdk_region.map(str::to_string))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            poll_attempts,
            poll_interval: duration_var(
                "SSM_POLL_INTERVAL",
                non_empty("SSM_POLL_INTERVAL"),
                DEFAULT_POLL_INTERVAL,
            )?,
            link_check_timeout: duration_var(
                "LINK_CHECK_TIMEOUT",
                non_empty("LINK_CHECK_TIMEOUT"),
                DEFAULT_LINK_CHECK_TIMEOUT,
            )?,
            execute_deferred_reboot,
        })
    }
}

/// Parse a duration such as "2s" or "500ms"; a bare integer is seconds.
fn duration_var(
    var: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let value = value.trim();

    if let Ok(d) = humantime::parse_duration(value) {
        return Ok(d);
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    Err(ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: "expected a duration like 2s or 500ms".to_string(),
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
