/// Errors from the chat webhook.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// HTTP transport error.
    #[error("webhook HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Webhook answered with something other than 200.
    #[error("webhook returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Errors reading configuration at cold start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors that make an inbound event unprocessable.
///
/// These are the only conditions answered with a non-success status.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The Lambda payload is not an SNS event.
    #[error("malformed SNS envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    /// The SNS event carries no records.
    #[error("SNS event contains no records")]
    NoRecords,
    /// The message body is JSON but not a CloudWatch alarm.
    #[error("malformed alarm payload: {0}")]
    MalformedAlarm(#[source] serde_json::Error),
}
