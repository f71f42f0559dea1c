use thiserror::Error;

/// Core errors for the remediation pipeline.
///
/// SDK failures are flattened to their display context so that callers can
/// surface them in notifications without holding on to SDK types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("EC2 error: {0}")]
    Ec2(String),

    #[error("SSM error: {0}")]
    Ssm(String),

    #[error("Bedrock error: {0}")]
    Bedrock(String),

    #[error("SNS error: {0}")]
    Sns(String),

    #[error("chat webhook error: {0}")]
    Chat(Box<dyn std::error::Error + Send + Sync>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
