//! Collaborator interfaces consumed by the handler.
//!
//! Production implementations wrap the AWS SDK clients and `reqwest`; tests
//! substitute in-memory doubles.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{CommandInvocation, InstanceInfo};

/// EC2 instance metadata lookup.
#[async_trait]
pub trait InstanceDirectory: Send + Sync {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceInfo, CoreError>;
}

/// Remote shell command execution on an instance.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Dispatch `commands` to the instance and return the command ID.
    async fn send_command(
        &self,
        instance_id: &str,
        commands: &[String],
        timeout_secs: i32,
    ) -> Result<String, CoreError>;

    /// Current state of a dispatched command, `None` while the service has
    /// not registered the invocation yet.
    async fn command_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<Option<CommandInvocation>, CoreError>;
}

/// Parameters of one text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Free-form text generation. Returns the raw response body, which may be
/// wrapped in a service-specific envelope.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError>;
}

/// A message bound for the persistent notification topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
    /// String-typed message attributes.
    pub attributes: BTreeMap<String, String>,
}

#[async_trait]
pub trait TopicPublisher: Send + Sync {
    /// Publish and return the service-assigned message ID.
    async fn publish(&self, message: &OutboundMessage) -> Result<String, CoreError>;
}

/// Existence check for documentation links.
#[async_trait]
pub trait LinkChecker: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Chat webhook delivery, including any retry policy.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn post(&self, payload: &serde_json::Value) -> Result<(), CoreError>;
}
