//! Recording doubles for the collaborator traits.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use remediation_core::{
    ChatNotifier, CommandInvocation, CommandRunner, CoreError, GenerationRequest,
    InstanceDirectory, InstanceInfo, LinkChecker, OutboundMessage, TextGenerator, TopicPublisher,
};

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeInstances {
    instances: Vec<InstanceInfo>,
    lookups: Mutex<usize>,
}

impl FakeInstances {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(info: InstanceInfo) -> Self {
        Self {
            instances: vec![info],
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl InstanceDirectory for FakeInstances {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceInfo, CoreError> {
        *self.lookups.lock().unwrap() += 1;
        self.instances
            .iter()
            .find(|i| i.instance_id == instance_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("instance {instance_id}")))
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub instance_id: String,
    pub commands: Vec<String>,
    pub timeout_secs: i32,
}

#[derive(Default)]
pub struct FakeCommands {
    sent: Mutex<Vec<SentCommand>>,
    invocations: Mutex<VecDeque<Result<Option<CommandInvocation>, CoreError>>>,
    polls: Mutex<usize>,
    /// Sends whose commands contain the pattern fail with the message; an
    /// empty pattern fails every send.
    fail_send: Option<(String, String)>,
}

impl FakeCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripted poll results, consumed in order; `Ok(None)` once exhausted.
    pub fn with_invocations(
        self,
        invocations: Vec<Result<Option<CommandInvocation>, CoreError>>,
    ) -> Self {
        *self.invocations.lock().unwrap() = invocations.into();
        self
    }

    pub fn failing_send(self, message: &str) -> Self {
        self.failing_send_for("", message)
    }

    pub fn failing_send_for(mut self, pattern: &str, message: &str) -> Self {
        self.fail_send = Some((pattern.to_string(), message.to_string()));
        self
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl CommandRunner for FakeCommands {
    async fn send_command(
        &self,
        instance_id: &str,
        commands: &[String],
        timeout_secs: i32,
    ) -> Result<String, CoreError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentCommand {
            instance_id: instance_id.to_string(),
            commands: commands.to_vec(),
            timeout_secs,
        });

        if let Some((pattern, message)) = &self.fail_send {
            if commands.iter().any(|c| c.contains(pattern.as_str())) {
                return Err(CoreError::Ssm(message.clone()));
            }
        }

        Ok(format!("cmd-{}", sent.len()))
    }

    async fn command_invocation(
        &self,
        _command_id: &str,
        _instance_id: &str,
    ) -> Result<Option<CommandInvocation>, CoreError> {
        *self.polls.lock().unwrap() += 1;
        self.invocations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

pub struct FakeGenerator {
    reply: Mutex<Option<Result<String, CoreError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn replying(body: &str) -> Self {
        Self {
            reply: Mutex::new(Some(Ok(body.to_string()))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: CoreError) -> Self {
        Self {
            reply: Mutex::new(Some(Err(err))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(CoreError::Bedrock("no scripted reply".into())))
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakePublisher {
    published: Mutex<Vec<OutboundMessage>>,
    fail: bool,
}

impl FakePublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TopicPublisher for FakePublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<String, CoreError> {
        self.published.lock().unwrap().push(message.clone());
        if self.fail {
            return Err(CoreError::Sns("AuthorizationError".into()));
        }
        Ok("msg-1".to_string())
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Treats every link as reachable unless it contains "dead".
#[derive(Default)]
pub struct FakeLinks {
    checked: Mutex<Vec<String>>,
}

impl FakeLinks {
    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkChecker for FakeLinks {
    async fn is_reachable(&self, url: &str) -> bool {
        self.checked.lock().unwrap().push(url.to_string());
        !url.contains("dead")
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeChat {
    posted: Mutex<Vec<serde_json::Value>>,
    fail: bool,
}

impl FakeChat {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn posted(&self) -> Vec<serde_json::Value> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatNotifier for FakeChat {
    async fn post(&self, payload: &serde_json::Value) -> Result<(), CoreError> {
        self.posted.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(CoreError::Chat("webhook returned status 500".into()));
        }
        Ok(())
    }
}
