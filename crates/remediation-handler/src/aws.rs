//! AWS SDK implementations of the collaborator traits.

use async_trait::async_trait;
use aws_config::SdkConfig;
use remediation_core::{
    CommandInvocation, CommandRunner, CommandStatus, CoreError, GenerationRequest,
    InstanceDirectory, InstanceInfo, OutboundMessage, TextGenerator, TopicPublisher,
};
use serde_json::json;

/// SSM document that runs a list of shell commands.
const SHELL_DOCUMENT: &str = "AWS-RunShellScript";

/// EC2 `DescribeInstances` lookup.
pub struct Ec2Directory {
    client: aws_sdk_ec2::Client,
}

impl Ec2Directory {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(config),
        }
    }
}

#[async_trait]
impl InstanceDirectory for Ec2Directory {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceInfo, CoreError> {
        use aws_sdk_ec2::error::DisplayErrorContext;
        use aws_sdk_ec2::primitives::DateTimeFormat;

        let out = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| CoreError::Ec2(DisplayErrorContext(&e).to_string()))?;

        let inst = out
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .ok_or_else(|| CoreError::NotFound(format!("instance {instance_id}")))?;

        Ok(InstanceInfo {
            instance_id: instance_id.to_string(),
            name: inst
                .tags()
                .iter()
                .find(|t| t.key() == Some("Name"))
                .and_then(|t| t.value())
                .map(str::to_string),
            instance_type: inst.instance_type().map(|t| t.as_str().to_string()),
            state: inst
                .state()
                .and_then(|s| s.name())
                .map(|n| n.as_str().to_string()),
            availability_zone: inst
                .placement()
                .and_then(|p| p.availability_zone())
                .map(str::to_string),
            launch_time: inst
                .launch_time()
                .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()),
            private_ip: inst.private_ip_address().map(str::to_string),
            public_ip: inst.public_ip_address().map(str::to_string),
        })
    }
}

/// SSM RunCommand dispatch and invocation polling.
pub struct SsmCommandRunner {
    client: aws_sdk_ssm::Client,
}

impl SsmCommandRunner {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait]
impl CommandRunner for SsmCommandRunner {
    async fn send_command(
        &self,
        instance_id: &str,
        commands: &[String],
        timeout_secs: i32,
    ) -> Result<String, CoreError> {
        use aws_sdk_ssm::error::DisplayErrorContext;

        let out = self
            .client
            .send_command()
            .instance_ids(instance_id)
            .document_name(SHELL_DOCUMENT)
            .parameters("commands", commands.to_vec())
            .timeout_seconds(timeout_secs)
            .send()
            .await
            .map_err(|e| CoreError::Ssm(DisplayErrorContext(&e).to_string()))?;

        out.command()
            .and_then(|c| c.command_id())
            .map(str::to_string)
            .ok_or_else(|| CoreError::Ssm("SendCommand returned no command ID".to_string()))
    }

    async fn command_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<Option<CommandInvocation>, CoreError> {
        use aws_sdk_ssm::error::DisplayErrorContext;

        let result = self
            .client
            .get_command_invocation()
            .command_id(command_id)
            .instance_id(instance_id)
            .send()
            .await;

        match result {
            Ok(out) => Ok(Some(CommandInvocation {
                status: out
                    .status()
                    .map(|s| CommandStatus::parse(s.as_str()))
                    .unwrap_or(CommandStatus::Pending),
                stdout: out.standard_output_content().unwrap_or_default().to_string(),
            })),
            Err(e) => {
                let err = e.into_service_error();
                // SSM needs a moment to register a freshly sent command.
                if err.is_invocation_does_not_exist() {
                    Ok(None)
                } else {
                    Err(CoreError::Ssm(DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }
}

/// Bedrock `InvokeModel` with the text-completion request body.
pub struct BedrockGenerator {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl BedrockGenerator {
    pub fn new(config: &SdkConfig, model_id: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_bedrockruntime::Client::new(config),
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for BedrockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError> {
        use aws_sdk_bedrockruntime::error::DisplayErrorContext;
        use aws_sdk_bedrockruntime::primitives::Blob;

        let body = serde_json::to_vec(&json!({
            "prompt": request.prompt,
            "max_tokens_to_sample": request.max_tokens,
            "temperature": request.temperature,
        }))?;

        let out = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| CoreError::Bedrock(DisplayErrorContext(&e).to_string()))?;

        Ok(String::from_utf8_lossy(out.body().as_ref()).into_owned())
    }
}

/// SNS `Publish` to a fixed topic.
pub struct SnsPublisher {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsPublisher {
    pub fn new(config: &SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sns::Client::new(config),
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl TopicPublisher for SnsPublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<String, CoreError> {
        use aws_sdk_sns::error::DisplayErrorContext;
        use aws_sdk_sns::types::MessageAttributeValue;

        let mut request = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(&message.subject)
            .message(&message.body);

        for (name, value) in &message.attributes {
            let attr = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| CoreError::Sns(e.to_string()))?;
            request = request.message_attributes(name, attr);
        }

        let out = request
            .send()
            .await
            .map_err(|e| CoreError::Sns(DisplayErrorContext(&e).to_string()))?;

        Ok(out.message_id().unwrap_or_default().to_string())
    }
}
