mod actions;
mod advice;
mod aws;
mod config;
mod diagnostics;
mod errors;
mod handler;
mod links;
mod message;
mod resource;
mod slack;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use aws_config::BehaviorVersion;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use remediation_core::ChatNotifier;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::aws::{BedrockGenerator, Ec2Directory, SnsPublisher, SsmCommandRunner};
use crate::config::Config;
use crate::handler::{Collaborators, Handler};
use crate::links::HttpLinkChecker;
use crate::slack::SlackClient;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let config = Config::from_env(sdk_config.region().map(|r| r.as_ref()))?;

    let chat = config
        .slack_webhook_url
        .clone()
        .map(|url| Arc::new(SlackClient::new(url)) as Arc<dyn ChatNotifier>);

    info!(
        topic_arn = %config.topic_arn,
        model_id = %config.model_id,
        region = %config.region,
        chat_enabled = chat.is_some(),
        "remediation handler starting"
    );

    let deps = Collaborators {
        instances: Arc::new(Ec2Directory::new(&sdk_config)),
        commands: Arc::new(SsmCommandRunner::new(&sdk_config)),
        generator: Arc::new(BedrockGenerator::new(&sdk_config, config.model_id.clone())),
        publisher: Arc::new(SnsPublisher::new(&sdk_config, config.topic_arn.clone())),
        links: Arc::new(HttpLinkChecker::new(config.link_check_timeout)?),
        chat,
    };
    let handler = Handler::new(config, deps);
    let handler = &handler;

    lambda_runtime::run(service_fn(
        move |event: LambdaEvent<serde_json::Value>| async move {
            Ok::<_, Error>(handler.handle(event.payload).await)
        },
    ))
    .await
}
