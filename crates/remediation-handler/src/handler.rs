use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use remediation_core::{
    AdviceAndPlan, AlarmEvent, ChatNotifier, CommandRunner, InstanceDirectory, LinkChecker,
    NotificationPayload, OutboundMessage, SnsEvent, SnsMessage, TextGenerator, TopicPublisher,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::diagnostics::PollSettings;
use crate::errors::HandlerError;
use crate::message::{self, PLAINTEXT_PREFIX};
use crate::{actions, advice, diagnostics, links, resource, slack};

/// Message attribute tagging everything this function publishes.
pub const SOURCE_ATTRIBUTE: &str = "source";
pub const REMEDIATION_SOURCE: &str = "remediation";

/// Message attribute telling a later echo that chat already has this alarm.
pub const CHAT_ATTRIBUTE: &str = "slack";

/// Lambda response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    fn bad_request(body: impl Into<String>) -> Self {
        Self {
            status_code: 400,
            body: body.into(),
        }
    }
}

/// How an inbound message body is handled.
#[derive(Debug)]
enum Payload {
    /// Structured CloudWatch alarm: run the full pipeline.
    Alarm(serde_json::Value),
    /// Plaintext notification: mirror to chat only.
    Echo,
    Unknown,
}

fn classify(body: &str) -> Payload {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => Payload::Alarm(value),
        Err(_) if body.starts_with(PLAINTEXT_PREFIX) => Payload::Echo,
        Err(_) => Payload::Unknown,
    }
}

/// External services the handler talks to.
pub struct Collaborators {
    pub instances: Arc<dyn InstanceDirectory>,
    pub commands: Arc<dyn CommandRunner>,
    pub generator: Arc<dyn TextGenerator>,
    pub publisher: Arc<dyn TopicPublisher>,
    pub links: Arc<dyn LinkChecker>,
    /// `None` when no chat webhook is configured.
    pub chat: Option<Arc<dyn ChatNotifier>>,
}

/// Handles one SNS-delivered alarm notification per invocation.
pub struct Handler {
    config: Config,
    deps: Collaborators,
}

impl Handler {
    pub fn new(config: Config, deps: Collaborators) -> Self {
        Self { config, deps }
    }

    /// Handle a raw Lambda event.
    ///
    /// Only an event that cannot be interpreted at all gets a non-200 status;
    /// every other outcome is a 200 with a body describing what happened.
    pub async fn handle(&self, event: serde_json::Value) -> HandlerResponse {
        match self.process(event).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "rejecting malformed event");
                HandlerResponse::bad_request(e.to_string())
            }
        }
    }

    async fn process(&self, event: serde_json::Value) -> Result<HandlerResponse, HandlerError> {
        let event: SnsEvent = serde_json::from_value(event).map_err(HandlerError::Envelope)?;
        let sns = event
            .records
            .into_iter()
            .next()
            .ok_or(HandlerError::NoRecords)?
            .sns;

        // Everything we publish comes back to us; drop it before parsing.
        if sns.attribute(SOURCE_ATTRIBUTE) == Some(REMEDIATION_SOURCE) {
            info!("skipping self-published message");
            return Ok(HandlerResponse::ok("skipped"));
        }

        match classify(&sns.message) {
            Payload::Alarm(value) => {
                let alarm = AlarmEvent::from_json(value).map_err(HandlerError::MalformedAlarm)?;
                Ok(self.handle_alarm(alarm).await)
            }
            Payload::Echo => Ok(self.handle_echo(&sns).await),
            Payload::Unknown => {
                info!("skipping message of unknown format");
                Ok(HandlerResponse::ok("skipped unknown format"))
            }
        }
    }

    async fn handle_alarm(&self, alarm: AlarmEvent) -> HandlerResponse {
        if !alarm.is_transition_into_alarm() {
            info!(
                alarm = %alarm.alarm_name,
                old_state = %alarm.old_state,
                new_state = %alarm.new_state,
                "skipping non-transition"
            );
            return HandlerResponse::ok("skipped non-transition");
        }

        let metric = alarm.metric_kind();
        let instance_id = alarm.instance_id.as_deref();
        info!(
            alarm = %alarm.alarm_name,
            instance_id = instance_id.unwrap_or("none"),
            %metric,
            "processing alarm transition"
        );

        let resource = resource::resolve(
            self.deps.instances.as_ref(),
            instance_id,
            metric,
            &self.config.region,
        )
        .await;

        let poll = PollSettings {
            attempts: self.config.poll_attempts,
            interval: self.config.poll_interval,
        };
        let report =
            diagnostics::collect(self.deps.commands.as_ref(), instance_id, metric, poll).await;

        let AdviceAndPlan { advice, plan } =
            advice::request(self.deps.generator.as_ref(), &alarm, &report).await;

        let actions = actions::execute_plan(
            self.deps.commands.as_ref(),
            instance_id,
            &plan,
            report.known_top_process(),
        )
        .await;

        let advice = links::validate_advice_links(self.deps.links.as_ref(), &advice).await;

        let payload = NotificationPayload {
            alarm_name: alarm.alarm_name.clone(),
            timestamp: alarm.timestamp.clone(),
            resource_details: resource.details,
            metrics_type: metric.label().to_string(),
            metrics_url: resource.metrics_url,
            processes_type: metric.label().to_string(),
            top_processes: report.text,
            advice,
            actions_taken: message::actions_taken(&actions),
        };

        let published = self.publish(&payload).await;
        let chat_delivered = self.post_chat(&payload).await;

        let reboot_deferred = actions.deferred.is_some();
        match (&actions.deferred, instance_id) {
            (Some(deferred), Some(instance_id)) if self.config.execute_deferred_reboot => {
                actions::execute_deferred(self.deps.commands.as_ref(), instance_id, deferred)
                    .await;
            }
            (Some(_), _) => info!("deferred reboot left for the operator"),
            _ => {}
        }

        info!(
            alarm = %alarm.alarm_name,
            published,
            chat_delivered,
            actions_sent = actions.sent_count(),
            actions_failed = actions.failed_count(),
            reboot_deferred,
            "alarm processed"
        );

        HandlerResponse::ok(
            json!({
                "status": "ok",
                "published": published,
                "chat_delivered": chat_delivered,
                "actions_sent": actions.sent_count(),
                "actions_failed": actions.failed_count(),
                "reboot_deferred": reboot_deferred,
            })
            .to_string(),
        )
    }

    /// Mirror a plaintext notification to chat. Never publishes.
    async fn handle_echo(&self, sns: &SnsMessage) -> HandlerResponse {
        if sns.attribute(CHAT_ATTRIBUTE) == Some("true") {
            info!("plaintext already delivered to chat");
            return HandlerResponse::ok("skipped plaintext path (chat already delivered)");
        }
        if self.deps.chat.is_none() {
            info!("no chat webhook configured for plaintext echo");
            return HandlerResponse::ok("skipped plaintext path (no chat webhook)");
        }

        let payload = message::parse_plaintext(&sns.message);
        if self.post_chat(&payload).await {
            HandlerResponse::ok("echoed plaintext to chat")
        } else {
            HandlerResponse::ok("echo to chat failed")
        }
    }

    /// Publish the plaintext notification tagged so that it is not processed again.
    async fn publish(&self, payload: &NotificationPayload) -> bool {
        let mut attributes = BTreeMap::new();
        attributes.insert(SOURCE_ATTRIBUTE.to_string(), REMEDIATION_SOURCE.to_string());
        if self.deps.chat.is_some() {
            attributes.insert(CHAT_ATTRIBUTE.to_string(), "true".to_string());
        }

        let message = OutboundMessage {
            subject: message::subject(&payload.alarm_name),
            body: message::render_plaintext(payload),
            attributes,
        };

        match self.deps.publisher.publish(&message).await {
            Ok(message_id) => {
                info!(%message_id, "published notification");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to publish notification");
                false
            }
        }
    }

    async fn post_chat(&self, payload: &NotificationPayload) -> bool {
        let Some(chat) = &self.deps.chat else {
            debug!("chat webhook not configured");
            return false;
        };

        let body = slack::build_payload(self.config.chat_format, payload, Utc::now());
        match chat.post(&body).await {
            Ok(()) => {
                info!("posted notification to chat");
                true
            }
            Err(e) => {
                warn!(error = %e, "chat delivery failed");
                false
            }
        }
    }
}
