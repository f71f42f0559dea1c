use remediation_core::plan::{ADVICE_MARKER, PLAN_MARKER, unwrap_completion};
use remediation_core::{AdviceAndPlan, AlarmEvent, DiagnosticReport, GenerationRequest, TextGenerator};
use tracing::{info, warn};

const MAX_TOKENS: u32 = 400;
const TEMPERATURE: f32 = 0.5;

/// Stand-in response when the model cannot be reached: no advice to speak
/// of and an empty plan, so the kill-top-process fallback applies.
pub const UNAVAILABLE_RESPONSE: &str =
    "###ADVICE###\nBedrock unavailable; defaulting to kill top process.\n\n###PLAN###\n{}";

/// Prompt asking for a paragraph of advice and a JSON action plan, each
/// introduced by its marker.
pub fn build_prompt(event: &AlarmEvent, report: &DiagnosticReport) -> String {
    let metric = event.metric_kind();
    let unit = metric.unit();
    format!(
        "Human: A CloudWatch alarm '{alarm}' for EC2 instance {instance} fired at {time} \
         due to high {label} usage.\n\n\
         The top process consuming {unit} is: '{top}'.\n\
         Here are the top 5 processes by {unit}:\n{processes}\n\n\
         {ADVICE_MARKER}\n\
         Please provide a clear, concise paragraph of human-friendly advice \
         for a cloud engineer explaining what to check and how to fix this.\n\n\
         {PLAN_MARKER}\n\
         Now output a JSON object with:\n  \
         \"actions\": [ {{ \"type\": \"ssm_command\", \"description\": \"...\", \"commands\": [\"...\"] }}, ... ],\n  \
         \"justifications\": [ \"...\", \"...\" ]\n\
         Do not output anything except those two sections, separated by the markers above.\n\
         Assistant:",
        alarm = event.alarm_name,
        instance = event.instance_id.as_deref().unwrap_or("Unknown"),
        time = event.timestamp,
        label = metric.label(),
        top = report.top_process,
        processes = report.text,
    )
}

/// Ask the model for advice and a plan.
///
/// The returned plan already has the kill-top-process fallback applied.
pub async fn request(
    generator: &dyn TextGenerator,
    event: &AlarmEvent,
    report: &DiagnosticReport,
) -> AdviceAndPlan {
    let request = GenerationRequest {
        prompt: build_prompt(event, report),
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    };

    let raw = match generator.generate(&request).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "advice request failed, using default plan");
            UNAVAILABLE_RESPONSE.to_string()
        }
    };

    let AdviceAndPlan { advice, plan } = AdviceAndPlan::split(&unwrap_completion(raw));
    let proposed = plan.actions.len();
    let plan = plan.or_fallback(report.known_top_process());
    info!(proposed, planned = plan.actions.len(), "received remediation plan");

    AdviceAndPlan { advice, plan }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGenerator;
    use remediation_core::CoreError;

    fn event() -> AlarmEvent {
        AlarmEvent {
            alarm_name: "high-cpu-prod".into(),
            timestamp: "2024-05-01T10:00:00Z".into(),
            old_state: "OK".into(),
            new_state: "ALARM".into(),
            instance_id: Some("i-1".into()),
        }
    }

    fn report() -> DiagnosticReport {
        DiagnosticReport::from_process_list("PID COMMAND %CPU\n42 stress 99.1")
    }

    #[test]
    fn prompt_embeds_context_and_markers() {
        let prompt = build_prompt(&event(), &report());
        assert!(prompt.starts_with("Human: A CloudWatch alarm 'high-cpu-prod' for EC2 instance i-1"));
        assert!(prompt.contains("due to high CPU usage"));
        assert!(prompt.contains("The top process consuming %CPU is: 'stress'."));
        assert!(prompt.contains("42 stress 99.1"));
        assert!(prompt.contains("###ADVICE###\n"));
        assert!(prompt.contains("###PLAN###\n"));
        assert!(prompt.contains("{ \"type\": \"ssm_command\""));
        assert!(prompt.ends_with("Assistant:"));
    }

    #[tokio::test]
    async fn sends_bounded_request() {
        let generator = FakeGenerator::replying("plain advice");
        request(&generator, &event(), &report()).await;
        let sent = generator.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].max_tokens, 400);
        assert_eq!(sent[0].temperature, 0.5);
    }

    #[tokio::test]
    async fn unwraps_completion_and_parses_plan() {
        let body = serde_json::json!({
            "type": "completion",
            "completion": "###ADVICE###\nRestart nginx.\n###PLAN###\n{\"actions\":[{\"type\":\"ssm_command\",\"description\":\"restart\",\"commands\":[\"sudo systemctl restart nginx\"]}],\"justifications\":[\"clears leak\"]}"
        })
        .to_string();
        let generator = FakeGenerator::replying(&body);

        let result = request(&generator, &event(), &report()).await;
        assert_eq!(result.advice, "Restart nginx.");
        assert_eq!(result.plan.actions.len(), 1);
        assert_eq!(result.plan.actions[0].description, "restart");
        assert_eq!(result.plan.justification(0), "clears leak");
    }

    #[tokio::test]
    async fn unavailable_model_falls_back_to_kill() {
        let generator = FakeGenerator::failing(CoreError::Bedrock("throttled".into()));

        let result = request(&generator, &event(), &report()).await;
        assert_eq!(result.advice, "Bedrock unavailable; defaulting to kill top process.");
        assert_eq!(result.plan.actions.len(), 1);
        assert_eq!(result.plan.actions[0].commands, vec!["sudo pkill -9 stress".to_string()]);
    }

    #[tokio::test]
    async fn markerless_response_is_all_advice() {
        let generator = FakeGenerator::replying("Scale the instance up.");
        let unknown = DiagnosticReport::degraded("SSM command did not complete");

        let result = request(&generator, &event(), &unknown).await;
        assert_eq!(result.advice, "Scale the instance up.");
        assert!(result.plan.actions.is_empty());
    }
}
