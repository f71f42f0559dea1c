use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marks the start of the human-readable advice in a model response.
pub const ADVICE_MARKER: &str = "###ADVICE###";

/// Marks the start of the JSON plan in a model response.
pub const PLAN_MARKER: &str = "###PLAN###";

/// The only action kind the handler knows how to execute.
pub const SSM_COMMAND_KIND: &str = "ssm_command";

/// Substrings the model uses in place of a concrete PID or process name.
const PLACEHOLDER_TOKENS: &[&str] = &["<stress_pid>", "<pid>", "grep stress"];

/// Forceful kill of every process matching `process`.
pub fn kill_command(process: &str) -> String {
    format!("sudo pkill -9 {process}")
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Unwrap a model response envelope such as `{"type":"completion","completion":"..."}`.
///
/// Anything that is not a JSON object with a string `completion` is returned unchanged.
pub fn unwrap_completion(raw: String) -> String {
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Object(mut obj)) => match obj.remove("completion") {
            Some(serde_json::Value::String(completion)) => completion,
            _ => raw,
        },
        _ => raw,
    }
}

/// Advice text and plan extracted from one model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdviceAndPlan {
    pub advice: String,
    pub plan: RemediationPlan,
}

impl AdviceAndPlan {
    /// Split a response on the advice and plan markers.
    ///
    /// Without both markers (in that order) the whole text is advice and the
    /// plan is empty.
    pub fn split(text: &str) -> Self {
        let Some(advice_start) = text.find(ADVICE_MARKER) else {
            return Self::advice_only(text);
        };
        let after_advice = &text[advice_start + ADVICE_MARKER.len()..];
        let Some(plan_start) = after_advice.find(PLAN_MARKER) else {
            return Self::advice_only(text);
        };

        let advice = after_advice[..plan_start].trim().to_string();
        let plan = RemediationPlan::parse(&after_advice[plan_start + PLAN_MARKER.len()..]);
        Self { advice, plan }
    }

    fn advice_only(text: &str) -> Self {
        Self {
            advice: text.to_string(),
            plan: RemediationPlan::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// RemediationPlan
// ---------------------------------------------------------------------------

/// Ordered corrective actions proposed by the model.
///
/// `justifications[i]` explains `actions[i]`; the lists are correlated by
/// position only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemediationPlan {
    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(default)]
    pub justifications: Vec<String>,
}

impl RemediationPlan {
    /// Parse the plan section of a response. Reads the first JSON value and
    /// ignores anything after it; unparsable input yields an empty plan.
    pub fn parse(section: &str) -> Self {
        let mut stream = serde_json::Deserializer::from_str(section.trim()).into_iter::<Self>();
        match stream.next() {
            Some(Ok(plan)) => plan,
            Some(Err(e)) => {
                debug!(error = %e, "plan section is not a valid plan, using empty plan");
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// The single-action plan that kills the top offending process.
    pub fn kill_top_process(process: &str) -> Self {
        Self {
            actions: vec![Action {
                kind: SSM_COMMAND_KIND.to_string(),
                description: format!("Kill top process '{process}' to reduce load"),
                commands: vec![kill_command(process)],
            }],
            justifications: vec![format!(
                "Killing '{process}' will immediately reduce CPU/Memory usage."
            )],
        }
    }

    /// Substitute the kill-top-process plan when no actions were proposed.
    ///
    /// Without a known top process an action-less plan is returned with its
    /// justifications cleared.
    pub fn or_fallback(self, top_process: Option<&str>) -> Self {
        if !self.actions.is_empty() {
            return self;
        }
        match top_process {
            Some(process) => Self::kill_top_process(process),
            None => Self::default(),
        }
    }

    /// Justification for the action at `index`, empty when the model gave fewer.
    pub fn justification(&self, index: usize) -> &str {
        self.justifications
            .get(index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One proposed corrective action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub commands: Vec<String>,
}

impl Action {
    /// Whether the handler may dispatch this action. An omitted kind is
    /// treated as a shell command.
    pub fn is_executable(&self) -> bool {
        self.kind.is_empty() || self.kind == SSM_COMMAND_KIND
    }

    pub fn is_reboot(&self) -> bool {
        self.commands
            .iter()
            .any(|c| c.to_lowercase().contains("reboot"))
    }

    pub fn has_placeholder(&self) -> bool {
        self.commands
            .iter()
            .any(|c| PLACEHOLDER_TOKENS.iter().any(|t| c.contains(t)))
    }

    /// Commands to dispatch. Placeholder commands collapse to a kill of the
    /// top process; `None` if that process is not known.
    pub fn resolve_commands(&self, top_process: Option<&str>) -> Option<Vec<String>> {
        if !self.has_placeholder() {
            return Some(self.commands.clone());
        }
        top_process.map(|p| vec![kill_command(p)])
    }
}

// ---------------------------------------------------------------------------
// Execution results
// ---------------------------------------------------------------------------

/// Dispatch result of one executed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Sent { command_id: String },
    Failed { reason: String },
}

impl ActionOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent { .. } => f.write_str("SENT"),
            Self::Failed { reason } => write!(f, "FAILED: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub description: String,
    /// Commands after placeholder substitution.
    pub commands: Vec<String>,
    pub outcome: ActionOutcome,
    pub justification: String,
}

/// A reboot action held back until notifications are out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredAction {
    pub description: String,
    pub commands: Vec<String>,
    pub justification: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_completion_envelope() {
        let raw = r####"{"type":"completion","completion":"###ADVICE###\nhi","stop_reason":"stop"}"####;
        assert_eq!(unwrap_completion(raw.to_string()), "###ADVICE###\nhi");
    }

    #[test]
    fn leaves_plain_text_and_other_json_alone() {
        assert_eq!(unwrap_completion("plain".into()), "plain");
        assert_eq!(unwrap_completion(r#"{"text":"x"}"#.into()), r#"{"text":"x"}"#);
        assert_eq!(unwrap_completion(r#"{"completion":5}"#.into()), r#"{"completion":5}"#);
    }

    #[test]
    fn splits_advice_and_plan() {
        let text = "###ADVICE###\nCheck the stress job.\n\n###PLAN###\n{\"actions\":[{\"type\":\"ssm_command\",\"description\":\"kill\",\"commands\":[\"pkill stress\"]}],\"justifications\":[\"frees cpu\"]}";
        let split = AdviceAndPlan::split(text);
        assert_eq!(split.advice, "Check the stress job.");
        assert_eq!(split.plan.actions.len(), 1);
        assert_eq!(split.plan.actions[0].commands, vec!["pkill stress".to_string()]);
        assert_eq!(split.plan.justification(0), "frees cpu");
    }

    #[test]
    fn missing_markers_make_everything_advice() {
        let text = "Just restart the service.";
        let split = AdviceAndPlan::split(text);
        assert_eq!(split.advice, text);
        assert!(split.plan.actions.is_empty());
    }

    #[test]
    fn plan_marker_alone_is_not_enough() {
        let text = "advice ###PLAN### {}";
        let split = AdviceAndPlan::split(text);
        assert_eq!(split.advice, text);
    }

    #[test]
    fn trailing_prose_after_plan_is_ignored() {
        let plan = RemediationPlan::parse(
            "{\"actions\":[{\"commands\":[\"uptime\"]}]}\nLet me know if that helps!",
        );
        assert_eq!(plan.actions.len(), 1);
        assert!(plan.actions[0].is_executable());
    }

    #[test]
    fn garbage_plan_is_empty() {
        assert_eq!(RemediationPlan::parse("not json"), RemediationPlan::default());
        assert_eq!(RemediationPlan::parse(""), RemediationPlan::default());
    }

    #[test]
    fn fallback_kills_known_top_process() {
        let plan = RemediationPlan::default().or_fallback(Some("stress"));
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].commands, vec!["sudo pkill -9 stress".to_string()]);
        assert_eq!(plan.justifications.len(), 1);
    }

    #[test]
    fn fallback_without_process_is_empty() {
        let plan = RemediationPlan {
            actions: vec![],
            justifications: vec!["orphan".into()],
        }
        .or_fallback(None);
        assert!(plan.actions.is_empty());
        assert!(plan.justifications.is_empty());
    }

    #[test]
    fn fallback_keeps_proposed_actions() {
        let plan = RemediationPlan {
            actions: vec![Action {
                kind: SSM_COMMAND_KIND.into(),
                description: "restart".into(),
                commands: vec!["systemctl restart app".into()],
            }],
            justifications: vec![],
        };
        assert_eq!(plan.clone().or_fallback(Some("stress")), plan);
        assert_eq!(plan.justification(0), "");
    }

    #[test]
    fn reboot_detection_is_case_insensitive() {
        let action = Action {
            commands: vec!["sudo REBOOT now".into()],
            ..Default::default()
        };
        assert!(action.is_reboot());
    }

    #[test]
    fn placeholder_resolves_to_kill_of_top_process() {
        let action = Action {
            commands: vec!["kill -9 <stress_pid>".into(), "echo done".into()],
            ..Default::default()
        };
        assert_eq!(
            action.resolve_commands(Some("stress")),
            Some(vec!["sudo pkill -9 stress".to_string()])
        );
        assert_eq!(action.resolve_commands(None), None);
    }

    #[test]
    fn concrete_commands_pass_through() {
        let action = Action {
            commands: vec!["systemctl restart nginx".into()],
            ..Default::default()
        };
        assert_eq!(action.resolve_commands(None), Some(action.commands.clone()));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(ActionOutcome::Sent { command_id: "c-1".into() }.to_string(), "SENT");
        assert_eq!(
            ActionOutcome::Failed { reason: "denied".into() }.to_string(),
            "FAILED: denied"
        );
    }

    #[test]
    fn non_ssm_kind_is_not_executable() {
        let action = Action {
            kind: "lambda_invoke".into(),
            ..Default::default()
        };
        assert!(!action.is_executable());
    }
}
