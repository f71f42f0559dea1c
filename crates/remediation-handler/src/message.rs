use std::sync::LazyLock;

use regex::Regex;
use remediation_core::NotificationPayload;

use crate::actions::ActionReport;

/// Literal every plaintext notification starts with.
pub const PLAINTEXT_PREFIX: &str = "Alarm:";

const ACTIONS_HEADING: &str = "=== Actions Taken by AI ===";
const NO_ACTIONS: &str = "No automated actions were taken.";

/// Section labels of the plaintext body, in the order they appear.
static LABELS: LazyLock<[Regex; 7]> = LazyLock::new(|| {
    [
        r"(?m)^Alarm:[ \t]*",
        r"(?m)^Time:[ \t]*",
        r"(?m)^Resource Details:[ \t]*$",
        r"(?m)^(\S+) Metrics Console:[ \t]*$",
        r"(?m)^Top 5 (\S+) Processes:[ \t]*$",
        r"(?m)^General Remediation Advice:[ \t]*$",
        r"(?m)^=== Actions Taken by AI ===[ \t]*$",
    ]
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
});

/// SNS rejects subjects longer than this.
const SUBJECT_LIMIT: usize = 100;

/// SNS subject for an alarm notification.
pub fn subject(alarm_name: &str) -> String {
    format!("[Alert] EC2 Alarm: {alarm_name}")
        .chars()
        .take(SUBJECT_LIMIT)
        .collect()
}

/// Human-readable summary of executed and deferred actions.
pub fn actions_taken(report: &ActionReport) -> String {
    let mut entries: Vec<String> = report
        .executed
        .iter()
        .map(|r| action_entry(&r.description, &r.commands, &r.outcome.to_string(), &r.justification))
        .collect();

    if let Some(deferred) = &report.deferred {
        entries.push(action_entry(
            &deferred.description,
            &deferred.commands,
            "PENDING REBOOT",
            &deferred.justification,
        ));
    }

    if entries.is_empty() {
        NO_ACTIONS.to_string()
    } else {
        entries.join("\n\n")
    }
}

fn action_entry(description: &str, commands: &[String], status: &str, justification: &str) -> String {
    let commands = serde_json::to_string(commands).unwrap_or_default();
    format!(
        "- Description: {description}\n  Commands: {commands}\n  Status: {status}\n  Justification: {justification}"
    )
}

/// Render the plaintext body published to the topic.
pub fn render_plaintext(p: &NotificationPayload) -> String {
    format!(
        "Alarm: {}\n\
         Time: {}\n\n\
         Resource Details:\n{}\n\n\
         {} Metrics Console:\n{}\n\n\
         Top 5 {} Processes:\n{}\n\n\
         General Remediation Advice:\n{}\n\n\
         {ACTIONS_HEADING}\n{}\n",
        p.alarm_name,
        p.timestamp,
        p.resource_details,
        p.metrics_type,
        p.metrics_url,
        p.processes_type,
        p.top_processes,
        p.advice,
        p.actions_taken,
    )
}

/// Recover the nine fields from a plaintext body.
///
/// Each value runs from the end of its label to the start of the next label
/// found. Missing labels leave their field empty.
pub fn parse_plaintext(text: &str) -> NotificationPayload {
    struct Found<'t> {
        start: usize,
        end: usize,
        kind: Option<&'t str>,
    }

    let mut found: Vec<Option<Found<'_>>> = Vec::with_capacity(LABELS.len());
    let mut pos = 0;
    for label in LABELS.iter() {
        match label.captures_at(text, pos) {
            Some(caps) => {
                let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((pos, pos));
                pos = m.1;
                found.push(Some(Found {
                    start: m.0,
                    end: m.1,
                    kind: caps.get(1).map(|k| k.as_str()),
                }));
            }
            None => found.push(None),
        }
    }

    let value = |i: usize| -> String {
        let Some(label) = &found[i] else {
            return String::new();
        };
        let stop = found[i + 1..]
            .iter()
            .flatten()
            .map(|next| next.start)
            .next()
            .unwrap_or(text.len());
        text[label.end..stop].trim().to_string()
    };
    let kind = |i: usize| -> String {
        found[i]
            .as_ref()
            .and_then(|f| f.kind)
            .unwrap_or_default()
            .to_string()
    };

    NotificationPayload {
        alarm_name: value(0),
        timestamp: value(1),
        resource_details: value(2),
        metrics_type: kind(3),
        metrics_url: value(3),
        processes_type: kind(4),
        top_processes: value(4),
        advice: value(5),
        actions_taken: value(6),
    }
}
