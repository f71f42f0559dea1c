use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// CloudWatch state value for a triggered alarm.
pub const ALARM_STATE: &str = "ALARM";

/// Placeholder used whenever the top offending process could not be identified.
pub const UNKNOWN_PROCESS: &str = "Unknown";

const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// Inbound SNS envelope
// ---------------------------------------------------------------------------

/// The Lambda event SNS delivers: one or more records, each wrapping a message.
#[derive(Debug, Clone, Deserialize)]
pub struct SnsEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SnsRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnsRecord {
    #[serde(rename = "Sns")]
    pub sns: SnsMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnsMessage {
    #[serde(rename = "Message", default)]
    pub message: String,

    #[serde(rename = "MessageAttributes", default)]
    pub message_attributes: HashMap<String, SnsMessageAttribute>,
}

/// A single SNS message attribute as rendered into the Lambda event.
#[derive(Debug, Clone, Deserialize)]
pub struct SnsMessageAttribute {
    #[serde(rename = "Type", default)]
    pub data_type: Option<String>,

    #[serde(rename = "Value", default)]
    pub value: Option<String>,
}

impl SnsMessage {
    /// String value of the named message attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.message_attributes
            .get(name)
            .and_then(|a| a.value.as_deref())
    }
}

// ---------------------------------------------------------------------------
// AlarmEvent
// ---------------------------------------------------------------------------

/// Raw CloudWatch alarm notification as published to SNS.
#[derive(Debug, Clone, Default, Deserialize)]
struct AlarmMessage {
    #[serde(rename = "AlarmName", default)]
    alarm_name: Option<String>,

    #[serde(rename = "StateChangeTime", default)]
    state_change_time: Option<String>,

    #[serde(rename = "OldStateValue", default)]
    old_state_value: Option<String>,

    #[serde(rename = "NewStateValue", default)]
    new_state_value: Option<String>,

    #[serde(rename = "Trigger", alias = "trigger", default)]
    trigger: Option<AlarmTrigger>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AlarmTrigger {
    #[serde(rename = "Dimensions", alias = "dimensions", default)]
    dimensions: Option<Vec<Dimension>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Dimension {
    #[serde(rename = "Name", alias = "name", default)]
    name: Option<String>,

    #[serde(rename = "Value", alias = "value", default)]
    value: Option<String>,
}

/// A CloudWatch alarm state change, reduced to what the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmEvent {
    pub alarm_name: String,
    pub timestamp: String,
    pub old_state: String,
    pub new_state: String,
    /// Value of the first `InstanceId` dimension, if any.
    pub instance_id: Option<String>,
}

impl AlarmEvent {
    /// Interpret an already-parsed JSON message body as an alarm event.
    ///
    /// Fails only when the value is not an object or a known field has the
    /// wrong shape; absent fields fall back to placeholders.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let msg: AlarmMessage = serde_json::from_value(value)?;

        let instance_id = msg
            .trigger
            .and_then(|t| t.dimensions)
            .unwrap_or_default()
            .into_iter()
            .find(|d| d.name.as_deref() == Some("InstanceId"))
            .and_then(|d| d.value)
            .filter(|v| !v.is_empty());

        Ok(Self {
            alarm_name: msg.alarm_name.unwrap_or_else(|| "UnknownAlarm".to_string()),
            timestamp: msg
                .state_change_time
                .unwrap_or_else(|| "UnknownTime".to_string()),
            old_state: msg.old_state_value.unwrap_or_default(),
            new_state: msg.new_state_value.unwrap_or_default(),
            instance_id,
        })
    }

    /// True only for the edge into ALARM; sustained alarms are ignored.
    pub fn is_transition_into_alarm(&self) -> bool {
        self.old_state != ALARM_STATE && self.new_state == ALARM_STATE
    }

    pub fn metric_kind(&self) -> MetricKind {
        MetricKind::from_alarm_name(&self.alarm_name)
    }
}

// ---------------------------------------------------------------------------
// MetricKind
// ---------------------------------------------------------------------------

/// The resource metric an alarm is about, inferred from the alarm name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
}

impl MetricKind {
    pub fn from_alarm_name(alarm_name: &str) -> Self {
        if alarm_name.to_lowercase().contains("memory") {
            Self::Memory
        } else {
            Self::Cpu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }

    /// Upper-case label used in notification headings (`CPU`, `MEMORY`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "MEMORY",
        }
    }

    /// `ps` column the process list is ranked by.
    pub fn ps_column(&self) -> &'static str {
        match self {
            Self::Cpu => "%cpu",
            Self::Memory => "%mem",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::Cpu => "%CPU",
            Self::Memory => "%MEM",
        }
    }

    /// Shell command listing the five heaviest processes for this metric.
    pub fn top_processes_command(&self) -> String {
        let col = self.ps_column();
        format!("ps -eo pid,comm,{col} --sort=-{col} | head -n6")
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CloudWatch console deep link to the instance's resource-health dashboard.
pub fn metrics_console_url(region: &str, instance_id: &str, metric: MetricKind) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/cloudwatch/home\
         ?region={region}#resource-health:dashboards/ec2/{instance_id}?~\
         (leadingMetric~'*22{metric}-utilization*22)"
    )
}

// ---------------------------------------------------------------------------
// InstanceInfo
// ---------------------------------------------------------------------------

/// EC2 instance attributes shown in the notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceInfo {
    pub instance_id: String,
    /// Value of the `Name` tag.
    pub name: Option<String>,
    pub instance_type: Option<String>,
    pub state: Option<String>,
    pub availability_zone: Option<String>,
    /// Launch time, ISO-8601.
    pub launch_time: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
}

impl InstanceInfo {
    /// Multi-line `Label: value` rendering; missing attributes show as `N/A`.
    pub fn render(&self) -> String {
        fn or_na(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or(NOT_AVAILABLE)
        }

        format!(
            "Name: {}\nInstanceId: {}\nType: {}\nState: {}\nAZ: {}\nLaunched: {}\nPrivate IP: {}\nPublic IP: {}",
            or_na(&self.name),
            self.instance_id,
            or_na(&self.instance_type),
            or_na(&self.state),
            or_na(&self.availability_zone),
            or_na(&self.launch_time),
            or_na(&self.private_ip),
            or_na(&self.public_ip),
        )
    }
}

// ---------------------------------------------------------------------------
// Remote command status
// ---------------------------------------------------------------------------

/// Status of an SSM command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    InProgress,
    Delayed,
    Success,
    Cancelled,
    Cancelling,
    TimedOut,
    Failed,
    Other(String),
}

impl CommandStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "InProgress" => Self::InProgress,
            "Delayed" => Self::Delayed,
            "Success" => Self::Success,
            "Cancelled" => Self::Cancelled,
            "Cancelling" => Self::Cancelling,
            "TimedOut" => Self::TimedOut,
            "Failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether polling can stop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Delayed => "Delayed",
            Self::Success => "Success",
            Self::Cancelled => "Cancelled",
            Self::Cancelling => "Cancelling",
            Self::TimedOut => "TimedOut",
            Self::Failed => "Failed",
            Self::Other(other) => other,
        };
        f.write_str(s)
    }
}

/// A polled view of one command invocation on one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub status: CommandStatus,
    pub stdout: String,
}

// ---------------------------------------------------------------------------
// DiagnosticReport
// ---------------------------------------------------------------------------

/// Ranked process list gathered from the instance, or a degraded status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticReport {
    pub text: String,
    pub top_process: String,
}

impl DiagnosticReport {
    /// A report carrying only a status line; the top process stays unknown.
    pub fn degraded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_process: UNKNOWN_PROCESS.to_string(),
        }
    }

    /// Parse `ps -eo pid,comm,<metric>` output: the first line is the header,
    /// the command name of the second line is the top process.
    pub fn from_process_list(output: &str) -> Self {
        let text = output.trim().to_string();
        let top_process = text
            .lines()
            .nth(1)
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or(UNKNOWN_PROCESS)
            .to_string();
        Self { text, top_process }
    }

    /// The top process name, unless it is the unknown placeholder.
    pub fn known_top_process(&self) -> Option<&str> {
        Some(self.top_process.as_str()).filter(|p| !p.is_empty() && *p != UNKNOWN_PROCESS)
    }
}

// ---------------------------------------------------------------------------
// NotificationPayload
// ---------------------------------------------------------------------------

/// The nine user-facing fields every notification carries.
///
/// Serializes to the flat chat-webhook shape as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub alarm_name: String,
    pub timestamp: String,
    pub resource_details: String,
    pub metrics_type: String,
    pub metrics_url: String,
    pub processes_type: String,
    pub top_processes: String,
    pub advice: String,
    pub actions_taken: String,
}
