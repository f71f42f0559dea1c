pub mod error;
pub mod model;
pub mod plan;
pub mod ports;

pub use error::CoreError;
pub use model::{
    AlarmEvent, CommandInvocation, CommandStatus, DiagnosticReport, InstanceInfo, MetricKind,
    NotificationPayload, SnsEvent, SnsMessage, SnsRecord,
};
pub use plan::{
    Action, ActionOutcome, AdviceAndPlan, DeferredAction, ExecutionRecord, RemediationPlan,
};
pub use ports::{
    ChatNotifier, CommandRunner, GenerationRequest, InstanceDirectory, LinkChecker,
    OutboundMessage, TextGenerator, TopicPublisher,
};
