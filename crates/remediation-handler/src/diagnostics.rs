use std::time::Duration;

use remediation_core::{
    CommandInvocation, CommandRunner, CommandStatus, CoreError, DiagnosticReport, MetricKind,
};
use tracing::{debug, info, warn};

/// SSM-side execution timeout for the process listing.
const DIAGNOSTIC_TIMEOUT_SECS: i32 = 30;

/// Bounded polling of a dispatched command.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub attempts: u32,
    pub interval: Duration,
}

/// Gather the top processes for `metric` from the instance.
///
/// Never fails: every problem is reported as a status line in the report.
pub async fn collect(
    runner: &dyn CommandRunner,
    instance_id: Option<&str>,
    metric: MetricKind,
    poll: PollSettings,
) -> DiagnosticReport {
    let Some(instance_id) = instance_id else {
        return DiagnosticReport::degraded("Not available");
    };

    match run_and_wait(runner, instance_id, &metric.top_processes_command(), poll).await {
        Ok(Some(inv)) if inv.status == CommandStatus::Success => {
            let report = DiagnosticReport::from_process_list(&inv.stdout);
            info!(instance_id, top_process = %report.top_process, "collected process list");
            report
        }
        Ok(Some(inv)) => {
            warn!(instance_id, status = %inv.status, "process listing did not succeed");
            DiagnosticReport::degraded(format!("SSM command status: {}", inv.status))
        }
        Ok(None) => {
            warn!(instance_id, attempts = poll.attempts, "process listing did not complete");
            DiagnosticReport::degraded("SSM command did not complete")
        }
        Err(e) => {
            warn!(instance_id, error = %e, "process listing failed");
            DiagnosticReport::degraded(format!("Error fetching processes via SSM: {e}"))
        }
    }
}

/// Dispatch `command` and poll until it reaches a terminal status.
///
/// Returns `None` when the attempts run out first.
async fn run_and_wait(
    runner: &dyn CommandRunner,
    instance_id: &str,
    command: &str,
    poll: PollSettings,
) -> Result<Option<CommandInvocation>, CoreError> {
    let command_id = runner
        .send_command(instance_id, &[command.to_string()], DIAGNOSTIC_TIMEOUT_SECS)
        .await?;

    for attempt in 1..=poll.attempts {
        match runner.command_invocation(&command_id, instance_id).await? {
            Some(inv) if inv.status.is_terminal() => return Ok(Some(inv)),
            Some(inv) => debug!(attempt, status = %inv.status, "command still running"),
            None => debug!(attempt, "command invocation not registered yet"),
        }

        if attempt < poll.attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }

    Ok(None)
}
