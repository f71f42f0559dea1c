use remediation_core::{
    ActionOutcome, CommandRunner, DeferredAction, ExecutionRecord, RemediationPlan,
};
use tracing::{info, warn};

/// SSM-side execution timeout for remediation commands.
const ACTION_TIMEOUT_SECS: i32 = 60;

/// What happened to the plan's actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReport {
    pub executed: Vec<ExecutionRecord>,
    /// The last reboot action in the plan, held back until after notification.
    pub deferred: Option<DeferredAction>,
}

impl ActionReport {
    pub fn sent_count(&self) -> usize {
        self.executed.iter().filter(|r| r.outcome.is_sent()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.executed.len() - self.sent_count()
    }
}

/// Dispatch the plan's actions in order.
///
/// Reboots are deferred rather than run. Commands built around a placeholder
/// are replaced by a kill of `top_process`. A dispatch failure is recorded and
/// the remaining actions still run. Without an instance nothing is executed.
pub async fn execute_plan(
    runner: &dyn CommandRunner,
    instance_id: Option<&str>,
    plan: &RemediationPlan,
    top_process: Option<&str>,
) -> ActionReport {
    let mut report = ActionReport::default();
    let Some(instance_id) = instance_id else {
        return report;
    };

    for (idx, action) in plan.actions.iter().enumerate() {
        if !action.is_executable() {
            warn!(kind = %action.kind, description = %action.description, "skipping unsupported action");
            continue;
        }

        let justification = plan.justification(idx).to_string();

        if action.is_reboot() {
            info!(description = %action.description, "deferring reboot until after notification");
            report.deferred = Some(DeferredAction {
                description: action.description.clone(),
                commands: action.commands.clone(),
                justification,
            });
            continue;
        }

        let Some(commands) = action.resolve_commands(top_process) else {
            warn!(description = %action.description, "placeholder command without a known top process");
            report.executed.push(ExecutionRecord {
                description: action.description.clone(),
                commands: action.commands.clone(),
                outcome: ActionOutcome::Failed {
                    reason: "placeholder could not be resolved: top process unknown".to_string(),
                },
                justification,
            });
            continue;
        };

        let outcome = match runner
            .send_command(instance_id, &commands, ACTION_TIMEOUT_SECS)
            .await
        {
            Ok(command_id) => {
                info!(instance_id, %command_id, description = %action.description, "dispatched remediation");
                ActionOutcome::Sent { command_id }
            }
            Err(e) => {
                warn!(instance_id, error = %e, description = %action.description, "remediation dispatch failed");
                ActionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        report.executed.push(ExecutionRecord {
            description: action.description.clone(),
            commands,
            outcome,
            justification,
        });
    }

    report
}

/// Fire-and-forget dispatch of a deferred reboot. Failures are only logged.
pub async fn execute_deferred(
    runner: &dyn CommandRunner,
    instance_id: &str,
    deferred: &DeferredAction,
) {
    match runner
        .send_command(instance_id, &deferred.commands, ACTION_TIMEOUT_SECS)
        .await
    {
        Ok(command_id) => {
            info!(instance_id, %command_id, "dispatched deferred reboot");
        }
        Err(e) => {
            warn!(instance_id, error = %e, "deferred reboot dispatch failed");
        }
    }
}
