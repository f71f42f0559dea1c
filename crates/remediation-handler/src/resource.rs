use remediation_core::model::metrics_console_url;
use remediation_core::{InstanceDirectory, MetricKind};
use tracing::warn;

/// Resource details when the alarm names no instance.
pub const NO_INSTANCE_DETAILS: &str = "No EC2 instance ID found in alarm.";

const NO_METRICS_URL: &str = "N/A";

/// What the notification says about the alarmed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContext {
    pub details: String,
    pub metrics_url: String,
}

/// Describe the instance and build its console link. A failed lookup still
/// yields a link and a placeholder description.
pub async fn resolve(
    directory: &dyn InstanceDirectory,
    instance_id: Option<&str>,
    metric: MetricKind,
    region: &str,
) -> ResourceContext {
    let Some(instance_id) = instance_id else {
        return ResourceContext {
            details: NO_INSTANCE_DETAILS.to_string(),
            metrics_url: NO_METRICS_URL.to_string(),
        };
    };

    let details = match directory.describe_instance(instance_id).await {
        Ok(info) => info.render(),
        Err(e) => {
            warn!(instance_id, error = %e, "instance lookup failed");
            format!("Instance details unavailable for {instance_id}.")
        }
    };

    ResourceContext {
        details,
        metrics_url: metrics_console_url(region, instance_id, metric),
    }
}
