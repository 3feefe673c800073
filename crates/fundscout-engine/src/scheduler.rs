//! Cron-driven discovery runs.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SourceRegistry;
use crate::orchestrator::Discovery;

/// Build the scheduler when enabled. Returns `None` when the configuration
/// disables scheduling; the caller decides whether to block on it.
pub async fn build_scheduler(
    discovery: Arc<Discovery>,
    registry: Arc<SourceRegistry>,
) -> Result<Option<JobScheduler>> {
    if !discovery.config().scheduler_enabled {
        return Ok(None);
    }

    let cron = discovery.config().discovery_cron.clone();
    let scheduler = JobScheduler::new().await.context("creating scheduler")?;
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let discovery = Arc::clone(&discovery);
        let registry = Arc::clone(&registry);
        Box::pin(async move {
            info!("scheduled discovery run starting");
            let session = discovery.start(&registry);
            match session.wait().await {
                Ok(summary) => info!(
                    run_id = %summary.run_id,
                    state = ?summary.state,
                    persisted = summary.persisted_total,
                    "scheduled discovery run finished"
                ),
                Err(err) => error!(error = %err, "scheduled discovery run failed"),
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    scheduler.add(job).await.context("adding scheduler job")?;
    Ok(Some(scheduler))
}
