//! Background workers draining the judge and agent request queues.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::service::NpcJudgeService;

/// Back-off after a failed queue poll
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

impl NpcJudgeService {
    /// Start the judge queue worker.
    /// This should be called once on server startup
    pub fn start_judge_worker(service: Arc<NpcJudgeService>) {
        let limit = Arc::new(Semaphore::new(
            service.config.workers.judge_concurrency.max(1),
        ));
        let poll_interval = service.config.workers.poll_interval();

        tokio::spawn(async move {
            info!(
                concurrency = limit.available_permits(),
                "Judge request worker started"
            );
            loop {
                let Ok(permit) = limit.clone().acquire_owned().await else {
                    break;
                };

                match service.db.claim_next_judge_request() {
                    Ok(Some(request)) => {
                        info!(
                            request_id = %request.id,
                            session_id = %request.session_id,
                            npc_id = %request.npc_id,
                            "Processing queued judge request"
                        );
                        let service = service.clone();
                        tokio::spawn(async move {
                            service.process_judge_request(&request).await;
                            drop(permit);
                        });
                    }
                    Ok(None) => {
                        drop(permit);
                        tokio::time::sleep(poll_interval).await;
                    }
                    Err(e) => {
                        drop(permit);
                        error!(error = %e, "Failed to check for pending judge requests");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        });
    }

    /// Start the agent queue worker
    pub fn start_agent_worker(service: Arc<NpcJudgeService>) {
        let limit = Arc::new(Semaphore::new(
            service.config.workers.agent_concurrency.max(1),
        ));
        let poll_interval = service.config.workers.poll_interval();

        tokio::spawn(async move {
            info!(
                concurrency = limit.available_permits(),
                "Agent request worker started"
            );
            loop {
                let Ok(permit) = limit.clone().acquire_owned().await else {
                    break;
                };

                match service.db.claim_next_agent_request() {
                    Ok(Some(request)) => {
                        info!(
                            request_id = %request.id,
                            requester_id = %request.requester_id,
                            "Processing queued agent request"
                        );
                        let service = service.clone();
                        tokio::spawn(async move {
                            service.process_agent_request(&request).await;
                            drop(permit);
                        });
                    }
                    Ok(None) => {
                        drop(permit);
                        tokio::time::sleep(poll_interval).await;
                    }
                    Err(e) => {
                        drop(permit);
                        error!(error = %e, "Failed to check for pending agent requests");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        });
    }
}
