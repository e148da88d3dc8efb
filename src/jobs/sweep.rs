use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::instrument;

use crate::challenge::ChallengeService;

/// Runs [`ChallengeService::sweep_expired`] every `every`, starting immediately.
///
/// A failed pass is logged and retried on the next tick.
#[instrument(skip(service))]
pub fn spawn_sweeper(service: ChallengeService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match service.sweep_expired().await {
                Ok(report) if report.failed > 0 => {
                    tracing::info!(
                        examined = report.examined,
                        failed = report.failed,
                        "expiry sweep settled enrollments"
                    );
                }
                Ok(report) => {
                    tracing::debug!(examined = report.examined, "expiry sweep found nothing due");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "expiry sweep failure");
                }
            }
        }
    })
}
