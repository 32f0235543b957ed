//! Periodic eviction of finished jobs from the in-memory queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::queue::JobQueue;

/// Run `queue.cleanup(max_age)` every `interval` until `cancel` fires.
pub async fn run_cleanup_loop(
    queue: Arc<JobQueue>,
    interval: Duration,
    max_age: chrono::Duration,
    cancel: CancellationToken,
) {
    info!(
        interval_secs = interval.as_secs(),
        max_age_hours = max_age.num_hours(),
        "Job cleanup task started"
    );

    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Job cleanup task shutting down");
                break;
            }
            _ = ticker.tick() => {
                let removed = queue.cleanup(max_age);
                debug!(removed, remaining = queue.len(), "Job cleanup cycle complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    #[tokio::test]
    async fn test_loop_evicts_and_stops_on_cancel() {
        let queue = Arc::new(JobQueue::new(1));
        queue.enqueue("old", |_| Ok(())).unwrap();
        for _ in 0..200 {
            if queue.get_status("old").status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_cleanup_loop(
            Arc::clone(&queue),
            Duration::from_millis(10),
            chrono::Duration::zero(),
            cancel.clone(),
        ));

        for _ in 0..200 {
            if queue.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(queue.get_status("old").status, JobStatus::NotFound);

        cancel.cancel();
        handle.await.unwrap();
    }
}
