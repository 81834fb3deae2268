//! Periodic re-render of the published image set.
//!
//! Assignments already trigger a render, so this loop only keeps
//! `lastRenderedAt` fresh and recovers from a render that failed after an
//! assignment.

use crate::server::service::handler::Service;
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

pub fn spawn_rerender_loop(
    service: Arc<Service>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and startup has rendered already.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!("Re-render loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let service = Arc::clone(&service);
                    match tokio::task::spawn_blocking(move || service.rerender()).await {
                        Ok(Ok(report)) => tracing::debug!(
                            assigned_count = report.assigned_count,
                            "Scheduled re-render finished"
                        ),
                        Ok(Err(err)) => tracing::error!(error = %err, "Scheduled re-render failed"),
                        Err(err) => tracing::error!(error = %err, "Scheduled re-render panicked"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::service::handler::Store;
    use pichord::{
        ChordService, DigitSequence, ImageStore, MemoryStore, Resolution, ResolutionSet,
    };

    fn service() -> Arc<Service> {
        let resolutions = ResolutionSet::new(vec![Resolution::new(32, 32)], "32x32").unwrap();
        let store: Store = Box::new(MemoryStore::new());
        Arc::new(ChordService::new(
            store,
            DigitSequence::from_text("3.14159"),
            resolutions,
            ImageStore::new("", "32x32"),
        ))
    }

    #[tokio::test]
    async fn renders_on_every_tick_until_cancelled() {
        let service = service();
        let shutdown = CancellationToken::new();
        let handle = spawn_rerender_loop(
            Arc::clone(&service),
            Duration::from_millis(50),
            shutdown.clone(),
        );

        assert!(!service.has_published());
        for _ in 0..250 {
            if service.has_published() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(service.has_published());
        assert!(service.state().unwrap().last_rendered_at.is_some());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
